//! Configuration management.
//!
//! Every formatting constant the codec uses lives in [`CodecConfig`] and is
//! injected into column resolution, never re-derived at call sites.
//!
//! # Configuration File
//!
//! ```toml
//! [format]
//! decimals = 3
//! column_gap = 2
//! null_numeric = "0"
//! null_string = "null"
//! atomic_writes = true
//!
//! [format.widths]
//! string = 16
//! key = 25
//!
//! [banner]
//! tool = "hydrofile"
//! engine = "SWAT+"
//! engine_revision = "61.0.1"
//!
//! [logging]
//! format = "pretty"
//! level = "info"
//! ```

mod catalog;

pub use catalog::{Catalog, CatalogTable};

use crate::format::ColumnKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default width of free-text columns.
pub const DEFAULT_STRING_WIDTH: usize = 16;
/// Default width of natural-key (`name`) columns.
pub const DEFAULT_KEY_WIDTH: usize = 25;
/// Default width of code columns.
pub const DEFAULT_CODE_WIDTH: usize = 12;
/// Default width of decimal columns.
pub const DEFAULT_DECIMAL_WIDTH: usize = 12;
/// Default width of integer columns.
pub const DEFAULT_INTEGER_WIDTH: usize = 8;
/// Default width of foreign-key columns rendered by name.
pub const DEFAULT_FOREIGN_KEY_WIDTH: usize = 16;
/// Default number of decimal places.
pub const DEFAULT_DECIMALS: usize = 3;
/// Null text of integer, decimal and boolean columns.
pub const NULL_NUMERIC: &str = "0";
/// Null text of text, key, code and foreign-key columns.
pub const NULL_STRING: &str = "null";
/// Spaces between adjacent tokens.
pub const DEFAULT_COLUMN_GAP: usize = 2;

/// Default column widths per column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnWidths {
    /// Free text.
    pub string: usize,
    /// Natural keys.
    pub key: usize,
    /// Codes and booleans.
    pub code: usize,
    /// Decimals.
    pub decimal: usize,
    /// Integers.
    pub integer: usize,
    /// Foreign keys rendered by name.
    pub foreign_key: usize,
}

impl Default for ColumnWidths {
    fn default() -> Self {
        Self {
            string: DEFAULT_STRING_WIDTH,
            key: DEFAULT_KEY_WIDTH,
            code: DEFAULT_CODE_WIDTH,
            decimal: DEFAULT_DECIMAL_WIDTH,
            integer: DEFAULT_INTEGER_WIDTH,
            foreign_key: DEFAULT_FOREIGN_KEY_WIDTH,
        }
    }
}

impl ColumnWidths {
    /// Returns the default width for a column kind.
    #[must_use]
    pub const fn for_kind(&self, kind: ColumnKind) -> usize {
        match kind {
            ColumnKind::Text => self.string,
            ColumnKind::Key => self.key,
            ColumnKind::Code | ColumnKind::Boolean => self.code,
            ColumnKind::Integer => self.integer,
            ColumnKind::Decimal => self.decimal,
            ColumnKind::ForeignKey => self.foreign_key,
        }
    }
}

/// Identity stamped into the banner line of generated files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerConfig {
    /// Generating tool name.
    pub tool: String,
    /// Generating tool version; omitted from the banner when `None`.
    pub version: Option<String>,
    /// Target engine name.
    pub engine: String,
    /// Target engine revision; the `for ...` clause is omitted when `None`.
    pub engine_revision: Option<String>,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            engine: "SWAT+".to_string(),
            engine_revision: None,
        }
    }
}

/// Logging settings from the `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive such as `info` or `hydrofile=debug`.
    pub level: Option<String>,
    /// Optional log file, appended to.
    pub file: Option<String>,
}

/// Main configuration for hydrofile.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Default widths per column kind.
    pub widths: ColumnWidths,
    /// Default decimal places.
    pub decimals: usize,
    /// Null text of numeric columns.
    pub null_numeric: String,
    /// Null text of string columns.
    pub null_string: String,
    /// Spaces between adjacent tokens.
    pub column_gap: usize,
    /// Write through a temporary file and rename over the destination.
    pub atomic_writes: bool,
    /// Banner identity.
    pub banner: BannerConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Catalog of table schemas and layouts used by the CLI.
    pub catalog_path: Option<PathBuf>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            widths: ColumnWidths::default(),
            decimals: DEFAULT_DECIMALS,
            null_numeric: NULL_NUMERIC.to_string(),
            null_string: NULL_STRING.to_string(),
            column_gap: DEFAULT_COLUMN_GAP,
            atomic_writes: true,
            banner: BannerConfig::default(),
            logging: LoggingSettings::default(),
            catalog_path: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Formatting section.
    pub format: Option<ConfigFileFormat>,
    /// Banner section.
    pub banner: Option<ConfigFileBanner>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Catalog path, relative to the config file.
    pub catalog: Option<String>,
}

/// Format section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFormat {
    /// Default decimal places.
    pub decimals: Option<usize>,
    /// Spaces between tokens.
    pub column_gap: Option<usize>,
    /// Numeric null text.
    pub null_numeric: Option<String>,
    /// String null text.
    pub null_string: Option<String>,
    /// Atomic replace switch.
    pub atomic_writes: Option<bool>,
    /// Width overrides.
    pub widths: Option<ConfigFileWidths>,
}

/// Widths section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileWidths {
    /// Free text.
    pub string: Option<usize>,
    /// Natural keys.
    pub key: Option<usize>,
    /// Codes.
    pub code: Option<usize>,
    /// Decimals.
    pub decimal: Option<usize>,
    /// Integers.
    pub integer: Option<usize>,
    /// Foreign keys.
    pub foreign_key: Option<usize>,
}

/// Banner section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileBanner {
    /// Tool name.
    pub tool: Option<String>,
    /// Tool version.
    pub version: Option<String>,
    /// Engine name.
    pub engine: Option<String>,
    /// Engine revision.
    pub engine_revision: Option<String>,
}

impl CodecConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the null text for a column kind.
    #[must_use]
    pub fn null_text(&self, kind: ColumnKind) -> &str {
        if kind.uses_numeric_null() {
            &self.null_numeric
        } else {
            &self.null_string
        }
    }

    /// Returns the token separator.
    #[must_use]
    pub fn gap(&self) -> String {
        " ".repeat(self.column_gap)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`], or
    /// if a width is zero.
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;
        let config = Self::from_config_file(file);
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// A relative `catalog` path is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        let mut config = Self::from_toml_str(&contents)?;
        if let (Some(catalog), Some(dir)) = (config.catalog_path.take(), path.parent()) {
            config.catalog_path = Some(if catalog.is_relative() {
                dir.join(catalog)
            } else {
                catalog
            });
        }
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir (`~/.config/hydrofile/config.toml` on
    /// Linux) and returns defaults if no readable file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs
            .config_dir()
            .join("hydrofile")
            .join("config.toml");
        if platform_config.exists() {
            match Self::load_from_file(&platform_config) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(
                    path = %platform_config.display(),
                    error = %e,
                    "Ignoring unreadable config file"
                ),
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `CodecConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(format) = file.format {
            if let Some(v) = format.decimals {
                config.decimals = v;
            }
            if let Some(v) = format.column_gap {
                config.column_gap = v;
            }
            if let Some(v) = format.null_numeric {
                config.null_numeric = v;
            }
            if let Some(v) = format.null_string {
                config.null_string = v;
            }
            if let Some(v) = format.atomic_writes {
                config.atomic_writes = v;
            }
            if let Some(widths) = format.widths {
                let w = &mut config.widths;
                w.string = widths.string.unwrap_or(w.string);
                w.key = widths.key.unwrap_or(w.key);
                w.code = widths.code.unwrap_or(w.code);
                w.decimal = widths.decimal.unwrap_or(w.decimal);
                w.integer = widths.integer.unwrap_or(w.integer);
                w.foreign_key = widths.foreign_key.unwrap_or(w.foreign_key);
            }
        }
        if let Some(banner) = file.banner {
            if let Some(tool) = banner.tool {
                config.banner.tool = tool;
            }
            if banner.version.is_some() {
                config.banner.version = banner.version;
            }
            if let Some(engine) = banner.engine {
                config.banner.engine = engine;
            }
            config.banner.engine_revision = banner.engine_revision;
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        config.catalog_path = file.catalog.map(PathBuf::from);

        config
    }

    fn validate(&self) -> crate::Result<()> {
        let w = &self.widths;
        let all = [w.string, w.key, w.code, w.decimal, w.integer, w.foreign_key];
        if all.contains(&0) {
            return Err(crate::Error::Configuration(
                "column widths must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the banner engine revision.
    #[must_use]
    pub fn with_engine_revision(mut self, revision: impl Into<String>) -> Self {
        self.banner.engine_revision = Some(revision.into());
        self
    }

    /// Enables or disables atomic replacement of destination files.
    #[must_use]
    pub const fn with_atomic_writes(mut self, atomic: bool) -> Self {
        self.atomic_writes = atomic;
        self
    }

    /// Sets the default decimal places.
    #[must_use]
    pub const fn with_decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }
}
