//! Structured logging settings.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "HYDROFILE_LOG";
/// Environment variable selecting `pretty` or `json` output.
pub const LOG_FORMAT_ENV: &str = "HYDROFILE_LOG_FORMAT";
/// Environment variable naming a log file.
pub const LOG_FILE_ENV: &str = "HYDROFILE_LOG_FILE";

/// Default filter directive.
const DEFAULT_DIRECTIVE: &str = "warn";
/// Filter directive used with `--verbose`.
const VERBOSE_DIRECTIVE: &str = "hydrofile=debug,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub directive: String,
    /// Log file, appended to instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            directive: DEFAULT_DIRECTIVE.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config-file settings with env overrides.
    ///
    /// `RUST_LOG` wins over `HYDROFILE_LOG`, which wins over `--verbose`,
    /// which wins over the `[logging]` level.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::resolve(settings, verbose, |key| std::env::var(key).ok())
    }

    fn resolve(
        settings: &LoggingSettings,
        verbose: bool,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = Self::default();

        if let Some(format) = env(LOG_FORMAT_ENV)
            .as_deref()
            .or(settings.format.as_deref())
            .and_then(LogFormat::parse)
        {
            config.format = format;
        }

        if let Some(directive) = env("RUST_LOG").or_else(|| env(LOG_ENV)) {
            config.directive = directive;
        } else if verbose {
            config.directive = VERBOSE_DIRECTIVE.to_string();
        } else if let Some(level) = &settings.level {
            config.directive.clone_from(level);
        }

        config.file = env(LOG_FILE_ENV)
            .or_else(|| settings.file.clone())
            .filter(|f| !f.trim().is_empty())
            .map(PathBuf::from);

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::resolve(&LoggingSettings::default(), false, env_of(&[]));
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn test_settings_apply() {
        let settings = LoggingSettings {
            format: Some("JSON".to_string()),
            level: Some("debug".to_string()),
            file: Some("/tmp/hydrofile.log".to_string()),
        };
        let config = LoggingConfig::resolve(&settings, false, env_of(&[]));
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.directive, "debug");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/hydrofile.log")));
    }

    #[test]
    fn test_precedence() {
        let settings = LoggingSettings {
            format: Some("json".to_string()),
            level: Some("error".to_string()),
            file: None,
        };
        let verbose = LoggingConfig::resolve(&settings, true, env_of(&[]));
        assert_eq!(verbose.directive, VERBOSE_DIRECTIVE);

        let env = env_of(&[(LOG_ENV, "trace"), (LOG_FORMAT_ENV, "pretty")]);
        let config = LoggingConfig::resolve(&settings, true, env);
        assert_eq!(config.directive, "trace");
        assert_eq!(config.format, LogFormat::Pretty);

        let env = env_of(&[(LOG_ENV, "trace"), ("RUST_LOG", "off")]);
        assert_eq!(LoggingConfig::resolve(&settings, false, env).directive, "off");
    }

    #[test]
    fn test_unknown_format_keeps_default() {
        assert_eq!(LogFormat::parse("xml"), None);
        let settings = LoggingSettings {
            format: Some("xml".to_string()),
            ..LoggingSettings::default()
        };
        let config = LoggingConfig::resolve(&settings, false, env_of(&[]));
        assert_eq!(config.format, LogFormat::Pretty);
    }
}
