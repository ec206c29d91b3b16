//! Destination file handling shared by the fixed-width and delimited writers.

use crate::{Error, Result};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tempfile::{Builder, NamedTempFile};
use tracing::warn;

/// Mode requested for newly created files, before the process umask applies.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o666;

/// Maps an I/O error on `path`, singling out permission failures.
pub fn io_error(operation: &str, path: &Path, e: &io::Error) -> Error {
    if e.kind() == io::ErrorKind::PermissionDenied {
        Error::Permission {
            path: path.to_path_buf(),
        }
    } else {
        Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("{}: {e}", path.display()),
        }
    }
}

/// Writes `path` in full through `write`.
///
/// With `atomic` set the content goes to a temporary file in the same
/// directory which is then renamed over `path`, so readers see either the old
/// file or the complete new one. Otherwise `path` is truncated and written in
/// place. A replaced file keeps its permissions; a new file gets the same
/// umask-derived mode a plain create would give it.
///
/// # Errors
///
/// Returns [`Error::Permission`] when the destination or its directory is not
/// writable, and [`Error::OperationFailed`] for other I/O failures.
pub fn write_file<F>(path: &Path, atomic: bool, write: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    if !atomic {
        let file = File::create(path).map_err(|e| io_error("create_file", path, &e))?;
        let mut out = BufWriter::new(file);
        write(&mut out).map_err(|e| io_error("write_file", path, &e))?;
        return out.flush().map_err(|e| io_error("write_file", path, &e));
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = temp_file(dir).map_err(|e| io_error("create_temp_file", path, &e))?;
    if let Ok(metadata) = std::fs::metadata(path)
        && let Err(e) = temp.as_file().set_permissions(metadata.permissions())
    {
        warn!(
            path = %path.display(),
            error = %e,
            "Could not copy permissions of the file being replaced"
        );
    }
    {
        let mut out = BufWriter::new(temp.as_file_mut());
        write(&mut out).map_err(|e| io_error("write_file", path, &e))?;
        out.flush().map_err(|e| io_error("write_file", path, &e))?;
    }
    temp.persist(path)
        .map_err(|e| io_error("replace_file", path, &e.error))?;
    Ok(())
}

fn temp_file(dir: &Path) -> io::Result<NamedTempFile> {
    #[cfg_attr(not(unix), allow(unused_mut))]
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(NEW_FILE_MODE));
    }
    builder.tempfile_in(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_write_replaces_content() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("temp dir should be created");
        };
        let path = dir.path().join("plants.plt");
        assert!(std::fs::write(&path, "old content that is longer\n").is_ok());
        assert!(write_file(&path, true, |out| out.write_all(b"new\n")).is_ok());
        assert_eq!(std::fs::read_to_string(&path).unwrap_or_default(), "new\n");

        let leftovers = std::fs::read_dir(dir.path()).map_or(0, Iterator::count);
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_direct_write() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("temp dir should be created");
        };
        let path = dir.path().join("file.cio");
        assert!(write_file(&path, false, |out| out.write_all(b"abc\n")).is_ok());
        assert_eq!(std::fs::read_to_string(&path).unwrap_or_default(), "abc\n");
    }

    #[test]
    fn test_failed_render_keeps_old_file() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("temp dir should be created");
        };
        let path = dir.path().join("soils.sol");
        assert!(std::fs::write(&path, "keep\n").is_ok());
        let result = write_file(&path, true, |out| {
            out.write_all(b"partial")?;
            Err(io::Error::other("render failed"))
        });
        assert!(matches!(result, Err(Error::OperationFailed { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap_or_default(), "keep\n");
    }

    #[test]
    fn test_permission_error_mapping() {
        let e = io::Error::from(io::ErrorKind::PermissionDenied);
        let mapped = io_error("create_file", Path::new("/x/hru.con"), &e);
        assert!(matches!(mapped, Error::Permission { .. }));
        assert!(mapped.to_string().contains("hru.con"));
    }

    #[cfg(unix)]
    fn mode(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).map_or(0, |m| m.permissions().mode() & 0o777)
    }

    #[cfg(unix)]
    #[test]
    fn test_new_file_gets_plain_create_mode() {
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("temp dir should be created");
        };
        let plain = dir.path().join("plain.txt");
        assert!(std::fs::write(&plain, "x\n").is_ok());

        let path = dir.path().join("plants.plt");
        assert!(write_file(&path, true, |out| out.write_all(b"new\n")).is_ok());
        assert_eq!(mode(&path), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn test_replaced_file_keeps_mode() {
        use std::os::unix::fs::PermissionsExt;
        let Ok(dir) = tempfile::tempdir() else {
            unreachable!("temp dir should be created");
        };
        let path = dir.path().join("hru.con");
        assert!(std::fs::write(&path, "old\n").is_ok());
        let restricted = std::fs::Permissions::from_mode(0o640);
        assert!(std::fs::set_permissions(&path, restricted).is_ok());

        assert!(write_file(&path, true, |out| out.write_all(b"new\n")).is_ok());
        assert_eq!(mode(&path), 0o640);
    }
}
