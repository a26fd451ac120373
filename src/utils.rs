//! Utility functions for logging and file system preparation.
//!
//! - String truncation for log fields
//! - Output directory preparation (clear, recreate, check writability)

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes on a character boundary, with
/// an ellipsis and the number of dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Make `path` an empty, writable directory.
///
/// An existing directory is removed with everything in it, then recreated.
/// Writability is checked by creating and deleting a scratch file.
///
/// # Errors
///
/// Returns an error if:
/// - `path` exists but is not a directory
/// - The directory cannot be removed or created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn prepare_environment(path: &Path) -> io::Result<()> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await?,
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists and is not a directory", path.display()),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(path).await?;

    let scratch_path = path.join(".__write_check__");
    fs::write(&scratch_path, b"").await?;
    fs::remove_file(&scratch_path).await?;
    info!("Output directory is ready");
    Ok(())
}
