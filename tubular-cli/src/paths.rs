//! Platform-specific directory paths.
//!
//! The state database location comes from `tubular_lib::storage::default_db_path`.

use std::path::PathBuf;

use directories::ProjectDirs;

const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "unosquare";
const APPLICATION: &str = "tubular";

/// Get the cache directory for regenerable data.
///
/// - Linux: `$XDG_CACHE_HOME/tubular` or `~/.cache/tubular`
/// - macOS: `~/Library/Caches/io.unosquare.tubular`
/// - Windows: `C:\Users\<User>\AppData\Local\unosquare\tubular\cache`
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Get the path to the latest log file.
pub fn log_file() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("latest.log"))
}
