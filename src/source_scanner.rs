//! Finds the source files that contain log call sites.
//!
//! The result is a sorted, deduplicated list of forward-slash paths relative
//! to the scan root. Sorting happens after the walk, so the output does not
//! depend on the order in which the filesystem returns directory entries.

use std::fs;
use std::path::{Component, Path};

use log::{debug, warn};

use crate::error::ToolError;

/// What the scanner looks for and where it refuses to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub extensions: Vec<String>,
    pub exclude_dirs: Vec<String>,
    pub log_macros: Vec<String>,
}

/// Output of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Qualifying files, sorted and deduplicated.
    pub files: Vec<String>,
    /// Candidate files that could not be read.
    pub unreadable: Vec<String>,
    /// Number of candidate files (matching extension) that were examined.
    pub examined: usize,
}

/// Scans `root` for files that invoke one of the configured log macros.
///
/// # Arguments
///
/// * `root` - Directory to walk
/// * `settings` - Extensions, excluded directory names and macro names
///
/// # Returns
///
/// The scan result, or [`ToolError::SourceMissing`] if `root` itself cannot
/// be listed. Unreadable files and subdirectories are skipped with a warning.
pub fn scan(root: &Path, settings: &ScanSettings) -> Result<ScanResult, ToolError> {
    let entries = fs::read_dir(root).map_err(|e| ToolError::SourceMissing {
        path: root.to_path_buf(),
        source: e,
    })?;

    let mut result = ScanResult::default();
    visit_entries(root, entries, settings, &mut result);

    result.files.sort();
    result.files.dedup();
    result.unreadable.sort();
    Ok(result)
}

fn visit_dir(root: &Path, dir: &Path, settings: &ScanSettings, result: &mut ScanResult) {
    match fs::read_dir(dir) {
        Ok(entries) => visit_entries(root, entries, settings, result),
        Err(e) => warn!("Cannot list {}: {}", dir.display(), e),
    }
}

fn visit_entries(
    root: &Path,
    entries: fs::ReadDir,
    settings: &ScanSettings,
    result: &mut ScanResult,
) {
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Cannot read directory entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                continue;
            }
        };

        if file_type.is_dir() {
            let name = entry.file_name();
            let excluded = settings
                .exclude_dirs
                .iter()
                .any(|d| name.to_str() == Some(d.as_str()));
            if excluded {
                debug!("Skipping excluded directory {}", path.display());
                continue;
            }
            visit_dir(root, &path, settings, result);
            continue;
        }

        // Symlinked directories are not followed; symlinked files are.
        let is_file = file_type.is_file() || (file_type.is_symlink() && path.is_file());
        if !is_file || !has_extension(&path, &settings.extensions) {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(rel) => normalize(rel),
            Err(_) => continue,
        };
        result.examined += 1;

        match fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                if contains_log_macro(&text, &settings.log_macros) {
                    debug!("  + {}", relative);
                    result.files.push(relative);
                }
            }
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                result.unreadable.push(relative);
            }
        }
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e == ext))
        .unwrap_or(false)
}

/// Joins the normal components of a relative path with `/`.
pub fn normalize(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Returns true if `text` contains an invocation of any macro in `macros`.
///
/// An invocation is the macro name as a whole identifier, followed by
/// optional whitespace and an opening parenthesis. `MY_LOG_INF(` and
/// `LOG_INFO(` do not count as `LOG_INF`.
///
/// # Examples
///
/// ```
/// # use fileid_log::source_scanner::contains_log_macro;
/// let macros = vec!["LOG_INF".to_string()];
/// assert!(contains_log_macro("    LOG_INF (\"up\");", &macros));
/// assert!(!contains_log_macro("MY_LOG_INF(\"up\");", &macros));
/// assert!(!contains_log_macro("#define LOG_INF_EN 1", &macros));
/// ```
pub fn contains_log_macro(text: &str, macros: &[String]) -> bool {
    let bytes = text.as_bytes();
    macros.iter().filter(|m| !m.is_empty()).any(|name| {
        text.match_indices(name.as_str()).any(|(pos, _)| {
            if pos > 0 && is_ident_byte(bytes[pos - 1]) {
                return false;
            }
            let rest = text[pos + name.len()..].trim_start();
            rest.starts_with('(')
        })
    })
}
