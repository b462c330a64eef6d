//! Lookup table from file ID back to source file and module.
//!
//! This is the decoder's view of an allocation. It is built either directly
//! from an [`IdAssignment`] or by parsing the generated header, which is the
//! same table the firmware was compiled against.
//!
//! Lookups never fail: unknown IDs resolve to placeholder names so that one
//! bad header word cannot stop a decode.

use std::borrow::Cow;
use std::collections::BTreeMap;

use log::debug;

use crate::header_emitter::{ENUM_PREFIX, MODULE_BANNER, SENTINEL_NAME};
use crate::id_allocator::IdAssignment;
use crate::module_config::{AllocatorConfig, ModuleRange};

/// Placeholder module name for IDs outside every known range.
pub const UNKNOWN_MODULE: &str = "unknown";

/// One known source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    /// Module recorded for the file, if the source of the table had one.
    pub module: Option<String>,
}

/// ID → file table used when decoding.
///
/// # Examples
///
/// ```
/// # use fileid_log::file_table::FileTable;
/// let mut table = FileTable::new(Vec::new());
/// table.insert(51, "src/drivers/spi.c", Some("drivers"));
///
/// assert_eq!(table.file_name(51), "src/drivers/spi.c");
/// assert_eq!(table.module_name(51), "drivers");
///
/// // Unknown IDs get placeholders instead of failing
/// assert_eq!(table.file_name(4000), "unknown_4000");
/// assert_eq!(table.module_name(4000), "unknown");
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileTable {
    entries: BTreeMap<u16, FileEntry>,
    ranges: Vec<ModuleRange>,
}

impl FileTable {
    /// Creates an empty table. `ranges` name the module of IDs that have no
    /// entry, or whose entry carries no module.
    pub fn new(ranges: Vec<ModuleRange>) -> Self {
        Self {
            entries: BTreeMap::new(),
            ranges,
        }
    }

    /// Builds the table for an allocation, taking module names from `config`.
    pub fn from_assignment(assignment: &IdAssignment, config: &AllocatorConfig) -> Self {
        let mut table = Self::new(config.modules.clone());
        for (path, &id) in assignment {
            let module = config.module_for_id(id).map(|m| m.name.as_str());
            table.insert(id, path, module);
        }
        table
    }

    /// Reads back a header produced by [`crate::header_emitter::render_header`].
    ///
    /// Entry lines look like `FILE_ID_X = 51,  /* src/drivers/spi.c */` and
    /// take their module from the nearest preceding `/* Module name: ... */`
    /// banner. Lines that do not match either form are ignored.
    pub fn parse_header(text: &str, ranges: Vec<ModuleRange>) -> Self {
        let mut table = Self::new(ranges);
        let mut module: Option<String> = None;

        for line in text.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix(MODULE_BANNER) {
                module = rest.split(':').next().map(|name| name.trim().to_string());
                continue;
            }
            let name = line.split('=').next().unwrap_or_default().trim();
            if !name.starts_with(ENUM_PREFIX) || name == SENTINEL_NAME {
                continue;
            }
            match parse_entry(line) {
                Some((id, path)) => table.insert(id, path, module.as_deref()),
                None => debug!("Ignoring unrecognized header line: {}", line),
            }
        }
        table
    }

    /// Adds or replaces the entry for `id`.
    pub fn insert(&mut self, id: u16, path: &str, module: Option<&str>) {
        self.entries.insert(
            id,
            FileEntry {
                path: path.to_string(),
                module: module.map(str::to_string),
            },
        );
    }

    pub fn get(&self, id: u16) -> Option<&FileEntry> {
        self.entries.get(&id)
    }

    /// File path for `id`, or `unknown_<id>`.
    pub fn file_name(&self, id: u16) -> Cow<'_, str> {
        match self.entries.get(&id) {
            Some(entry) => Cow::Borrowed(entry.path.as_str()),
            None => Cow::Owned(format!("unknown_{}", id)),
        }
    }

    /// Module for `id`: the entry's own module, else the configured range
    /// containing `id`, else [`UNKNOWN_MODULE`].
    pub fn module_name(&self, id: u16) -> &str {
        self.entries
            .get(&id)
            .and_then(|e| e.module.as_deref())
            .or_else(|| self.ranges.iter().find(|r| r.contains(id)).map(|r| r.name.as_str()))
            .unwrap_or(UNKNOWN_MODULE)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &FileEntry)> {
        self.entries.iter().map(|(&id, e)| (id, e))
    }
}

/// Splits `NAME = ID,  /* path */` into its ID and path.
fn parse_entry(line: &str) -> Option<(u16, &str)> {
    let (_, rest) = line.split_once('=')?;
    let (id, rest) = rest.split_once(',')?;
    let id = id.trim().parse().ok()?;
    let comment = rest.trim().strip_prefix("/*")?.strip_suffix("*/")?;
    Some((id, comment.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header_emitter::render_header;

    #[test]
    fn test_header_round_trip() {
        let config = AllocatorConfig::default();
        let mut assignment = IdAssignment::new();
        assignment.insert("src/drivers/spi.c".to_string(), 51);
        assignment.insert("src/drivers/uart.c".to_string(), 52);
        assignment.insert("src/app/main.c".to_string(), 151);

        let header = render_header(&assignment, &config, "log_file_id.h");
        let table = FileTable::parse_header(&header, Vec::new());

        assert_eq!(table.len(), 3);
        assert_eq!(table.file_name(52), "src/drivers/uart.c");
        assert_eq!(table.module_name(52), "drivers");
        assert_eq!(table.module_name(151), "app");
        // The sentinel is not an entry.
        assert!(table.get(152).is_none());
    }

    #[test]
    fn test_ranges_fill_missing_modules() {
        let config = AllocatorConfig::default();
        let mut table = FileTable::new(config.modules.clone());
        table.insert(60, "orphan.c", None);
        assert_eq!(table.module_name(60), "drivers");
        assert_eq!(table.module_name(300), "test");
        assert_eq!(table.module_name(0), UNKNOWN_MODULE);
        assert_eq!(table.file_name(300), "unknown_300");
    }

    #[test]
    fn test_from_assignment() {
        let config = AllocatorConfig::default();
        let mut assignment = IdAssignment::new();
        assignment.insert("brom/boot.c".to_string(), 1);
        let table = FileTable::from_assignment(&assignment, &config);
        assert_eq!(table.get(1).unwrap().module.as_deref(), Some("brom"));
        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn test_garbage_lines_ignored() {
        let text = "FILE_ID_BROKEN = x,  /* a.c */\nFILE_ID_NOCOMMENT = 3,\nrandom text\n";
        let table = FileTable::parse_header(text, Vec::new());
        assert!(table.is_empty());
    }
}
