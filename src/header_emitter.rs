//! Renders the ID table as a C header and writes it atomically.
//!
//! The firmware includes this header to emit identities; the decoder parses
//! the same file back (see [`crate::file_table::FileTable::parse_header`]), so
//! both sides share one table.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::ToolError;
use crate::id_allocator::IdAssignment;
use crate::module_config::{AllocatorConfig, OTHER_MODULE};

/// Default location of the generated header.
pub const DEFAULT_OUTPUT: &str = "include/log_file_id.h";

/// Prefix of every generated enum constant.
pub const ENUM_PREFIX: &str = "FILE_ID_";

/// Name of the trailing sentinel constant.
pub const SENTINEL_NAME: &str = "FILE_ID_MAX";

/// Start of the comment line that introduces a module group.
pub const MODULE_BANNER: &str = "/* Module ";

/// Whether [`write_header`] touched the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The destination already held identical contents.
    Unchanged,
}

/// Converts a source path to its enum constant name.
///
/// `drivers/uart.c` becomes `FILE_ID_DRIVERS_UART`.
pub fn enum_name(path: &str) -> String {
    let stem = match path.rfind('.') {
        Some(dot) if !path[dot..].contains('/') => &path[..dot],
        _ => path,
    };
    format!("{}{}", ENUM_PREFIX, sanitize(stem))
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Enum names for every assigned path, made unique.
///
/// Paths whose names collide (`uart.c` and `uart.h`) keep their extension;
/// anything still colliding gets its ID appended.
pub fn enum_names(assignment: &IdAssignment) -> BTreeMap<&str, String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    // A file named `max.c` must not shadow the sentinel.
    counts.insert(SENTINEL_NAME.to_string(), 1);
    for path in assignment.keys() {
        *counts.entry(enum_name(path)).or_default() += 1;
    }

    let mut names: BTreeMap<&str, String> = assignment
        .keys()
        .map(|path| {
            let base = enum_name(path);
            let name = if counts[&base] > 1 {
                format!("{}{}", ENUM_PREFIX, sanitize(path))
            } else {
                base
            };
            (path.as_str(), name)
        })
        .collect();

    // A suffix can itself collide (`a-b.c` #1 and `a_b_c_1.c`), so repeat
    // until every name, the sentinel included, is unique. IDs are distinct,
    // so each round separates the names it touches.
    loop {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        seen.insert(SENTINEL_NAME, 1);
        for name in names.values() {
            *seen.entry(name.as_str()).or_default() += 1;
        }
        let clashing: Vec<&str> = names
            .iter()
            .filter(|(_, name)| seen[name.as_str()] > 1)
            .map(|(path, _)| *path)
            .collect();
        if clashing.is_empty() {
            return names;
        }
        for path in clashing {
            if let Some(name) = names.get_mut(path) {
                name.push_str(&format!("_{}", assignment[path]));
            }
        }
    }
}

/// Include guard derived from the output file name: `log_file_id.h` → `LOG_FILE_ID_H`.
pub fn guard_name(output: &Path) -> String {
    let file = output
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log_file_id.h".to_string());
    sanitize(&file)
}

/// Renders the generated header.
///
/// # Arguments
///
/// * `assignment` - Path → ID table to publish
/// * `config` - Module ranges, used for grouping and banners
/// * `file_name` - Name recorded in the banner and used for the include guard
///
/// # Returns
///
/// The complete header text. The output contains no timestamp, so the same
/// inputs always render the same bytes.
pub fn render_header(
    assignment: &IdAssignment,
    config: &AllocatorConfig,
    file_name: &str,
) -> String {
    let names = enum_names(assignment);
    let guard = guard_name(Path::new(file_name));

    let mut lines = vec![
        "/**".to_string(),
        format!(" * @file {}", file_name),
        " * @brief Auto-generated file ID definitions for the logging system".to_string(),
        " *".to_string(),
        " * WARNING: DO NOT EDIT MANUALLY".to_string(),
        " * This file is generated by gen_file_ids and is overwritten on every run.".to_string(),
        " *".to_string(),
        format!(" * Total files: {}", assignment.len()),
        " */".to_string(),
        String::new(),
        format!("#ifndef {}", guard),
        format!("#define {}", guard),
        String::new(),
        "typedef enum {".to_string(),
    ];

    let mut by_id: Vec<(u16, &str)> = assignment.iter().map(|(p, &id)| (id, p.as_str())).collect();
    by_id.sort();

    let render_group = |lines: &mut Vec<String>, banner: String, entries: Vec<(u16, &str)>| {
        if entries.is_empty() {
            return;
        }
        lines.push(format!("    {}", banner));
        for (id, path) in entries {
            lines.push(format!("    {} = {},  /* {} */", names[path], id, path));
        }
        lines.push(String::new());
    };

    for module in &config.modules {
        let entries: Vec<(u16, &str)> = by_id
            .iter()
            .copied()
            .filter(|(id, _)| module.contains(*id))
            .collect();
        let banner = format!(
            "{}{}: {} ({}-{}) */",
            MODULE_BANNER, module.name, module.description, module.start, module.end
        );
        render_group(&mut lines, banner, entries);
    }

    let stray: Vec<(u16, &str)> = by_id
        .iter()
        .copied()
        .filter(|(id, _)| config.module_for_id(*id).is_none())
        .collect();
    let banner = format!("{}{}: outside configured ranges */", MODULE_BANNER, OTHER_MODULE);
    render_group(&mut lines, banner, stray);

    let sentinel = by_id.last().map(|(id, _)| u32::from(*id) + 1).unwrap_or(0);
    lines.push(format!(
        "    {} = {}  /* one past the highest assigned ID */",
        SENTINEL_NAME, sentinel
    ));
    lines.push("} LOG_FILE_ID_E;".to_string());
    lines.push(String::new());
    lines.push(format!("#endif /* {} */", guard));
    lines.push(String::new());

    lines.join("\n")
}

/// Writes `contents` to `path` so that readers never see a partial file.
///
/// The text goes to a temporary file in the destination directory, which
/// then replaces the destination in a single rename. If the destination
/// already holds `contents`, nothing is written and its timestamp is kept,
/// so builds depending on it are not triggered.
pub fn write_header(path: &Path, contents: &str) -> Result<WriteOutcome, ToolError> {
    let emit_err = |e: std::io::Error| ToolError::Emit {
        path: path.to_path_buf(),
        source: e,
    };

    if let Ok(existing) = fs::read_to_string(path) {
        if existing == contents {
            return Ok(WriteOutcome::Unchanged);
        }
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(emit_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(emit_err)?;
    tmp.write_all(contents.as_bytes()).map_err(emit_err)?;
    tmp.as_file().sync_all().map_err(emit_err)?;
    tmp.persist(path).map_err(|e| emit_err(e.error))?;
    Ok(WriteOutcome::Written)
}
