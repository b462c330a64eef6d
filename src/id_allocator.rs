//! Stable file ID assignment within configured module ranges.
//!
//! IDs depend only on the sorted file list and the static module ranges, so
//! the same inputs always produce the same assignment, in any process.

use std::collections::BTreeMap;

use log::debug;

use crate::error::AllocationError;
use crate::module_config::{AllocatorConfig, ModuleRange, OTHER_MODULE};

/// Mapping from scanned file path to its assigned ID.
pub type IdAssignment = BTreeMap<String, u16>;

/// Usage of one module range after allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStats {
    pub module: String,
    /// Number of files holding an ID in this range.
    pub files: usize,
    pub capacity: usize,
    pub start: u16,
    pub end: u16,
}

impl ModuleStats {
    pub fn usage_percent(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.files as f64 * 100.0 / self.capacity as f64
    }
}

/// Outcome of an allocation run.
///
/// Failures are data, not errors: an overflowing module or an unclassified
/// file is listed here while every other file still receives its ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    pub assignment: IdAssignment,
    /// One entry per module that had more files than IDs.
    pub overflows: Vec<AllocationError>,
    /// Files that matched no module and have no `other` range to fall into.
    pub unclassified: Vec<String>,
    pub stats: Vec<ModuleStats>,
}

impl Allocation {
    /// True when every scanned file received an ID.
    pub fn is_complete(&self) -> bool {
        self.overflows.is_empty() && self.unclassified.is_empty()
    }
}

/// Assigns IDs to files according to an [`AllocatorConfig`].
///
/// # Examples
///
/// ```
/// use fileid_log::id_allocator::IdAllocator;
/// use fileid_log::module_config::{AllocatorConfig, ModuleRange};
///
/// let config = AllocatorConfig::with_modules(vec![
///     ModuleRange::new("drivers", 51, 150, "Driver layer"),
/// ]);
/// let files = vec!["src/drivers/uart.c".to_string(), "src/drivers/spi.c".to_string()];
/// let allocation = IdAllocator::new(&config).allocate(&files);
///
/// assert_eq!(allocation.assignment["src/drivers/spi.c"], 51);
/// assert_eq!(allocation.assignment["src/drivers/uart.c"], 52);
/// ```
pub struct IdAllocator<'c> {
    config: &'c AllocatorConfig,
}

impl<'c> IdAllocator<'c> {
    pub fn new(config: &'c AllocatorConfig) -> Self {
        Self { config }
    }

    /// Finds the module a file belongs to.
    ///
    /// Modules are tried in configuration order; the first whose path rule
    /// names one of the file's directory segments wins. A file that matches
    /// nothing goes to the `other` range if one is configured.
    pub fn classify(&self, path: &str) -> Option<&'c ModuleRange> {
        self.classify_index(path).map(|i| &self.config.modules[i])
    }

    fn classify_index(&self, path: &str) -> Option<usize> {
        let normalized = path.replace('\\', "/");
        let mut segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
        // The last segment is the file name, not a directory.
        segments.pop();

        self.config
            .modules
            .iter()
            .position(|m| m.path_segments().any(|rule| segments.contains(&rule)))
            .or_else(|| self.config.modules.iter().position(|m| m.name == OTHER_MODULE))
    }

    /// Allocates IDs for `files`.
    ///
    /// Files are deduplicated and sorted first, then each module's files
    /// receive consecutive IDs starting at the module's `start`.
    pub fn allocate(&self, files: &[String]) -> Allocation {
        let (buckets, unclassified) = self.bucket(files);
        let mut allocation = Allocation {
            unclassified,
            ..Allocation::default()
        };

        for (module, files) in self.config.modules.iter().zip(buckets) {
            if let Some(overflow) = overflow(module, files.len()) {
                allocation.overflows.push(overflow);
                continue;
            }
            for (offset, file) in files.into_iter().enumerate() {
                // capacity() bounds offset, so this cannot exceed `end`.
                let id = module.start + offset as u16;
                debug!("{} -> {} ({})", file, id, module.name);
                allocation.assignment.insert(file.clone(), id);
            }
        }

        allocation.stats = module_stats(&allocation.assignment, self.config);
        allocation
    }

    /// Re-derives the problems an allocation of `files` reports, without
    /// assigning IDs.
    ///
    /// A cached assignment only holds the files that received an ID, so this
    /// is how a cache hit reports the same overflows and unclassified files
    /// as the run that produced it.
    pub fn diagnose(&self, files: &[String]) -> (Vec<AllocationError>, Vec<String>) {
        let (buckets, unclassified) = self.bucket(files);
        let overflows = self
            .config
            .modules
            .iter()
            .zip(&buckets)
            .filter_map(|(module, files)| overflow(module, files.len()))
            .collect();
        (overflows, unclassified)
    }

    /// Sorts and deduplicates `files`, then groups them by module index.
    fn bucket<'f>(&self, files: &'f [String]) -> (Vec<Vec<&'f String>>, Vec<String>) {
        let mut sorted: Vec<&String> = files.iter().collect();
        sorted.sort();
        sorted.dedup();

        let mut buckets: Vec<Vec<&String>> = vec![Vec::new(); self.config.modules.len()];
        let mut unclassified = Vec::new();
        for file in sorted {
            match self.classify_index(file) {
                Some(i) => buckets[i].push(file),
                None => unclassified.push(file.clone()),
            }
        }
        (buckets, unclassified)
    }
}

fn overflow(module: &ModuleRange, files: usize) -> Option<AllocationError> {
    (files > module.capacity()).then(|| AllocationError::Overflow {
        module: module.name.clone(),
        files,
        capacity: module.capacity(),
        start: module.start,
        end: module.end,
    })
}

/// Counts assigned IDs per configured module, in configuration order.
///
/// Works from IDs alone, so it applies equally to a fresh allocation and to
/// an assignment loaded from the cache.
pub fn module_stats(assignment: &IdAssignment, config: &AllocatorConfig) -> Vec<ModuleStats> {
    config
        .modules
        .iter()
        .map(|m| ModuleStats {
            module: m.name.clone(),
            files: assignment.values().filter(|&&id| m.contains(id)).count(),
            capacity: m.capacity(),
            start: m.start,
            end: m.end,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn classify_first_match_wins() {
        let mut drivers = ModuleRange::new("drivers", 51, 150, "");
        drivers.paths = vec!["drivers".to_string(), "drv".to_string()];
        let config = AllocatorConfig::with_modules(vec![
            ModuleRange::new("test", 1, 50, ""),
            drivers,
        ]);
        let allocator = IdAllocator::new(&config);

        assert_eq!(allocator.classify("src/drv/i2c.c").unwrap().name, "drivers");
        assert_eq!(allocator.classify("src/test/drivers/mock.c").unwrap().name, "test");
        assert!(allocator.classify("src/main.c").is_none());
        // File names never classify.
        assert!(allocator.classify("src/test.c").is_none());
    }

    #[test]
    fn other_bucket_only_when_configured() {
        let without = AllocatorConfig::with_modules(vec![ModuleRange::new("app", 1, 10, "")]);
        let allocation = IdAllocator::new(&without).allocate(&files(&["lib/x.c"]));
        assert!(allocation.assignment.is_empty());
        assert_eq!(allocation.unclassified, vec!["lib/x.c"]);

        let with = AllocatorConfig::with_modules(vec![
            ModuleRange::new("app", 1, 10, ""),
            ModuleRange::new("other", 100, 110, ""),
        ]);
        let allocation = IdAllocator::new(&with).allocate(&files(&["lib/x.c", "app/a.c"]));
        assert_eq!(allocation.assignment["lib/x.c"], 100);
        assert_eq!(allocation.assignment["app/a.c"], 1);
        assert!(allocation.is_complete());
    }

    #[test]
    fn ids_are_consecutive_and_sorted() {
        let config = AllocatorConfig::default();
        let input = files(&[
            "src/app/z.c",
            "src/app/a.c",
            "src/brom/boot.c",
            "src/app/m.c",
            "src/app/a.c",
        ]);
        let allocation = IdAllocator::new(&config).allocate(&input);
        assert_eq!(allocation.assignment["src/app/a.c"], 151);
        assert_eq!(allocation.assignment["src/app/m.c"], 152);
        assert_eq!(allocation.assignment["src/app/z.c"], 153);
        assert_eq!(allocation.assignment["src/brom/boot.c"], 1);
        assert_eq!(allocation.assignment.len(), 4);
    }

    #[test]
    fn overflow_is_isolated() {
        let config = AllocatorConfig::with_modules(vec![
            ModuleRange::new("small", 1, 2, ""),
            ModuleRange::new("big", 10, 20, ""),
        ]);
        let input = files(&["small/a.c", "small/b.c", "small/c.c", "big/x.c"]);
        let allocation = IdAllocator::new(&config).allocate(&input);

        assert_eq!(allocation.overflows.len(), 1);
        assert!(matches!(
            &allocation.overflows[0],
            AllocationError::Overflow { module, files: 3, capacity: 2, .. } if module == "small"
        ));
        assert!(!allocation.assignment.keys().any(|k| k.starts_with("small/")));
        assert_eq!(allocation.assignment["big/x.c"], 10);
    }

    #[test]
    fn diagnose_matches_allocate() {
        let config = AllocatorConfig::with_modules(vec![
            ModuleRange::new("small", 1, 2, ""),
            ModuleRange::new("big", 10, 20, ""),
        ]);
        let input = files(&["small/a.c", "small/b.c", "small/c.c", "big/x.c", "misc/y.c"]);
        let allocator = IdAllocator::new(&config);
        let allocation = allocator.allocate(&input);

        let (overflows, unclassified) = allocator.diagnose(&input);
        assert_eq!(overflows, allocation.overflows);
        assert_eq!(unclassified, allocation.unclassified);
        assert_eq!(unclassified, vec!["misc/y.c"]);
    }

    #[test]
    fn stats_report_usage() {
        let config = AllocatorConfig::with_modules(vec![ModuleRange::new("app", 1, 4, "")]);
        let allocation = IdAllocator::new(&config).allocate(&files(&["app/a.c"]));
        let stats = &allocation.stats[0];
        assert_eq!(stats.files, 1);
        assert_eq!(stats.capacity, 4);
        assert!((stats.usage_percent() - 25.0).abs() < f64::EPSILON);
    }
}
