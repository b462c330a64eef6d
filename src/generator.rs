//! The `gen_file_ids` pipeline: scan, consult the cache, allocate, emit.

use std::path::PathBuf;

use log::{error, info, warn};

use crate::cache_store::CacheStore;
use crate::error::{AllocationError, ToolError};
use crate::header_emitter::{self, WriteOutcome};
use crate::id_allocator::{module_stats, IdAllocator, IdAssignment, ModuleStats};
use crate::module_config::AllocatorConfig;
use crate::source_scanner;

/// Where the generator reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Root of the source tree. Scanned paths are relative to it.
    pub source: PathBuf,
    /// Destination of the generated header.
    pub output: PathBuf,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            source: PathBuf::from("src"),
            output: PathBuf::from(header_emitter::DEFAULT_OUTPUT),
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub assignment: IdAssignment,
    /// True when the assignment came from the cache.
    pub cache_hit: bool,
    pub overflows: Vec<AllocationError>,
    pub unclassified: Vec<String>,
    pub stats: Vec<ModuleStats>,
    /// `None` when there was nothing to write.
    pub write: Option<WriteOutcome>,
}

impl RunSummary {
    fn empty() -> Self {
        Self {
            files_scanned: 0,
            assignment: IdAssignment::new(),
            cache_hit: false,
            overflows: Vec::new(),
            unclassified: Vec::new(),
            stats: Vec::new(),
            write: None,
        }
    }

    pub fn ids_assigned(&self) -> usize {
        self.assignment.len()
    }
}

/// Runs the allocation pipeline against one cache store.
///
/// # Examples
///
/// ```no_run
/// use fileid_log::cache_store::FileCacheStore;
/// use fileid_log::generator::{Generator, GeneratorOptions};
/// use fileid_log::module_config::AllocatorConfig;
///
/// let config = AllocatorConfig::default();
/// let store = FileCacheStore::new(".file_id_cache.json");
/// let summary = Generator::new(&config, GeneratorOptions::default(), &store)
///     .run(false)
///     .unwrap();
/// println!("{} IDs", summary.ids_assigned());
/// ```
pub struct Generator<'a> {
    config: &'a AllocatorConfig,
    options: GeneratorOptions,
    store: &'a dyn CacheStore,
}

impl<'a> Generator<'a> {
    pub fn new(
        config: &'a AllocatorConfig,
        options: GeneratorOptions,
        store: &'a dyn CacheStore,
    ) -> Self {
        Self { config, options, store }
    }

    /// Executes one run.
    ///
    /// # Arguments
    ///
    /// * `force` - Ignore the cache and allocate from scratch
    ///
    /// # Returns
    ///
    /// The run summary. Only an unlistable source root or a failed header
    /// write are errors; overflows and unclassified files are reported in
    /// the summary and the log.
    pub fn run(&self, force: bool) -> Result<RunSummary, ToolError> {
        info!("Scanning {}", self.options.source.display());
        let scanned = source_scanner::scan(&self.options.source, &self.config.scan_settings())?;
        info!(
            "Found {} files with log calls ({} candidates examined)",
            scanned.files.len(),
            scanned.examined
        );

        if scanned.files.is_empty() {
            info!("Nothing to do: no source files use the log macros");
            return Ok(RunSummary::empty());
        }

        let mut summary = RunSummary::empty();
        summary.files_scanned = scanned.files.len();

        let config_hash = self.config.fingerprint();
        let cached = if force {
            info!("Forced regeneration, ignoring cache");
            None
        } else {
            self.store.lookup(&scanned.files, &config_hash)
        };

        let allocator = IdAllocator::new(self.config);
        match cached {
            Some(assignment) => {
                info!("File list unchanged, reusing cached IDs");
                let (overflows, unclassified) = allocator.diagnose(&scanned.files);
                summary.cache_hit = true;
                summary.assignment = assignment;
                summary.overflows = overflows;
                summary.unclassified = unclassified;
            }
            None => {
                let allocation = allocator.allocate(&scanned.files);
                let stored =
                    self.store.store(&scanned.files, &config_hash, &allocation.assignment);
                if let Err(e) = stored {
                    warn!("Could not update cache: {}", e);
                }
                summary.assignment = allocation.assignment;
                summary.overflows = allocation.overflows;
                summary.unclassified = allocation.unclassified;
            }
        }
        report_problems(&summary);

        let file_name = self
            .options
            .output
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| header_emitter::DEFAULT_OUTPUT.to_string());
        let text = header_emitter::render_header(&summary.assignment, self.config, &file_name);
        let outcome = header_emitter::write_header(&self.options.output, &text)?;
        match outcome {
            WriteOutcome::Written => info!("Wrote {}", self.options.output.display()),
            WriteOutcome::Unchanged => info!("{} is up to date", self.options.output.display()),
        }
        summary.write = Some(outcome);

        summary.stats = module_stats(&summary.assignment, self.config);
        log_stats(&summary.stats);
        Ok(summary)
    }
}

/// Overflows and unclassified files are reported on every run, cached or not.
fn report_problems(summary: &RunSummary) {
    for overflow in &summary.overflows {
        error!("{}", overflow);
    }
    for file in &summary.unclassified {
        warn!("No module range for {}, file left without an ID", file);
    }
}

fn log_stats(stats: &[ModuleStats]) {
    info!("Module usage:");
    for s in stats {
        info!(
            "  {:<10} {:>4}/{:<4} ({:5.1}%)  range {}-{}",
            s.module,
            s.files,
            s.capacity,
            s.usage_percent(),
            s.start,
            s.end
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache_store::MemoryCacheStore;
    use std::fs;

    fn write_source(root: &std::path::Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_run_then_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write_source(&src, "app/main.c", "void f(void) { TEST_LOG_INF_MSG(\"hi\"); }");
        write_source(&src, "app/idle.c", "void g(void) {}");

        let config = AllocatorConfig::default();
        let store = MemoryCacheStore::new();
        let options = GeneratorOptions {
            source: src,
            output: dir.path().join("include/log_file_id.h"),
        };
        let generator = Generator::new(&config, options.clone(), &store);

        let first = generator.run(false).unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.files_scanned, 1);
        assert_eq!(first.assignment["app/main.c"], 151);
        assert_eq!(first.write, Some(WriteOutcome::Written));

        let second = generator.run(false).unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.assignment, first.assignment);
        assert_eq!(second.write, Some(WriteOutcome::Unchanged));

        let forced = generator.run(true).unwrap();
        assert!(!forced.cache_hit);
        assert_eq!(forced.assignment, first.assignment);
    }

    #[test]
    fn test_cache_hit_reports_same_problems() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        for name in ["a", "b", "c"] {
            write_source(&src, &format!("small/{}.c", name), "LOG_ERR(\"x\");");
        }
        write_source(&src, "misc/x.c", "LOG_ERR(\"x\");");
        write_source(&src, "big/y.c", "LOG_ERR(\"y\");");

        let config = AllocatorConfig::with_modules(vec![
            crate::module_config::ModuleRange::new("small", 1, 2, ""),
            crate::module_config::ModuleRange::new("big", 10, 20, ""),
        ]);
        let store = MemoryCacheStore::new();
        let options = GeneratorOptions {
            source: src,
            output: dir.path().join("ids.h"),
        };
        let generator = Generator::new(&config, options, &store);

        let first = generator.run(false).unwrap();
        let second = generator.run(false).unwrap();
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.overflows.len(), 1);
        assert_eq!(first.unclassified, vec!["misc/x.c"]);
        assert_eq!(second.overflows, first.overflows);
        assert_eq!(second.unclassified, first.unclassified);
        assert_eq!(second.assignment, first.assignment);
    }

    #[test]
    fn test_empty_tree_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.h");
        let config = AllocatorConfig::default();
        let store = MemoryCacheStore::new();
        let options = GeneratorOptions {
            source: dir.path().to_path_buf(),
            output: output.clone(),
        };

        let summary = Generator::new(&config, options, &store).run(false).unwrap();
        assert_eq!(summary.write, None);
        assert_eq!(summary.ids_assigned(), 0);
        assert!(!output.exists());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = AllocatorConfig::default();
        let store = MemoryCacheStore::new();
        let options = GeneratorOptions {
            source: dir.path().join("absent"),
            output: dir.path().join("out.h"),
        };
        let err = Generator::new(&config, options, &store).run(false).unwrap_err();
        assert!(matches!(err, ToolError::SourceMissing { .. }));
    }
}
