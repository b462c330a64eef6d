//! # fileid_log
//!
//! Host-side tooling for compact firmware logging. Each log call site in the
//! firmware is identified by a numeric file ID plus its line, level and
//! parameter count, packed into a single 32-bit header word. Only that header
//! and the raw parameter words leave the device.
//!
//! This crate provides both ends of that contract:
//!
//! * **ID allocation**: scan a source tree, assign every file that logs a
//!   stable ID inside its module's range, cache the result and emit a C header
//! * **Decoding**: turn a captured stream of hex words back into readable lines
//!   using the same ID table
//!
//! ## Main Components
//!
//! * `source_scanner`: finds files that invoke the log macros
//! * `id_allocator`: assigns IDs within configured module ranges
//! * `cache_store`: reuses the previous assignment while the file list is unchanged
//! * `header_codec`: bit layout of the 32-bit record header
//! * `header_emitter`: renders and atomically writes the generated header
//! * `file_table`: ID to file lookup used by the decoder
//! * `log_reader`: tolerant decoder for captured token streams
//! * `generator`: the `gen_file_ids` pipeline
//!
//! ## Quick Start
//!
//! ```
//! use fileid_log::{FileTable, Framing, IdAllocator, LogReader};
//! use fileid_log::module_config::{AllocatorConfig, ModuleRange};
//!
//! let config = AllocatorConfig::with_modules(vec![
//!     ModuleRange::new("drivers", 51, 150, "Driver layer"),
//! ]);
//! let files = vec!["src/drivers/uart.c".to_string(), "src/drivers/spi.c".to_string()];
//! let allocation = IdAllocator::new(&config).allocate(&files);
//! let table = FileTable::from_assignment(&allocation.assignment, &config);
//!
//! let captured = "0x03302A04 0x0000002A";
//! for record in LogReader::new(captured, Framing::Line) {
//!     assert_eq!(
//!         record.format(&table),
//!         "[ERR][drivers] 51:42 (src/drivers/spi.c) - Params: [0x0000002A (42)]"
//!     );
//! }
//! ```

pub mod cache_store;
pub mod error;
pub mod file_table;
pub mod generator;
pub mod header_codec;
pub mod header_emitter;
pub mod id_allocator;
pub mod log_reader;
pub mod logging;
pub mod module_config;
pub mod source_scanner;

pub use cache_store::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use error::{AllocationError, CacheError, CodecError, ConfigError, ToolError};
pub use file_table::FileTable;
pub use generator::{Generator, GeneratorOptions, RunSummary};
pub use header_codec::{LogHeader, LogLevel};
pub use id_allocator::{Allocation, IdAllocator, IdAssignment};
pub use log_reader::{DecodeSummary, Framing, LogReader, LogRecord, StreamDecoder};
