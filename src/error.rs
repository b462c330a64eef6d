//! Error types for the allocator, cache, codec and command-line tools.
//!
//! Only [`ToolError`] is fatal. Everything else is recovered where it is
//! raised: configuration errors fall back to defaults, cache errors become
//! cache misses, and allocation errors are reported per module.

use std::path::PathBuf;

/// Errors raised while loading or validating a module configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Two module ranges share at least one ID.
    #[error("module ranges '{first}' and '{second}' overlap")]
    Overlap {
        /// The module listed first in the configuration.
        first: String,
        /// The module it overlaps with.
        second: String,
    },
}

/// Per-module allocation failure. Reported, never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// A module has more qualifying files than its range has IDs.
    #[error("module '{module}' has {files} files but only {capacity} IDs available ({start}-{end})")]
    Overflow {
        /// Name of the overflowing module.
        module: String,
        /// Number of files classified into the module.
        files: usize,
        /// Number of IDs in the module's range.
        capacity: usize,
        /// First ID of the range.
        start: u16,
        /// Last ID of the range (inclusive).
        end: u16,
    },
}

/// Errors raised by the cache store. Callers treat them as cache misses.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache file could not be read or written.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// Path of the cache file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The cache record could not be serialized or deserialized.
    #[error("cache serialization error: {reason}")]
    Serialization {
        /// Description of the failure.
        reason: String,
    },
}

/// Caller errors when building a log header.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Identity does not fit in the 12-bit identity field.
    #[error("identity {0} does not fit in 12 bits (0-4095)")]
    IdentityOutOfRange(u32),

    /// Line number does not fit in the 12-bit line field.
    #[error("line {0} does not fit in 12 bits (0-4095)")]
    LineOutOfRange(u32),

    /// Parameter count does not fit in the 6-bit count field.
    #[error("parameter count {0} does not fit in 6 bits (0-63)")]
    ParamCountOutOfRange(u32),

    /// The header declares a different number of parameters than supplied.
    #[error("header declares {declared} parameters but {supplied} were supplied")]
    ParamCountMismatch {
        /// Count stored in the header.
        declared: u8,
        /// Number of parameter words actually supplied.
        supplied: usize,
    },
}

/// Unrecoverable failures that terminate a tool with a non-zero status.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// The source root to scan does not exist or cannot be listed.
    #[error("cannot scan source directory {path}: {source}")]
    SourceMissing {
        /// The scan root.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The generated header could not be written.
    #[error("failed to write {path}: {source}")]
    Emit {
        /// Destination of the generated header.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A decoder input file could not be opened or read.
    #[error("cannot read input {path}: {source}")]
    Input {
        /// The input path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Decoded output could not be written, e.g. a closed pipe.
    #[error("failed to write decoded output: {0}")]
    Output(std::io::Error),

    /// Logging could not be initialized.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}
