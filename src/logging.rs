use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use crate::error::ToolError;

/// Line layout for diagnostics written by the command-line tools.
pub const LOG_PATTERN: &str = "{h({l:<5})} {t} - {m}{n}";

/// Builds the console logging configuration.
///
/// Diagnostics go to stderr so that decoded output on stdout stays clean.
pub fn console_config(verbose: bool) -> Result<Config, ToolError> {
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| ToolError::Logging(e.to_string()))
}

/// Installs the console logger. May only succeed once per process.
pub fn init(verbose: bool) -> Result<(), ToolError> {
    let config = console_config(verbose)?;
    log4rs::init_config(config)
        .map(|_| ())
        .map_err(|e| ToolError::Logging(e.to_string()))
}
