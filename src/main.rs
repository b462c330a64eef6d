//! `gen_file_ids`: assigns file IDs to every source file that logs and writes
//! the generated header the firmware compiles against.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use fileid_log::cache_store::{FileCacheStore, DEFAULT_CACHE_FILE};
use fileid_log::generator::{Generator, GeneratorOptions};
use fileid_log::header_emitter::DEFAULT_OUTPUT;
use fileid_log::{logging, module_config};

/// Generate stable file IDs for the logging system.
#[derive(Parser, Debug)]
#[command(name = "gen_file_ids", version, about)]
struct Cli {
    /// Module range configuration (TOML). Built-in ranges are used if absent.
    #[arg(short, long, default_value = "tools/file_id_config.toml")]
    config: PathBuf,

    /// Generated header path.
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Source tree to scan.
    #[arg(short, long, default_value = "src/")]
    source: PathBuf,

    /// Cache file.
    #[arg(long, default_value = DEFAULT_CACHE_FILE)]
    cache: PathBuf,

    /// Ignore the cache and regenerate every ID.
    #[arg(short, long)]
    force: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let config = module_config::load_or_default(Some(&cli.config));
    let store = FileCacheStore::new(cli.cache);
    let options = GeneratorOptions {
        source: cli.source,
        output: cli.output,
    };

    match Generator::new(&config, options, &store).run(cli.force) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
