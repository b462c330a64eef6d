//! `log_decoder`: turns captured firmware log tokens into readable lines.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgGroup, Parser, ValueEnum};
use log::{error, info, warn};

use fileid_log::error::ToolError;
use fileid_log::header_emitter::DEFAULT_OUTPUT;
use fileid_log::log_reader::{DecodeSummary, Framing, LogReader, LogRecord, StreamDecoder};
use fileid_log::{logging, module_config, FileTable};

/// Record framing of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FramingArg {
    /// One record per line.
    Line,
    /// Headers and parameters may span lines.
    Stream,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Line => Framing::Line,
            FramingArg::Stream => Framing::Stream,
        }
    }
}

/// Decode tokenized firmware logs.
#[derive(Parser, Debug)]
#[command(name = "log_decoder", version, about)]
#[command(group(ArgGroup::new("input").required(true).args(["file", "stdin"])))]
struct Cli {
    /// Captured log file.
    file: Option<PathBuf>,

    /// Read tokens from standard input as they arrive.
    #[arg(long)]
    stdin: bool,

    /// Generated header holding the file ID table.
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    table: PathBuf,

    /// Module range configuration, used to name modules of unlisted IDs.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// How records are delimited in the input.
    #[arg(long, value_enum, default_value_t = FramingArg::Line)]
    framing: FramingArg,

    /// Enable verbose (debug-level) output.
    #[arg(short, long)]
    verbose: bool,
}

fn load_table(path: &Path, config: Option<&Path>) -> FileTable {
    let ranges = module_config::load_or_default(config).modules;
    match fs::read_to_string(path) {
        Ok(text) => {
            let table = FileTable::parse_header(&text, ranges);
            info!("Loaded {} file IDs from {}", table.len(), path.display());
            table
        }
        Err(e) => {
            warn!(
                "Cannot read file table {}: {}; IDs will decode as unknown",
                path.display(),
                e
            );
            FileTable::new(ranges)
        }
    }
}

/// Writes one decoded line and counts it.
fn emit(
    out: &mut impl Write,
    record: &LogRecord,
    table: &FileTable,
    summary: &mut DecodeSummary,
) -> Result<(), ToolError> {
    summary.record(record);
    writeln!(out, "{}", record.format(table)).map_err(ToolError::Output)
}

/// Decodes stdin incrementally, flushing after every record so a piped
/// live capture shows up as it is produced.
fn decode_stdin(
    table: &FileTable,
    framing: Framing,
    out: &mut impl Write,
) -> Result<DecodeSummary, ToolError> {
    let mut summary = DecodeSummary::default();
    for record in StreamDecoder::new(io::stdin().lock(), framing) {
        let record = record.map_err(|e| ToolError::Input {
            path: PathBuf::from("<stdin>"),
            source: e,
        })?;
        emit(out, &record, table, &mut summary)?;
        out.flush().map_err(ToolError::Output)?;
    }
    Ok(summary)
}

/// Decodes a capture file. Only failing to read it is fatal; bytes that are
/// not UTF-8 are replaced and the surrounding tokens still decode.
fn decode_file(
    path: &Path,
    table: &FileTable,
    framing: Framing,
    out: &mut impl Write,
) -> Result<DecodeSummary, ToolError> {
    let bytes = fs::read(path).map_err(|e| ToolError::Input {
        path: path.to_path_buf(),
        source: e,
    })?;
    let text = String::from_utf8_lossy(&bytes);

    let mut summary = DecodeSummary::default();
    for record in LogReader::new(&text, framing) {
        emit(out, &record, table, &mut summary)?;
    }
    Ok(summary)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let table = load_table(&cli.table, cli.config.as_deref());
    let framing = Framing::from(cli.framing);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let result = match &cli.file {
        Some(path) if !cli.stdin => decode_file(path, &table, framing, &mut out),
        _ => decode_stdin(&table, framing, &mut out),
    }
    .and_then(|summary| {
        writeln!(out, "{}", summary)
            .and_then(|_| out.flush())
            .map_err(ToolError::Output)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = out.flush();
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
