//! FML CLI - inspect, convert and query field buffers.

mod commands;
mod observability;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fml_core::{ExportMode, Narrow, Wide, Width};
use observability::{LogFormat, init_tracing};
use std::path::PathBuf;

/// FML - self-describing field buffers.
#[derive(Parser)]
#[command(name = "fml")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    /// Field table file to load in addition to the environment's (repeatable)
    #[arg(long = "tables", value_name = "PATH", global = true)]
    tables: Vec<PathBuf>,

    /// Use 16-bit buffers instead of 32-bit ones
    #[arg(long, global = true)]
    narrow: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an exported buffer in the text dump format
    Print {
        /// Exported buffer (binary or text-safe)
        file: PathBuf,
    },

    /// Read a text dump and export the buffer it describes
    Extread {
        /// Text dump to read
        file: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export in text-safe (base64) form
        #[arg(long)]
        text_safe: bool,
    },

    /// Re-export a buffer in another transport mode
    Convert {
        /// Exported buffer (binary or text-safe)
        file: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Target mode (binary or text-safe)
        #[arg(long, default_value = "binary")]
        to: ExportMode,
    },

    /// Evaluate an expression against a buffer
    Eval {
        /// Exported buffer (binary or text-safe)
        file: PathBuf,

        /// Expression source
        #[arg(short, long)]
        expr: String,

        /// Evaluate as an arithmetic formula instead of a predicate
        #[arg(long)]
        arith: bool,
    },

    /// List the fields known to the catalog
    Fields {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

fn run<W: Width>(cli: Cli) -> Result<()> {
    commands::register_tables::<W>(&cli.tables)?;

    match cli.command {
        Commands::Print { file } => commands::print::run::<W>(&file),
        Commands::Extread {
            file,
            output,
            text_safe,
        } => commands::extread::run::<W>(&file, output.as_deref(), text_safe),
        Commands::Convert { file, output, to } => {
            commands::convert::run::<W>(&file, &output, to)
        }
        Commands::Eval { file, expr, arith } => commands::eval::run::<W>(&file, &expr, arith),
        Commands::Fields { json } => commands::fields::run::<W>(json),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose)?;

    if cli.narrow {
        run::<Narrow>(cli)
    } else {
        run::<Wide>(cli)
    }
}
