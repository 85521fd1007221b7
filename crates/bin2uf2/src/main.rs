use bin2uf2_core::{DEFAULT_CHUNK_SIZE, EncodeOptions, boards::BoardIter};
use clap::{Args, Parser, ValueEnum};
use env_logger::Env;
use log::*;

use std::io::Write;

use crate::{
    convert::{convert, post_build},
    info::info,
};

mod convert;
mod info;
mod reporter;

#[derive(Parser, Debug)]
enum Command {
    /// Convert a firmware binary to a UF2 file on disk
    #[command(arg_required_else_help = true)]
    Convert {
        /// Input binary file
        input: String,

        /// Output UF2 file
        output: String,

        #[clap(flatten)]
        target: TargetArgs,
    },
    /// Convert a freshly built binary into <project-dir>/build/<token>.uf2
    #[command(arg_required_else_help = true)]
    PostBuild {
        /// Input binary file
        input: String,

        /// Project root, the UF2 file is written to its build directory
        #[clap(short, long)]
        project_dir: String,

        /// File name for the UF2 file, defaults to the current unix time
        #[clap(short, long)]
        token: Option<String>,

        #[clap(flatten)]
        target: TargetArgs,
    },
    /// Print the blocks summary of a UF2 file
    #[command(arg_required_else_help = true)]
    Info {
        /// Input UF2 file
        input: String,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Board profile supplying family id, base address and chunk size (samd21, rp2040, etc.)
    #[clap(short, long, value_parser = board_parser)]
    board: Option<String>,

    /// Family id, overrides the board's
    #[clap(short, long, value_parser = number_parser)]
    family: Option<u32>,

    /// Flash address of the first byte, overrides the board's
    #[clap(long, value_parser = number_parser)]
    base: Option<u32>,

    /// Payload bytes per block, overrides the board's
    #[clap(short, long, value_parser = chunk_size_parser)]
    chunk_size: Option<usize>,
}

impl TargetArgs {
    fn encode_options(&self) -> Result<EncodeOptions, String> {
        let defaults = match &self.board {
            Some(board) => {
                let board = BoardIter::find_by_name(board)
                    .ok_or_else(|| format!("Unknown board '{}'", board))?;
                EncodeOptions::for_board(board.as_ref())
            }
            None => EncodeOptions::new(
                DEFAULT_CHUNK_SIZE,
                None,
                self.base
                    .ok_or("Either --board or --base must be given")?,
            ),
        };

        Ok(EncodeOptions {
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size),
            family_id: self.family.or(defaults.family_id),
            start_address: self.base.unwrap_or(defaults.start_address),
        })
    }
}

fn board_parser(s: &str) -> Result<String, String> {
    if let Some(board) = BoardIter::find_by_name(s) {
        Ok(board.board_name())
    } else {
        Err(format!("Unknown board '{}'", s))
    }
}

fn number_parser(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|err| format!("'{}' is not a 32 bit number: {}", s, err))
}

fn chunk_size_parser(s: &str) -> Result<usize, String> {
    match number_parser(s)? {
        size @ 1..=476 => Ok(size as usize),
        size => Err(format!("chunk size must be between 1 and 476, got {}", size)),
    }
}

#[derive(Parser, Debug, Default)]
#[clap(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Set the logging verbosity
    #[clap(short, long, value_enum, global = true, default_value_t = LogLevel::Info)]
    verbose: LogLevel,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default())
        .filter_level(cli.verbose.into())
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let level = record.level();
            if level == Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "{}: {}", record.level(), record.args())
            }
        })
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => return Ok(()),
    };

    match command {
        Command::Convert {
            input,
            output,
            target,
        } => convert(&input, &output, &target.encode_options()?),
        Command::PostBuild {
            input,
            project_dir,
            token,
            target,
        } => post_build(&input, &project_dir, token, &target.encode_options()?),
        Command::Info { input } => info(&input),
    }
}
