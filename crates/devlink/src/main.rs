mod cmd;
mod exit;
mod hexfmt;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::LoggingArgs;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "devlink", version, about = "Instrument link endpoint and frame tools")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    cli.logging.init();

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
