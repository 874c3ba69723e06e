use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use cli::handlers::{BenchOptions, Family, handle_bench, handle_list};
use console::Style;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the specializations built into the reference backend
    List {
        /// Only list one kernel family
        #[arg(long, value_enum)]
        family: Option<Family>,
        /// Print the traits as JSON
        #[arg(long)]
        json: bool,
    },
    /// Time one dispatch on the reference backend
    Bench(BenchOptions),
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::List {
            family,
            json,
        }) => handle_list(family, json).map(|_| ExitCode::SUCCESS),
        Some(Commands::Bench(options)) => handle_bench(&options),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help().map(|_| ExitCode::SUCCESS).map_err(Into::into)
        },
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{} {error}", Style::new().red().bold().apply_to("error:"));
            ExitCode::FAILURE
        },
    }
}
