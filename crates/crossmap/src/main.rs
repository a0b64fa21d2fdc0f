mod cli;
mod run;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Command::Run(args) => run::run(args),
        Command::Check(args) => run::check(args),
    }
}
