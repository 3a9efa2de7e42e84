mod cli;
mod controls;
mod export;
mod paint;
mod paths;
mod run;
mod window;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli)
}
