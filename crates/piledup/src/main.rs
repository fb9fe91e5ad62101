mod canvas;
mod cli;
mod paths;
mod plan;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
