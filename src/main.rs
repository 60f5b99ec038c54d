use anyhow::Result;
use fim::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
