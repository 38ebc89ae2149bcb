use anyhow::Result;
use clap::Parser;
use pacm_get::cli::PacmGetCli;

fn main() {
    if let Err(e) = real_main() {
        eprintln!("pacm-get error: {:#}", e);
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let cli = PacmGetCli::parse();
    cli.run()
}
