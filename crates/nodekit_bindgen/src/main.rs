//! nodekit-sigdump
//!
//! Prints the JNI signature of every method declared for a class.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nodekit-sigdump", version, about = "Dump native method signatures")]
struct Cli {
    /// Class name, dotted or `/`-separated (e.g. com.node.sample.MainActivity)
    class: Option<String>,

    /// Also print the exported symbol of each method
    #[arg(long)]
    symbols: bool,

    /// List declared classes and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list {
        for interface in nodekit_bindgen::registered() {
            println!("{}", interface.java_name());
        }
        return Ok(());
    }

    let class = cli.class.context("missing class name (or pass --list)")?;
    let interface = nodekit_bindgen::lookup(&class)?;
    interface.validate()?;

    for line in interface.dump(cli.symbols) {
        println!("{line}");
    }
    Ok(())
}
