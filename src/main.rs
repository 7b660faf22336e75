//! Strand 命令行入口
//!
//! ```bash
//! strand --catalog data/sessions.json "Recommend sessions for a developer interested in AI"
//! echo "weather in Austin" | strand --json
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use strand::{load_config, observability, AgentBuilder};

/// Strand conference assistant
#[derive(Parser, Debug)]
#[command(name = "strand")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Alternate configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Session catalog (JSON or SQLite), overrides catalog.path
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Print the full response as JSON
    #[arg(long)]
    json: bool,

    /// The request; read from stdin when absent
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();
    let cli = Cli::parse();

    let query = if cli.query.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read query from stdin")?;
        buf
    } else {
        cli.query.join(" ")
    };
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("empty query: pass it as arguments or on stdin");
    }

    let cfg = load_config(cli.config).context("Failed to load config")?;
    let mut builder = AgentBuilder::new(cfg);
    if let Some(path) = cli.catalog {
        builder = builder.with_catalog_path(path);
    }
    let agent = builder.build().context("Failed to create agent")?;

    let response = agent.handle(query).await;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to encode response")?
        );
    } else {
        println!("{}", response.answer);
    }
    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
