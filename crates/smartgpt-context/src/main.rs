//! SmartGPT operator shell
//!
//! `smartgpt [--remember <text>]... [query]...`
//!
//! Each `--remember` stores its text in memory; every other argument is a
//! query whose context lines are printed.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use smartgpt_common::{DEFAULT_RETRIEVE_K, VERSION};
use smartgpt_context::{Context, ContextConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting SmartGPT v{}", VERSION);

    // Load configuration
    let config = ContextConfig::load()?;
    info!(
        "Embedding: dim={}, endpoint={:?}; memory: {:?}; index: {:?}; graph enabled: {}",
        config.embedding.dimension,
        config.embedding.endpoint,
        config.memory.path,
        config.index.path,
        config.graph.enabled
    );

    let context = Context::init(&config).await;
    info!("Retrieving with the {} backend", context.backend());

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--remember" {
            let Some(text) = args.next() else {
                anyhow::bail!("--remember needs a text argument");
            };
            let id = context.remember(&text).await?;
            println!("remembered {}", id);
            continue;
        }

        let lines = context.retrieve(&arg, DEFAULT_RETRIEVE_K).await?;
        println!("## {}", arg);
        for line in lines {
            println!("{}\n", line);
        }
    }

    Ok(())
}
