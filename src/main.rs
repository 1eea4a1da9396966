use clap::Parser;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tributary::app::AppContext;
use tributary::cli::{commands, Cli, Commands};
use tributary::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let ctx = AppContext::new(&config)?;

    let outcome = tokio::select! {
        result = run(&ctx, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down");
            Ok(())
        }
    };

    ctx.shutdown().await;
    outcome
}

async fn run(ctx: &AppContext, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Scrape { url, json } => {
            commands::scrape(ctx, &url, json).await?;
        }
        Commands::Gather {
            conversation,
            urls,
            context,
        } => {
            commands::gather(ctx, &conversation, &urls, context).await?;
        }
        Commands::History {
            conversation,
            limit,
        } => {
            commands::history(ctx, &conversation, limit).await?;
        }
        Commands::Purge => {
            commands::purge(ctx).await?;
        }
    }

    Ok(())
}
