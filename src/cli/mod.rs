pub mod commands;

use clap::{Parser, Subcommand};

use crate::cache::DEFAULT_HISTORY_LIMIT;

#[derive(Parser)]
#[command(name = "tributary")]
#[command(about = "Web content acquisition with static and rendered extraction", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape a single URL
    Scrape {
        /// URL to scrape
        url: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scrape several URLs for a conversation
    Gather {
        /// Conversation the results are cached under
        #[arg(short, long, default_value = "cli")]
        conversation: String,

        /// URLs to scrape
        #[arg(required = true)]
        urls: Vec<String>,

        /// Print the merged context instead of per-URL summaries
        #[arg(long)]
        context: bool,
    },
    /// Show recent chat history for a conversation
    History {
        /// Conversation identifier
        conversation: String,

        /// Number of entries to show
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Delete expired cache entries
    Purge,
}
