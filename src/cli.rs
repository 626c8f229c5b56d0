use std::path::PathBuf;

use clap::{Parser, Subcommand};

use chat_handoff::render::OutputFormat;

/// Carry ChatGPT and Claude conversations over to a fresh session.
///
/// Pages are read as saved HTML snapshots, from a file or stdin.
#[derive(Parser, Debug)]
#[command(name = "chat-handoff")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long, env = "CHAT_HANDOFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print which chat platform a URL belongs to
    Detect { url: String },

    /// Render the conversation on a page
    Extract {
        /// Address the snapshot was taken from
        #[arg(short, long)]
        url: String,

        /// HTML snapshot (stdin when omitted)
        #[arg(long)]
        html: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// Summarize the conversation on a page and save it to history
    Summarize {
        #[arg(short, long)]
        url: String,

        #[arg(long)]
        html: Option<PathBuf>,

        /// Structured summary in the requested format
        #[arg(long)]
        smart: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// Watch added page content for rate-limit notices, one HTML fragment
    /// per line
    Watch {
        #[arg(short, long)]
        url: String,

        /// Mutation feed (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show the prompt a summary request would send
    Prompt {
        #[arg(short, long)]
        url: String,

        #[arg(long)]
        html: Option<PathBuf>,

        #[arg(long)]
        smart: bool,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
    },

    /// List saved summaries
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Delete one entry by id
        #[arg(long, conflicts_with = "clear")]
        delete: Option<i64>,

        /// Delete every entry
        #[arg(long)]
        clear: bool,
    },

    /// Test the connection to a summary provider
    Check {
        /// Provider to test (the preferred one when omitted)
        #[arg(value_parser = ["ollama", "openai", "anthropic"])]
        provider: Option<String>,
    },

    /// Show usage counters
    Stats,
}
