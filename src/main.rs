use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncReadExt, BufReader};

mod app;
mod cli;

use app::App;
use chat_handoff::config::{LlmProvider, Settings};
use chat_handoff::extract::{detect, truncate_content};
use cli::{Cli, Commands};

const PREVIEW_CHARS: usize = 100;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Only warnings and errors unless asked otherwise
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Detection needs neither settings nor storage
    if let Commands::Detect { url } = &cli.command {
        println!("{}", detect(url));
        return Ok(());
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("reading settings from {}", path.display()))?,
        None => Settings::load(),
    };
    let app = App::new(settings).await?;

    match cli.command {
        Commands::Detect { .. } => {}

        Commands::Extract { url, html, format } => {
            let html = read_html(html.as_deref()).await?;
            print!("{}", app.extract(&url, &html, format).await?);
        }

        Commands::Summarize {
            url,
            html,
            smart,
            format,
        } => {
            let html = read_html(html.as_deref()).await?;
            let summary = app.summarize(&url, &html, smart, format).await?;
            eprintln!("Summary by {}", summary.source);
            println!("{}", summary.text);
        }

        Commands::Prompt {
            url,
            html,
            smart,
            format,
        } => {
            let html = read_html(html.as_deref()).await?;
            println!("{}", app.prompt(&url, &html, smart, format)?);
        }

        Commands::Watch { url, input } => {
            let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
                Some(path) => Box::new(BufReader::new(
                    tokio::fs::File::open(&path)
                        .await
                        .with_context(|| format!("opening {}", path.display()))?,
                )),
                None => Box::new(BufReader::new(tokio::io::stdin())),
            };

            match app.watch(&url, reader).await? {
                Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
                None => eprintln!("No rate limit detected"),
            }
        }

        Commands::History {
            limit,
            delete,
            clear,
        } => {
            if clear {
                app.clear_history().await?;
                println!("History cleared");
            } else if let Some(id) = delete {
                if app.delete_history(id).await? {
                    println!("Deleted entry {}", id);
                } else {
                    println!("No entry {}", id);
                }
            } else {
                for entry in app.history(limit).await? {
                    println!(
                        "#{} {} {} ({} messages, {})",
                        entry.id,
                        entry.saved_at.format("%Y-%m-%d %H:%M"),
                        entry.conversation.platform,
                        entry.conversation.total_messages(),
                        entry.source
                    );
                    let preview = truncate_content(&entry.summary, PREVIEW_CHARS);
                    println!("    {}", preview.replace('\n', " "));
                }
            }
        }

        Commands::Check { provider } => {
            let report = app.check(provider.map(LlmProvider::from)).await?;
            println!("{}", report);
            if let Some(org) = report.organization {
                println!("Organization: {}", org);
            }
        }

        Commands::Stats => {
            for stat in app.stats().await? {
                println!(
                    "{:<10} {:<12} {:>5}  last {}",
                    stat.action,
                    stat.key,
                    stat.count,
                    stat.last_used.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}

async fn read_html(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut html = String::new();
            tokio::io::stdin()
                .read_to_string(&mut html)
                .await
                .context("reading page from stdin")?;
            Ok(html)
        }
    }
}
