//! CLI tool for inspecting and maintaining a shared mailbox store
//!
//! Operates on the Redis or SQL backend named by the same configuration the
//! server uses. (The memory backend lives inside the server process and
//! cannot be reached from here.)
//!
//! # Usage
//!
//! ```bash
//! # Count pending mails
//! TEMPMAIL__STORAGE__MODE=redis TEMPMAIL__STORAGE__REDIS__ADDR=localhost:6379 mailbox-admin count
//!
//! # Check an inbox without consuming
//! mailbox-admin --config tempmail.toml has box@tmp.example.com
//!
//! # Consume the latest mail of an inbox
//! mailbox-admin --config tempmail.toml consume box@tmp.example.com
//!
//! # Drop every pending mail
//! mailbox-admin --config tempmail.toml clear
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tempmail_rs::config::Config;
use tempmail_rs::storage::{StorageMode, StorageSelector};

#[derive(Parser)]
#[command(name = "mailbox-admin")]
#[command(about = "Inspect and maintain disposable mailboxes", long_about = None)]
struct Cli {
    /// Optional TOML configuration file (TEMPMAIL__* variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Number of pending mails across all inboxes
    Count,
    /// Check whether an inbox has pending mail
    Has {
        /// Inbox address
        address: String,
    },
    /// Consume and print the latest mail of an inbox
    Consume {
        /// Inbox address
        address: String,
    },
    /// Mark every pending mail consumed
    Clear,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;
    let selector = StorageSelector::from_config(&config.storage).await?;

    if selector.mode() == StorageMode::Memory {
        eprintln!("Error: storage mode is memory; mailboxes only exist inside the server process");
        std::process::exit(1);
    }

    let store = selector.store();

    match cli.command {
        Commands::Count => {
            println!("{}", store.count().await?);
        }
        Commands::Has { address } => {
            if store.has_mail(&address).await? {
                println!("✓ {} has pending mail", address);
            } else {
                println!("{} is empty", address);
            }
        }
        Commands::Consume { address } => match store.consume_latest(&address).await? {
            Some(mail) => println!("{}", serde_json::to_string_pretty(&mail)?),
            None => println!("{} is empty", address),
        },
        Commands::Clear => {
            store.clear_all().await?;
            println!("✓ All pending mail cleared");
        }
    }

    Ok(())
}
