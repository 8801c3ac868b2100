use super::Parser;
use clap::{Args, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "versegate", about = "Partnership status and session client")]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and persist the session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "VERSEGATE_PASSWORD")]
        password: String,
    },
    /// Drop the persisted session.
    Logout,
    /// Check whether a user already supports a passage.
    Status {
        #[command(flatten)]
        scope: ScopeArgs,
        #[arg(long)]
        user: Option<String>,
    },
    /// Start a donation for a passage and print the payment intent.
    Donate {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Minor currency units.
        #[arg(long)]
        amount: u64,
        #[arg(long, default_value = "usd")]
        currency: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// verse, chapter or book
    #[arg(long, default_value = "verse")]
    pub kind: String,
    #[arg(long, default_value = "eng")]
    pub lang: String,
    #[arg(long, default_value = "kjv")]
    pub source: String,
    #[arg(long)]
    pub book: u32,
    #[arg(long, default_value_t = 1)]
    pub chapter: u32,
    #[arg(long)]
    pub verse: Option<u32>,
}
