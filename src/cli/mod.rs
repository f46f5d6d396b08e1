//! Command-line interface.

mod commands;

use clap::{Parser, Subcommand};

/// pricehound - discovers shop search templates and extracts product listings
#[derive(Parser)]
#[command(name = "pricehound")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run discovery and extraction under the supervisor with the health API
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Run a single template discovery cycle
    Discover,

    /// Run a single product extraction cycle
    Extract,

    /// Import a {"category": ["product", ...]} JSON catalog
    Import {
        /// Path to the catalog file
        path: String,
    },

    /// Show catalog, template and ledger totals
    #[command(alias = "st")]
    Status,

    /// Manage search templates
    Templates {
        #[command(subcommand)]
        command: TemplateCommands,
    },

    /// Create default config file
    #[command(alias = "--init")]
    InitConfig,
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List templates, optionally for one category
    #[command(alias = "ls")]
    List {
        /// Category name
        #[arg(long)]
        category: Option<String>,
    },
    /// Stop extracting with a template
    Disable {
        /// Template ID
        id: i32,
    },
    /// Resume extracting with a template
    Enable {
        /// Template ID
        id: i32,
    },
}

pub use commands::*;
