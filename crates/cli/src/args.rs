//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// digest-press: turns new videos and podcast episodes into a magazine-style newsletter
#[derive(Parser, Debug)]
#[command(name = "digest-press")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover new items, rewrite them and send one digest
    Run(RunArgs),

    /// Turn a single podcast episode into a digest right away
    Episode(EpisodeArgs),

    /// One-shot rewrite of a transcript
    Rewrite(RewriteArgs),

    /// Manage the source catalog
    Sources(SourcesArgs),

    /// Manage the instruction template
    Template(TemplateArgs),

    /// Inspect or reset the processed-item ledger
    Ledger(LedgerArgs),

    /// Browse sent newsletters
    Archive(ArchiveArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Validate configuration and show status
    Doctor(DoctorArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Write the digest into this directory instead of mailing it
    #[arg(long)]
    pub outbox: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EpisodeArgs {
    /// Episode URL or 24-character episode id
    pub episode: String,

    /// Write the digest into this directory instead of mailing it
    #[arg(long)]
    pub outbox: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RewriteArgs {
    /// Title of the video or episode
    #[arg(long)]
    pub title: String,

    /// Creator name
    #[arg(long)]
    pub source: String,

    /// Link to the original
    #[arg(long, default_value = "")]
    pub url: String,

    /// Description or show notes
    #[arg(long, default_value = "")]
    pub description: String,

    /// Transcript text
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub text: Option<String>,

    /// File containing the transcript (use - for stdin)
    #[arg(long, conflicts_with = "text")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SourcesArgs {
    #[command(subcommand)]
    pub command: SourcesCommands,
}

#[derive(Subcommand, Debug)]
pub enum SourcesCommands {
    /// List configured sources
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a channel or podcast by URL, @handle or id
    Add {
        /// Channel URL, @handle, UC… channel id, podcast URL or podcast id
        input: String,
    },

    /// Remove a source by handle
    Remove {
        /// Handle as shown by `sources list`
        handle: String,
    },
}

#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommands,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Print the active template
    Show,

    /// Replace the template with the contents of a file
    Set {
        /// Template file (use - for stdin)
        #[arg(long)]
        file: PathBuf,
    },

    /// Go back to the built-in template
    Reset,

    /// Check the active template for unknown placeholders
    Validate,
}

#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommands,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommands {
    /// List processed items, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Forget every processed item so they can be picked up again
    Clear {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    #[command(subcommand)]
    pub command: ArchiveCommands,
}

#[derive(Subcommand, Debug)]
pub enum ArchiveCommands {
    /// List sent newsletters, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Init {
        /// Path to write config file
        #[arg(long, default_value = "./config.toml")]
        path: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
