use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

/// Where the text to analyse comes from. Reads stdin when neither is given.
#[derive(ClapArgs, Debug, Clone)]
pub struct SourceArgs {
    /// Text passed inline
    #[clap(short, long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read text from a file
    #[clap(short, long)]
    pub file: Option<PathBuf>,
}

impl SourceArgs {
    pub fn read(&self) -> anyhow::Result<String> {
        if let Some(content) = &self.content {
            return Ok(content.clone());
        }

        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }

        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;

        if buf.is_empty() {
            bail!("no input: pass --content, --file or pipe text to stdin");
        }

        Ok(buf)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the http api
    Daemon {},

    /// Find messages that duplicate the given text
    Duplicates {
        #[command(flatten)]
        source: SourceArgs,

        /// JSON array of messages to compare against
        #[clap(long)]
        candidates: PathBuf,
    },

    /// Rank messages by topical relevance to the given text
    Related {
        #[command(flatten)]
        source: SourceArgs,

        /// JSON array of messages to rank
        #[clap(long)]
        candidates: PathBuf,
    },

    /// Suggest up to 5 tags for the given text
    Tags {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Render markdown to sanitized html
    Render {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Validate and sanitize a JSON message draft
    Sanitize {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the lexical similarity (0-100) of two strings
    Lexical { a: String, b: String },
}
