use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::paths::Scope;

/// strata - read and edit layered settings files
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file to use as a layer, most specific first (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    pub files: Vec<PathBuf>,

    /// Organization name for the conventional file locations
    #[arg(long, requires = "app")]
    pub org: Option<String>,

    /// Application name for the conventional file locations
    #[arg(long, requires = "org")]
    pub app: Option<String>,

    /// Use only system-wide locations
    #[arg(long)]
    pub system: bool,

    /// File extension for the conventional file locations
    #[arg(long, default_value = "ini")]
    pub format: String,

    /// Read only the first layer
    #[arg(long)]
    pub no_fallback: bool,

    /// Rewrite files in place instead of replacing them atomically
    #[arg(long)]
    pub in_place: bool,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn scope(&self) -> Scope {
        if self.system {
            Scope::System
        } else {
            Scope::User
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the value of KEY
    Get { key: String },

    /// Set KEY to VALUE in the first layer
    Set {
        key: String,
        value: String,
        /// How to interpret VALUE
        #[arg(long = "type", value_enum, default_value_t = ValueType::Auto)]
        kind: ValueType,
    },

    /// Remove KEY and everything below it
    Remove { key: String },

    /// List every key below PREFIX
    Keys { prefix: Option<String> },

    /// List the groups directly below PREFIX
    Groups { prefix: Option<String> },

    /// Print every visible key and value
    Dump {
        /// Print a JSON object instead of key = value lines
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    /// Whether the command edits the first layer.
    pub fn mutates(&self) -> bool {
        matches!(self, Command::Set { .. } | Command::Remove { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    /// Infer the type the way settings files do
    Auto,
    String,
    Int,
    Float,
    Bool,
    /// Comma-separated list of strings
    List,
}
