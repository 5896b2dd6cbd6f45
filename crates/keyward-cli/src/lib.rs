use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "keyward", version, about = "keyward SSH key manager")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Extra config file applied over the user and project config.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory searched for `.keyward.toml`, the current one by default.
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Use an in-process agent instead of the running ssh-agent.
    #[arg(long, global = true)]
    pub memory_agent: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Keys {
        #[command(subcommand)]
        command: KeyCommand,
    },
    /// Run the add, load, unload, remove cycle against an in-memory page.
    Selftest,
    Config {
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    List {
        #[arg(long)]
        json: bool,
    },
    Add {
        #[arg(long)]
        name: String,
        /// OpenSSH private key file.
        #[arg(long)]
        file: PathBuf,
    },
    /// Load a configured key, reading its passphrase from stdin if encrypted.
    Load { id: String },
    Unload { id: String },
    Remove { id: String },
}
