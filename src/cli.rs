use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_FILENAME;

#[derive(Parser, Debug)]
#[command(
    name = "botherd",
    about = "Run a herd of game bots from one console",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect every configured account and open the console
    Run {
        /// Path to the config file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILENAME)]
        config: PathBuf,
    },

    /// Print the effective configuration, defaults filled in
    Config {
        /// Path to the config file
        #[arg(long, short, default_value = DEFAULT_CONFIG_FILENAME)]
        config: PathBuf,
    },
}

impl Command {
    pub fn config_path(&self) -> &PathBuf {
        match self {
            Self::Run { config } | Self::Config { config } => config,
        }
    }
}
