// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const QUICKSTART_HELP: &str = "\
Get started:
  growpanel login --token <TOKEN>   Store the access token
  growpanel status                  Check configuration and login
  growpanel watch --room GrowRoom   Follow a room until Ctrl-C";

#[derive(Parser)]
#[command(name = "growpanel")]
#[command(version)]
#[command(about = "Headless grow-room panel client")]
#[command(
    long_about = "Headless grow-room panel client.\n\n\
    Keeps a push connection to the home-automation backend, mirrors its \
    entity states and follows the medium records of one room."
)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: $GROWPANEL_CONFIG, then <state dir>/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log debug output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Store the access token for the configured environment
    #[command(after_help = "Examples:\n  \
        growpanel login --token eyJhbGciOi...   Store a long-lived access token")]
    Login {
        /// Long-lived access token issued by the backend
        #[arg(long)]
        token: String,
    },

    /// Remove the stored access token
    Logout,

    /// Show configuration validity and login state
    Status,

    /// Connect and follow a room until interrupted
    #[command(after_help = "Examples:\n  \
        growpanel watch                 Follow the room from config.toml\n  \
        growpanel watch --room Tent     Follow another room\n  \
        growpanel -v watch              Include merge and command details")]
    Watch {
        /// Room to follow (default: `room` from config.toml)
        #[arg(long, short)]
        room: Option<String>,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
