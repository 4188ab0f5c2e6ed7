//! Command line arguments parsing.
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct RouteBurst {
    /// Path to the TOML file listing the neighbors to feed
    pub config: PathBuf,
    /// Verbose mode
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
