// SPDX-License-Identifier: AGPL-3.0-or-later

mod args;
mod config;
mod session;
mod supervisor;

use clap::Parser;

fn setup_logger(verbose: bool) {
    let level = if verbose {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    let config = simplelog::ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();
    simplelog::TermLogger::init(
        level,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .expect("Failed to initialize logger");
}

#[tokio::main]
async fn main() {
    let args = args::RouteBurst::parse();
    setup_logger(args.verbose);
    let config = match config::Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Cannot load {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };
    if config.peers.is_empty() {
        log::warn!("No peers configured, nothing to do");
        return;
    }
    log::info!("Starting {} BGP session(s)", config.peers.len());
    supervisor::run(config.peers).await;
}
