#![deny(dead_code)] // DO NOT REMOVE THIS EVER
use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::rc::Rc;

mod utils;

use social_tui::{
    config::{Config, Overrides},
    event_loop::PollingLoop,
    ui::{Screen, TerminalFrontend},
    App, LoopbackClient,
};

/// Command line arguments for social-tui
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "social-tui: friends, direct messages and voice calls in the terminal.",
    long_about = "social-tui shows your friends list grouped by presence, lets you chat with them \
    and start voice calls.\n\n\
    The application id can also be given through DISCORD_APPLICATION_ID or the config file.\n\
    Use -h or --help to see all options."
)]
struct Args {
    /// Application id registered with the platform
    #[arg(short = 'a', long, env = "DISCORD_APPLICATION_ID", value_name = "ID")]
    application_id: Option<u64>,

    /// File to write logs to
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments FIRST
    let args = Args::parse();

    let config = Config::resolve(
        args.config.as_deref(),
        Overrides {
            application_id: args.application_id,
            log_file: args.log_file,
            log_level: args.log_level,
        },
    )?;
    config.require_application_id()?;

    utils::setup_logging(&config.log_file, config.level_filter()?)?;
    info!("social-tui starting up");
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    info!("Logging to file: {}", config.log_file.display());

    let client = Rc::new(LoopbackClient::demo());
    let app = App::new(config, client);
    app.start();

    let mut frontend = TerminalFrontend::new(Screen::new(Rc::clone(&app)))?;
    let result = PollingLoop::new(&app).run(&mut frontend).await;

    // Always give the terminal back, even when the loop failed
    frontend.restore()?;
    if let Err(e) = &result {
        error!("Main loop failed: {}", e);
    }
    info!("social-tui shutting down");
    result
}
