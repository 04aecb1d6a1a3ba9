mod aggregator;
mod classifier;
mod cli;
mod client;
mod commands;
mod config;
mod console;
mod fleet;
mod inventory;
mod registry;
mod session;
mod timers;
mod webhook;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rustyline::ExternalPrinter;
use tracing::{info, warn};

use cli::{Cli, Command};
use client::bridge::BridgeFactory;
use config::FleetConfig;
use console::{CommandHelper, Terminal};
use fleet::{Fleet, Flow, LoopEvent};
use webhook::{Disabled, Notifier, WebhookClient};

type Printer = Box<dyn ExternalPrinter + Send>;

/// Own the fleet on this thread until the operator quits.
fn run_loop(
    config: FleetConfig,
    events_tx: Sender<LoopEvent>,
    events: Receiver<LoopEvent>,
    printer: Option<Printer>,
    prompts: Sender<String>,
) {
    let factory = BridgeFactory::new(config.bridge.address.clone(), events_tx.clone());
    let notifier: Box<dyn Notifier> = match &config.webhook.url {
        Some(url) => Box::new(WebhookClient::new(
            url.clone(),
            config.webhook.mention.clone(),
            events_tx,
        )),
        None => {
            info!("no webhook url configured; notifications disabled");
            Box::new(Disabled)
        }
    };
    let mut fleet = Fleet::new(
        config,
        Box::new(factory),
        notifier,
        Box::new(Terminal::new(printer, prompts)),
    );

    let started = Instant::now();
    fleet.start();
    loop {
        fleet.run_due(started.elapsed());
        let event = match fleet.until_next_timer() {
            Some(wait) => match events.recv_timeout(wait) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match events.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };
        fleet.run_due(started.elapsed());
        if fleet.handle(event) == Flow::Quit {
            fleet.shutdown();
            break;
        }
    }
}

fn run(config: FleetConfig) -> Result<()> {
    let prefix = config.prefix();
    let helper = CommandHelper::new(
        prefix,
        &commands::command_names(),
        &config.accounts.usernames,
    );
    let mut rl = console::editor(helper).context("failed to open the console")?;
    let printer: Option<Printer> = match rl.create_external_printer() {
        Ok(printer) => Some(Box::new(printer)),
        Err(e) => {
            warn!(error = %e, "no external printer; console output may overlap the prompt");
            None
        }
    };

    let (tx, rx) = mpsc::channel();
    let (prompt_tx, prompt_rx) = mpsc::channel();
    let loop_tx = tx.clone();
    let worker = thread::Builder::new()
        .name("fleet".to_string())
        .spawn(move || run_loop(config, loop_tx, rx, printer, prompt_tx))
        .context("failed to start the fleet loop")?;

    console::read_input(rl, prefix, console::prompt(None), prompt_rx, tx);

    worker
        .join()
        .map_err(|_| anyhow::anyhow!("fleet loop panicked"))?;
    info!("bye");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let is_config_command = matches!(&cli.command, Command::Config { .. });

    let filter = match cli.verbose {
        0 if is_config_command => "botherd=warn",
        0 => "botherd=info",
        1 => "botherd=debug",
        _ => "botherd=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.command.config_path();
    let config = FleetConfig::load(config_path)?;
    info!(
        "loaded config from {} ({} accounts)",
        config_path.display(),
        config.accounts.usernames.len()
    );

    match cli.command {
        Command::Run { .. } => run(config),
        Command::Config { .. } => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render config as TOML")?;
            print!("{rendered}");
            Ok(())
        }
    }
}
