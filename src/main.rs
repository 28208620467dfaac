//! Claro CLI - Preamplifier Control Plane
//!
//! Command-line driver for the Claro controller: loads configuration,
//! catalog and curves, replays the persisted state against the DSP engine,
//! then processes command lines from the arguments or from stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use claro::catalog::Catalog;
use claro::config::Config;
use claro::control::{Ack, Dispatcher, Response};
use claro::curves::CurveRepository;
use claro::persist;
use claro::sink::{BrutefirSink, DspSink, MemorySink};

/// Claro Preamplifier Controller
#[derive(Parser, Debug)]
#[command(name = "claro")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config/config.json")]
    config: PathBuf,

    /// Loudspeaker catalog file
    #[arg(long, default_value = "config/catalog.json")]
    catalog: PathBuf,

    /// Directory with the equalization curve files
    #[arg(long, default_value = "config/eq")]
    curves: PathBuf,

    /// State file
    #[arg(long, default_value = "config/state.json")]
    state: PathBuf,

    /// Record downstream commits instead of talking to the DSP engine
    #[arg(long)]
    dry_run: bool,

    /// One command to process instead of reading stdin
    command: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    info!("Claro controller v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    let catalog = Catalog::load(&cli.catalog)
        .with_context(|| format!("loading catalog from {}", cli.catalog.display()))?;
    // a controller without its curves must not accept a single command
    let curves = CurveRepository::load(&cli.curves, &config)
        .with_context(|| format!("loading curves from {}", cli.curves.display()))?;
    let state = persist::load(&cli.state)
        .with_context(|| format!("loading state from {}", cli.state.display()))?;

    if cli.dry_run {
        let dispatcher = Dispatcher::new(config, catalog, curves, state, MemorySink::new());
        run(dispatcher, &cli)
    } else {
        let sink = BrutefirSink::new(&config.dsp_address, config.dsp_port);
        let dispatcher = Dispatcher::new(config, catalog, curves, state, sink);
        run(dispatcher, &cli)
    }
}

fn run<S: DspSink>(mut dispatcher: Dispatcher<S>, cli: &Cli) -> anyhow::Result<()> {
    for warning in dispatcher.sync_downstream() {
        warn!("startup sync: {warning}");
    }

    if !cli.command.is_empty() {
        let line = cli.command.join(" ");
        let response = dispatcher.process(&line);
        report(&mut dispatcher, &response, &cli.state)?;
        return Ok(());
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("reading command line")?;
        if line.trim().is_empty() {
            continue;
        }
        let response = dispatcher.process(&line);
        report(&mut dispatcher, &response, &cli.state)?;
    }
    Ok(())
}

fn report<S: DspSink>(
    dispatcher: &mut Dispatcher<S>,
    response: &Response,
    state_path: &std::path::Path,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    if let Some(reply) = &response.reply {
        writeln!(out, "{reply}")?;
    } else {
        match response.ack {
            Ack::Done => writeln!(out, "OK")?,
            Ack::RolledBack => writeln!(out, "rolled back")?,
        }
    }
    for warning in &response.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    if response.changed {
        persist::save(state_path, dispatcher.state()).context("saving state")?;
    }
    Ok(())
}
