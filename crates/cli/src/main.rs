//! `tsiemene` CLI: the `run`/`validate`/`fingerprint` command-line surface
//! (§6) over the board, contract, and wave registries in `tsiemene_core`.

mod cli;
mod context;
mod node_factory;

use crate::cli::{Cli, Command};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Mirrors the teacher's verbosity-to-`LevelFilter` mapping: an explicit
/// `--log-level` wins outright, otherwise each repeated `-v` raises one step
/// from the default `INFO`.
fn level_filter(verbose: u8, log_level: Option<&str>) -> LevelFilter {
    if let Some(raw) = log_level {
        if let Ok(filter) = raw.to_ascii_uppercase().parse::<LevelFilter>() {
            return filter;
        }
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn init_observability(filter: LevelFilter) -> Arc<tsiemene_console::RingBuffer> {
    let buffer = Arc::new(tsiemene_console::RingBuffer::new(1024));
    let ring_layer = tsiemene_console::RingBufferLayer::new(Arc::clone(&buffer));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(tracing_subscriber::filter::filter_fn(tsiemene_console::terminal_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ring_layer)
        .init();
    buffer
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter = level_filter(cli.verbose, cli.log_level.as_deref());
    let _ring_buffer = init_observability(filter);

    let outcome = match cli.command {
        Command::Run { config, binding } => context::run(config, binding),
        Command::Validate { config, binding } => context::validate(config, binding),
        Command::Fingerprint { paths } => context::fingerprint(&paths),
    };

    if let Err(err) = &outcome {
        tracing::error!(tsi_level = "FATAL", error = %err, "tsiemene terminated");
    }
    outcome
}
