//! `clap::Parser` argument surface (§6's command-line surface) for the
//! `tsiemene` binary: `run`, `validate`, and `fingerprint`, plus global
//! verbosity flags mirroring the teacher's `-v`/`--verbose` convention.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tsiemene", version, about = "Contract-bound tsiemene runtime")]
pub struct Cli {
    /// Explicit tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Overrides `--verbose` when given.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Raise verbosity one step per occurrence; ignored if `--log-level` is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Loads config, locks the board, compiles the bound contract's graph,
    /// and drives execution to completion.
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        binding: Option<String>,
    },
    /// Loads config, locks the board, and validates the bound contract's
    /// topology without executing it.
    Validate {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        binding: Option<String>,
    },
    /// Prints the canonical path and SHA-256 hex of each given file.
    Fingerprint {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}
