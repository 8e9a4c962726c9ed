//! Root context (§9: "the CLI owns construction"): resolves the global
//! config, locks the board, decodes the bound contract and wave, builds the
//! dataset backing the contract's source node, and drives either a full run
//! or a validate-only pass. Everything below the CLI boundary returns a
//! concrete `tsiemene_types::TsiemeneError`; only here does it collapse into
//! `anyhow::Result`, matching the teacher's `main.rs`/`anyhow::Context` idiom.

use crate::node_factory::CliNodeFactory;
use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tsiemene_common::civil::parse_ddmmyyyy_to_unix_ms;
use tsiemene_common::text::parse_bool_token;
use tsiemene_config::{load_config, resolve_config_path, GlobalConfig};
use tsiemene_core::graph::compile::parse_domain;
use tsiemene_core::{BoardRuntime, Channel, ContractCompiler, Dataset, NodeFactory};
use tsiemene_dsl::{parse_contract_dsl, parse_wave_dsl, ContractInstruction};
use tsiemene_types::{Ingress, Node, Signal};

/// Packing window (`T`) and rolling-normalization window the contract DSL
/// has no key for (open question resolved in DESIGN.md): fixed defaults,
/// not read from `.config` or the wave DSL.
const DEFAULT_WINDOW: usize = 16;
const DEFAULT_NORM_WINDOW: usize = 32;

struct Prepared {
    runtime: BoardRuntime,
    contract_hash: String,
    contract: Arc<ContractInstruction>,
    factory: CliNodeFactory,
}

fn config_uint(config: &GlobalConfig, section: &str, key: &str, default: u64) -> anyhow::Result<u64> {
    match config.get(section, key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("[{section}].{key} is not a valid unsigned integer")),
        None => Ok(default),
    }
}

fn config_bool(config: &GlobalConfig, section: &str, key: &str, default: bool) -> anyhow::Result<bool> {
    match config.get(section, key) {
        Some(raw) => parse_bool_token(raw)
            .with_context(|| format!("[{section}].{key} is not a valid boolean")),
        None => Ok(default),
    }
}

fn resolved_board_path(config: &GlobalConfig, cwd: &Path) -> anyhow::Result<PathBuf> {
    let raw = config
        .get("GENERAL", "board_config_key")
        .context("missing [GENERAL].board_config_key")?;
    let path = PathBuf::from(raw);
    Ok(if path.is_absolute() { path } else { cwd.join(path) })
}

fn resolved_binding_id(config: &GlobalConfig, explicit: Option<&str>) -> anyhow::Result<String> {
    if let Some(binding) = explicit {
        return Ok(binding.to_string());
    }
    config
        .get("GENERAL", "board_binding_key")
        .map(str::to_string)
        .context("missing [GENERAL].board_binding_key and no --binding given")
}

fn resolve_sibling(base: &Path, raw: &str) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Resolves config, locks the board, decodes the bound contract+wave, and
/// builds the dataset and node factory shared by `run` and `validate`.
fn prepare(config: Option<&Path>, binding: Option<&str>) -> anyhow::Result<Prepared> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let config_path = resolve_config_path(config, &cwd);
    let global_config = load_config(&config_path)
        .with_context(|| format!("failed to load config at {config_path:?}"))?;

    let board_path = resolved_board_path(&global_config, &cwd)?;
    let binding_id = resolved_binding_id(&global_config, binding)?;

    let runtime = BoardRuntime::new();
    runtime
        .init(&board_path, &binding_id)
        .with_context(|| format!("failed to lock board {board_path:?} to binding {binding_id:?}"))?;
    let (contract_hash, wave_hash) = runtime
        .bound_hashes()
        .expect("init() just succeeded, so the binding is resolved");

    let contract_record = runtime
        .contract_registry()
        .itself(&contract_hash)
        .expect("just registered by init()");
    let contract = contract_record.decoded(|text, path| parse_contract_dsl(text, path))?;

    let wave_record = runtime
        .wave_registry()
        .itself(&wave_hash)
        .expect("just registered by init()");
    let profiles = wave_record.decoded(|text, path| parse_wave_dsl(text, path))?;
    let profile = profiles
        .iter()
        .find(|p| p.name == contract.seed_wave)
        .cloned()
        .with_context(|| format!("wave file has no profile named {:?}", contract.seed_wave))?;

    let bootstrap_deltas = config_uint(&global_config, "DATA_LOADER", "dataloader_csv_bootstrap_deltas", 2)?;
    let force_rebuild = config_bool(&global_config, "DATA_LOADER", "dataloader_force_rebuild_cache", false)?;

    let mut channels = Vec::with_capacity(profile.sources.len());
    for source in &profile.sources {
        let csv_path = resolve_sibling(&wave_record.config_folder, &source.path);
        let channel = Channel::load(&csv_path, DEFAULT_NORM_WINDOW, bootstrap_deltas as usize, force_rebuild)
            .with_context(|| format!("failed to load dataset channel {csv_path:?}"))?;
        channels.push(channel);
    }
    let dataset = Arc::new(Dataset::new(channels)?);

    let wave_span = match profile.sources.first() {
        Some(source) => {
            let from_ms = parse_ddmmyyyy_to_unix_ms(&source.from, false)?;
            let to_ms = parse_ddmmyyyy_to_unix_ms(&source.to, true)?;
            Some((from_ms, to_ms))
        }
        None => None,
    };
    let train = profile.wikimyeis.iter().any(|w| w.train);

    let factory = CliNodeFactory {
        dataset,
        profile,
        window: DEFAULT_WINDOW,
        wave_span,
        train,
    };

    Ok(Prepared {
        runtime,
        contract_hash,
        contract,
        factory,
    })
}

fn build_nodes(
    contract: &ContractInstruction,
    factory: &CliNodeFactory,
) -> anyhow::Result<Vec<Box<dyn Node>>> {
    let mut nodes = Vec::with_capacity(contract.nodes.len());
    for node in &contract.nodes {
        let domain = parse_domain(&node.domain, &node.instance_name)?;
        nodes.push(factory.build(&node.type_name, &node.instance_name, domain)?);
    }
    Ok(nodes)
}

pub fn run(config: Option<PathBuf>, binding: Option<String>) -> anyhow::Result<()> {
    let prepared = prepare(config.as_deref(), binding.as_deref())?;
    prepared.runtime.assert_locked_runtime_intact_or_fail_fast()?;

    let compiler = ContractCompiler::new();
    let topology = compiler.compile(&prepared.contract_hash, &prepared.contract, &prepared.factory)?;
    let mut nodes = build_nodes(&prepared.contract, &prepared.factory)?;

    let seed = Ingress::new("step", Signal::Text(prepared.contract.invoke_payload.clone()));
    let steps = tsiemene_core::run_contract(&topology, &mut nodes, seed)?;

    tracing::info!(contract = %prepared.contract.name, steps, "contract run completed");
    println!(
        "tsiemene: contract {:?} completed in {steps} engine step(s)",
        prepared.contract.name
    );
    Ok(())
}

pub fn validate(config: Option<PathBuf>, binding: Option<String>) -> anyhow::Result<()> {
    let prepared = prepare(config.as_deref(), binding.as_deref())?;
    let compiler = ContractCompiler::new();
    compiler
        .compile(&prepared.contract_hash, &prepared.contract, &prepared.factory)
        .context("topology validation failed")?;

    println!(
        "tsiemene: contract {:?} is valid ({} node(s), {} hop(s))",
        prepared.contract.name,
        prepared.contract.nodes.len(),
        prepared.contract.hops.len()
    );
    Ok(())
}

pub fn fingerprint(paths: &[PathBuf]) -> anyhow::Result<()> {
    if paths.is_empty() {
        bail!("fingerprint requires at least one path");
    }
    for path in paths {
        let fp = tsiemene_core::fingerprint::fingerprint_file(path)
            .with_context(|| format!("failed to fingerprint {path:?}"))?;
        println!("{}\t{}", fp.canonical_path.display(), fp.sha256_hex);
    }
    Ok(())
}
