//! Topology validation and compile caching (§4.6).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tsiemene_dsl::ContractInstruction;
use tsiemene_types::{DirectiveDir, Domain, Node, PayloadKind, TsiemeneError};

/// Builds the concrete `Node` trait object for a contract's
/// `NODE <id> { TYPE=...; DOMAIN=...; }` declaration. Implemented by the
/// CLI's root context, which knows about the built-in dataloader/learner/
/// sink node kinds.
pub trait NodeFactory {
    fn build(
        &self,
        type_name: &str,
        instance_name: &str,
        domain: Domain,
    ) -> Result<Box<dyn Node>, TsiemeneError>;
}

pub fn parse_domain(text: &str, instance_name: &str) -> Result<Domain, TsiemeneError> {
    match text.to_ascii_lowercase().as_str() {
        "source" => Ok(Domain::Source),
        "wikimyei" => Ok(Domain::Wikimyei),
        "sink" => Ok(Domain::Sink),
        other => Err(TsiemeneError::TopologyError(format!(
            "node {instance_name:?} has unknown DOMAIN {other:?}"
        ))),
    }
}

/// A hop resolved against the concrete node set: indices rather than names,
/// plus the payload kind the hop carries (checked once at compile time).
#[derive(Debug, Clone)]
pub struct ResolvedHop {
    pub from_index: usize,
    pub from_directive: String,
    pub to_index: usize,
    pub to_directive: String,
    pub kind: PayloadKind,
}

/// The validated, reusable shape of a contract: node order, resolved hops,
/// and the root node index. Does not own node instances — those are built
/// fresh per run by a `NodeFactory` so per-run state never leaks across runs.
#[derive(Debug, Clone)]
pub struct CompiledTopology {
    pub node_order: Vec<tsiemene_dsl::ContractNode>,
    pub hops: Vec<ResolvedHop>,
    pub root_index: usize,
}

fn validate_acyclic(node_count: usize, hops: &[ResolvedHop]) -> Result<(), TsiemeneError> {
    let mut indegree = vec![0usize; node_count];
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for hop in hops {
        adj[hop.from_index].push(hop.to_index);
        indegree[hop.to_index] += 1;
    }
    let mut queue: VecDeque<usize> = (0..node_count).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0;
    while let Some(n) = queue.pop_front() {
        visited += 1;
        for &next in &adj[n] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }
    if visited != node_count {
        return Err(TsiemeneError::TopologyError(
            "hop graph contains a cycle".to_string(),
        ));
    }
    Ok(())
}

/// Validates and resolves a contract's node/hop declarations into a
/// [`CompiledTopology`], building concrete node instances via `factory` only
/// long enough to query their directive tables. The run proper builds fresh
/// instances; these probes are discarded once validation completes.
pub fn validate_topology(
    instruction: &ContractInstruction,
    factory: &dyn NodeFactory,
) -> Result<CompiledTopology, TsiemeneError> {
    if instruction.nodes.is_empty() {
        return Err(TsiemeneError::TopologyError(
            "contract declares no nodes".to_string(),
        ));
    }

    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for (i, node) in instruction.nodes.iter().enumerate() {
        if index_of.insert(&node.instance_name, i).is_some() {
            return Err(TsiemeneError::TopologyError(format!(
                "duplicate node instance {:?}",
                node.instance_name
            )));
        }
    }

    let mut probes: Vec<Box<dyn Node>> = Vec::with_capacity(instruction.nodes.len());
    for node in &instruction.nodes {
        let domain = parse_domain(&node.domain, &node.instance_name)?;
        probes.push(factory.build(&node.type_name, &node.instance_name, domain)?);
    }

    let mut resolved = Vec::with_capacity(instruction.hops.len());
    let mut has_incoming = vec![false; instruction.nodes.len()];
    let mut has_outgoing = vec![false; instruction.nodes.len()];

    for hop in &instruction.hops {
        let from_index = *index_of.get(hop.from_node.as_str()).ok_or_else(|| {
            TsiemeneError::TopologyError(format!("hop references unknown node {:?}", hop.from_node))
        })?;
        let to_index = *index_of.get(hop.to_node.as_str()).ok_or_else(|| {
            TsiemeneError::TopologyError(format!("hop references unknown node {:?}", hop.to_node))
        })?;

        let upstream = probes[from_index].as_ref();
        let downstream = probes[to_index].as_ref();

        let out_directive = upstream
            .directives()
            .iter()
            .find(|d| d.name == hop.from_directive && d.dir == DirectiveDir::Out)
            .ok_or_else(|| {
                TsiemeneError::TopologyError(format!(
                    "node {:?} has no Out directive {:?}",
                    hop.from_node, hop.from_directive
                ))
            })?;
        let in_directive = downstream
            .directives()
            .iter()
            .find(|d| d.name == hop.to_directive && d.dir == DirectiveDir::In)
            .ok_or_else(|| {
                TsiemeneError::TopologyError(format!(
                    "node {:?} has no In directive {:?}",
                    hop.to_node, hop.to_directive
                ))
            })?;

        if out_directive.kind != in_directive.kind {
            return Err(TsiemeneError::TopologyError(format!(
                "hop {:?}.{} -> {:?}.{} has mismatched payload kinds",
                hop.from_node, hop.from_directive, hop.to_node, hop.to_directive
            )));
        }
        if !upstream.allows_hop_to(downstream, DirectiveDir::Out, DirectiveDir::In)
            || !downstream.allows_hop_from(upstream, DirectiveDir::Out, DirectiveDir::In)
        {
            return Err(TsiemeneError::TopologyError(format!(
                "domain {:?} may not hop into domain {:?}",
                upstream.domain(),
                downstream.domain()
            )));
        }

        has_outgoing[from_index] = true;
        has_incoming[to_index] = true;
        resolved.push(ResolvedHop {
            from_index,
            from_directive: hop.from_directive.clone(),
            to_index,
            to_directive: hop.to_directive.clone(),
            kind: out_directive.kind,
        });
    }

    let roots: Vec<usize> = (0..instruction.nodes.len())
        .filter(|&i| !has_incoming[i])
        .collect();
    if roots.len() != 1 {
        return Err(TsiemeneError::TopologyError(format!(
            "expected exactly one root node, found {}",
            roots.len()
        )));
    }
    let root_index = roots[0];
    if probes[root_index].domain() != Domain::Source {
        return Err(TsiemeneError::TopologyError(
            "the root node must be in the Source domain".to_string(),
        ));
    }

    for (i, probe) in probes.iter().enumerate() {
        if !has_outgoing[i] && probe.domain() != Domain::Sink {
            return Err(TsiemeneError::TopologyError(format!(
                "terminal node {:?} must be a Sink",
                instruction.nodes[i].instance_name
            )));
        }
    }

    validate_acyclic(instruction.nodes.len(), &resolved)?;

    Ok(CompiledTopology {
        node_order: instruction.nodes.clone(),
        hops: resolved,
        root_index,
    })
}

/// Caches the validated topology for a contract hash so repeated runs over
/// an unchanged contract skip re-validation (§4.6's `compiled_build_count`).
#[derive(Default)]
pub struct ContractCompiler {
    cache: Mutex<Option<(String, Arc<CompiledTopology>)>>,
    compiled_build_count: AtomicU64,
}

impl ContractCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compiled_build_count(&self) -> u64 {
        self.compiled_build_count.load(Ordering::Relaxed)
    }

    /// Returns the cached topology for `contract_hash` if present, otherwise
    /// validates `instruction` via `factory`, caches it, and bumps the
    /// build counter. A different `contract_hash` invalidates the cache.
    pub fn compile(
        &self,
        contract_hash: &str,
        instruction: &ContractInstruction,
        factory: &dyn NodeFactory,
    ) -> Result<Arc<CompiledTopology>, TsiemeneError> {
        let mut guard = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((hash, topology)) = guard.as_ref() {
            if hash == contract_hash {
                return Ok(Arc::clone(topology));
            }
        }
        let topology = Arc::new(validate_topology(instruction, factory)?);
        *guard = Some((contract_hash.to_string(), Arc::clone(&topology)));
        self.compiled_build_count.fetch_add(1, Ordering::Relaxed);
        Ok(topology)
    }
}
