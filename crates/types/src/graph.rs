use crate::signal::Signal;
use std::fmt;

pub type NodeId = u64;

/// The three closed node domains. Hop validity is a pure function of the
/// domain tag and declared directives — no open-ended subclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Source,
    Wikimyei,
    Sink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Determinism {
    Deterministic,
    SeededStochastic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveDir {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Tensor,
    Str,
}

/// A named input or output on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub name: String,
    pub dir: DirectiveDir,
    pub kind: PayloadKind,
}

impl Directive {
    pub fn new(name: impl Into<String>, dir: DirectiveDir, kind: PayloadKind) -> Self {
        Directive {
            name: name.into(),
            dir,
            kind,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// `(directive, signal)` being delivered to a node's `step`.
#[derive(Debug, Clone)]
pub struct Ingress {
    pub directive: String,
    pub signal: Signal,
}

impl Ingress {
    pub fn new(directive: impl Into<String>, signal: Signal) -> Self {
        Ingress {
            directive: directive.into(),
            signal,
        }
    }
}

/// A directed edge from an `Out`-directive on one node to a compatible
/// `In`-directive on another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub from_node: String,
    pub from_directive: String,
    pub to_node: String,
    pub to_directive: String,
}

/// A single emission a node produces during `step`: an outgoing directive
/// name paired with the signal to deliver.
#[derive(Debug, Clone)]
pub struct Emission {
    pub directive: String,
    pub signal: Signal,
}

/// Collector a node's `step` writes emissions into, in emission order.
#[derive(Debug, Default)]
pub struct Emitter {
    emissions: Vec<Emission>,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter::default()
    }

    pub fn emit(&mut self, directive: impl Into<String>, signal: Signal) {
        self.emissions.push(Emission {
            directive: directive.into(),
            signal,
        });
    }

    pub fn emit_text(&mut self, directive: impl Into<String>, text: impl Into<String>) {
        self.emit(directive, Signal::Text(text.into()));
    }

    pub fn emit_tensor(&mut self, directive: impl Into<String>, tensor: ndarray::ArrayD<f32>) {
        self.emit(directive, Signal::Tensor(tensor));
    }

    pub fn into_emissions(self) -> Vec<Emission> {
        self.emissions
    }
}

/// Dispatch interface shared by `Source | Wikimyei | Sink`. Expressed as a
/// trait object rather than a closed enum because node *kinds* are open
/// (new sources, learners, sinks) even though the three `Domain`s are not.
pub trait Node {
    fn id(&self) -> NodeId;
    fn type_name(&self) -> &str;
    fn instance_name(&self) -> &str;
    fn domain(&self) -> Domain;
    fn directives(&self) -> &[Directive];
    fn determinism(&self) -> Determinism;

    /// Whether this node may be the upstream of a hop into `downstream`
    /// carrying `out_dir`/`in_dir`. Pure function of domain tags; the
    /// default policy allows any domain to hop into any other domain except
    /// into a `Source` (sources are always roots) and matches the spec's
    /// "a pure function of the tag and declared directives" guidance.
    fn allows_hop_to(&self, downstream: &dyn Node, _out_dir: DirectiveDir, _in_dir: DirectiveDir) -> bool {
        downstream.domain() != Domain::Source
    }

    /// Symmetric check from the downstream's perspective.
    fn allows_hop_from(&self, upstream: &dyn Node, _out_dir: DirectiveDir, _in_dir: DirectiveDir) -> bool {
        upstream.domain() != Domain::Source || self.domain() != Domain::Source
    }

    /// Executes one step given the current ingress, writing emissions into
    /// `out`. Implementations must not block beyond file I/O / device
    /// transfer, per the concurrency model.
    fn step(&mut self, ingress: &Ingress, out: &mut Emitter) -> crate::Result<()>;

    /// Resets any per-episode state; a no-op for stateless nodes.
    fn reset(&mut self) {}

    /// Whether this node, after its last `step`, asks to be re-scheduled at
    /// the head of the event queue with `runtime_continuation_ingress()`.
    fn requests_runtime_continuation(&self) -> bool {
        false
    }

    /// The ingress to re-deliver when `requests_runtime_continuation` holds.
    fn runtime_continuation_ingress(&self) -> Option<Ingress> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        domain: Domain,
    }

    impl Node for Stub {
        fn id(&self) -> NodeId {
            0
        }
        fn type_name(&self) -> &str {
            "stub"
        }
        fn instance_name(&self) -> &str {
            "stub"
        }
        fn domain(&self) -> Domain {
            self.domain
        }
        fn directives(&self) -> &[Directive] {
            &[]
        }
        fn determinism(&self) -> Determinism {
            Determinism::Deterministic
        }
        fn step(&mut self, _ingress: &Ingress, _out: &mut Emitter) -> crate::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn source_cannot_be_a_hop_target() {
        let a = Stub {
            domain: Domain::Source,
        };
        let b = Stub {
            domain: Domain::Source,
        };
        assert!(!a.allows_hop_to(&b, DirectiveDir::Out, DirectiveDir::In));
    }

    #[test]
    fn sink_can_be_a_hop_target() {
        let a = Stub {
            domain: Domain::Source,
        };
        let b = Stub {
            domain: Domain::Sink,
        };
        assert!(a.allows_hop_to(&b, DirectiveDir::Out, DirectiveDir::In));
    }
}
