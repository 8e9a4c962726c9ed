//! Execution engine (§4.6): the generic event-queue loop. Knows nothing
//! about dataloaders, learners, or sinks — only the `Node` trait and the
//! topology a [`crate::graph::CompiledTopology`] already validated.

use crate::graph::CompiledTopology;
use std::collections::VecDeque;
use tsiemene_types::{Emitter, Ingress, Node, TsiemeneError};

/// Drives one contract run to completion: dequeues `(node, ingress)`, steps
/// the node, fans out its emissions to every hop declared from that
/// directive (in contract declaration order), and reschedules the node at
/// the head of the queue if it requests runtime continuation. Returns the
/// total number of `step` calls made.
pub fn run_contract(
    topology: &CompiledTopology,
    nodes: &mut [Box<dyn Node>],
    seed_ingress: Ingress,
) -> Result<u64, TsiemeneError> {
    let mut events: VecDeque<(usize, Ingress)> = VecDeque::new();
    events.push_back((topology.root_index, seed_ingress));
    let mut steps: u64 = 0;

    while let Some((node_index, ingress)) = events.pop_front() {
        let mut emitter = Emitter::new();
        nodes[node_index].step(&ingress, &mut emitter)?;
        steps += 1;

        for emission in emitter.into_emissions() {
            for hop in topology
                .hops
                .iter()
                .filter(|h| h.from_index == node_index && h.from_directive == emission.directive)
            {
                events.push_back((
                    hop.to_index,
                    Ingress::new(hop.to_directive.clone(), emission.signal.clone()),
                ));
            }
        }

        if nodes[node_index].requests_runtime_continuation() {
            if let Some(continuation) = nodes[node_index].runtime_continuation_ingress() {
                events.push_front((node_index, continuation));
            }
        }
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::compile::{validate_topology, NodeFactory};
    use tsiemene_dsl::{ContractHop, ContractInstruction, ContractNode};
    use tsiemene_types::{Determinism, Directive, DirectiveDir, Domain, PayloadKind, Signal};

    struct CountingSource {
        instance_name: String,
        directives: Vec<Directive>,
        remaining: u32,
    }

    impl Node for CountingSource {
        fn id(&self) -> tsiemene_types::NodeId {
            0
        }
        fn type_name(&self) -> &str {
            "counting_source"
        }
        fn instance_name(&self) -> &str {
            &self.instance_name
        }
        fn domain(&self) -> Domain {
            Domain::Source
        }
        fn directives(&self) -> &[Directive] {
            &self.directives
        }
        fn determinism(&self) -> Determinism {
            Determinism::Deterministic
        }
        fn step(&mut self, _ingress: &Ingress, out: &mut Emitter) -> tsiemene_types::Result<()> {
            if self.remaining > 0 {
                out.emit_text("payload", "batch");
                self.remaining -= 1;
            }
            Ok(())
        }
        fn requests_runtime_continuation(&self) -> bool {
            self.remaining > 0
        }
        fn runtime_continuation_ingress(&self) -> Option<Ingress> {
            Some(Ingress::new("step", Signal::Text(String::new())))
        }
    }

    struct CountingSink {
        instance_name: String,
        directives: Vec<Directive>,
        received: u32,
    }

    impl Node for CountingSink {
        fn id(&self) -> tsiemene_types::NodeId {
            1
        }
        fn type_name(&self) -> &str {
            "counting_sink"
        }
        fn instance_name(&self) -> &str {
            &self.instance_name
        }
        fn domain(&self) -> Domain {
            Domain::Sink
        }
        fn directives(&self) -> &[Directive] {
            &self.directives
        }
        fn determinism(&self) -> Determinism {
            Determinism::Deterministic
        }
        fn step(&mut self, _ingress: &Ingress, _out: &mut Emitter) -> tsiemene_types::Result<()> {
            self.received += 1;
            Ok(())
        }
    }

    struct Factory;
    impl NodeFactory for Factory {
        fn build(
            &self,
            _type_name: &str,
            instance_name: &str,
            domain: Domain,
        ) -> Result<Box<dyn Node>, TsiemeneError> {
            Ok(match domain {
                Domain::Source => Box::new(CountingSource {
                    instance_name: instance_name.to_string(),
                    directives: vec![Directive::new("payload", DirectiveDir::Out, PayloadKind::Str)],
                    remaining: 3,
                }),
                Domain::Sink => Box::new(CountingSink {
                    instance_name: instance_name.to_string(),
                    directives: vec![Directive::new("payload", DirectiveDir::In, PayloadKind::Str)],
                    received: 0,
                }),
                Domain::Wikimyei => unreachable!(),
            })
        }
    }

    #[test]
    fn fans_out_and_honors_runtime_continuation() {
        let instruction = ContractInstruction {
            name: "t".into(),
            invoke_name: "run".into(),
            invoke_payload: "episode_start".into(),
            seed_wave: "w".into(),
            epochs: 1,
            batch_size: 1,
            nodes: vec![
                ContractNode {
                    instance_name: "src".into(),
                    type_name: "stub".into(),
                    domain: "source".into(),
                },
                ContractNode {
                    instance_name: "snk".into(),
                    type_name: "stub".into(),
                    domain: "sink".into(),
                },
            ],
            hops: vec![ContractHop {
                from_node: "src".into(),
                from_directive: "payload".into(),
                to_node: "snk".into(),
                to_directive: "payload".into(),
            }],
        };
        let topology = validate_topology(&instruction, &Factory).unwrap();
        let mut nodes: Vec<Box<dyn Node>> = instruction
            .nodes
            .iter()
            .map(|n| {
                let domain = match n.domain.as_str() {
                    "source" => Domain::Source,
                    "sink" => Domain::Sink,
                    _ => unreachable!(),
                };
                Factory.build(&n.type_name, &n.instance_name, domain).unwrap()
            })
            .collect();

        let seed = Ingress::new("step", Signal::Text(String::new()));
        let steps = run_contract(&topology, &mut nodes, seed).unwrap();
        // 3 source steps emit 3 batches, each fanning to one sink step: 6 total.
        assert_eq!(steps, 6);
    }
}
