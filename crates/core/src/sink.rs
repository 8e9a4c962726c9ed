//! A basic `Sink` node: terminal consumer of representations/losses/meta.
//! Ships as the reference sink used by the CLI's default contracts and by
//! tests; real deployments would swap in a sink that persists to storage or
//! forwards to an exchange adapter, which is out of scope here.

use tsiemene_types::{
    Determinism, Directive, DirectiveDir, Domain, Emitter, Ingress, Node, NodeId, PayloadKind,
    Result, Signal,
};

/// A terminal node that accepts any of `@payload`, `@loss`, `@meta` and
/// keeps the most recently received tensor/text for inspection. It never
/// emits and never requests continuation — a contract graph's only sink
/// nodes are the ones with no outgoing hops (§4.6's "every terminal node
/// must be `Sink`" invariant).
pub struct TsiSink {
    instance_name: String,
    directives: Vec<Directive>,
    received: u64,
    last_tensor: Option<ndarray::ArrayD<f32>>,
    last_text: Option<String>,
}

impl TsiSink {
    pub fn new(instance_name: impl Into<String>) -> Self {
        TsiSink {
            instance_name: instance_name.into(),
            directives: vec![
                Directive::new("payload", DirectiveDir::In, PayloadKind::Tensor),
                Directive::new("loss", DirectiveDir::In, PayloadKind::Tensor),
                Directive::new("meta", DirectiveDir::In, PayloadKind::Str),
            ],
            received: 0,
            last_tensor: None,
            last_text: None,
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn last_tensor(&self) -> Option<&ndarray::ArrayD<f32>> {
        self.last_tensor.as_ref()
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }
}

impl Node for TsiSink {
    fn id(&self) -> NodeId {
        0
    }

    fn type_name(&self) -> &str {
        "tsi_sink"
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

    fn step(&mut self, ingress: &Ingress, _out: &mut Emitter) -> Result<()> {
        self.received += 1;
        match &ingress.signal {
            Signal::Tensor(t) => self.last_tensor = Some(t.clone()),
            Signal::Text(s) => self.last_text = Some(s.clone()),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.received = 0;
        self.last_tensor = None;
        self.last_text = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_every_ingress_and_remembers_the_latest() {
        let mut sink = TsiSink::new("snk");
        let mut out = Emitter::new();
        sink.step(&Ingress::new("meta", Signal::Text("hello".into())), &mut out)
            .unwrap();
        sink.step(
            &Ingress::new("payload", Signal::Tensor(ndarray::arr1(&[1.0, 2.0]).into_dyn())),
            &mut out,
        )
        .unwrap();
        assert_eq!(sink.received(), 2);
        assert_eq!(sink.last_text(), Some("hello"));
        assert_eq!(sink.last_tensor().unwrap().len(), 2);
    }

    #[test]
    fn reset_clears_recorded_state() {
        let mut sink = TsiSink::new("snk");
        let mut out = Emitter::new();
        sink.step(&Ingress::new("meta", Signal::Text("x".into())), &mut out).unwrap();
        sink.reset();
        assert_eq!(sink.received(), 0);
        assert_eq!(sink.last_text(), None);
    }
}
