//! The CLI's concrete [`NodeFactory`]: maps a contract's `NODE TYPE=...`
//! declarations onto the three built-in node kinds `tsiemene_core` ships
//! (`tsi_source_dataloader`, `tsi_wikimyei`, `tsi_sink`), matching the
//! teacher's pattern of keeping the generic engine ignorant of concrete
//! node kinds and pushing that knowledge into the binary crate that wires
//! everything together.

use std::sync::Arc;
use tsiemene_core::{Dataset, MaskedMeanLinearEncoder, NodeFactory, TsiSourceDataloader, TsiSink, TsiWikimyei};
use tsiemene_types::{Domain, Node, TsiemeneError, WaveProfile};

/// Built from the locked binding's resolved wave profile and dataset; one
/// instance is shared by every `build` call made while compiling and
/// instantiating a single contract run.
pub struct CliNodeFactory {
    pub dataset: Arc<Dataset>,
    pub profile: WaveProfile,
    pub window: usize,
    pub wave_span: Option<(i64, i64)>,
    pub train: bool,
}

fn unsupported(type_name: &str, instance_name: &str, domain: Domain) -> TsiemeneError {
    TsiemeneError::TopologyError(format!(
        "node {instance_name:?} has no built-in implementation for TYPE={type_name:?} DOMAIN={domain:?}"
    ))
}

impl NodeFactory for CliNodeFactory {
    fn build(
        &self,
        type_name: &str,
        instance_name: &str,
        domain: Domain,
    ) -> Result<Box<dyn Node>, TsiemeneError> {
        match (type_name.to_ascii_lowercase().as_str(), domain) {
            ("dataloader" | "tsi_source_dataloader", Domain::Source) => {
                let mut node =
                    TsiSourceDataloader::new(instance_name, Arc::clone(&self.dataset), self.profile.clone(), self.window);
                if let Some((from_ms, to_ms)) = self.wave_span {
                    node = node.with_wave_span(from_ms, to_ms);
                }
                Ok(Box::new(node))
            }
            ("wikimyei" | "learner" | "tsi_wikimyei", Domain::Wikimyei) => {
                let feature_dim = self.dataset.channels[0].feature_dim;
                let encoder = MaskedMeanLinearEncoder::identity_like(feature_dim, feature_dim);
                Ok(Box::new(TsiWikimyei::new(instance_name, Box::new(encoder), self.train)))
            }
            ("sink" | "tsi_sink", Domain::Sink) => Ok(Box::new(TsiSink::new(instance_name))),
            (other, domain) => Err(unsupported(other, instance_name, domain)),
        }
    }
}
