//! Learner adapter (§4.8, "VICReg adapter pattern"): a `Wikimyei` node that
//! wraps an opaque [`Encoder`] trait object. The adapter itself owns no
//! optimizer state — it is a pure functional-style shim between the packed
//! `[B,C,T,D+1]` tensor coming off a dataloader and whatever representation
//! the encoder produces.

use ndarray::{Array2, ArrayD, Axis};
use tsiemene_types::{
    Determinism, Directive, DirectiveDir, Domain, Emitter, Ingress, Node, NodeId, PayloadKind,
    Result, TsiemeneError,
};

/// The opaque encoder contract a `Wikimyei` node drives. Implementations may
/// wrap any model; this crate ships one deterministic reference
/// implementation ([`MaskedMeanLinearEncoder`]) sufficient to exercise the
/// adapter end to end, with no claim to reproduce VICReg's actual training
/// behavior.
pub trait Encoder: Send {
    /// `features` is `[B,C,T,D]`, `mask` is `[B,C,T]` (true where valid).
    /// Returns the representation tensor.
    fn encode(&self, features: &ArrayD<f32>, mask: &ArrayD<bool>, use_swa: bool, detach_to_cpu: bool) -> ArrayD<f32>;

    /// Scalar training loss for the same input, when the adapter is running
    /// in train mode. Reference implementations may compute this from the
    /// already-produced representation; real encoders likely recompute
    /// internally with gradient tracking enabled.
    fn loss(&self, features: &ArrayD<f32>, mask: &ArrayD<bool>, representation: &ArrayD<f32>) -> f32;
}

/// Deterministic reference [`Encoder`]: projects the masked mean of the
/// feature window through a fixed linear map. `use_swa`/`detach_to_cpu` are
/// accepted for interface parity but have no effect on a CPU-only, weight-
/// averaging-free reference implementation.
pub struct MaskedMeanLinearEncoder {
    weight: Array2<f32>,
}

impl MaskedMeanLinearEncoder {
    /// `weight` is `[D, output_dim]`.
    pub fn new(weight: Array2<f32>) -> Self {
        MaskedMeanLinearEncoder { weight }
    }

    /// A fixed identity-scaled projection sized for `feature_dim` inputs
    /// producing `output_dim` outputs, handy for tests and default wiring.
    pub fn identity_like(feature_dim: usize, output_dim: usize) -> Self {
        let mut weight = Array2::zeros((feature_dim, output_dim));
        for i in 0..feature_dim.min(output_dim) {
            weight[[i, i]] = 1.0;
        }
        MaskedMeanLinearEncoder { weight }
    }
}

impl Encoder for MaskedMeanLinearEncoder {
    fn encode(&self, features: &ArrayD<f32>, mask: &ArrayD<bool>, _use_swa: bool, _detach_to_cpu: bool) -> ArrayD<f32> {
        let shape = features.shape();
        let (b, c, t, d) = (shape[0], shape[1], shape[2], shape[3]);
        let output_dim = self.weight.shape()[1];
        let mut out = ndarray::Array3::<f32>::zeros((b, c, output_dim));

        for bi in 0..b {
            for ci in 0..c {
                let mut sum = vec![0f32; d];
                let mut valid = 0usize;
                for ti in 0..t {
                    if mask[[bi, ci, ti]] {
                        valid += 1;
                        for di in 0..d {
                            sum[di] += features[[bi, ci, ti, di]];
                        }
                    }
                }
                let denom = valid.max(1) as f32;
                for oi in 0..output_dim {
                    let mut acc = 0f32;
                    for di in 0..d {
                        acc += (sum[di] / denom) * self.weight[[di, oi]];
                    }
                    out[[bi, ci, oi]] = acc;
                }
            }
        }
        out.into_dyn()
    }

    fn loss(&self, _features: &ArrayD<f32>, mask: &ArrayD<bool>, representation: &ArrayD<f32>) -> f32 {
        // A deterministic stand-in training signal: mean squared
        // representation magnitude over valid (non-fully-masked) rows.
        let shape = representation.shape();
        let (b, c) = (shape[0], shape[1]);
        let mut sum = 0f32;
        let mut count = 0usize;
        for bi in 0..b {
            for ci in 0..c {
                let any_valid = (0..mask.shape()[2]).any(|ti| mask[[bi, ci, ti]]);
                if !any_valid {
                    continue;
                }
                for oi in 0..shape[2] {
                    sum += representation[[bi, ci, oi]].powi(2);
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }
}

/// Splits a `[B,C,T,D+1]` packed tensor into features `[B,C,T,D]` and a
/// boolean mask `[B,C,T]` (`last_slot > 0.5`), per §4.8.
fn unpack(packed: &ArrayD<f32>) -> Result<(ArrayD<f32>, ArrayD<bool>)> {
    let shape = packed.shape();
    if shape.len() != 4 {
        return Err(TsiemeneError::DataUnavailable(format!(
            "expected a rank-4 [B,C,T,D+1] tensor, got rank {}",
            shape.len()
        )));
    }
    let (b, c, t, dp1) = (shape[0], shape[1], shape[2], shape[3]);
    if dp1 == 0 {
        return Err(TsiemeneError::DataUnavailable(
            "packed tensor has no feature slots".to_string(),
        ));
    }
    let d = dp1 - 1;
    let features = packed
        .slice_axis(Axis(3), ndarray::Slice::from(0..d as isize))
        .to_owned();
    let mask_slice = packed.slice_axis(Axis(3), ndarray::Slice::from(d as isize..dp1 as isize));
    let mask = mask_slice
        .map(|v| *v > 0.5)
        .into_shape((b, c, t))
        .expect("mask slice has b*c*t*1 elements by construction")
        .into_dyn();
    Ok((features, mask))
}

/// A `Wikimyei` node: `In @payload :tensor` → `Out @payload :tensor` (the
/// representation), `Out @loss :tensor` (train mode only), `Out @meta :str`.
pub struct TsiWikimyei {
    instance_name: String,
    directives: Vec<Directive>,
    encoder: Box<dyn Encoder>,
    train: bool,
    use_swa: bool,
    detach_to_cpu: bool,
}

impl TsiWikimyei {
    pub fn new(instance_name: impl Into<String>, encoder: Box<dyn Encoder>, train: bool) -> Self {
        let mut directives = vec![
            Directive::new("payload", DirectiveDir::In, PayloadKind::Tensor),
            Directive::new("payload", DirectiveDir::Out, PayloadKind::Tensor),
            Directive::new("meta", DirectiveDir::Out, PayloadKind::Str),
        ];
        if train {
            directives.push(Directive::new("loss", DirectiveDir::Out, PayloadKind::Tensor));
        }
        TsiWikimyei {
            instance_name: instance_name.into(),
            directives,
            encoder,
            train,
            use_swa: false,
            detach_to_cpu: false,
        }
    }

    pub fn with_swa(mut self, use_swa: bool) -> Self {
        self.use_swa = use_swa;
        self
    }

    pub fn with_detach_to_cpu(mut self, detach_to_cpu: bool) -> Self {
        self.detach_to_cpu = detach_to_cpu;
        self
    }
}

impl Node for TsiWikimyei {
    fn id(&self) -> NodeId {
        0
    }

    fn type_name(&self) -> &str {
        "tsi_wikimyei"
    }

    fn instance_name(&self) -> &str {
        &self.instance_name
    }

    fn domain(&self) -> Domain {
        Domain::Wikimyei
    }

    fn directives(&self) -> &[Directive] {
        &self.directives
    }

    fn determinism(&self) -> Determinism {
        Determinism::Deterministic
    }

    fn step(&mut self, ingress: &Ingress, out: &mut Emitter) -> Result<()> {
        let packed = ingress.signal.as_tensor().ok_or_else(|| {
            TsiemeneError::DataUnavailable("wikimyei expected a tensor on @payload".to_string())
        })?;
        let (features, mask) = unpack(packed)?;
        let representation = self.encoder.encode(&features, &mask, self.use_swa, self.detach_to_cpu);

        if self.train {
            let loss = self.encoder.loss(&features, &mask, &representation);
            out.emit_tensor("loss", ndarray::arr0(loss).into_dyn());
            out.emit_text("meta", format!("train step: loss={loss}"));
        } else {
            out.emit_text("meta", "inference step");
        }
        out.emit_tensor("payload", representation);
        Ok(())
    }
}
