use ndarray::ArrayD;

/// Tagged payload carried between nodes: either a string (used for `@meta`
/// and `@step` directives) or a tensor (used for `@payload`, `@future`,
/// `@loss`).
#[derive(Debug, Clone)]
pub enum Signal {
    Text(String),
    Tensor(ArrayD<f32>),
}

impl Signal {
    pub fn kind(&self) -> super::graph::PayloadKind {
        match self {
            Signal::Text(_) => super::graph::PayloadKind::Str,
            Signal::Tensor(_) => super::graph::PayloadKind::Tensor,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Signal::Text(s) => Some(s.as_str()),
            Signal::Tensor(_) => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&ArrayD<f32>> {
        match self {
            Signal::Tensor(t) => Some(t),
            Signal::Text(_) => None,
        }
    }
}
