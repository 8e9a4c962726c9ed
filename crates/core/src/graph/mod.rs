//! Graph model, topology validation, and compile caching (§4.6).

pub mod compile;

pub use compile::{CompiledTopology, ContractCompiler, NodeFactory, ResolvedHop};
