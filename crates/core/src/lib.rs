//! tsiemene core: the fingerprint engine, hash-keyed registries, board
//! runtime lock, graph compiler and execution engine, the dataloader source
//! node, the learner adapter, and a reference sink.

pub mod board_lock;
pub mod dataloader;
pub mod engine;
pub mod fingerprint;
pub mod graph;
pub mod learner;
pub mod registry;
pub mod sink;

pub use board_lock::{BoardRuntime, LockedBoard};
pub use dataloader::command::{parse_command, Command};
pub use dataloader::dataset::{Channel, Dataset};
pub use dataloader::TsiSourceDataloader;
pub use engine::run_contract;
pub use graph::{CompiledTopology, ContractCompiler, NodeFactory, ResolvedHop};
pub use learner::{Encoder, MaskedMeanLinearEncoder, TsiWikimyei};
pub use registry::{Record, Registry};
pub use sink::TsiSink;
