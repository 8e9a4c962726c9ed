//! Lexer and block grammars for the wave, board, and contract DSLs (§4.1).
//!
//! Each grammar module parses one DSL's top-level block sequence into a
//! validated instruction tree, reusing the shared [`lexer`] token stream.

pub mod grammar;
pub mod lexer;

pub use grammar::board::{parse_board_dsl, Bind, BoardInstruction};
pub use grammar::contract::{parse_contract_dsl, ContractHop, ContractInstruction, ContractNode};
pub use grammar::wave::parse_wave_dsl;
