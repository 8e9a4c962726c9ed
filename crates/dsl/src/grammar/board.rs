//! Board DSL grammar: `BOARD { CONTRACT <id> <path>; WAVE <id> <path>; BIND <bid> <cid> <wid>; }`.

use super::Parser;
use std::collections::HashSet;
use std::path::Path;
use tsiemene_types::TsiemeneError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub binding_id: String,
    pub contract_id: String,
    pub wave_id: String,
}

/// The decoded board instruction: the set of named contracts, named waves,
/// and the binds that couple a contract id to a wave id under a binding id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardInstruction {
    pub contracts: Vec<(String, String)>,
    pub waves: Vec<(String, String)>,
    pub binds: Vec<Bind>,
}

impl BoardInstruction {
    pub fn contract_path(&self, id: &str) -> Option<&str> {
        self.contracts
            .iter()
            .find(|(cid, _)| cid == id)
            .map(|(_, path)| path.as_str())
    }

    pub fn wave_path(&self, id: &str) -> Option<&str> {
        self.waves
            .iter()
            .find(|(wid, _)| wid == id)
            .map(|(_, path)| path.as_str())
    }

    pub fn bind(&self, binding_id: &str) -> Option<&Bind> {
        self.binds.iter().find(|b| b.binding_id == binding_id)
    }
}

/// Parses a full board DSL file.
pub fn parse_board_dsl(source: &str, path: &Path) -> Result<BoardInstruction, TsiemeneError> {
    let mut p = Parser::new(source, path);
    p.expect_keyword("BOARD")?;
    p.expect_symbol("{")?;

    let mut instruction = BoardInstruction::default();
    let mut contract_ids: HashSet<String> = HashSet::new();
    let mut wave_ids: HashSet<String> = HashSet::new();
    let mut binding_ids: HashSet<String> = HashSet::new();

    loop {
        let tok = p.peek()?;
        if tok.text == "}" {
            break;
        }
        match tok.text.as_str() {
            "CONTRACT" => {
                p.next()?;
                let id = p.expect_identifier()?;
                let value = p.expect_scalar()?;
                p.expect_symbol(";")?;
                if !contract_ids.insert(id.text.clone()) {
                    return Err(p.error(id.line, id.column, format!("duplicate CONTRACT id {:?}", id.text)));
                }
                instruction.contracts.push((id.text, value.text));
            }
            "WAVE" => {
                p.next()?;
                let id = p.expect_identifier()?;
                let value = p.expect_scalar()?;
                p.expect_symbol(";")?;
                if !wave_ids.insert(id.text.clone()) {
                    return Err(p.error(id.line, id.column, format!("duplicate WAVE id {:?}", id.text)));
                }
                instruction.waves.push((id.text, value.text));
            }
            "BIND" => {
                p.next()?;
                let binding_id = p.expect_identifier()?;
                let contract_id = p.expect_identifier()?;
                let wave_id = p.expect_identifier()?;
                p.expect_symbol(";")?;
                if !binding_ids.insert(binding_id.text.clone()) {
                    return Err(p.error(
                        binding_id.line,
                        binding_id.column,
                        format!("duplicate BIND binding id {:?}", binding_id.text),
                    ));
                }
                if !contract_ids.contains(&contract_id.text) {
                    return Err(p.error(
                        contract_id.line,
                        contract_id.column,
                        format!("BIND references unknown CONTRACT id {:?}", contract_id.text),
                    ));
                }
                if !wave_ids.contains(&wave_id.text) {
                    return Err(p.error(
                        wave_id.line,
                        wave_id.column,
                        format!("BIND references unknown WAVE id {:?}", wave_id.text),
                    ));
                }
                instruction.binds.push(Bind {
                    binding_id: binding_id.text,
                    contract_id: contract_id.text,
                    wave_id: wave_id.text,
                });
            }
            other => {
                return Err(p.error(tok.line, tok.column, format!("unknown board statement {other:?}")));
            }
        }
    }
    p.expect_symbol("}")?;

    if instruction.contracts.is_empty() && instruction.waves.is_empty() && instruction.binds.is_empty() {
        return Err(TsiemeneError::InvalidDsl {
            path: path.to_path_buf(),
            line: 1,
            column: 1,
            message: "board DSL must declare at least one CONTRACT, WAVE, or BIND".to_string(),
        });
    }
    Ok(instruction)
}
