//! Contract DSL grammar (invented for this crate; spec.md gives only the
//! decoded shape of a contract record, not its source syntax — see the
//! Open Question resolution in the grounding ledger):
//!
//! ```text
//! CONTRACT <name> {
//!     INVOKE_NAME = ...;
//!     INVOKE_PAYLOAD = ...;
//!     SEED_WAVE = ...;
//!     EPOCHS = ...;
//!     BATCH_SIZE = ...;
//!     NODE <instance_name> { TYPE=...; DOMAIN=...; };
//!     HOP { FROM=<node>.<directive>; TO=<node>.<directive>; };
//! }
//! ```

use super::{parse_uint, Parser};
use std::collections::HashSet;
use std::path::Path;
use tsiemene_types::TsiemeneError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractNode {
    pub instance_name: String,
    pub type_name: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractHop {
    pub from_node: String,
    pub from_directive: String,
    pub to_node: String,
    pub to_directive: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInstruction {
    pub name: String,
    pub invoke_name: String,
    pub invoke_payload: String,
    pub seed_wave: String,
    pub epochs: u64,
    pub batch_size: u64,
    pub nodes: Vec<ContractNode>,
    pub hops: Vec<ContractHop>,
}

fn parse_port(text: &str, p: &Parser<'_>, line: usize, column: usize) -> Result<(String, String), TsiemeneError> {
    match text.split_once('.') {
        Some((node, directive)) if !node.is_empty() && !directive.is_empty() => {
            Ok((node.to_string(), directive.to_string()))
        }
        _ => Err(p.error(line, column, format!("expected <node>.<directive>, got {text:?}"))),
    }
}

fn parse_node_body(p: &mut Parser<'_>, instance_name: String) -> Result<ContractNode, TsiemeneError> {
    p.expect_symbol("{")?;
    let mut type_name = None;
    let mut domain = None;
    while p.peek()?.text != "}" {
        let (key, value) = p.parse_assignment()?;
        match key.as_str() {
            "TYPE" => type_name = Some(value.text),
            "DOMAIN" => domain = Some(value.text),
            other => return Err(p.error(value.line, value.column, format!("unknown NODE key {other:?}"))),
        }
    }
    p.expect_symbol("}")?;
    p.skip_optional_symbol(";")?;
    let line = p.peek()?.line;
    let column = p.peek()?.column;
    Ok(ContractNode {
        instance_name,
        type_name: type_name.ok_or_else(|| p.error(line, column, "NODE missing TYPE"))?,
        domain: domain.ok_or_else(|| p.error(line, column, "NODE missing DOMAIN"))?,
    })
}

fn parse_hop_body(p: &mut Parser<'_>) -> Result<ContractHop, TsiemeneError> {
    p.expect_symbol("{")?;
    let mut from_port = None;
    let mut to_port = None;
    while p.peek()?.text != "}" {
        let (key, value) = p.parse_assignment()?;
        match key.as_str() {
            "FROM" => from_port = Some(parse_port(&value.text, p, value.line, value.column)?),
            "TO" => to_port = Some(parse_port(&value.text, p, value.line, value.column)?),
            other => return Err(p.error(value.line, value.column, format!("unknown HOP key {other:?}"))),
        }
    }
    p.expect_symbol("}")?;
    p.skip_optional_symbol(";")?;
    let line = p.peek()?.line;
    let column = p.peek()?.column;
    let (from_node, from_directive) = from_port.ok_or_else(|| p.error(line, column, "HOP missing FROM"))?;
    let (to_node, to_directive) = to_port.ok_or_else(|| p.error(line, column, "HOP missing TO"))?;
    Ok(ContractHop {
        from_node,
        from_directive,
        to_node,
        to_directive,
    })
}

fn parse_contract_body(p: &mut Parser<'_>, path: &Path, name: String) -> Result<ContractInstruction, TsiemeneError> {
    p.expect_symbol("{")?;

    let mut invoke_name = None;
    let mut invoke_payload = None;
    let mut seed_wave = None;
    let mut epochs = None;
    let mut batch_size = None;
    let mut nodes = Vec::new();
    let mut hops = Vec::new();
    let mut seen_instances: HashSet<String> = HashSet::new();

    loop {
        let tok = p.peek()?;
        if tok.text == "}" {
            break;
        }
        if tok.kind == crate::lexer::TokenKind::Identifier && tok.text == "NODE" {
            p.next()?;
            let header = p.expect_identifier()?;
            if !seen_instances.insert(header.text.clone()) {
                return Err(p.error(header.line, header.column, format!("duplicate NODE instance name {:?}", header.text)));
            }
            nodes.push(parse_node_body(p, header.text)?);
            continue;
        }
        if tok.kind == crate::lexer::TokenKind::Identifier && tok.text == "HOP" {
            p.next()?;
            hops.push(parse_hop_body(p)?);
            continue;
        }
        let (key, value) = p.parse_assignment()?;
        match key.as_str() {
            "INVOKE_NAME" => invoke_name = Some(value.text),
            "INVOKE_PAYLOAD" => invoke_payload = Some(value.text),
            "SEED_WAVE" => seed_wave = Some(value.text),
            "EPOCHS" => epochs = Some(parse_uint(&value, path, true)?),
            "BATCH_SIZE" => batch_size = Some(parse_uint(&value, path, true)?),
            other => return Err(p.error(value.line, value.column, format!("unknown CONTRACT key {other:?}"))),
        }
    }
    p.expect_symbol("}")?;
    p.skip_optional_symbol(";")?;

    let line = p.peek()?.line;
    let column = p.peek()?.column;
    Ok(ContractInstruction {
        name,
        invoke_name: invoke_name.ok_or_else(|| p.error(line, column, "CONTRACT missing INVOKE_NAME"))?,
        invoke_payload: invoke_payload.ok_or_else(|| p.error(line, column, "CONTRACT missing INVOKE_PAYLOAD"))?,
        seed_wave: seed_wave.ok_or_else(|| p.error(line, column, "CONTRACT missing SEED_WAVE"))?,
        epochs: epochs.ok_or_else(|| p.error(line, column, "CONTRACT missing EPOCHS"))?,
        batch_size: batch_size.ok_or_else(|| p.error(line, column, "CONTRACT missing BATCH_SIZE"))?,
        nodes,
        hops,
    })
}

/// Parses a full contract DSL file: a single `CONTRACT <name> { ... }` block.
pub fn parse_contract_dsl(source: &str, path: &Path) -> Result<ContractInstruction, TsiemeneError> {
    let mut p = Parser::new(source, path);
    p.expect_keyword("CONTRACT")?;
    let name = p.expect_identifier()?;
    let instruction = parse_contract_body(&mut p, path, name.text)?;
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn p(path: &str) -> PathBuf {
        PathBuf::from(path)
    }

    fn sample() -> &'static str {
        r#"
            CONTRACT trivial {
                INVOKE_NAME=run;
                INVOKE_PAYLOAD=episode_start;
                SEED_WAVE=stable_pretrain;
                EPOCHS=1;
                BATCH_SIZE=1;
                NODE src { TYPE=dataloader; DOMAIN=source; };
                NODE snk { TYPE=sink; DOMAIN=sink; };
                HOP { FROM=src.payload; TO=snk.payload; };
            }
        "#
    }

    #[test]
    fn decodes_a_trivial_source_to_sink_contract() {
        let contract = parse_contract_dsl(sample(), &p("contract.dsl")).unwrap();
        assert_eq!(contract.name, "trivial");
        assert_eq!(contract.nodes.len(), 2);
        assert_eq!(contract.hops.len(), 1);
        assert_eq!(contract.hops[0].from_node, "src");
        assert_eq!(contract.hops[0].from_directive, "payload");
    }

    #[test]
    fn malformed_hop_port_is_rejected() {
        let src = r#"
            CONTRACT bad {
                INVOKE_NAME=run; INVOKE_PAYLOAD=episode_start; SEED_WAVE=w; EPOCHS=1; BATCH_SIZE=1;
                NODE a { TYPE=x; DOMAIN=source; };
                HOP { FROM=noportdot; TO=a.payload; };
            }
        "#;
        assert!(parse_contract_dsl(src, &p("contract.dsl")).is_err());
    }

    #[test]
    fn duplicate_node_instance_names_are_rejected() {
        let src = r#"
            CONTRACT bad {
                INVOKE_NAME=run; INVOKE_PAYLOAD=episode_start; SEED_WAVE=w; EPOCHS=1; BATCH_SIZE=1;
                NODE a { TYPE=x; DOMAIN=source; };
                NODE a { TYPE=y; DOMAIN=sink; };
            }
        "#;
        assert!(parse_contract_dsl(src, &p("contract.dsl")).is_err());
    }
}
