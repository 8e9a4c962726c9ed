//! Wave DSL grammar: `WAVE <name> { ... WIKIMYEI <path> { ... }; SOURCE <path> { ... }; }`.

use super::{parse_bool, parse_uint, Parser};
use std::collections::HashSet;
use std::path::Path;
use tsiemene_types::{Sampler, TsiemeneError, WaveMode, WaveProfile, WaveSource, WaveWikimyei};

fn parse_mode(tok: &crate::lexer::Token, path: &Path) -> Result<WaveMode, TsiemeneError> {
    match tok.text.to_ascii_lowercase().as_str() {
        "train" => Ok(WaveMode::Train),
        "run" => Ok(WaveMode::Run),
        _ => Err(TsiemeneError::InvalidDsl {
            path: path.to_path_buf(),
            line: tok.line,
            column: tok.column,
            message: format!("MODE must be train|run, got {:?}", tok.text),
        }),
    }
}

fn parse_sampler(tok: &crate::lexer::Token, path: &Path) -> Result<Sampler, TsiemeneError> {
    match tok.text.to_ascii_lowercase().as_str() {
        "sequential" | "sequentialsampler" => Ok(Sampler::Sequential),
        "random" | "randomsampler" => Ok(Sampler::Random),
        _ => Err(TsiemeneError::InvalidDsl {
            path: path.to_path_buf(),
            line: tok.line,
            column: tok.column,
            message: format!("SAMPLER must be sequential|random, got {:?}", tok.text),
        }),
    }
}

struct WikimyeiBuilder {
    path: Option<String>,
    train: Option<bool>,
    profile_id: Option<String>,
}

struct SourceBuilder {
    path: Option<String>,
    symbol: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

fn parse_wikimyei_body(
    p: &mut Parser<'_>,
    path_ctx: &Path,
    header_path: String,
) -> Result<WaveWikimyei, TsiemeneError> {
    p.expect_symbol("{")?;
    let mut b = WikimyeiBuilder {
        path: Some(header_path),
        train: None,
        profile_id: None,
    };
    while p.peek()?.text != "}" {
        let (key, value) = p.parse_assignment()?;
        match key.as_str() {
            "PATH" => b.path = Some(value.text),
            "TRAIN" => b.train = Some(parse_bool(&value, path_ctx)?),
            "PROFILE_ID" => b.profile_id = Some(value.text),
            other => {
                return Err(p.error(value.line, value.column, format!("unknown WIKIMYEI key {other:?}")))
            }
        }
    }
    p.expect_symbol("}")?;
    p.expect_symbol(";")?;
    let line = p.peek()?.line;
    let column = p.peek()?.column;
    Ok(WaveWikimyei {
        path: b.path.ok_or_else(|| p.error(line, column, "WIKIMYEI missing PATH"))?,
        train: b.train.unwrap_or(false),
        profile_id: b
            .profile_id
            .ok_or_else(|| p.error(line, column, "WIKIMYEI missing PROFILE_ID"))?,
    })
}

fn parse_source_body(
    p: &mut Parser<'_>,
    header_path: String,
) -> Result<WaveSource, TsiemeneError> {
    p.expect_symbol("{")?;
    let mut b = SourceBuilder {
        path: Some(header_path),
        symbol: None,
        from: None,
        to: None,
    };
    while p.peek()?.text != "}" {
        let (key, value) = p.parse_assignment()?;
        match key.as_str() {
            "PATH" => b.path = Some(value.text),
            "SYMBOL" => b.symbol = Some(value.text),
            "FROM" => b.from = Some(value.text),
            "TO" => b.to = Some(value.text),
            other => {
                return Err(p.error(value.line, value.column, format!("unknown SOURCE key {other:?}")))
            }
        }
    }
    p.expect_symbol("}")?;
    p.expect_symbol(";")?;
    let line = p.peek()?.line;
    let column = p.peek()?.column;
    Ok(WaveSource {
        path: b.path.ok_or_else(|| p.error(line, column, "SOURCE missing PATH"))?,
        symbol: b.symbol.ok_or_else(|| p.error(line, column, "SOURCE missing SYMBOL"))?,
        from: b.from.ok_or_else(|| p.error(line, column, "SOURCE missing FROM"))?,
        to: b.to.ok_or_else(|| p.error(line, column, "SOURCE missing TO"))?,
    })
}

fn parse_wave_body(p: &mut Parser<'_>, path: &Path, name: String) -> Result<WaveProfile, TsiemeneError> {
    p.expect_symbol("{")?;

    let mut mode = None;
    let mut sampler = None;
    let mut epochs = None;
    let mut batch_size = None;
    let mut max_batches_per_epoch = None;
    let mut wikimyeis = Vec::new();
    let mut sources = Vec::new();
    let mut seen_source_paths: HashSet<String> = HashSet::new();

    loop {
        let tok = p.peek()?;
        if tok.text == "}" {
            break;
        }
        if tok.kind == crate::lexer::TokenKind::Identifier && tok.text == "WIKIMYEI" {
            p.next()?;
            let header = p.expect_scalar()?;
            wikimyeis.push(parse_wikimyei_body(p, path, header.text)?);
            continue;
        }
        if tok.kind == crate::lexer::TokenKind::Identifier && tok.text == "SOURCE" {
            p.next()?;
            let header = p.expect_scalar()?;
            let src = parse_source_body(p, header.text)?;
            if !seen_source_paths.insert(src.path.clone()) {
                return Err(p.error(tok.line, tok.column, format!("duplicate SOURCE path {:?}", src.path)));
            }
            sources.push(src);
            continue;
        }
        let (key, value) = p.parse_assignment()?;
        match key.as_str() {
            "MODE" => mode = Some(parse_mode(&value, path)?),
            "SAMPLER" => sampler = Some(parse_sampler(&value, path)?),
            "EPOCHS" => epochs = Some(parse_uint(&value, path, true)?),
            "BATCH_SIZE" => batch_size = Some(parse_uint(&value, path, true)?),
            "MAX_BATCHES_PER_EPOCH" => max_batches_per_epoch = Some(parse_uint(&value, path, true)?),
            other => {
                return Err(p.error(value.line, value.column, format!("unknown WAVE key {other:?}")))
            }
        }
    }
    p.expect_symbol("}")?;
    p.skip_optional_symbol(";")?;

    let line = p.peek()?.line;
    let column = p.peek()?.column;
    let profile = WaveProfile {
        name,
        mode: mode.ok_or_else(|| p.error(line, column, "WAVE missing MODE"))?,
        sampler: sampler.ok_or_else(|| p.error(line, column, "WAVE missing SAMPLER"))?,
        epochs: epochs.ok_or_else(|| p.error(line, column, "WAVE missing EPOCHS"))?,
        batch_size: batch_size.ok_or_else(|| p.error(line, column, "WAVE missing BATCH_SIZE"))?,
        max_batches_per_epoch,
        wikimyeis,
        sources,
    };
    profile
        .validate()
        .map_err(|message| p.error(line, column, message))?;
    Ok(profile)
}

/// Parses a full wave DSL file: a non-empty sequence of `WAVE <name> { ... }`
/// blocks, rejecting duplicate wave names (I5).
pub fn parse_wave_dsl(source: &str, path: &Path) -> Result<Vec<WaveProfile>, TsiemeneError> {
    let mut p = Parser::new(source, path);
    let mut profiles = Vec::new();
    let mut seen_names: HashSet<String> = HashSet::new();

    while !p.at_end()? {
        p.expect_keyword("WAVE")?;
        let name_tok = p.expect_identifier()?;
        if !seen_names.insert(name_tok.text.clone()) {
            return Err(p.error(
                name_tok.line,
                name_tok.column,
                format!("duplicate WAVE name {:?}", name_tok.text),
            ));
        }
        profiles.push(parse_wave_body(&mut p, path, name_tok.text)?);
    }

    if profiles.is_empty() {
        return Err(TsiemeneError::InvalidDsl {
            path: path.to_path_buf(),
            line: 1,
            column: 1,
            message: "wave DSL must declare at least one WAVE block".to_string(),
        });
    }
    Ok(profiles)
}
