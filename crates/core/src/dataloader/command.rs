//! `@step` command grammar (§4.7): empty, `batches=N`, `SYMBOL[dd.mm.yyyy,dd.mm.yyyy]`,
//! or the two combined (`batches=N` bounds the range's emission count).

use tsiemene_common::civil::parse_ddmmyyyy_to_unix_ms;
use tsiemene_types::TsiemeneError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Continue the currently active episode, if any.
    Continue,
    /// Emit up to `n` batches, pulling from the shared loader cursor.
    Batches(u64),
    /// Restrict to the inclusive millisecond key range `[from_ms, to_ms]`,
    /// optionally bounded by `batches=N`.
    Range {
        symbol: Option<String>,
        from_ms: i64,
        to_ms: i64,
        batches: Option<u64>,
    },
}

fn invalid(command: &str, reason: impl Into<String>) -> TsiemeneError {
    TsiemeneError::InvalidCommand {
        command: command.to_string(),
        reason: reason.into(),
    }
}

fn parse_range(body: &str, raw: &str) -> Result<(Option<String>, i64, i64), TsiemeneError> {
    let (head, rest) = body
        .split_once('[')
        .ok_or_else(|| invalid(raw, "expected SYMBOL[from,to]"))?;
    // The bracketed span may be followed by trailing command text (e.g. a
    // combined `;batches=N`), so find the matching ']' rather than requiring
    // it at the end of the string.
    let close = rest
        .find(']')
        .ok_or_else(|| invalid(raw, "missing closing ']'"))?;
    let rest = &rest[..close];
    let (from, to) = rest
        .split_once(',')
        .ok_or_else(|| invalid(raw, "expected from,to inside brackets"))?;
    let from_ms = parse_ddmmyyyy_to_unix_ms(from.trim(), false)
        .map_err(|e| invalid(raw, format!("bad FROM date: {e}")))?;
    let to_ms = parse_ddmmyyyy_to_unix_ms(to.trim(), true)
        .map_err(|e| invalid(raw, format!("bad TO date: {e}")))?;
    // The symbol is whatever precedes '[', trimmed; a leading `batches=N;`
    // (combined-command prefix) is discarded by keeping only the text after
    // the last ';'.
    let head = head.trim();
    let head = match head.rfind(';') {
        Some(semi) => head[semi + 1..].trim(),
        None => head,
    };
    let symbol = if head.is_empty() {
        None
    } else {
        Some(head.to_string())
    };
    Ok((symbol, from_ms, to_ms))
}

/// Extracts an explicit `batches=N` count appearing anywhere in the command
/// text, so it can combine with a `SYMBOL[from,to]` range in the same
/// command (§4.7: "`batches=N` combined with a range bounds the range
/// emission").
fn parse_batches_explicit(raw: &str) -> Result<Option<u64>, TsiemeneError> {
    let Some(at) = raw.find("batches=") else {
        return Ok(None);
    };
    let digits: String = raw[at + "batches=".len()..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return Ok(Some(0));
    }
    digits
        .parse()
        .map(Some)
        .map_err(|_| invalid(raw, format!("{digits:?} is not a valid batch count")))
}

/// Parses a raw `@step` command payload per §4.7's grammar.
pub fn parse_command(raw: &str) -> Result<Command, TsiemeneError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Command::Continue);
    }

    if trimmed.contains('[') {
        let (symbol, from_ms, to_ms) = parse_range(trimmed, raw)?;
        if to_ms < from_ms {
            return Err(invalid(raw, "TO precedes FROM"));
        }
        let batches = parse_batches_explicit(trimmed)?;
        return Ok(Command::Range {
            symbol,
            from_ms,
            to_ms,
            batches,
        });
    }

    if let Some(n) = parse_batches_explicit(trimmed)? {
        return Ok(Command::Batches(n));
    }

    Err(invalid(raw, "unrecognized @step command"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_continues() {
        assert_eq!(parse_command("").unwrap(), Command::Continue);
        assert_eq!(parse_command("   ").unwrap(), Command::Continue);
    }

    #[test]
    fn batches_command_parses_count() {
        assert_eq!(parse_command("batches=12").unwrap(), Command::Batches(12));
    }

    #[test]
    fn range_command_parses_symbol_and_bounds() {
        let cmd = parse_command("BTCUSDT[03.01.2023,05.01.2023]").unwrap();
        match cmd {
            Command::Range {
                symbol,
                from_ms,
                to_ms,
                batches,
            } => {
                assert_eq!(symbol.as_deref(), Some("BTCUSDT"));
                assert!(from_ms < to_ms);
                assert_eq!(batches, None);
            }
            other => panic!("expected Range, got {other:?}"),
        }
    }

    #[test]
    fn range_without_leading_symbol_is_accepted() {
        let cmd = parse_command("[03.01.2023,05.01.2023]").unwrap();
        match cmd {
            Command::Range { symbol, .. } => assert_eq!(symbol, None),
            other => panic!("expected Range, got {other:?}"),
        }
    }

    #[test]
    fn range_combined_with_batches_bounds_the_range() {
        let cmd = parse_command("BTCUSDT[03.01.2023,05.01.2023];batches=5").unwrap();
        match cmd {
            Command::Range { symbol, batches, .. } => {
                assert_eq!(symbol.as_deref(), Some("BTCUSDT"));
                assert_eq!(batches, Some(5));
            }
            other => panic!("expected Range, got {other:?}"),
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(parse_command("BTCUSDT[05.01.2023,03.01.2023]").is_err());
    }

    #[test]
    fn garbage_command_is_rejected() {
        assert!(parse_command("???").is_err());
    }
}
