//! INI-like parsing: `[SECTION]` headers, `key = value` lines, `#`/`;` line
//! comments, `/* */` block comments, single/double-quoted string values.

use std::collections::BTreeMap;
use tsiemene_common::text::unquote;

/// Parsed sections: `section -> key -> value`, case-preserved as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    pub sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl GlobalConfig {
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections.get(section)?.get(key).map(|s| s.as_str())
    }

    pub fn get_list(&self, section: &str, key: &str) -> Option<Vec<String>> {
        self.get(section, key)
            .map(tsiemene_common::text::split_quote_aware)
    }
}

/// Strips `/* ... */` block comments from raw `.config` text, preserving
/// line structure so error messages (if any) still point near the right line.
fn strip_block_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '\n' {
                    out.push('\n');
                }
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Strips a trailing `#` or `;` line comment, respecting quoted spans.
fn strip_line_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '#' || c == ';' => return &line[..i],
            None => {}
        }
    }
    line
}

/// Parses `.config` text into sections. Unrecognized sections/keys are kept
/// verbatim; semantic validation happens separately in [`crate::validate`].
pub fn parse_ini(text: &str) -> GlobalConfig {
    let text = strip_block_comments(text);
    let mut config = GlobalConfig::default();
    let mut current_section = String::new();

    for raw_line in text.lines() {
        let line = strip_line_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(stripped) = line.strip_prefix('[') {
            if let Some(name) = stripped.strip_suffix(']') {
                current_section = name.trim().to_string();
                config.sections.entry(current_section.clone()).or_default();
                continue;
            }
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim().to_string();
            let value = unquote(value.trim());
            config
                .sections
                .entry(current_section.clone())
                .or_default()
                .insert(key, value);
        }
    }
    config
}
