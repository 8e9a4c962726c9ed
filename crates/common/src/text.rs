/// Splits a comma-separated list while respecting single/double quoted
/// spans (a comma inside quotes does not split), then trims and unquotes
/// each field. Used by the `.config` parser for list-valued keys.
pub fn split_quote_aware(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ',' => {
                fields.push(unquote(current.trim()));
                current.clear();
            }
            None => current.push(c),
        }
    }
    fields.push(unquote(current.trim()));
    fields.into_iter().filter(|f| !f.is_empty()).collect()
}

/// Strips one layer of matching surrounding quotes, if present.
pub fn unquote(input: &str) -> String {
    let bytes = input.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return input[1..input.len() - 1].to_string();
        }
    }
    input.to_string()
}

/// Case-insensitive boolean parsing for the `{true,1,yes,on}` /
/// `{false,0,no,off}` scalar convention shared by the DSLs and the config
/// space.
pub fn parse_bool_token(token: &str) -> Option<bool> {
    match token.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn splits_plain_list() {
        assert_eq!(split_quote_aware("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn keeps_commas_inside_quotes() {
        assert_eq!(
            split_quote_aware("\"a,b\", c"),
            vec!["a,b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn parses_bool_tokens_case_insensitively() {
        assert_eq!(parse_bool_token("On"), Some(true));
        assert_eq!(parse_bool_token("No"), Some(false));
        assert_eq!(parse_bool_token("maybe"), None);
    }

    #[test_case("\"quoted\"", "quoted"; "double quoted")]
    #[test_case("'quoted'", "quoted"; "single quoted")]
    #[test_case("bare", "bare"; "unquoted passes through")]
    #[test_case("\"mismatched'", "\"mismatched'"; "mismatched quotes are left alone")]
    #[test_case("\"\"", ""; "empty quoted string")]
    fn unquote_strips_one_matching_layer(input: &str, expected: &str) {
        assert_eq!(unquote(input), expected);
    }
}
