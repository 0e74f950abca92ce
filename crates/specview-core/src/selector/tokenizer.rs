//! Quote- and bracket-aware whitespace splitting.

use super::SelectorError;

/// Split `input` on whitespace, keeping quoted strings and bracketed groups
/// (`()`, `[]`, `{}`) intact. Empty tokens are dropped.
pub fn split_tokens(input: &str) -> Result<Vec<&str>, SelectorError> {
    let mut tokens = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start: Option<usize> = None;

    for (idx, c) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        // An escape outside quotes makes the next character literal.
        if escaped {
            escaped = false;
            continue;
        }

        if c.is_whitespace() && stack.is_empty() {
            if let Some(s) = start.take() {
                tokens.push(&input[s..idx]);
            }
            continue;
        }

        if start.is_none() {
            start = Some(idx);
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '\\' => escaped = true,
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return Err(SelectorError::Unbalanced {
                        fragment: fragment_from(input, start),
                    });
                }
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err(SelectorError::UnterminatedQuote {
            fragment: fragment_from(input, start),
        });
    }
    if !stack.is_empty() {
        return Err(SelectorError::Unbalanced {
            fragment: fragment_from(input, start),
        });
    }
    if let Some(s) = start {
        tokens.push(&input[s..]);
    }
    Ok(tokens)
}

fn fragment_from(input: &str, start: Option<usize>) -> String {
    input[start.unwrap_or(0)..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split() {
        assert_eq!(
            split_tokens("  div.foo   > .bar ").unwrap(),
            vec!["div.foo", ">", ".bar"]
        );
    }

    #[test]
    fn test_brackets_keep_whitespace() {
        assert_eq!(
            split_tokens("div.foo > .bar:has(span b) li").unwrap(),
            vec!["div.foo", ">", ".bar:has(span b)", "li"]
        );
        assert_eq!(
            split_tokens(r#"@Label{patrick: "stewart"} .bar"#).unwrap(),
            vec![r#"@Label{patrick: "stewart"}"#, ".bar"]
        );
        assert_eq!(
            split_tokens("a[title='x y'] b").unwrap(),
            vec!["a[title='x y']", "b"]
        );
    }

    #[test]
    fn test_quotes_hide_brackets() {
        assert_eq!(
            split_tokens(r#"@Foo{label: "a } b"} span"#).unwrap(),
            vec![r#"@Foo{label: "a } b"}"#, "span"]
        );
        assert_eq!(
            split_tokens(r#"@Foo{label: 'it\'s here'}"#).unwrap(),
            vec![r#"@Foo{label: 'it\'s here'}"#]
        );
    }

    #[test]
    fn test_unbalanced() {
        assert!(matches!(
            split_tokens("@Foo{a: 1"),
            Err(SelectorError::Unbalanced { .. })
        ));
        assert!(matches!(
            split_tokens("div) span"),
            Err(SelectorError::Unbalanced { .. })
        ));
        assert!(matches!(
            split_tokens("@Foo{a: 'x}"),
            Err(SelectorError::UnterminatedQuote { .. })
        ));
    }

    #[test]
    fn test_empty() {
        assert!(split_tokens("   ").unwrap().is_empty());
    }
}
