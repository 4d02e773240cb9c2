//! Strips `//` and `/* */` comments and trailing commas from
//! `devcontainer.json`/`devcontainer-feature.json` source before handing it
//! to `serde_json`. No crate in the workspace speaks JSON-with-comments, so
//! this is a small manual scanner rather than a full JSON5 parser: it only
//! needs to produce valid strict JSON, not re-derive JSON's grammar.

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    InString,
    InLineComment,
    InBlockComment,
}

/// Strips comments, preserving string contents verbatim (including `//` or
/// `/*` that happen to appear inside a quoted string). Operates on raw bytes
/// so multi-byte UTF-8 sequences inside strings pass through untouched.
pub fn strip_comments(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut state = State::Normal;
    let mut i = 0;
    let mut escaped = false;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Normal => {
                if b == b'"' {
                    state = State::InString;
                    out.push(b);
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                    state = State::InLineComment;
                    i += 1;
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    state = State::InBlockComment;
                    i += 1;
                } else {
                    out.push(b);
                }
            }
            State::InString => {
                out.push(b);
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    state = State::Normal;
                }
            }
            State::InLineComment => {
                if b == b'\n' {
                    state = State::Normal;
                    out.push(b'\n');
                }
            }
            State::InBlockComment => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = State::Normal;
                    i += 1;
                }
            }
        }
        i += 1;
    }

    let joined = String::from_utf8(out).expect("comment stripping never splits a UTF-8 sequence");
    strip_trailing_commas(&joined)
}

/// Removes a `,` that is followed (skipping whitespace) only by `}` or `]`.
/// Strict JSON rejects these, but `devcontainer.json` authors routinely
/// leave them after an editor reformat.
fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == ',' {
            let rest = &input[idx + 1..];
            let next_significant = rest.trim_start();
            if next_significant.starts_with('}') || next_significant.starts_with(']') {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_comments() {
        let input = "{\n  \"image\": \"ubuntu\", // base image\n  \"features\": {}\n}";
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["image"], "ubuntu");
    }

    #[test]
    fn strips_block_comments() {
        let input = "{ /* leading */ \"image\": \"ubuntu\" /* trailing */ }";
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["image"], "ubuntu");
    }

    #[test]
    fn preserves_slashes_inside_strings() {
        let input = r#"{ "dockerFile": "path/to//Dockerfile" }"#;
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["dockerFile"], "path/to//Dockerfile");
    }

    #[test]
    fn strips_trailing_comma_before_closing_brace() {
        let input = r#"{ "a": 1, "b": 2, }"#;
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["b"], 2);
    }

    #[test]
    fn strips_trailing_comma_before_closing_bracket() {
        let input = r#"{ "runServices": ["a", "b", ] }"#;
        let stripped = strip_comments(input);
        let value: serde_json::Value = serde_json::from_str(&stripped).unwrap();
        assert_eq!(value["runServices"][1], "b");
    }
}
