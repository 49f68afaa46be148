//! JSON extraction and best-effort structural repair for completion output.

/// First ```json fenced block, else the first `{` through its matching `}`. An object
/// that never closes runs to the end of the text.
pub fn extract_json(text: &str) -> Option<String> {
    if let Some(block) = fenced_json_block(text) {
        return Some(block);
    }

    let start = text.find('{')?;
    let candidate = &text[start..];
    let end = balanced_end(candidate).unwrap_or(candidate.len());
    Some(candidate[..end].trim().to_string())
}

fn fenced_json_block(text: &str) -> Option<String> {
    let lower = text.to_ascii_lowercase();
    let tag = lower.find("```json")?;
    let after_tag = tag + "```json".len();
    let body_start = text[after_tag..]
        .find('\n')
        .map(|nl| after_tag + nl + 1)
        .unwrap_or(after_tag);
    let body = &text[body_start..];
    // A missing closing fence means the output was cut off; keep everything.
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    Some(body.to_string())
}

/// Byte offset just past the `}` that closes the object opening at index 0.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, ch) in s.char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_strict(s: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(s).ok()
}

/// Parse `candidate`, applying repair batches in order until one parses:
/// structural balancing (braces, brackets, open string), missing commas between
/// adjacent objects, then trailing commas. Each batch builds on the previous one.
pub fn parse_with_repairs(candidate: &str) -> Option<serde_json::Value> {
    if let Some(v) = parse_strict(candidate) {
        return Some(v);
    }

    let balanced = balance_structure(candidate);
    if let Some(v) = parse_strict(&balanced) {
        tracing::debug!("completion JSON recovered after structural balancing");
        return Some(v);
    }

    let with_commas = insert_missing_commas(&balanced);
    if let Some(v) = parse_strict(&with_commas) {
        tracing::debug!("completion JSON recovered after inserting missing commas");
        return Some(v);
    }

    let cleaned = remove_trailing_commas(&with_commas);
    let parsed = parse_strict(&cleaned);
    if parsed.is_some() {
        tracing::debug!("completion JSON recovered after removing trailing commas");
    }
    parsed
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjState {
    Key,
    Colon,
    Value,
    Next,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object(ObjState),
    Array,
}

fn mark_value_started(stack: &mut [Frame]) {
    if let Some(Frame::Object(state @ ObjState::Value)) = stack.last_mut() {
        *state = ObjState::Next;
    }
}

/// Close whatever the text left open.
///
/// A closer that does not match the innermost open container first closes the
/// containers nested inside it, so `[2,3}` becomes `[2,3]}`. Stray closers with nothing
/// open are dropped. At end of input an open string is terminated, a dangling key or
/// colon gets a `null` value, and every open container is closed innermost first.
pub fn balance_structure(s: &str) -> String {
    let s = finish_trailing_token(s);

    let mut out = String::with_capacity(s.len() + 8);
    let mut stack: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut string_is_key = false;
    let mut escape = false;

    for ch in s.chars() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
                if string_is_key {
                    if let Some(Frame::Object(state)) = stack.last_mut() {
                        *state = ObjState::Colon;
                    }
                }
            }
            continue;
        }

        match ch {
            '"' => {
                string_is_key = matches!(stack.last(), Some(Frame::Object(ObjState::Key)));
                if !string_is_key {
                    mark_value_started(&mut stack);
                }
                in_string = true;
                out.push(ch);
            }
            '{' => {
                mark_value_started(&mut stack);
                stack.push(Frame::Object(ObjState::Key));
                out.push(ch);
            }
            '[' => {
                mark_value_started(&mut stack);
                stack.push(Frame::Array);
                out.push(ch);
            }
            '}' | ']' => {
                let want_object = ch == '}';
                loop {
                    match stack.last() {
                        None => break,
                        Some(Frame::Object(_)) if want_object => {
                            stack.pop();
                            out.push('}');
                            break;
                        }
                        Some(Frame::Array) if !want_object => {
                            stack.pop();
                            out.push(']');
                            break;
                        }
                        Some(frame) => {
                            out.push(closer(*frame));
                            stack.pop();
                        }
                    }
                }
            }
            ':' => {
                if let Some(Frame::Object(state @ ObjState::Colon)) = stack.last_mut() {
                    *state = ObjState::Value;
                }
                out.push(ch);
            }
            ',' => {
                if let Some(Frame::Object(state @ ObjState::Next)) = stack.last_mut() {
                    *state = ObjState::Key;
                }
                out.push(ch);
            }
            c if c.is_whitespace() => out.push(c),
            c => {
                mark_value_started(&mut stack);
                out.push(c);
            }
        }
    }

    if in_string {
        if escape {
            out.pop();
        }
        strip_partial_unicode_escape(&mut out);
        out.push('"');
        if string_is_key {
            if let Some(Frame::Object(state)) = stack.last_mut() {
                *state = ObjState::Colon;
            }
        }
    }

    match stack.last() {
        Some(Frame::Object(ObjState::Colon)) => out.push_str(":null"),
        Some(Frame::Object(ObjState::Value)) => out.push_str("null"),
        _ => {}
    }

    while let Some(frame) = stack.pop() {
        out.push(closer(frame));
    }

    out
}

fn closer(frame: Frame) -> char {
    match frame {
        Frame::Object(_) => '}',
        Frame::Array => ']',
    }
}

/// Drop a `\u` escape that lost some of its hex digits.
fn strip_partial_unicode_escape(out: &mut String) {
    let bytes = out.as_bytes();
    let tail_hex = bytes
        .iter()
        .rev()
        .take(4)
        .take_while(|b| b.is_ascii_hexdigit())
        .count();
    let marker = bytes.len().saturating_sub(tail_hex);
    if marker >= 2 && &bytes[marker - 2..marker] == b"\\u" && tail_hex < 4 {
        // An odd run of backslashes means the `\u` is a real escape.
        let slashes = bytes[..marker - 1]
            .iter()
            .rev()
            .take_while(|b| **b == b'\\')
            .count();
        if slashes % 2 == 1 {
            out.truncate(marker - 2);
        }
    }
}

/// Complete or trim a literal or number cut off at end of input.
fn finish_trailing_token(s: &str) -> String {
    if ends_inside_string(s) {
        return s.to_string();
    }

    let token_start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-'))
        .last()
        .map(|(i, _)| i);
    let Some(token_start) = token_start else {
        return s.to_string();
    };

    let (head, token) = s.split_at(token_start);
    let first = token.chars().next().unwrap_or(' ');
    let mut out = head.to_string();

    if first.is_ascii_alphabetic() {
        let completed = ["true", "false", "null"]
            .into_iter()
            .find(|lit| lit.starts_with(token));
        out.push_str(completed.unwrap_or(token));
    } else {
        let trimmed = token.trim_end_matches(|c: char| matches!(c, '.' | 'e' | 'E' | '+' | '-'));
        out.push_str(trimmed);
    }
    out
}

fn ends_inside_string(s: &str) -> bool {
    let mut in_string = false;
    let mut escape = false;
    for ch in s.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        }
    }
    in_string
}

/// `} {` -> `}, {` outside of strings.
pub fn insert_missing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        out.push(ch);
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '}' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if next == Some(&'{') {
                    out.push(',');
                }
            }
            _ => {}
        }
    }
    out
}

/// `,}` / `,]` -> `}` / `]` outside of strings.
pub fn remove_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("Here you go:\n```json\n{body}\n```\nThanks");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix {\"b\":2}";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn extract_json_keeps_truncated_tail() {
        let s = "```json\n{\"a\":[1,2";
        assert_eq!(extract_json(s), Some("{\"a\":[1,2".to_string()));
        let s = "answer: {\"a\":{\"b\":1}";
        assert_eq!(extract_json(s), Some("{\"a\":{\"b\":1}".to_string()));
    }

    #[test]
    fn extract_json_ignores_braces_inside_strings() {
        let s = "x {\"a\":\"}\"} y";
        assert_eq!(extract_json(s), Some("{\"a\":\"}\"}".to_string()));
    }

    #[test]
    fn repairs_missing_bracket_before_brace() {
        let v = parse_with_repairs("{\"a\":1,\"b\":[2,3}").unwrap();
        assert_eq!(v, json!({"a": 1, "b": [2, 3]}));
    }

    #[test]
    fn repairs_missing_commas_between_objects() {
        let v = parse_with_repairs("{\"items\":[{\"t\":\"VTI\"} {\"t\":\"BND\"}]}").unwrap();
        assert_eq!(v, json!({"items": [{"t": "VTI"}, {"t": "BND"}]}));
    }

    #[test]
    fn repairs_trailing_commas() {
        let v = parse_with_repairs("{\"a\":[1,2,],\"b\":3,}").unwrap();
        assert_eq!(v, json!({"a": [1, 2], "b": 3}));
    }

    #[test]
    fn repairs_truncated_string_and_dangling_key() {
        assert_eq!(
            parse_with_repairs("{\"a\":{\"b\":\"hel").unwrap(),
            json!({"a": {"b": "hel"}})
        );
        assert_eq!(
            parse_with_repairs("{\"a\":1,\"b").unwrap(),
            json!({"a": 1, "b": null})
        );
        assert_eq!(
            parse_with_repairs("{\"a\":tr").unwrap(),
            json!({"a": true})
        );
        assert_eq!(
            parse_with_repairs("{\"a\":1.5e-").unwrap(),
            json!({"a": 1.5})
        );
    }

    #[test]
    fn balance_keeps_braces_inside_strings() {
        assert_eq!(balance_structure("{\"a\":\"[{\""), "{\"a\":\"[{\"}");
    }

    #[test]
    fn every_truncation_of_a_valid_object_is_recovered() {
        let docs = [
            json!({
                "suggestions": [
                    {"ticker": "VTI", "name": "Vanguard \"Total\" Market", "allocation": 35.5, "type": "ETF"},
                    {"ticker": "BND", "name": "Bonds \u{00e9}t\u{00e9}", "allocation": -1.25e2, "type": null}
                ],
                "analysis": "Balanced {not json} [text]",
                "flags": [true, false, null],
                "nested": {"a": {"b": [[], {}]}}
            }),
            json!({"a": "\\u0041 escaped", "b": "tab\tand\\slash"}),
        ];

        for doc in docs {
            let text = serde_json::to_string_pretty(&doc).unwrap();
            for (cut, _) in text.char_indices().skip(1) {
                let truncated = &text[..cut];
                let repaired = parse_with_repairs(truncated);
                assert!(
                    repaired.is_some(),
                    "failed to repair truncation at {cut}: {truncated:?} -> {:?}",
                    remove_trailing_commas(&insert_missing_commas(&balance_structure(truncated)))
                );
            }
            assert_eq!(parse_with_repairs(&text), Some(doc));
        }
    }
}
