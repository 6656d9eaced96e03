use serde_json::Value;

const MAX_TOTAL_ATTEMPTS: u8 = 4;

/// Result of trying to coax a JSON object out of an LLM's raw text
/// response.
#[derive(Debug, Clone)]
pub struct JsonExtraction {
    pub data: Option<Value>,
    pub error: Option<String>,
    pub repaired: bool,
    pub repair_count: u8,
}

/// Extract the first balanced `{...}` object from `text` and parse it,
/// falling back to an ordered, bounded repair pipeline when the raw
/// extraction doesn't parse as-is.
pub fn parse_llm_json(text: &str) -> JsonExtraction {
    let mut attempts = 0u8;

    let Some(candidate) = extract_balanced_object(text) else {
        return JsonExtraction {
            data: None,
            error: Some("no balanced JSON object found".to_string()),
            repaired: false,
            repair_count: 0,
        };
    };

    attempts += 1;
    if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
        return JsonExtraction { data: Some(value), error: None, repaired: false, repair_count: 0 };
    }

    let mut working = candidate;
    let mut repair_count = 0u8;
    let repairs: [fn(&str) -> String; 4] =
        [strip_fenced_code_blocks, fix_trailing_commas, quote_bare_keys, normalize_quotes];

    for repair in repairs {
        if attempts >= MAX_TOTAL_ATTEMPTS {
            break;
        }
        working = repair(&working);
        attempts += 1;
        repair_count += 1;
        if let Ok(value) = serde_json::from_str::<Value>(&working) {
            return JsonExtraction { data: Some(value), error: None, repaired: true, repair_count };
        }
    }

    JsonExtraction {
        data: None,
        error: Some("exhausted repair attempts without valid JSON".to_string()),
        repaired: repair_count > 0,
        repair_count,
    }
}

/// Bracket-depth, string/escape-aware scan for the first balanced
/// `{...}` span.
fn extract_balanced_object(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        let c = b as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + 1;
                    return Some(text[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_fenced_code_blocks(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim().trim_end_matches("```").trim().to_string()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim().trim_end_matches("```").trim().to_string()
    } else {
        text.to_string()
    }
}

fn fix_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Quote bare object keys like `{foo: 1}` -> `{"foo": 1}`. Conservative:
/// only matches an identifier directly after `{` or `,` (ignoring
/// whitespace) and before a `:`.
fn quote_bare_keys(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        if c == '{' || c == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                out.push(chars[j]);
                j += 1;
            }
            if j < chars.len() && (chars[j].is_alphabetic() || chars[j] == '_') {
                let start = j;
                while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let mut k = j;
                while k < chars.len() && chars[k].is_whitespace() {
                    k += 1;
                }
                if k < chars.len() && chars[k] == ':' {
                    let key: String = chars[start..j].iter().collect();
                    out.push('"');
                    out.push_str(&key);
                    out.push('"');
                    i = j;
                    continue;
                }
            }
        }
        i += 1;
    }
    out
}

fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_without_repair() {
        let result = parse_llm_json(r#"{"claims": []}"#);
        assert!(result.data.is_some());
        assert!(!result.repaired);
        assert_eq!(result.repair_count, 0);
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let text = "Sure, here's the extraction:\n```json\n{\"claims\": [1, 2]}\n```\nLet me know if you need more.";
        let result = parse_llm_json(text);
        assert!(result.data.is_some());
    }

    #[test]
    fn repairs_trailing_comma() {
        let result = parse_llm_json(r#"{"claims": [1, 2,]}"#);
        assert!(result.data.is_some());
        assert!(result.repaired);
    }

    #[test]
    fn repairs_bare_keys() {
        let result = parse_llm_json(r#"{claims: [1, 2]}"#);
        assert!(result.data.is_some());
        assert!(result.repaired);
    }

    #[test]
    fn gives_up_on_unrecoverable_text() {
        let result = parse_llm_json("not json at all");
        assert!(result.data.is_none());
    }
}
