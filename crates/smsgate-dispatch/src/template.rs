// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{VAR}` placeholder extraction, rendering and the variable-set digest.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use smsgate_core::SmsGateError;

/// Variables bound for one recipient.
pub type Variables = Map<String, Value>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Sorted, de-duplicated placeholder names in `content`.
pub fn extract_variables(content: &str) -> Vec<String> {
    let mut names: Vec<String> = PLACEHOLDER
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Substitute every placeholder. A name with no value (or `null`) fails the
/// whole render.
pub fn render(content: &str, variables: &Variables) -> Result<String, SmsGateError> {
    let mut missing = None;
    let rendered = PLACEHOLDER.replace_all(content, |caps: &Captures<'_>| {
        let name = &caps[1];
        match variables.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
            Some(other) => other.to_string(),
        }
    });
    match missing {
        Some(name) => Err(SmsGateError::Validation(format!("Missing variable {name}"))),
        None => Ok(rendered.into_owned()),
    }
}

/// Request-level defaults overridden by per-recipient values.
pub fn merge_variables(defaults: &Variables, overrides: &Variables) -> Variables {
    let mut merged = defaults.clone();
    for (k, v) in overrides {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// SHA-256 hex of the variable map, keys sorted, no whitespace.
///
/// Non-ASCII characters are written as `\uXXXX` escapes (UTF-16 code units)
/// so digests stay comparable with hashes already stored for existing jobs.
pub fn vars_hash(variables: &Variables) -> String {
    let sorted: BTreeMap<&String, &Value> = variables.iter().collect();
    let payload = serde_json::to_string(&sorted).unwrap_or_default();
    hex::encode(Sha256::digest(ascii_escape(&payload).as_bytes()))
}

/// Serialized JSON only has non-ASCII text inside string literals, so
/// escaping every such char in place keeps the document valid.
fn ascii_escape(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(v: Value) -> Variables {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn renders_all_placeholders() {
        let text = render(
            "Hi {NAME}, code {CODE}",
            &vars(json!({"NAME": "An", "CODE": "482913"})),
        )
        .unwrap();
        assert_eq!(text, "Hi An, code 482913");
    }

    #[test]
    fn missing_variable_fails() {
        let err = render("Hi {NAME}, code {CODE}", &vars(json!({"NAME": "An"}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing variable CODE");

        let err = render("{CODE}", &vars(json!({"CODE": null}))).unwrap_err();
        assert!(matches!(err, SmsGateError::Validation(_)));
    }

    #[test]
    fn non_string_values_render_as_json_text() {
        let text = render("{N} {OK} {X}", &vars(json!({"N": 42, "OK": true, "X": 1.5}))).unwrap();
        assert_eq!(text, "42 true 1.5");
    }

    #[test]
    fn lowercase_braces_are_literal() {
        let text = render("{name} {CODE}", &vars(json!({"CODE": "1"}))).unwrap();
        assert_eq!(text, "{name} 1");
    }

    #[test]
    fn extract_is_sorted_and_unique() {
        assert_eq!(
            extract_variables("{CODE} for {NAME}, again {CODE} {lower}"),
            vec!["CODE".to_string(), "NAME".to_string()]
        );
        assert!(extract_variables("no placeholders").is_empty());
    }

    #[test]
    fn overrides_win_on_merge() {
        let merged = merge_variables(
            &vars(json!({"BRAND": "Shop", "CODE": "000"})),
            &vars(json!({"CODE": "111"})),
        );
        assert_eq!(merged["BRAND"], "Shop");
        assert_eq!(merged["CODE"], "111");
    }

    #[test]
    fn vars_hash_ignores_key_order() {
        let a = vars(json!({"A": "1", "B": 2}));
        let mut b = Variables::new();
        b.insert("B".into(), json!(2));
        b.insert("A".into(), json!("1"));
        assert_eq!(vars_hash(&a), vars_hash(&b));
        assert_eq!(vars_hash(&a).len(), 64);
        assert_ne!(vars_hash(&a), vars_hash(&vars(json!({"A": "2", "B": 2}))));
    }

    #[test]
    fn vars_hash_matches_compact_sorted_json() {
        let v = vars(json!({"CODE": "111"}));
        let expected = hex::encode(Sha256::digest(br#"{"CODE":"111"}"#));
        assert_eq!(vars_hash(&v), expected);
    }

    #[test]
    fn vars_hash_escapes_non_ascii() {
        let v = vars(json!({"NAME": "Đức", "CODE": "482913"}));
        let expected = hex::encode(Sha256::digest(
            br#"{"CODE":"482913","NAME":"\u0110\u1ee9c"}"#,
        ));
        assert_eq!(vars_hash(&v), expected);
        assert_eq!(
            vars_hash(&v),
            "2482ad8d34ef70cb1534ffecfdea3bffacd32f22fe0def6cbc86e58c5079acb0"
        );

        // Astral characters become a surrogate pair.
        let emoji = vars(json!({"E": "\u{1F600}"}));
        assert_eq!(
            vars_hash(&emoji),
            "eaaea135a7b93caf8b74d900f98e7cb1539feffecf878fddcc70fb502d7935b2"
        );
    }
}
