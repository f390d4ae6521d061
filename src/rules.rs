//! Validation rule mapper.
//!
//! A rule string is a comma-separated list of `name` / `name=param` tokens;
//! commas inside `[...]` do not split. Each recognized rule becomes a schema
//! constraint when it fits the schema's structural type. Unknown names,
//! mismatched types and unparsable bounds are skipped without error.
use serde_json::{Number, Value};

use crate::schema::{JsonType, PropertySchema};

// ------------------------------- Tables ----------------------------------- //

/// Rules that pin a fixed, anchored pattern on a string.
pub const PATTERN_RULES: &[(&str, &str)] = &[
    ("alpha", "^[a-zA-Z]+$"),
    ("alphanum", "^[a-zA-Z0-9]+$"),
    ("alphanumunicode", "^[\\p{L}\\p{N}]+$"),
    ("alphaunicode", "^\\p{L}+$"),
    ("numeric", "^[0-9]+$"),
    ("hexadecimal", "^[0-9a-fA-F]+$"),
    ("lowercase", "^[a-z]+$"),
    ("uppercase", "^[A-Z]+$"),
    ("ascii", "^[\\x00-\\x7F]*$"),
];

/// Rules that set a string `format`.
pub const FORMAT_RULES: &[(&str, &str)] = &[
    ("email", "email"),
    ("url", "uri"),
    ("uri", "uri"),
    ("http_url", "uri"),
    ("uuid", "uuid"),
    ("uuid3", "uuid"),
    ("uuid4", "uuid"),
    ("uuid5", "uuid"),
    ("uuid_rfc4122", "uuid"),
    ("ipv4", "ipv4"),
    ("ipv6", "ipv6"),
    ("ip", "ip"),
    ("datetime", "date-time"),
    ("date", "date"),
    ("hostname", "hostname"),
    ("fqdn", "hostname"),
];

const DIVE: &str = "dive";
const KEYS: &str = "keys";
const END_KEYS: &str = "endkeys";

fn lookup(table: &'static [(&'static str, &'static str)], name: &str) -> Option<&'static str> {
    table.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
}

// ------------------------------- Parsing ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule<'a> {
    pub name: &'a str,
    pub param: &'a str,
}

/// Parse a rule string into trimmed, non-empty rules.
pub fn parse_rules(raw: &str) -> Vec<Rule<'_>> {
    split_rules(raw)
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((name, param)) => Rule { name, param },
            None => Rule { name: part, param: "" },
        })
        .collect()
}

/// Split on top-level commas; commas inside `[...]` stay in their token.
fn split_rules(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, ch) in raw.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth <= 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < raw.len() {
        parts.push(&raw[start..]);
    }
    parts
}

// ------------------------------- Mapping ---------------------------------- //

/// Apply a raw rule string to `schema` in place. Returns whether the field is
/// marked `required`. The schema's structural type must already be set.
pub fn apply(schema: &mut PropertySchema, raw: &str) -> bool {
    let rules = parse_rules(raw);
    apply_rules(schema, &rules)
}

fn apply_rules(schema: &mut PropertySchema, rules: &[Rule<'_>]) -> bool {
    let dive = rules.iter().position(|r| r.name == DIVE);
    let own = match dive {
        Some(idx) => {
            if dive_into(schema, &rules[idx + 1..]) {
                &rules[..idx]
            } else {
                rules
            }
        }
        None => rules,
    };
    apply_own(schema, own)
}

/// Rules after `dive` constrain each element (arrays) or each value (maps).
/// Returns false when the schema has nothing to dive into.
fn dive_into(schema: &mut PropertySchema, rules: &[Rule<'_>]) -> bool {
    match schema.ty {
        Some(JsonType::Array) => match schema.items.as_deref_mut() {
            Some(items) => {
                apply_rules(items, rules);
                true
            }
            None => false,
        },
        Some(JsonType::Object) => match schema.additional_properties.as_deref_mut() {
            Some(values) => {
                apply_rules(values, skip_key_rules(rules));
                true
            }
            None => false,
        },
        _ => false,
    }
}

/// Drop a leading `keys ... endkeys` block; key constraints have no place in
/// `additionalProperties`.
fn skip_key_rules<'r, 'a>(rules: &'r [Rule<'a>]) -> &'r [Rule<'a>] {
    match rules.first() {
        Some(first) if first.name == KEYS => {
            match rules.iter().position(|r| r.name == END_KEYS) {
                Some(end) => &rules[end + 1..],
                None => &[],
            }
        }
        _ => rules,
    }
}

fn apply_own(schema: &mut PropertySchema, rules: &[Rule<'_>]) -> bool {
    let mut required = false;

    // A link carries no structural constraint of its own.
    if schema.is_link() {
        return rules.iter().any(|r| r.name == "required");
    }

    let ty = schema.ty;
    let is_string = ty == Some(JsonType::String);
    let is_numeric = ty.is_some_and(JsonType::is_numeric);
    let is_array = ty == Some(JsonType::Array);

    for rule in rules {
        match rule.name {
            "required" => required = true,

            "min" => {
                if is_string {
                    if let Some(n) = parse_length(rule.param) { schema.min_length = Some(n); }
                } else if is_numeric {
                    if let Some(n) = parse_number(rule.param) { schema.minimum = Some(n); }
                } else if is_array {
                    if let Some(n) = parse_length(rule.param) { schema.min_items = Some(n); }
                }
            }
            "max" => {
                if is_string {
                    if let Some(n) = parse_length(rule.param) { schema.max_length = Some(n); }
                } else if is_numeric {
                    if let Some(n) = parse_number(rule.param) { schema.maximum = Some(n); }
                } else if is_array {
                    if let Some(n) = parse_length(rule.param) { schema.max_items = Some(n); }
                }
            }
            "len" => {
                if let Ok(n) = rule.param.trim().parse::<u64>() {
                    if is_string {
                        schema.min_length = Some(n);
                        schema.max_length = Some(n);
                    } else if is_array {
                        schema.min_items = Some(n);
                        schema.max_items = Some(n);
                    }
                }
            }
            "gte" | "lte" | "gt" | "lt" if is_numeric => {
                if let Some(n) = parse_number(rule.param) {
                    match rule.name {
                        "gte" => schema.minimum = Some(n),
                        "lte" => schema.maximum = Some(n),
                        "gt" => schema.exclusive_minimum = Some(n),
                        _ => schema.exclusive_maximum = Some(n),
                    }
                }
            }

            "oneof" => {
                if let Some(values) = enum_values(rule.param, ty) {
                    schema.enumeration = Some(values);
                }
            }

            "contains" if is_string && !rule.param.is_empty() => {
                schema.pattern = Some(regex::escape(rule.param));
            }
            "startswith" if is_string && !rule.param.is_empty() => {
                schema.pattern = Some(format!("^{}", regex::escape(rule.param)));
            }
            "endswith" if is_string && !rule.param.is_empty() => {
                schema.pattern = Some(format!("{}$", regex::escape(rule.param)));
            }

            "base64" if is_string => {
                schema.content_encoding = Some("base64".into());
            }

            name if is_string => {
                if let Some(format) = lookup(FORMAT_RULES, name) {
                    schema.format = Some(format.to_string());
                } else if let Some(pattern) = lookup(PATTERN_RULES, name) {
                    schema.pattern = Some(pattern.to_string());
                }
            }

            _ => {}
        }
    }

    required
}

// ------------------------------- Params ----------------------------------- //

/// Length bound: any non-negative number, truncated.
fn parse_length(param: &str) -> Option<u64> {
    let v = param.trim().parse::<f64>().ok()?;
    (v.is_finite() && v >= 0.0).then_some(v as u64)
}

/// Numeric bound, kept integral when the parameter is.
fn parse_number(param: &str) -> Option<Number> {
    let param = param.trim();
    if let Ok(i) = param.parse::<i64>() {
        return Some(Number::from(i));
    }
    if let Ok(u) = param.parse::<u64>() {
        return Some(Number::from(u));
    }
    let f = param.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        return Some(Number::from(f as i64));
    }
    Number::from_f64(f)
}

/// Whitespace-separated literals. Numeric schemas get numeric members when
/// every literal parses; otherwise members stay strings. Boolean schemas take
/// the rule only when every literal is `true` or `false`.
fn enum_values(param: &str, ty: Option<JsonType>) -> Option<Vec<Value>> {
    let literals: Vec<&str> = param.split_whitespace().collect();
    if literals.is_empty() {
        return None;
    }
    match ty {
        Some(JsonType::String) | None => Some(literals.into_iter().map(Value::from).collect()),
        Some(JsonType::Boolean) => literals
            .into_iter()
            .map(|lit| lit.parse::<bool>().ok().map(Value::Bool))
            .collect(),
        Some(t) if t.is_numeric() => literals
            .into_iter()
            .map(|lit| parse_number(lit).map(Value::Number))
            .collect::<Option<Vec<_>>>()
            .or_else(|| Some(param.split_whitespace().map(Value::from).collect())),
        _ => None,
    }
}

// ------------------------------- Tests ------------------------------------ //
