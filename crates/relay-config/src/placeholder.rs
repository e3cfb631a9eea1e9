//! `{{ name }}` placeholder rendering
//!
//! One scanner serves two callers: config-file environment expansion and
//! substitution of caller data into prompts.

use std::convert::Infallible;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// Matches `{{ key }}` and `{{ key | default("fallback") }}`
fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([a-zA-Z0-9_.\-]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#)
            .expect("placeholder pattern must be valid regex")
    })
}

/// Render every placeholder in `template` through `resolve`
///
/// `resolve` receives the key and the optional default. Returning `Ok(None)`
/// leaves the placeholder text untouched.
pub(crate) fn render<E>(
    template: &str,
    mut resolve: impl FnMut(&str, Option<&str>) -> Result<Option<String>, E>,
) -> Result<String, E> {
    let mut output = String::with_capacity(template.len());
    let mut last_end = 0;

    for captures in pattern().captures_iter(template) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        let key = captures.get(1).map_or("", |m| m.as_str());
        let default = captures.get(2).map(|m| m.as_str());

        output.push_str(&template[last_end..whole.start()]);
        match resolve(key, default)? {
            Some(value) => output.push_str(&value),
            None => output.push_str(whole.as_str()),
        }
        last_end = whole.end();
    }

    output.push_str(&template[last_end..]);
    Ok(output)
}

/// Substitute `{{ path.to.field }}` placeholders with values from `data`
///
/// Strings are inserted verbatim, other JSON values in compact form. Paths
/// that do not resolve fall back to the placeholder's default, or are left
/// as written.
pub fn substitute(template: &str, data: &Value) -> String {
    let rendered = render::<Infallible>(template, |key, default| {
        Ok(lookup(data, key)
            .map(display_value)
            .or_else(|| default.map(ToOwned::to_owned)))
    });

    match rendered {
        Ok(text) => text,
        Err(never) => match never {},
    }
}

/// Walk a dotted path through objects and arrays
fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
