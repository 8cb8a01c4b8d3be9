//! Decoding of Congress.gov and summarizer JSON bodies with the failing
//! field path attached.

use serde::de::DeserializeOwned;
use serde_json::error::Category;

/// Characters of the offending line kept on each side of the error column.
const EXCERPT_RADIUS: usize = 24;

/// A body that did not have the expected shape.
#[derive(Debug, thiserror::Error)]
#[error("{}{problem} (line {line}, column {column}) near `{excerpt}`", at_path(.path))]
pub struct DecodeError {
    /// Dotted serde path to the field that failed, empty at the root.
    pub path: String,
    pub problem: String,
    pub line: usize,
    pub column: usize,
    pub excerpt: String,
}

fn at_path(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}: ")
    }
}

/// Deserializes `body`, reporting the serde path of the first mismatch.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, DecodeError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|err| {
        let path = match err.path().to_string() {
            root if root == "." => String::new(),
            path => path,
        };
        let inner = err.into_inner();
        DecodeError {
            problem: describe(&inner, body),
            line: inner.line(),
            column: inner.column(),
            excerpt: excerpt(body, inner.line(), inner.column()),
            path,
        }
    })
}

/// Short description of what went wrong, without serde's location suffix.
fn describe(err: &serde_json::Error, body: &str) -> String {
    // Gateways in front of api.congress.gov answer maintenance pages as HTML.
    if body.trim_start().starts_with('<') {
        return "received HTML instead of JSON".to_string();
    }
    if err.classify() == Category::Eof {
        return "body ended early".to_string();
    }

    let message = err.to_string();
    let message = match message.rfind(" at line ") {
        Some(idx) => &message[..idx],
        None => message.as_str(),
    };
    match message
        .strip_prefix("invalid type: ")
        .and_then(|rest| rest.split_once(", expected "))
    {
        Some((found, expected)) => format!("expected {expected}, found {found}"),
        None => message.to_string(),
    }
}

/// The characters around `column` on `line` (both 1-based), whitespace runs
/// collapsed so multi-line bodies stay readable in one log field.
fn excerpt(body: &str, line: usize, column: usize) -> String {
    let Some(text) = body.lines().nth(line.saturating_sub(1)) else {
        return String::new();
    };
    let chars: Vec<char> = text.chars().collect();
    let at = column.saturating_sub(1).min(chars.len());
    let from = at.saturating_sub(EXCERPT_RADIUS);
    let to = (at + EXCERPT_RADIUS).min(chars.len());

    let mut out = String::with_capacity(to - from);
    let mut last_space = false;
    for &c in &chars[from..to] {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out.trim().to_string()
}
