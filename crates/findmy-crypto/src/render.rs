//! Depth-limited human-readable rendering of decoded plist values.
//!
//! Dictionaries render as nested `{ key: value }` blocks and arrays as nested
//! lists, indented two spaces per level. Byte strings render as a length plus
//! a 20-byte hex preview, dates in ISO-8601. Rendering never alters the
//! decoded value; it is purely diagnostic.

use std::fmt::Write as _;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Nesting depth at which rendering stops with an error instead of recursing
/// further. Recursion is bounded by input size, but the limit converts an
/// adversarially deep value into a reported error rather than stack
/// exhaustion.
pub const MAX_RENDER_DEPTH: usize = 128;

const DATA_PREVIEW_LEN: usize = 20;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    #[error("value nesting exceeds {MAX_RENDER_DEPTH} levels")]
    DepthLimitExceeded,
}

/// Render a decoded plist value as an indented multi-line string.
///
/// # Errors
///
/// [`RenderError::DepthLimitExceeded`] when nesting passes
/// [`MAX_RENDER_DEPTH`].
pub fn render_value(value: &plist::Value) -> Result<String, RenderError> {
    let mut out = String::new();
    render_into(&mut out, value, 0)?;
    Ok(out)
}

fn render_into(out: &mut String, value: &plist::Value, depth: usize) -> Result<(), RenderError> {
    if depth > MAX_RENDER_DEPTH {
        return Err(RenderError::DepthLimitExceeded);
    }
    let pad = "  ".repeat(depth);

    match value {
        plist::Value::Dictionary(dict) => {
            out.push_str("{\n");
            for (key, item) in dict.iter() {
                let _ = write!(out, "{pad}  {key}: ");
                render_into(out, item, depth + 1)?;
                out.push('\n');
            }
            let _ = write!(out, "{pad}}}");
        }
        plist::Value::Array(items) => {
            out.push_str("[\n");
            for item in items {
                let _ = write!(out, "{pad}  ");
                render_into(out, item, depth + 1)?;
                out.push('\n');
            }
            let _ = write!(out, "{pad}]");
        }
        plist::Value::Data(bytes) => {
            let preview: String = bytes
                .iter()
                .take(DATA_PREVIEW_LEN)
                .map(|b| format!("{b:02x}"))
                .collect();
            let more = if bytes.len() > DATA_PREVIEW_LEN { "..." } else { "" };
            let _ = write!(out, "<{} bytes: {preview}{more}>", bytes.len());
        }
        plist::Value::Date(date) => {
            let timestamp: SystemTime = (*date).into();
            let _ = write!(
                out,
                "<datetime: {}>",
                DateTime::<Utc>::from(timestamp).to_rfc3339_opts(SecondsFormat::Secs, true)
            );
        }
        plist::Value::Boolean(value) => {
            let _ = write!(out, "{value}");
        }
        plist::Value::Integer(value) => {
            let _ = write!(out, "{value}");
        }
        plist::Value::Real(value) => {
            let _ = write!(out, "{value}");
        }
        plist::Value::String(value) => out.push_str(value),
        other => {
            let _ = write!(out, "{other:?}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_render_inline() {
        assert_eq!(render_value(&plist::Value::Boolean(true)).unwrap(), "true");
        assert_eq!(
            render_value(&plist::Value::String("hello".into())).unwrap(),
            "hello"
        );
        assert_eq!(
            render_value(&plist::Value::Integer(42.into())).unwrap(),
            "42"
        );
    }

    #[test]
    fn short_data_has_no_ellipsis() {
        let rendered = render_value(&plist::Value::Data(vec![0xDE, 0xAD])).unwrap();
        assert_eq!(rendered, "<2 bytes: dead>");
    }

    #[test]
    fn long_data_previews_first_twenty_bytes() {
        let rendered = render_value(&plist::Value::Data(vec![0x41; 64])).unwrap();
        assert_eq!(rendered, format!("<64 bytes: {}...>", "41".repeat(20)));
    }

    #[test]
    fn epoch_date_renders_iso8601() {
        let value = plist::Value::Date(plist::Date::from(std::time::SystemTime::UNIX_EPOCH));
        assert_eq!(
            render_value(&value).unwrap(),
            "<datetime: 1970-01-01T00:00:00Z>"
        );
    }
}
