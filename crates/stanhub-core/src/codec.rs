//! Decode/encode pair for the project's declarative config file.

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};

/// Converts between config file text and a generic ordered key/value tree.
pub trait ConfigCodec: Send + Sync {
    fn decode(&self, content: &str) -> Result<Value>;
    fn encode(&self, value: &Value) -> Result<String>;
}

/// NEON in block form, the format of `phpstan.neon`.
///
/// Block NEON is read through the YAML parser once tab indentation is
/// expanded and bare `%param%` scalars are quoted. Entity syntax such as
/// `Foo(bar)` still fails to decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeonCodec;

const TAB_WIDTH: usize = 4;

impl ConfigCodec for NeonCodec {
    fn decode(&self, content: &str) -> Result<Value> {
        let normalized = quote_placeholders(&expand_indent_tabs(content));
        let value: Value =
            serde_yaml::from_str(&normalized).context("config file is not valid NEON")?;
        Ok(match value {
            Value::Null => Value::Mapping(Mapping::new()),
            other => other,
        })
    }

    fn encode(&self, value: &Value) -> Result<String> {
        let text = serde_yaml::to_string(value).context("failed to encode config")?;
        Ok(unquote_placeholders(&text))
    }
}

fn expand_indent_tabs(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let (indent, rest) = line.split_at(indent_len);
        for ch in indent.chars() {
            if ch == '\t' {
                out.push_str(&" ".repeat(TAB_WIDTH));
            } else {
                out.push(ch);
            }
        }
        out.push_str(rest);
    }
    out
}

/// Byte offset of the scalar on a block line: past the indentation, any
/// `- ` markers and a plain `key: ` prefix.
fn scalar_start(line: &str) -> Option<usize> {
    let leading = |s: &str| s.len() - s.trim_start_matches(' ').len();
    let mut pos = leading(line);
    let mut in_sequence = false;
    while line[pos..].starts_with("- ") {
        in_sequence = true;
        pos += 2;
        pos += leading(&line[pos..]);
    }

    let rest = &line[pos..];
    match rest.find(": ") {
        Some(sep) if !rest[..sep].contains(['\'', '"', '#', '[', '{']) => {
            let value = pos + sep + 2;
            Some(value + leading(&line[value..]))
        }
        _ if in_sequence => Some(pos),
        _ => None,
    }
}

fn split_line_end(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\n', '\r']);
    line.split_at(body.len())
}

/// YAML reads a leading `%` as a directive, so `%rootDir%/src` style values
/// are wrapped in single quotes before parsing.
fn quote_placeholders(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        match scalar_start(line) {
            Some(start) if line[start..].starts_with('%') => {
                let (body, line_end) = split_line_end(&line[start..]);
                let (scalar, comment) = body.split_at(body.find(" #").unwrap_or(body.len()));
                out.push_str(&line[..start]);
                out.push('\'');
                out.push_str(&scalar.trim_end().replace('\'', "''"));
                out.push('\'');
                out.push_str(comment);
                out.push_str(line_end);
            }
            _ => out.push_str(line),
        }
    }
    out
}

/// Writes quoted `%param%` scalars back in their bare NEON form.
fn unquote_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        if let Some(start) = scalar_start(line) {
            let (body, line_end) = split_line_end(&line[start..]);
            let bare = body
                .strip_prefix("'%")
                .and_then(|b| b.strip_suffix('\''))
                .filter(|inner| !inner.contains(['\'', '#']) && !inner.contains(": "));
            if let Some(inner) = bare {
                out.push_str(&line[..start]);
                out.push('%');
                out.push_str(inner);
                out.push_str(line_end);
                continue;
            }
        }
        out.push_str(line);
    }
    out
}
