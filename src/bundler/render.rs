//! Rendering of project files into bundle table assignments.
//!
//! | Kind   | Emitted as                                                   |
//! |--------|--------------------------------------------------------------|
//! | Script | `luacompactModules[key] = function() <indented body> end`    |
//! | JSON   | `luacompactImports[key] = function() <table build> end`      |
//! | Opaque | `luacompactImports[key] = function() return "\1\2..." end`   |

use regex::Regex;
use serde_json::Value;
use std::{fmt::Write, sync::LazyLock};

/// Runtime table holding module closures.
pub const MODULES_TABLE: &str = "luacompactModules";
/// Runtime table holding asset closures.
pub const IMPORTS_TABLE: &str = "luacompactImports";

const INDENT: &str = "\t";

/// `_NAME = "some.module"` on a script's first line renames its module key.
static NAME_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*_name\s*=\s*["']([^"']+)["']\s*;?\s*$"#)
        .expect("name directive pattern is valid")
});

/// One rendered module or import, keyed for its runtime table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedUnit {
    pub key: String,
    pub body: String,
}

// ============================================================================
// Scripts
// ============================================================================

/// Split off a leading name directive.
///
/// Returns the declared name and the remaining source, or `None` when the
/// first line is an ordinary statement.
pub fn name_directive(source: &str) -> Option<(String, &str)> {
    let (first, rest) = source.split_once('\n').unwrap_or((source, ""));
    let name = NAME_DIRECTIVE.captures(first)?.get(1)?.as_str().trim();
    (!name.is_empty()).then(|| (name.to_owned(), rest))
}

/// Wrap a script in a module closure keyed by its path or declared name.
pub fn render_module(relative_path: &str, source: &str) -> RenderedUnit {
    let (key, source) = match name_directive(source) {
        Some((name, rest)) => (name, rest),
        None => (relative_path.to_owned(), source),
    };

    let body = format!(
        "{MODULES_TABLE}[{}] = function()\n{}\nend\n",
        lua_string(&key),
        indent(source)
    );
    RenderedUnit { key, body }
}

/// Prefix every line with one indent unit.
///
/// Lines exactly one character long are left alone; on CRLF sources those
/// are the blank lines (a lone `\r`).
fn indent(source: &str) -> String {
    source
        .split('\n')
        .map(|line| {
            if line.chars().count() == 1 {
                line.to_owned()
            } else {
                format!("{INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// JSON assets
// ============================================================================

/// Rebuild a JSON document as table construction code.
///
/// Top-level keys become `object["key"] = value` statements in document
/// order. Nested values are rendered as table constructors.
pub fn render_json(relative_path: &str, source: &str) -> Result<RenderedUnit, serde_json::Error> {
    let value: Value = serde_json::from_str(source)?;
    let mut body = format!(
        "{IMPORTS_TABLE}[{}] = function()\n",
        lua_string(relative_path)
    );

    match &value {
        Value::Object(map) => {
            body.push_str("\tlocal object = {}\n");
            for (key, value) in map {
                let _ = writeln!(body, "\tobject[{}] = {}", lua_string(key), lua_value(value));
            }
            body.push_str("\treturn object\n");
        }
        other => {
            let _ = writeln!(body, "\treturn {}", lua_value(other));
        }
    }
    body.push_str("end\n\n");

    Ok(RenderedUnit {
        key: relative_path.to_owned(),
        body,
    })
}

/// Lua literal for a JSON value.
pub fn lua_value(value: &Value) -> String {
    match value {
        Value::Null => "nil".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => lua_string(s),
        Value::Array(items) if items.is_empty() => "{}".into(),
        Value::Array(items) => {
            let items: Vec<_> = items.iter().map(lua_value).collect();
            format!("{{ {} }}", items.join(", "))
        }
        Value::Object(map) if map.is_empty() => "{}".into(),
        Value::Object(map) => {
            let fields: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("[{}] = {}", lua_string(k), lua_value(v)))
                .collect();
            format!("{{ {} }}", fields.join(", "))
        }
    }
}

// ============================================================================
// Opaque assets
// ============================================================================

/// Embed arbitrary bytes as a string literal returned by the import closure.
pub fn render_opaque(relative_path: &str, bytes: &[u8]) -> RenderedUnit {
    let body = format!(
        "{IMPORTS_TABLE}[{}] = function()\n\treturn \"{}\"\nend\n",
        lua_string(relative_path),
        encode_bytes(bytes)
    );
    RenderedUnit {
        key: relative_path.to_owned(),
        body,
    }
}

/// Every byte as a decimal escape: `[104, 105]` → `\104\105`.
///
/// Escaping all bytes keeps the literal unambiguous (a digit never follows
/// an escape directly) and binary-safe.
pub fn encode_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 4);
    for byte in bytes {
        let _ = write!(out, "\\{byte}");
    }
    out
}

/// Quote `s` as a double-quoted Lua string literal.
pub fn lua_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // padded so a following digit is not read as part of the escape
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\{:03}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
