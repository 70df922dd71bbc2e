//! Lexical scan for `load("...")` and `import("...")` calls.
//!
//! This is not a parser. Lines are split on whitespace and a
//! token counts only when it *starts* with the call form, so `myload("x")`
//! or `obj.import("x")` are ignored. Calls spanning lines, calls inside block
//! comments and non-literal arguments are not detected.

use super::discover::{DiscoveredFile, SCRIPT_EXTENSIONS, normalize_relative};

/// Call form that pulls in a script module.
pub const LOAD_CALL: &str = "load(";
/// Call form that pulls in a data or opaque asset.
pub const IMPORT_CALL: &str = "import(";

const LINE_COMMENT: &str = "--";

/// Targets found in one or more scripts, in first-seen order without repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet {
    pub load_targets: Vec<String>,
    pub import_targets: Vec<String>,
}

impl ReferenceSet {
    pub fn is_empty(&self) -> bool {
        self.load_targets.is_empty() && self.import_targets.is_empty()
    }

    /// Append targets of `other` that are not already present.
    pub fn merge(&mut self, other: Self) {
        for target in other.load_targets {
            push_unique(&mut self.load_targets, target);
        }
        for target in other.import_targets {
            push_unique(&mut self.import_targets, target);
        }
    }
}

fn push_unique(targets: &mut Vec<String>, target: String) {
    if !targets.contains(&target) {
        targets.push(target);
    }
}

/// Extract the load and import targets referenced by `script`.
pub fn scan(script: &str) -> ReferenceSet {
    let mut references = ReferenceSet::default();

    for line in script.lines() {
        if line.trim_start().starts_with(LINE_COMMENT) {
            continue;
        }

        for token in line.split_whitespace() {
            if let Some(target) = call_argument(token, LOAD_CALL) {
                push_unique(&mut references.load_targets, target);
            } else if let Some(target) = call_argument(token, IMPORT_CALL) {
                push_unique(&mut references.import_targets, target);
            }
        }
    }

    references
}

/// Argument of `call` when `token` starts with it and passes a string literal.
///
/// `load("a/b")` → `a/b`, `load('a/b'),` → `a/b`, `load(name)` → `None`
fn call_argument(token: &str, call: &str) -> Option<String> {
    let rest = token.strip_prefix(call)?;
    let argument = rest.find(')').map_or(rest, |end| &rest[..end]).trim();

    let quote = argument.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let literal = argument.strip_prefix(quote)?.strip_suffix(quote)?;
    if literal.is_empty() || literal.contains(['"', '\'']) {
        return None;
    }

    Some(normalize_relative(literal))
}

/// Find the discovered file a target names.
///
/// A target matches a relative path exactly, or with a script extension
/// appended (`util/strings` → `util/strings.lua`, then `.luau`).
pub fn resolve_target<'a>(
    target: &str,
    files: &'a [DiscoveredFile],
) -> Option<&'a DiscoveredFile> {
    let target = normalize_relative(target);
    let find = |candidate: &str| files.iter().find(|f| f.relative_path == candidate);

    find(&target).or_else(|| {
        SCRIPT_EXTENSIONS
            .iter()
            .find_map(|ext| find(&format!("{target}.{ext}")))
    })
}
