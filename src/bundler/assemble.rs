//! Final bundle layout.
//!
//! ```text
//! runtime support (load / import)
//! <blank line>
//! luacompactImports[...] = ...     assets
//! <prelude scripts, verbatim>
//! luacompactModules[...] = ...     modules
//! <blank line>
//! <entry script, top level>
//! ```

use super::render::RenderedUnit;

/// Loader code injected at the top of every bundle.
pub const RUNTIME: &str = include_str!("runtime.lua");

/// Rendered pieces of a bundle, in emission order.
#[derive(Debug, Default)]
pub struct Sections<'a> {
    pub imports: &'a [RenderedUnit],
    pub preludes: &'a [String],
    pub modules: &'a [RenderedUnit],
    pub entry: &'a str,
}

/// Runtime support followed by the blank separator line.
pub fn runtime_header() -> String {
    format!("{}\n\n", RUNTIME.trim_end_matches(['\r', '\n']))
}

/// Concatenate all sections into the bundle text.
pub fn assemble(sections: &Sections<'_>) -> String {
    let mut out = runtime_header();

    for unit in sections.imports {
        out.push_str(&unit.body);
    }

    for prelude in sections.preludes {
        out.push_str(prelude);
        if !prelude.ends_with('\n') {
            out.push('\n');
        }
    }

    for unit in sections.modules {
        out.push_str(&unit.body);
    }
    if !sections.modules.is_empty() {
        out.push('\n');
    }

    out.push_str(sections.entry);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(key: &str, body: &str) -> RenderedUnit {
        RenderedUnit {
            key: key.to_owned(),
            body: body.to_owned(),
        }
    }

    #[test]
    fn test_runtime_defines_loader() {
        assert!(RUNTIME.contains("local luacompactModules = {}"));
        assert!(RUNTIME.contains("local luacompactImports = {}"));
        assert!(RUNTIME.contains("local function load(path)"));
        assert!(RUNTIME.contains("local function import(path)"));
    }

    #[test]
    fn test_entry_only() {
        let out = assemble(&Sections {
            entry: "print(\"hi\")",
            ..Sections::default()
        });
        assert_eq!(out, format!("{}print(\"hi\")", runtime_header()));
        assert!(runtime_header().ends_with("end\n\n"));
    }

    #[test]
    fn test_section_order() {
        let imports = [unit("a.json", "IMPORT\n")];
        let preludes = ["PRELUDE".to_owned()];
        let modules = [unit("m.lua", "MODULE1\n"), unit("n.lua", "MODULE2\n")];
        let out = assemble(&Sections {
            imports: &imports,
            preludes: &preludes,
            modules: &modules,
            entry: "ENTRY",
        });

        let body = out.strip_prefix(&runtime_header()).unwrap();
        assert_eq!(body, "IMPORT\nPRELUDE\nMODULE1\nMODULE2\n\nENTRY");
    }

    #[test]
    fn test_prelude_with_trailing_newline_not_doubled() {
        let preludes = ["A\n".to_owned(), "B".to_owned()];
        let out = assemble(&Sections {
            preludes: &preludes,
            entry: "E",
            ..Sections::default()
        });
        assert!(out.ends_with("\n\nA\nB\nE"));
    }
}
