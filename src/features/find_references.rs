//! Find-references adapter. Built entirely on
//! `query::resolve_at` + `query::references_of` -- there is no regex or
//! textual fallback, so a position over an unresolved identifier (an
//! undeclared global, a member property, a syntax-error gap) yields zero
//! results rather than a best-effort text search.

use crate::analysis::{analyze, AnalyzeOptions};
use crate::host_model::HostModel;
use crate::pos::{LineIndex, Pos, Span};
use crate::query::{self, ResolvedKind};

#[derive(Clone, Debug)]
pub struct ReferenceLocation {
    pub span: Span,
    pub start: Pos,
    pub end: Pos,
}

pub fn find_references(
    source: &str,
    pos: u32,
    host_model: &HostModel,
    hook: Option<&str>,
    include_declaration: bool,
) -> Vec<ReferenceLocation> {
    let analysis = analyze(source, AnalyzeOptions { host_model, hook });
    let Some(resolved) = query::resolve_at(&analysis, pos) else { return Vec::new() };
    if resolved.kind != ResolvedKind::Identifier {
        return Vec::new();
    }
    let Some(decl_id) = resolved.decl else { return Vec::new() };

    let line_index = LineIndex::new(source);
    let mut spans = query::references_of(&analysis, decl_id);
    if !include_declaration {
        let decl = analysis.scope_tree.declaration(decl_id);
        spans.retain(|s| *s != decl.definition_span);
    }
    spans
        .into_iter()
        .map(|span| ReferenceLocation {
            span,
            start: line_index.position(source, span.start),
            end: line_index.position(source, span.end),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_model::default_host_model;

    #[test]
    fn find_references_includes_all_usages() {
        let model = default_host_model();
        let source = "local x = 1\nreturn x + x";
        let pos = source.find('x').unwrap() as u32 + 1;
        let refs = find_references(source, pos, &model, None, true);
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn find_references_without_declaration_excludes_definition() {
        let model = default_host_model();
        let source = "local x = 1\nreturn x + x";
        let pos = source.find('x').unwrap() as u32 + 1;
        let refs = find_references(source, pos, &model, None, false);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn find_references_on_member_property_is_empty() {
        let model = default_host_model();
        let source = "local u = context.user";
        let pos = source.rfind("user").unwrap() as u32 + 1;
        assert!(find_references(source, pos, &model, None, true).is_empty());
    }

    #[test]
    fn find_references_on_undeclared_global_is_empty() {
        let model = default_host_model();
        let source = "return undeclared_name";
        let pos = source.find("undeclared_name").unwrap() as u32 + 1;
        assert!(find_references(source, pos, &model, None, true).is_empty());
    }

    #[test]
    fn find_references_from_a_usage_finds_the_declaration_too() {
        let model = default_host_model();
        let source = "local function greet(name)\nend\ngreet(\"a\")\ngreet(\"b\")";
        let pos = source.rfind("greet").unwrap() as u32 + 1;
        let refs = find_references(source, pos, &model, None, true);
        assert_eq!(refs.len(), 3);
    }

    /// `setmetatable(t, { __index = base })`'s `base` use must not be
    /// recorded twice: once by the enclosing `StmtKind::Call` walk (which
    /// walks every argument, including the `{ __index = base }` table) and
    /// once by `handle_setmetatable_call` re-walking the same identifier.
    #[test]
    fn find_references_through_setmetatable_index_counts_base_once() {
        let model = default_host_model();
        let source = "local base = { f = 1 }\nlocal t = {}\nsetmetatable(t, { __index = base })\nreturn base";
        let pos = source.find("base").unwrap() as u32 + 1;
        let refs = find_references(source, pos, &model, None, true);
        // Declaration + the `__index = base` use + the final `return base` use.
        assert_eq!(refs.len(), 3);
    }
}
