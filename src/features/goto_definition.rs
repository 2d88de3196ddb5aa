//! Goto-definition adapter. Resolves the node at `pos` and,
//! when it is a bound identifier, returns its declaration's preferred
//! location -- unless the caret is already sitting inside that same
//! definition span, in which case there is nowhere to jump.

use crate::analysis::{analyze, AnalyzeOptions};
use crate::host_model::HostModel;
use crate::pos::{LineIndex, Pos};
use crate::query::{self, ResolvedKind};

#[derive(Clone, Debug)]
pub struct DefinitionLocation {
    pub span: crate::pos::Span,
    pub start: Pos,
    pub end: Pos,
}

pub fn goto_definition(source: &str, pos: u32, host_model: &HostModel, hook: Option<&str>) -> Option<DefinitionLocation> {
    let analysis = analyze(source, AnalyzeOptions { host_model, hook });
    let resolved = query::resolve_at(&analysis, pos)?;

    let target_span = match resolved.kind {
        ResolvedKind::Identifier => {
            let decl_id = resolved.decl?;
            let decl = analysis.scope_tree.declaration(decl_id);
            if decl.definition_span.contains_inclusive(pos) {
                log::trace!("goto_definition: caret already inside definition span at {pos}");
                return None;
            }
            decl.definition_span
        }
        ResolvedKind::MemberProperty => {
            // Only a table-backed field (constructor entry, `t.k = v`, or
            // `function t.k() end`) has a location to jump to -- namespace
            // members like `context.user` resolve to a schema, not a span.
            let name = resolved.name.map(|n| analysis.interner.resolve(n).to_string())?;
            let base_pos = resolved.span.start.saturating_sub(1);
            let base_ty = query::resolve_at(&analysis, base_pos)?.ty;
            base_ty.field_span(&name)?
        }
        ResolvedKind::TableKey
        | ResolvedKind::Keyword
        | ResolvedKind::StringLiteral
        | ResolvedKind::NumberLiteral
        | ResolvedKind::Other => return None,
    };

    let line_index = LineIndex::new(source);
    Some(DefinitionLocation {
        span: target_span,
        start: line_index.position(source, target_span.start),
        end: line_index.position(source, target_span.end),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_model::default_host_model;

    #[test]
    fn goto_definition_jumps_to_local_binding() {
        let model = default_host_model();
        let source = "local x = 1\nreturn x";
        let pos = source.rfind('x').unwrap() as u32;
        let loc = goto_definition(source, pos, &model, None).unwrap();
        assert_eq!(loc.start.line, 1);
    }

    #[test]
    fn goto_definition_on_metatable_field_points_inside_base_constructor() {
        let model = default_host_model();
        let source = "local base = { f = 1 }\nlocal t = {}\nsetmetatable(t, { __index = base })\nreturn t.f";
        let pos = source.rfind('f').unwrap() as u32;
        let loc = goto_definition(source, pos, &model, None).unwrap();
        let base_f = source.find("f = 1").unwrap() as u32;
        assert_eq!(loc.span.start, base_f);
    }

    #[test]
    fn goto_definition_inside_own_declaration_returns_none() {
        let model = default_host_model();
        let source = "local x = 1";
        let pos = source.find('x').unwrap() as u32;
        assert!(goto_definition(source, pos, &model, None).is_none());
    }

    #[test]
    fn goto_definition_on_unresolved_global_returns_none() {
        let model = default_host_model();
        let source = "return undeclared_name";
        let pos = source.find("undeclared_name").unwrap() as u32 + 1;
        assert!(goto_definition(source, pos, &model, None).is_none());
    }

    #[test]
    fn goto_definition_on_member_property_returns_none() {
        let model = default_host_model();
        let source = "local u = context.user";
        let pos = source.rfind("user").unwrap() as u32 + 1;
        assert!(goto_definition(source, pos, &model, None).is_none());
    }
}
