//! Hover adapter. Dispatches on the node at `pos`, most
//! specific entry first; falls back to `None` when nothing applies.

use crate::analysis::{analyze, AnalyzeOptions};
use crate::host_model::{HelperDoc, HostModel};
use crate::pos::{LineIndex, Span};
use crate::query::{self, ResolvedKind};
use crate::types::{format_type, Type};

#[derive(Clone, Debug)]
pub struct HoverResult {
    pub contents: String,
    pub range: Span,
}

fn render_helper(doc: &HelperDoc) -> String {
    let mut out = format!("{}\n\n{}", doc.signature, doc.description);
    for param in &doc.params {
        let opt = if param.optional { " (optional)" } else { "" };
        out.push_str(&format!("\n- `{}`: {}{}", param.name, param.description, opt));
    }
    out.push_str(&format!("\n\nreturns {}", doc.returns));
    if let Some(example) = &doc.example {
        out.push_str(&format!("\n\n```\n{example}\n```"));
    }
    out
}

/// The base expression ends exactly one byte before a member/method
/// property starts (the `.`/`:` indexer sits there), so resolving just
/// behind the property span lands on the immediate base -- not the
/// leftmost name in a longer `a.b.c` chain.
fn base_type_at(analysis: &crate::analysis::Analysis, property_span: Span) -> Option<Type> {
    let base_pos = property_span.start.saturating_sub(1);
    let base_resolved = query::resolve_at(analysis, base_pos)?;
    Some(base_resolved.ty)
}

fn word_at(source: &str, pos: u32) -> String {
    let pos = (pos as usize).min(source.len());
    let before = &source[..pos];
    let after = &source[pos..];
    let start = before.rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).map(|i| i + 1).unwrap_or(0);
    let end_rel = after.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).unwrap_or(after.len());
    format!("{}{}", &before[start..], &after[..end_rel])
}

pub fn hover(source: &str, pos: u32, host_model: &HostModel, hook: Option<&str>) -> Option<HoverResult> {
    let analysis = analyze(source, AnalyzeOptions { host_model, hook });
    let resolved = query::resolve_at(&analysis, pos)?;
    let name_text = resolved.name.map(|n| analysis.interner.resolve(n).to_string());

    if resolved.kind == ResolvedKind::MemberProperty {
        if let Some(name) = &name_text {
            if let Some(base_ty) = base_type_at(&analysis, resolved.span) {
                match &base_ty {
                    Type::Global(g) if g == "helpers" => {
                        if let Some(doc) = host_model.helper(&format!("helpers.{name}")) {
                            return Some(HoverResult { contents: render_helper(doc), range: resolved.span });
                        }
                    }
                    Type::Global(g) if g == "context" => {
                        if let Some(field) = host_model.context_field(hook, name) {
                            let contents = format!("context.{}: {}\n\n{}", field.name, field.type_name, field.description);
                            return Some(HoverResult { contents, range: resolved.span });
                        }
                    }
                    Type::Context(obj) => {
                        if let Some(schema) = host_model.nested_object(obj) {
                            if let Some(field) = schema.fields.iter().find(|f| &f.name == name) {
                                let contents = format!("context.{}.{}: {}\n\n{}", obj, field.name, field.type_name, field.description);
                                return Some(HoverResult { contents, range: resolved.span });
                            }
                        }
                    }
                    Type::Global(lib) => {
                        if let Some(doc) = host_model.builtin_library_docs.get(&format!("{lib}.{name}")) {
                            return Some(HoverResult { contents: render_helper(doc), range: resolved.span });
                        }
                    }
                    Type::Table(_) => {
                        if let Some(field_ty) = base_ty.field(name) {
                            let contents = format!("{name}: {}", format_type(&field_ty));
                            return Some(HoverResult { contents, range: resolved.span });
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if resolved.kind == ResolvedKind::Identifier && resolved.decl.is_none() {
        if let Some(name) = &name_text {
            if let Some(message) = host_model.disabled_globals.get(name) {
                return Some(HoverResult { contents: message.clone(), range: resolved.span });
            }
        }
    }

    if resolved.decl.is_none() {
        let word = word_at(source, pos);
        if !word.is_empty() && host_model.keywords.iter().any(|k| k == &word) {
            return Some(HoverResult { contents: format!("`{word}` -- Script Language keyword"), range: resolved.span });
        }
    }

    if let Some(decl_id) = resolved.decl {
        let decl = analysis.scope_tree.declaration(decl_id);
        let name = analysis.interner.resolve(decl.name);
        let line_index = LineIndex::new(source);
        let def_line = line_index.position(source, decl.definition_span.start).line;
        let mut contents = format!("{name}: {}", format_type(&decl.decl_type));
        if resolved.is_upvalue {
            contents.push_str(" (upvalue)");
        }
        contents.push_str(&format!("\n\ndefined on line {def_line}"));
        if let Some(doc) = &decl.documentation {
            contents.push_str(&format!("\n\n{doc}"));
        }
        return Some(HoverResult { contents, range: resolved.span });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_model::default_host_model;

    #[test]
    fn hover_on_helper_shows_signature() {
        let model = default_host_model();
        let source = "local x = helpers.fetch(\"https://a\")";
        let pos = source.find("fetch").unwrap() as u32 + 1;
        let result = hover(source, pos, &model, None).unwrap();
        assert!(result.contents.contains("helpers.fetch"));
    }

    #[test]
    fn hover_on_context_field_shows_description() {
        let model = default_host_model();
        let source = "local u = context.user";
        let pos = source.find("user").unwrap() as u32 + 1;
        let result = hover(source, pos, &model, None).unwrap();
        assert!(result.contents.contains("context.user"));
    }

    #[test]
    fn hover_on_nested_object_property() {
        let model = default_host_model();
        let source = "local ip = context.request.ip";
        let pos = source.rfind("ip").unwrap() as u32 + 1;
        let result = hover(source, pos, &model, None).unwrap();
        assert!(result.contents.contains("context.RequestInfo.ip") || result.contents.contains("ip"));
    }

    #[test]
    fn hover_on_disabled_global_shows_message() {
        let model = default_host_model();
        let source = "os.exit()";
        let result = hover(source, 1, &model, None).unwrap();
        assert!(result.contents.contains("sandboxed"));
    }

    #[test]
    fn hover_on_local_declaration_shows_type_and_line() {
        let model = default_host_model();
        let source = "local x = 5\nreturn x";
        let pos = source.rfind('x').unwrap() as u32 + 1;
        let result = hover(source, pos, &model, None).unwrap();
        assert!(result.contents.contains("number"));
        assert!(result.contents.contains("line 1"));
    }

    #[test]
    fn hover_on_metatable_field_shows_inherited_type() {
        let model = default_host_model();
        let source = "local base = { f = 1 }\nlocal t = {}\nsetmetatable(t, { __index = base })\nreturn t.f";
        let pos = source.rfind('f').unwrap() as u32;
        let result = hover(source, pos, &model, None).unwrap();
        assert!(result.contents.contains("number"), "expected number in {:?}", result.contents);
    }

    #[test]
    fn hover_on_keyword_shows_static_text() {
        let model = default_host_model();
        let source = "local x = 1\nif x then end";
        let pos = source.find("if").unwrap() as u32 + 1;
        let result = hover(source, pos, &model, None).unwrap();
        assert!(result.contents.contains("keyword"));
    }

    #[test]
    fn hover_on_nothing_returns_none() {
        let model = default_host_model();
        let source = "   ";
        assert!(hover(source, 1, &model, None).is_none());
    }
}
