//! Signature help. Scans backward from the caret balancing
//! parens to find the enclosing call and the active (comma-counted)
//! parameter, then renders the callee's signature from whichever source
//! knows about it -- the helper catalog or a locally bound function.

use std::collections::HashMap;

use crate::analysis::{analyze, AnalyzeOptions};
use crate::host_model::HostModel;
use crate::query::{self, ResolvedKind};
use crate::types::Type;

#[derive(Clone, Debug)]
pub struct SignatureParam {
    pub label: String,
    pub documentation: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SignatureResult {
    pub label: String,
    pub params: Vec<SignatureParam>,
    pub active_param: usize,
}

/// Walks backward from `pos`, balancing `)`/`(` (ignoring string/comment
/// contents is deliberately skipped -- this is a best-effort backward scan,
/// not a re-lex), and returns `(open_paren_offset, active_param)`.
fn find_enclosing_call(source: &str, pos: u32) -> Option<(u32, usize)> {
    let bytes = source.as_bytes();
    let mut depth = 0i32;
    let mut commas = 0usize;
    let mut i = (pos as usize).min(bytes.len());
    while i > 0 {
        i -= 1;
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                if depth == 0 {
                    return Some((i as u32, commas));
                }
                depth -= 1;
            }
            b',' if depth == 0 => commas += 1,
            _ => {}
        }
    }
    None
}

pub fn signature(source: &str, pos: u32, host_model: &HostModel, hook: Option<&str>) -> Option<SignatureResult> {
    let (open_paren, active_param) = find_enclosing_call(source, pos)?;
    let callee_pos = open_paren.checked_sub(1)?;

    let analysis = analyze(source, AnalyzeOptions { host_model, hook });
    let resolved = query::resolve_at(&analysis, callee_pos)?;
    let name = resolved.name.map(|n| analysis.interner.resolve(n).to_string())?;

    if resolved.kind == ResolvedKind::MemberProperty {
        let base_pos = resolved.span.start.saturating_sub(1);
        let base_ty = query::resolve_at(&analysis, base_pos).map(|r| r.ty);
        if let Some(Type::Global(g)) = &base_ty {
            if g == "helpers" {
                if let Some(doc) = host_model.helper(&format!("helpers.{name}")) {
                    let params = doc
                        .params
                        .iter()
                        .map(|p| SignatureParam { label: p.name.clone(), documentation: Some(p.description.clone()) })
                        .collect();
                    return Some(SignatureResult { label: doc.signature.clone(), params, active_param });
                }
            }
        }
    }

    if let Some(decl_id) = resolved.decl {
        let decl = analysis.scope_tree.declaration(decl_id);
        if let Type::Function(f) = &decl.decl_type {
            let param_docs = parse_param_docs(decl.documentation.as_deref());
            let params: Vec<SignatureParam> = f
                .params
                .iter()
                .map(|p| SignatureParam { label: p.name.clone(), documentation: param_docs.get(&p.name).cloned() })
                .collect();
            let label = format!("{}({})", name, params.iter().map(|p| p.label.clone()).collect::<Vec<_>>().join(", "));
            return Some(SignatureResult { label, params, active_param });
        }
    }

    None
}

/// Extracts `@param name description` lines from a doc comment. Anything
/// that isn't an `@param` line is ignored -- signature help only needs the
/// per-parameter text.
fn parse_param_docs(doc: Option<&str>) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(doc) = doc else { return out };
    for line in doc.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix("@param") else { continue };
        let rest = rest.trim();
        let mut parts = rest.splitn(2, char::is_whitespace);
        let Some(name) = parts.next() else { continue };
        let description = parts.next().unwrap_or("").trim().to_string();
        out.insert(name.to_string(), description);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_model::default_host_model;

    #[test]
    fn signature_for_helper_call_shows_catalog_params() {
        let model = default_host_model();
        let source = "local x = helpers.fetch(\"https://a\", ";
        let pos = source.len() as u32;
        let result = signature(source, pos, &model, None).unwrap();
        assert_eq!(result.active_param, 1);
        assert!(result.params.iter().any(|p| p.label == "options"));
    }

    #[test]
    fn signature_tracks_active_param_at_first_argument() {
        let model = default_host_model();
        let source = "local x = helpers.matches(";
        let pos = source.len() as u32;
        let result = signature(source, pos, &model, None).unwrap();
        assert_eq!(result.active_param, 0);
    }

    #[test]
    fn signature_for_local_function_uses_param_names() {
        let model = default_host_model();
        let source = "local function greet(name, loud)\nend\ngreet(";
        let pos = source.len() as u32;
        let result = signature(source, pos, &model, None).unwrap();
        assert_eq!(result.params.len(), 2);
        assert_eq!(result.params[0].label, "name");
    }

    #[test]
    fn signature_none_outside_any_call() {
        let model = default_host_model();
        let source = "local x = 1";
        assert!(signature(source, source.len() as u32, &model, None).is_none());
    }
}
