//! Completion adapter. Repairs the buffer, resolves the
//! member/global context at the caret, and ranks candidates by boost.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::analysis::{analyze, AnalyzeOptions, Analysis};
use crate::host_model::HostModel;
use crate::query::{self, ReturnSchema, Resolved, ResolvedKind};
use crate::repair;
use crate::types::{format_type, TableType, Type};

#[derive(Clone, Debug)]
pub struct CompletionItem {
    pub label: String,
    pub boost: i32,
    pub detail: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CompletionResult {
    pub from: u32,
    pub options: Vec<CompletionItem>,
    /// `/^\w*$/` -- every label this adapter emits matches it.
    pub valid_for: &'static str,
}

pub struct CompletionContext<'a> {
    pub hook: Option<&'a str>,
    pub previous_script_source: Option<&'a str>,
    pub script_outputs: &'a HashMap<String, ReturnSchema>,
}

/// The word the caret sits at the end of, and its start offset. Completion
/// always replaces this whole word, never just inserts at `pos`.
fn current_word(source: &str, pos: u32) -> (u32, String) {
    let pos = (pos as usize).min(source.len());
    let before = &source[..pos];
    let start = before.rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '_')).map(|i| i + 1).unwrap_or(0);
    (start as u32, source[start..pos].to_string())
}

/// Recognizes `context.outputs["id"].` and `context.outputs["id"].data.`
/// (plus whatever partial word is being typed past the final dot) by plain
/// scanning -- no regex crate is in the dependency tree for this.
fn detect_outputs_access(prefix: &str) -> Option<(String, bool)> {
    let idx = prefix.rfind("outputs[")?;
    let rest = &prefix[idx + "outputs[".len()..];
    let quote = rest.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let after_quote = &rest[quote.len_utf8()..];
    let end = after_quote.find(quote)?;
    let id = after_quote[..end].to_string();
    let after_id = &after_quote[end + quote.len_utf8()..];
    let after_bracket = after_id.strip_prefix(']')?;
    let trimmed = after_bracket.trim_end_matches(|c: char| c.is_ascii_alphanumeric() || c == '_');
    match trimmed {
        "." => Some((id, false)),
        ".data." => Some((id, true)),
        _ => None,
    }
}

fn line_prefix(source: &str, pos: u32) -> &str {
    let pos = (pos as usize).min(source.len());
    let line_start = source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    &source[line_start..pos]
}

pub fn complete(source: &str, pos: u32, host_model: &HostModel, ctx: &CompletionContext) -> Option<CompletionResult> {
    let (word_start, word) = current_word(source, pos);
    let (work_source, resolve_pos) = match repair::repair(source, pos) {
        Some((s, p)) => (s, p),
        None => (source.to_string(), pos),
    };
    let analysis = analyze(&work_source, AnalyzeOptions { host_model, hook: ctx.hook });
    let resolved = query::resolve_at(&analysis, resolve_pos)?;
    let prefix = line_prefix(source, pos);

    let items = if let Some((id, is_data)) = detect_outputs_access(prefix) {
        outputs_completion_items(&id, is_data, ctx)
    } else if resolved.kind == ResolvedKind::MemberProperty {
        member_completion_items(&analysis, &resolved, host_model, ctx)
    } else {
        global_completion_items(&analysis, resolve_pos, host_model)
    };

    let needle = word.to_lowercase();
    let filtered: Vec<CompletionItem> = items.into_iter().filter(|item| item.label.to_lowercase().starts_with(&needle)).collect();
    if filtered.is_empty() {
        return None;
    }
    Some(CompletionResult { from: word_start, options: filtered, valid_for: r"^\w*$" })
}

fn member_completion_items(analysis: &Analysis, resolved: &Resolved, host_model: &HostModel, ctx: &CompletionContext) -> Vec<CompletionItem> {
    // The base expression ends exactly one byte before the property starts
    // (the `.`/`:` indexer sits there), so resolving just behind the
    // property lands on the *immediate* base -- not the leftmost name in a
    // longer `a.b.c` chain.
    let base_pos = resolved.span.start.saturating_sub(1);
    let Some(base_resolved) = query::resolve_at(analysis, base_pos) else {
        return Vec::new();
    };
    match &base_resolved.ty {
        Type::Global(g) if g == "prev" => prev_completion_items(host_model, ctx),
        other => type_member_items(other, host_model, ctx.hook),
    }
}

/// The static `{allowed, data, error}` triple is always on offer -- it's
/// the documented return contract every script can fill in -- and any
/// fields a previous script's return statement(s) actually declare (plus
/// its `data` sub-table's keys) are merged in alongside it, the same way
/// `outputs_completion_items` merges known DAG schema fields.
fn prev_completion_items(host_model: &HostModel, ctx: &CompletionContext) -> Vec<CompletionItem> {
    let schema = ctx.previous_script_source.and_then(|src| {
        let analysis = analyze(src, AnalyzeOptions { host_model, hook: ctx.hook });
        query::return_schema_of(&analysis)
    });
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for item in static_return_triple() {
        if seen.insert(item.label.clone()) {
            items.push(item);
        }
    }
    if let Some(schema) = schema {
        for f in &schema.fields {
            if seen.insert(f.clone()) {
                items.push(CompletionItem { label: f.clone(), boost: 7, detail: None });
            }
        }
        for f in &schema.data_fields {
            if seen.insert(f.clone()) {
                items.push(CompletionItem { label: f.clone(), boost: 7, detail: None });
            }
        }
    }
    items
}

fn static_return_triple() -> Vec<CompletionItem> {
    ["allowed", "data", "error"].iter().map(|f| CompletionItem { label: f.to_string(), boost: 7, detail: None }).collect()
}

fn type_member_items(base_ty: &Type, host_model: &HostModel, hook: Option<&str>) -> Vec<CompletionItem> {
    match base_ty {
        Type::Global(g) if g == "context" => context_field_items(host_model, hook),
        Type::Global(g) if g == "helpers" => host_model
            .helpers
            .iter()
            .map(|h| CompletionItem {
                label: h.name.strip_prefix("helpers.").unwrap_or(&h.name).to_string(),
                boost: 5,
                detail: Some(h.description.clone()),
            })
            .collect(),
        Type::Global(lib) => {
            let prefix = format!("{lib}.");
            host_model
                .builtin_library_docs
                .iter()
                .filter_map(|(k, doc)| {
                    k.strip_prefix(&prefix).map(|name| CompletionItem { label: name.to_string(), boost: 5, detail: Some(doc.description.clone()) })
                })
                .collect()
        }
        Type::Context(obj) => host_model
            .nested_object(obj)
            .map(|schema| {
                schema
                    .fields
                    .iter()
                    .map(|f| CompletionItem { label: f.name.clone(), boost: 7, detail: Some(f.description.clone()) })
                    .collect()
            })
            .unwrap_or_default(),
        Type::Table(t) => collect_table_field_items(t),
        _ => Vec::new(),
    }
}

fn context_field_items(host_model: &HostModel, hook: Option<&str>) -> Vec<CompletionItem> {
    let mut items: Vec<CompletionItem> = host_model
        .universal_context_fields
        .iter()
        .map(|f| CompletionItem { label: f.name.clone(), boost: 8, detail: Some(f.description.clone()) })
        .collect();
    if let Some(hook) = hook {
        if let Some(fields) = host_model.context_fields_by_hook.get(hook) {
            items.extend(fields.iter().map(|f| CompletionItem { label: f.name.clone(), boost: 9, detail: Some(f.description.clone()) }));
        }
    }
    items
}

fn collect_table_field_items(t: &TableType) -> Vec<CompletionItem> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for name in t.fields.keys() {
        if seen.insert(name.clone()) {
            items.push(CompletionItem { label: name.clone(), boost: 7, detail: None });
        }
    }
    for base in &t.bases {
        if let Type::Table(bt) = base {
            for name in bt.fields.keys() {
                if seen.insert(name.clone()) {
                    items.push(CompletionItem { label: name.clone(), boost: 7, detail: None });
                }
            }
        }
    }
    items
}

fn outputs_completion_items(id: &str, is_data: bool, ctx: &CompletionContext) -> Vec<CompletionItem> {
    let fields: Option<&BTreeSet<String>> = ctx.script_outputs.get(id).map(|s| if is_data { &s.data_fields } else { &s.fields });
    match fields {
        Some(fields) if !fields.is_empty() => fields.iter().map(|f| CompletionItem { label: f.clone(), boost: 7, detail: None }).collect(),
        _ => static_return_triple(),
    }
}

fn global_completion_items(analysis: &Analysis, pos: u32, host_model: &HostModel) -> Vec<CompletionItem> {
    let mut items = Vec::new();
    for (name, (decl_id, _)) in query::visible_symbols_at(analysis, pos) {
        let text = analysis.interner.resolve(name);
        if text.is_empty() {
            continue;
        }
        let decl = analysis.scope_tree.declaration(decl_id);
        items.push(CompletionItem { label: text.to_string(), boost: 15, detail: Some(format_type(&decl.decl_type)) });
    }
    for name in ["helpers", "context"] {
        items.push(CompletionItem { label: name.to_string(), boost: 10, detail: None });
    }
    for kw in &host_model.keywords {
        items.push(CompletionItem { label: kw.clone(), boost: -1, detail: None });
    }
    for g in &host_model.standard_globals {
        if g == "helpers" || g == "context" {
            continue;
        }
        items.push(CompletionItem { label: g.clone(), boost: 0, detail: None });
    }
    for snippet in &host_model.snippets {
        items.push(CompletionItem { label: snippet.label.clone(), boost: -2, detail: Some(snippet.description.clone()) });
    }
    items
}
