//! Diagnostics passes. Run, in order, over a single
//! `Analysis`: syntax errors suppress every later pass (a broken buffer is
//! noisy enough without name/shape warnings layered on top).

use std::collections::HashSet;

use crate::analysis::Analysis;
use crate::ast::{Expr, ExprKind, Stmt, StmtKind, TableField};
use crate::host_model::{ExecutionMode, HostModel};
use crate::pos::Span;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum DiagnosticCode {
    SyntaxError,
    DisabledGlobal,
    UndefinedIdentifier,
    MissingReturnField,
    ScriptTooLarge,
}

impl DiagnosticCode {
    /// The reserved-decade number: 1xxx syntax, 2xxx name,
    /// 4xxx sandbox, 6xxx pipeline-specific. This mapping is part of the
    /// public API and must not change without versioning.
    pub fn number(self) -> u32 {
        match self {
            DiagnosticCode::SyntaxError => 1001,
            DiagnosticCode::UndefinedIdentifier => 2001,
            DiagnosticCode::DisabledGlobal => 4001,
            DiagnosticCode::ScriptTooLarge => 6001,
            DiagnosticCode::MissingReturnField => 6002,
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticCode::SyntaxError => Severity::Error,
            DiagnosticCode::DisabledGlobal => Severity::Error,
            DiagnosticCode::UndefinedIdentifier => Severity::Warning,
            DiagnosticCode::MissingReturnField => Severity::Warning,
            DiagnosticCode::ScriptTooLarge => Severity::Error,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RelatedInformation {
    pub range: Span,
    pub message: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DiagnosticTag {
    Unnecessary,
    Deprecated,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub range: Span,
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub source: &'static str,
    pub tags: Vec<DiagnosticTag>,
    pub related_information: Vec<RelatedInformation>,
    pub data: Option<serde_json::Value>,
}

impl Diagnostic {
    fn new(range: Span, code: DiagnosticCode, message: String) -> Self {
        Diagnostic {
            range,
            severity: code.default_severity(),
            code,
            message,
            source: "script-analyzer",
            tags: Vec::new(),
            related_information: Vec::new(),
            data: None,
        }
    }
}

/// Ambient diagnostics configuration: suppression by code and a
/// per-code emission cap, both applied after collection so pass ordering
/// and `(line, column)` sort stay simple. `max_buffer_bytes` enforces the
/// sandbox's size ceiling: a buffer over the limit short-circuits every
/// other pass and emits a single `ScriptTooLarge` instead.
#[derive(Clone, Debug)]
pub struct DiagnosticsOptions {
    pub suppressed_codes: HashSet<DiagnosticCode>,
    pub cap_per_code: Option<usize>,
    pub enabled: bool,
    pub max_buffer_bytes: Option<usize>,
}

impl Default for DiagnosticsOptions {
    fn default() -> Self {
        DiagnosticsOptions {
            suppressed_codes: HashSet::new(),
            cap_per_code: None,
            enabled: true,
            max_buffer_bytes: Some(64 * 1024),
        }
    }
}

/// Context for the return-shape pass; `None` skips it
/// entirely (no execution mode is known for this buffer).
pub struct DiagnosticsContext<'a> {
    pub host_model: &'a HostModel,
    pub execution_mode: Option<ExecutionMode>,
}

pub fn diagnostics_of(analysis: &Analysis, ctx: &DiagnosticsContext, opts: &DiagnosticsOptions) -> Vec<Diagnostic> {
    if !opts.enabled {
        return Vec::new();
    }

    if let Some(limit) = opts.max_buffer_bytes {
        if analysis.source.len() > limit {
            log::warn!("diagnostics_of: buffer of {} bytes exceeds the {limit}-byte limit", analysis.source.len());
            let end = analysis.source.len().min(10) as u32;
            return vec![Diagnostic::new(
                Span::new(0, end),
                DiagnosticCode::ScriptTooLarge,
                format!("script exceeds the {limit}-byte sandbox limit"),
            )];
        }
    }

    let mut diagnostics = Vec::new();

    for err in &analysis.parse_errors {
        diagnostics.push(Diagnostic::new(err.span, DiagnosticCode::SyntaxError, err.message()));
    }

    if diagnostics.is_empty() {
        diagnostics.extend(disabled_global_pass(analysis, ctx.host_model));
        if let Some(mode) = ctx.execution_mode {
            diagnostics.extend(return_shape_pass(analysis, ctx.host_model, mode));
        }
        diagnostics.extend(undefined_identifier_pass(analysis, ctx.host_model));
    } else {
        log::debug!("diagnostics_of: {} syntax error(s), later passes skipped", diagnostics.len());
    }

    apply_options(diagnostics, opts, &analysis.source)
}

fn apply_options(diagnostics: Vec<Diagnostic>, opts: &DiagnosticsOptions, source: &str) -> Vec<Diagnostic> {
    let mut counts: std::collections::HashMap<DiagnosticCode, usize> = std::collections::HashMap::new();
    let mut kept: Vec<Diagnostic> = diagnostics
        .into_iter()
        .filter(|d| !opts.suppressed_codes.contains(&d.code))
        .filter(|d| match opts.cap_per_code {
            None => true,
            Some(cap) => {
                let count = counts.entry(d.code).or_insert(0);
                *count += 1;
                *count <= cap
            }
        })
        .collect();
    let line_index = crate::pos::LineIndex::new(source);
    kept.sort_by_key(|d| {
        let pos = line_index.position(source, d.range.start);
        (pos.line, pos.column)
    });
    kept
}

/// Every `Identifier` *use* in the buffer (never a declaration site, a
/// member-expression property, or a table key -- those are plain `Symbol`
/// fields on their owning node, not `Expr::Identifier` nodes, so they are
/// already excluded by the AST's own shape).
fn collect_identifier_uses(body: &[Stmt], out: &mut Vec<(crate::intern::Symbol, Span)>) {
    for stmt in body {
        walk_stmt_identifiers(stmt, out);
    }
}

fn walk_stmt_identifiers(stmt: &Stmt, out: &mut Vec<(crate::intern::Symbol, Span)>) {
    match &stmt.kind {
        StmtKind::Local(l) => {
            for e in &l.init {
                walk_expr_identifiers(e, out);
            }
        }
        StmtKind::Assignment(a) => {
            for t in &a.targets {
                walk_expr_identifiers(t, out);
            }
            for v in &a.values {
                walk_expr_identifiers(v, out);
            }
        }
        StmtKind::Call(e) => walk_expr_identifiers(e, out),
        StmtKind::Return(r) => {
            for a in &r.arguments {
                walk_expr_identifiers(a, out);
            }
        }
        StmtKind::If(i) => {
            for clause in &i.clauses {
                walk_expr_identifiers(&clause.condition, out);
                collect_identifier_uses(&clause.body, out);
            }
            if let Some(body) = &i.else_body {
                collect_identifier_uses(body, out);
            }
        }
        StmtKind::While(w) => {
            walk_expr_identifiers(&w.condition, out);
            collect_identifier_uses(&w.body, out);
        }
        StmtKind::Repeat(r) => {
            collect_identifier_uses(&r.body, out);
            walk_expr_identifiers(&r.condition, out);
        }
        StmtKind::Do(d) => collect_identifier_uses(&d.body, out),
        StmtKind::ForNumeric(f) => {
            walk_expr_identifiers(&f.start, out);
            walk_expr_identifiers(&f.stop, out);
            if let Some(step) = &f.step {
                walk_expr_identifiers(step, out);
            }
            collect_identifier_uses(&f.body, out);
        }
        StmtKind::ForGeneric(f) => {
            for it in &f.iterators {
                walk_expr_identifiers(it, out);
            }
            collect_identifier_uses(&f.body, out);
        }
        StmtKind::FunctionDecl(f) => collect_identifier_uses(&f.body, out),
        StmtKind::Break | StmtKind::Label(_) | StmtKind::Goto(_) => {}
    }
}

fn walk_expr_identifiers(expr: &Expr, out: &mut Vec<(crate::intern::Symbol, Span)>) {
    match &expr.kind {
        ExprKind::Identifier(name) => out.push((*name, expr.span)),
        ExprKind::Table(t) => {
            for field in &t.fields {
                match field {
                    TableField::Named { value, .. } => walk_expr_identifiers(value, out),
                    TableField::Keyed { key, value } => {
                        walk_expr_identifiers(key, out);
                        walk_expr_identifiers(value, out);
                    }
                    TableField::Positional { value } => walk_expr_identifiers(value, out),
                }
            }
        }
        ExprKind::Member(m) => walk_expr_identifiers(&m.base, out),
        ExprKind::Index(i) => {
            walk_expr_identifiers(&i.base, out);
            walk_expr_identifiers(&i.index, out);
        }
        ExprKind::Call(c) => {
            walk_expr_identifiers(&c.callee, out);
            for a in &c.arguments {
                walk_expr_identifiers(a, out);
            }
        }
        ExprKind::MethodCall(mc) => {
            walk_expr_identifiers(&mc.base, out);
            for a in &mc.arguments {
                walk_expr_identifiers(a, out);
            }
        }
        ExprKind::Function(f) => collect_identifier_uses(&f.body, out),
        ExprKind::Binary(b) => {
            walk_expr_identifiers(&b.left, out);
            walk_expr_identifiers(&b.right, out);
        }
        ExprKind::Logical(l) => {
            walk_expr_identifiers(&l.left, out);
            walk_expr_identifiers(&l.right, out);
        }
        ExprKind::Unary(u) => walk_expr_identifiers(&u.operand, out),
        ExprKind::Paren(inner) => walk_expr_identifiers(inner, out),
        ExprKind::Nil | ExprKind::True | ExprKind::False | ExprKind::Vararg | ExprKind::Str(_) | ExprKind::Number(_) => {}
    }
}

fn disabled_global_pass(analysis: &Analysis, host_model: &HostModel) -> Vec<Diagnostic> {
    let mut uses = Vec::new();
    collect_identifier_uses(&analysis.chunk.body, &mut uses);

    uses.into_iter()
        .filter_map(|(name, span)| {
            let text = analysis.interner.resolve(name);
            let scope = analysis.scope_tree.find_scope_at(span.start);
            if analysis.scope_tree.lookup(scope, name).is_some() {
                return None;
            }
            host_model.disabled_globals.get(text).map(|msg| Diagnostic::new(span, DiagnosticCode::DisabledGlobal, msg.clone()))
        })
        .collect()
}

/// Max edit distance for a "did you mean" suggestion -- close enough to
/// flag a typo (`improt` vs `import`-shaped words) without matching
/// unrelated short names.
const SUGGESTION_MAX_DISTANCE: usize = 2;

fn undefined_identifier_pass(analysis: &Analysis, host_model: &HostModel) -> Vec<Diagnostic> {
    let mut uses = Vec::new();
    collect_identifier_uses(&analysis.chunk.body, &mut uses);

    uses.into_iter()
        .filter_map(|(name, span)| {
            let text = analysis.interner.resolve(name);
            if text.chars().count() < 2 {
                return None;
            }
            let scope = analysis.scope_tree.find_scope_at(span.start);
            if analysis.scope_tree.lookup(scope, name).is_some() {
                return None;
            }
            if host_model.standard_globals.iter().any(|g| g == text) {
                return None;
            }
            if host_model.disabled_globals.contains_key(text) {
                return None;
            }
            let mut diag = Diagnostic::new(span, DiagnosticCode::UndefinedIdentifier, format!("undefined name `{text}`"));
            if let Some(suggestion) = suggest_for(text, analysis, scope, host_model) {
                diag.related_information.push(RelatedInformation { range: span, message: format!("did you mean `{suggestion}`?") });
            }
            Some(diag)
        })
        .collect()
}

/// Candidates are every name visible at the use site plus the standard
/// globals -- the same two pools the undefined-identifier pass itself
/// already checks membership against.
fn suggest_for(text: &str, analysis: &Analysis, scope: crate::scope::ScopeId, host_model: &HostModel) -> Option<String> {
    let visible = analysis.scope_tree.visible_symbols(scope);
    let mut candidates: Vec<&str> = visible.keys().map(|sym| analysis.interner.resolve(*sym)).collect();
    candidates.extend(host_model.standard_globals.iter().map(|s| s.as_str()));
    crate::suggest::find_similar(text, &candidates, SUGGESTION_MAX_DISTANCE).map(|s| s.to_string())
}

fn return_shape_pass(analysis: &Analysis, host_model: &HostModel, mode: ExecutionMode) -> Vec<Diagnostic> {
    if mode == ExecutionMode::Async {
        return Vec::new();
    }
    let Some(contract) = host_model.return_contract(mode) else {
        return Vec::new();
    };
    if contract.required_fields.is_empty() {
        return Vec::new();
    }

    let mut diagnostics = Vec::new();
    let mut any_return = false;
    walk_returns(&analysis.chunk.body, &mut |return_span, table| {
        any_return = true;
        let Some(table) = table else { return };
        let present: HashSet<&str> = table
            .fields
            .iter()
            .filter_map(|f| match f {
                TableField::Named { name, .. } => Some(analysis.interner.resolve(*name)),
                _ => None,
            })
            .collect();
        for required in &contract.required_fields {
            if !present.contains(required.as_str()) {
                diagnostics.push(Diagnostic::new(
                    return_span,
                    DiagnosticCode::MissingReturnField,
                    format!("return value is missing required field `{required}`"),
                ));
            }
        }
    });

    if !any_return {
        let end = 10.min(analysis.source.len()) as u32;
        diagnostics.push(Diagnostic::new(
            Span::new(0, end),
            DiagnosticCode::MissingReturnField,
            format!("execution mode requires a return statement with field(s): {}", contract.required_fields.join(", ")),
        ));
    }

    diagnostics
}

fn walk_returns<'a>(body: &'a [Stmt], f: &mut impl FnMut(Span, Option<&'a crate::ast::TableConstructor>)) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Return(r) => {
                let table = r.arguments.first().and_then(|e| match &e.kind {
                    ExprKind::Table(t) => Some(t),
                    _ => None,
                });
                f(stmt.span, table);
            }
            StmtKind::If(i) => {
                for clause in &i.clauses {
                    walk_returns(&clause.body, f);
                }
                if let Some(body) = &i.else_body {
                    walk_returns(body, f);
                }
            }
            StmtKind::While(w) => walk_returns(&w.body, f),
            StmtKind::Repeat(r) => walk_returns(&r.body, f),
            StmtKind::Do(d) => walk_returns(&d.body, f),
            StmtKind::ForNumeric(fo) => walk_returns(&fo.body, f),
            StmtKind::ForGeneric(fo) => walk_returns(&fo.body, f),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalyzeOptions};
    use crate::host_model::default_host_model;

    fn ctx(model: &HostModel, mode: Option<ExecutionMode>) -> DiagnosticsContext {
        DiagnosticsContext { host_model: model, execution_mode: mode }
    }

    #[test]
    fn disabled_global_use_is_flagged() {
        let model = default_host_model();
        let analysis = analyze("os.exit()", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &DiagnosticsOptions::default());
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::DisabledGlobal));
    }

    #[test]
    fn member_property_on_disabled_name_is_not_itself_flagged() {
        let model = default_host_model();
        let analysis = analyze("local t = {}\nt.os = 1", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &DiagnosticsOptions::default());
        assert!(!diags.iter().any(|d| d.code == DiagnosticCode::DisabledGlobal));
    }

    #[test]
    fn undefined_identifier_is_warned() {
        let model = default_host_model();
        let analysis = analyze("return undeclared_name", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &DiagnosticsOptions::default());
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::UndefinedIdentifier));
    }

    #[test]
    fn undefined_identifier_close_to_a_local_gets_a_suggestion() {
        let model = default_host_model();
        let analysis = analyze("local request_id = 1\nreturn request_iid", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &DiagnosticsOptions::default());
        let diag = diags.iter().find(|d| d.code == DiagnosticCode::UndefinedIdentifier).expect("undefined identifier flagged");
        assert!(diag.related_information.iter().any(|r| r.message.contains("request_id")));
    }

    #[test]
    fn bound_local_is_not_flagged_as_undefined() {
        let model = default_host_model();
        let analysis = analyze("local x = 1\nreturn x", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &DiagnosticsOptions::default());
        assert!(!diags.iter().any(|d| d.code == DiagnosticCode::UndefinedIdentifier));
    }

    #[test]
    fn missing_allowed_field_is_warned_in_blocking_mode() {
        let model = default_host_model();
        let analysis = analyze("return { data = 1 }", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, Some(ExecutionMode::Blocking)), &DiagnosticsOptions::default());
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::MissingReturnField));
    }

    #[test]
    fn no_return_statement_in_blocking_mode_is_warned_once() {
        let model = default_host_model();
        let analysis = analyze("local x = 1", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, Some(ExecutionMode::Blocking)), &DiagnosticsOptions::default());
        assert_eq!(diags.iter().filter(|d| d.code == DiagnosticCode::MissingReturnField).count(), 1);
    }

    #[test]
    fn async_mode_skips_return_shape_checks() {
        let model = default_host_model();
        let analysis = analyze("local x = 1", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, Some(ExecutionMode::Async)), &DiagnosticsOptions::default());
        assert!(!diags.iter().any(|d| d.code == DiagnosticCode::MissingReturnField));
    }

    #[test]
    fn syntax_error_suppresses_later_passes() {
        let model = default_host_model();
        let analysis = analyze("local x = )", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, Some(ExecutionMode::Blocking)), &DiagnosticsOptions::default());
        assert!(diags.iter().all(|d| d.code == DiagnosticCode::SyntaxError));
    }

    #[test]
    fn suppressed_code_is_filtered_out() {
        let model = default_host_model();
        let analysis = analyze("os.exit()", AnalyzeOptions { host_model: &model, hook: None });
        let mut opts = DiagnosticsOptions::default();
        opts.suppressed_codes.insert(DiagnosticCode::DisabledGlobal);
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &opts);
        assert!(diags.is_empty());
    }

    #[test]
    fn diagnostics_sorted_by_position() {
        let model = default_host_model();
        let analysis = analyze("return unknown_b\n", AnalyzeOptions { host_model: &model, hook: None });
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &DiagnosticsOptions::default());
        let starts: Vec<u32> = diags.iter().map(|d| d.range.start).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn oversized_buffer_emits_single_script_too_large_diagnostic() {
        let model = default_host_model();
        let source = "return 1".repeat(100);
        let analysis = analyze(&source, AnalyzeOptions { host_model: &model, hook: None });
        let mut opts = DiagnosticsOptions::default();
        opts.max_buffer_bytes = Some(16);
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &opts);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, DiagnosticCode::ScriptTooLarge);
    }

    #[test]
    fn buffer_under_limit_is_unaffected() {
        let model = default_host_model();
        let analysis = analyze("local x = 1", AnalyzeOptions { host_model: &model, hook: None });
        let mut opts = DiagnosticsOptions::default();
        opts.max_buffer_bytes = Some(16);
        let diags = diagnostics_of(&analysis, &ctx(&model, None), &opts);
        assert!(!diags.iter().any(|d| d.code == DiagnosticCode::ScriptTooLarge));
    }
}
