//! The query layer: the only surface feature adapters are
//! allowed to touch. Everything here is a pure function of an `Analysis`
//! plus a position or declaration -- no adapter reaches into `Chunk` or
//! `ScopeTree` directly.

use std::collections::{BTreeSet, HashMap};

use crate::analysis::Analysis;
use crate::ast::*;
use crate::intern::Symbol;
use crate::pos::Span;
use crate::scope::{DeclId, Declaration, ScopeId};
use crate::types::Type;

/// What kind of syntactic position `resolveAt` landed on. Distinguishing
/// `MemberProperty`/`TableKey` from a plain `Identifier` matters because
/// those two are never themselves declaration sites or references -- they
/// index into a type, not a scope.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResolvedKind {
    Identifier,
    MemberProperty,
    TableKey,
    Keyword,
    StringLiteral,
    NumberLiteral,
    Other,
}

/// The result of `resolveAt(buffer, pos)`. `ancestor_spans` is the
/// root-to-leaf chain of containing node ranges (the node "path"), useful to
/// adapters that need to know what statement or call a position sits
/// inside without re-walking the tree themselves.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub kind: ResolvedKind,
    pub span: Span,
    pub name: Option<Symbol>,
    pub scope: ScopeId,
    pub ty: Type,
    pub decl: Option<DeclId>,
    pub is_upvalue: bool,
    pub ancestor_spans: Vec<Span>,
}

struct Walker<'a> {
    analysis: &'a Analysis,
    pos: u32,
    ancestors: Vec<Span>,
    best: Option<Resolved>,
}

impl<'a> Walker<'a> {
    fn consider(&mut self, kind: ResolvedKind, span: Span, name: Option<Symbol>, scope: ScopeId) {
        if !span.contains_inclusive(self.pos) {
            return;
        }
        let narrower = match &self.best {
            None => true,
            Some(existing) => span.len() <= existing.span.len(),
        };
        if !narrower {
            return;
        }
        let (decl, is_upvalue) = match name {
            Some(n) if kind == ResolvedKind::Identifier => match self.analysis.scope_tree.lookup(scope, n) {
                Some((d, upvalue)) => (Some(d), upvalue),
                None => (None, false),
            },
            _ => (None, false),
        };
        let ty = decl.map(|d| self.analysis.scope_tree.declaration(d).decl_type.clone()).unwrap_or(Type::Unknown);
        self.best = Some(Resolved {
            kind,
            span,
            name,
            scope,
            ty,
            decl,
            is_upvalue,
            ancestor_spans: self.ancestors.clone(),
        });
    }

    fn attach_type(&mut self, span: Span, node_id: NodeId) {
        if let Some(resolved) = &mut self.best {
            if resolved.span == span {
                resolved.ty = self.analysis.type_of(node_id);
            }
        }
    }

    fn with_ancestor<F: FnOnce(&mut Self)>(&mut self, span: Span, f: F) {
        if !span.contains_inclusive(self.pos) {
            return;
        }
        self.ancestors.push(span);
        f(self);
        self.ancestors.pop();
    }

    fn walk_block(&mut self, body: &[Stmt], scope: ScopeId) {
        for stmt in body {
            self.walk_stmt(stmt, scope);
        }
    }

    fn scope_at(&self, offset: u32) -> ScopeId {
        self.analysis.scope_tree.find_scope_at(offset)
    }

    fn walk_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        self.with_ancestor(stmt.span, |w| match &stmt.kind {
            StmtKind::Local(l) => {
                for e in &l.init {
                    w.walk_expr(e, scope);
                }
                for (name, span) in &l.names {
                    w.consider(ResolvedKind::Identifier, *span, Some(*name), scope);
                }
            }
            StmtKind::Assignment(a) => {
                for t in &a.targets {
                    w.walk_expr(t, scope);
                }
                for v in &a.values {
                    w.walk_expr(v, scope);
                }
            }
            StmtKind::Call(e) => w.walk_expr(e, scope),
            StmtKind::Return(r) => {
                for a in &r.arguments {
                    w.walk_expr(a, scope);
                }
            }
            StmtKind::If(i) => {
                for clause in &i.clauses {
                    w.walk_expr(&clause.condition, scope);
                    let body_scope = w.scope_at(clause.body_span.start);
                    w.walk_block(&clause.body, body_scope);
                }
                if let Some(body) = &i.else_body {
                    if let Some(span) = i.else_span {
                        let body_scope = w.scope_at(span.start);
                        w.walk_block(body, body_scope);
                    }
                }
            }
            StmtKind::While(wh) => {
                w.walk_expr(&wh.condition, scope);
                let body_scope = w.scope_at(wh.body_span.start);
                w.walk_block(&wh.body, body_scope);
            }
            StmtKind::Repeat(r) => {
                let body_scope = w.scope_at(r.body_span.start);
                w.walk_block(&r.body, body_scope);
                w.walk_expr(&r.condition, body_scope);
            }
            StmtKind::Do(d) => {
                let body_scope = w.scope_at(d.body_span.start);
                w.walk_block(&d.body, body_scope);
            }
            StmtKind::ForNumeric(f) => {
                w.walk_expr(&f.start, scope);
                w.walk_expr(&f.stop, scope);
                if let Some(step) = &f.step {
                    w.walk_expr(step, scope);
                }
                let body_scope = w.scope_at(f.body_span.start);
                w.consider(ResolvedKind::Identifier, f.var.1, Some(f.var.0), body_scope);
                w.walk_block(&f.body, body_scope);
            }
            StmtKind::ForGeneric(f) => {
                for it in &f.iterators {
                    w.walk_expr(it, scope);
                }
                let body_scope = w.scope_at(f.body_span.start);
                for (name, span) in &f.names {
                    w.consider(ResolvedKind::Identifier, *span, Some(*name), body_scope);
                }
                w.walk_block(&f.body, body_scope);
            }
            StmtKind::FunctionDecl(f) => {
                for (name, span) in &f.name_path {
                    w.consider(ResolvedKind::Identifier, *span, Some(*name), scope);
                }
                let body_scope = w.scope_at(f.body_span.start);
                for (name, span) in &f.params {
                    w.consider(ResolvedKind::Identifier, *span, Some(*name), body_scope);
                }
                w.walk_block(&f.body, body_scope);
            }
            StmtKind::Break | StmtKind::Label(_) | StmtKind::Goto(_) => {}
        });
    }

    fn walk_expr(&mut self, expr: &Expr, scope: ScopeId) {
        self.with_ancestor(expr.span, |w| {
            match &expr.kind {
                ExprKind::Identifier(name) => {
                    w.consider(ResolvedKind::Identifier, expr.span, Some(*name), scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Str(_) => {
                    w.consider(ResolvedKind::StringLiteral, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Number(_) => {
                    w.consider(ResolvedKind::NumberLiteral, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Table(t) => {
                    for field in &t.fields {
                        match field {
                            TableField::Named { name, name_span, value } => {
                                w.consider(ResolvedKind::TableKey, *name_span, Some(*name), scope);
                                w.walk_expr(value, scope);
                                w.attach_type(*name_span, value.id);
                            }
                            TableField::Keyed { key, value } => {
                                w.walk_expr(key, scope);
                                w.walk_expr(value, scope);
                            }
                            TableField::Positional { value } => w.walk_expr(value, scope),
                        }
                    }
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Member(m) => {
                    w.walk_expr(&m.base, scope);
                    w.consider(ResolvedKind::MemberProperty, m.property_span, Some(m.property), scope);
                    w.attach_type(m.property_span, expr.id);
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Index(i) => {
                    w.walk_expr(&i.base, scope);
                    w.walk_expr(&i.index, scope);
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Call(c) => {
                    w.walk_expr(&c.callee, scope);
                    for a in &c.arguments {
                        w.walk_expr(a, scope);
                    }
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::MethodCall(mc) => {
                    w.walk_expr(&mc.base, scope);
                    w.consider(ResolvedKind::MemberProperty, mc.method_span, Some(mc.method), scope);
                    w.attach_type(mc.method_span, expr.id);
                    for a in &mc.arguments {
                        w.walk_expr(a, scope);
                    }
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Function(f) => {
                    let body_scope = w.scope_at(f.body_span.start);
                    for (name, span) in &f.params {
                        w.consider(ResolvedKind::Identifier, *span, Some(*name), body_scope);
                    }
                    w.walk_block(&f.body, body_scope);
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Binary(b) => {
                    w.walk_expr(&b.left, scope);
                    w.walk_expr(&b.right, scope);
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Logical(l) => {
                    w.walk_expr(&l.left, scope);
                    w.walk_expr(&l.right, scope);
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Unary(u) => {
                    w.walk_expr(&u.operand, scope);
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
                ExprKind::Paren(inner) => w.walk_expr(inner, scope),
                ExprKind::Nil | ExprKind::True | ExprKind::False | ExprKind::Vararg => {
                    w.consider(ResolvedKind::Other, expr.span, None, scope);
                    w.attach_type(expr.span, expr.id);
                }
            }
        });
    }
}

/// Deepest node covering `pos`, its scope, resolved type, and (when it is
/// an identifier) the declaration it binds to. Returns `None` only when
/// `pos` falls outside the buffer or the buffer produced no AST at all.
pub fn resolve_at(analysis: &Analysis, pos: u32) -> Option<Resolved> {
    if pos as usize > analysis.source.len() {
        return None;
    }
    let scope = analysis.scope_tree.find_scope_at(pos);
    let mut walker = Walker { analysis, pos, ancestors: Vec::new(), best: None };
    walker.walk_block(&analysis.chunk.body, scope);
    walker.best.or_else(|| {
        Some(Resolved {
            kind: ResolvedKind::Other,
            span: Span::new(pos, pos),
            name: None,
            scope,
            ty: Type::Unknown,
            decl: None,
            is_upvalue: false,
            ancestor_spans: Vec::new(),
        })
    })
}

/// All declarations visible from `pos`, innermost shadowing outer, each
/// tagged with whether it is observed as an upvalue from that point.
pub fn visible_symbols_at(analysis: &Analysis, pos: u32) -> HashMap<Symbol, (DeclId, bool)> {
    let scope = analysis.scope_tree.find_scope_at(pos);
    analysis.scope_tree.visible_symbols(scope)
}

/// The declaration's own site plus every recorded reference:
/// `referencesOf(declaration) -> Range[]`.
pub fn references_of(analysis: &Analysis, decl: DeclId) -> Vec<Span> {
    let declaration = analysis.scope_tree.declaration(decl);
    let mut spans = vec![declaration.definition_span];
    spans.extend(declaration.references.iter().copied());
    spans
}

pub fn declaration_at(analysis: &Analysis, pos: u32) -> Option<(DeclId, &Declaration)> {
    let resolved = resolve_at(analysis, pos)?;
    let decl_id = resolved.decl?;
    Some((decl_id, analysis.scope_tree.declaration(decl_id)))
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct ReturnSchema {
    pub fields: BTreeSet<String>,
    pub data_fields: BTreeSet<String>,
}

/// Unions the top-level keys of every `return`ed table across the buffer,
/// resolving a returned bare identifier back through its `local`
/// initializer (guarded by a visited set against `local a = a` cycles).
/// Any field literally named `data` whose value is itself a table
/// constructor contributes its own keys to `data_fields`.
pub fn return_schema_of(analysis: &Analysis) -> Option<ReturnSchema> {
    let mut schema = ReturnSchema::default();
    let mut found_any = false;
    collect_returns(&analysis.chunk.body, analysis, &mut schema, &mut found_any);
    if found_any {
        Some(schema)
    } else {
        None
    }
}

fn collect_returns(body: &[Stmt], analysis: &Analysis, schema: &mut ReturnSchema, found_any: &mut bool) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Return(r) => {
                if let Some(arg) = r.arguments.first() {
                    *found_any = true;
                    let mut visited = std::collections::HashSet::new();
                    if let Some(table) = resolve_table_constructor(arg, analysis, &mut visited) {
                        merge_table_fields(table, analysis, schema);
                    }
                }
            }
            StmtKind::If(i) => {
                for clause in &i.clauses {
                    collect_returns(&clause.body, analysis, schema, found_any);
                }
                if let Some(body) = &i.else_body {
                    collect_returns(body, analysis, schema, found_any);
                }
            }
            StmtKind::While(w) => collect_returns(&w.body, analysis, schema, found_any),
            StmtKind::Repeat(r) => collect_returns(&r.body, analysis, schema, found_any),
            StmtKind::Do(d) => collect_returns(&d.body, analysis, schema, found_any),
            StmtKind::ForNumeric(f) => collect_returns(&f.body, analysis, schema, found_any),
            StmtKind::ForGeneric(f) => collect_returns(&f.body, analysis, schema, found_any),
            _ => {}
        }
    }
}

/// Resolves `expr` to a table constructor, chasing through a bound local's
/// initializer when `expr` is a bare identifier. `visited` prevents
/// `local a = a` (or any longer cycle) from looping forever.
fn resolve_table_constructor<'a>(
    expr: &'a Expr,
    analysis: &'a Analysis,
    visited: &mut std::collections::HashSet<NodeId>,
) -> Option<&'a TableConstructor> {
    match &expr.kind {
        ExprKind::Table(t) => Some(t),
        ExprKind::Paren(inner) => resolve_table_constructor(inner, analysis, visited),
        ExprKind::Identifier(name) => {
            if !visited.insert(expr.id) {
                return None;
            }
            let scope = analysis.scope_tree.find_scope_at(expr.span.start);
            let (decl_id, _) = analysis.scope_tree.lookup(scope, *name)?;
            let decl = analysis.scope_tree.declaration(decl_id);
            let init_expr = find_local_init(&analysis.chunk.body, decl.definition_span, *name, analysis)?;
            resolve_table_constructor(init_expr, analysis, visited)
        }
        _ => None,
    }
}

fn find_local_init<'a>(body: &'a [Stmt], def_span: Span, name: Symbol, analysis: &'a Analysis) -> Option<&'a Expr> {
    for stmt in body {
        if let StmtKind::Local(l) = &stmt.kind {
            for (i, (n, span)) in l.names.iter().enumerate() {
                if *span == def_span && *n == name {
                    return l.init.get(i);
                }
            }
        }
        let nested = match &stmt.kind {
            StmtKind::If(ifs) => {
                let mut found = None;
                for clause in &ifs.clauses {
                    found = found.or_else(|| find_local_init(&clause.body, def_span, name, analysis));
                }
                found.or_else(|| ifs.else_body.as_deref().and_then(|b| find_local_init(b, def_span, name, analysis)))
            }
            StmtKind::While(w) => find_local_init(&w.body, def_span, name, analysis),
            StmtKind::Repeat(r) => find_local_init(&r.body, def_span, name, analysis),
            StmtKind::Do(d) => find_local_init(&d.body, def_span, name, analysis),
            StmtKind::ForNumeric(f) => find_local_init(&f.body, def_span, name, analysis),
            StmtKind::ForGeneric(f) => find_local_init(&f.body, def_span, name, analysis),
            StmtKind::FunctionDecl(f) => find_local_init(&f.body, def_span, name, analysis),
            _ => None,
        };
        if nested.is_some() {
            return nested;
        }
    }
    None
}

fn merge_table_fields(table: &TableConstructor, analysis: &Analysis, schema: &mut ReturnSchema) {
    for field in &table.fields {
        if let TableField::Named { name, value, .. } = field {
            let field_name = analysis.interner.resolve(*name).to_string();
            if field_name == "data" {
                if let ExprKind::Table(inner) = &value.kind {
                    for inner_field in &inner.fields {
                        if let TableField::Named { name: inner_name, .. } = inner_field {
                            schema.data_fields.insert(analysis.interner.resolve(*inner_name).to_string());
                        }
                    }
                }
            }
            schema.fields.insert(field_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalyzeOptions};
    use crate::host_model::default_host_model;

    #[test]
    fn resolve_at_identifier_finds_declaration() {
        let model = default_host_model();
        let source = "local x = 1\nreturn x";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        let pos = source.rfind('x').unwrap() as u32;
        let resolved = resolve_at(&analysis, pos).unwrap();
        assert_eq!(resolved.kind, ResolvedKind::Identifier);
        assert!(resolved.decl.is_some());
    }

    #[test]
    fn resolve_at_member_property_returns_property_type() {
        let model = default_host_model();
        let source = "local u = context.user";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        let pos = (source.len() - 2) as u32;
        let resolved = resolve_at(&analysis, pos).unwrap();
        assert_eq!(resolved.kind, ResolvedKind::MemberProperty);
    }

    #[test]
    fn references_of_includes_definition_and_uses() {
        let model = default_host_model();
        let source = "local x = 1\nreturn x + x";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        assert!(!analysis.scope_tree.declarations().is_empty());
        let refs = references_of(&analysis, crate::scope::DeclId(0));
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn return_schema_collects_top_level_and_data_fields() {
        let model = default_host_model();
        let source = "return { allowed = true, data = { foo = 1, bar = \"x\" } }";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        let schema = return_schema_of(&analysis).unwrap();
        assert!(schema.fields.contains("allowed"));
        assert!(schema.fields.contains("data"));
        assert!(schema.data_fields.contains("foo"));
        assert!(schema.data_fields.contains("bar"));
    }

    #[test]
    fn return_schema_resolves_identifier_through_initializer() {
        let model = default_host_model();
        let source = "local result = { allowed = true }\nreturn result";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        let schema = return_schema_of(&analysis).unwrap();
        assert!(schema.fields.contains("allowed"));
    }

    #[test]
    fn return_schema_none_without_return_statement() {
        let model = default_host_model();
        let analysis = analyze("local x = 1", AnalyzeOptions { host_model: &model, hook: None });
        assert!(return_schema_of(&analysis).is_none());
    }

    #[test]
    fn visible_symbols_at_marks_upvalue_across_function_boundary() {
        let model = default_host_model();
        let source = "local a = 1\nfunction f()\n  return a\nend";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        let pos = source.rfind("return a").unwrap() as u32 + 7;
        let symbols = visible_symbols_at(&analysis, pos);
        let a_name = analysis.interner.lookup("a").unwrap();
        let (_, is_upvalue) = symbols.get(&a_name).expect("a should be visible");
        assert!(*is_upvalue);
    }
}
