//! Semantic highlighting. Roles are derived from the
//! scope/type of each identifier as the scope tree and type map already
//! recorded them during analysis -- never from lexical guessing about what
//! a token "looks like". A name is a `parameter` because its declaration's
//! `DeclKind` says so, not because it sits between `function` and `)`.

use crate::analysis::{analyze, AnalyzeOptions};
use crate::ast::{Expr, ExprKind, Stmt, StmtKind, TableField};
use crate::host_model::HostModel;
use crate::pos::Span;
use crate::scope::{DeclKind, ScopeId};
use crate::types::Type;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenRole {
    NamespaceBase,
    Method,
    Property,
    Parameter,
    Upvalue,
    Local,
    Function,
    Global,
    UnknownGlobal,
    Boolean,
    Nil,
    TableKey,
    Label,
}

#[derive(Clone, Copy, Debug)]
pub struct SemanticToken {
    pub span: Span,
    pub role: TokenRole,
}

/// Namespace-like globals: bare names that only ever appear as the base of
/// a member chain (`helpers.fetch`, `context.user`, `string.format`).
/// `namespace-base` exists so editors can color these distinctly from a
/// plain `global` read such as a disabled name used bare.
fn is_namespace_base(name: &str) -> bool {
    matches!(name, "helpers" | "context" | "string" | "table" | "math" | "os" | "io")
}

struct Collector<'a> {
    analysis: &'a crate::analysis::Analysis,
    host_model: &'a HostModel,
    tokens: Vec<SemanticToken>,
}

impl<'a> Collector<'a> {
    fn identifier_role(&self, name: crate::intern::Symbol, scope: ScopeId) -> TokenRole {
        if let Some((decl_id, is_upvalue)) = self.analysis.scope_tree.lookup(scope, name) {
            let decl = self.analysis.scope_tree.declaration(decl_id);
            return match decl.kind {
                DeclKind::Parameter => TokenRole::Parameter,
                DeclKind::Function => TokenRole::Function,
                DeclKind::Global => TokenRole::Global,
                DeclKind::Local if is_upvalue => TokenRole::Upvalue,
                DeclKind::Local => TokenRole::Local,
            };
        }
        let text = self.analysis.interner.resolve(name);
        if is_namespace_base(text) {
            return TokenRole::NamespaceBase;
        }
        if self.host_model.standard_globals.iter().any(|g| g == text) || self.host_model.disabled_globals.contains_key(text) {
            TokenRole::Global
        } else {
            TokenRole::UnknownGlobal
        }
    }

    fn push(&mut self, span: Span, role: TokenRole) {
        self.tokens.push(SemanticToken { span, role });
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
        match &stmt.kind {
            StmtKind::Local(l) => {
                for e in &l.init {
                    self.walk_expr(e, scope);
                }
                for (name, span) in &l.names {
                    self.push(*span, self.identifier_role(*name, scope));
                }
            }
            StmtKind::Assignment(a) => {
                for t in &a.targets {
                    self.walk_expr(t, scope);
                }
                for v in &a.values {
                    self.walk_expr(v, scope);
                }
            }
            StmtKind::Call(e) => self.walk_expr(e, scope),
            StmtKind::Return(r) => {
                for a in &r.arguments {
                    self.walk_expr(a, scope);
                }
            }
            StmtKind::If(i) => {
                for clause in &i.clauses {
                    self.walk_expr(&clause.condition, scope);
                    let body_scope = self.scope_at(clause.body_span.start);
                    self.walk_block(&clause.body, body_scope);
                }
                if let Some(body) = &i.else_body {
                    if let Some(span) = i.else_span {
                        let body_scope = self.scope_at(span.start);
                        self.walk_block(body, body_scope);
                    }
                }
            }
            StmtKind::While(w) => {
                self.walk_expr(&w.condition, scope);
                let body_scope = self.scope_at(w.body_span.start);
                self.walk_block(&w.body, body_scope);
            }
            StmtKind::Repeat(r) => {
                let body_scope = self.scope_at(r.body_span.start);
                self.walk_block(&r.body, body_scope);
                self.walk_expr(&r.condition, body_scope);
            }
            StmtKind::Do(d) => {
                let body_scope = self.scope_at(d.body_span.start);
                self.walk_block(&d.body, body_scope);
            }
            StmtKind::ForNumeric(f) => {
                self.walk_expr(&f.start, scope);
                self.walk_expr(&f.stop, scope);
                if let Some(step) = &f.step {
                    self.walk_expr(step, scope);
                }
                let body_scope = self.scope_at(f.body_span.start);
                self.push(f.var.1, self.identifier_role(f.var.0, body_scope));
                self.walk_block(&f.body, body_scope);
            }
            StmtKind::ForGeneric(f) => {
                for it in &f.iterators {
                    self.walk_expr(it, scope);
                }
                let body_scope = self.scope_at(f.body_span.start);
                for (name, span) in &f.names {
                    self.push(*span, self.identifier_role(*name, body_scope));
                }
                self.walk_block(&f.body, body_scope);
            }
            StmtKind::FunctionDecl(f) => {
                for (name, span) in &f.name_path {
                    self.push(*span, self.identifier_role(*name, scope));
                }
                let body_scope = self.scope_at(f.body_span.start);
                for (name, span) in &f.params {
                    self.push(*span, self.identifier_role(*name, body_scope));
                }
                self.walk_block(&f.body, body_scope);
            }
            StmtKind::Label(_) | StmtKind::Goto(_) => self.push(stmt.span, TokenRole::Label),
            StmtKind::Break => {}
        }
    }

    /// Resolves the type of the expression immediately preceding a member
    /// or method-call indexer (same one-byte-back trick used by the query
    /// layer's own `attach_type`, via a fresh lookup here since `Collector`
    /// doesn't carry position state).
    fn base_role(&self, base: &Expr, scope: ScopeId) -> Option<TokenRole> {
        if let ExprKind::Identifier(name) = &base.kind {
            if self.analysis.scope_tree.lookup(scope, *name).is_none() {
                let text = self.analysis.interner.resolve(*name);
                if is_namespace_base(text) {
                    return Some(TokenRole::NamespaceBase);
                }
            }
        }
        None
    }

    fn walk_expr(&mut self, expr: &Expr, scope: ScopeId) {
        match &expr.kind {
            ExprKind::Identifier(name) => self.push(expr.span, self.identifier_role(*name, scope)),
            ExprKind::True | ExprKind::False => self.push(expr.span, TokenRole::Boolean),
            ExprKind::Nil => self.push(expr.span, TokenRole::Nil),
            ExprKind::Str(_) | ExprKind::Number(_) | ExprKind::Vararg => {}
            ExprKind::Table(t) => {
                for field in &t.fields {
                    match field {
                        TableField::Named { name_span, value, .. } => {
                            self.push(*name_span, TokenRole::TableKey);
                            self.walk_expr(value, scope);
                        }
                        TableField::Keyed { key, value } => {
                            self.walk_expr(key, scope);
                            self.walk_expr(value, scope);
                        }
                        TableField::Positional { value } => self.walk_expr(value, scope),
                    }
                }
            }
            ExprKind::Member(m) => {
                self.walk_expr(&m.base, scope);
                let role = self.base_role(&m.base, scope).unwrap_or(TokenRole::Property);
                let role = if role == TokenRole::NamespaceBase { TokenRole::Property } else { role };
                self.push(m.property_span, role);
            }
            ExprKind::Index(i) => {
                self.walk_expr(&i.base, scope);
                self.walk_expr(&i.index, scope);
            }
            ExprKind::Call(c) => {
                self.walk_expr(&c.callee, scope);
                for a in &c.arguments {
                    self.walk_expr(a, scope);
                }
            }
            ExprKind::MethodCall(mc) => {
                self.walk_expr(&mc.base, scope);
                self.push(mc.method_span, TokenRole::Method);
                for a in &mc.arguments {
                    self.walk_expr(a, scope);
                }
            }
            ExprKind::Function(f) => {
                let body_scope = self.scope_at(f.body_span.start);
                for (name, span) in &f.params {
                    self.push(*span, self.identifier_role(*name, body_scope));
                }
                self.walk_block(&f.body, body_scope);
            }
            ExprKind::Binary(b) => {
                self.walk_expr(&b.left, scope);
                self.walk_expr(&b.right, scope);
            }
            ExprKind::Logical(l) => {
                self.walk_expr(&l.left, scope);
                self.walk_expr(&l.right, scope);
            }
            ExprKind::Unary(u) => self.walk_expr(&u.operand, scope),
            ExprKind::Paren(inner) => self.walk_expr(inner, scope),
        }
    }
}

pub fn semantic_tokens(source: &str, host_model: &HostModel, hook: Option<&str>) -> Vec<SemanticToken> {
    let analysis = analyze(source, AnalyzeOptions { host_model, hook });
    if !analysis.parse_errors.is_empty() {
        log::debug!("semantic_tokens: {} syntax error(s), returning no tokens", analysis.parse_errors.len());
        return Vec::new();
    }
    let mut collector = Collector { analysis: &analysis, host_model, tokens: Vec::new() };
    let root = collector.analysis.scope_tree.root();
    collector.walk_block(&collector.analysis.chunk.body, root);
    collector.tokens.sort_by_key(|t| t.span.start);
    collector.tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_model::default_host_model;

    fn role_at(tokens: &[SemanticToken], source: &str, needle: &str) -> TokenRole {
        let start = source.find(needle).unwrap() as u32;
        tokens.iter().find(|t| t.span.start == start).map(|t| t.role).unwrap_or_else(|| panic!("no token at {needle}"))
    }

    #[test]
    fn parameter_and_local_and_upvalue_are_distinguished() {
        let model = default_host_model();
        let source = "local outer = 1\nlocal function f(p)\n  return p + outer\nend";
        let tokens = semantic_tokens(source, &model, None);
        assert_eq!(role_at(&tokens, source, "p)"), TokenRole::Parameter);
        assert_eq!(role_at(&tokens, source, "outer = 1"), TokenRole::Local);
        assert_eq!(role_at(&tokens, source, "outer\nend"), TokenRole::Upvalue);
    }

    #[test]
    fn namespace_base_and_property_on_helpers_call() {
        let model = default_host_model();
        let source = "helpers.now()";
        let tokens = semantic_tokens(source, &model, None);
        assert_eq!(role_at(&tokens, source, "helpers"), TokenRole::NamespaceBase);
        assert_eq!(role_at(&tokens, source, "now"), TokenRole::Property);
    }

    #[test]
    fn method_call_uses_method_role() {
        let model = default_host_model();
        let source = "local t = {}\nt:greet()";
        let tokens = semantic_tokens(source, &model, None);
        assert_eq!(role_at(&tokens, source, "greet"), TokenRole::Method);
    }

    #[test]
    fn table_constructor_key_is_table_key_role() {
        let model = default_host_model();
        let source = "local t = { foo = 1 }";
        let tokens = semantic_tokens(source, &model, None);
        assert_eq!(role_at(&tokens, source, "foo"), TokenRole::TableKey);
    }

    #[test]
    fn undeclared_name_is_unknown_global() {
        let model = default_host_model();
        let source = "return undeclared_name";
        let tokens = semantic_tokens(source, &model, None);
        assert_eq!(role_at(&tokens, source, "undeclared_name"), TokenRole::UnknownGlobal);
    }

    #[test]
    fn disabled_global_is_global_role() {
        let model = default_host_model();
        let source = "os.exit()";
        let tokens = semantic_tokens(source, &model, None);
        assert_eq!(role_at(&tokens, source, "os"), TokenRole::NamespaceBase);
    }

    #[test]
    fn boolean_and_nil_literals_get_their_own_roles() {
        let model = default_host_model();
        let source = "local a = true\nlocal b = nil";
        let tokens = semantic_tokens(source, &model, None);
        assert_eq!(role_at(&tokens, source, "true"), TokenRole::Boolean);
        assert_eq!(role_at(&tokens, source, "nil"), TokenRole::Nil);
    }

    #[test]
    fn syntax_error_yields_no_tokens() {
        let model = default_host_model();
        let tokens = semantic_tokens("local x = )", &model, None);
        assert!(tokens.is_empty());
    }
}
