use std::collections::HashMap;

use super::infer;
use crate::ast::*;
use crate::host_model::HostModel;
use crate::intern::{Interner, Symbol, SymbolEq};
use crate::scope::{DeclKind, ScopeId, ScopeTree};
use crate::types::{Primitive, Type};

/// Builds the scope tree and the per-node type side table in a single walk,
/// interleaved with the scope pass rather than run as a separate walk. Declarations are
/// bound *after* their initializer is inferred, so `local x = x` resolves
/// the right-hand `x` against the enclosing scope.
pub struct Builder<'a> {
    scope_tree: &'a mut ScopeTree,
    types: &'a mut HashMap<NodeId, Type>,
    interner: &'a Interner,
    host_model: &'a HostModel,
    hook: Option<&'a str>,
    source: &'a str,
    comments: &'a [crate::pos::Span],
}

/// Best-effort numeral parse for literal-type narrowing; never rejected,
/// since this feeds type inference, not the lexer's own validation.
fn parse_number_literal(text: &str) -> f64 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        let digits = hex.split(|c| c == 'p' || c == 'P').next().unwrap_or(hex);
        i64::from_str_radix(digits, 16).map(|v| v as f64).unwrap_or(0.0)
    } else {
        text.parse::<f64>().unwrap_or(0.0)
    }
}

impl<'a> Builder<'a> {
    pub fn new(
        scope_tree: &'a mut ScopeTree,
        types: &'a mut HashMap<NodeId, Type>,
        interner: &'a Interner,
        host_model: &'a HostModel,
        hook: Option<&'a str>,
        source: &'a str,
        comments: &'a [crate::pos::Span],
    ) -> Self {
        Builder { scope_tree, types, interner, host_model, hook, source, comments }
    }

    /// Finds the comment immediately preceding `def_span` (only
    /// whitespace between the two) and returns its text with comment
    /// markers stripped. Used to populate `Declaration::documentation`.
    fn doc_comment_before(&self, def_span: crate::pos::Span) -> Option<String> {
        let comment = self
            .comments
            .iter()
            .filter(|c| c.end <= def_span.start)
            .max_by_key(|c| c.end)?;
        let gap = self.source.get(comment.end as usize..def_span.start as usize)?;
        if !gap.chars().all(char::is_whitespace) {
            return None;
        }
        let text = self.source.get(comment.start as usize..comment.end as usize)?;
        let stripped = text
            .strip_prefix("--[[")
            .map(|rest| rest.trim_end_matches("]]"))
            .or_else(|| text.strip_prefix("--"))
            .unwrap_or(text);
        let stripped = stripped.trim();
        if stripped.is_empty() {
            None
        } else {
            Some(stripped.to_string())
        }
    }

    fn attach_doc(&mut self, decl_id: crate::scope::DeclId, def_span: crate::pos::Span) {
        if let Some(doc) = self.doc_comment_before(def_span) {
            self.scope_tree.set_documentation(decl_id, doc);
        }
    }

    pub fn walk_block(&mut self, stmts: &[Stmt], scope: ScopeId) {
        for stmt in stmts {
            self.walk_stmt(stmt, scope);
        }
    }

    fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    fn walk_stmt(&mut self, stmt: &Stmt, scope: ScopeId) {
        match &stmt.kind {
            StmtKind::Local(local) => self.walk_local(local, stmt.span, scope),
            StmtKind::Assignment(assign) => self.walk_assignment(assign, scope),
            StmtKind::Call(expr) => {
                self.walk_expr(expr, scope);
                if let ExprKind::Call(call) = &expr.kind {
                    self.handle_setmetatable_call(call, scope);
                }
            }
            StmtKind::Return(ret) => {
                for arg in &ret.arguments {
                    self.walk_expr(arg, scope);
                }
            }
            StmtKind::If(if_stmt) => self.walk_if(if_stmt, scope),
            StmtKind::While(w) => {
                self.walk_expr(&w.condition, scope);
                let body_scope = self.scope_tree.push_scope(scope, w.body_span, false);
                self.walk_block(&w.body, body_scope);
            }
            StmtKind::Repeat(r) => {
                let body_scope = self.scope_tree.push_scope(scope, r.body_span, false);
                self.walk_block(&r.body, body_scope);
                // `until` condition can see locals from the loop body.
                self.walk_expr(&r.condition, body_scope);
            }
            StmtKind::Do(d) => {
                let body_scope = self.scope_tree.push_scope(scope, d.body_span, false);
                self.walk_block(&d.body, body_scope);
            }
            StmtKind::ForNumeric(f) => self.walk_for_numeric(f, scope),
            StmtKind::ForGeneric(f) => self.walk_for_generic(f, scope),
            StmtKind::FunctionDecl(f) => self.walk_function_decl(f, stmt.span, scope),
            StmtKind::Break | StmtKind::Label(_) | StmtKind::Goto(_) => {}
        }
    }

    fn walk_local(&mut self, local: &LocalStmt, stmt_span: crate::pos::Span, scope: ScopeId) {
        let init_types: Vec<Type> = local.init.iter().map(|e| self.walk_expr(e, scope)).collect();
        for (i, (name, span)) in local.names.iter().enumerate() {
            let ty = init_types.get(i).cloned().unwrap_or(Type::Unknown);
            let decl_id = self.scope_tree.bind(scope, *name, DeclKind::Local, ty, *span);
            self.attach_doc(decl_id, stmt_span);
        }
    }

    fn walk_assignment(&mut self, assign: &AssignmentStmt, scope: ScopeId) {
        let value_types: Vec<Type> = assign.values.iter().map(|e| self.walk_expr(e, scope)).collect();

        for (i, target) in assign.targets.iter().enumerate() {
            let value_ty = value_types.get(i).cloned().unwrap_or(Type::Unknown);
            match &target.kind {
                ExprKind::Identifier(name) => {
                    self.resolve_reference(*name, target.span, scope);
                }
                ExprKind::Member(member) => {
                    self.walk_expr(&member.base, scope);
                    self.assign_table_field(&member.base, member.property, member.property_span, scope, value_ty);
                }
                _ => {
                    self.walk_expr(target, scope);
                }
            }
        }
    }

    /// Extends `base`'s declared table type with a new/overwritten field,
    /// when `base` is an identifier resolving to a table-typed local.
    fn assign_table_field(&mut self, base: &Expr, property: Symbol, property_span: crate::pos::Span, scope: ScopeId, value_ty: Type) {
        if let ExprKind::Identifier(name) = &base.kind {
            if let Some((decl_id, _)) = self.scope_tree.lookup(scope, *name) {
                let prop_name = self.name(property).to_string();
                let decl = self.scope_tree.declaration_mut(decl_id);
                if let Type::Table(t) = &mut decl.decl_type {
                    t.field_spans.insert(prop_name.clone(), property_span);
                    t.fields.insert(prop_name, value_ty);
                }
            }
        }
    }

    fn handle_setmetatable_call(&mut self, call: &CallExpr, scope: ScopeId) {
        let is_setmetatable = matches!(&call.callee.kind, ExprKind::Identifier(name) if name.is(self.interner, "setmetatable"));
        if !is_setmetatable || call.arguments.len() < 2 {
            return;
        }
        let target_name = match &call.arguments[0].kind {
            ExprKind::Identifier(name) => Some(*name),
            _ => None,
        };
        let Some(target_name) = target_name else { return };
        // The enclosing `StmtKind::Call` arm already walked this whole call
        // expression, including `arguments[1]` -- read the cached type
        // instead of re-walking, or an identifier `__index` value picks up
        // a duplicate reference span (same pattern as `walk_for_generic`).
        let index_type = match &call.arguments[1].kind {
            ExprKind::Table(table) => table.fields.iter().find_map(|f| match f {
                TableField::Named { name, value, .. } if name.is(self.interner, "__index") => {
                    Some(self.types.get(&value.id).cloned().unwrap_or(Type::Unknown))
                }
                _ => None,
            }),
            _ => None,
        };
        let Some(index_type) = index_type else { return };
        if let Some((decl_id, _)) = self.scope_tree.lookup(scope, target_name) {
            let decl = self.scope_tree.declaration_mut(decl_id);
            if let Type::Table(t) = &mut decl.decl_type {
                t.bases.push(index_type);
            }
        }
    }

    fn walk_if(&mut self, if_stmt: &IfStmt, scope: ScopeId) {
        for clause in &if_stmt.clauses {
            self.walk_expr(&clause.condition, scope);
            let body_scope = self.scope_tree.push_scope(scope, clause.body_span, false);
            self.walk_block(&clause.body, body_scope);
        }
        if let (Some(body), Some(span)) = (&if_stmt.else_body, if_stmt.else_span) {
            let body_scope = self.scope_tree.push_scope(scope, span, false);
            self.walk_block(body, body_scope);
        }
    }

    fn walk_for_numeric(&mut self, f: &ForNumericStmt, scope: ScopeId) {
        self.walk_expr(&f.start, scope);
        self.walk_expr(&f.stop, scope);
        if let Some(step) = &f.step {
            self.walk_expr(step, scope);
        }
        let body_scope = self.scope_tree.push_scope(scope, f.body_span, false);
        self.scope_tree.bind(body_scope, f.var.0, DeclKind::Local, Type::Primitive(Primitive::Number), f.var.1);
        self.walk_block(&f.body, body_scope);
    }

    fn walk_for_generic(&mut self, f: &ForGenericStmt, scope: ScopeId) {
        for it in &f.iterators {
            self.walk_expr(it, scope);
        }
        let iterator_name = f.iterators.first().and_then(|e| match &e.kind {
            ExprKind::Call(call) => match &call.callee.kind {
                ExprKind::Identifier(name) => Some(self.name(*name).to_string()),
                _ => None,
            },
            _ => None,
        });
        let iterated_ty = f
            .iterators
            .first()
            .and_then(|e| match &e.kind {
                ExprKind::Call(call) => call.arguments.first(),
                _ => None,
            })
            .map(|arg| self.types.get(&arg.id).cloned().unwrap_or(Type::Unknown))
            .unwrap_or(Type::Unknown);
        let (key_ty, value_ty) = infer::infer_generic_for_binding(iterator_name.as_deref(), &iterated_ty);

        let body_scope = self.scope_tree.push_scope(scope, f.body_span, false);
        for (i, (name, span)) in f.names.iter().enumerate() {
            let ty = match i {
                0 => key_ty.clone(),
                1 => value_ty.clone(),
                _ => Type::Unknown,
            };
            self.scope_tree.bind(body_scope, *name, DeclKind::Local, ty, *span);
        }
        self.walk_block(&f.body, body_scope);
    }

    fn walk_function_decl(&mut self, f: &FunctionDeclStmt, stmt_span: crate::pos::Span, scope: ScopeId) {
        let fn_type = Type::Function(crate::types::FunctionType {
            params: f
                .params
                .iter()
                .map(|(name, _)| crate::types::NamedType { name: self.name(*name).to_string(), ty: Type::Unknown, optional: false })
                .collect(),
            returns: vec![Type::Unknown],
            is_async: false,
            doc: None,
        });

        if f.name_path.len() == 1 {
            let (name, span) = f.name_path[0];
            let decl_id = self.scope_tree.bind(scope, name, DeclKind::Function, fn_type, span);
            self.attach_doc(decl_id, stmt_span);
        } else if let Some((base_name, _)) = f.name_path.first().copied() {
            // `function t.method() ... end` extends `t`'s table type.
            if let Some((decl_id, _)) = self.scope_tree.lookup(scope, base_name) {
                let (leaf_name, leaf_span) = *f.name_path.last().unwrap();
                let leaf = self.name(leaf_name).to_string();
                let decl = self.scope_tree.declaration_mut(decl_id);
                if let Type::Table(t) = &mut decl.decl_type {
                    t.field_spans.insert(leaf.clone(), leaf_span);
                    t.fields.insert(leaf, fn_type);
                }
            }
        }

        let body_scope = self.scope_tree.push_scope(scope, f.body_span, true);
        for (pname, pspan) in &f.params {
            if pname.is(self.interner, "") {
                continue; // synthetic `self` for method sugar, unnamed
            }
            self.scope_tree.bind(body_scope, *pname, DeclKind::Parameter, Type::Unknown, *pspan);
        }
        self.walk_block(&f.body, body_scope);
    }

    fn walk_expr(&mut self, expr: &Expr, scope: ScopeId) -> Type {
        let ty = match &expr.kind {
            ExprKind::Nil => Type::Primitive(Primitive::Nil),
            ExprKind::True => Type::Literal(Box::new(Type::Primitive(Primitive::Boolean)), crate::types::LiteralValue::Bool(true)),
            ExprKind::False => Type::Literal(Box::new(Type::Primitive(Primitive::Boolean)), crate::types::LiteralValue::Bool(false)),
            ExprKind::Vararg => Type::Unknown,
            ExprKind::Number(sym) => {
                let text = self.name(*sym);
                let value = parse_number_literal(text);
                Type::Literal(
                    Box::new(Type::Primitive(Primitive::Number)),
                    crate::types::LiteralValue::Number(crate::types::F64Bits::from_f64(value)),
                )
            }
            ExprKind::Str(sym) => Type::Literal(Box::new(Type::Primitive(Primitive::String)), crate::types::LiteralValue::Str(*sym)),
            ExprKind::Identifier(name) => self.resolve_reference(*name, expr.span, scope),
            ExprKind::Table(table) => self.walk_table(table, scope),
            ExprKind::Member(member) => {
                let base_ty = self.walk_expr(&member.base, scope);
                infer::infer_member(&base_ty, self.name(member.property), self.host_model, self.hook)
            }
            ExprKind::Index(index) => {
                self.walk_expr(&index.base, scope);
                self.walk_expr(&index.index, scope);
                Type::Unknown
            }
            ExprKind::Call(call) => self.walk_call(call, scope),
            ExprKind::MethodCall(mc) => {
                self.walk_expr(&mc.base, scope);
                for arg in &mc.arguments {
                    self.walk_expr(arg, scope);
                }
                Type::Unknown
            }
            ExprKind::Function(f) => self.walk_function_expr(f, scope),
            ExprKind::Binary(b) => {
                self.walk_expr(&b.left, scope);
                self.walk_expr(&b.right, scope);
                infer::infer_binary(b.op)
            }
            ExprKind::Logical(l) => {
                let left = self.walk_expr(&l.left, scope);
                let right = self.walk_expr(&l.right, scope);
                infer::infer_logical(l.op, &left, &right)
            }
            ExprKind::Unary(u) => {
                self.walk_expr(&u.operand, scope);
                match u.op {
                    UnaryOp::Not => Type::Primitive(Primitive::Boolean),
                    UnaryOp::Len => Type::Primitive(Primitive::Integer),
                    UnaryOp::Neg | UnaryOp::BNot => Type::Primitive(Primitive::Number),
                }
            }
            ExprKind::Paren(inner) => self.walk_expr(inner, scope),
        };
        self.types.insert(expr.id, ty.clone());
        ty
    }

    fn walk_table(&mut self, table: &TableConstructor, scope: ScopeId) -> Type {
        let mut fields = std::collections::BTreeMap::new();
        let mut field_spans = std::collections::BTreeMap::new();
        for field in &table.fields {
            match field {
                TableField::Named { name, name_span, value } => {
                    let ty = self.walk_expr(value, scope);
                    let key = self.name(*name).to_string();
                    field_spans.insert(key.clone(), *name_span);
                    fields.insert(key, ty);
                }
                TableField::Keyed { key, value } => {
                    self.walk_expr(key, scope);
                    self.walk_expr(value, scope);
                }
                TableField::Positional { value } => {
                    self.walk_expr(value, scope);
                }
            }
        }
        Type::Table(crate::types::TableType { fields, field_spans, index_key: None, index_value: None, bases: Vec::new() })
    }

    fn walk_call(&mut self, call: &CallExpr, scope: ScopeId) -> Type {
        let callee_ty = self.walk_expr(&call.callee, scope);
        for arg in &call.arguments {
            self.walk_expr(arg, scope);
        }
        infer::infer_call_result(&callee_ty)
    }

    fn walk_function_expr(&mut self, f: &FunctionExpr, scope: ScopeId) -> Type {
        let body_scope = self.scope_tree.push_scope(scope, f.body_span, true);
        for (pname, pspan) in &f.params {
            self.scope_tree.bind(body_scope, *pname, DeclKind::Parameter, Type::Unknown, *pspan);
        }
        self.walk_block(&f.body, body_scope);
        Type::Function(crate::types::FunctionType {
            params: f
                .params
                .iter()
                .map(|(name, _)| crate::types::NamedType { name: self.name(*name).to_string(), ty: Type::Unknown, optional: false })
                .collect(),
            returns: vec![Type::Unknown],
            is_async: false,
            doc: None,
        })
    }

    /// Resolves `name` against the scope chain, records the reference on
    /// its declaration if bound, and falls back to Host Model globals
    /// otherwise (`Identifier -> declType | global | unknown`).
    fn resolve_reference(&mut self, name: Symbol, span: crate::pos::Span, scope: ScopeId) -> Type {
        if let Some((decl_id, _)) = self.scope_tree.lookup(scope, name) {
            self.scope_tree.record_reference(decl_id, span);
            return self.scope_tree.declaration(decl_id).decl_type.clone();
        }
        let text = self.name(name);
        if text == "context" || text == "helpers" || text == "string" || text == "table" || text == "math" {
            return Type::Global(text.to_string());
        }
        if self.host_model.standard_globals.iter().any(|g| g == text) {
            return Type::Global(text.to_string());
        }
        Type::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalyzeOptions};
    use crate::host_model::default_host_model;

    #[test]
    fn local_variable_binds_with_inferred_type() {
        let model = default_host_model();
        let analysis = analyze("local x = 5", AnalyzeOptions { host_model: &model, hook: None });
        let decls = analysis.scope_tree.declarations();
        assert_eq!(decls.len(), 1);
        assert!(matches!(decls[0].decl_type.widen(), Type::Primitive(Primitive::Number)));
    }

    #[test]
    fn local_x_equals_x_resolves_outer_binding() {
        let model = default_host_model();
        let analysis = analyze("local x = 1\ndo\n  local x = x\nend", AnalyzeOptions { host_model: &model, hook: None });
        let decls = analysis.scope_tree.declarations();
        assert_eq!(decls.len(), 2);
        // The inner x's init should have resolved against the outer x,
        // which has exactly one reference recorded (the inner init).
        assert_eq!(decls[0].references.len(), 1);
    }

    #[test]
    fn member_access_on_context_user_resolves() {
        let model = default_host_model();
        let analysis = analyze("local u = context.user", AnalyzeOptions { host_model: &model, hook: None });
        let decls = analysis.scope_tree.declarations();
        assert!(matches!(decls[0].decl_type, Type::Context(_)));
    }

    #[test]
    fn setmetatable_chains_index_table_fields() {
        let model = default_host_model();
        let source = "local base = { greet = 1 }\nlocal obj = {}\nsetmetatable(obj, { __index = base })";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        let obj_decl = analysis.scope_tree.declarations().iter().find(|d| analysis.interner.resolve(d.name) == "obj").unwrap();
        match &obj_decl.decl_type {
            Type::Table(t) => assert_eq!(t.bases.len(), 1),
            other => panic!("expected table, got {other:?}"),
        }
    }

    #[test]
    fn generic_for_over_pairs_binds_string_key() {
        let model = default_host_model();
        let source = "local t = { a = 1 }\nfor k, v in pairs(t) do\n  print(k)\nend";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        let k_decl = analysis.scope_tree.declarations().iter().find(|d| analysis.interner.resolve(d.name) == "k").unwrap();
        assert!(matches!(k_decl.decl_type, Type::Primitive(Primitive::String)));
    }

    #[test]
    fn function_parameter_is_upvalue_from_nested_closure() {
        let model = default_host_model();
        let source = "function outer(a)\n  local function inner()\n    return a\n  end\nend";
        let analysis = analyze(source, AnalyzeOptions { host_model: &model, hook: None });
        assert!(analysis.parse_errors.is_empty());
    }
}
