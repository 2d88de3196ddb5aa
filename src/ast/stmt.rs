use crate::ast::{Expr, NodeId};
use crate::intern::Symbol;
use crate::pos::Span;

#[derive(Clone, Debug)]
pub struct Stmt {
    pub id: NodeId,
    pub span: Span,
    pub kind: StmtKind,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Local(LocalStmt),
    Assignment(AssignmentStmt),
    Call(Expr),
    Return(ReturnStmt),
    If(IfStmt),
    While(WhileStmt),
    Repeat(RepeatStmt),
    Do(DoStmt),
    ForNumeric(ForNumericStmt),
    ForGeneric(ForGenericStmt),
    FunctionDecl(FunctionDeclStmt),
    Break,
    Label(Symbol),
    Goto(Symbol),
}

#[derive(Clone, Debug)]
pub struct LocalStmt {
    pub names: Vec<(Symbol, Span)>,
    pub init: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct AssignmentStmt {
    pub targets: Vec<Expr>,
    pub values: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub arguments: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub struct IfClause {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub body_span: Span,
}

#[derive(Clone, Debug)]
pub struct IfStmt {
    pub clauses: Vec<IfClause>,
    pub else_body: Option<Vec<Stmt>>,
    pub else_span: Option<Span>,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub body_span: Span,
}

#[derive(Clone, Debug)]
pub struct RepeatStmt {
    pub body: Vec<Stmt>,
    pub body_span: Span,
    pub condition: Expr,
}

#[derive(Clone, Debug)]
pub struct DoStmt {
    pub body: Vec<Stmt>,
    pub body_span: Span,
}

#[derive(Clone, Debug)]
pub struct ForNumericStmt {
    pub var: (Symbol, Span),
    pub start: Expr,
    pub stop: Expr,
    pub step: Option<Expr>,
    pub body: Vec<Stmt>,
    pub body_span: Span,
}

#[derive(Clone, Debug)]
pub struct ForGenericStmt {
    pub names: Vec<(Symbol, Span)>,
    pub iterators: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub body_span: Span,
}

/// `function name(...) ... end` or `local function name(...) ... end` or
/// `function base.member(...) ... end`. The *name*'s own scope binding
/// happens in the enclosing scope (local or global); parameters bind in a
/// new function scope, per the standard Lua visibility rule.
#[derive(Clone, Debug)]
pub struct FunctionDeclStmt {
    pub name_path: Vec<(Symbol, Span)>,
    pub is_method: bool,
    pub is_local: bool,
    pub params: Vec<(Symbol, Span)>,
    pub is_vararg: bool,
    pub body: Vec<Stmt>,
    pub body_span: Span,
}
