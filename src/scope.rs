use std::collections::HashMap;

use crate::ast::NodeId;
use crate::intern::Symbol;
use crate::pos::Span;
use crate::types::Type;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ScopeId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DeclId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DeclKind {
    Local,
    Parameter,
    Function,
    Global,
}

#[derive(Clone, Debug)]
pub struct Declaration {
    pub name: Symbol,
    pub kind: DeclKind,
    pub decl_type: Type,
    pub definition_span: Span,
    pub scope: ScopeId,
    pub references: Vec<Span>,
    /// Text of an immediately-preceding comment block, if any (a
    /// `documentation?: DocBlock`). Comment markers (`--`, `[[`/`]]`) are
    /// stripped; multi-line block comments keep internal newlines.
    pub documentation: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub range: Span,
    /// True when this scope is the body of a function -- used to compute
    /// upvalue status: a declaration found by walking past a
    /// function-boundary scope is an upvalue relative to the query point.
    pub is_function_boundary: bool,
    pub variables: HashMap<Symbol, DeclId>,
}

/// An index-based tree: scopes are pushed into a flat `Vec` and reference
/// each other and their owning AST node by index rather than through bump-
/// allocated pointers. Unlike a bump arena, this allows later passes (type
/// inference) to mutate a declaration's inferred type in place as more of
/// the buffer is walked -- a bump arena's allocations are final the moment
/// they're made, which does not fit a flow-sensitive inferrer.
pub struct ScopeTree {
    scopes: Vec<Scope>,
    decls: Vec<Declaration>,
    /// Maps every AST node that owns a scope (function bodies, do/while/
    /// for/if blocks) back to that scope, so the builder can reattach
    /// during a second walk without re-deriving ranges.
    pub node_scopes: HashMap<NodeId, ScopeId>,
}

impl ScopeTree {
    pub fn new(root_range: Span) -> Self {
        let root = Scope {
            id: ScopeId(0),
            parent: None,
            range: root_range,
            is_function_boundary: true,
            variables: HashMap::new(),
        };
        ScopeTree { scopes: vec![root], decls: Vec::new(), node_scopes: HashMap::new() }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn push_scope(&mut self, parent: ScopeId, range: Span, is_function_boundary: bool) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope { id, parent: Some(parent), range, is_function_boundary, variables: HashMap::new() });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn declaration(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0 as usize]
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.decls[id.0 as usize]
    }

    pub fn bind(&mut self, scope: ScopeId, name: Symbol, kind: DeclKind, decl_type: Type, span: Span) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(Declaration {
            name,
            kind,
            decl_type,
            definition_span: span,
            scope,
            references: Vec::new(),
            documentation: None,
        });
        self.scope_mut(scope).variables.insert(name, id);
        id
    }

    pub fn set_documentation(&mut self, decl: DeclId, doc: String) {
        self.declaration_mut(decl).documentation = Some(doc);
    }

    /// Innermost scope whose range contains `offset`. Children are later in
    /// the vector than their parent, so the last match scanning forward is
    /// the deepest.
    pub fn find_scope_at(&self, offset: u32) -> ScopeId {
        let mut best = self.root();
        for scope in &self.scopes {
            if scope.range.contains_inclusive(offset) {
                let candidate_len = scope.range.len();
                if candidate_len <= self.scope(best).range.len() {
                    best = scope.id;
                }
            }
        }
        best
    }

    /// Resolves `name` starting at `scope`, walking outward. Returns the
    /// declaration id plus whether the lookup crossed at least one function
    /// boundary (i.e. whether it is observed as an upvalue from `scope`).
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<(DeclId, bool)> {
        let mut current = Some(scope);
        let mut crossed_function = false;
        while let Some(s) = current {
            let scope_data = self.scope(s);
            if let Some(&decl) = scope_data.variables.get(&name) {
                return Some((decl, crossed_function));
            }
            if scope_data.is_function_boundary && scope_data.parent.is_some() {
                crossed_function = true;
            }
            current = scope_data.parent;
        }
        None
    }

    pub fn record_reference(&mut self, decl: DeclId, span: Span) {
        self.declaration_mut(decl).references.push(span);
    }

    /// All declarations visible from `scope`, innermost shadowing outer,
    /// tagged with whether each is an upvalue relative to `scope`.
    pub fn visible_symbols(&self, scope: ScopeId) -> HashMap<Symbol, (DeclId, bool)> {
        let mut out = HashMap::new();
        let mut current = Some(scope);
        let mut crossed_function = false;
        while let Some(s) = current {
            let scope_data = self.scope(s);
            for (&name, &decl) in &scope_data.variables {
                out.entry(name).or_insert((decl, crossed_function));
            }
            if scope_data.is_function_boundary && scope_data.parent.is_some() {
                crossed_function = true;
            }
            current = scope_data.parent;
        }
        out
    }

    pub fn declarations(&self) -> &[Declaration] {
        &self.decls
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Symbol {
        crate::intern::Interner::new().intern(name)
    }

    #[test]
    fn root_scope_covers_whole_range() {
        let tree = ScopeTree::new(Span::new(0, 100));
        assert_eq!(tree.scope(tree.root()).range, Span::new(0, 100));
    }

    #[test]
    fn find_scope_at_returns_innermost() {
        let mut tree = ScopeTree::new(Span::new(0, 100));
        let inner = tree.push_scope(tree.root(), Span::new(10, 50), true);
        assert_eq!(tree.find_scope_at(20), inner);
        assert_eq!(tree.find_scope_at(60), tree.root());
    }

    #[test]
    fn lookup_finds_binding_in_enclosing_scope() {
        let mut tree = ScopeTree::new(Span::new(0, 100));
        let name = sym("a");
        let decl = tree.bind(tree.root(), name, DeclKind::Local, Type::Unknown, Span::new(0, 1));
        let inner = tree.push_scope(tree.root(), Span::new(10, 50), true);
        let (found, is_upvalue) = tree.lookup(inner, name).expect("should resolve");
        assert_eq!(found, decl);
        assert!(is_upvalue, "crossing a function boundary scope should mark as upvalue");
    }

    #[test]
    fn lookup_does_not_mark_upvalue_within_same_function() {
        let mut tree = ScopeTree::new(Span::new(0, 100));
        let name = sym("b");
        let decl = tree.bind(tree.root(), name, DeclKind::Local, Type::Unknown, Span::new(0, 1));
        let block_scope = tree.push_scope(tree.root(), Span::new(10, 50), false);
        let (found, is_upvalue) = tree.lookup(block_scope, name).expect("should resolve");
        assert_eq!(found, decl);
        assert!(!is_upvalue);
    }

    #[test]
    fn shadowing_inner_scope_wins() {
        let mut tree = ScopeTree::new(Span::new(0, 100));
        let name = sym("c");
        tree.bind(tree.root(), name, DeclKind::Local, Type::Unknown, Span::new(0, 1));
        let inner = tree.push_scope(tree.root(), Span::new(10, 50), false);
        let shadow = tree.bind(inner, name, DeclKind::Local, Type::Unknown, Span::new(11, 12));
        let (found, _) = tree.lookup(inner, name).unwrap();
        assert_eq!(found, shadow);
    }

    #[test]
    fn visible_symbols_merges_chain_innermost_first() {
        let mut tree = ScopeTree::new(Span::new(0, 100));
        let outer_name = sym("d");
        tree.bind(tree.root(), outer_name, DeclKind::Local, Type::Unknown, Span::new(0, 1));
        let inner = tree.push_scope(tree.root(), Span::new(10, 50), false);
        let visible = tree.visible_symbols(inner);
        assert!(visible.contains_key(&outer_name));
    }
}
