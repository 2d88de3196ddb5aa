//! Inlay type hints. One hint per `local` statement variable
//! whose inferred type is not `unknown`, placed right after the
//! identifier. Numeric/generic `for` loop variables reuse `DeclKind::Local`
//! internally but are deliberately excluded -- their type is always the
//! loop-controlled primitive and a hint there is noise, not information.

use crate::analysis::{analyze, AnalyzeOptions};
use crate::host_model::HostModel;
use crate::pos::Span;
use crate::scope::ScopeId;
use crate::types::{format_type, Type};

#[derive(Clone, Debug)]
pub struct InlayHint {
    /// Byte offset the hint renders after (the end of the identifier).
    pub position: u32,
    pub label: String,
}

struct Collector<'a> {
    analysis: &'a crate::analysis::Analysis,
    hints: Vec<InlayHint>,
}

impl<'a> Collector<'a> {
    fn walk_block(&mut self, body: &[crate::ast::Stmt], scope: ScopeId) {
        use crate::ast::StmtKind;
        for stmt in body {
            match &stmt.kind {
                StmtKind::Local(l) => {
                    for (name, span) in &l.names {
                        if let Some((decl_id, _)) = self.analysis.scope_tree.lookup(scope, *name) {
                            let decl = self.analysis.scope_tree.declaration(decl_id);
                            if !matches!(decl.decl_type, Type::Unknown) {
                                self.hints.push(InlayHint { position: span.end, label: format!(": {}", format_type(&decl.decl_type)) });
                            }
                        }
                    }
                }
                StmtKind::If(i) => {
                    for clause in &i.clauses {
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
                    let body_scope = self.scope_at(w.body_span.start);
                    self.walk_block(&w.body, body_scope);
                }
                StmtKind::Repeat(r) => {
                    let body_scope = self.scope_at(r.body_span.start);
                    self.walk_block(&r.body, body_scope);
                }
                StmtKind::Do(d) => {
                    let body_scope = self.scope_at(d.body_span.start);
                    self.walk_block(&d.body, body_scope);
                }
                StmtKind::ForNumeric(f) => {
                    let body_scope = self.scope_at(f.body_span.start);
                    self.walk_block(&f.body, body_scope);
                }
                StmtKind::ForGeneric(f) => {
                    let body_scope = self.scope_at(f.body_span.start);
                    self.walk_block(&f.body, body_scope);
                }
                StmtKind::FunctionDecl(f) => {
                    let body_scope = self.scope_at(f.body_span.start);
                    self.walk_block(&f.body, body_scope);
                }
                StmtKind::Assignment(_)
                | StmtKind::Call(_)
                | StmtKind::Return(_)
                | StmtKind::Break
                | StmtKind::Label(_)
                | StmtKind::Goto(_) => {}
            }
        }
    }

    fn scope_at(&self, offset: u32) -> ScopeId {
        self.analysis.scope_tree.find_scope_at(offset)
    }
}

pub fn inlay_hints(source: &str, host_model: &HostModel, hook: Option<&str>) -> Vec<InlayHint> {
    let analysis = analyze(source, AnalyzeOptions { host_model, hook });
    if !analysis.parse_errors.is_empty() {
        return Vec::new();
    }
    let mut collector = Collector { analysis: &analysis, hints: Vec::new() };
    let root = collector.analysis.scope_tree.root();
    collector.walk_block(&collector.analysis.chunk.body, root);
    collector.hints.sort_by_key(|h| h.position);
    collector.hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_model::default_host_model;

    #[test]
    fn local_with_known_type_gets_a_hint() {
        let model = default_host_model();
        let source = "local x = 5";
        let hints = inlay_hints(source, &model, None);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].label, ": number");
        assert_eq!(hints[0].position, source.find('x').unwrap() as u32 + 1);
    }

    #[test]
    fn local_with_unknown_type_gets_no_hint() {
        let model = default_host_model();
        let source = "local x = some_undeclared_call()";
        let hints = inlay_hints(source, &model, None);
        assert!(hints.is_empty());
    }

    #[test]
    fn numeric_for_loop_variable_is_excluded() {
        let model = default_host_model();
        let source = "for i = 1, 10 do\nend";
        let hints = inlay_hints(source, &model, None);
        assert!(hints.is_empty());
    }

    #[test]
    fn hints_are_found_inside_nested_blocks() {
        let model = default_host_model();
        let source = "if true then\n  local y = \"s\"\nend";
        let hints = inlay_hints(source, &model, None);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].label, ": string");
    }

    #[test]
    fn syntax_error_yields_no_hints() {
        let model = default_host_model();
        assert!(inlay_hints("local x = )", &model, None).is_empty());
    }
}
