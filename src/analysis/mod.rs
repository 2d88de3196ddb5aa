pub mod infer;
pub mod scope_builder;

use std::collections::HashMap;

use crate::ast::{Chunk, NodeId};
use crate::error::ParseError;
use crate::host_model::HostModel;
use crate::intern::Interner;
use crate::pos::Span;
use crate::scope::ScopeTree;
use crate::types::Type;

/// Everything derived from a single `parse` + scope/type pass. Adapters
/// never touch the AST or scope tree directly; they go through `Query`
/// (see `crate::query`), which is built from this bundle.
pub struct Analysis {
    pub source: String,
    pub chunk: Chunk,
    pub interner: Interner,
    pub scope_tree: ScopeTree,
    pub types: HashMap<NodeId, Type>,
    pub parse_errors: Vec<ParseError>,
}

impl Analysis {
    pub fn type_of(&self, id: NodeId) -> Type {
        self.types.get(&id).cloned().unwrap_or(Type::Unknown)
    }
}

pub struct AnalyzeOptions<'a> {
    pub host_model: &'a HostModel,
    pub hook: Option<&'a str>,
}

pub fn analyze(source: &str, opts: AnalyzeOptions) -> Analysis {
    log::trace!("analyze: {} bytes", source.len());
    let mut interner = Interner::new();
    let (tokens, comments, lex_errors) = crate::lexer::tokenize(source, &mut interner);
    let parse_result = crate::parser::parse(&tokens, &mut interner);
    let mut errors = lex_errors;
    errors.extend(parse_result.errors);

    let root_span = Span::new(0, source.len() as u32);
    let mut scope_tree = ScopeTree::new(root_span);
    let mut types = HashMap::new();

    if errors.iter().any(|e| matches!(e.kind, crate::error::ParseErrorKind::UnexpectedEof)) {
        log::debug!("analyze: buffer truncated mid-construct, scope/type pass skipped");
    } else {
        let mut builder =
            scope_builder::Builder::new(&mut scope_tree, &mut types, &interner, opts.host_model, opts.hook, source, &comments);
        builder.walk_block(&parse_result.chunk.body, scope_tree_root(&scope_tree));
    }

    Analysis {
        source: source.to_string(),
        chunk: parse_result.chunk,
        interner,
        scope_tree,
        types,
        parse_errors: errors,
    }
}

fn scope_tree_root(tree: &ScopeTree) -> crate::scope::ScopeId {
    tree.root()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_binds_local_and_infers_number() {
        let model = crate::host_model::default_host_model();
        let analysis = analyze("local x = 5\nreturn x", AnalyzeOptions { host_model: &model, hook: None });
        assert!(analysis.parse_errors.is_empty());
        assert_eq!(analysis.scope_tree.declarations().len(), 1);
    }

    #[test]
    fn analyze_tolerates_syntax_error() {
        let model = crate::host_model::default_host_model();
        let analysis = analyze("local x = )", AnalyzeOptions { host_model: &model, hook: None });
        assert!(!analysis.parse_errors.is_empty());
    }
}
