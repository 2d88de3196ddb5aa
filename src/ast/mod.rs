pub mod expr;
pub mod stmt;

pub use expr::*;
pub use stmt::*;

use crate::pos::Span;

/// The root of every parsed buffer. `body` is empty and non-`None` even for
/// a syntactically broken buffer -- the parser always returns *a* chunk,
/// filling in only the statements it could recover.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// A unique identity for an AST node, used as the key for side tables
/// (inferred types, scope membership) so analysis passes never need to
/// mutate the tree itself.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_default_span_is_zero() {
        let chunk = Chunk { body: vec![], span: Span::default() };
        assert_eq!(chunk.span.len(), 0);
    }
}
