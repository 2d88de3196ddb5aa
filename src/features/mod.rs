//! Feature adapters: thin, pure consumers of the query layer
//! (`crate::query`) and the diagnostics/formatter passes. None of these
//! modules reach into `Chunk`/`ScopeTree` directly.

pub mod completion;
pub mod find_references;
pub mod goto_definition;
pub mod hover;
pub mod inlay_hints;
pub mod semantic_tokens;
pub mod signature;
