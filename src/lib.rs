//! Static analysis engine for pipeline hook scripts (a Lua 5.3 dialect).
//!
//! The crate is organized as a pipeline of passes over an immutable source
//! buffer: lex/parse -> scope tree -> flow-sensitive type inference ->
//! query layer -> feature adapters. Every public entry point is a pure
//! function of its inputs (buffer, position, options, host model); there
//! is no process-wide mutable state. `Engine` (below) is the single
//! editor-host boundary -- adapters in `features` are thin consumers of
//! `query` and never reach into `ast`/`scope` directly.

pub mod analysis;
pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod formatter;
pub mod host_model;
pub mod intern;
pub mod lexer;
pub mod parser;
pub mod pos;
pub mod query;
pub mod repair;
pub mod scope;
pub mod suggest;
pub mod token;
pub mod types;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

use std::collections::HashMap;

use analysis::{analyze, AnalyzeOptions, Analysis};
use diagnostics::{Diagnostic, DiagnosticsContext, DiagnosticsOptions};
use error::HostModelError;
use features::completion::{self, CompletionContext, CompletionResult};
use features::find_references::{self, ReferenceLocation};
use features::goto_definition::{self, DefinitionLocation};
use features::hover::{self, HoverResult};
use features::inlay_hints::{self, InlayHint};
use features::semantic_tokens::{self, SemanticToken};
use features::signature::{self, SignatureResult};
use host_model::{ExecutionMode, HostModel};
use parser::ParseResult;
use query::{DeclId, ReturnSchema};
use scope::Declaration;

/// Everything a single `complete`/`hover`/`signature` call needs beyond the
/// buffer and caret. `script_outputs` is the host's precomputed
/// `returnSchemaOf` result for every upstream script in the pipeline DAG,
/// keyed by script id.
#[derive(Default)]
pub struct EngineContext<'a> {
    pub hook: Option<&'a str>,
    pub execution_mode: Option<ExecutionMode>,
    pub previous_script_source: Option<&'a str>,
    pub script_outputs: HashMap<String, ReturnSchema>,
}

/// Engine-wide configuration, separate from the per-call `EngineContext`:
/// the sandbox buffer ceiling and the default diagnostics behavior. An
/// embedding that wants a different cap or a suppressed/capped code set
/// builds one of these once, alongside the `HostModel`.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub max_buffer_bytes: usize,
    pub diagnostics: DiagnosticsOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions { max_buffer_bytes: 64 * 1024, diagnostics: DiagnosticsOptions::default() }
    }
}

/// The editor-host boundary. Holds an immutable, shared `HostModel` --
/// constructed once per embedding, never mutated, never a singleton --
/// and exposes every query/feature as a pure function of
/// `(buffer, pos, ctx)`. Two calls with identical inputs return equal
/// outputs; there is nothing to cancel and nothing to invalidate between
/// calls. `Engine` is `Send + Sync` (both fields are immutable, plain
/// data), so one instance can be shared across calls without
/// re-validating the host model each time.
pub struct Engine {
    host_model: HostModel,
    options: EngineOptions,
}

impl Engine {
    /// Fails fast on a malformed host model: a duplicate helper
    /// name, a global listed as both disabled and standard, or a hook
    /// missing the universal context fields is a programmer error in the
    /// embedding, not something a pipeline author's script can trigger.
    pub fn new(host_model: HostModel) -> Result<Self, HostModelError> {
        Self::with_options(host_model, EngineOptions::default())
    }

    pub fn with_options(host_model: HostModel, options: EngineOptions) -> Result<Self, HostModelError> {
        host_model.validate()?;
        Ok(Engine { host_model, options })
    }

    pub fn host_model(&self) -> &HostModel {
        &self.host_model
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn parse(&self, buffer: &str) -> ParseResult {
        let mut interner = intern::Interner::new();
        let (tokens, _comments, _errors) = lexer::tokenize(buffer, &mut interner);
        parser::parse(&tokens, &mut interner)
    }

    pub fn analyze(&self, buffer: &str, hook: Option<&str>) -> Analysis {
        analyze(buffer, AnalyzeOptions { host_model: &self.host_model, hook })
    }

    pub fn resolve_at(&self, buffer: &str, pos: u32, hook: Option<&str>) -> Option<query::Resolved> {
        let analysis = self.analyze(buffer, hook);
        query::resolve_at(&analysis, pos)
    }

    pub fn visible_symbols_at(
        &self,
        buffer: &str,
        pos: u32,
        hook: Option<&str>,
    ) -> HashMap<String, (DeclId, bool)> {
        let analysis = self.analyze(buffer, hook);
        query::visible_symbols_at(&analysis, pos)
            .into_iter()
            .map(|(sym, v)| (analysis.interner.resolve(sym).to_string(), v))
            .collect()
    }

    /// Resolves the identifier at `pos` to its declaration, then returns
    /// that declaration's references: wraps `resolveAt` plus the
    /// declaration-keyed `referencesOf`.
    pub fn references_of(&self, buffer: &str, pos: u32, hook: Option<&str>) -> Vec<ReferenceLocation> {
        find_references::find_references(buffer, pos, &self.host_model, hook, true)
    }

    pub fn return_schema_of(&self, buffer: &str, hook: Option<&str>) -> Option<ReturnSchema> {
        let analysis = self.analyze(buffer, hook);
        query::return_schema_of(&analysis)
    }

    pub fn complete(&self, buffer: &str, pos: u32, ctx: &EngineContext) -> Option<CompletionResult> {
        let completion_ctx = CompletionContext {
            hook: ctx.hook,
            previous_script_source: ctx.previous_script_source,
            script_outputs: &ctx.script_outputs,
        };
        completion::complete(buffer, pos, &self.host_model, &completion_ctx)
    }

    pub fn hover(&self, buffer: &str, pos: u32, ctx: &EngineContext) -> Option<HoverResult> {
        hover::hover(buffer, pos, &self.host_model, ctx.hook)
    }

    pub fn signature(&self, buffer: &str, pos: u32, ctx: &EngineContext) -> Option<SignatureResult> {
        signature::signature(buffer, pos, &self.host_model, ctx.hook)
    }

    pub fn goto_definition(&self, buffer: &str, pos: u32, ctx: &EngineContext) -> Option<DefinitionLocation> {
        goto_definition::goto_definition(buffer, pos, &self.host_model, ctx.hook)
    }

    pub fn diagnostics(&self, buffer: &str, ctx: &EngineContext, opts: &DiagnosticsOptions) -> Vec<Diagnostic> {
        let analysis = self.analyze(buffer, ctx.hook);
        let diag_ctx = DiagnosticsContext { host_model: &self.host_model, execution_mode: ctx.execution_mode };
        diagnostics::diagnostics_of(&analysis, &diag_ctx, opts)
    }

    pub fn semantic_tokens(&self, buffer: &str, ctx: &EngineContext) -> Vec<SemanticToken> {
        semantic_tokens::semantic_tokens(buffer, &self.host_model, ctx.hook)
    }

    pub fn inlay_hints(&self, buffer: &str, ctx: &EngineContext) -> Vec<InlayHint> {
        inlay_hints::inlay_hints(buffer, &self.host_model, ctx.hook)
    }

    pub fn format(&self, buffer: &str) -> String {
        formatter::format(buffer)
    }

    /// Declaration lookup used by adapters that already hold a `DeclId`
    /// (tests, and hosts that cache `resolveAt` results across calls).
    pub fn declaration<'a>(&self, analysis: &'a Analysis, decl: DeclId) -> &'a Declaration {
        analysis.scope_tree.declaration(decl)
    }
}

/// Constructs an `Engine` from an injected, immutable host model.
pub fn create_engine(host_model: HostModel) -> Result<Engine, HostModelError> {
    Engine::new(host_model)
}
