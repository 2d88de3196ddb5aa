//! WASM bindings for the in-browser editor host, exposed to JavaScript.
//! Every method takes plain JS values (strings, numbers, JSON) and
//! returns JSON -- the host never touches `Analysis`, `Chunk`, or any
//! other Rust-side type directly; interop stays at a thin JSON/JsValue
//! seam, the same way the rest of this crate keeps WASM bindings
//! separate from its pure analysis core.

use wasm_bindgen::prelude::*;

use crate::diagnostics::DiagnosticsOptions;
use crate::host_model::{self, HostModel};
use crate::{create_engine, Engine, EngineContext};

#[wasm_bindgen(start)]
pub fn init() {
    console_log::init_with_level(log::Level::Warn).ok();
    console_error_panic_hook::set_once();
}

/// Owned decode of the JS-side `ctx` object (the editor-host boundary's
/// `{hookName, executionMode, previousScriptSource, scriptOutputs}`).
/// Malformed or absent fields degrade to `None`/empty rather than failing
/// the call -- a host sending a partial context should still get
/// best-effort analysis. Kept owned (not borrowed into an `EngineContext`
/// directly) so every call site can build a short-lived `EngineContext`
/// that borrows from locals instead of leaking the source string.
#[derive(serde::Deserialize, Default)]
struct RawCtx {
    #[serde(rename = "hookName")]
    hook_name: Option<String>,
    #[serde(rename = "executionMode")]
    execution_mode: Option<String>,
    #[serde(rename = "previousScriptSource")]
    previous_script_source: Option<String>,
    #[serde(rename = "scriptOutputs")]
    script_outputs: Option<std::collections::HashMap<String, crate::query::ReturnSchema>>,
}

fn parse_ctx(ctx_json: &str) -> RawCtx {
    serde_json::from_str(ctx_json).unwrap_or_default()
}

fn execution_mode_of(raw: &RawCtx) -> Option<host_model::ExecutionMode> {
    match raw.execution_mode.as_deref() {
        Some("blocking") => Some(host_model::ExecutionMode::Blocking),
        Some("async") => Some(host_model::ExecutionMode::Async),
        Some("enrichment") => Some(host_model::ExecutionMode::Enrichment),
        _ => None,
    }
}

fn engine_ctx(raw: &RawCtx) -> EngineContext<'_> {
    EngineContext {
        hook: raw.hook_name.as_deref(),
        execution_mode: execution_mode_of(raw),
        previous_script_source: raw.previous_script_source.as_deref(),
        script_outputs: raw.script_outputs.clone().unwrap_or_default(),
    }
}

#[wasm_bindgen]
pub struct WasmEngine {
    inner: Engine,
}

#[wasm_bindgen]
impl WasmEngine {
    /// Constructs an engine from a serialized host model. `host_model_json`
    /// is the declarative globals/helpers/context catalog, serialized; an
    /// empty string loads the crate's built-in default model.
    #[wasm_bindgen(constructor)]
    pub fn new(host_model_json: &str) -> Result<WasmEngine, JsError> {
        let model: HostModel = if host_model_json.trim().is_empty() {
            host_model::default_host_model()
        } else {
            serde_json::from_str(host_model_json).map_err(|e| JsError::new(&e.to_string()))?
        };
        let inner = create_engine(model).map_err(|e| JsError::new(&e.to_string()))?;
        Ok(WasmEngine { inner })
    }

    #[wasm_bindgen(js_name = diagnostics)]
    pub fn diagnostics(&self, buffer: &str, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let ctx = engine_ctx(&raw);
        let diags = self.inner.diagnostics(buffer, &ctx, &DiagnosticsOptions::default());
        serde_json::to_string(&diags.iter().map(diagnostic_json).collect::<Vec<_>>())
            .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = complete)]
    pub fn complete(&self, buffer: &str, pos: u32, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let ctx = engine_ctx(&raw);
        let result = self.inner.complete(buffer, pos, &ctx);
        serde_json::to_string(&result.map(|r| {
            serde_json::json!({
                "from": r.from,
                "validFor": r.valid_for,
                "options": r.options.iter().map(|o| serde_json::json!({
                    "label": o.label,
                    "boost": o.boost,
                    "detail": o.detail,
                })).collect::<Vec<_>>(),
            })
        }))
        .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = hover)]
    pub fn hover(&self, buffer: &str, pos: u32, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let ctx = engine_ctx(&raw);
        let result = self.inner.hover(buffer, pos, &ctx);
        serde_json::to_string(&result.map(|r| {
            serde_json::json!({ "contents": r.contents, "range": [r.range.start, r.range.end] })
        }))
        .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = format)]
    pub fn format(&self, buffer: &str) -> String {
        self.inner.format(buffer)
    }

    #[wasm_bindgen(js_name = signature)]
    pub fn signature(&self, buffer: &str, pos: u32, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let ctx = engine_ctx(&raw);
        let result = self.inner.signature(buffer, pos, &ctx);
        serde_json::to_string(&result.map(|r| {
            serde_json::json!({
                "label": r.label,
                "activeParam": r.active_param,
                "params": r.params.iter().map(|p| serde_json::json!({
                    "label": p.label,
                    "documentation": p.documentation,
                })).collect::<Vec<_>>(),
            })
        }))
        .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = gotoDefinition)]
    pub fn goto_definition(&self, buffer: &str, pos: u32, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let ctx = engine_ctx(&raw);
        let result = self.inner.goto_definition(buffer, pos, &ctx);
        serde_json::to_string(&result.map(|r| {
            serde_json::json!({ "range": [r.span.start, r.span.end], "start": [r.start.line, r.start.column], "end": [r.end.line, r.end.column] })
        }))
        .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = referencesOf)]
    pub fn references_of(&self, buffer: &str, pos: u32, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let refs = self.inner.references_of(buffer, pos, raw.hook_name.as_deref());
        serde_json::to_string(
            &refs
                .iter()
                .map(|r| serde_json::json!({ "range": [r.span.start, r.span.end], "start": [r.start.line, r.start.column], "end": [r.end.line, r.end.column] }))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = returnSchemaOf)]
    pub fn return_schema_of(&self, buffer: &str, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let schema = self.inner.return_schema_of(buffer, raw.hook_name.as_deref());
        serde_json::to_string(&schema.map(|s| {
            serde_json::json!({
                "fields": s.fields.iter().collect::<Vec<_>>(),
                "dataFields": s.data_fields.iter().collect::<Vec<_>>(),
            })
        }))
        .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = semanticTokens)]
    pub fn semantic_tokens(&self, buffer: &str, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let ctx = engine_ctx(&raw);
        let tokens = self.inner.semantic_tokens(buffer, &ctx);
        serde_json::to_string(
            &tokens
                .iter()
                .map(|t| serde_json::json!({ "range": [t.span.start, t.span.end], "role": format!("{:?}", t.role) }))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen(js_name = inlayHints)]
    pub fn inlay_hints(&self, buffer: &str, ctx_json: &str) -> Result<String, JsError> {
        let raw = parse_ctx(ctx_json);
        let ctx = engine_ctx(&raw);
        let hints = self.inner.inlay_hints(buffer, &ctx);
        serde_json::to_string(
            &hints
                .iter()
                .map(|h| serde_json::json!({ "position": h.position, "label": h.label }))
                .collect::<Vec<_>>(),
        )
        .map_err(|e| JsError::new(&e.to_string()))
    }
}

fn diagnostic_json(d: &crate::diagnostics::Diagnostic) -> serde_json::Value {
    serde_json::json!({
        "range": [d.range.start, d.range.end],
        "severity": format!("{:?}", d.severity),
        "code": d.code.number(),
        "message": d.message,
        "source": d.source,
    })
}
