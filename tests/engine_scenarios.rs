//! End-to-end tests driving the public `Engine` API (the editor-host
//! boundary), one per §8 concrete scenario. Internal `#[cfg(test)]` units
//! elsewhere in the crate exercise private functions directly; these go
//! through `create_engine` the way an embedding actually would.

use std::collections::HashMap;

use script_analyzer::diagnostics::{DiagnosticCode, DiagnosticsOptions, Severity};
use script_analyzer::host_model::default_host_model;
use script_analyzer::query::ReturnSchema;
use script_analyzer::{create_engine, EngineContext};

fn engine() -> script_analyzer::Engine {
    create_engine(default_host_model()).expect("default host model validates")
}

/// Scenario 1: `os.exit()` is a single sandbox-disabled-global error on `os`.
#[test]
fn disabled_global_use_is_a_single_sandbox_error() {
    let engine = engine();
    let ctx = EngineContext::default();
    let diags = engine.diagnostics("os.exit()", &ctx, &DiagnosticsOptions::default());

    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, DiagnosticCode::DisabledGlobal);
    assert_eq!(diags[0].code.number(), 4001);
    assert_eq!(diags[0].severity, Severity::Error);
    let covered = "os.exit()".find("os").map(|i| i as u32..(i + 2) as u32).unwrap();
    assert_eq!(diags[0].range.start, covered.start);
    assert_eq!(diags[0].range.end, covered.end);
    assert!(diags[0].message.to_lowercase().contains("os"));
}

/// Scenario 2: hook-aware completion on `context.` for `before_signup`
/// surfaces both universal and hook-specific fields, the latter boosted
/// higher.
#[test]
fn hook_aware_completion_ranks_hook_specific_fields_above_universal() {
    let engine = engine();
    let ctx = EngineContext { hook: Some("before_signup"), ..Default::default() };
    let buffer = "context.";
    let result = engine.complete(buffer, buffer.len() as u32, &ctx).expect("completion at context.");

    let boost_of = |label: &str| result.options.iter().find(|o| o.label == label).map(|o| o.boost);
    for expected in ["email", "name", "request", "trigger_event", "prev", "outputs"] {
        assert!(boost_of(expected).is_some(), "missing option `{expected}`");
    }
    assert!(boost_of("email").unwrap() >= boost_of("trigger_event").unwrap());
}

/// Scenario 3: `context.prev.` merges the static return triple with the
/// previous script's actual declared fields (including its `data` keys).
#[test]
fn previous_script_schema_completion_merges_static_and_dynamic_fields() {
    let engine = engine();
    let ctx = EngineContext {
        previous_script_source: Some("return { allowed = true, data = { foo = 1, bar = \"x\" } }"),
        ..Default::default()
    };
    let buffer = "context.prev.";
    let result = engine.complete(buffer, buffer.len() as u32, &ctx).expect("completion at context.prev.");

    let labels: Vec<&str> = result.options.iter().map(|o| o.label.as_str()).collect();
    for expected in ["allowed", "data", "error", "foo", "bar"] {
        assert!(labels.contains(&expected), "missing `{expected}` in {labels:?}");
    }
}

/// Scenario 4: `context.outputs["s1"].data.` with a known DAG schema
/// yields exactly the known `data` sub-schema fields, nothing else.
#[test]
fn dag_output_completion_yields_exactly_the_known_data_fields() {
    let engine = engine();
    let mut schema = ReturnSchema::default();
    schema.fields.insert("allowed".to_string());
    schema.fields.insert("data".to_string());
    schema.fields.insert("score".to_string());
    schema.data_fields.insert("city".to_string());
    let mut script_outputs = HashMap::new();
    script_outputs.insert("s1".to_string(), schema);

    let ctx = EngineContext { script_outputs, ..Default::default() };
    let buffer = "context.outputs[\"s1\"].data.";
    let result = engine.complete(buffer, buffer.len() as u32, &ctx).expect("completion at outputs[..].data.");

    let labels: Vec<&str> = result.options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["city"]);
}

/// Scenario 5: a helper-call argument with a short undeclared name is
/// flagged exactly once; the call's own method name (a member property,
/// never a use site) is never flagged.
#[test]
fn member_property_is_not_flagged_but_undeclared_argument_is() {
    let engine = engine();
    let ctx = EngineContext::default();
    let diags = engine.diagnostics("helpers.matches(email, \"%.com\")", &ctx, &DiagnosticsOptions::default());

    let undefined: Vec<_> = diags.iter().filter(|d| d.code == DiagnosticCode::UndefinedIdentifier).collect();
    assert_eq!(undefined.len(), 1);
    assert!(!diags.iter().any(|d| d.message.contains("matches")));
    assert!(undefined[0].message.contains("email"));
}

/// Scenario 6: a single level of `setmetatable(t, { __index = base })`
/// makes `t.f` resolve through `base`'s own `f` field for both hover
/// (type) and goto-definition (location), and does not duplicate `base`'s
/// reference list in the process.
#[test]
fn metatable_index_resolves_field_type_and_definition_through_base() {
    let engine = engine();
    let ctx = EngineContext::default();
    let buffer = "local base = { f = 1 }\nlocal t = {}\nsetmetatable(t, { __index = base })\nt.f";
    let pos = buffer.len() as u32;

    let hover = engine.hover(buffer, pos, &ctx).expect("hover on t.f");
    assert!(hover.contents.contains("number"), "expected number in {:?}", hover.contents);

    let def = engine.goto_definition(buffer, pos, &ctx).expect("goto-definition on t.f");
    let base_f_offset = buffer.find("f = 1").unwrap() as u32;
    assert_eq!(def.start.offset, base_f_offset);

    let base_pos = buffer.find("base").unwrap() as u32 + 1;
    let refs = engine.references_of(buffer, base_pos, None);
    // declaration + the `__index = base` use -- not duplicated.
    assert_eq!(refs.len(), 2);
}
