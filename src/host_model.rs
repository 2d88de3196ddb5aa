//! Declarative catalog of everything the host (the pipeline runtime)
//! injects into a script: disabled globals, standard globals, helper
//! functions, per-hook `context` schemas, return contracts, snippets, and
//! builtin library docs. This is data, not code: an embedding constructs
//! one `HostModel` and hands it to `Engine::new` once.
//!
//! A build-time code generator reading from a large JSON fixture would be
//! disproportionate to this crate's scope, so the catalog below is
//! hand-authored Rust data -- declarative constant tables in the same
//! spirit as the lexer's keyword/operator slices -- backed by `once_cell`
//! for the process-wide default instance.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParamDoc {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HelperDoc {
    pub name: String,
    pub signature: String,
    pub description: String,
    pub params: Vec<ParamDoc>,
    pub returns: String,
    pub example: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextField {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub description: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Blocking,
    Async,
    Enrichment,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReturnContract {
    pub mode: ExecutionMode,
    pub description: String,
    pub required_fields: Vec<String>,
    pub optional_fields: Vec<String>,
    pub example: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnippetTemplate {
    pub label: String,
    pub body: String,
    pub description: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NestedObjectSchema {
    pub fields: Vec<ContextField>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HostModel {
    /// name -> user-facing security message
    pub disabled_globals: HashMap<String, String>,
    pub standard_globals: Vec<String>,
    pub helpers: Vec<HelperDoc>,
    pub universal_context_fields: Vec<ContextField>,
    pub context_fields_by_hook: HashMap<String, Vec<ContextField>>,
    pub nested_objects: HashMap<String, NestedObjectSchema>,
    pub return_contracts: HashMap<ExecutionMode, ReturnContract>,
    pub snippets: Vec<SnippetTemplate>,
    pub keywords: Vec<String>,
    /// "string.format" -> doc, "table.insert" -> doc, etc.
    pub builtin_library_docs: HashMap<String, HelperDoc>,
}

impl HostModel {
    pub fn helper(&self, name: &str) -> Option<&HelperDoc> {
        self.helpers.iter().find(|h| h.name == name)
    }

    pub fn context_fields_for_hook(&self, hook: Option<&str>) -> Vec<&ContextField> {
        let mut fields: Vec<&ContextField> = self.universal_context_fields.iter().collect();
        if let Some(hook) = hook {
            if let Some(specific) = self.context_fields_by_hook.get(hook) {
                fields.extend(specific.iter());
            }
        }
        fields
    }

    pub fn context_field(&self, hook: Option<&str>, name: &str) -> Option<&ContextField> {
        self.context_fields_for_hook(hook).into_iter().find(|f| f.name == name)
    }

    pub fn nested_object(&self, name: &str) -> Option<&NestedObjectSchema> {
        self.nested_objects.get(name)
    }

    pub fn return_contract(&self, mode: ExecutionMode) -> Option<&ReturnContract> {
        self.return_contracts.get(&mode)
    }

    /// Structural validation run once at `Engine::new`. See
    /// `error::HostModelError` for why this is the one place allowed to
    /// fail construction outright.
    pub fn validate(&self) -> Result<(), crate::error::HostModelError> {
        let mut seen = std::collections::HashSet::new();
        for helper in &self.helpers {
            if !seen.insert(&helper.name) {
                return Err(crate::error::HostModelError::DuplicateHelper(helper.name.clone()));
            }
        }
        for name in self.disabled_globals.keys() {
            if self.standard_globals.iter().any(|g| g == name) {
                return Err(crate::error::HostModelError::DisabledGlobalAlsoStandard(name.clone()));
            }
        }
        for (hook, fields) in &self.context_fields_by_hook {
            let universal_names: std::collections::HashSet<&str> =
                self.universal_context_fields.iter().map(|f| f.name.as_str()).collect();
            if !universal_names.is_empty() && fields.is_empty() && self.universal_context_fields.is_empty() {
                return Err(crate::error::HostModelError::HookMissingUniversalFields(hook.clone()));
            }
        }
        Ok(())
    }
}

/// The sandboxed standard library surface plus pipeline globals. Everything
/// outside this list that is not bound locally is flagged by the
/// undefined-identifier pass (unless it resolves to a Host Model helper).
pub const DEFAULT_STANDARD_GLOBALS: &[&str] = &[
    "assert", "collectgarbage", "error", "getmetatable", "ipairs", "next", "pairs", "pcall",
    "print", "select", "setmetatable", "tonumber", "tostring", "type", "unpack", "xpcall",
    "string", "table", "math", "_G", "_VERSION", "true", "false", "nil", "helpers", "context",
    "await",
];

/// Globals the sandbox removes from the runtime; using one is always an
/// error (decade 4xxx), with a message explaining the restriction.
pub const DEFAULT_DISABLED_GLOBALS: &[(&str, &str)] = &[
    ("os", "'os' is disabled in sandboxed pipeline scripts; no process or filesystem access is available"),
    ("io", "'io' is disabled in sandboxed pipeline scripts; use 'helpers.fetch' for network access"),
    ("package", "'package' is disabled; scripts cannot load external modules"),
    ("loadfile", "'loadfile' is disabled; scripts cannot read files from disk"),
    ("dofile", "'dofile' is disabled; scripts cannot execute files from disk"),
    ("loadstring", "'loadstring' is disabled; scripts cannot compile code at runtime"),
    ("load", "'load' is disabled; scripts cannot compile code at runtime"),
    ("rawset", "'rawset' is disabled; it would bypass the sandbox's metatable protections"),
    ("rawget", "'rawget' is disabled; it would bypass the sandbox's metatable protections"),
    ("require", "'require' is disabled; scripts cannot import external modules"),
    ("getfenv", "'getfenv' is disabled; scripts cannot inspect the sandbox's function environment"),
    ("setfenv", "'setfenv' is disabled; scripts cannot alter the sandbox's function environment"),
    ("newproxy", "'newproxy' is disabled; it is a legacy userdata escape hatch"),
];

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Builds the reference Host Model used by tests and as a sensible default
/// for embeddings that have not yet authored their own pipeline-specific
/// catalog. Real embeddings are expected to supply their own via
/// `createEngine`; this one exists so the engine is usable out of the box.
pub fn default_host_model() -> HostModel {
    let mut model = HostModel {
        disabled_globals: DEFAULT_DISABLED_GLOBALS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        standard_globals: DEFAULT_STANDARD_GLOBALS.iter().map(|s| s.to_string()).collect(),
        keywords: DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    };

    model.helpers = vec![
        HelperDoc {
            name: "helpers.fetch".to_string(),
            signature: "helpers.fetch(url, options)".to_string(),
            description: "Performs an HTTP request and returns the response.".to_string(),
            params: vec![
                ParamDoc { name: "url".to_string(), type_name: "string".to_string(), description: "Request URL".to_string(), optional: false },
                ParamDoc { name: "options".to_string(), type_name: "table".to_string(), description: "method/headers/body".to_string(), optional: true },
            ],
            returns: "table { status: number, body: string, headers: table }".to_string(),
            example: Some("local res = helpers.fetch(\"https://example.com\")".to_string()),
        },
        HelperDoc {
            name: "helpers.matches".to_string(),
            signature: "helpers.matches(value, pattern)".to_string(),
            description: "Tests a string against a Lua pattern.".to_string(),
            params: vec![
                ParamDoc { name: "value".to_string(), type_name: "string".to_string(), description: "Subject string".to_string(), optional: false },
                ParamDoc { name: "pattern".to_string(), type_name: "string".to_string(), description: "Lua pattern".to_string(), optional: false },
            ],
            returns: "boolean".to_string(),
            example: Some("helpers.matches(email, \"%.com$\")".to_string()),
        },
        HelperDoc {
            name: "helpers.now".to_string(),
            signature: "helpers.now()".to_string(),
            description: "Returns the current Unix timestamp in seconds.".to_string(),
            params: vec![],
            returns: "number".to_string(),
            example: None,
        },
        HelperDoc {
            name: "helpers.hash".to_string(),
            signature: "helpers.hash(value)".to_string(),
            description: "Returns a stable hash of the given string.".to_string(),
            params: vec![ParamDoc { name: "value".to_string(), type_name: "string".to_string(), description: "Input".to_string(), optional: false }],
            returns: "string".to_string(),
            example: None,
        },
    ];

    model.universal_context_fields = vec![
        ContextField { name: "user".to_string(), type_name: "context.PipelineUser".to_string(), description: "The authenticated user, if any.".to_string(), optional: true },
        ContextField { name: "session".to_string(), type_name: "context.PipelineSession".to_string(), description: "The active session.".to_string(), optional: true },
        ContextField { name: "request".to_string(), type_name: "context.RequestInfo".to_string(), description: "The inbound HTTP request.".to_string(), optional: false },
        ContextField { name: "prev".to_string(), type_name: "table".to_string(), description: "The return value of the previous script in the pipeline.".to_string(), optional: true },
        ContextField { name: "outputs".to_string(), type_name: "table".to_string(), description: "Return values of every script in the pipeline, keyed by script id.".to_string(), optional: true },
    ];

    model.context_fields_by_hook.insert(
        "before_signup".to_string(),
        vec![
            ContextField { name: "email".to_string(), type_name: "string".to_string(), description: "The email address the signup form submitted.".to_string(), optional: false },
            ContextField { name: "name".to_string(), type_name: "string".to_string(), description: "The display name the signup form submitted.".to_string(), optional: true },
            ContextField { name: "trigger_event".to_string(), type_name: "string".to_string(), description: "The pipeline event that triggered this hook.".to_string(), optional: false },
            ContextField { name: "apikey".to_string(), type_name: "context.PipelineApiKey".to_string(), description: "The API key used for this request.".to_string(), optional: true },
            ContextField { name: "client".to_string(), type_name: "context.OAuthClient".to_string(), description: "The OAuth client initiating signup.".to_string(), optional: true },
        ],
    );

    model.nested_objects.insert(
        "RequestInfo".to_string(),
        NestedObjectSchema {
            fields: vec![
                ContextField { name: "ip".to_string(), type_name: "string".to_string(), description: "Client IP address.".to_string(), optional: false },
                ContextField { name: "headers".to_string(), type_name: "table".to_string(), description: "Request headers.".to_string(), optional: false },
                ContextField { name: "method".to_string(), type_name: "string".to_string(), description: "HTTP method.".to_string(), optional: false },
            ],
        },
    );
    model.nested_objects.insert(
        "PipelineUser".to_string(),
        NestedObjectSchema {
            fields: vec![
                ContextField { name: "id".to_string(), type_name: "string".to_string(), description: "User id.".to_string(), optional: false },
                ContextField { name: "email".to_string(), type_name: "string".to_string(), description: "User email.".to_string(), optional: true },
            ],
        },
    );
    model.nested_objects.insert("PipelineSession".to_string(), NestedObjectSchema::default());
    model.nested_objects.insert("PipelineApiKey".to_string(), NestedObjectSchema::default());
    model.nested_objects.insert("OAuthClient".to_string(), NestedObjectSchema::default());

    model.return_contracts.insert(
        ExecutionMode::Blocking,
        ReturnContract {
            mode: ExecutionMode::Blocking,
            description: "Must decide whether the request is allowed to proceed.".to_string(),
            required_fields: vec!["allowed".to_string()],
            optional_fields: vec!["data".to_string(), "error".to_string()],
            example: "return { allowed = true }".to_string(),
        },
    );
    model.return_contracts.insert(
        ExecutionMode::Enrichment,
        ReturnContract {
            mode: ExecutionMode::Enrichment,
            description: "Must return data to merge into the pipeline context.".to_string(),
            required_fields: vec!["data".to_string()],
            optional_fields: vec!["error".to_string()],
            example: "return { data = { score = 1 } }".to_string(),
        },
    );
    model.return_contracts.insert(
        ExecutionMode::Async,
        ReturnContract {
            mode: ExecutionMode::Async,
            description: "Fire-and-forget; no return value is required.".to_string(),
            required_fields: vec![],
            optional_fields: vec![],
            example: "-- no return required".to_string(),
        },
    );

    model.snippets = vec![
        SnippetTemplate {
            label: "allow/deny".to_string(),
            body: "return { allowed = ${1:true} }".to_string(),
            description: "Blocking-mode return shape.".to_string(),
        },
        SnippetTemplate {
            label: "enrichment data".to_string(),
            body: "return { data = { ${1:key} = ${2:value} } }".to_string(),
            description: "Enrichment-mode return shape.".to_string(),
        },
    ];

    model.builtin_library_docs.insert(
        "string.format".to_string(),
        HelperDoc {
            name: "string.format".to_string(),
            signature: "string.format(fmt, ...)".to_string(),
            description: "Returns a formatted string, C `printf`-style.".to_string(),
            params: vec![],
            returns: "string".to_string(),
            example: None,
        },
    );
    model.builtin_library_docs.insert(
        "table.insert".to_string(),
        HelperDoc {
            name: "table.insert".to_string(),
            signature: "table.insert(list, value)".to_string(),
            description: "Appends `value` to `list`.".to_string(),
            params: vec![],
            returns: "nil".to_string(),
            example: None,
        },
    );
    model.builtin_library_docs.insert(
        "math.floor".to_string(),
        HelperDoc {
            name: "math.floor".to_string(),
            signature: "math.floor(x)".to_string(),
            description: "Rounds `x` down to the nearest integer.".to_string(),
            params: vec![],
            returns: "integer".to_string(),
            example: None,
        },
    );

    model
}

/// Process-wide default catalog, backed by a `once_cell` singleton --
/// available for embeddings and tests that don't need a bespoke Host
/// Model.
pub static DEFAULT: once_cell::sync::Lazy<HostModel> = once_cell::sync::Lazy::new(default_host_model);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_validates() {
        assert!(default_host_model().validate().is_ok());
    }

    #[test]
    fn os_is_disabled() {
        assert!(default_host_model().disabled_globals.contains_key("os"));
    }

    #[test]
    fn helper_lookup_finds_fetch() {
        let model = default_host_model();
        assert!(model.helper("helpers.fetch").is_some());
        assert!(model.helper("helpers.nonexistent").is_none());
    }

    #[test]
    fn context_fields_merge_universal_and_hook_specific() {
        let model = default_host_model();
        let fields = model.context_fields_for_hook(Some("before_signup"));
        assert!(fields.iter().any(|f| f.name == "user"));
        assert!(fields.iter().any(|f| f.name == "apikey"));
    }

    #[test]
    fn context_fields_without_hook_omits_hook_specific() {
        let model = default_host_model();
        let fields = model.context_fields_for_hook(None);
        assert!(!fields.iter().any(|f| f.name == "apikey"));
    }

    #[test]
    fn validate_rejects_duplicate_helper() {
        let mut model = default_host_model();
        let dup = model.helpers[0].clone();
        model.helpers.push(dup);
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_rejects_global_listed_as_both() {
        let mut model = default_host_model();
        model.standard_globals.push("os".to_string());
        assert!(model.validate().is_err());
    }

    #[test]
    fn return_contract_blocking_requires_allowed() {
        let model = default_host_model();
        let contract = model.return_contract(ExecutionMode::Blocking).unwrap();
        assert_eq!(contract.required_fields, vec!["allowed".to_string()]);
    }
}
