//! Pure type-inference rules, kept free of scope-tree mutation
//! so they can be unit-tested against bare `Type` values without building a
//! whole buffer through the lexer/parser first.

use crate::ast::{BinaryOp, LogicalOp};
use crate::host_model::HostModel;
use crate::types::{FunctionType, NamedType, Primitive, TableType, Type};

pub fn infer_member(base: &Type, property: &str, host_model: &HostModel, hook: Option<&str>) -> Type {
    match base {
        Type::Global(g) if g == "context" => infer_context_member(property, host_model, hook),
        Type::Global(g) if g == "outputs" || g == "prev" => Type::Unknown,
        Type::Global(g) if g == "helpers" => {
            let full = format!("helpers.{property}");
            match host_model.helper(&full) {
                Some(doc) => helper_to_function_type(doc),
                None => Type::Unknown,
            }
        }
        Type::Global(lib) if host_model.builtin_library_docs.keys().any(|k| k.starts_with(&format!("{lib}."))) => {
            let full = format!("{lib}.{property}");
            match host_model.builtin_library_docs.get(&full) {
                Some(doc) => helper_to_function_type(doc),
                None => Type::Unknown,
            }
        }
        Type::Context(obj) => match host_model.nested_object(obj) {
            Some(schema) => schema
                .fields
                .iter()
                .find(|f| f.name == property)
                .map(|f| primitive_or_context(&f.type_name))
                .unwrap_or(Type::Unknown),
            None => Type::Unknown,
        },
        Type::Table(_) => base.field(property).unwrap_or(Type::Unknown),
        _ => Type::Unknown,
    }
}

fn infer_context_member(property: &str, host_model: &HostModel, hook: Option<&str>) -> Type {
    match property {
        "prev" => Type::Global("prev".to_string()),
        "outputs" => Type::Global("outputs".to_string()),
        "user" | "session" | "apikey" | "client" | "request" => Type::Context(nested_object_name(property)),
        other => host_model
            .context_field(hook, other)
            .map(|f| primitive_or_context(&f.type_name))
            .unwrap_or(Type::Unknown),
    }
}

fn nested_object_name(field: &str) -> String {
    match field {
        "user" => "PipelineUser",
        "session" => "PipelineSession",
        "apikey" => "PipelineApiKey",
        "client" => "OAuthClient",
        "request" => "RequestInfo",
        other => other,
    }
    .to_string()
}

fn primitive_or_context(type_name: &str) -> Type {
    match type_name {
        "string" => Type::Primitive(Primitive::String),
        "number" => Type::Primitive(Primitive::Number),
        "integer" => Type::Primitive(Primitive::Integer),
        "boolean" => Type::Primitive(Primitive::Boolean),
        "table" => Type::table(),
        name if name.starts_with("context.") => Type::Context(name.trim_start_matches("context.").to_string()),
        _ => Type::Unknown,
    }
}

fn helper_to_function_type(doc: &crate::host_model::HelperDoc) -> Type {
    Type::Function(FunctionType {
        params: doc
            .params
            .iter()
            .map(|p| NamedType { name: p.name.clone(), ty: primitive_or_context(&p.type_name), optional: p.optional })
            .collect(),
        returns: vec![infer_helper_return(&doc.returns)],
        is_async: false,
        doc: Some(doc.description.clone()),
    })
}

/// Parses the catalog's `returns` doc string. Most entries are a bare
/// primitive name (`"boolean"`, `"number"`, ...); a handful (currently just
/// `helpers.fetch`) declare an inline shape as `"table { k: type, ... }"`,
/// which is parsed into a real `TableType` so member access on the call
/// result (`helpers.fetch(url).status`) resolves instead of going `unknown`.
fn infer_helper_return(returns: &str) -> Type {
    match returns.strip_prefix("table").map(str::trim) {
        Some(shape) if shape.starts_with('{') && shape.ends_with('}') => {
            let inner = &shape[1..shape.len() - 1];
            let mut table = TableType::default();
            for entry in inner.split(',') {
                let entry = entry.trim();
                if entry.is_empty() {
                    continue;
                }
                if let Some((name, ty)) = entry.split_once(':') {
                    table.fields.insert(name.trim().to_string(), primitive_or_context(ty.trim()));
                }
            }
            Type::Table(table)
        }
        Some(_) => Type::table(),
        None => primitive_or_context(returns),
    }
}

/// Specialized return type for a small set of well-known helper calls
/// (the `helpers.fetch`/`matches`/`now`/`hash` catalog entries), falling
/// back to the Host Model's declared return type, falling back to unknown.
pub fn infer_call_result(callee: &Type) -> Type {
    match callee {
        Type::Function(f) => f.returns.first().cloned().unwrap_or(Type::Unknown),
        _ => Type::Unknown,
    }
}

pub fn infer_binary(op: BinaryOp) -> Type {
    match op {
        BinaryOp::Concat => Type::Primitive(Primitive::String),
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::FloorDiv
        | BinaryOp::Mod
        | BinaryOp::Pow
        | BinaryOp::BAnd
        | BinaryOp::BOr
        | BinaryOp::BXor
        | BinaryOp::Shl
        | BinaryOp::Shr => Type::Primitive(Primitive::Number),
        BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            Type::Primitive(Primitive::Boolean)
        }
    }
}

/// `a or b`: if `a` is statically `nil`, the result widens to `b`'s type;
/// otherwise both branches are live, so the result is their union.
pub fn infer_logical(op: LogicalOp, left: &Type, right: &Type) -> Type {
    match op {
        LogicalOp::Or if left.is_nil() => right.clone(),
        LogicalOp::Or | LogicalOp::And => Type::union(vec![left.clone(), right.clone()]),
    }
}

/// Binds for `for k, v in pairs(t) do` / `ipairs(t) do`, returning
/// `(key_type, value_type)`. Any other iterator expression yields
/// `(unknown, unknown)` -- only `pairs`/`ipairs` are special-cased.
pub fn infer_generic_for_binding(iterator_callee_name: Option<&str>, iterated: &Type) -> (Type, Type) {
    match iterator_callee_name {
        Some("pairs") => {
            let value = match iterated {
                Type::Table(t) => Type::union(t.fields.values().cloned().collect()),
                _ => Type::Unknown,
            };
            (Type::Primitive(Primitive::String), value)
        }
        Some("ipairs") => {
            let value = match iterated {
                Type::Table(t) => Type::union(t.fields.values().cloned().collect()),
                _ => Type::Unknown,
            };
            (Type::Primitive(Primitive::Number), value)
        }
        _ => (Type::Unknown, Type::Unknown),
    }
}
