use std::collections::BTreeMap;

use crate::intern::Symbol;
use crate::pos::Span;

/// The inferred shape of a Script Language value. `unknown` is the
/// universal escape hatch: it never triggers a diagnostic and is
/// bidirectionally assignable with everything else.
#[derive(Clone, Debug)]
pub enum Type {
    Unknown,
    Primitive(Primitive),
    Table(TableType),
    Function(FunctionType),
    Union(Vec<Type>),
    Literal(Box<Type>, LiteralValue),
    /// A named reference to a type alias or a not-yet-resolved binding.
    /// No current pass constructs this variant -- inference always
    /// resolves a name to its underlying `Type` rather than leaving a
    /// `ref` behind -- but it is part of the declared `Type` sum (the
    /// Script Language has no alias declarations to populate it with).
    Ref(String),
    /// `context.<object>` -- a nested schema object from the Host Model.
    Context(String),
    /// A bare host global (`helpers`, `context`, `string`, ...).
    Global(String),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
    Nil,
}

#[derive(Clone, PartialEq, Debug)]
pub enum LiteralValue {
    Str(Symbol),
    Number(F64Bits),
    Bool(bool),
}

/// `f64` has no total `Eq`; wrap the bit pattern so literal types can still
/// derive equality without pulling in a float-ordering crate for one field.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct F64Bits(pub u64);

impl F64Bits {
    pub fn from_f64(v: f64) -> Self {
        F64Bits(v.to_bits())
    }
}

#[derive(Clone, Debug, Default)]
pub struct TableType {
    pub fields: BTreeMap<String, Type>,
    /// Where each field's value was written (a table-constructor entry, a
    /// `t.k = v` assignment, or a `function t.k() ... end` declaration) --
    /// goto-definition on `t.k` lands here.
    pub field_spans: BTreeMap<String, Span>,
    pub index_key: Option<Box<Type>>,
    pub index_value: Option<Box<Type>>,
    /// Types chained in from `setmetatable(t, { __index = base })`, tried
    /// left to right when a field lookup misses `fields`.
    pub bases: Vec<Type>,
}

#[derive(Clone, Debug)]
pub struct NamedType {
    pub name: String,
    pub ty: Type,
    pub optional: bool,
}

#[derive(Clone, Debug, Default)]
pub struct FunctionType {
    pub params: Vec<NamedType>,
    pub returns: Vec<Type>,
    pub is_async: bool,
    pub doc: Option<String>,
}

impl Type {
    pub fn table() -> Type {
        Type::Table(TableType::default())
    }

    /// Flattens nested unions, dedupes by a structural key, and collapses a
    /// one-element union to its member.
    pub fn union(types: Vec<Type>) -> Type {
        let mut flat = Vec::new();
        for t in types {
            match t {
                Type::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        let mut seen = std::collections::HashSet::new();
        let mut deduped = Vec::new();
        for t in flat {
            let key = format!("{t:?}");
            if seen.insert(key) {
                deduped.push(t);
            }
        }
        match deduped.len() {
            0 => Type::Unknown,
            1 => deduped.into_iter().next().unwrap(),
            _ => Type::Union(deduped),
        }
    }

    /// Drops literal precision to the underlying primitive, the way `local
    /// x = 5` widens to `number` once `x` is reassigned elsewhere.
    pub fn widen(&self) -> Type {
        match self {
            Type::Literal(base, _) => (**base).clone(),
            other => other.clone(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Nil))
    }

    pub fn contains_nil(&self) -> bool {
        match self {
            Type::Primitive(Primitive::Nil) => true,
            Type::Union(types) => types.iter().any(|t| t.contains_nil()),
            _ => false,
        }
    }

    /// Structural assignability used by diagnostics that care about it
    /// (currently advisory only -- full
    /// type-checker soundness, so this is never used to reject code, only
    /// to help hover/format render something readable).
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Unknown, _) | (_, Type::Unknown) => true,
            (Type::Primitive(Primitive::Number), Type::Primitive(Primitive::Integer)) => true,
            (a, b) if format!("{a:?}") == format!("{b:?}") => true,
            (Type::Union(types), b) => types.iter().any(|t| t.is_assignable_from(b)),
            (a, _) if a.contains_nil() && other.is_nil() => true,
            (Type::Table(_), Type::Table(_)) => true,
            (Type::Function(_), Type::Function(_)) => true,
            _ => false,
        }
    }

    pub fn field(&self, name: &str) -> Option<Type> {
        match self {
            Type::Table(t) => t
                .fields
                .get(name)
                .cloned()
                .or_else(|| t.bases.iter().find_map(|b| b.field(name))),
            _ => None,
        }
    }

    /// Where `name` was defined, searching `bases` left-to-right when the
    /// table itself has no span on record for it.
    pub fn field_span(&self, name: &str) -> Option<Span> {
        match self {
            Type::Table(t) => t
                .field_spans
                .get(name)
                .copied()
                .or_else(|| t.bases.iter().find_map(|b| b.field_span(name))),
            _ => None,
        }
    }
}

/// Renders a `Type` the way inlay hints and hover cards do -- short,
/// single-line, no nested field dumps.
pub fn format_type(ty: &Type) -> String {
    match ty {
        Type::Unknown => "any".to_string(),
        Type::Primitive(Primitive::String) => "string".to_string(),
        Type::Primitive(Primitive::Number) => "number".to_string(),
        Type::Primitive(Primitive::Integer) => "integer".to_string(),
        Type::Primitive(Primitive::Boolean) => "boolean".to_string(),
        Type::Primitive(Primitive::Nil) => "nil".to_string(),
        Type::Table(_) => "table".to_string(),
        Type::Function(f) => {
            let params = f
                .params
                .iter()
                .map(|p| p.name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            format!("function({params})")
        }
        Type::Union(types) => types.iter().map(format_type).collect::<Vec<_>>().join(" | "),
        Type::Literal(base, _) => format_type(base),
        Type::Ref(name) => name.clone(),
        Type::Context(name) => format!("context.{name}"),
        Type::Global(name) => name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_flattens_and_dedupes() {
        let t = Type::union(vec![
            Type::Primitive(Primitive::String),
            Type::Union(vec![Type::Primitive(Primitive::String), Type::Primitive(Primitive::Nil)]),
        ]);
        match t {
            Type::Union(members) => assert_eq!(members.len(), 2),
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn union_of_one_collapses() {
        let t = Type::union(vec![Type::Primitive(Primitive::Boolean)]);
        assert!(matches!(t, Type::Primitive(Primitive::Boolean)));
    }

    #[test]
    fn union_of_none_is_unknown() {
        let t = Type::union(vec![]);
        assert!(matches!(t, Type::Unknown));
    }

    #[test]
    fn widen_drops_literal() {
        let lit = Type::Literal(Box::new(Type::Primitive(Primitive::Integer)), LiteralValue::Bool(true));
        assert!(matches!(lit.widen(), Type::Primitive(Primitive::Integer)));
    }

    #[test]
    fn integer_assignable_to_number() {
        assert!(Type::Primitive(Primitive::Number).is_assignable_from(&Type::Primitive(Primitive::Integer)));
    }

    #[test]
    fn unknown_is_bidirectionally_assignable() {
        assert!(Type::Unknown.is_assignable_from(&Type::Primitive(Primitive::String)));
        assert!(Type::Primitive(Primitive::String).is_assignable_from(&Type::Unknown));
    }

    #[test]
    fn table_field_falls_back_to_metatable_base() {
        let mut base = TableType::default();
        base.fields.insert("greet".to_string(), Type::Primitive(Primitive::String));
        let mut t = TableType::default();
        t.bases.push(Type::Table(base));
        let ty = Type::Table(t);
        assert!(ty.field("greet").is_some());
        assert!(ty.field("missing").is_none());
    }

    #[test]
    fn format_type_renders_union() {
        let t = Type::union(vec![Type::Primitive(Primitive::String), Type::Primitive(Primitive::Nil)]);
        assert_eq!(format_type(&t), "string | nil");
    }
}
