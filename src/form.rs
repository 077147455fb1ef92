use crate::value::{Number, Value};
use bitflags::bitflags;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Index of a compiled schema inside a validator's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

/// One compiled schema.
#[derive(Debug)]
pub(crate) struct Node {
    /// JSON Pointer tokens locating the schema inside its document.
    pub(crate) location: Vec<String>,
    pub(crate) form: Form,
}

#[derive(Debug)]
pub(crate) enum Form {
    Bool(bool),
    Keywords(Vec<Keyword>),
}

/// A single keyword application, with its argument compiled.
#[derive(Debug)]
pub(crate) enum Keyword {
    Ref(NodeId),
    Type(TypeSet),
    Enum(Vec<Value>),
    Const(Value),
    Minimum(Number),
    Maximum(Number),
    ExclusiveMinimum(Number),
    ExclusiveMaximum(Number),
    MultipleOf(Number),
    MinLength(u64),
    MaxLength(u64),
    Pattern(Pattern),
    Format(Format),
    Items(NodeId),
    TupleItems(Vec<NodeId>),
    AdditionalItems {
        skip: usize,
        schema: NodeId,
    },
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    Contains(NodeId),
    Properties(Vec<(String, NodeId)>),
    PatternProperties(Vec<(Pattern, NodeId)>),
    AdditionalProperties {
        known: Vec<String>,
        patterns: Vec<Pattern>,
        schema: NodeId,
    },
    MinProperties(u64),
    MaxProperties(u64),
    Required(Vec<String>),
    PropertyNames(NodeId),
    Dependencies(Vec<(String, Dependency)>),
    Conditional {
        condition: NodeId,
        then: Option<NodeId>,
        otherwise: Option<NodeId>,
    },
    AllOf(Vec<NodeId>),
    AnyOf(Vec<NodeId>),
    OneOf(Vec<NodeId>),
    Not(NodeId),
}

impl Keyword {
    /// The schema keyword reported in errors.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Keyword::Ref(_) => "$ref",
            Keyword::Type(_) => "type",
            Keyword::Enum(_) => "enum",
            Keyword::Const(_) => "const",
            Keyword::Minimum(_) => "minimum",
            Keyword::Maximum(_) => "maximum",
            Keyword::ExclusiveMinimum(_) => "exclusiveMinimum",
            Keyword::ExclusiveMaximum(_) => "exclusiveMaximum",
            Keyword::MultipleOf(_) => "multipleOf",
            Keyword::MinLength(_) => "minLength",
            Keyword::MaxLength(_) => "maxLength",
            Keyword::Pattern(_) => "pattern",
            Keyword::Format(_) => "format",
            Keyword::Items(_) | Keyword::TupleItems(_) => "items",
            Keyword::AdditionalItems { .. } => "additionalItems",
            Keyword::MinItems(_) => "minItems",
            Keyword::MaxItems(_) => "maxItems",
            Keyword::UniqueItems => "uniqueItems",
            Keyword::Contains(_) => "contains",
            Keyword::Properties(_) => "properties",
            Keyword::PatternProperties(_) => "patternProperties",
            Keyword::AdditionalProperties { .. } => "additionalProperties",
            Keyword::MinProperties(_) => "minProperties",
            Keyword::MaxProperties(_) => "maxProperties",
            Keyword::Required(_) => "required",
            Keyword::PropertyNames(_) => "propertyNames",
            Keyword::Dependencies(_) => "dependencies",
            Keyword::Conditional { .. } => "if",
            Keyword::AllOf(_) => "allOf",
            Keyword::AnyOf(_) => "anyOf",
            Keyword::OneOf(_) => "oneOf",
            Keyword::Not(_) => "not",
        }
    }
}

#[derive(Debug)]
pub(crate) enum Dependency {
    Properties(Vec<String>),
    Schema(NodeId),
}

bitflags! {
    /// The primitive types named by `type`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct Types: u8 {
        const NULL = 1;
        const BOOLEAN = 1 << 1;
        const INTEGER = 1 << 2;
        const NUMBER = 1 << 3;
        const STRING = 1 << 4;
        const ARRAY = 1 << 5;
        const OBJECT = 1 << 6;
    }
}

impl Types {
    /// Looks up a JSON Schema type name such as `"integer"`. Flag names
    /// (`"INTEGER"`) are not type names.
    pub(crate) fn from_type_name(name: &str) -> Option<Types> {
        TYPE_NAMES
            .iter()
            .find(|(_, type_name)| *type_name == name)
            .map(|(flag, _)| *flag)
    }

    fn names(self) -> impl Iterator<Item = &'static str> {
        TYPE_NAMES
            .iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
    }
}

static TYPE_NAMES: [(Types, &str); 7] = [
    (Types::NULL, "null"),
    (Types::BOOLEAN, "boolean"),
    (Types::INTEGER, "integer"),
    (Types::NUMBER, "number"),
    (Types::STRING, "string"),
    (Types::ARRAY, "array"),
    (Types::OBJECT, "object"),
];

/// A compiled `type` keyword.
#[derive(Debug)]
pub(crate) struct TypeSet {
    pub(crate) types: Types,
    /// Whether an integral float such as `1.0` counts as an integer.
    pub(crate) integer_valued_floats: bool,
}

impl TypeSet {
    pub(crate) fn matches(&self, instance: &Value) -> bool {
        let found = match instance {
            Value::Null => Types::NULL,
            Value::Bool(_) => Types::BOOLEAN,
            Value::Number(n)
                if n.is_integer() || (self.integer_valued_floats && n.has_integer_value()) =>
            {
                Types::INTEGER | Types::NUMBER
            }
            Value::Number(_) => Types::NUMBER,
            Value::String(_) => Types::STRING,
            Value::Array(_) => Types::ARRAY,
            Value::Object(_) => Types::OBJECT,
        };
        self.types.intersects(found)
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.types.names().map(|name| format!("{:?}", name)).collect();
        match names.len() {
            1 => f.write_str(&names[0]),
            _ => write!(f, "any of [{}]", names.join(", ")),
        }
    }
}

/// A regular expression together with the source it was compiled from.
#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    pub(crate) source: String,
    pub(crate) regex: Regex,
}

impl Pattern {
    /// Search semantics: the pattern may match anywhere in the string.
    pub(crate) fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

pub(crate) type FormatChecker = Arc<dyn Fn(&str) -> bool + Send + Sync>;

pub(crate) struct Format {
    pub(crate) name: String,
    pub(crate) check: FormatChecker,
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Format").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::TryFrom;

    fn value(json: serde_json::Value) -> Value {
        Value::try_from(&json).unwrap()
    }

    #[test]
    fn type_names() {
        assert_eq!(None, Types::from_type_name("Boolean"));
        assert_eq!(None, Types::from_type_name("INTEGER"));
        assert_eq!(Some(Types::BOOLEAN), Types::from_type_name("boolean"));
        assert_eq!(Some(Types::INTEGER), Types::from_type_name("integer"));
        assert_eq!(Some(Types::OBJECT), Types::from_type_name("object"));
    }

    #[test]
    fn integers_by_draft() {
        let draft4 = TypeSet {
            types: Types::INTEGER,
            integer_valued_floats: false,
        };
        let draft6 = TypeSet {
            types: Types::INTEGER,
            integer_valued_floats: true,
        };

        assert!(draft4.matches(&value(json!(1))));
        assert!(!draft4.matches(&value(json!(1.0))));
        assert!(draft6.matches(&value(json!(1.0))));
        assert!(!draft6.matches(&value(json!(1.5))));
        assert!(!draft6.matches(&value(json!("1"))));
    }

    #[test]
    fn number_accepts_integers() {
        let types = TypeSet {
            types: Types::NUMBER | Types::NULL,
            integer_valued_floats: true,
        };
        assert!(types.matches(&value(json!(7))));
        assert!(types.matches(&value(json!(null))));
        assert!(!types.matches(&value(json!(false))));
        assert_eq!(r#"any of ["null", "number"]"#, types.to_string());
    }
}
