use crate::error::SchemaError;
use crate::format::{self, FormatCheck};
use crate::value::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A supported JSON Schema dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub enum Draft {
    Draft4,
    Draft6,
    Draft7,
}

impl Default for Draft {
    fn default() -> Self {
        Draft::Draft7
    }
}

/// The keywords a draft understands. Each has a compile routine in the
/// compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeywordKind {
    Ref,
    Type,
    Enum,
    Const,
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MultipleOf,
    MinLength,
    MaxLength,
    Pattern,
    Format,
    Items,
    AdditionalItems,
    MinItems,
    MaxItems,
    UniqueItems,
    Contains,
    Properties,
    PatternProperties,
    AdditionalProperties,
    MinProperties,
    MaxProperties,
    Required,
    PropertyNames,
    Dependencies,
    If,
    Then,
    Else,
    AllOf,
    AnyOf,
    OneOf,
    Not,
}

/// The JSON shape a keyword argument must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Shape {
    Any,
    Boolean,
    Number,
    NonNegativeInteger,
    String,
    Array,
    Object,
    Schema,
    SchemaArray,
    SchemaOrSchemaArray,
    StringArray,
    TypeNames,
}

impl Shape {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            Shape::Any => "any value",
            Shape::Boolean => "a boolean",
            Shape::Number => "a number",
            Shape::NonNegativeInteger => "a non-negative integer",
            Shape::String => "a string",
            Shape::Array => "an array",
            Shape::Object => "an object",
            Shape::Schema => "a schema",
            Shape::SchemaArray => "a non-empty array of schemas",
            Shape::SchemaOrSchemaArray => "a schema or an array of schemas",
            Shape::StringArray => "an array of strings",
            Shape::TypeNames => "a type name or an array of type names",
        }
    }
}

/// Everything draft-specific the compiler needs.
pub(crate) struct Vocabulary {
    keywords: HashMap<&'static str, (KeywordKind, Shape)>,
    formats: HashMap<&'static str, FormatCheck>,
    /// `id` in draft4, `$id` afterwards.
    pub(crate) id_keyword: &'static str,
    /// Draft4 `exclusiveMinimum`/`exclusiveMaximum` are booleans modifying
    /// `minimum`/`maximum`.
    pub(crate) boolean_exclusive_bounds: bool,
    /// Draft6 onwards, `1.0` is an integer.
    pub(crate) integer_valued_floats: bool,
}

impl Vocabulary {
    pub(crate) fn keyword(&self, name: &str) -> Option<(KeywordKind, Shape)> {
        self.keywords.get(name).copied()
    }

    pub(crate) fn format(&self, name: &str) -> Option<FormatCheck> {
        self.formats.get(name).copied()
    }
}

const DRAFT4_KEYWORDS: &[(&str, KeywordKind, Shape)] = &[
    ("$ref", KeywordKind::Ref, Shape::String),
    ("type", KeywordKind::Type, Shape::TypeNames),
    ("enum", KeywordKind::Enum, Shape::Array),
    ("minimum", KeywordKind::Minimum, Shape::Number),
    ("maximum", KeywordKind::Maximum, Shape::Number),
    ("exclusiveMinimum", KeywordKind::ExclusiveMinimum, Shape::Boolean),
    ("exclusiveMaximum", KeywordKind::ExclusiveMaximum, Shape::Boolean),
    ("multipleOf", KeywordKind::MultipleOf, Shape::Number),
    ("minLength", KeywordKind::MinLength, Shape::NonNegativeInteger),
    ("maxLength", KeywordKind::MaxLength, Shape::NonNegativeInteger),
    ("pattern", KeywordKind::Pattern, Shape::String),
    ("format", KeywordKind::Format, Shape::String),
    ("items", KeywordKind::Items, Shape::SchemaOrSchemaArray),
    ("additionalItems", KeywordKind::AdditionalItems, Shape::Schema),
    ("minItems", KeywordKind::MinItems, Shape::NonNegativeInteger),
    ("maxItems", KeywordKind::MaxItems, Shape::NonNegativeInteger),
    ("uniqueItems", KeywordKind::UniqueItems, Shape::Boolean),
    ("properties", KeywordKind::Properties, Shape::Object),
    ("patternProperties", KeywordKind::PatternProperties, Shape::Object),
    ("additionalProperties", KeywordKind::AdditionalProperties, Shape::Schema),
    ("minProperties", KeywordKind::MinProperties, Shape::NonNegativeInteger),
    ("maxProperties", KeywordKind::MaxProperties, Shape::NonNegativeInteger),
    ("required", KeywordKind::Required, Shape::StringArray),
    ("dependencies", KeywordKind::Dependencies, Shape::Object),
    ("allOf", KeywordKind::AllOf, Shape::SchemaArray),
    ("anyOf", KeywordKind::AnyOf, Shape::SchemaArray),
    ("oneOf", KeywordKind::OneOf, Shape::SchemaArray),
    ("not", KeywordKind::Not, Shape::Schema),
];

const DRAFT6_KEYWORDS: &[(&str, KeywordKind, Shape)] = &[
    ("exclusiveMinimum", KeywordKind::ExclusiveMinimum, Shape::Number),
    ("exclusiveMaximum", KeywordKind::ExclusiveMaximum, Shape::Number),
    ("const", KeywordKind::Const, Shape::Any),
    ("contains", KeywordKind::Contains, Shape::Schema),
    ("propertyNames", KeywordKind::PropertyNames, Shape::Schema),
];

const DRAFT7_KEYWORDS: &[(&str, KeywordKind, Shape)] = &[
    ("if", KeywordKind::If, Shape::Schema),
    ("then", KeywordKind::Then, Shape::Schema),
    ("else", KeywordKind::Else, Shape::Schema),
];

const DRAFT4_FORMATS: &[(&str, FormatCheck)] = &[
    ("date-time", format::date_time),
    ("email", format::email),
    ("hostname", format::hostname),
    ("ipv4", format::ipv4),
    ("ipv6", format::ipv6),
    ("uri", format::uri),
];

const DRAFT6_FORMATS: &[(&str, FormatCheck)] = &[
    ("uri-reference", format::uri_reference),
    ("uri-template", format::uri_template),
    ("json-pointer", format::json_pointer),
];

const DRAFT7_FORMATS: &[(&str, FormatCheck)] = &[
    ("date", format::date),
    ("time", format::time),
    ("iri", format::iri),
    ("iri-reference", format::iri_reference),
    ("idn-email", format::idn_email),
    ("idn-hostname", format::idn_hostname),
    ("relative-json-pointer", format::relative_json_pointer),
    ("regex", format::regex),
];

fn vocabulary(draft: Draft) -> Vocabulary {
    let layers: &[(&[(&str, KeywordKind, Shape)], &[(&str, FormatCheck)])] = match draft {
        Draft::Draft4 => &[(DRAFT4_KEYWORDS, DRAFT4_FORMATS)],
        Draft::Draft6 => &[
            (DRAFT4_KEYWORDS, DRAFT4_FORMATS),
            (DRAFT6_KEYWORDS, DRAFT6_FORMATS),
        ],
        Draft::Draft7 => &[
            (DRAFT4_KEYWORDS, DRAFT4_FORMATS),
            (DRAFT6_KEYWORDS, DRAFT6_FORMATS),
            (DRAFT7_KEYWORDS, DRAFT7_FORMATS),
        ],
    };

    let mut keywords = HashMap::new();
    let mut formats = HashMap::new();
    for (layer_keywords, layer_formats) in layers {
        // Later drafts override earlier shapes, e.g. numeric exclusive bounds.
        keywords.extend(
            layer_keywords
                .iter()
                .map(|&(name, kind, shape)| (name, (kind, shape))),
        );
        formats.extend(layer_formats.iter().copied());
    }

    Vocabulary {
        keywords,
        formats,
        id_keyword: if draft == Draft::Draft4 { "id" } else { "$id" },
        boolean_exclusive_bounds: draft == Draft::Draft4,
        integer_valued_floats: draft != Draft::Draft4,
    }
}

static DRAFT4: Lazy<Vocabulary> = Lazy::new(|| vocabulary(Draft::Draft4));
static DRAFT6: Lazy<Vocabulary> = Lazy::new(|| vocabulary(Draft::Draft6));
static DRAFT7: Lazy<Vocabulary> = Lazy::new(|| vocabulary(Draft::Draft7));

impl Draft {
    pub(crate) fn vocabulary(self) -> &'static Vocabulary {
        match self {
            Draft::Draft4 => &DRAFT4,
            Draft::Draft6 => &DRAFT6,
            Draft::Draft7 => &DRAFT7,
        }
    }

    /// The canonical meta-schema URI, as written in `$schema`.
    pub fn meta_schema_uri(self) -> &'static str {
        match self {
            Draft::Draft4 => "http://json-schema.org/draft-04/schema#",
            Draft::Draft6 => "http://json-schema.org/draft-06/schema#",
            Draft::Draft7 => "http://json-schema.org/draft-07/schema#",
        }
    }

    /// Recognizes a `$schema` URI. The scheme may be `http` or `https` and
    /// the empty fragment is optional.
    ///
    /// ```
    /// use jsv::Draft;
    ///
    /// assert_eq!(Some(Draft::Draft4), Draft::from_uri("http://json-schema.org/draft-04/schema#"));
    /// assert_eq!(Some(Draft::Draft6), Draft::from_uri("https://json-schema.org/draft-06/schema"));
    /// assert_eq!(None, Draft::from_uri("https://json-schema.org/draft/2020-12/schema"));
    /// ```
    pub fn from_uri(uri: &str) -> Option<Draft> {
        let uri = uri.trim_end_matches('#');
        let rest = uri
            .strip_prefix("http://")
            .or_else(|| uri.strip_prefix("https://"))?;

        match rest {
            "json-schema.org/draft-04/schema" => Some(Draft::Draft4),
            "json-schema.org/draft-06/schema" => Some(Draft::Draft6),
            "json-schema.org/draft-07/schema" => Some(Draft::Draft7),
            _ => None,
        }
    }

    /// Infers the draft of a root schema.
    ///
    /// `$schema` wins when present. Without it, a root `id` (and no `$id`)
    /// marks a draft4 document; anything else is draft7.
    pub fn detect(schema: &Value) -> Result<Draft, SchemaError> {
        if let Some(draft) = Draft::declared(schema)? {
            return Ok(draft);
        }

        match schema.as_object() {
            Some(object)
                if object.get("id").map_or(false, |id| id.as_str().is_some())
                    && !object.contains_key("$id") =>
            {
                Ok(Draft::Draft4)
            }
            _ => Ok(Draft::default()),
        }
    }

    /// The draft named by a schema's `$schema`, if it has one.
    pub(crate) fn declared(schema: &Value) -> Result<Option<Draft>, SchemaError> {
        match schema.as_object().and_then(|object| object.get("$schema")) {
            None => Ok(None),
            Some(Value::String(uri)) => Draft::from_uri(uri)
                .map(Some)
                .ok_or_else(|| SchemaError::UnsupportedDraft(uri.clone())),
            Some(other) => Err(SchemaError::InvalidKeyword {
                keyword: "$schema".to_owned(),
                location: String::new(),
                reason: format!("expected a string, got {}", other.type_name()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::TryFrom;

    fn detect(json: serde_json::Value) -> Result<Draft, SchemaError> {
        Draft::detect(&Value::try_from(&json).unwrap())
    }

    #[test]
    fn detection() {
        assert_eq!(Ok(Draft::Draft7), detect(json!(true)));
        assert_eq!(Ok(Draft::Draft7), detect(json!({"type": "string"})));
        assert_eq!(
            Ok(Draft::Draft4),
            detect(json!({"$schema": "http://json-schema.org/draft-04/schema#"}))
        );
        assert_eq!(
            Ok(Draft::Draft6),
            detect(json!({"$schema": "http://json-schema.org/draft-06/schema"}))
        );
        assert_eq!(Ok(Draft::Draft4), detect(json!({"id": "http://example.com/s"})));
        assert_eq!(
            Ok(Draft::Draft7),
            detect(json!({"id": "a", "$id": "http://example.com/s"}))
        );
        assert_eq!(
            Err(SchemaError::UnsupportedDraft(
                "https://json-schema.org/draft/2019-09/schema".to_owned()
            )),
            detect(json!({"$schema": "https://json-schema.org/draft/2019-09/schema"}))
        );
        assert!(matches!(
            detect(json!({"$schema": 7})),
            Err(SchemaError::InvalidKeyword { .. })
        ));
    }

    #[test]
    fn vocabularies() {
        let draft4 = Draft::Draft4.vocabulary();
        assert_eq!(None, draft4.keyword("const"));
        assert_eq!(
            Some((KeywordKind::ExclusiveMinimum, Shape::Boolean)),
            draft4.keyword("exclusiveMinimum")
        );
        assert!(draft4.format("date").is_none());
        assert_eq!("id", draft4.id_keyword);

        let draft6 = Draft::Draft6.vocabulary();
        assert_eq!(
            Some((KeywordKind::ExclusiveMinimum, Shape::Number)),
            draft6.keyword("exclusiveMinimum")
        );
        assert_eq!(None, draft6.keyword("if"));
        assert!(draft6.format("json-pointer").is_some());

        let draft7 = Draft::Draft7.vocabulary();
        assert_eq!(Some((KeywordKind::If, Shape::Schema)), draft7.keyword("if"));
        assert!(draft7.format("date").is_some());
        assert!(draft7.format("email").is_some());
        assert_eq!("$id", draft7.id_keyword);
        assert!(draft7.integer_valued_floats);
    }
}
