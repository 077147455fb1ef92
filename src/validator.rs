use crate::compiler::CompileOptions;
use crate::draft::Draft;
use crate::error::SchemaError;
use crate::form::{Dependency, Form, Keyword, Node, NodeId, Pattern};
use crate::validate::ErrorIter;
use crate::value::Value;

/// A compiled schema.
///
/// Immutable once built: share it across threads freely and validate any
/// number of instances against it.
///
/// ```
/// use jsv::Validator;
/// use serde_json::json;
///
/// let validator = Validator::compile(&json!({"type": "array", "maxItems": 2}), None).unwrap();
///
/// assert!(validator.is_valid(&jsv::to_value(&[1, 2]).unwrap()));
/// assert!(!validator.is_valid(&jsv::to_value(&[1, 2, 3]).unwrap()));
/// ```
#[derive(Debug)]
pub struct Validator {
    nodes: Vec<Node>,
    root: NodeId,
    draft: Draft,
}

impl Validator {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId, draft: Draft) -> Validator {
        Validator { nodes, root, draft }
    }

    /// Compiles `schema`, detecting its draft unless one is given.
    pub fn compile(schema: &serde_json::Value, draft: Option<Draft>) -> Result<Validator, SchemaError> {
        let options = CompileOptions::new();
        match draft {
            Some(draft) => options.with_draft(draft).compile(schema),
            None => options.compile(schema),
        }
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.is_valid_at(self.root, instance)
    }

    /// All the ways `instance` fails the schema, computed as the iterator is
    /// consumed.
    pub fn validate<'a>(&'a self, instance: &'a Value) -> ErrorIter<'a> {
        ErrorIter::new(self, self.root, instance)
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn is_valid_at(&self, id: NodeId, instance: &Value) -> bool {
        match &self.node(id).form {
            Form::Bool(b) => *b,
            Form::Keywords(keywords) => keywords
                .iter()
                .all(|keyword| self.keyword_is_valid(keyword, instance)),
        }
    }

    pub(crate) fn keyword_is_valid(&self, keyword: &Keyword, instance: &Value) -> bool {
        match keyword {
            Keyword::Ref(target) => self.is_valid_at(*target, instance),

            Keyword::Type(types) => types.matches(instance),
            Keyword::Enum(options) => options.contains(instance),
            Keyword::Const(expected) => expected == instance,

            Keyword::Minimum(limit) => instance.as_number().map_or(true, |n| n >= limit),
            Keyword::Maximum(limit) => instance.as_number().map_or(true, |n| n <= limit),
            Keyword::ExclusiveMinimum(limit) => instance.as_number().map_or(true, |n| n > limit),
            Keyword::ExclusiveMaximum(limit) => instance.as_number().map_or(true, |n| n < limit),
            Keyword::MultipleOf(divisor) => instance
                .as_number()
                .map_or(true, |n| n.is_multiple_of(divisor)),

            Keyword::MinLength(min) => instance.as_str().map_or(true, |s| char_count(s) >= *min),
            Keyword::MaxLength(max) => instance.as_str().map_or(true, |s| char_count(s) <= *max),
            Keyword::Pattern(pattern) => instance.as_str().map_or(true, |s| pattern.is_match(s)),
            Keyword::Format(format) => instance.as_str().map_or(true, |s| (format.check)(s)),

            Keyword::Items(target) => instance.as_array().map_or(true, |items| {
                items.iter().all(|item| self.is_valid_at(*target, item))
            }),
            Keyword::TupleItems(targets) => instance.as_array().map_or(true, |items| {
                items
                    .iter()
                    .zip(targets)
                    .all(|(item, target)| self.is_valid_at(*target, item))
            }),
            Keyword::AdditionalItems { skip, schema } => instance.as_array().map_or(true, |items| {
                items.iter().skip(*skip).all(|item| self.is_valid_at(*schema, item))
            }),
            Keyword::MinItems(min) => instance.as_array().map_or(true, |items| items.len() as u64 >= *min),
            Keyword::MaxItems(max) => instance.as_array().map_or(true, |items| (items.len() as u64) <= *max),
            Keyword::UniqueItems => instance.as_array().map_or(true, |items| all_unique(items)),
            Keyword::Contains(target) => instance.as_array().map_or(true, |items| {
                items.iter().any(|item| self.is_valid_at(*target, item))
            }),

            Keyword::Properties(properties) => instance.as_object().map_or(true, |object| {
                properties.iter().all(|(name, target)| {
                    object
                        .get(name)
                        .map_or(true, |value| self.is_valid_at(*target, value))
                })
            }),
            Keyword::PatternProperties(patterns) => instance.as_object().map_or(true, |object| {
                object.iter().all(|(key, value)| {
                    patterns
                        .iter()
                        .filter(|(pattern, _)| pattern.is_match(key))
                        .all(|(_, target)| self.is_valid_at(*target, value))
                })
            }),
            Keyword::AdditionalProperties {
                known,
                patterns,
                schema,
            } => instance.as_object().map_or(true, |object| {
                object
                    .iter()
                    .filter(|(key, _)| is_additional(key, known, patterns))
                    .all(|(_, value)| self.is_valid_at(*schema, value))
            }),
            Keyword::MinProperties(min) => instance
                .as_object()
                .map_or(true, |object| object.len() as u64 >= *min),
            Keyword::MaxProperties(max) => instance
                .as_object()
                .map_or(true, |object| (object.len() as u64) <= *max),
            Keyword::Required(names) => instance
                .as_object()
                .map_or(true, |object| names.iter().all(|name| object.contains_key(name))),
            Keyword::PropertyNames(target) => instance.as_object().map_or(true, |object| {
                object
                    .keys()
                    .all(|key| self.is_valid_at(*target, &Value::String(key.clone())))
            }),
            Keyword::Dependencies(dependencies) => instance.as_object().map_or(true, |object| {
                dependencies
                    .iter()
                    .filter(|(name, _)| object.contains_key(name))
                    .all(|(_, dependency)| match dependency {
                        Dependency::Properties(names) => {
                            names.iter().all(|name| object.contains_key(name))
                        }
                        Dependency::Schema(target) => self.is_valid_at(*target, instance),
                    })
            }),

            Keyword::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let branch = if self.is_valid_at(*condition, instance) {
                    then
                } else {
                    otherwise
                };
                branch.map_or(true, |target| self.is_valid_at(target, instance))
            }
            Keyword::AllOf(targets) => targets
                .iter()
                .all(|target| self.is_valid_at(*target, instance)),
            Keyword::AnyOf(targets) => targets
                .iter()
                .any(|target| self.is_valid_at(*target, instance)),
            Keyword::OneOf(targets) => {
                let mut matches = targets
                    .iter()
                    .filter(|target| self.is_valid_at(**target, instance));
                matches.next().is_some() && matches.next().is_none()
            }
            Keyword::Not(target) => !self.is_valid_at(*target, instance),
        }
    }
}

/// Length in Unicode scalar values.
pub(crate) fn char_count(s: &str) -> u64 {
    s.chars().count() as u64
}

pub(crate) fn all_unique(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(i, item)| !items[i + 1..].contains(item))
}

pub(crate) fn is_additional(key: &str, known: &[String], patterns: &[Pattern]) -> bool {
    !known.iter().any(|name| name == key) && !patterns.iter().any(|pattern| pattern.is_match(key))
}
