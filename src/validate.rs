use crate::form::{Dependency, Form, Keyword, Node, NodeId};
use crate::resolver::to_pointer;
use crate::validator::{is_additional, Validator};
use crate::value::Value;
use std::rc::Rc;
use thiserror::Error;

/// One way an instance fails a schema.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Reference tokens of the failing part of the instance.
    pub instance_path: Vec<String>,
    /// Reference tokens of the failing keyword, from the root of the document
    /// defining it.
    pub schema_path: Vec<String>,
    pub keyword: &'static str,
    pub message: String,
    /// Errors of the individual branches, for `anyOf` and `oneOf`.
    pub context: Vec<ValidationError>,
}

impl ValidationError {
    /// `instance_path` as a JSON Pointer.
    pub fn instance_pointer(&self) -> String {
        to_pointer(&self.instance_path)
    }

    /// `schema_path` as a JSON Pointer.
    pub fn schema_pointer(&self) -> String {
        to_pointer(&self.schema_path)
    }
}

/// Lazily produced validation errors.
///
/// Work left to do lives on an explicit stack, so each `next` call only
/// evaluates as much of the schema as it takes to find one more error.
///
/// ```
/// use jsv::Validator;
/// use serde_json::json;
///
/// let validator = Validator::compile(&json!({"items": {"type": "string"}}), None).unwrap();
/// let instance = jsv::to_value(&json!(["a", 1, 2])).unwrap();
///
/// let first = validator.validate(&instance).next().unwrap();
/// assert_eq!("/1", first.instance_pointer());
/// assert_eq!("/items/type", first.schema_pointer());
/// ```
pub struct ErrorIter<'a> {
    validator: &'a Validator,
    stack: Vec<Frame<'a>>,
    /// Errors found but not yet yielded, last one first.
    queued: Vec<ValidationError>,
}

struct Frame<'a> {
    node: NodeId,
    instance: &'a Value,
    path: Path<'a>,
    next: usize,
}

/// A persistent instance path; frames share their common prefix.
#[derive(Clone, Default)]
struct Path<'a>(Option<Rc<Segment<'a>>>);

struct Segment<'a> {
    parent: Path<'a>,
    chunk: Chunk<'a>,
}

enum Chunk<'a> {
    Key(&'a str),
    Index(usize),
}

impl<'a> Path<'a> {
    fn push(&self, chunk: Chunk<'a>) -> Path<'a> {
        Path(Some(Rc::new(Segment {
            parent: self.clone(),
            chunk,
        })))
    }

    fn key(&self, key: &'a str) -> Path<'a> {
        self.push(Chunk::Key(key))
    }

    fn index(&self, index: usize) -> Path<'a> {
        self.push(Chunk::Index(index))
    }

    fn to_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = &self.0;
        while let Some(segment) = current {
            tokens.push(match segment.chunk {
                Chunk::Key(key) => key.to_owned(),
                Chunk::Index(index) => index.to_string(),
            });
            current = &segment.parent.0;
        }
        tokens.reverse();
        tokens
    }
}

impl<'a> ErrorIter<'a> {
    pub(crate) fn new(validator: &'a Validator, node: NodeId, instance: &'a Value) -> ErrorIter<'a> {
        ErrorIter::at(validator, node, instance, Path::default())
    }

    fn at(validator: &'a Validator, node: NodeId, instance: &'a Value, path: Path<'a>) -> ErrorIter<'a> {
        ErrorIter {
            validator,
            stack: vec![Frame {
                node,
                instance,
                path,
                next: 0,
            }],
            queued: Vec::new(),
        }
    }

    fn push(&mut self, node: NodeId, instance: &'a Value, path: Path<'a>) {
        self.stack.push(Frame {
            node,
            instance,
            path,
            next: 0,
        });
    }

    fn emit(&mut self, mut errors: Vec<ValidationError>) {
        errors.reverse();
        self.queued.extend(errors);
    }

    /// Applies one keyword, queueing errors it finds directly and pushing
    /// frames for the subschemas it delegates to.
    fn step(&mut self, node: &'a Node, keyword: &'a Keyword, instance: &'a Value, path: Path<'a>) {
        let validator = self.validator;

        match keyword {
            Keyword::Ref(target) => self.push(*target, instance, path),

            Keyword::Items(target) => {
                if let Value::Array(items) = instance {
                    for (i, item) in items.iter().enumerate().rev() {
                        self.push(*target, item, path.index(i));
                    }
                }
            }
            Keyword::TupleItems(targets) => {
                if let Value::Array(items) = instance {
                    for (i, (item, target)) in items.iter().zip(targets).enumerate().rev() {
                        self.push(*target, item, path.index(i));
                    }
                }
            }
            Keyword::AdditionalItems { skip, schema } => {
                if let Value::Array(items) = instance {
                    for (i, item) in items.iter().enumerate().skip(*skip).rev() {
                        self.push(*schema, item, path.index(i));
                    }
                }
            }

            Keyword::Properties(properties) => {
                if let Value::Object(object) = instance {
                    for (name, target) in properties.iter().rev() {
                        if let Some((key, value)) = object.get_key_value(name.as_str()) {
                            self.push(*target, value, path.key(key));
                        }
                    }
                }
            }
            Keyword::PatternProperties(patterns) => {
                if let Value::Object(object) = instance {
                    for (key, value) in object.iter().rev() {
                        for (pattern, target) in patterns.iter().rev() {
                            if pattern.is_match(key) {
                                self.push(*target, value, path.key(key));
                            }
                        }
                    }
                }
            }
            Keyword::AdditionalProperties {
                known,
                patterns,
                schema,
            } => {
                if let Value::Object(object) = instance {
                    let extra: Vec<(&'a String, &'a Value)> = object
                        .iter()
                        .filter(|(key, _)| is_additional(key, known, patterns))
                        .collect();

                    if let Form::Bool(false) = validator.node(*schema).form {
                        if !extra.is_empty() {
                            let names: Vec<String> =
                                extra.iter().map(|(key, _)| format!("{:?}", key)).collect();
                            let message = format!(
                                "Additional properties are not allowed ({} {} unexpected)",
                                names.join(", "),
                                if names.len() == 1 { "was" } else { "were" }
                            );
                            self.emit(vec![error(node, keyword, &path, message)]);
                        }
                    } else {
                        for (key, value) in extra.into_iter().rev() {
                            self.push(*schema, value, path.key(key));
                        }
                    }
                }
            }
            Keyword::Required(names) => {
                if let Value::Object(object) = instance {
                    let errors = names
                        .iter()
                        .filter(|name| !object.contains_key(name.as_str()))
                        .map(|name| {
                            error(node, keyword, &path, format!("{:?} is a required property", name))
                        })
                        .collect();
                    self.emit(errors);
                }
            }
            Keyword::PropertyNames(target) => {
                if let Value::Object(object) = instance {
                    let errors = object
                        .keys()
                        .filter(|key| !validator.is_valid_at(*target, &Value::String((*key).clone())))
                        .map(|key| {
                            error(node, keyword, &path, format!("{:?} is not a valid property name", key))
                        })
                        .collect();
                    self.emit(errors);
                }
            }
            Keyword::Dependencies(dependencies) => {
                if let Value::Object(object) = instance {
                    let mut errors = Vec::new();
                    for (name, dependency) in dependencies.iter().rev() {
                        if !object.contains_key(name.as_str()) {
                            continue;
                        }
                        match dependency {
                            Dependency::Properties(required) => {
                                errors.extend(
                                    required
                                        .iter()
                                        .rev()
                                        .filter(|other| !object.contains_key(other.as_str()))
                                        .map(|other| {
                                            let message = format!("{:?} is a dependency of {:?}", other, name);
                                            error(node, keyword, &path, message)
                                        }),
                                );
                            }
                            Dependency::Schema(target) => self.push(*target, instance, path.clone()),
                        }
                    }
                    // `errors` was built back to front.
                    self.queued.extend(errors);
                }
            }

            Keyword::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let branch = if validator.is_valid_at(*condition, instance) {
                    then
                } else {
                    otherwise
                };
                if let Some(target) = branch {
                    self.push(*target, instance, path);
                }
            }
            Keyword::AllOf(targets) => {
                for target in targets.iter().rev() {
                    self.push(*target, instance, path.clone());
                }
            }
            Keyword::AnyOf(targets) => {
                if !targets.iter().any(|target| validator.is_valid_at(*target, instance)) {
                    let message = format!("{} is not valid under any of the given schemas", instance);
                    let mut error = error(node, keyword, &path, message);
                    error.context = branch_errors(validator, targets, instance, &path);
                    self.emit(vec![error]);
                }
            }
            Keyword::OneOf(targets) => {
                let matches = targets
                    .iter()
                    .filter(|target| validator.is_valid_at(**target, instance))
                    .take(2)
                    .count();

                if matches == 0 {
                    let message = format!("{} is not valid under any of the given schemas", instance);
                    let mut error = error(node, keyword, &path, message);
                    error.context = branch_errors(validator, targets, instance, &path);
                    self.emit(vec![error]);
                } else if matches > 1 {
                    let message = format!("{} is valid under more than one of the given schemas", instance);
                    self.emit(vec![error(node, keyword, &path, message)]);
                }
            }

            // The rest only decide about the instance itself.
            _ => {
                if !validator.keyword_is_valid(keyword, instance) {
                    let message = describe(keyword, instance);
                    self.emit(vec![error(node, keyword, &path, message)]);
                }
            }
        }
    }
}

impl<'a> Iterator for ErrorIter<'a> {
    type Item = ValidationError;

    fn next(&mut self) -> Option<ValidationError> {
        let validator = self.validator;

        loop {
            if let Some(error) = self.queued.pop() {
                return Some(error);
            }

            let frame = self.stack.last_mut()?;
            let node = validator.node(frame.node);
            match &node.form {
                Form::Bool(true) => {
                    self.stack.pop();
                }
                Form::Bool(false) => {
                    let frame = self.stack.pop()?;
                    return Some(ValidationError {
                        instance_path: frame.path.to_tokens(),
                        schema_path: node.location.clone(),
                        keyword: "false",
                        message: format!("False schema does not allow {}", frame.instance),
                        context: Vec::new(),
                    });
                }
                Form::Keywords(keywords) => match keywords.get(frame.next) {
                    Some(keyword) => {
                        frame.next += 1;
                        let instance = frame.instance;
                        let path = frame.path.clone();
                        self.step(node, keyword, instance, path);
                    }
                    None => {
                        self.stack.pop();
                    }
                },
            }
        }
    }
}

fn branch_errors<'a>(
    validator: &'a Validator,
    targets: &[NodeId],
    instance: &'a Value,
    path: &Path<'a>,
) -> Vec<ValidationError> {
    targets
        .iter()
        .flat_map(|target| ErrorIter::at(validator, *target, instance, path.clone()))
        .collect()
}

fn error(node: &Node, keyword: &Keyword, path: &Path<'_>, message: String) -> ValidationError {
    let mut schema_path = node.location.clone();
    schema_path.push(keyword.name().to_owned());

    ValidationError {
        instance_path: path.to_tokens(),
        schema_path,
        keyword: keyword.name(),
        message,
        context: Vec::new(),
    }
}

fn describe(keyword: &Keyword, instance: &Value) -> String {
    match keyword {
        Keyword::Type(types) => format!("{} is not of type {}", instance, types),
        Keyword::Enum(options) => {
            let options: Vec<String> = options.iter().map(Value::to_string).collect();
            format!("{} is not one of [{}]", instance, options.join(", "))
        }
        Keyword::Const(expected) => format!("{} was expected", expected),
        Keyword::Minimum(limit) => format!("{} is less than the minimum of {}", instance, limit),
        Keyword::Maximum(limit) => format!("{} is greater than the maximum of {}", instance, limit),
        Keyword::ExclusiveMinimum(limit) => format!(
            "{} is less than or equal to the minimum of {}",
            instance, limit
        ),
        Keyword::ExclusiveMaximum(limit) => format!(
            "{} is greater than or equal to the maximum of {}",
            instance, limit
        ),
        Keyword::MultipleOf(divisor) => format!("{} is not a multiple of {}", instance, divisor),
        Keyword::MinLength(min) => format!("{} is shorter than {} characters", instance, min),
        Keyword::MaxLength(max) => format!("{} is longer than {} characters", instance, max),
        Keyword::Pattern(pattern) => format!("{} does not match {:?}", instance, pattern.source),
        Keyword::Format(format) => format!("{} is not a {:?}", instance, format.name),
        Keyword::MinItems(min) => format!("{} has fewer than {} items", instance, min),
        Keyword::MaxItems(max) => format!("{} has more than {} items", instance, max),
        Keyword::UniqueItems => format!("{} has non-unique elements", instance),
        Keyword::Contains(_) => format!("None of {} are valid under the given schema", instance),
        Keyword::MinProperties(min) => format!("{} has fewer than {} properties", instance, min),
        Keyword::MaxProperties(max) => format!("{} has more than {} properties", instance, max),
        Keyword::Not(_) => format!("{} is valid under the schema it must not match", instance),
        other => format!("{} is not valid under {:?}", instance, other.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Validator;
    use serde_json::json;
    use std::convert::TryFrom;

    fn check(schema: serde_json::Value, instance: serde_json::Value) -> Vec<ValidationError> {
        let validator = Validator::compile(&schema, None).unwrap();
        let instance = Value::try_from(&instance).unwrap();
        let errors: Vec<_> = validator.validate(&instance).collect();
        assert_eq!(errors.is_empty(), validator.is_valid(&instance));
        errors
    }

    fn paths(errors: &[ValidationError]) -> Vec<(String, String)> {
        errors
            .iter()
            .map(|error| (error.instance_pointer(), error.schema_pointer()))
            .collect()
    }

    #[test]
    fn valid_instances_have_no_errors() {
        assert!(check(json!({"type": "string"}), json!("a")).is_empty());
        assert!(check(json!(true), json!([1, 2])).is_empty());
    }

    #[test]
    fn paths_and_keywords() {
        let errors = check(
            json!({
                "properties": {
                    "name": {"type": "string"},
                    "tags": {"items": {"maxLength": 2}}
                },
                "required": ["id", "name"]
            }),
            json!({"name": 1, "tags": ["ok", "too long"]}),
        );

        assert_eq!(
            vec![
                ("/name".to_owned(), "/properties/name/type".to_owned()),
                ("/tags/1".to_owned(), "/properties/tags/items/maxLength".to_owned()),
                ("".to_owned(), "/required".to_owned()),
            ],
            paths(&errors)
        );
        assert_eq!("1 is not of type \"string\"", errors[0].message);
        assert_eq!("\"id\" is a required property", errors[2].message);
        assert_eq!("required", errors[2].keyword);
    }

    #[test]
    fn reference_paths_use_the_target_location() {
        let errors = check(
            json!({
                "definitions": {"positive": {"exclusiveMinimum": 0}},
                "items": {"$ref": "#/definitions/positive"}
            }),
            json!([1, 0]),
        );

        assert_eq!(
            vec![("/1".to_owned(), "/definitions/positive/exclusiveMinimum".to_owned())],
            paths(&errors)
        );
    }

    #[test]
    fn false_schemas() {
        let errors = check(json!({"properties": {"a": false}}), json!({"a": 1}));
        assert_eq!(1, errors.len());
        assert_eq!("false", errors[0].keyword);
        assert_eq!("/a", errors[0].instance_pointer());
        assert_eq!("/properties/a", errors[0].schema_pointer());
    }

    #[test]
    fn additional_properties() {
        let errors = check(
            json!({"properties": {"a": {}}, "patternProperties": {"^x": {}}, "additionalProperties": false}),
            json!({"a": 1, "xa": 2, "b": 3, "c": 4}),
        );
        assert_eq!(1, errors.len());
        assert_eq!(
            "Additional properties are not allowed (\"b\", \"c\" were unexpected)",
            errors[0].message
        );

        let errors = check(
            json!({"additionalProperties": {"type": "integer"}}),
            json!({"a": 1, "b": "x", "c": "y"}),
        );
        assert_eq!(
            vec!["/b".to_owned(), "/c".to_owned()],
            errors.iter().map(ValidationError::instance_pointer).collect::<Vec<_>>()
        );
    }

    #[test]
    fn combinators() {
        let errors = check(
            json!({"anyOf": [{"type": "string"}, {"minimum": 5}]}),
            json!(3),
        );
        assert_eq!(1, errors.len());
        assert_eq!("anyOf", errors[0].keyword);
        assert_eq!(2, errors[0].context.len());
        assert_eq!("/anyOf/1/minimum", errors[0].context[1].schema_pointer());

        let errors = check(json!({"oneOf": [{"type": "integer"}, {"minimum": 0}]}), json!(3));
        assert_eq!(1, errors.len());
        assert!(errors[0].context.is_empty());
        assert_eq!("3 is valid under more than one of the given schemas", errors[0].message);

        let errors = check(
            json!({"allOf": [{"type": "string"}, {"maximum": 2}]}),
            json!(3),
        );
        assert_eq!(
            vec!["/allOf/0/type".to_owned(), "/allOf/1/maximum".to_owned()],
            errors.iter().map(ValidationError::schema_pointer).collect::<Vec<_>>()
        );

        let errors = check(json!({"not": {"type": "integer"}}), json!(3));
        assert_eq!(vec![("".to_owned(), "/not".to_owned())], paths(&errors));
    }

    #[test]
    fn conditionals() {
        let schema = json!({"if": {"type": "string"}, "then": {"minLength": 2}, "else": {"minimum": 0}});
        assert_eq!(
            vec![("".to_owned(), "/then/minLength".to_owned())],
            paths(&check(schema.clone(), json!("a")))
        );
        assert_eq!(
            vec![("".to_owned(), "/else/minimum".to_owned())],
            paths(&check(schema, json!(-1)))
        );
    }

    #[test]
    fn dependencies() {
        let errors = check(
            json!({"dependencies": {"a": ["b", "c"], "d": {"required": ["e"]}}}),
            json!({"a": 1, "d": 2}),
        );
        assert_eq!(
            vec![
                "\"b\" is a dependency of \"a\"",
                "\"c\" is a dependency of \"a\"",
                "\"e\" is a required property",
            ],
            errors.iter().map(|error| error.message.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn property_names() {
        let errors = check(
            json!({"propertyNames": {"pattern": "^[a-z]+$"}}),
            json!({"ok": 1, "Not OK": 2}),
        );
        assert_eq!(1, errors.len());
        assert_eq!("\"Not OK\" is not a valid property name", errors[0].message);
        assert_eq!("/propertyNames", errors[0].schema_pointer());
    }

    #[test]
    fn errors_are_lazy() {
        let validator = Validator::compile(&json!({"items": {"type": "string"}}), None).unwrap();
        let items: Vec<serde_json::Value> = (0..10_000).map(|i| json!(i)).collect();
        let instance = Value::try_from(&serde_json::Value::Array(items)).unwrap();

        let mut errors = validator.validate(&instance);
        assert_eq!("/0", errors.next().unwrap().instance_pointer());
        assert_eq!("/1", errors.next().unwrap().instance_pointer());
        assert_eq!(9_998, errors.count());
    }

    #[test]
    fn display() {
        let errors = check(json!({"enum": [1, "a"]}), json!(null));
        assert_eq!("null is not one of [1, \"a\"]", errors[0].to_string());
    }
}
