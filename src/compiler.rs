use crate::draft::{Draft, KeywordKind, Shape, Vocabulary};
use crate::error::SchemaError;
use crate::form::{
    Dependency, Form, Format, FormatChecker, Keyword, Node, NodeId, Pattern, TypeSet, Types,
};
use crate::resolver::{self, Location, Resolver, Retrieve, DEFAULT_BASE_URI};
use crate::validator::Validator;
use crate::value::{Number, Value};
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Nesting limit used unless [`CompileOptions::with_max_depth`] says otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configures how a schema is compiled into a [`Validator`].
///
/// ```
/// use jsv::{CompileOptions, Draft};
/// use serde_json::json;
///
/// let validator = CompileOptions::new()
///     .with_draft(Draft::Draft6)
///     .with_format("even", |s| s.len() % 2 == 0)
///     .compile(&json!({"format": "even"}))
///     .unwrap();
///
/// assert!(validator.is_valid(&jsv::to_value("ab").unwrap()));
/// assert!(!validator.is_valid(&jsv::to_value("abc").unwrap()));
/// ```
#[derive(Clone)]
pub struct CompileOptions {
    draft: Option<Draft>,
    max_depth: usize,
    base_uri: Option<String>,
    retriever: Option<Arc<dyn Retrieve>>,
    formats: HashMap<String, FormatChecker>,
    validate_formats: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            draft: None,
            max_depth: DEFAULT_MAX_DEPTH,
            base_uri: None,
            retriever: None,
            formats: HashMap::new(),
            validate_formats: true,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles under `draft` instead of detecting it from the schema.
    pub fn with_draft(mut self, draft: Draft) -> Self {
        self.draft = Some(draft);
        self
    }

    /// Limits schema nesting, counting `$ref` hops. Zero means no limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The URI the root document is considered to be retrieved from.
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_retriever(mut self, retriever: impl Retrieve + 'static) -> Self {
        self.retriever = Some(Arc::new(retriever));
        self
    }

    /// Registers a `format` checker, replacing any built-in one of that name.
    pub fn with_format(
        mut self,
        name: impl Into<String>,
        check: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.formats.insert(name.into(), Arc::new(check));
        self
    }

    /// When false, `format` is an annotation only.
    pub fn should_validate_formats(mut self, validate_formats: bool) -> Self {
        self.validate_formats = validate_formats;
        self
    }

    pub fn compile(&self, schema: &serde_json::Value) -> Result<Validator, SchemaError> {
        let schema = Value::try_from(schema).map_err(|source| SchemaError::Unrepresentable {
            location: String::new(),
            source,
        })?;
        self.compile_owned(schema)
    }

    pub fn compile_value(&self, schema: &Value) -> Result<Validator, SchemaError> {
        self.compile_owned(schema.clone())
    }

    fn compile_owned(&self, schema: Value) -> Result<Validator, SchemaError> {
        let draft = match self.draft {
            Some(draft) => draft,
            None => Draft::detect(&schema)?,
        };
        let base = resolver::parse_base(self.base_uri.as_deref().unwrap_or(DEFAULT_BASE_URI))?;
        debug!(?draft, %base, "compiling schema");

        let resolver = Resolver::new(
            schema,
            base.clone(),
            draft,
            self.retriever.as_deref(),
            self.max_depth,
        )?;
        let mut compiler = Compiler {
            options: self,
            resolver,
            slots: Vec::new(),
            registry: HashMap::new(),
            depth: 0,
        };

        let root_location = Location {
            document: 0,
            pointer: Vec::new(),
        };
        let root = compiler.compile_location(root_location, &base)?;
        let nodes = compiler.finish()?;
        check_in_place_chains(&nodes, self.max_depth)?;

        debug!(nodes = nodes.len(), "compiled schema");
        Ok(Validator::new(nodes, root, draft))
    }
}

struct Compiler<'o> {
    options: &'o CompileOptions,
    resolver: Resolver<'o>,
    /// `None` while a node's body is being compiled.
    slots: Vec<Option<Node>>,
    registry: HashMap<Location, NodeId>,
    depth: usize,
}

/// The schema object whose keywords are being compiled.
struct Site<'s> {
    location: &'s Location,
    scope: &'s Url,
    object: &'s IndexMap<String, Value>,
    vocabulary: &'static Vocabulary,
}

impl<'s> Site<'s> {
    fn invalid(&self, keyword: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidKeyword {
            keyword: keyword.to_owned(),
            location: resolver::to_pointer(&self.location.pointer),
            reason: reason.into(),
        }
    }

    fn expected(&self, keyword: &str, shape: Shape, argument: &Value) -> SchemaError {
        self.invalid(keyword, format!("expected {}, got {}", shape.describe(), argument))
    }

    fn number(&self, keyword: &str, argument: &Value) -> Result<Number, SchemaError> {
        argument
            .as_number()
            .copied()
            .ok_or_else(|| self.expected(keyword, Shape::Number, argument))
    }

    fn count(&self, keyword: &str, argument: &Value) -> Result<u64, SchemaError> {
        non_negative_integer(argument, self.vocabulary.integer_valued_floats)
            .ok_or_else(|| self.expected(keyword, Shape::NonNegativeInteger, argument))
    }

    fn string<'a>(&self, keyword: &str, argument: &'a Value) -> Result<&'a str, SchemaError> {
        argument
            .as_str()
            .ok_or_else(|| self.expected(keyword, Shape::String, argument))
    }
}

impl<'o> Compiler<'o> {
    fn compile_location(&mut self, location: Location, scope: &Url) -> Result<NodeId, SchemaError> {
        if let Some(&id) = self.registry.get(&location) {
            return Ok(id);
        }

        let id = NodeId(self.slots.len());
        self.slots.push(None);
        self.registry.insert(location.clone(), id);

        if self.options.max_depth != 0 && self.depth == self.options.max_depth {
            return Err(SchemaError::MaxDepthExceeded(self.options.max_depth));
        }

        self.depth += 1;
        let node = self.compile_node(&location, scope);
        self.depth -= 1;

        self.slots[id.0] = Some(node?);
        Ok(id)
    }

    fn compile_node(&mut self, location: &Location, scope: &Url) -> Result<Node, SchemaError> {
        let document = self.resolver.document(location.document);
        let schema = document.value.pointer(&location.pointer).ok_or_else(|| {
            SchemaError::UnresolvableReference {
                reference: resolver::to_pointer(&location.pointer),
                reason: "the pointer has no target".to_owned(),
            }
        })?;

        let form = match schema {
            Value::Bool(b) => Form::Bool(*b),
            Value::Object(object) => {
                let vocabulary = document.draft.vocabulary();
                let scope = resolver::apply_id(scope, schema, vocabulary.id_keyword)?;
                let site = Site {
                    location,
                    scope: &scope,
                    object,
                    vocabulary,
                };
                Form::Keywords(self.compile_keywords(&site)?)
            }
            other => {
                return Err(SchemaError::InvalidSchema {
                    location: resolver::to_pointer(&location.pointer),
                    found: other.type_name(),
                })
            }
        };

        Ok(Node {
            location: location.pointer.clone(),
            form,
        })
    }

    fn compile_keywords(&mut self, site: &Site<'_>) -> Result<Vec<Keyword>, SchemaError> {
        // `$ref` replaces every sibling keyword.
        if let Some(reference) = site.object.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| site.invalid("$ref", "expected a string"))?;
            let target = self.resolver.resolve(site.scope, reference)?;
            let scope = self.resolver.scope(&target)?;
            debug!(reference, pointer = %resolver::to_pointer(&target.pointer), "resolved reference");
            return Ok(vec![Keyword::Ref(self.compile_location(target, &scope)?)]);
        }

        let mut keywords = Vec::new();
        for (name, argument) in site.object {
            let (kind, shape) = match site.vocabulary.keyword(name) {
                Some(entry) => entry,
                None => continue,
            };

            if !has_shape(shape, argument, site.vocabulary) {
                return Err(site.expected(name, shape, argument));
            }

            if let Some(keyword) = self.compile_keyword(site, kind, name, argument)? {
                keywords.push(keyword);
            }
        }
        Ok(keywords)
    }

    fn compile_keyword(
        &mut self,
        site: &Site<'_>,
        kind: KeywordKind,
        name: &str,
        argument: &Value,
    ) -> Result<Option<Keyword>, SchemaError> {
        let vocabulary = site.vocabulary;
        let keyword = match kind {
            // Handled before any other keyword.
            KeywordKind::Ref => return Ok(None),

            KeywordKind::Type => {
                let names: Vec<&str> = match argument {
                    Value::String(single) => vec![single.as_str()],
                    Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                    _ => Vec::new(),
                };

                let mut types = Types::empty();
                for type_name in names {
                    types |= Types::from_type_name(type_name)
                        .ok_or_else(|| site.invalid(name, format!("unknown type {:?}", type_name)))?;
                }

                Keyword::Type(TypeSet {
                    types,
                    integer_valued_floats: vocabulary.integer_valued_floats,
                })
            }

            KeywordKind::Enum => Keyword::Enum(argument.as_array().cloned().unwrap_or_default()),
            KeywordKind::Const => Keyword::Const(argument.clone()),

            KeywordKind::Minimum => {
                let limit = site.number(name, argument)?;
                if vocabulary.boolean_exclusive_bounds && is_true(site.object.get("exclusiveMinimum")) {
                    Keyword::ExclusiveMinimum(limit)
                } else {
                    Keyword::Minimum(limit)
                }
            }
            KeywordKind::Maximum => {
                let limit = site.number(name, argument)?;
                if vocabulary.boolean_exclusive_bounds && is_true(site.object.get("exclusiveMaximum")) {
                    Keyword::ExclusiveMaximum(limit)
                } else {
                    Keyword::Maximum(limit)
                }
            }
            // Draft4 folds these booleans into `minimum` and `maximum`.
            KeywordKind::ExclusiveMinimum | KeywordKind::ExclusiveMaximum
                if vocabulary.boolean_exclusive_bounds =>
            {
                return Ok(None)
            }
            KeywordKind::ExclusiveMinimum => Keyword::ExclusiveMinimum(site.number(name, argument)?),
            KeywordKind::ExclusiveMaximum => Keyword::ExclusiveMaximum(site.number(name, argument)?),

            KeywordKind::MultipleOf => {
                let divisor = site.number(name, argument)?;
                if !divisor.is_positive() {
                    return Err(site.invalid(name, "must be strictly greater than 0"));
                }
                Keyword::MultipleOf(divisor)
            }

            KeywordKind::MinLength => Keyword::MinLength(site.count(name, argument)?),
            KeywordKind::MaxLength => Keyword::MaxLength(site.count(name, argument)?),
            KeywordKind::MinItems => Keyword::MinItems(site.count(name, argument)?),
            KeywordKind::MaxItems => Keyword::MaxItems(site.count(name, argument)?),
            KeywordKind::MinProperties => Keyword::MinProperties(site.count(name, argument)?),
            KeywordKind::MaxProperties => Keyword::MaxProperties(site.count(name, argument)?),

            KeywordKind::Pattern => {
                Keyword::Pattern(compile_pattern(site, site.string(name, argument)?)?)
            }

            KeywordKind::Format => {
                if !self.options.validate_formats {
                    return Ok(None);
                }

                let format_name = site.string(name, argument)?;
                let check: Option<FormatChecker> = match self.options.formats.get(format_name) {
                    Some(check) => Some(Arc::clone(check)),
                    None => vocabulary
                        .format(format_name)
                        .map(|check| Arc::new(check) as FormatChecker),
                };

                match check {
                    Some(check) => Keyword::Format(Format {
                        name: format_name.to_owned(),
                        check,
                    }),
                    // Unknown formats are annotations.
                    None => return Ok(None),
                }
            }

            KeywordKind::Items => match argument {
                Value::Array(items) => {
                    let mut targets = Vec::with_capacity(items.len());
                    for i in 0..items.len() {
                        let index = i.to_string();
                        targets.push(self.compile_child(site, &[name, index.as_str()])?);
                    }
                    Keyword::TupleItems(targets)
                }
                _ => Keyword::Items(self.compile_child(site, &[name])?),
            },

            KeywordKind::AdditionalItems => match site.object.get("items") {
                Some(Value::Array(items)) => Keyword::AdditionalItems {
                    skip: items.len(),
                    schema: self.compile_child(site, &[name])?,
                },
                _ => return Ok(None),
            },

            KeywordKind::UniqueItems => match argument {
                Value::Bool(true) => Keyword::UniqueItems,
                _ => return Ok(None),
            },

            KeywordKind::Contains => Keyword::Contains(self.compile_child(site, &[name])?),

            KeywordKind::Properties => {
                let mut properties = Vec::new();
                for property in object_keys(argument) {
                    let target = self.compile_child(site, &[name, property])?;
                    properties.push((property.to_owned(), target));
                }
                Keyword::Properties(properties)
            }

            KeywordKind::PatternProperties => {
                let mut patterns = Vec::new();
                for source in object_keys(argument) {
                    let pattern = compile_pattern(site, source)?;
                    let target = self.compile_child(site, &[name, source])?;
                    patterns.push((pattern, target));
                }
                Keyword::PatternProperties(patterns)
            }

            KeywordKind::AdditionalProperties => {
                let known = site
                    .object
                    .get("properties")
                    .map(|properties| object_keys(properties).map(str::to_owned).collect())
                    .unwrap_or_default();
                let patterns = match site.object.get("patternProperties") {
                    Some(patterns) => object_keys(patterns)
                        .map(|source| compile_pattern(site, source))
                        .collect::<Result<_, _>>()?,
                    None => Vec::new(),
                };

                Keyword::AdditionalProperties {
                    known,
                    patterns,
                    schema: self.compile_child(site, &[name])?,
                }
            }

            KeywordKind::Required => Keyword::Required(strings(argument)),

            KeywordKind::PropertyNames => Keyword::PropertyNames(self.compile_child(site, &[name])?),

            KeywordKind::Dependencies => {
                let mut dependencies = Vec::new();
                if let Value::Object(members) = argument {
                    for (property, dependency) in members {
                        let dependency = match dependency {
                            Value::Array(items) if items.iter().all(|item| item.as_str().is_some()) => {
                                Dependency::Properties(strings(dependency))
                            }
                            Value::Bool(_) | Value::Object(_) => {
                                Dependency::Schema(self.compile_child(site, &[name, property.as_str()])?)
                            }
                            other => {
                                return Err(site.invalid(
                                    name,
                                    format!(
                                        "dependency of {:?} must be a schema or an array of strings, got {}",
                                        property, other
                                    ),
                                ))
                            }
                        };
                        dependencies.push((property.clone(), dependency));
                    }
                }
                Keyword::Dependencies(dependencies)
            }

            KeywordKind::If => {
                let condition = self.compile_child(site, &[name])?;
                let then = match site.object.get("then") {
                    Some(_) => Some(self.compile_child(site, &["then"])?),
                    None => None,
                };
                let otherwise = match site.object.get("else") {
                    Some(_) => Some(self.compile_child(site, &["else"])?),
                    None => None,
                };

                Keyword::Conditional {
                    condition,
                    then,
                    otherwise,
                }
            }
            // Only meaningful next to `if`.
            KeywordKind::Then | KeywordKind::Else => return Ok(None),

            KeywordKind::AllOf => Keyword::AllOf(self.compile_branches(site, name, argument)?),
            KeywordKind::AnyOf => Keyword::AnyOf(self.compile_branches(site, name, argument)?),
            KeywordKind::OneOf => Keyword::OneOf(self.compile_branches(site, name, argument)?),
            KeywordKind::Not => Keyword::Not(self.compile_child(site, &[name])?),
        };

        Ok(Some(keyword))
    }

    fn compile_child(&mut self, site: &Site<'_>, tokens: &[&str]) -> Result<NodeId, SchemaError> {
        self.compile_location(site.location.child(tokens), site.scope)
    }

    fn compile_branches(
        &mut self,
        site: &Site<'_>,
        name: &str,
        argument: &Value,
    ) -> Result<Vec<NodeId>, SchemaError> {
        let len = argument.as_array().map_or(0, Vec::len);
        (0..len)
            .map(|i| {
                let index = i.to_string();
                self.compile_child(site, &[name, index.as_str()])
            })
            .collect()
    }

    fn finish(self) -> Result<Vec<Node>, SchemaError> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| SchemaError::UnresolvableReference {
                    reference: format!("node {}", i),
                    reason: "compilation did not complete".to_owned(),
                })
            })
            .collect()
    }
}

fn has_shape(shape: Shape, argument: &Value, vocabulary: &Vocabulary) -> bool {
    match shape {
        Shape::Any => true,
        Shape::Boolean => argument.as_bool().is_some(),
        Shape::Number => argument.as_number().is_some(),
        Shape::NonNegativeInteger => {
            non_negative_integer(argument, vocabulary.integer_valued_floats).is_some()
        }
        Shape::String => argument.as_str().is_some(),
        Shape::Array => argument.as_array().is_some(),
        Shape::Object => argument.as_object().is_some(),
        Shape::Schema => is_schema(argument),
        Shape::SchemaArray => argument
            .as_array()
            .map_or(false, |items| !items.is_empty() && items.iter().all(is_schema)),
        Shape::SchemaOrSchemaArray => {
            is_schema(argument) || argument.as_array().map_or(false, |items| items.iter().all(is_schema))
        }
        Shape::StringArray => argument
            .as_array()
            .map_or(false, |items| items.iter().all(|item| item.as_str().is_some())),
        Shape::TypeNames => match argument {
            Value::String(_) => true,
            Value::Array(items) => items.iter().all(|item| item.as_str().is_some()),
            _ => false,
        },
    }
}

fn is_schema(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Object(_))
}

fn is_true(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

/// Draft6 onwards also accepts integral floats such as `2.0`.
fn non_negative_integer(argument: &Value, integer_valued_floats: bool) -> Option<u64> {
    let number = argument.as_number()?;
    if let Some(u) = number.as_u64() {
        return Some(u);
    }

    let f = number.as_f64();
    let integral_float = !number.is_integer() && number.has_integer_value();
    if integer_valued_floats && integral_float && f >= 0.0 && f < 18_446_744_073_709_551_616.0 {
        Some(f as u64)
    } else {
        None
    }
}

fn strings(argument: &Value) -> Vec<String> {
    argument
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default()
}

fn object_keys(argument: &Value) -> impl Iterator<Item = &str> {
    argument
        .as_object()
        .into_iter()
        .flat_map(|members| members.keys().map(String::as_str))
}

fn compile_pattern(site: &Site<'_>, source: &str) -> Result<Pattern, SchemaError> {
    let regex = Regex::new(source).map_err(|err| SchemaError::InvalidPattern {
        pattern: source.to_owned(),
        location: resolver::to_pointer(&site.location.pointer),
        reason: err.to_string(),
    })?;

    Ok(Pattern {
        source: source.to_owned(),
        regex,
    })
}

/// Walks the schemas each node applies to the same instance.
///
/// A cycle among them never decides (`{"$ref": "#"}`) and is rejected. A
/// chain longer than `max_depth` is rejected too: the registry lets short
/// compile paths reuse earlier nodes, so only the finished graph shows how
/// deep validation recurses on a single instance.
fn check_in_place_chains(nodes: &[Node], max_depth: usize) -> Result<(), SchemaError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let targets: Vec<Vec<NodeId>> = nodes
        .iter()
        .map(|node| match &node.form {
            Form::Keywords(keywords) => keywords.iter().flat_map(in_place_targets).collect(),
            Form::Bool(_) => Vec::new(),
        })
        .collect();

    let mut marks = vec![Mark::New; nodes.len()];
    // Nodes on the longest in-place chain starting at each node.
    let mut heights = vec![0usize; nodes.len()];
    // Explicit stack of (node, next target to visit), so long chains cannot
    // exhaust the call stack here either.
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..nodes.len() {
        if marks[start] != Mark::New {
            continue;
        }
        marks[start] = Mark::Active;
        stack.push((start, 0));

        while let Some((id, next)) = stack.last_mut() {
            let id = *id;
            match targets[id].get(*next) {
                Some(target) => {
                    *next += 1;
                    let target = target.0;
                    match marks[target] {
                        Mark::Active => {
                            return Err(SchemaError::InfiniteReference(resolver::to_pointer(
                                &nodes[target].location,
                            )))
                        }
                        Mark::Done => {}
                        Mark::New => {
                            marks[target] = Mark::Active;
                            stack.push((target, 0));
                        }
                    }
                }
                None => {
                    let height = 1 + targets[id].iter().map(|t| heights[t.0]).max().unwrap_or(0);
                    if max_depth != 0 && height > max_depth {
                        return Err(SchemaError::MaxDepthExceeded(max_depth));
                    }
                    heights[id] = height;
                    marks[id] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }
    Ok(())
}

/// Schemas a keyword applies to the very instance it is given.
fn in_place_targets(keyword: &Keyword) -> Vec<NodeId> {
    match keyword {
        Keyword::Ref(target) | Keyword::Not(target) => vec![*target],
        Keyword::AllOf(targets) | Keyword::AnyOf(targets) | Keyword::OneOf(targets) => {
            targets.clone()
        }
        Keyword::Conditional {
            condition,
            then,
            otherwise,
        } => std::iter::once(*condition)
            .chain(*then)
            .chain(*otherwise)
            .collect(),
        Keyword::Dependencies(dependencies) => dependencies
            .iter()
            .filter_map(|(_, dependency)| match dependency {
                Dependency::Schema(target) => Some(*target),
                Dependency::Properties(_) => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
