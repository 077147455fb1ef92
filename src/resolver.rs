use crate::draft::{Draft, KeywordKind, Shape};
use crate::error::SchemaError;
use crate::value::Value;
use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// Base URI of a root schema that declares no id of its own.
pub(crate) const DEFAULT_BASE_URI: &str = "json-schema:///";

/// Supplies external schema documents for `$ref`s outside the root document.
///
/// Implemented for closures, so a retriever can be as small as:
///
/// ```
/// use jsv::{CompileOptions, Url};
/// use serde_json::json;
///
/// let validator = CompileOptions::new()
///     .with_retriever(|uri: &Url| -> anyhow::Result<serde_json::Value> {
///         assert_eq!("http://example.com/positive.json", uri.as_str());
///         Ok(json!({"minimum": 0}))
///     })
///     .compile(&json!({"$ref": "http://example.com/positive.json"}))
///     .unwrap();
///
/// assert!(!validator.is_valid(&jsv::to_value(&-1).unwrap()));
/// ```
pub trait Retrieve: Send + Sync {
    fn retrieve(&self, uri: &Url) -> anyhow::Result<serde_json::Value>;
}

impl<F> Retrieve for F
where
    F: Fn(&Url) -> anyhow::Result<serde_json::Value> + Send + Sync,
{
    fn retrieve(&self, uri: &Url) -> anyhow::Result<serde_json::Value> {
        self(uri)
    }
}

/// A schema inside one of the resolver's documents.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Location {
    pub(crate) document: usize,
    pub(crate) pointer: Vec<String>,
}

impl Location {
    pub(crate) fn child(&self, tokens: &[&str]) -> Location {
        let mut pointer = self.pointer.clone();
        pointer.extend(tokens.iter().map(|token| (*token).to_owned()));
        Location {
            document: self.document,
            pointer,
        }
    }
}

pub(crate) struct Document {
    pub(crate) value: Value,
    pub(crate) draft: Draft,
    url: Url,
}

pub(crate) struct Resolver<'r> {
    retriever: Option<&'r dyn Retrieve>,
    max_depth: usize,
    documents: Vec<Arc<Document>>,
    /// Fragment-less URLs of documents and of subschemas with an id.
    resources: HashMap<Url, Location>,
    /// Plain-name fragments such as `#foo`.
    anchors: HashMap<Url, Location>,
}

static META_SCHEMAS: Lazy<HashMap<Draft, Value>> = Lazy::new(|| {
    let bundled = [
        (Draft::Draft4, include_str!("metaschemas/draft4.json")),
        (Draft::Draft6, include_str!("metaschemas/draft6.json")),
        (Draft::Draft7, include_str!("metaschemas/draft7.json")),
    ];

    bundled
        .iter()
        .map(|(draft, text)| {
            let json: serde_json::Value =
                serde_json::from_str(text).expect("bundled meta-schema is valid JSON");
            let value =
                Value::try_from(&json).expect("bundled meta-schema fits the JSON data model");
            (*draft, value)
        })
        .collect()
});

impl<'r> Resolver<'r> {
    pub(crate) fn new(
        root: Value,
        base: Url,
        draft: Draft,
        retriever: Option<&'r dyn Retrieve>,
        max_depth: usize,
    ) -> Result<Resolver<'r>, SchemaError> {
        let mut resolver = Resolver {
            retriever,
            max_depth,
            documents: Vec::new(),
            resources: HashMap::new(),
            anchors: HashMap::new(),
        };
        resolver.add_document(root, base, draft)?;
        Ok(resolver)
    }

    pub(crate) fn document(&self, index: usize) -> Arc<Document> {
        Arc::clone(&self.documents[index])
    }

    /// Resolves `reference` against `base` to the schema it points at.
    pub(crate) fn resolve(&mut self, base: &Url, reference: &str) -> Result<Location, SchemaError> {
        let url = join(base, reference)?;
        trace!(reference, resolved = %url, "resolving reference");

        let mut resource = url.clone();
        resource.set_fragment(None);

        let root = match self.resources.get(&resource) {
            Some(location) => location.clone(),
            None => self.retrieve(&resource)?,
        };

        let fragment = url.fragment().unwrap_or("");
        let location = if fragment.is_empty() {
            root
        } else if fragment.starts_with('/') {
            let decoded = percent_decode_str(fragment)
                .decode_utf8()
                .map_err(|err| unresolvable(reference, err))?;
            let mut pointer = root.pointer;
            pointer.extend(decoded[1..].split('/').map(unescape_token));
            Location {
                document: root.document,
                pointer,
            }
        } else {
            self.anchors
                .get(&url)
                .cloned()
                .ok_or_else(|| unresolvable(reference, "no schema declares this anchor"))?
        };

        if self.documents[location.document]
            .value
            .pointer(&location.pointer)
            .is_none()
        {
            return Err(unresolvable(reference, "the pointer has no target"));
        }

        Ok(location)
    }

    /// The base URI in effect around the schema at `location`, i.e. before
    /// that schema's own id is applied.
    pub(crate) fn scope(&self, location: &Location) -> Result<Url, SchemaError> {
        let document = &self.documents[location.document];
        let id_keyword = document.draft.vocabulary().id_keyword;

        let mut base = document.url.clone();
        let mut current = &document.value;
        for token in &location.pointer {
            base = apply_id(&base, current, id_keyword)?;
            current = match current.pointer(std::slice::from_ref(token)) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(base)
    }

    fn retrieve(&mut self, resource: &Url) -> Result<Location, SchemaError> {
        let value = match Draft::from_uri(resource.as_str()) {
            Some(draft) => META_SCHEMAS[&draft].clone(),
            None => {
                let retriever = self.retriever.ok_or_else(|| {
                    unresolvable(resource, "external references need a retriever")
                })?;

                debug!(uri = %resource, "retrieving external document");
                let json = retriever
                    .retrieve(resource)
                    .map_err(|err| unresolvable(resource, err))?;
                Value::try_from(&json).map_err(|source| SchemaError::Unrepresentable {
                    location: resource.to_string(),
                    source,
                })?
            }
        };

        let root_draft = self.documents[0].draft;
        let draft = Draft::declared(&value)?.unwrap_or(root_draft);
        let document = self.add_document(value, resource.clone(), draft)?;
        Ok(Location {
            document,
            pointer: Vec::new(),
        })
    }

    fn add_document(&mut self, value: Value, mut url: Url, draft: Draft) -> Result<usize, SchemaError> {
        url.set_fragment(None);
        let document = self.documents.len();
        self.resources.insert(
            url.clone(),
            Location {
                document,
                pointer: Vec::new(),
            },
        );

        self.index(document, draft, &value, &mut Vec::new(), &url)?;
        self.documents.push(Arc::new(Document { value, draft, url }));
        Ok(document)
    }

    /// Registers the ids found at subschema positions below `schema`.
    fn index(
        &mut self,
        document: usize,
        draft: Draft,
        schema: &Value,
        pointer: &mut Vec<String>,
        base: &Url,
    ) -> Result<(), SchemaError> {
        let object = match schema {
            Value::Object(object) => object,
            _ => return Ok(()),
        };

        if self.max_depth != 0 && pointer.len() > 2 * self.max_depth {
            return Err(SchemaError::MaxDepthExceeded(self.max_depth));
        }

        let vocabulary = draft.vocabulary();
        let mut base = base.clone();
        if !object.contains_key("$ref") {
            if let Some(Value::String(id)) = object.get(vocabulary.id_keyword) {
                let location = Location {
                    document,
                    pointer: pointer.clone(),
                };
                let resolved = join(&base, id)?;
                if resolved.fragment().map_or(false, |f| !f.is_empty()) {
                    self.anchors.insert(resolved.clone(), location.clone());
                }
                if !id.starts_with('#') {
                    let mut resource = resolved;
                    resource.set_fragment(None);
                    self.resources.entry(resource.clone()).or_insert(location);
                    base = resource;
                }
            }
        }

        for (key, child) in object {
            let key = key.as_str();
            let kind_and_shape = if key == "definitions" {
                Some((KeywordKind::Properties, Shape::Object))
            } else {
                vocabulary.keyword(key)
            };

            match kind_and_shape {
                Some((_, Shape::Schema)) => {
                    self.index_child(document, draft, child, pointer, &[key], &base)?;
                }
                Some((_, Shape::SchemaArray)) | Some((_, Shape::SchemaOrSchemaArray)) => {
                    if let Value::Array(items) = child {
                        for (i, item) in items.iter().enumerate() {
                            let index = i.to_string();
                            self.index_child(document, draft, item, pointer, &[key, index.as_str()], &base)?;
                        }
                    } else {
                        self.index_child(document, draft, child, pointer, &[key], &base)?;
                    }
                }
                Some((KeywordKind::Properties, _))
                | Some((KeywordKind::PatternProperties, _))
                | Some((KeywordKind::Dependencies, _)) => {
                    if let Value::Object(members) = child {
                        for (name, member) in members {
                            self.index_child(document, draft, member, pointer, &[key, name.as_str()], &base)?;
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn index_child(
        &mut self,
        document: usize,
        draft: Draft,
        child: &Value,
        pointer: &mut Vec<String>,
        tokens: &[&str],
        base: &Url,
    ) -> Result<(), SchemaError> {
        let depth = pointer.len();
        pointer.extend(tokens.iter().map(|token| (*token).to_owned()));
        let result = self.index(document, draft, child, pointer, base);
        pointer.truncate(depth);
        result
    }
}

/// Applies the id of `schema`, if any, to `base`.
///
/// Plain-name fragments don't move the base, and neither does an id next to
/// `$ref`, which replaces the whole schema.
pub(crate) fn apply_id(base: &Url, schema: &Value, id_keyword: &str) -> Result<Url, SchemaError> {
    let object = match schema {
        Value::Object(object) if !object.contains_key("$ref") => object,
        _ => return Ok(base.clone()),
    };

    match object.get(id_keyword) {
        Some(Value::String(id)) if !id.starts_with('#') => {
            let mut url = join(base, id)?;
            url.set_fragment(None);
            Ok(url)
        }
        _ => Ok(base.clone()),
    }
}

pub(crate) fn join(base: &Url, reference: &str) -> Result<Url, SchemaError> {
    base.join(reference).map_err(|err| SchemaError::InvalidUri {
        uri: reference.to_owned(),
        reason: err.to_string(),
    })
}

pub(crate) fn parse_base(uri: &str) -> Result<Url, SchemaError> {
    Url::parse(uri).map_err(|err| SchemaError::InvalidUri {
        uri: uri.to_owned(),
        reason: err.to_string(),
    })
}

fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Renders pointer tokens as a JSON Pointer string.
pub(crate) fn to_pointer<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens
        .iter()
        .map(|token| format!("/{}", escape_token(token.as_ref())))
        .collect()
}

fn unresolvable(reference: impl ToString, reason: impl ToString) -> SchemaError {
    SchemaError::UnresolvableReference {
        reference: reference.to_string(),
        reason: reason.to_string(),
    }
}
