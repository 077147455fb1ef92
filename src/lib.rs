//! JSON Schema validation for drafts 4, 6 and 7.
//!
//! A schema is compiled once into a [`Validator`], which can then check any
//! number of instances, from any number of threads.
//!
//! ```
//! use serde_json::json;
//!
//! let validator = jsv::compile(&json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string"}},
//!     "required": ["name"]
//! }), None).unwrap();
//!
//! let instance = jsv::to_value(&json!({"name": 42})).unwrap();
//! assert!(!validator.is_valid(&instance));
//!
//! for error in validator.validate(&instance) {
//!     assert_eq!("/name", error.instance_pointer());
//!     assert_eq!("42 is not of type \"string\"", error.to_string());
//! }
//! ```
//!
//! Instances are [`Value`]s. Converting into one rejects what JSON cannot
//! represent, such as integers beyond 64 bits or NaN, instead of rounding it.

mod compiler;
mod draft;
mod error;
mod form;
mod format;
mod resolver;
mod ser;
mod validate;
mod validator;
mod value;

pub use compiler::{CompileOptions, DEFAULT_MAX_DEPTH};
pub use draft::Draft;
pub use error::{Error, InputError, SchemaError};
pub use resolver::Retrieve;
pub use ser::to_value;
pub use url::Url;
pub use validate::{ErrorIter, ValidationError};
pub use validator::Validator;
pub use value::{Number, Value};

use std::convert::TryFrom;

/// Compiles `schema`, detecting its draft unless one is given.
pub fn compile(schema: &serde_json::Value, draft: Option<Draft>) -> Result<Validator, SchemaError> {
    Validator::compile(schema, draft)
}

/// Compiles `schema` and checks `instance` against it in one go.
///
/// ```
/// use serde_json::json;
///
/// assert_eq!(Ok(true), jsv::is_valid(&json!({"maximum": 3}), &json!(3)));
/// assert_eq!(Ok(false), jsv::is_valid(&json!({"maximum": 3}), &json!(3.5)));
/// assert!(jsv::is_valid(&json!({"type": "nonsense"}), &json!(1)).is_err());
/// ```
pub fn is_valid(schema: &serde_json::Value, instance: &serde_json::Value) -> Result<bool, Error> {
    let validator = compile(schema, None)?;
    let instance = Value::try_from(instance)?;
    Ok(validator.is_valid(&instance))
}
