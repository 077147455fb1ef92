use thiserror::Error;

/// The schema document cannot be compiled.
///
/// Compilation has no partial-success mode: any of these aborts it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema at {location:?} must be an object or a boolean, got {found}")]
    InvalidSchema {
        location: String,
        found: &'static str,
    },

    #[error("invalid `{keyword}` at {location:?}: {reason}")]
    InvalidKeyword {
        keyword: String,
        location: String,
        reason: String,
    },

    #[error("invalid regular expression {pattern:?} at {location:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        location: String,
        reason: String,
    },

    #[error("schema at {location:?} contains a value outside the JSON data model: {source}")]
    Unrepresentable {
        location: String,
        #[source]
        source: InputError,
    },

    #[error("cannot resolve reference {reference:?}: {reason}")]
    UnresolvableReference { reference: String, reason: String },

    #[error("invalid URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("unsupported draft {0:?}")]
    UnsupportedDraft(String),

    #[error("schema nesting exceeds the maximum depth of {0}")]
    MaxDepthExceeded(usize),

    #[error("reference cycle at {0:?} never descends into the instance")]
    InfiniteReference(String),
}

/// A value has no representation in the JSON data model.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("integer {0} is outside the supported range")]
    IntegerOutOfRange(String),

    #[error("number {0} is not finite")]
    NonFiniteNumber(String),

    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),

    #[error("object keys must be strings")]
    KeyMustBeString,

    #[error("{0}")]
    Custom(String),
}

impl serde::ser::Error for InputError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        InputError::Custom(msg.to_string())
    }
}

/// Either of the two failures the one-shot helpers can report.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Input(#[from] InputError),
}
