//! Error types for hit recording operations

use thiserror::Error;

use crate::attributes::AttributeType;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Unknown attribute '{name}'. Known attributes: {known}")]
    UnknownAttribute { name: String, known: String },

    #[error("Attribute '{0}' is already defined in the registry")]
    AttributeAlreadyDefined(String),

    #[error("Attribute '{attribute}' is initialized twice in collection '{collection}'")]
    DuplicateAttribute { collection: String, attribute: String },

    #[error("Tuple '{0}' is already declared")]
    DuplicateTuple(String),

    #[error("Collection '{0}' does not exist")]
    UnknownCollection(String),

    #[error("No tuple is declared for slot {0}")]
    UnknownSlot(usize),

    #[error("Attribute '{attribute}' holds {actual} values, not {expected}")]
    TypeMismatch {
        attribute: String,
        expected: AttributeType,
        actual: AttributeType,
    },

    #[error("Attribute '{0}' has no compute function and must be filled explicitly")]
    NotComputable(String),

    #[error("Collection '{collection}' has no attribute '{attribute}'")]
    MissingAttribute { collection: String, attribute: String },

    #[error("Unknown merge policy '{name}'. Valid policies: {valid}")]
    UnknownPolicy { name: String, valid: String },

    #[error("Collection '{0}' has no output file")]
    MissingOutputFile(String),

    #[error("Collection '{0}' has no attributes")]
    EmptySchema(String),

    #[error("Touchable depth {depth} exceeds the maximum volume depth {max}")]
    VolumeTooDeep { depth: usize, max: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Worker thread {0} panicked")]
    WorkerPanicked(usize),

    #[error("Output sink error: {0}")]
    Sink(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
