//! # Output Sink
//!
//! The persistence backend seen by the tuple coordinator. A sink stores named
//! tuples (tables of typed fields) in files; several tuples may share a file
//! and tuples may be bound to distinct files.
//!
//! Call sequence issued by the coordinator for one thread:
//!
//! ```text
//! set_merge_mode(true)?          (master, first run, once)
//! open(file)                     (once per file)
//! create_tuple(name, title) → t
//! create_field(t, name, type)    (×1 per column, ×3 for vectors: _X/_Y/_Z)
//! bind_file(t, file)
//! { fill_field(t, f, v)… add_row(t) }*
//! write()                        (once per thread)
//! close(file)
//! ```

pub mod store;

pub use store::{per_thread_path, FieldSpec, StoreSink, StoredFile, StoredTuple, TupleStore};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::context::ThreadRole;
use crate::RecorderResult;

/// Identifier of a tuple inside one sink
pub type TupleId = usize;

/// Identifier of a field inside one tuple
pub type FieldId = usize;

/// Physical field type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Double,
    Int,
    String,
}

/// Physical field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Double(f64),
    String(String),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Double(_) => FieldType::Double,
            Self::Int(_) => FieldType::Int,
            Self::String(_) => FieldType::String,
        }
    }

    /// Numeric view; integers are widened
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::String(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce a deserialized value to the declared field type. JSON does not
    /// distinguish `1.0` written as `1` from an integer.
    pub fn coerce(self, field_type: FieldType) -> Self {
        match (field_type, self) {
            (FieldType::Double, Self::Int(v)) => Self::Double(v as f64),
            (_, v) => v,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// Persistence backend driven by the tuple coordinator, one instance per thread
pub trait TupleSink {
    /// Open a file for writing
    fn open(&mut self, filename: &Path) -> RecorderResult<()>;

    /// Merge the tuples of all threads into one logical tuple per file
    fn set_merge_mode(&mut self, merge: bool) -> RecorderResult<()>;

    fn create_tuple(&mut self, name: &str, title: &str) -> RecorderResult<TupleId>;

    fn create_field(
        &mut self,
        tuple: TupleId,
        name: &str,
        field_type: FieldType,
    ) -> RecorderResult<FieldId>;

    /// Attach a tuple to a file other than the default one
    fn bind_file(&mut self, tuple: TupleId, filename: &Path) -> RecorderResult<()>;

    fn fill_field(&mut self, tuple: TupleId, field: FieldId, value: FieldValue)
        -> RecorderResult<()>;

    /// Mark the current row of a tuple as complete
    fn add_row(&mut self, tuple: TupleId) -> RecorderResult<()>;

    /// Persist everything filled so far
    fn write(&mut self) -> RecorderResult<()>;

    fn close(&mut self, filename: &Path) -> RecorderResult<()>;
}

/// Hands out one sink per thread; shared by every thread of a simulation
pub trait SinkProvider: Send + Sync {
    fn sink_for(&self, role: ThreadRole) -> Box<dyn TupleSink>;
}

impl SinkProvider for TupleStore {
    fn sink_for(&self, role: ThreadRole) -> Box<dyn TupleSink> {
        Box::new(self.sink(role))
    }
}
