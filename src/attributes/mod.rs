//! # Hit Attributes
//!
//! An attribute kind is a named, typed value computed from a raw step:
//!
//! | Tag | Type            | Column storage              | Serialized fields   |
//! |-----|-----------------|-----------------------------|---------------------|
//! | `D` | Double          | `Vec<f64>`                  | 1 (double)          |
//! | `I` | Int             | `Vec<i64>`                  | 1 (int)             |
//! | `S` | String          | `Vec<String>`               | 1 (string)          |
//! | `3` | Vector3         | `Vec<Vec3>`                 | 3 (`_X`, `_Y`, `_Z`)|
//! | `U` | VolumeIdentity  | `Vec<Arc<VolumeIdentity>>`  | 1 (canonical string)|
//!
//! Kinds live in the [`AttributeRegistry`]; every request for a kind returns a
//! fresh [`TypedColumn`] sharing the compute function but owning its buffer.

pub mod builtin;
pub mod column;
pub mod registry;

pub use column::{ColumnData, TypedColumn};
pub use registry::AttributeRegistry;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::RecorderError;
use crate::geometry::Vec3;
use crate::step::HitContext;
use crate::volume_id::VolumeIdentity;
use crate::RecorderResult;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES AND VALUES
// ═══════════════════════════════════════════════════════════════════════════════

/// Value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    Double,
    Int,
    String,
    Vector3,
    VolumeId,
}

impl AttributeType {
    pub fn all() -> [Self; 5] {
        [
            Self::Double,
            Self::Int,
            Self::String,
            Self::Vector3,
            Self::VolumeId,
        ]
    }

    /// Single-character type tag
    pub fn tag(&self) -> char {
        match self {
            Self::Double => 'D',
            Self::Int => 'I',
            Self::String => 'S',
            Self::Vector3 => '3',
            Self::VolumeId => 'U',
        }
    }

    /// Number of physical fields one value occupies in a tuple
    pub fn field_count(&self) -> usize {
        match self {
            Self::Vector3 => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Double => "Double",
            Self::Int => "Int",
            Self::String => "String",
            Self::Vector3 => "Vector3",
            Self::VolumeId => "VolumeId",
        };
        f.write_str(name)
    }
}

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Double(f64),
    Int(i64),
    String(String),
    Vector3(Vec3),
    VolumeId(Arc<VolumeIdentity>),
}

impl AttributeValue {
    pub fn value_type(&self) -> AttributeType {
        match self {
            Self::Double(_) => AttributeType::Double,
            Self::Int(_) => AttributeType::Int,
            Self::String(_) => AttributeType::String,
            Self::Vector3(_) => AttributeType::Vector3,
            Self::VolumeId(_) => AttributeType::VolumeId,
        }
    }

    /// Zero/empty value of a type, used to keep columns aligned
    pub fn default_for(value_type: AttributeType) -> Self {
        match value_type {
            AttributeType::Double => Self::Double(0.0),
            AttributeType::Int => Self::Int(0),
            AttributeType::String => Self::String(String::new()),
            AttributeType::Vector3 => Self::Vector3(Vec3::ZERO),
            AttributeType::VolumeId => Self::VolumeId(VolumeIdentity::empty()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPUTE FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub type DoubleFn = Arc<dyn for<'a, 'b> Fn(&'a HitContext<'b>) -> f64 + Send + Sync>;
pub type IntFn = Arc<dyn for<'a, 'b> Fn(&'a HitContext<'b>) -> i64 + Send + Sync>;
pub type StringFn = Arc<dyn for<'a, 'b> Fn(&'a HitContext<'b>) -> String + Send + Sync>;
pub type Vector3Fn = Arc<dyn for<'a, 'b> Fn(&'a HitContext<'b>) -> Vec3 + Send + Sync>;
pub type VolumeIdFn = Arc<
    dyn for<'a, 'b> Fn(&'a HitContext<'b>) -> RecorderResult<Arc<VolumeIdentity>> + Send + Sync,
>;

/// Compute function tagged with the type it produces
#[derive(Clone)]
pub enum ComputeFn {
    Double(DoubleFn),
    Int(IntFn),
    String(StringFn),
    Vector3(Vector3Fn),
    VolumeId(VolumeIdFn),
}

impl ComputeFn {
    pub fn value_type(&self) -> AttributeType {
        match self {
            Self::Double(_) => AttributeType::Double,
            Self::Int(_) => AttributeType::Int,
            Self::String(_) => AttributeType::String,
            Self::Vector3(_) => AttributeType::Vector3,
            Self::VolumeId(_) => AttributeType::VolumeId,
        }
    }

    pub fn compute(&self, hit: &HitContext<'_>) -> RecorderResult<AttributeValue> {
        Ok(match self {
            Self::Double(f) => AttributeValue::Double(f(hit)),
            Self::Int(f) => AttributeValue::Int(f(hit)),
            Self::String(f) => AttributeValue::String(f(hit)),
            Self::Vector3(f) => AttributeValue::Vector3(f(hit)),
            Self::VolumeId(f) => AttributeValue::VolumeId(f(hit)?),
        })
    }
}

impl fmt::Debug for ComputeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComputeFn<{}>", self.value_type())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTE KIND
// ═══════════════════════════════════════════════════════════════════════════════

/// Named, typed attribute definition
#[derive(Debug, Clone)]
pub struct AttributeKind {
    name: String,
    value_type: AttributeType,
    /// `None` for attributes filled explicitly by their owner
    compute: Option<ComputeFn>,
}

impl AttributeKind {
    pub fn new(name: &str, compute: ComputeFn) -> Self {
        Self {
            name: name.to_string(),
            value_type: compute.value_type(),
            compute: Some(compute),
        }
    }

    /// Attribute without compute function; values are pushed by the caller
    pub fn manual(name: &str, value_type: AttributeType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            compute: None,
        }
    }

    pub fn double<F>(name: &str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a HitContext<'b>) -> f64 + Send + Sync + 'static,
    {
        Self::new(name, ComputeFn::Double(Arc::new(f)))
    }

    pub fn int<F>(name: &str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a HitContext<'b>) -> i64 + Send + Sync + 'static,
    {
        Self::new(name, ComputeFn::Int(Arc::new(f)))
    }

    pub fn string<F>(name: &str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a HitContext<'b>) -> String + Send + Sync + 'static,
    {
        Self::new(name, ComputeFn::String(Arc::new(f)))
    }

    pub fn vector3<F>(name: &str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a HitContext<'b>) -> Vec3 + Send + Sync + 'static,
    {
        Self::new(name, ComputeFn::Vector3(Arc::new(f)))
    }

    pub fn volume_id<F>(name: &str, f: F) -> Self
    where
        F: for<'a, 'b> Fn(&'a HitContext<'b>) -> RecorderResult<Arc<VolumeIdentity>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, ComputeFn::VolumeId(Arc::new(f)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> AttributeType {
        self.value_type
    }

    pub fn is_computable(&self) -> bool {
        self.compute.is_some()
    }

    /// Evaluate the compute function on a hit
    pub fn compute(&self, hit: &HitContext<'_>) -> RecorderResult<AttributeValue> {
        match &self.compute {
            Some(f) => f.compute(hit),
            None => Err(RecorderError::NotComputable(self.name.clone())),
        }
    }

    /// Fresh, empty column bound to this kind
    pub fn new_column(&self) -> TypedColumn {
        TypedColumn::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepRecord;
    use crate::volume_id::VolumeIdentityManager;

    #[test]
    fn test_type_tags_and_field_counts() {
        let tags: String = AttributeType::all().iter().map(|t| t.tag()).collect();
        assert_eq!(tags, "DIS3U");
        assert_eq!(AttributeType::Vector3.field_count(), 3);
        assert_eq!(AttributeType::VolumeId.field_count(), 1);
    }

    #[test]
    fn test_kind_computes_its_type() {
        let kind = AttributeKind::double("Edep", |h| h.step.total_energy_deposit * 2.0);
        let step = StepRecord {
            total_energy_deposit: 1.5,
            ..Default::default()
        };
        let volumes = VolumeIdentityManager::new();
        let value = kind.compute(&HitContext::new(&step, &volumes)).unwrap();
        assert_eq!(value, AttributeValue::Double(3.0));
        assert_eq!(kind.value_type(), AttributeType::Double);
    }

    #[test]
    fn test_manual_kind_is_not_computable() {
        let kind = AttributeKind::manual("Theta", AttributeType::Double);
        let step = StepRecord::default();
        let volumes = VolumeIdentityManager::new();
        let result = kind.compute(&HitContext::new(&step, &volumes));
        assert!(matches!(result, Err(RecorderError::NotComputable(_))));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(
            AttributeValue::default_for(AttributeType::Vector3),
            AttributeValue::Vector3(Vec3::ZERO)
        );
        match AttributeValue::default_for(AttributeType::VolumeId) {
            AttributeValue::VolumeId(id) => assert_eq!(id.as_str(), ""),
            other => panic!("unexpected default {:?}", other),
        }
    }
}
