//! Typed column: the per-thread buffer of one attribute inside a collection

use std::sync::Arc;

use super::{AttributeKind, AttributeType, AttributeValue};
use crate::error::RecorderError;
use crate::geometry::Vec3;
use crate::sink::{FieldId, FieldType, FieldValue, TupleId, TupleSink};
use crate::step::HitContext;
use crate::volume_id::VolumeIdentity;
use crate::RecorderResult;

/// Append-only storage of one column, one variant per value type
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Double(Vec<f64>),
    Int(Vec<i64>),
    String(Vec<String>),
    Vector3(Vec<Vec3>),
    VolumeId(Vec<Arc<VolumeIdentity>>),
}

impl ColumnData {
    pub fn empty(value_type: AttributeType) -> Self {
        match value_type {
            AttributeType::Double => Self::Double(Vec::new()),
            AttributeType::Int => Self::Int(Vec::new()),
            AttributeType::String => Self::String(Vec::new()),
            AttributeType::Vector3 => Self::Vector3(Vec::new()),
            AttributeType::VolumeId => Self::VolumeId(Vec::new()),
        }
    }

    pub fn value_type(&self) -> AttributeType {
        match self {
            Self::Double(_) => AttributeType::Double,
            Self::Int(_) => AttributeType::Int,
            Self::String(_) => AttributeType::String,
            Self::Vector3(_) => AttributeType::Vector3,
            Self::VolumeId(_) => AttributeType::VolumeId,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Double(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::String(v) => v.len(),
            Self::Vector3(v) => v.len(),
            Self::VolumeId(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self) {
        match self {
            Self::Double(v) => v.clear(),
            Self::Int(v) => v.clear(),
            Self::String(v) => v.clear(),
            Self::Vector3(v) => v.clear(),
            Self::VolumeId(v) => v.clear(),
        }
    }

    /// Append a value, handing it back when its type does not match
    fn push(&mut self, value: AttributeValue) -> Result<(), AttributeValue> {
        match (self, value) {
            (Self::Double(v), AttributeValue::Double(x)) => v.push(x),
            (Self::Int(v), AttributeValue::Int(x)) => v.push(x),
            (Self::String(v), AttributeValue::String(x)) => v.push(x),
            (Self::Vector3(v), AttributeValue::Vector3(x)) => v.push(x),
            (Self::VolumeId(v), AttributeValue::VolumeId(x)) => v.push(x),
            (_, value) => return Err(value),
        }
        Ok(())
    }

    fn get(&self, index: usize) -> Option<AttributeValue> {
        match self {
            Self::Double(v) => v.get(index).map(|x| AttributeValue::Double(*x)),
            Self::Int(v) => v.get(index).map(|x| AttributeValue::Int(*x)),
            Self::String(v) => v.get(index).map(|x| AttributeValue::String(x.clone())),
            Self::Vector3(v) => v.get(index).map(|x| AttributeValue::Vector3(*x)),
            Self::VolumeId(v) => v.get(index).map(|x| AttributeValue::VolumeId(Arc::clone(x))),
        }
    }
}

/// One attribute of a collection on one thread
#[derive(Debug, Clone)]
pub struct TypedColumn {
    kind: AttributeKind,
    data: ColumnData,
    /// Offset of the first serialized field of this column in the row layout
    tuple_index: Option<usize>,
    /// Sink field ids, three for vectors
    field_ids: Vec<FieldId>,
}

impl TypedColumn {
    pub fn new(kind: AttributeKind) -> Self {
        let data = ColumnData::empty(kind.value_type());
        Self {
            kind,
            data,
            tuple_index: None,
            field_ids: Vec::new(),
        }
    }

    /// Empty column of the same kind, without layout information
    pub fn fresh_copy(&self) -> Self {
        Self::new(self.kind.clone())
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn value_type(&self) -> AttributeType {
        self.kind.value_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Compute the value of this attribute for a hit and append it
    pub fn append(&mut self, hit: &HitContext<'_>) -> RecorderResult<()> {
        let value = self.kind.compute(hit)?;
        self.push(value)
    }

    /// Append the zero/empty value of the column type
    pub fn append_default(&mut self) {
        let value = AttributeValue::default_for(self.value_type());
        // default_for always matches the column type
        let _ = self.data.push(value);
    }

    /// Append an explicit value
    pub fn push(&mut self, value: AttributeValue) -> RecorderResult<()> {
        let column_type = self.value_type();
        self.data.push(value).map_err(|v| RecorderError::TypeMismatch {
            attribute: self.name().to_string(),
            expected: v.value_type(),
            actual: column_type,
        })
    }

    pub fn push_double(&mut self, value: f64) -> RecorderResult<()> {
        self.push(AttributeValue::Double(value))
    }

    pub fn push_int(&mut self, value: i64) -> RecorderResult<()> {
        self.push(AttributeValue::Int(value))
    }

    pub fn push_vector3(&mut self, value: Vec3) -> RecorderResult<()> {
        self.push(AttributeValue::Vector3(value))
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// The whole thread-local buffer
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    fn mismatch(&self, expected: AttributeType) -> RecorderError {
        RecorderError::TypeMismatch {
            attribute: self.name().to_string(),
            expected,
            actual: self.value_type(),
        }
    }

    pub fn doubles(&self) -> RecorderResult<&[f64]> {
        match &self.data {
            ColumnData::Double(v) => Ok(v),
            _ => Err(self.mismatch(AttributeType::Double)),
        }
    }

    pub fn ints(&self) -> RecorderResult<&[i64]> {
        match &self.data {
            ColumnData::Int(v) => Ok(v),
            _ => Err(self.mismatch(AttributeType::Int)),
        }
    }

    pub fn strings(&self) -> RecorderResult<&[String]> {
        match &self.data {
            ColumnData::String(v) => Ok(v),
            _ => Err(self.mismatch(AttributeType::String)),
        }
    }

    pub fn vectors(&self) -> RecorderResult<&[Vec3]> {
        match &self.data {
            ColumnData::Vector3(v) => Ok(v),
            _ => Err(self.mismatch(AttributeType::Vector3)),
        }
    }

    pub fn volume_ids(&self) -> RecorderResult<&[Arc<VolumeIdentity>]> {
        match &self.data {
            ColumnData::VolumeId(v) => Ok(v),
            _ => Err(self.mismatch(AttributeType::VolumeId)),
        }
    }

    /// Value at a row, whatever its type
    pub fn value(&self, index: usize) -> Option<AttributeValue> {
        self.data.get(index)
    }

    /// Append `other[index]` to this column
    pub fn copy_one_value(&mut self, other: &TypedColumn, index: usize) -> RecorderResult<()> {
        if other.value_type() != self.value_type() {
            return Err(RecorderError::TypeMismatch {
                attribute: other.name().to_string(),
                expected: self.value_type(),
                actual: other.value_type(),
            });
        }
        let value = other.value(index).ok_or_else(|| {
            RecorderError::InvalidParameter(format!(
                "row {} out of range for attribute '{}' ({} rows)",
                index,
                other.name(),
                other.len()
            ))
        })?;
        self.push(value)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Output layout
    // ───────────────────────────────────────────────────────────────────────────

    pub fn tuple_index(&self) -> Option<usize> {
        self.tuple_index
    }

    pub fn set_tuple_index(&mut self, index: usize) {
        self.tuple_index = Some(index);
    }

    /// Physical fields this column needs: `(name, type)` in creation order
    pub fn field_layout(&self) -> Vec<(String, FieldType)> {
        let name = self.name();
        match self.value_type() {
            AttributeType::Double => vec![(name.to_string(), FieldType::Double)],
            AttributeType::Int => vec![(name.to_string(), FieldType::Int)],
            AttributeType::String | AttributeType::VolumeId => {
                vec![(name.to_string(), FieldType::String)]
            }
            AttributeType::Vector3 => ["X", "Y", "Z"]
                .iter()
                .map(|axis| (format!("{}_{}", name, axis), FieldType::Double))
                .collect(),
        }
    }

    pub fn field_ids(&self) -> &[FieldId] {
        &self.field_ids
    }

    pub fn set_field_ids(&mut self, ids: Vec<FieldId>) {
        self.field_ids = ids;
    }

    /// Write the value at `row` into the sink at this column's field(s)
    pub fn serialize(
        &self,
        row: usize,
        tuple: TupleId,
        sink: &mut dyn TupleSink,
    ) -> RecorderResult<()> {
        if self.field_ids.len() != self.value_type().field_count() {
            return Err(RecorderError::Sink(format!(
                "attribute '{}' has no output fields",
                self.name()
            )));
        }
        let out_of_range = || {
            RecorderError::InvalidParameter(format!(
                "row {} out of range for attribute '{}'",
                row,
                self.name()
            ))
        };
        match &self.data {
            ColumnData::Double(v) => {
                let x = *v.get(row).ok_or_else(out_of_range)?;
                sink.fill_field(tuple, self.field_ids[0], FieldValue::Double(x))
            }
            ColumnData::Int(v) => {
                let x = *v.get(row).ok_or_else(out_of_range)?;
                sink.fill_field(tuple, self.field_ids[0], FieldValue::Int(x))
            }
            ColumnData::String(v) => {
                let x = v.get(row).ok_or_else(out_of_range)?;
                sink.fill_field(tuple, self.field_ids[0], FieldValue::String(x.clone()))
            }
            ColumnData::Vector3(v) => {
                let x = v.get(row).ok_or_else(out_of_range)?;
                for (field, component) in self.field_ids.iter().zip(x.to_array()) {
                    sink.fill_field(tuple, *field, FieldValue::Double(component))?;
                }
                Ok(())
            }
            ColumnData::VolumeId(v) => {
                let x = v.get(row).ok_or_else(out_of_range)?;
                sink.fill_field(
                    tuple,
                    self.field_ids[0],
                    FieldValue::String(x.as_str().to_string()),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepRecord;
    use crate::volume_id::VolumeIdentityManager;

    fn energy_column() -> TypedColumn {
        AttributeKind::double("TotalEnergyDeposit", |h| h.step.total_energy_deposit).new_column()
    }

    #[test]
    fn test_append_and_clear() {
        let mut column = energy_column();
        let volumes = VolumeIdentityManager::new();
        for e in [0.1, 0.2, 0.3] {
            let step = StepRecord {
                total_energy_deposit: e,
                ..Default::default()
            };
            column.append(&HitContext::new(&step, &volumes)).unwrap();
        }
        assert_eq!(column.doubles().unwrap(), &[0.1, 0.2, 0.3]);
        column.clear();
        assert!(column.is_empty());
    }

    #[test]
    fn test_wrong_accessor_fails_loudly() {
        let column = energy_column();
        let err = column.strings().unwrap_err();
        assert!(matches!(
            err,
            RecorderError::TypeMismatch {
                expected: AttributeType::String,
                actual: AttributeType::Double,
                ..
            }
        ));
    }

    #[test]
    fn test_push_wrong_type_fails() {
        let mut column = energy_column();
        assert!(column.push_int(3).is_err());
        assert!(column.is_empty());
    }

    #[test]
    fn test_copy_one_value() {
        let mut source = energy_column();
        source.push_double(1.0).unwrap();
        source.push_double(2.0).unwrap();
        let mut target = source.fresh_copy();
        target.copy_one_value(&source, 1).unwrap();
        assert_eq!(target.doubles().unwrap(), &[2.0]);
        assert!(target.copy_one_value(&source, 5).is_err());

        let mut ints = AttributeKind::manual("EventID", AttributeType::Int).new_column();
        assert!(ints.copy_one_value(&source, 0).is_err());
    }

    #[test]
    fn test_append_default_keeps_type() {
        let mut column = AttributeKind::manual("Position", AttributeType::Vector3).new_column();
        column.append_default();
        assert_eq!(column.vectors().unwrap(), &[Vec3::ZERO]);
    }

    #[test]
    fn test_vector_field_layout() {
        let column = AttributeKind::manual("PostPosition", AttributeType::Vector3).new_column();
        let names: Vec<String> = column.field_layout().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["PostPosition_X", "PostPosition_Y", "PostPosition_Z"]);
    }
}
