//! Lock-step cursor over the columns of one collection

use std::sync::Arc;

use super::Collection;
use crate::attributes::TypedColumn;
use crate::geometry::Vec3;
use crate::volume_id::VolumeIdentity;
use crate::RecorderResult;

/// Value types a column can be tracked as
pub trait TrackableValue: Sized {
    fn column_slice(column: &TypedColumn) -> RecorderResult<&[Self]>;
}

impl TrackableValue for f64 {
    fn column_slice(column: &TypedColumn) -> RecorderResult<&[Self]> {
        column.doubles()
    }
}

impl TrackableValue for i64 {
    fn column_slice(column: &TypedColumn) -> RecorderResult<&[Self]> {
        column.ints()
    }
}

impl TrackableValue for String {
    fn column_slice(column: &TypedColumn) -> RecorderResult<&[Self]> {
        column.strings()
    }
}

impl TrackableValue for Vec3 {
    fn column_slice(column: &TypedColumn) -> RecorderResult<&[Self]> {
        column.vectors()
    }
}

impl TrackableValue for Arc<VolumeIdentity> {
    fn column_slice(column: &TypedColumn) -> RecorderResult<&[Self]> {
        column.volume_ids()
    }
}

/// A column bound to an iterator; read it with [`CollectionIterator::value`]
#[derive(Debug)]
pub struct Tracked<'a, T> {
    values: &'a [T],
}

/// Cursor shared by every tracked column of a collection
#[derive(Debug, Clone)]
pub struct CollectionIterator<'a> {
    collection: &'a Collection,
    index: usize,
}

impl<'a> CollectionIterator<'a> {
    /// Starts at the begin-of-event marker
    pub fn new(collection: &'a Collection) -> Self {
        let mut it = Self {
            collection,
            index: 0,
        };
        it.goto_begin();
        it
    }

    /// Bind a column by name; its type is checked here, once
    pub fn track<T: TrackableValue>(&self, name: &str) -> RecorderResult<Tracked<'a, T>> {
        let column = self.collection.column(name)?;
        Ok(Tracked {
            values: T::column_slice(column)?,
        })
    }

    /// Value of a tracked column at the current row
    pub fn value<T>(&self, tracked: &Tracked<'a, T>) -> Option<&'a T> {
        tracked.values.get(self.index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn goto(&mut self, index: usize) {
        self.index = index;
    }

    pub fn advance(&mut self) {
        self.index += 1;
    }

    pub fn goto_begin(&mut self) {
        self.index = self.collection.begin_of_event_index();
    }

    pub fn is_at_end(&self) -> bool {
        self.index >= self.collection.len()
    }

    pub fn reset(&mut self) {
        self.goto(0);
        self.goto_begin();
    }
}

impl Iterator for CollectionIterator<'_> {
    type Item = usize;

    /// Yields the current row index, then moves forward
    fn next(&mut self) -> Option<usize> {
        if self.is_at_end() {
            return None;
        }
        let current = self.index;
        self.advance();
        Some(current)
    }
}
