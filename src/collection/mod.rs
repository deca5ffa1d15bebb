//! # Collections
//!
//! A [`Collection`] is a named table of [`TypedColumn`]s living on one
//! thread. Every thread builds its own instance of each collection; the
//! instances agree on the output slot through the shared
//! [`TupleCoordinator`](crate::tuples::TupleCoordinator).
//!
//! ```text
//!  fill(hit) ──► columns (thread-local) ──flush_if_needed──► sink rows
//!                    │                                        │
//!          begin_of_event_index                        write() / close()
//! ```
//!
//! Non-persistent collections (no filename) are never written; their rows
//! only feed derived collections and are cleared on flush.

pub mod iterator;

pub use iterator::{CollectionIterator, TrackableValue, Tracked};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::attributes::{AttributeRegistry, AttributeValue, TypedColumn};
use crate::context::WorkerContext;
use crate::error::RecorderError;
use crate::step::HitContext;
use crate::tuples::{CollectionSchema, SlotId};
use crate::RecorderResult;

/// Named table of typed columns on one thread
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    slot: SlotId,
    filename: Option<PathBuf>,
    columns: Vec<TypedColumn>,
    index: HashMap<String, usize>,
    next_field_offset: usize,
    begin_of_event_index: usize,
    schema_ready: bool,
}

impl Collection {
    fn with_slot(name: &str, slot: SlotId) -> Self {
        Self {
            name: name.to_string(),
            slot,
            filename: None,
            columns: Vec::new(),
            index: HashMap::new(),
            next_field_offset: 0,
            begin_of_event_index: 0,
            schema_ready: false,
        }
    }

    /// Reserve a new output slot; fails if the name is taken
    pub fn declare(ctx: &WorkerContext, name: &str) -> RecorderResult<Self> {
        let slot = ctx.coordinator().declare_new_tuple(name)?;
        Ok(Self::with_slot(name, slot))
    }

    /// Thread-local instance of a collection declared elsewhere
    pub fn attach(ctx: &WorkerContext, name: &str) -> RecorderResult<Self> {
        let slot = ctx.coordinator().slot(name)?;
        Ok(Self::with_slot(name, slot))
    }

    /// Declare on the master, attach on workers
    pub fn for_thread(ctx: &WorkerContext, name: &str) -> RecorderResult<Self> {
        if ctx.is_master() {
            Self::declare(ctx, name)
        } else {
            Self::attach(ctx, name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    /// `None` disables persistence
    pub fn set_filename(&mut self, filename: Option<PathBuf>) {
        self.filename = filename;
    }

    pub fn is_persistent(&self) -> bool {
        self.filename.is_some()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Attributes
    // ───────────────────────────────────────────────────────────────────────────

    /// Attach registry columns by name, in order
    pub fn initialize_attributes<S: AsRef<str>>(
        &mut self,
        registry: &AttributeRegistry,
        names: &[S],
    ) -> RecorderResult<()> {
        for name in names {
            let name = name.as_ref();
            self.check_new_attribute(name)?;
            let column = registry.get(name)?;
            self.push_column(column);
        }
        Ok(())
    }

    /// Attach already built columns, e.g. kinds that are not registered
    pub fn initialize_columns<I>(&mut self, columns: I) -> RecorderResult<()>
    where
        I: IntoIterator<Item = TypedColumn>,
    {
        for column in columns {
            self.check_new_attribute(column.name())?;
            self.push_column(column.fresh_copy());
        }
        Ok(())
    }

    fn check_new_attribute(&self, name: &str) -> RecorderResult<()> {
        if self.index.contains_key(name) {
            return Err(RecorderError::DuplicateAttribute {
                collection: self.name.clone(),
                attribute: name.to_string(),
            });
        }
        Ok(())
    }

    fn push_column(&mut self, mut column: TypedColumn) {
        column.set_tuple_index(self.next_field_offset);
        self.next_field_offset += column.value_type().field_count();
        self.index.insert(column.name().to_string(), self.columns.len());
        self.columns.push(column);
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn columns(&self) -> &[TypedColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> RecorderResult<&TypedColumn> {
        match self.index.get(name) {
            Some(i) => Ok(&self.columns[*i]),
            None => Err(self.missing(name)),
        }
    }

    pub fn column_mut(&mut self, name: &str) -> RecorderResult<&mut TypedColumn> {
        match self.index.get(name) {
            Some(i) => Ok(&mut self.columns[*i]),
            None => Err(self.missing(name)),
        }
    }

    fn missing(&self, name: &str) -> RecorderError {
        RecorderError::MissingAttribute {
            collection: self.name.clone(),
            attribute: name.to_string(),
        }
    }

    /// Number of serialized fields, vectors counting three
    pub fn field_count(&self) -> usize {
        self.next_field_offset
    }

    /// Layout published to the other threads
    pub fn schema(&self) -> CollectionSchema {
        CollectionSchema {
            name: self.name.clone(),
            slot: self.slot,
            filename: self.filename.clone(),
            attributes: self.attribute_names(),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Output schema
    // ───────────────────────────────────────────────────────────────────────────

    /// Publish the layout and create the physical tuple, once
    pub fn create_output_schema_for_master(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        if self.schema_ready {
            return Ok(());
        }
        ctx.coordinator().publish_schema(self.schema())?;
        if self.is_persistent() {
            let first_run = ctx.is_first_run();
            ctx.writer_mut().create_schema(
                self.slot,
                &self.name,
                self.filename.as_deref(),
                &mut self.columns,
                first_run,
            )?;
        }
        self.schema_ready = true;
        Ok(())
    }

    /// Replicate the schema on a worker during its first run, then start a
    /// new event window at the current row count
    pub fn create_output_schema_for_worker(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        if !ctx.is_multithreaded() {
            return Ok(());
        }
        if ctx.is_first_run() && !self.schema_ready {
            let published = ctx.coordinator().schema(&self.name)?;
            if published.attributes != self.attribute_names() {
                return Err(RecorderError::InvalidParameter(format!(
                    "collection '{}' has attributes [{}] on {} but [{}] on the master",
                    self.name,
                    self.attribute_names().join(", "),
                    ctx.role(),
                    published.attributes.join(", ")
                )));
            }
            if self.is_persistent() {
                ctx.writer_mut().create_schema(
                    self.slot,
                    &self.name,
                    self.filename.as_deref(),
                    &mut self.columns,
                    true,
                )?;
            }
            self.schema_ready = true;
        }
        self.begin_of_event_index = self.len();
        Ok(())
    }

    pub fn is_schema_ready(&self) -> bool {
        self.schema_ready
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Rows
    // ───────────────────────────────────────────────────────────────────────────

    /// Append one row computed from a hit. Every value is computed before
    /// anything is appended, so a failure leaves the columns aligned.
    pub fn fill(&mut self, hit: &HitContext<'_>) -> RecorderResult<()> {
        let values = self
            .columns
            .iter()
            .map(|c| c.kind().compute(hit))
            .collect::<RecorderResult<Vec<_>>>()?;
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value)?;
        }
        Ok(())
    }

    /// Append one row given in column order. Nothing is appended unless
    /// every value matches its column type.
    pub fn push_row(&mut self, values: Vec<AttributeValue>) -> RecorderResult<()> {
        if values.len() != self.columns.len() {
            return Err(RecorderError::InvalidParameter(format!(
                "row of {} values for collection '{}' ({} columns)",
                values.len(),
                self.name,
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(&values) {
            if column.value_type() != value.value_type() {
                return Err(RecorderError::TypeMismatch {
                    attribute: column.name().to_string(),
                    expected: value.value_type(),
                    actual: column.value_type(),
                });
            }
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push(value)?;
        }
        Ok(())
    }

    /// Append one row of zero/empty values
    pub fn fill_with_default_values(&mut self) {
        for column in &mut self.columns {
            column.append_default();
        }
    }

    /// Append `input[index]` column by column, matching columns by name
    pub fn copy_row_from(&mut self, input: &Collection, index: usize) -> RecorderResult<()> {
        if index >= input.len() {
            return Err(RecorderError::InvalidParameter(format!(
                "row {} out of range for collection '{}' ({} rows)",
                index,
                input.name,
                input.len()
            )));
        }
        let sources = self
            .columns
            .iter()
            .map(|c| input.column(c.name()))
            .collect::<RecorderResult<Vec<_>>>()?;
        for (column, source) in self.columns.iter_mut().zip(sources) {
            column.copy_one_value(source, index)?;
        }
        Ok(())
    }

    /// Non-persistent: empty the buffer (`clear`) or move the event window
    /// past its end so the rows stay readable. Persistent: copy every
    /// buffered row to the sink and empty the buffer whatever `clear` says,
    /// so no row is ever copied twice. Returns the number of rows sent.
    pub fn flush_if_needed(&mut self, ctx: &mut WorkerContext, clear: bool) -> RecorderResult<usize> {
        if !self.is_persistent() {
            if clear {
                self.clear();
            } else {
                self.begin_of_event_index = self.len();
            }
            return Ok(0);
        }

        let rows = self.len();
        if rows == 0 {
            return Ok(0);
        }
        let writer = ctx.writer_mut();
        let tuple = writer.tuple_id(self.slot)?;
        for row in 0..rows {
            for column in &self.columns {
                column.serialize(row, tuple, writer.sink_mut())?;
            }
            writer.add_row(self.slot)?;
        }
        self.clear();
        log::debug!("[{}] {} rows of '{}' flushed", ctx.role(), rows, self.name);
        Ok(rows)
    }

    /// Ask the coordinator to persist this thread's tuples
    pub fn write(&self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        if self.is_persistent() && self.schema_ready {
            ctx.writer_mut().write(self.slot)?;
        }
        Ok(())
    }

    /// Release the output slot on this thread
    pub fn close(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        if self.is_persistent() {
            ctx.writer_mut().close_file(self.slot)?;
        }
        Ok(())
    }

    /// Empty every column and reset the event window
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.begin_of_event_index = 0;
    }

    pub fn len(&self) -> usize {
        self.columns.first().map(TypedColumn::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First row not yet seen by derived collections
    pub fn begin_of_event_index(&self) -> usize {
        self.begin_of_event_index
    }

    /// Move the event window to the current end of the buffer
    pub fn mark_event_boundary(&mut self) {
        self.begin_of_event_index = self.len();
    }

    pub fn iter(&self) -> CollectionIterator<'_> {
        CollectionIterator::new(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTION SET
// ═══════════════════════════════════════════════════════════════════════════════

/// The collections of one thread, by name
#[derive(Debug, Default)]
pub struct CollectionSet {
    collections: Vec<Collection>,
    index: HashMap<String, usize>,
}

impl CollectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: Collection) -> RecorderResult<()> {
        if self.index.contains_key(collection.name()) {
            return Err(RecorderError::DuplicateTuple(collection.name().to_string()));
        }
        self.index
            .insert(collection.name().to_string(), self.collections.len());
        self.collections.push(collection);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    fn position(&self, name: &str) -> RecorderResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| RecorderError::UnknownCollection(name.to_string()))
    }

    pub fn get(&self, name: &str) -> RecorderResult<&Collection> {
        Ok(&self.collections[self.position(name)?])
    }

    pub fn get_mut(&mut self, name: &str) -> RecorderResult<&mut Collection> {
        let i = self.position(name)?;
        Ok(&mut self.collections[i])
    }

    /// Borrow an input collection and a distinct output collection together
    pub fn pair_mut(&mut self, input: &str, output: &str) -> RecorderResult<(&Collection, &mut Collection)> {
        let (input, mut outputs) = self.split_mut(input, &[output])?;
        match outputs.pop() {
            Some(output) => Ok((input, output)),
            None => Err(RecorderError::UnknownCollection(output.to_string())),
        }
    }

    /// Borrow an input collection and several outputs, in the requested order
    pub fn split_mut<S: AsRef<str>>(
        &mut self,
        input: &str,
        outputs: &[S],
    ) -> RecorderResult<(&Collection, Vec<&mut Collection>)> {
        self.position(input)?;
        let mut wanted = Vec::with_capacity(outputs.len());
        for name in outputs {
            let name = name.as_ref();
            let i = self.position(name)?;
            if name == input || wanted.contains(&i) {
                return Err(RecorderError::InvalidParameter(format!(
                    "collection '{}' requested twice while splitting '{}'",
                    name, input
                )));
            }
            wanted.push(i);
        }

        let mut source: Option<&mut Collection> = None;
        let mut found: Vec<(usize, &mut Collection)> = Vec::with_capacity(wanted.len());
        for (i, collection) in self.collections.iter_mut().enumerate() {
            if collection.name() == input {
                source = Some(collection);
            } else if let Some(order) = wanted.iter().position(|w| *w == i) {
                found.push((order, collection));
            }
        }
        found.sort_by_key(|(order, _)| *order);
        let source: &Collection =
            source.ok_or_else(|| RecorderError::UnknownCollection(input.to_string()))?;
        Ok((source, found.into_iter().map(|(_, c)| c).collect()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.collections.iter().map(|c| c.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Collection> {
        self.collections.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeKind, AttributeType};
    use crate::context::{RecordingServices, ThreadRole};
    use crate::geometry::Vec3;
    use crate::sink::TupleStore;
    use crate::step::{StepPoint, StepRecord};
    use std::sync::Arc;

    fn master(threads: usize) -> (TupleStore, WorkerContext) {
        let store = TupleStore::in_memory();
        let services = RecordingServices::new(threads, Arc::new(store.clone()));
        (store, WorkerContext::master(services))
    }

    fn step(energy: f64, x: f64) -> StepRecord {
        StepRecord {
            total_energy_deposit: energy,
            post: StepPoint {
                position: Vec3::new(x, 0.0, 0.0),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn hits(ctx: &WorkerContext) -> Collection {
        let mut c = Collection::declare(ctx, "Hits").unwrap();
        c.initialize_attributes(
            ctx.registry(),
            &["TotalEnergyDeposit", "PostPosition", "EventID"],
        )
        .unwrap();
        c
    }

    #[test]
    fn test_declare_twice_fails() {
        let (_, ctx) = master(0);
        let _a = Collection::declare(&ctx, "Hits").unwrap();
        assert!(matches!(
            Collection::declare(&ctx, "Hits"),
            Err(RecorderError::DuplicateTuple(_))
        ));
    }

    #[test]
    fn test_attach_unknown_fails() {
        let (_, ctx) = master(0);
        assert!(matches!(
            Collection::attach(&ctx, "Nope"),
            Err(RecorderError::UnknownCollection(_))
        ));
    }

    #[test]
    fn test_duplicate_attribute_fails() {
        let (_, ctx) = master(0);
        let mut c = hits(&ctx);
        let err = c
            .initialize_attributes(ctx.registry(), &["EventID"])
            .unwrap_err();
        assert!(matches!(err, RecorderError::DuplicateAttribute { .. }));
        assert!(c.initialize_attributes(ctx.registry(), &["Bogus"]).is_err());
    }

    #[test]
    fn test_field_offsets_account_for_vectors() {
        let (_, ctx) = master(0);
        let c = hits(&ctx);
        let offsets: Vec<_> = c.columns().iter().map(|c| c.tuple_index()).collect();
        assert_eq!(offsets, vec![Some(0), Some(1), Some(4)]);
        assert_eq!(c.field_count(), 5);
    }

    #[test]
    fn test_columns_stay_aligned() {
        let (_, ctx) = master(0);
        let mut c = hits(&ctx);
        c.initialize_columns([AttributeKind::manual("Theta", AttributeType::Double).new_column()])
            .unwrap();
        let s = step(1.0, 2.0);
        let hit = HitContext::new(&s, ctx.volumes());

        // manual column cannot be computed: nothing appended
        assert!(c.fill(&hit).is_err());
        c.fill_with_default_values();
        c.fill_with_default_values();
        assert!(c.columns().iter().all(|col| col.len() == 2));
        c.clear();
        assert!(c.columns().iter().all(|col| col.is_empty()));
    }

    #[test]
    fn test_partial_flush_keeps_rows() {
        let (_, mut ctx) = master(0);
        let mut c = hits(&ctx);
        c.create_output_schema_for_master(&mut ctx).unwrap();
        for e in [1.0, 2.0, 3.0] {
            let s = step(e, 0.0);
            c.fill(&HitContext::new(&s, ctx.volumes())).unwrap();
        }

        c.flush_if_needed(&mut ctx, false).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.begin_of_event_index(), 3);
        let mut it = c.iter();
        it.goto_begin();
        assert!(it.is_at_end());
        it.goto(0);
        let energy = it.track::<f64>("TotalEnergyDeposit").unwrap();
        assert_eq!(it.value(&energy), Some(&1.0));

        c.flush_if_needed(&mut ctx, true).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.begin_of_event_index(), 0);
    }

    #[test]
    fn test_persistent_flush_moves_rows_to_sink() {
        let (store, mut ctx) = master(0);
        let mut c = hits(&ctx);
        c.set_filename(Some(PathBuf::from("hits.json")));
        c.create_output_schema_for_master(&mut ctx).unwrap();
        for e in [1.0, 2.0] {
            let s = step(e, e);
            c.fill(&HitContext::new(&s, ctx.volumes())).unwrap();
        }
        assert_eq!(c.flush_if_needed(&mut ctx, false).unwrap(), 2);
        assert!(c.is_empty());
        assert_eq!(c.begin_of_event_index(), 0);
        let s = step(3.0, 3.0);
        c.fill(&HitContext::new(&s, ctx.volumes())).unwrap();
        // rows sent earlier are never sent again
        assert_eq!(c.flush_if_needed(&mut ctx, false).unwrap(), 1);
        assert_eq!(c.flush_if_needed(&mut ctx, true).unwrap(), 0);
        assert!(c.is_empty());

        c.write(&mut ctx).unwrap();
        c.write(&mut ctx).unwrap();
        c.close(&mut ctx).unwrap();
        assert_eq!(store.physical_writes(), 1);

        let tuple = store.file("hits.json").unwrap().tuple("Hits").cloned().unwrap();
        assert_eq!(tuple.row_count(), 3);
        assert_eq!(tuple.doubles("PostPosition_X").unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_worker_schema_is_noop_single_threaded() {
        let (_, mut ctx) = master(0);
        let mut c = hits(&ctx);
        c.fill_with_default_values();
        c.create_output_schema_for_worker(&mut ctx).unwrap();
        assert_eq!(c.begin_of_event_index(), 0);
        assert!(!c.is_schema_ready());
    }

    #[test]
    fn test_worker_rebuilds_published_schema() {
        let store = TupleStore::in_memory();
        let services = RecordingServices::new(1, Arc::new(store.clone()));
        let mut m = WorkerContext::master(Arc::clone(&services));
        let mut on_master = hits(&m);
        on_master.set_filename(Some(PathBuf::from("hits.json")));
        on_master.create_output_schema_for_master(&mut m).unwrap();

        let mut w = WorkerContext::new(Arc::clone(&services), ThreadRole::Worker(0));
        w.begin_run();
        let mut on_worker = Collection::attach(&w, "Hits").unwrap();
        on_worker
            .initialize_attributes(w.registry(), &["TotalEnergyDeposit", "PostPosition", "EventID"])
            .unwrap();
        on_worker.set_filename(Some(PathBuf::from("hits.json")));
        on_worker.create_output_schema_for_worker(&mut w).unwrap();
        assert!(on_worker.is_schema_ready());
        assert_eq!(on_worker.slot(), on_master.slot());

        let mut wrong = Collection::attach(&w, "Hits").unwrap();
        wrong.initialize_attributes(w.registry(), &["EventID"]).unwrap();
        assert!(wrong.create_output_schema_for_worker(&mut w).is_err());
    }

    #[test]
    fn test_copy_row_from() {
        let (_, ctx) = master(0);
        let mut input = hits(&ctx);
        for e in [1.0, 2.0] {
            let s = step(e, e);
            input.fill(&HitContext::new(&s, ctx.volumes())).unwrap();
        }
        let mut output = Collection::declare(&ctx, "Window").unwrap();
        output
            .initialize_attributes(ctx.registry(), &["TotalEnergyDeposit", "PostPosition"])
            .unwrap();
        output.copy_row_from(&input, 1).unwrap();
        assert_eq!(output.column("TotalEnergyDeposit").unwrap().doubles().unwrap(), &[2.0]);
        assert!(output.copy_row_from(&input, 2).is_err());

        let mut extra = Collection::declare(&ctx, "Extra").unwrap();
        extra.initialize_attributes(ctx.registry(), &["GlobalTime"]).unwrap();
        assert!(matches!(
            extra.copy_row_from(&input, 0),
            Err(RecorderError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_push_row_is_all_or_nothing() {
        let (_, ctx) = master(0);
        let mut c = hits(&ctx);
        let wrong = vec![
            AttributeValue::Double(1.0),
            AttributeValue::Vector3(Vec3::ZERO),
            AttributeValue::Double(3.0),
        ];
        assert!(matches!(c.push_row(wrong), Err(RecorderError::TypeMismatch { .. })));
        assert!(c.push_row(vec![AttributeValue::Double(1.0)]).is_err());
        assert!(c.is_empty());

        c.push_row(vec![
            AttributeValue::Double(1.0),
            AttributeValue::Vector3(Vec3::new(1.0, 2.0, 3.0)),
            AttributeValue::Int(3),
        ])
        .unwrap();
        assert!(c.columns().iter().all(|col| col.len() == 1));
    }

    #[test]
    fn test_set_pair_mut() {
        let (_, ctx) = master(0);
        let mut set = CollectionSet::new();
        set.insert(hits(&ctx)).unwrap();
        set.insert(Collection::declare(&ctx, "Singles").unwrap()).unwrap();
        let (input, output) = set.pair_mut("Hits", "Singles").unwrap();
        assert_eq!(input.name(), "Hits");
        assert_eq!(output.name(), "Singles");
        let (input, output) = set.pair_mut("Singles", "Hits").unwrap();
        assert_eq!((input.name(), output.name()), ("Singles", "Hits"));
        assert!(set.pair_mut("Hits", "Hits").is_err());

        set.insert(Collection::declare(&ctx, "Low").unwrap()).unwrap();
        let (input, outputs) = set.split_mut("Hits", &["Low", "Singles"]).unwrap();
        assert_eq!(input.name(), "Hits");
        let names: Vec<&str> = outputs.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Low", "Singles"]);
        assert!(set.split_mut("Hits", &["Low", "Low"]).is_err());
        assert!(set.get("Nope").is_err());
    }
}
