//! Cross-thread tuple coordination
//!
//! [`TupleCoordinator`] is shared: it hands out output slot ids, publishes the
//! schema of every declared collection so workers can rebuild it, and decides
//! once whether the sink must merge threads. [`TupleWriter`] is per-thread: it
//! owns the thread's sink, the tuple ids of its slots and the "ready" and
//! "written" flags that gate the single physical write of the thread.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::attributes::TypedColumn;
use crate::context::ThreadRole;
use crate::error::RecorderError;
use crate::sink::{TupleId, TupleSink};
use crate::RecorderResult;

/// Output slot of one collection, shared by every thread
pub type SlotId = usize;

/// Published layout of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub slot: SlotId,
    pub filename: Option<PathBuf>,
    pub attributes: Vec<String>,
}

#[derive(Debug, Default)]
struct SlotTable {
    ids: BTreeMap<String, SlotId>,
    next: SlotId,
    schemas: BTreeMap<String, CollectionSchema>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COORDINATOR (shared)
// ═══════════════════════════════════════════════════════════════════════════════

/// Process-wide slot table
#[derive(Debug)]
pub struct TupleCoordinator {
    slots: Mutex<SlotTable>,
    merge_across_threads: bool,
    merge_configured: AtomicBool,
}

impl TupleCoordinator {
    pub fn new(number_of_threads: usize) -> Self {
        Self {
            slots: Mutex::new(SlotTable::default()),
            merge_across_threads: number_of_threads > 0,
            merge_configured: AtomicBool::new(false),
        }
    }

    fn table(&self) -> MutexGuard<'_, SlotTable> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reserve the next slot id for `name`
    pub fn declare_new_tuple(&self, name: &str) -> RecorderResult<SlotId> {
        let mut table = self.table();
        if table.ids.contains_key(name) {
            return Err(RecorderError::DuplicateTuple(name.to_string()));
        }
        let slot = table.next;
        table.next += 1;
        table.ids.insert(name.to_string(), slot);
        log::debug!("Tuple '{}' declared with slot {}", name, slot);
        Ok(slot)
    }

    pub fn slot(&self, name: &str) -> RecorderResult<SlotId> {
        self.table()
            .ids
            .get(name)
            .copied()
            .ok_or_else(|| RecorderError::UnknownCollection(name.to_string()))
    }

    pub fn name_of(&self, slot: SlotId) -> RecorderResult<String> {
        self.table()
            .ids
            .iter()
            .find(|(_, s)| **s == slot)
            .map(|(name, _)| name.clone())
            .ok_or(RecorderError::UnknownSlot(slot))
    }

    /// Declared names, in slot order
    pub fn declared_names(&self) -> Vec<String> {
        let table = self.table();
        let mut names: Vec<(SlotId, String)> =
            table.ids.iter().map(|(n, s)| (*s, n.clone())).collect();
        names.sort();
        names.into_iter().map(|(_, n)| n).collect()
    }

    /// Make a collection's layout available to the other threads
    pub fn publish_schema(&self, schema: CollectionSchema) -> RecorderResult<()> {
        let mut table = self.table();
        if table.ids.get(&schema.name) != Some(&schema.slot) {
            return Err(RecorderError::UnknownCollection(schema.name));
        }
        table.schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    pub fn schema(&self, name: &str) -> RecorderResult<CollectionSchema> {
        self.table()
            .schemas
            .get(name)
            .cloned()
            .ok_or_else(|| RecorderError::UnknownCollection(name.to_string()))
    }

    pub fn merges_across_threads(&self) -> bool {
        self.merge_across_threads
    }

    /// Whether this caller is the one allowed to switch the sink to merge
    /// mode: the master, during its first run, before any file was opened
    /// with merging configured. Granted at most once.
    fn claim_merge_configuration(&self, role: ThreadRole, first_run: bool) -> bool {
        self.merge_across_threads
            && role.is_master()
            && first_run
            && self
                .merge_configured
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRITER (per thread)
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-thread side of the coordinator
pub struct TupleWriter {
    role: ThreadRole,
    coordinator: Arc<TupleCoordinator>,
    sink: Box<dyn TupleSink>,
    tuples: BTreeMap<SlotId, TupleId>,
    /// Live slots per open file
    open_files: BTreeMap<PathBuf, BTreeSet<SlotId>>,
    slot_files: BTreeMap<SlotId, PathBuf>,
    ready: BTreeSet<SlotId>,
    written: bool,
}

impl std::fmt::Debug for TupleWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TupleWriter")
            .field("role", &self.role)
            .field("tuples", &self.tuples)
            .field("open_files", &self.open_files)
            .field("ready", &self.ready)
            .field("written", &self.written)
            .finish()
    }
}

impl TupleWriter {
    pub fn new(role: ThreadRole, coordinator: Arc<TupleCoordinator>, sink: Box<dyn TupleSink>) -> Self {
        Self {
            role,
            coordinator,
            sink,
            tuples: BTreeMap::new(),
            open_files: BTreeMap::new(),
            slot_files: BTreeMap::new(),
            ready: BTreeSet::new(),
            written: false,
        }
    }

    pub fn role(&self) -> ThreadRole {
        self.role
    }

    /// Open `filename` for `slot`; the file is physically opened once
    pub fn open_file(&mut self, slot: SlotId, filename: &Path, first_run: bool) -> RecorderResult<()> {
        if self.coordinator.claim_merge_configuration(self.role, first_run) {
            self.sink.set_merge_mode(true)?;
            log::info!("Tuple merging across threads enabled");
        }
        let live = self.open_files.entry(filename.to_path_buf()).or_default();
        if live.is_empty() {
            self.sink.open(filename)?;
            log::info!("[{}] output file {} opened", self.role, filename.display());
        }
        live.insert(slot);
        self.slot_files.insert(slot, filename.to_path_buf());
        Ok(())
    }

    /// Create the physical tuple of a collection and assign the field ids of
    /// its columns. Creating it again on the same thread keeps the first one.
    pub fn create_schema(
        &mut self,
        slot: SlotId,
        name: &str,
        filename: Option<&Path>,
        columns: &mut [TypedColumn],
        first_run: bool,
    ) -> RecorderResult<TupleId> {
        let filename = filename.ok_or_else(|| RecorderError::MissingOutputFile(name.to_string()))?;
        if columns.is_empty() {
            return Err(RecorderError::EmptySchema(name.to_string()));
        }
        if let Some(tuple) = self.tuples.get(&slot) {
            log::debug!("[{}] schema of '{}' already created", self.role, name);
            return Ok(*tuple);
        }

        self.open_file(slot, filename, first_run)?;
        let tuple = self.sink.create_tuple(name, name)?;
        for column in columns.iter_mut() {
            let ids = column
                .field_layout()
                .into_iter()
                .map(|(field, field_type)| self.sink.create_field(tuple, &field, field_type))
                .collect::<RecorderResult<Vec<_>>>()?;
            column.set_field_ids(ids);
        }
        self.sink.bind_file(tuple, filename)?;
        self.tuples.insert(slot, tuple);
        log::info!(
            "[{}] schema of '{}' created with {} columns in {}",
            self.role,
            name,
            columns.len(),
            filename.display()
        );
        Ok(tuple)
    }

    pub fn tuple_id(&self, slot: SlotId) -> RecorderResult<TupleId> {
        self.tuples
            .get(&slot)
            .copied()
            .ok_or(RecorderError::UnknownSlot(slot))
    }

    pub fn has_schema(&self, slot: SlotId) -> bool {
        self.tuples.contains_key(&slot)
    }

    pub fn sink_mut(&mut self) -> &mut dyn TupleSink {
        self.sink.as_mut()
    }

    /// Signal that the current row of `slot` is complete
    pub fn add_row(&mut self, slot: SlotId) -> RecorderResult<()> {
        let tuple = self.tuple_id(slot)?;
        self.sink.add_row(tuple)
    }

    /// Mark `slot` ready. The physical write happens once every slot of this
    /// thread is ready, and only once per thread. Returns whether this call
    /// performed it.
    pub fn write(&mut self, slot: SlotId) -> RecorderResult<bool> {
        self.tuple_id(slot)?;
        if self.written {
            log::debug!("[{}] write of slot {} ignored, already written", self.role, slot);
            return Ok(false);
        }
        self.ready.insert(slot);
        if !self.tuples.keys().all(|s| self.ready.contains(s)) {
            return Ok(false);
        }
        self.sink.write()?;
        self.written = true;
        log::info!("[{}] {} tuple(s) written", self.role, self.tuples.len());
        Ok(true)
    }

    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Drop `slot` from its file; the file closes with its last slot
    pub fn close_file(&mut self, slot: SlotId) -> RecorderResult<()> {
        let Some(filename) = self.slot_files.remove(&slot) else {
            log::debug!("[{}] slot {} has no open file", self.role, slot);
            return Ok(());
        };
        let now_empty = match self.open_files.get_mut(&filename) {
            Some(live) => {
                live.remove(&slot);
                live.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.open_files.remove(&filename);
            self.sink.close(&filename)?;
            log::info!("[{}] output file {} closed", self.role, filename.display());
        }
        Ok(())
    }

    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }
}
