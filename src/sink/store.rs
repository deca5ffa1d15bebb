//! In-process tuple store with optional JSON persistence
//!
//! One [`TupleStore`] is shared by the whole simulation; each thread gets its
//! own [`StoreSink`]. Rows stay in the sink until its `write()`, which moves
//! them into the store:
//!
//! ```text
//!   merge mode on :  every thread ──► file.json  (one logical tuple)
//!   merge mode off:  master       ──► file.json
//!                    worker i     ──► file_t<i>.json
//! ```
//!
//! Stores created with [`TupleStore::on_disk`] rewrite each touched file after
//! every physical write, so a file always holds everything written so far.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{FieldId, FieldType, FieldValue, TupleId, TupleSink};
use crate::context::ThreadRole;
use crate::error::RecorderError;
use crate::RecorderResult;

// ═══════════════════════════════════════════════════════════════════════════════
// STORED DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Declared field of a tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// One persisted tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredTuple {
    pub name: String,
    pub title: String,
    pub fields: Vec<FieldSpec>,
    pub rows: Vec<Vec<FieldValue>>,
}

impl StoredTuple {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// All values of one field, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&FieldValue>> {
        let index = self.field_index(name)?;
        self.rows.iter().map(|row| row.get(index)).collect()
    }

    pub fn doubles(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name)?.into_iter().map(|v| v.as_f64()).collect()
    }

    pub fn ints(&self, name: &str) -> Option<Vec<i64>> {
        self.column(name)?.into_iter().map(|v| v.as_i64()).collect()
    }

    pub fn strings(&self, name: &str) -> Option<Vec<String>> {
        self.column(name)?
            .into_iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    fn coerce(&mut self) {
        let types: Vec<FieldType> = self.fields.iter().map(|f| f.field_type).collect();
        for row in &mut self.rows {
            for (value, field_type) in row.iter_mut().zip(&types) {
                let v = std::mem::replace(value, FieldValue::Int(0));
                *value = v.coerce(*field_type);
            }
        }
    }
}

/// Content of one output file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub tuples: Vec<StoredTuple>,
}

impl StoredFile {
    pub fn tuple(&self, name: &str) -> Option<&StoredTuple> {
        self.tuples.iter().find(|t| t.name == name)
    }

    pub fn tuple_names(&self) -> Vec<&str> {
        self.tuples.iter().map(|t| t.name.as_str()).collect()
    }

    fn tuple_entry(&mut self, local: &LocalTuple) -> RecorderResult<&mut StoredTuple> {
        let index = match self.tuples.iter().position(|t| t.name == local.name) {
            Some(i) => {
                if self.tuples[i].fields != local.fields {
                    return Err(RecorderError::Sink(format!(
                        "tuple '{}' is written with two different layouts",
                        local.name
                    )));
                }
                i
            }
            None => {
                self.tuples.push(StoredTuple {
                    name: local.name.clone(),
                    title: local.title.clone(),
                    fields: local.fields.clone(),
                    rows: Vec::new(),
                });
                self.tuples.len() - 1
            }
        };
        Ok(&mut self.tuples[index])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct StoreState {
    merge: bool,
    merge_configurations: usize,
    files: BTreeMap<PathBuf, StoredFile>,
    physical_writes: usize,
    opens: usize,
    closes: usize,
}

/// Shared backend handing out one [`StoreSink`] per thread
#[derive(Debug, Clone)]
pub struct TupleStore {
    inner: Arc<Mutex<StoreState>>,
    persist: bool,
}

impl TupleStore {
    /// Keep every tuple in memory only
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreState::default())),
            persist: false,
        }
    }

    /// Also write each touched file as JSON on every physical write
    pub fn on_disk() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreState::default())),
            persist: true,
        }
    }

    /// Sink for one thread
    pub fn sink(&self, role: ThreadRole) -> StoreSink {
        StoreSink {
            store: self.clone(),
            role,
            tuples: Vec::new(),
            open_files: BTreeSet::new(),
            current_file: None,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of a stored file
    pub fn file(&self, path: impl AsRef<Path>) -> Option<StoredFile> {
        self.state().files.get(path.as_ref()).cloned()
    }

    /// Every file written so far
    pub fn files(&self) -> Vec<PathBuf> {
        self.state().files.keys().cloned().collect()
    }

    pub fn physical_writes(&self) -> usize {
        self.state().physical_writes
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }

    pub fn merge_enabled(&self) -> bool {
        self.state().merge
    }

    /// Read a file persisted by an on-disk store
    pub fn load(path: impl AsRef<Path>) -> RecorderResult<StoredFile> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut file: StoredFile = serde_json::from_str(&content)
            .map_err(|e| RecorderError::Serialization(e.to_string()))?;
        for tuple in &mut file.tuples {
            tuple.coerce();
        }
        Ok(file)
    }

    fn persist_file(path: &Path, file: &StoredFile) -> RecorderResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(file)
            .map_err(|e| RecorderError::Serialization(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Name of the file a non-merging worker writes to: `hits.json` → `hits_t3.json`
pub fn per_thread_path(path: &Path, worker: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_t{}.{}", stem, worker, ext.to_string_lossy()),
        None => format!("{}_t{}", stem, worker),
    };
    path.with_file_name(name)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PER-THREAD SINK
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct LocalTuple {
    name: String,
    title: String,
    fields: Vec<FieldSpec>,
    file: Option<PathBuf>,
    current: Vec<Option<FieldValue>>,
    rows: Vec<Vec<FieldValue>>,
}

/// Per-thread handle on a [`TupleStore`]
#[derive(Debug)]
pub struct StoreSink {
    store: TupleStore,
    role: ThreadRole,
    tuples: Vec<LocalTuple>,
    open_files: BTreeSet<PathBuf>,
    /// Most recently opened file, the default target of new tuples
    current_file: Option<PathBuf>,
}

impl StoreSink {
    fn tuple_mut(&mut self, tuple: TupleId) -> RecorderResult<&mut LocalTuple> {
        self.tuples
            .get_mut(tuple)
            .ok_or_else(|| RecorderError::Sink(format!("unknown tuple id {}", tuple)))
    }

    /// Rows filled but not yet written, over all tuples
    pub fn pending_rows(&self) -> usize {
        self.tuples.iter().map(|t| t.rows.len()).sum()
    }
}

impl TupleSink for StoreSink {
    fn open(&mut self, filename: &Path) -> RecorderResult<()> {
        if self.open_files.insert(filename.to_path_buf()) {
            self.store.state().opens += 1;
            log::debug!("[{}] opened {}", self.role, filename.display());
        }
        self.current_file = Some(filename.to_path_buf());
        Ok(())
    }

    fn set_merge_mode(&mut self, merge: bool) -> RecorderResult<()> {
        let mut state = self.store.state();
        if state.merge_configurations > 0 {
            log::warn!("Tuple merging is configured more than once");
        }
        state.merge = merge;
        state.merge_configurations += 1;
        Ok(())
    }

    fn create_tuple(&mut self, name: &str, title: &str) -> RecorderResult<TupleId> {
        self.tuples.push(LocalTuple {
            name: name.to_string(),
            title: title.to_string(),
            fields: Vec::new(),
            file: self.current_file.clone(),
            current: Vec::new(),
            rows: Vec::new(),
        });
        Ok(self.tuples.len() - 1)
    }

    fn create_field(
        &mut self,
        tuple: TupleId,
        name: &str,
        field_type: FieldType,
    ) -> RecorderResult<FieldId> {
        let t = self.tuple_mut(tuple)?;
        if !t.rows.is_empty() {
            return Err(RecorderError::Sink(format!(
                "cannot add field '{}' to tuple '{}' after rows were added",
                name, t.name
            )));
        }
        t.fields.push(FieldSpec {
            name: name.to_string(),
            field_type,
        });
        t.current.push(None);
        Ok(t.fields.len() - 1)
    }

    fn bind_file(&mut self, tuple: TupleId, filename: &Path) -> RecorderResult<()> {
        self.tuple_mut(tuple)?.file = Some(filename.to_path_buf());
        Ok(())
    }

    fn fill_field(
        &mut self,
        tuple: TupleId,
        field: FieldId,
        value: FieldValue,
    ) -> RecorderResult<()> {
        let t = self.tuple_mut(tuple)?;
        let spec = t.fields.get(field).ok_or_else(|| {
            RecorderError::Sink(format!("unknown field {} in tuple '{}'", field, t.name))
        })?;
        if spec.field_type != value.field_type() {
            return Err(RecorderError::Sink(format!(
                "field '{}' of tuple '{}' is {:?}, got {:?}",
                spec.name,
                t.name,
                spec.field_type,
                value.field_type()
            )));
        }
        if let FieldValue::Double(v) = &value {
            if !v.is_finite() {
                return Err(RecorderError::Sink(format!(
                    "field '{}' of tuple '{}' got non-finite value {}",
                    spec.name, t.name, v
                )));
            }
        }
        t.current[field] = Some(value);
        Ok(())
    }

    fn add_row(&mut self, tuple: TupleId) -> RecorderResult<()> {
        let t = self.tuple_mut(tuple)?;
        let row = t
            .current
            .iter_mut()
            .zip(&t.fields)
            .map(|(slot, spec)| {
                slot.take().unwrap_or(match spec.field_type {
                    FieldType::Double => FieldValue::Double(0.0),
                    FieldType::Int => FieldValue::Int(0),
                    FieldType::String => FieldValue::String(String::new()),
                })
            })
            .collect();
        t.rows.push(row);
        Ok(())
    }

    fn write(&mut self) -> RecorderResult<()> {
        let persist = self.store.persist;
        let mut state = self.store.state();
        state.physical_writes += 1;
        let merge = state.merge;

        let mut touched = BTreeSet::new();
        for local in &mut self.tuples {
            let file = local.file.clone().ok_or_else(|| {
                RecorderError::Sink(format!("tuple '{}' is not bound to a file", local.name))
            })?;
            let target = match self.role {
                ThreadRole::Worker(id) if !merge => per_thread_path(&file, id),
                _ => file,
            };
            let stored = state.files.entry(target.clone()).or_default();
            let entry = stored.tuple_entry(local)?;
            let rows = std::mem::take(&mut local.rows);
            let n = rows.len();
            entry.rows.extend(rows);
            log::debug!(
                "[{}] wrote {} rows of '{}' to {}",
                self.role,
                n,
                local.name,
                target.display()
            );
            touched.insert(target);
        }

        if persist {
            for path in &touched {
                if let Some(file) = state.files.get(path) {
                    TupleStore::persist_file(path, file)?;
                }
            }
        }
        log::info!(
            "[{}] physical write of {} tuple(s) to {} file(s)",
            self.role,
            self.tuples.len(),
            touched.len()
        );
        Ok(())
    }

    fn close(&mut self, filename: &Path) -> RecorderResult<()> {
        if self.open_files.remove(filename) {
            self.store.state().closes += 1;
            log::debug!("[{}] closed {}", self.role, filename.display());
        } else {
            log::warn!("[{}] {} closed but not open", self.role, filename.display());
        }
        if self.current_file.as_deref() == Some(filename) {
            self.current_file = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn energy_tuple(sink: &mut StoreSink, file: &Path) -> TupleId {
        sink.open(file).unwrap();
        let t = sink.create_tuple("Hits", "Hits").unwrap();
        sink.create_field(t, "TotalEnergyDeposit", FieldType::Double)
            .unwrap();
        sink.create_field(t, "EventID", FieldType::Int).unwrap();
        sink.bind_file(t, file).unwrap();
        t
    }

    #[test]
    fn test_rows_reach_store_on_write() {
        let store = TupleStore::in_memory();
        let mut sink = store.sink(ThreadRole::Master);
        let file = PathBuf::from("hits.json");
        let t = energy_tuple(&mut sink, &file);

        sink.fill_field(t, 0, FieldValue::Double(0.14)).unwrap();
        sink.fill_field(t, 1, FieldValue::Int(3)).unwrap();
        sink.add_row(t).unwrap();
        assert!(store.file(&file).is_none());

        sink.write().unwrap();
        let stored = store.file(&file).unwrap();
        let hits = stored.tuple("Hits").unwrap();
        assert_eq!(hits.row_count(), 1);
        assert_eq!(hits.doubles("TotalEnergyDeposit").unwrap(), vec![0.14]);
        assert_eq!(hits.ints("EventID").unwrap(), vec![3]);
        assert_eq!(store.physical_writes(), 1);
    }

    #[test]
    fn test_fill_wrong_type_fails() {
        let store = TupleStore::in_memory();
        let mut sink = store.sink(ThreadRole::Master);
        let t = energy_tuple(&mut sink, Path::new("hits.json"));
        assert!(sink.fill_field(t, 1, FieldValue::Double(1.0)).is_err());
        assert!(sink.fill_field(t, 9, FieldValue::Int(1)).is_err());
    }

    #[test]
    fn test_non_finite_double_is_rejected() {
        let store = TupleStore::in_memory();
        let mut sink = store.sink(ThreadRole::Master);
        let t = energy_tuple(&mut sink, Path::new("hits.json"));
        assert!(sink.fill_field(t, 0, FieldValue::Double(f64::NAN)).is_err());
        assert!(sink.fill_field(t, 0, FieldValue::Double(f64::INFINITY)).is_err());
        sink.add_row(t).unwrap();
        sink.write().unwrap();
        let stored = store.file("hits.json").unwrap();
        assert_eq!(stored.tuple("Hits").unwrap().doubles("TotalEnergyDeposit").unwrap(), vec![0.0]);
    }

    #[test]
    fn test_layout_conflict_keeps_pending_rows() {
        let store = TupleStore::in_memory();
        let file = PathBuf::from("hits.json");
        let mut first = store.sink(ThreadRole::Master);
        let t = energy_tuple(&mut first, &file);
        first.add_row(t).unwrap();
        first.write().unwrap();

        let mut second = store.sink(ThreadRole::Master);
        second.open(&file).unwrap();
        let t = second.create_tuple("Hits", "Hits").unwrap();
        second
            .create_field(t, "TotalEnergyDeposit", FieldType::Double)
            .unwrap();
        second.bind_file(t, &file).unwrap();
        second.add_row(t).unwrap();
        second.add_row(t).unwrap();
        assert!(matches!(second.write(), Err(RecorderError::Sink(_))));
        assert_eq!(second.pending_rows(), 2);
        assert_eq!(store.file(&file).unwrap().tuple("Hits").unwrap().row_count(), 1);
    }

    #[test]
    fn test_workers_without_merge_write_per_thread_files() {
        let store = TupleStore::in_memory();
        let file = PathBuf::from("out/hits.json");
        let mut sink = store.sink(ThreadRole::Worker(2));
        let t = energy_tuple(&mut sink, &file);
        sink.add_row(t).unwrap();
        sink.write().unwrap();
        assert!(store.file("out/hits_t2.json").is_some());
        assert!(store.file(&file).is_none());
    }

    #[test]
    fn test_merge_mode_collects_all_threads() {
        let store = TupleStore::in_memory();
        let file = PathBuf::from("hits.json");
        let mut master = store.sink(ThreadRole::Master);
        master.set_merge_mode(true).unwrap();
        energy_tuple(&mut master, &file);

        for id in 0..3 {
            let mut worker = store.sink(ThreadRole::Worker(id));
            let t = energy_tuple(&mut worker, &file);
            worker.fill_field(t, 1, FieldValue::Int(id as i64)).unwrap();
            worker.add_row(t).unwrap();
            worker.write().unwrap();
        }
        master.write().unwrap();

        let stored = store.file(&file).unwrap();
        assert_eq!(stored.tuples.len(), 1);
        assert_eq!(stored.tuple("Hits").unwrap().ints("EventID").unwrap(), vec![0, 1, 2]);
        assert_eq!(store.physical_writes(), 4);
    }

    #[test]
    fn test_on_disk_roundtrip() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("hits.json");
        let store = TupleStore::on_disk();
        let mut sink = store.sink(ThreadRole::Master);
        let t = energy_tuple(&mut sink, &file);
        sink.fill_field(t, 0, FieldValue::Double(2.0)).unwrap();
        sink.add_row(t).unwrap();
        sink.write().unwrap();
        sink.close(&file).unwrap();

        let loaded = TupleStore::load(&file).unwrap();
        let hits = loaded.tuple("Hits").unwrap();
        assert_eq!(hits.column("TotalEnergyDeposit").unwrap(), vec![&FieldValue::Double(2.0)]);
        assert_eq!(store.closes(), 1);
    }

    #[test]
    fn test_per_thread_path() {
        assert_eq!(
            per_thread_path(Path::new("a/b/hits.json"), 4),
            PathBuf::from("a/b/hits_t4.json")
        );
        assert_eq!(per_thread_path(Path::new("hits"), 0), PathBuf::from("hits_t0"));
    }
}
