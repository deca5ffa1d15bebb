//! Shared services and the per-thread recording context
//!
//! ```text
//!                   Arc<RecordingServices>
//!        (registry · coordinator · volume cache · statistics)
//!              │                │                 │
//!       WorkerContext     WorkerContext     WorkerContext
//!         (master)         (worker 0)        (worker 1)
//!        TupleWriter       TupleWriter       TupleWriter
//! ```
//!
//! A [`WorkerContext`] is created on the thread that uses it and cannot be
//! sent to another one, which keeps every per-thread buffer single-writer.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::actors::statistics::SimulationStatistics;
use crate::attributes::AttributeRegistry;
use crate::sink::SinkProvider;
use crate::tuples::{TupleCoordinator, TupleWriter};
use crate::volume_id::VolumeIdentityManager;

/// Which execution context a thread plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    Master,
    Worker(usize),
}

impl ThreadRole {
    pub fn is_master(&self) -> bool {
        matches!(self, Self::Master)
    }

    pub fn worker_id(&self) -> Option<usize> {
        match self {
            Self::Master => None,
            Self::Worker(id) => Some(*id),
        }
    }
}

impl fmt::Display for ThreadRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Worker(id) => write!(f, "worker {}", id),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SHARED SERVICES
// ═══════════════════════════════════════════════════════════════════════════════

/// Services shared by every thread of one simulation
pub struct RecordingServices {
    registry: AttributeRegistry,
    coordinator: Arc<TupleCoordinator>,
    volumes: VolumeIdentityManager,
    statistics: Mutex<SimulationStatistics>,
    sinks: Arc<dyn SinkProvider>,
    number_of_threads: usize,
}

impl fmt::Debug for RecordingServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingServices")
            .field("attributes", &self.registry.len())
            .field("volumes", &self.volumes.len())
            .field("number_of_threads", &self.number_of_threads)
            .finish()
    }
}

impl RecordingServices {
    /// `number_of_threads == 0` means single-threaded: the master does everything.
    pub fn new(number_of_threads: usize, sinks: Arc<dyn SinkProvider>) -> Arc<Self> {
        Self::with_registry(AttributeRegistry::new(), number_of_threads, sinks)
    }

    pub fn with_registry(
        registry: AttributeRegistry,
        number_of_threads: usize,
        sinks: Arc<dyn SinkProvider>,
    ) -> Arc<Self> {
        log::debug!(
            "Recording services created for {} thread(s)",
            number_of_threads
        );
        Arc::new(Self {
            registry,
            coordinator: Arc::new(TupleCoordinator::new(number_of_threads)),
            volumes: VolumeIdentityManager::new(),
            statistics: Mutex::new(SimulationStatistics::default()),
            sinks,
            number_of_threads,
        })
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &Arc<TupleCoordinator> {
        &self.coordinator
    }

    pub fn volumes(&self) -> &VolumeIdentityManager {
        &self.volumes
    }

    /// Shared statistics; only touched at end-of-simulation-worker time
    pub fn statistics(&self) -> MutexGuard<'_, SimulationStatistics> {
        self.statistics.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn number_of_threads(&self) -> usize {
        self.number_of_threads
    }

    pub fn is_multithreaded(&self) -> bool {
        self.number_of_threads > 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PER-THREAD CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-thread recording context, `!Send`
pub struct WorkerContext {
    services: Arc<RecordingServices>,
    role: ThreadRole,
    writer: TupleWriter,
    runs_started: usize,
    _not_send: PhantomData<Rc<()>>,
}

impl fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("role", &self.role)
            .field("runs_started", &self.runs_started)
            .finish()
    }
}

impl WorkerContext {
    pub fn new(services: Arc<RecordingServices>, role: ThreadRole) -> Self {
        let sink = services.sinks.sink_for(role);
        let writer = TupleWriter::new(role, Arc::clone(&services.coordinator), sink);
        Self {
            services,
            role,
            writer,
            runs_started: 0,
            _not_send: PhantomData,
        }
    }

    /// Context of the master thread
    pub fn master(services: Arc<RecordingServices>) -> Self {
        Self::new(services, ThreadRole::Master)
    }

    pub fn role(&self) -> ThreadRole {
        self.role
    }

    pub fn is_master(&self) -> bool {
        self.role.is_master()
    }

    pub fn services(&self) -> &Arc<RecordingServices> {
        &self.services
    }

    pub fn registry(&self) -> &AttributeRegistry {
        &self.services.registry
    }

    pub fn volumes(&self) -> &VolumeIdentityManager {
        &self.services.volumes
    }

    pub fn coordinator(&self) -> &TupleCoordinator {
        &self.services.coordinator
    }

    pub fn writer(&self) -> &TupleWriter {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut TupleWriter {
        &mut self.writer
    }

    pub fn is_multithreaded(&self) -> bool {
        self.services.is_multithreaded()
    }

    /// Count a new run on this thread
    pub fn begin_run(&mut self) {
        self.runs_started += 1;
    }

    pub fn runs_started(&self) -> usize {
        self.runs_started
    }

    /// True until a second run has begun on this thread
    pub fn is_first_run(&self) -> bool {
        self.runs_started <= 1
    }
}
