//! # Hit Recorder
//!
//! Columnar hit recording and per-event aggregation for Monte-Carlo
//! particle-transport simulations.
//!
//! ## Features
//! - Named, typed attributes computed from each simulation step
//! - Column-oriented collections with per-event boundaries
//! - Hierarchical volume identities with shared interning
//! - Per-thread tuple output, optionally merged into one file
//! - Adder (per-volume energy summing), energy windows and training sets
//!
//! ## Architecture
//!
//! ```text
//! EventSource ─► RecordingEngine ─┬─ master  RecordingPipeline ─┐
//!                                 └─ worker  RecordingPipeline ─┤
//!                                                               │
//!    HitsCollectionActor ─► AdderActor ─► EnergyWindowsActor ─► TrainingDatasetActor
//!            │                  │                 │                    │
//!            └──────────────────┴──── Collection ─┴────────────────────┘
//!                                         │
//!                     TupleWriter ─► TupleSink (TupleStore: JSON files)
//!                                         ▲
//!                  TupleCoordinator (slots, schemas, merge mode), shared
//! ```

// Data model
pub mod attributes;
pub mod collection;
pub mod error;
pub mod geometry;
pub mod step;
pub mod volume_id;

// Output plumbing
pub mod context;
pub mod sink;
pub mod tuples;

// Processing
pub mod actors;
pub mod config;
pub mod digitizer;
pub mod engine;
pub mod pipeline;
pub mod synthetic;


pub use attributes::{AttributeKind, AttributeRegistry, AttributeType, AttributeValue, TypedColumn};
pub use collection::{Collection, CollectionIterator, CollectionSet};
pub use config::{
    AdderConfig, EnergyWindowsConfig, HitsCollectionConfig, RecorderConfig, TrainingDatasetConfig,
};
pub use context::{RecordingServices, ThreadRole, WorkerContext};
pub use digitizer::{AdderPolicy, EnergyChannel, EnergyWindowRouter, HitsAdder};
pub use engine::{EventSource, RecordingEngine, SimulationSummary};
pub use error::RecorderError;
pub use geometry::{Rotation3, Vec3};
pub use pipeline::RecordingPipeline;
pub use sink::{FieldType, FieldValue, SinkProvider, TupleSink, TupleStore};
pub use step::{EventRecord, HitContext, StepRecord, TouchableHistory, TouchableLevel, TrackRecord};
pub use tuples::{TupleCoordinator, TupleWriter};
pub use volume_id::{VolumeIdentity, VolumeIdentityManager, VolumeKey};

/// Result type for recorder operations
pub type RecorderResult<T> = Result<T, RecorderError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        // Data model
        AttributeRegistry,
        AttributeType,
        Collection,
        CollectionIterator,
        VolumeIdentity,

        // Running
        EventSource,
        RecorderConfig,
        RecordingEngine,
        TupleStore,

        // Result type
        RecorderError,
        RecorderResult,
    };
}
