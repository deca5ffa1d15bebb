//! # Recording actors
//!
//! Actors receive the lifecycle callbacks of the host simulation on one
//! thread and fill the collections of that thread. Derived actors only act
//! at end of event, after every step of the event was recorded.
//!
//! ```text
//! start_simulation ─► begin_of_run ─► { begin_of_event ─► pre_user_tracking ─► stepping* ─► end_of_event }*
//!                  ─► end_of_run ─► end_of_simulation_worker ─► end_simulation (master)
//! ```

pub mod adder;
pub mod energy_windows;
pub mod hits;
pub mod statistics;
pub mod training;

pub use adder::AdderActor;
pub use energy_windows::EnergyWindowsActor;
pub use hits::HitsCollectionActor;
pub use statistics::{SimulationStatistics, SimulationStatisticsActor};
pub use training::TrainingDatasetActor;

use std::cell::Cell;
use std::rc::Rc;

use crate::collection::CollectionSet;
use crate::context::WorkerContext;
use crate::step::{EventRecord, StepRecord, TrackRecord};
use crate::RecorderResult;

/// Last exposed energy window id of a router, read by training actors of
/// the same thread
pub type WindowIdHandle = Rc<Cell<i64>>;

/// Lifecycle callbacks; every hook defaults to doing nothing
pub trait RecordingActor {
    fn name(&self) -> &str;

    /// Create this actor's collections on the current thread
    fn initialize(&mut self, _ctx: &mut WorkerContext, _collections: &mut CollectionSet) -> RecorderResult<()> {
        Ok(())
    }

    fn start_simulation(&mut self, _ctx: &mut WorkerContext, _collections: &mut CollectionSet) -> RecorderResult<()> {
        Ok(())
    }

    fn begin_of_run(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _run_id: i64,
    ) -> RecorderResult<()> {
        Ok(())
    }

    fn begin_of_event(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _event: &EventRecord,
    ) -> RecorderResult<()> {
        Ok(())
    }

    fn pre_user_tracking(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _track: &TrackRecord,
    ) -> RecorderResult<()> {
        Ok(())
    }

    fn stepping(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _step: &StepRecord,
    ) -> RecorderResult<()> {
        Ok(())
    }

    fn end_of_event(&mut self, _ctx: &mut WorkerContext, _collections: &mut CollectionSet) -> RecorderResult<()> {
        Ok(())
    }

    fn end_of_run(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _run_id: i64,
    ) -> RecorderResult<()> {
        Ok(())
    }

    fn end_of_simulation_worker(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
    ) -> RecorderResult<()> {
        Ok(())
    }

    fn end_simulation(&mut self, _ctx: &mut WorkerContext, _collections: &mut CollectionSet) -> RecorderResult<()> {
        Ok(())
    }
}
