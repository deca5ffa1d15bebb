//! Run, event, track and step counters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

use super::RecordingActor;
use crate::collection::CollectionSet;
use crate::context::WorkerContext;
use crate::step::{EventRecord, StepRecord, TrackRecord};
use crate::RecorderResult;

/// Counters of one thread, or the merged counters of all threads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationStatistics {
    pub runs: usize,
    pub events: usize,
    pub tracks: usize,
    pub steps: usize,
    /// Threads whose counters were merged in
    pub threads: usize,
    pub duration: Duration,
}

impl SimulationStatistics {
    pub fn merge(&mut self, other: &SimulationStatistics) {
        self.runs += other.runs;
        self.events += other.events;
        self.tracks += other.tracks;
        self.steps += other.steps;
        self.threads += 1;
    }

    pub fn events_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.events as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for SimulationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Simulation Statistics\n\
             ├─ Runs:    {}\n\
             ├─ Events:  {}\n\
             ├─ Tracks:  {}\n\
             ├─ Steps:   {}\n\
             ├─ Threads: {}\n\
             └─ Time:    {:.3} s ({:.1} events/s)",
            self.runs,
            self.events,
            self.tracks,
            self.steps,
            self.threads,
            self.duration.as_secs_f64(),
            self.events_per_second()
        )
    }
}

/// Counts locally and merges into the shared total at end of simulation
/// on each worker. Runs are counted by the master only.
#[derive(Debug, Default)]
pub struct SimulationStatisticsActor {
    local: SimulationStatistics,
    started: Option<Instant>,
}

impl SimulationStatisticsActor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn local(&self) -> &SimulationStatistics {
        &self.local
    }
}

impl RecordingActor for SimulationStatisticsActor {
    fn name(&self) -> &str {
        "SimulationStatistics"
    }

    fn start_simulation(&mut self, _ctx: &mut WorkerContext, _collections: &mut CollectionSet) -> RecorderResult<()> {
        self.started = Some(Instant::now());
        Ok(())
    }

    fn begin_of_run(
        &mut self,
        ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _run_id: i64,
    ) -> RecorderResult<()> {
        if ctx.is_master() {
            self.local.runs += 1;
        }
        Ok(())
    }

    fn begin_of_event(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _event: &EventRecord,
    ) -> RecorderResult<()> {
        self.local.events += 1;
        Ok(())
    }

    fn pre_user_tracking(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _track: &TrackRecord,
    ) -> RecorderResult<()> {
        self.local.tracks += 1;
        Ok(())
    }

    fn stepping(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _step: &StepRecord,
    ) -> RecorderResult<()> {
        self.local.steps += 1;
        Ok(())
    }

    fn end_of_simulation_worker(
        &mut self,
        ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
    ) -> RecorderResult<()> {
        let local = std::mem::take(&mut self.local);
        log::debug!(
            "[{}] {} events, {} tracks, {} steps",
            ctx.role(),
            local.events,
            local.tracks,
            local.steps
        );
        ctx.services().statistics().merge(&local);
        Ok(())
    }

    fn end_simulation(&mut self, ctx: &mut WorkerContext, _collections: &mut CollectionSet) -> RecorderResult<()> {
        let mut shared = ctx.services().statistics();
        // master only counts runs; worker counters were merged already
        let local = std::mem::take(&mut self.local);
        shared.runs += local.runs;
        shared.events += local.events;
        shared.tracks += local.tracks;
        shared.steps += local.steps;
        if let Some(started) = self.started {
            shared.duration = started.elapsed();
        }
        log::info!("{}", *shared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_counts_threads() {
        let mut total = SimulationStatistics::default();
        let worker = SimulationStatistics {
            events: 10,
            steps: 100,
            ..Default::default()
        };
        total.merge(&worker);
        total.merge(&worker);
        assert_eq!(total.events, 20);
        assert_eq!(total.steps, 200);
        assert_eq!(total.threads, 2);
    }

    #[test]
    fn test_display() {
        let stats = SimulationStatistics {
            runs: 1,
            events: 5,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Events:  5"));
    }
}
