//! Simulation driver: one master plus one OS thread per worker
//!
//! ```text
//! master:  build pipeline ─► start_simulation ─┬─────────────────────────────► end_simulation
//!                                              │                        ▲
//! worker i:                   build pipeline ──┴► runs (events i, i+n, …) ─► end_of_simulation_worker
//! ```
//!
//! The physics is supplied by an [`EventSource`]; the engine only replays
//! its events through the recording pipelines.

use std::sync::Arc;
use std::thread;

use crate::actors::SimulationStatistics;
use crate::config::RecorderConfig;
use crate::context::{RecordingServices, ThreadRole, WorkerContext};
use crate::error::RecorderError;
use crate::pipeline::RecordingPipeline;
use crate::sink::SinkProvider;
use crate::step::EventRecord;
use crate::RecorderResult;

/// Supplier of simulated events, shared by every worker
pub trait EventSource: Sync {
    fn number_of_runs(&self) -> usize;

    fn events_in_run(&self, run: usize) -> usize;

    /// Event `event` of run `run`; must not depend on the calling thread
    fn generate(&self, run: usize, event: usize) -> EventRecord;
}

/// What a finished simulation reports
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub statistics: SimulationStatistics,
    pub events_processed: usize,
    pub threads: usize,
    pub collections: Vec<String>,
}

/// Runs a recording configuration over an event source
pub struct RecordingEngine {
    config: RecorderConfig,
    services: Arc<RecordingServices>,
}

impl RecordingEngine {
    pub fn new(config: RecorderConfig, sinks: Arc<dyn SinkProvider>) -> RecorderResult<Self> {
        config.validate()?;
        let services = RecordingServices::new(config.number_of_threads, sinks);
        Ok(Self { config, services })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn services(&self) -> &Arc<RecordingServices> {
        &self.services
    }

    pub fn run<S: EventSource>(&self, source: &S) -> RecorderResult<SimulationSummary> {
        let threads = self.config.number_of_threads;
        let runs = source.number_of_runs();
        log::info!(
            "Starting simulation: {} run(s), {} worker thread(s)",
            runs,
            threads
        );

        let mut master = WorkerContext::master(Arc::clone(&self.services));
        let mut pipeline = RecordingPipeline::new(&mut master, &self.config)?;
        pipeline.start_simulation(&mut master)?;

        let events_processed = if threads == 0 {
            let mut processed = 0;
            for run in 0..runs {
                pipeline.begin_of_run(&mut master, run as i64)?;
                for event in 0..source.events_in_run(run) {
                    let record = prepare_event(source.generate(run, event), run, 0);
                    pipeline.process_event(&mut master, &record)?;
                    processed += 1;
                }
                pipeline.end_of_run(&mut master, run as i64)?;
            }
            pipeline.end_of_simulation_worker(&mut master)?;
            processed
        } else {
            let config = &self.config;
            let services = &self.services;
            let per_worker = thread::scope(|scope| {
                let handles: Vec<_> = (0..threads)
                    .map(|id| {
                        let services = Arc::clone(services);
                        scope.spawn(move || run_worker(services, config, source, id, threads))
                    })
                    .collect();
                handles
                    .into_iter()
                    .enumerate()
                    .map(|(id, handle)| {
                        handle
                            .join()
                            .map_err(|_| RecorderError::WorkerPanicked(id))
                            .and_then(|result| result)
                    })
                    .collect::<RecorderResult<Vec<usize>>>()
            })?;
            // the master only sees run boundaries
            for run in 0..runs {
                pipeline.begin_of_run(&mut master, run as i64)?;
                pipeline.end_of_run(&mut master, run as i64)?;
            }
            per_worker.into_iter().sum()
        };

        pipeline.end_simulation(&mut master)?;
        let statistics = self.services.statistics().clone();
        log::info!("Simulation finished: {} events recorded", events_processed);
        Ok(SimulationSummary {
            statistics,
            events_processed,
            threads,
            collections: self.services.coordinator().declared_names(),
        })
    }
}

fn prepare_event(mut record: EventRecord, run: usize, thread: usize) -> EventRecord {
    for step in record.tracks.iter_mut().flat_map(|t| t.steps.iter_mut()) {
        step.run_id = run as i64;
        step.thread_id = thread as i64;
    }
    record
}

fn run_worker<S: EventSource>(
    services: Arc<RecordingServices>,
    config: &RecorderConfig,
    source: &S,
    id: usize,
    threads: usize,
) -> RecorderResult<usize> {
    let mut ctx = WorkerContext::new(services, ThreadRole::Worker(id));
    let mut pipeline = RecordingPipeline::new(&mut ctx, config)?;
    let mut processed = 0;
    for run in 0..source.number_of_runs() {
        pipeline.begin_of_run(&mut ctx, run as i64)?;
        for event in (id..source.events_in_run(run)).step_by(threads) {
            let record = prepare_event(source.generate(run, event), run, id);
            pipeline.process_event(&mut ctx, &record)?;
            processed += 1;
        }
        pipeline.end_of_run(&mut ctx, run as i64)?;
    }
    pipeline.end_of_simulation_worker(&mut ctx)?;
    log::debug!("[{}] processed {} events", ctx.role(), processed);
    Ok(processed)
}
