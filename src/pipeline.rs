//! Per-thread recording pipeline: the actors and collections of one thread
//!
//! End of event runs in a fixed order so derived collections always see the
//! complete event before anything is flushed:
//!
//! ```text
//! hits ─► adders ─► energy windows ─► training sets ─► flush_if_needed(every collection)
//! ```

use std::collections::HashMap;

use crate::actors::{
    AdderActor, EnergyWindowsActor, HitsCollectionActor, RecordingActor, SimulationStatisticsActor,
    TrainingDatasetActor,
};
use crate::collection::CollectionSet;
use crate::config::RecorderConfig;
use crate::context::WorkerContext;
use crate::error::RecorderError;
use crate::step::EventRecord;
use crate::RecorderResult;

/// Actors and collections of one thread
pub struct RecordingPipeline {
    actors: Vec<Box<dyn RecordingActor>>,
    collections: CollectionSet,
    /// `clear_every_n_events` of every collection, in creation order
    cadences: Vec<(String, usize)>,
    events_in_run: usize,
}

impl std::fmt::Debug for RecordingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingPipeline")
            .field("actors", &self.actor_names())
            .field("collections", &self.collections.names())
            .field("events_in_run", &self.events_in_run)
            .finish()
    }
}

impl RecordingPipeline {
    /// Build the actors of `config` on the calling thread and create their
    /// collections: declared on the master, attached on workers.
    pub fn new(ctx: &mut WorkerContext, config: &RecorderConfig) -> RecorderResult<Self> {
        config.validate()?;
        let mut actors: Vec<Box<dyn RecordingActor>> = Vec::new();
        let mut cadences = Vec::new();

        for hits in &config.hits {
            actors.push(Box::new(HitsCollectionActor::new(hits.clone())));
            cadences.push((hits.name.clone(), hits.clear_every_n_events));
        }
        for adder in &config.adders {
            actors.push(Box::new(AdderActor::new(adder.clone())?));
            cadences.push((adder.name.clone(), adder.clear_every_n_events));
        }
        let mut window_ids = HashMap::new();
        for windows in &config.energy_windows {
            let actor = EnergyWindowsActor::new(windows.clone())?;
            window_ids.insert(windows.name.clone(), actor.window_id_handle());
            actors.push(Box::new(actor));
            for channel in &windows.channels {
                cadences.push((channel.name.clone(), windows.clear_every_n_events));
            }
        }
        for training in &config.training_datasets {
            let handle = window_ids
                .get(&training.energy_windows)
                .cloned()
                .ok_or_else(|| RecorderError::UnknownCollection(training.energy_windows.clone()))?;
            actors.push(Box::new(TrainingDatasetActor::new(
                training.clone(),
                handle,
                config.seed,
            )));
            cadences.push((training.name.clone(), training.clear_every_n_events));
        }
        if config.statistics {
            actors.push(Box::new(SimulationStatisticsActor::new()));
        }

        Self::from_actors(ctx, actors, cadences)
    }

    /// Pipeline from already built actors, initialized in order
    pub fn from_actors(
        ctx: &mut WorkerContext,
        mut actors: Vec<Box<dyn RecordingActor>>,
        cadences: Vec<(String, usize)>,
    ) -> RecorderResult<Self> {
        let mut collections = CollectionSet::new();
        for actor in &mut actors {
            actor.initialize(ctx, &mut collections)?;
        }
        for (name, _) in &cadences {
            collections.get(name)?;
        }
        log::debug!(
            "[{}] pipeline with {} actors and {} collections",
            ctx.role(),
            actors.len(),
            collections.len()
        );
        Ok(Self {
            actors,
            collections,
            cadences,
            events_in_run: 0,
        })
    }

    pub fn collections(&self) -> &CollectionSet {
        &self.collections
    }

    pub fn collections_mut(&mut self) -> &mut CollectionSet {
        &mut self.collections
    }

    pub fn actor_names(&self) -> Vec<&str> {
        self.actors.iter().map(|a| a.name()).collect()
    }

    pub fn events_in_run(&self) -> usize {
        self.events_in_run
    }

    /// Master only: publish the layouts and create the output tuples
    pub fn start_simulation(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        for collection in self.collections.iter_mut() {
            collection.create_output_schema_for_master(ctx)?;
        }
        for actor in &mut self.actors {
            actor.start_simulation(ctx, &mut self.collections)?;
        }
        Ok(())
    }

    pub fn begin_of_run(&mut self, ctx: &mut WorkerContext, run_id: i64) -> RecorderResult<()> {
        ctx.begin_run();
        self.events_in_run = 0;
        for collection in self.collections.iter_mut() {
            collection.create_output_schema_for_worker(ctx)?;
        }
        for actor in &mut self.actors {
            actor.begin_of_run(ctx, &mut self.collections, run_id)?;
        }
        log::debug!("[{}] run {} started", ctx.role(), run_id);
        Ok(())
    }

    /// Feed one complete event through every hook
    pub fn process_event(&mut self, ctx: &mut WorkerContext, event: &EventRecord) -> RecorderResult<()> {
        for actor in &mut self.actors {
            actor.begin_of_event(ctx, &mut self.collections, event)?;
        }
        for track in &event.tracks {
            for actor in &mut self.actors {
                actor.pre_user_tracking(ctx, &mut self.collections, track)?;
            }
            for step in &track.steps {
                for actor in &mut self.actors {
                    actor.stepping(ctx, &mut self.collections, step)?;
                }
            }
        }
        self.end_of_event(ctx)
    }

    fn end_of_event(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        self.events_in_run += 1;
        for actor in &mut self.actors {
            actor.end_of_event(ctx, &mut self.collections)?;
        }
        for (name, every) in &self.cadences {
            let clear = self.events_in_run % every == 0;
            self.collections.get_mut(name)?.flush_if_needed(ctx, clear)?;
        }
        Ok(())
    }

    pub fn end_of_run(&mut self, ctx: &mut WorkerContext, run_id: i64) -> RecorderResult<()> {
        for actor in &mut self.actors {
            actor.end_of_run(ctx, &mut self.collections, run_id)?;
        }
        log::debug!(
            "[{}] run {} ended after {} events",
            ctx.role(),
            run_id,
            self.events_in_run
        );
        Ok(())
    }

    /// Flush what is left, then write and close this thread's outputs
    pub fn end_of_simulation_worker(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        for actor in &mut self.actors {
            actor.end_of_simulation_worker(ctx, &mut self.collections)?;
        }
        for collection in self.collections.iter_mut() {
            collection.flush_if_needed(ctx, true)?;
        }
        self.write_and_close(ctx)
    }

    /// Master only, after every worker finished
    pub fn end_simulation(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        for actor in &mut self.actors {
            actor.end_simulation(ctx, &mut self.collections)?;
        }
        self.write_and_close(ctx)
    }

    fn write_and_close(&mut self, ctx: &mut WorkerContext) -> RecorderResult<()> {
        for collection in self.collections.iter() {
            collection.write(ctx)?;
        }
        for collection in self.collections.iter_mut() {
            collection.close(ctx)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdderConfig, HitsCollectionConfig};
    use crate::context::RecordingServices;
    use crate::digitizer::AdderPolicy;
    use crate::geometry::Vec3;
    use crate::sink::TupleStore;
    use crate::step::{StepPoint, StepRecord, TouchableHistory, TouchableLevel, TrackRecord};
    use std::sync::Arc;

    fn event(event_id: i64, energies: &[f64]) -> EventRecord {
        let touchable = Arc::new(TouchableHistory::from_world_down(vec![
            TouchableLevel::new("world", 0, Vec3::ZERO),
            TouchableLevel::new("crystal", 3, Vec3::ZERO),
        ]));
        let steps = energies
            .iter()
            .map(|&e| StepRecord {
                event_id,
                total_energy_deposit: e,
                pre: StepPoint {
                    touchable: Some(Arc::clone(&touchable)),
                    ..Default::default()
                },
                post: StepPoint {
                    position: Vec3::new(e, 0.0, 0.0),
                    global_time: e,
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect();
        EventRecord {
            event_id,
            tracks: vec![TrackRecord { track_id: 1, steps }],
        }
    }

    fn config(clear_every: usize) -> RecorderConfig {
        let mut hits = HitsCollectionConfig::new(
            "Hits",
            &["TotalEnergyDeposit", "PostPosition", "GlobalTime", "PreStepUniqueVolumeID", "EventID"],
        );
        hits.clear_every_n_events = clear_every;
        let mut singles = AdderConfig::new("Singles", "Hits", AdderPolicy::EnergyWinnerPosition);
        singles.output = Some("singles.json".into());
        RecorderConfig {
            hits: vec![hits],
            adders: vec![singles],
            statistics: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_adder_sees_each_event_once() {
        let store = TupleStore::in_memory();
        let services = RecordingServices::new(0, Arc::new(store.clone()));
        let mut ctx = WorkerContext::master(services);
        let mut pipeline = RecordingPipeline::new(&mut ctx, &config(3)).unwrap();
        pipeline.start_simulation(&mut ctx).unwrap();
        pipeline.begin_of_run(&mut ctx, 0).unwrap();
        pipeline.process_event(&mut ctx, &event(0, &[1.0, 4.0])).unwrap();
        pipeline.process_event(&mut ctx, &event(1, &[2.0])).unwrap();

        // hits are kept across events but only new rows feed the adder
        assert_eq!(pipeline.collections().get("Hits").unwrap().len(), 3);
        pipeline.process_event(&mut ctx, &event(2, &[0.5])).unwrap();
        assert!(pipeline.collections().get("Hits").unwrap().is_empty());

        pipeline.end_of_run(&mut ctx, 0).unwrap();
        pipeline.end_of_simulation_worker(&mut ctx).unwrap();
        pipeline.end_simulation(&mut ctx).unwrap();

        let singles = store.file("singles.json").unwrap().tuple("Singles").cloned().unwrap();
        assert_eq!(singles.doubles("TotalEnergyDeposit").unwrap(), vec![5.0, 2.0, 0.5]);
        assert_eq!(singles.ints("EventID").unwrap(), vec![0, 1, 2]);
        assert_eq!(singles.doubles("PostPosition_X").unwrap(), vec![4.0, 2.0, 0.5]);
        assert_eq!(store.physical_writes(), 1);
        assert_eq!(store.closes(), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let services = RecordingServices::new(0, Arc::new(TupleStore::in_memory()));
        let mut ctx = WorkerContext::master(services);
        let mut bad = config(1);
        bad.adders[0].input = "Missing".to_string();
        assert!(RecordingPipeline::new(&mut ctx, &bad).is_err());
    }
}
