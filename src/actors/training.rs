//! Incident-particle training set

use super::{RecordingActor, WindowIdHandle};
use crate::collection::{Collection, CollectionSet};
use crate::config::TrainingDatasetConfig;
use crate::context::{ThreadRole, WorkerContext};
use crate::digitizer::training::{self, IncidentParticle, RussianRoulette};
use crate::step::{EventRecord, StepRecord};
use crate::RecorderResult;

/// Records the first primary entering the detector plane in each event,
/// tagged with the energy window the event reached
#[derive(Debug)]
pub struct TrainingDatasetActor {
    config: TrainingDatasetConfig,
    window_id: WindowIdHandle,
    seed: u64,
    roulette: Option<RussianRoulette>,
    incident: Option<IncidentParticle>,
    discarded: usize,
}

impl TrainingDatasetActor {
    pub fn new(config: TrainingDatasetConfig, window_id: WindowIdHandle, seed: u64) -> Self {
        Self {
            config,
            window_id,
            seed,
            roulette: None,
            incident: None,
            discarded: 0,
        }
    }

    /// Events thrown away by the roulette on this thread
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

impl RecordingActor for TrainingDatasetActor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn initialize(&mut self, ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let thread_offset = match ctx.role() {
            ThreadRole::Master => 0,
            ThreadRole::Worker(id) => id as u64 + 1,
        };
        self.roulette = Some(RussianRoulette::new(
            self.config.russian_roulette,
            self.seed.wrapping_add(thread_offset),
        )?);

        let mut collection = Collection::for_thread(ctx, &self.config.name)?;
        collection.set_filename(self.config.output.clone());
        collection.initialize_columns(training::training_columns())?;
        collections.insert(collection)
    }

    fn begin_of_event(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _event: &EventRecord,
    ) -> RecorderResult<()> {
        self.incident = None;
        Ok(())
    }

    fn stepping(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        step: &StepRecord,
    ) -> RecorderResult<()> {
        if self.incident.is_none() {
            self.incident = IncidentParticle::from_step(step, &self.config.plane_volume);
        }
        Ok(())
    }

    fn end_of_event(&mut self, _ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let Some(incident) = self.incident.take() else {
            return Ok(());
        };
        let window_id = self.window_id.get();
        let keep = match self.roulette.as_mut() {
            Some(roulette) => roulette.keep(window_id),
            None => true,
        };
        if !keep {
            self.discarded += 1;
            return Ok(());
        }

        let (theta, phi) = incident.angles();
        let collection = collections.get_mut(&self.config.name)?;
        collection
            .column_mut(training::KINETIC_ENERGY)?
            .push_double(incident.kinetic_energy)?;
        collection.column_mut(training::THETA)?.push_double(theta)?;
        collection.column_mut(training::PHI)?.push_double(phi)?;
        collection.column_mut(training::WINDOW_ID)?.push_int(window_id)?;
        Ok(())
    }

    fn end_of_simulation_worker(
        &mut self,
        ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
    ) -> RecorderResult<()> {
        log::debug!(
            "[{}] '{}': {} empty events discarded by russian roulette (1/{})",
            ctx.role(),
            self.config.name,
            self.discarded,
            self.config.russian_roulette
        );
        Ok(())
    }
}
