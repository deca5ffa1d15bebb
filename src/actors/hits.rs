//! Step-level hit recording

use super::RecordingActor;
use crate::collection::{Collection, CollectionSet};
use crate::config::HitsCollectionConfig;
use crate::context::WorkerContext;
use crate::step::{EventRecord, HitContext, StepRecord};
use crate::RecorderResult;

/// Fills one collection with a row per accepted step
#[derive(Debug, Clone)]
pub struct HitsCollectionActor {
    config: HitsCollectionConfig,
    rows_at_begin_of_event: usize,
}

impl HitsCollectionActor {
    pub fn new(config: HitsCollectionConfig) -> Self {
        Self {
            config,
            rows_at_begin_of_event: 0,
        }
    }

    /// Step accepted by the zero-energy and attached-volume rules
    pub fn accepts(&self, step: &StepRecord) -> bool {
        if !self.config.keep_zero_edep && step.total_energy_deposit == 0.0 {
            return false;
        }
        if self.config.volumes.is_empty() {
            return true;
        }
        match &step.pre.touchable {
            Some(t) => self.config.volumes.iter().any(|v| t.contains_volume(v)),
            None => false,
        }
    }
}

impl RecordingActor for HitsCollectionActor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn initialize(&mut self, ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let mut collection = Collection::for_thread(ctx, &self.config.name)?;
        collection.set_filename(self.config.output.clone());
        collection.initialize_attributes(ctx.registry(), &self.config.attributes)?;
        collections.insert(collection)
    }

    fn begin_of_event(
        &mut self,
        _ctx: &mut WorkerContext,
        collections: &mut CollectionSet,
        _event: &EventRecord,
    ) -> RecorderResult<()> {
        self.rows_at_begin_of_event = collections.get(&self.config.name)?.len();
        Ok(())
    }

    fn stepping(
        &mut self,
        ctx: &mut WorkerContext,
        collections: &mut CollectionSet,
        step: &StepRecord,
    ) -> RecorderResult<()> {
        if !self.accepts(step) {
            return Ok(());
        }
        let hit = HitContext::new(step, ctx.volumes());
        collections.get_mut(&self.config.name)?.fill(&hit)
    }

    fn end_of_event(&mut self, _ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let collection = collections.get_mut(&self.config.name)?;
        if self.config.store_empty_events && collection.len() == self.rows_at_begin_of_event {
            collection.fill_with_default_values();
        }
        Ok(())
    }
}
