//! Singles from hits, once per event

use super::RecordingActor;
use crate::collection::{Collection, CollectionSet};
use crate::config::AdderConfig;
use crate::context::WorkerContext;
use crate::digitizer::HitsAdder;
use crate::RecorderResult;

#[derive(Debug, Clone)]
pub struct AdderActor {
    config: AdderConfig,
    adder: HitsAdder,
}

impl AdderActor {
    pub fn new(config: AdderConfig) -> RecorderResult<Self> {
        let adder = HitsAdder::new(config.policy()?).with_group_volume_depth(config.group_volume_depth);
        Ok(Self { config, adder })
    }
}

impl RecordingActor for AdderActor {
    fn name(&self) -> &str {
        &self.config.name
    }

    /// The output carries every attribute of the input
    fn initialize(&mut self, ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let input = collections.get(&self.config.input)?;
        let mut output = Collection::for_thread(ctx, &self.config.name)?;
        output.set_filename(self.config.output.clone());
        output.initialize_columns(input.columns().iter().cloned())?;
        self.adder.check_collections(input, &output)?;
        log::debug!(
            "Adder '{}' reads '{}' with policy {}",
            self.config.name,
            self.config.input,
            self.adder.policy()
        );
        collections.insert(output)
    }

    fn end_of_event(&mut self, _ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let (input, output) = collections.pair_mut(&self.config.input, &self.config.name)?;
        self.adder.process_event(input, output)?;
        Ok(())
    }
}
