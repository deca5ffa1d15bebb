//! Energy-window routing of an input collection

use std::cell::Cell;
use std::rc::Rc;

use super::{RecordingActor, WindowIdHandle};
use crate::collection::{Collection, CollectionSet};
use crate::config::EnergyWindowsConfig;
use crate::context::WorkerContext;
use crate::digitizer::EnergyWindowRouter;
use crate::step::EventRecord;
use crate::RecorderResult;

#[derive(Debug, Clone)]
pub struct EnergyWindowsActor {
    config: EnergyWindowsConfig,
    router: EnergyWindowRouter,
    channel_names: Vec<String>,
    window_id: WindowIdHandle,
}

impl EnergyWindowsActor {
    pub fn new(config: EnergyWindowsConfig) -> RecorderResult<Self> {
        let router = EnergyWindowRouter::new(config.channels.clone())?;
        let channel_names = config.channels.iter().map(|c| c.name.clone()).collect();
        Ok(Self {
            config,
            router,
            channel_names,
            window_id: Rc::new(Cell::new(0)),
        })
    }

    /// Exposed window id of the last event (0 = no window)
    pub fn window_id_handle(&self) -> WindowIdHandle {
        Rc::clone(&self.window_id)
    }
}

impl RecordingActor for EnergyWindowsActor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn initialize(&mut self, ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let columns = collections.get(&self.config.input)?.columns().to_vec();
        for channel in &self.channel_names {
            let mut output = Collection::for_thread(ctx, channel)?;
            output.set_filename(self.config.output.clone());
            output.initialize_columns(columns.iter().cloned())?;
            collections.insert(output)?;
        }
        Ok(())
    }

    fn begin_of_event(
        &mut self,
        _ctx: &mut WorkerContext,
        _collections: &mut CollectionSet,
        _event: &EventRecord,
    ) -> RecorderResult<()> {
        self.window_id.set(0);
        Ok(())
    }

    fn end_of_event(&mut self, _ctx: &mut WorkerContext, collections: &mut CollectionSet) -> RecorderResult<()> {
        let (input, mut outputs) = collections.split_mut(&self.config.input, &self.channel_names)?;
        self.router.process_event(input, &mut outputs)?;
        self.window_id.set(self.router.exposed_window_id());
        Ok(())
    }
}
