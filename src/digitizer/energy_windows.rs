//! Routing of rows into energy-defined channels

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::error::RecorderError;
use crate::RecorderResult;

/// Named energy range `[min, max)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyChannel {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl EnergyChannel {
    pub fn new(name: &str, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
        }
    }

    pub fn contains(&self, energy: f64) -> bool {
        self.min <= energy && energy < self.max
    }

    pub fn validate(&self) -> RecorderResult<()> {
        if !(self.min < self.max) {
            return Err(RecorderError::InvalidParameter(format!(
                "energy window '{}' has min {} not below max {}",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Copies the rows of an input collection into one collection per channel.
///
/// Channels are tested independently, so with overlapping ranges a row is
/// copied into every channel containing it.
#[derive(Debug, Clone)]
pub struct EnergyWindowRouter {
    channels: Vec<EnergyChannel>,
    energy_attribute: String,
    last_window_id: i64,
}

impl EnergyWindowRouter {
    pub fn new(channels: Vec<EnergyChannel>) -> RecorderResult<Self> {
        if channels.is_empty() {
            return Err(RecorderError::InvalidParameter(
                "energy window router needs at least one channel".to_string(),
            ));
        }
        for channel in &channels {
            channel.validate()?;
        }
        Ok(Self {
            channels,
            energy_attribute: super::adder::ENERGY_ATTRIBUTE.to_string(),
            last_window_id: -1,
        })
    }

    pub fn with_energy_attribute(mut self, name: &str) -> Self {
        self.energy_attribute = name.to_string();
        self
    }

    pub fn channels(&self) -> &[EnergyChannel] {
        &self.channels
    }

    /// Index of the last channel that received a row this event, -1 if none
    pub fn last_window_id(&self) -> i64 {
        self.last_window_id
    }

    /// [`last_window_id`](Self::last_window_id) shifted by one: 0 means no window
    pub fn exposed_window_id(&self) -> i64 {
        self.last_window_id + 1
    }

    /// Route the rows of `input` added since its begin-of-event marker.
    /// `outputs` holds one collection per channel, in channel order.
    /// Returns the number of rows copied per channel.
    pub fn process_event(
        &mut self,
        input: &Collection,
        outputs: &mut [&mut Collection],
    ) -> RecorderResult<Vec<usize>> {
        if outputs.len() != self.channels.len() {
            return Err(RecorderError::InvalidParameter(format!(
                "{} energy windows but {} output collections",
                self.channels.len(),
                outputs.len()
            )));
        }

        let mut it = input.iter();
        let energies = it.track::<f64>(&self.energy_attribute)?;
        let mut copied = vec![0; self.channels.len()];
        self.last_window_id = -1;

        for (id, (channel, output)) in self.channels.iter().zip(outputs.iter_mut()).enumerate() {
            it.goto_begin();
            while !it.is_at_end() {
                let row = it.index();
                if let Some(&e) = it.value(&energies) {
                    if channel.contains(e) {
                        output.copy_row_from(input, row)?;
                        copied[id] += 1;
                    }
                }
                it.advance();
            }
            if copied[id] > 0 {
                self.last_window_id = id as i64;
            }
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RecordingServices, WorkerContext};
    use crate::sink::TupleStore;
    use std::sync::Arc;

    fn setup() -> (Collection, Collection, Collection) {
        let services = RecordingServices::new(0, Arc::new(TupleStore::in_memory()));
        let ctx = WorkerContext::master(services);
        let mut input = Collection::declare(&ctx, "Singles").unwrap();
        input
            .initialize_attributes(ctx.registry(), &["TotalEnergyDeposit", "EventID"])
            .unwrap();
        let mut low = Collection::declare(&ctx, "low").unwrap();
        low.initialize_columns(input.columns().iter().cloned()).unwrap();
        let mut high = Collection::declare(&ctx, "high").unwrap();
        high.initialize_columns(input.columns().iter().cloned()).unwrap();
        (input, low, high)
    }

    fn push(input: &mut Collection, energy: f64, event: i64) {
        input.column_mut("TotalEnergyDeposit").unwrap().push_double(energy).unwrap();
        input.column_mut("EventID").unwrap().push_int(event).unwrap();
    }

    fn router() -> EnergyWindowRouter {
        EnergyWindowRouter::new(vec![
            EnergyChannel::new("low", 0.0, 100.0),
            EnergyChannel::new("high", 100.0, 200.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_row_goes_to_matching_channel_only() {
        let (mut input, mut low, mut high) = setup();
        push(&mut input, 150.0, 1);
        let mut r = router();
        let copied = r.process_event(&input, &mut [&mut low, &mut high]).unwrap();
        assert_eq!(copied, vec![0, 1]);
        assert!(low.is_empty());
        assert_eq!(high.column("EventID").unwrap().ints().unwrap(), &[1]);
        assert_eq!(r.last_window_id(), 1);
        assert_eq!(r.exposed_window_id(), 2);
    }

    #[test]
    fn test_unmatched_row_reports_no_window() {
        let (mut input, mut low, mut high) = setup();
        push(&mut input, 250.0, 1);
        let mut r = router();
        r.process_event(&input, &mut [&mut low, &mut high]).unwrap();
        assert!(low.is_empty() && high.is_empty());
        assert_eq!(r.last_window_id(), -1);
        assert_eq!(r.exposed_window_id(), 0);
    }

    #[test]
    fn test_range_bounds() {
        let c = EnergyChannel::new("w", 100.0, 200.0);
        assert!(c.contains(100.0));
        assert!(!c.contains(200.0));
        assert!(EnergyChannel::new("bad", 2.0, 1.0).validate().is_err());
        assert!(EnergyWindowRouter::new(Vec::new()).is_err());
    }

    #[test]
    fn test_overlapping_channels_both_receive_row() {
        let (mut input, mut a, mut b) = setup();
        push(&mut input, 120.0, 1);
        let mut r = EnergyWindowRouter::new(vec![
            EnergyChannel::new("wide", 0.0, 200.0),
            EnergyChannel::new("narrow", 110.0, 130.0),
        ])
        .unwrap();
        assert_eq!(r.process_event(&input, &mut [&mut a, &mut b]).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_output_count_must_match() {
        let (input, mut low, _) = setup();
        let mut r = router();
        assert!(r.process_event(&input, &mut [&mut low]).is_err());
    }
}
