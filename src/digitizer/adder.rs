//! Per-event merge of hits sharing a volume into singles

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::attributes::AttributeValue;
use crate::collection::Collection;
use crate::error::RecorderError;
use crate::geometry::Vec3;
use crate::volume_id::{VolumeIdentity, VolumeKey};
use crate::RecorderResult;

pub const ENERGY_ATTRIBUTE: &str = "TotalEnergyDeposit";
pub const POSITION_ATTRIBUTE: &str = "PostPosition";
pub const TIME_ATTRIBUTE: &str = "GlobalTime";
pub const VOLUME_ATTRIBUTE: &str = "PreStepUniqueVolumeID";

/// Attributes an adder input must provide
pub const REQUIRED_ATTRIBUTES: [&str; 4] = [
    ENERGY_ATTRIBUTE,
    POSITION_ATTRIBUTE,
    TIME_ATTRIBUTE,
    VOLUME_ATTRIBUTE,
];

/// How the position of a single is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdderPolicy {
    /// Position of the hit with the largest energy
    EnergyWinnerPosition,
    /// Energy-weighted mean of the hit positions
    EnergyWeightedCentroidPosition,
}

impl AdderPolicy {
    pub fn all() -> [Self; 2] {
        [Self::EnergyWinnerPosition, Self::EnergyWeightedCentroidPosition]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EnergyWinnerPosition => "EnergyWinnerPosition",
            Self::EnergyWeightedCentroidPosition => "EnergyWeightedCentroidPosition",
        }
    }
}

impl fmt::Display for AdderPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AdderPolicy {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| RecorderError::UnknownPolicy {
                name: s.to_string(),
                valid: Self::all().map(|p| p.name()).join(", "),
            })
    }
}

/// Accumulated state of one volume during one event
#[derive(Debug, Clone, PartialEq)]
struct MergeRecord {
    energy: f64,
    /// Winner position, or the sum of `position * energy`
    position: Vec3,
    max_energy: f64,
    time: f64,
    /// Input row whose other attributes are copied to the single
    representative: usize,
}

impl MergeRecord {
    fn new(row: usize) -> Self {
        Self {
            energy: 0.0,
            position: Vec3::ZERO,
            max_energy: f64::NEG_INFINITY,
            time: f64::INFINITY,
            representative: row,
        }
    }
}

/// Merges the hits of one event, grouped by volume identity
#[derive(Debug, Clone)]
pub struct HitsAdder {
    policy: AdderPolicy,
    group_volume_depth: Option<usize>,
    records: BTreeMap<VolumeKey, MergeRecord>,
}

impl HitsAdder {
    pub fn new(policy: AdderPolicy) -> Self {
        Self {
            policy,
            group_volume_depth: None,
            records: BTreeMap::new(),
        }
    }

    /// Group by the identity truncated at `depth` levels below the world
    pub fn with_group_volume_depth(mut self, depth: Option<usize>) -> Self {
        self.group_volume_depth = depth;
        self
    }

    pub fn policy(&self) -> AdderPolicy {
        self.policy
    }

    /// Check that `input` carries what the merge reads and that `output`
    /// can receive it
    pub fn check_collections(&self, input: &Collection, output: &Collection) -> RecorderResult<()> {
        let it = input.iter();
        it.track::<f64>(ENERGY_ATTRIBUTE)?;
        it.track::<Vec3>(POSITION_ATTRIBUTE)?;
        it.track::<f64>(TIME_ATTRIBUTE)?;
        it.track::<Arc<VolumeIdentity>>(VOLUME_ATTRIBUTE)?;
        for name in [ENERGY_ATTRIBUTE, POSITION_ATTRIBUTE, TIME_ATTRIBUTE] {
            output.column(name)?;
        }
        for name in output.attribute_names() {
            input.column(&name)?;
        }
        Ok(())
    }

    fn key_of(&self, identity: &VolumeIdentity) -> VolumeKey {
        match self.group_volume_depth {
            Some(depth) => identity.key().truncated(depth),
            None => *identity.key(),
        }
    }

    fn accumulate(&mut self, key: VolumeKey, row: usize, energy: f64, position: Vec3, time: f64) {
        let policy = self.policy;
        let record = self
            .records
            .entry(key)
            .or_insert_with(|| MergeRecord::new(row));
        record.energy += energy;
        record.time = record.time.min(time);
        match policy {
            AdderPolicy::EnergyWinnerPosition => {
                if energy > record.max_energy {
                    record.max_energy = energy;
                    record.position = position;
                    record.representative = row;
                }
            }
            AdderPolicy::EnergyWeightedCentroidPosition => {
                record.position += position * energy;
                record.representative = row;
            }
        }
    }

    /// Merge the rows of `input` added since its begin-of-event marker and
    /// append one single per volume to `output`. Returns the number of singles.
    pub fn process_event(&mut self, input: &Collection, output: &mut Collection) -> RecorderResult<usize> {
        let mut it = input.iter();
        let energies = it.track::<f64>(ENERGY_ATTRIBUTE)?;
        let positions = it.track::<Vec3>(POSITION_ATTRIBUTE)?;
        let times = it.track::<f64>(TIME_ATTRIBUTE)?;
        let volumes = it.track::<Arc<VolumeIdentity>>(VOLUME_ATTRIBUTE)?;

        while !it.is_at_end() {
            let row = it.index();
            if let (Some(&e), Some(&p), Some(&t), Some(v)) = (
                it.value(&energies),
                it.value(&positions),
                it.value(&times),
                it.value(&volumes),
            ) {
                if e != 0.0 {
                    let key = self.key_of(v);
                    self.accumulate(key, row, e, p, t);
                }
            }
            it.advance();
        }

        let records = std::mem::take(&mut self.records);
        let names = output.attribute_names();
        let mut emitted = 0;
        for record in records.into_values() {
            if record.energy == 0.0 {
                continue;
            }
            let position = match self.policy {
                AdderPolicy::EnergyWinnerPosition => record.position,
                AdderPolicy::EnergyWeightedCentroidPosition => record.position / record.energy,
            };
            let mut row = Vec::with_capacity(names.len());
            for name in &names {
                row.push(match name.as_str() {
                    ENERGY_ATTRIBUTE => AttributeValue::Double(record.energy),
                    POSITION_ATTRIBUTE => AttributeValue::Vector3(position),
                    TIME_ATTRIBUTE => AttributeValue::Double(record.time),
                    _ => representative_value(input, name, record.representative)?,
                });
            }
            output.push_row(row)?;
            emitted += 1;
        }
        Ok(emitted)
    }
}

fn representative_value(input: &Collection, name: &str, row: usize) -> RecorderResult<AttributeValue> {
    let column = input.column(name)?;
    column.value(row).ok_or_else(|| {
        RecorderError::InvalidParameter(format!(
            "row {} out of range for attribute '{}' ({} rows)",
            row,
            name,
            column.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RecordingServices, WorkerContext};
    use crate::sink::TupleStore;
    use crate::step::{TouchableHistory, TouchableLevel};

    const A: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    const B: Vec3 = Vec3::new(0.0, 2.0, 0.0);
    const C: Vec3 = Vec3::new(0.0, 0.0, 3.0);

    struct Fixture {
        ctx: WorkerContext,
        input: Collection,
        output: Collection,
    }

    fn fixture() -> Fixture {
        let services = RecordingServices::new(0, Arc::new(TupleStore::in_memory()));
        let ctx = WorkerContext::master(services);
        let mut input = Collection::declare(&ctx, "Hits").unwrap();
        input
            .initialize_attributes(
                ctx.registry(),
                &[ENERGY_ATTRIBUTE, POSITION_ATTRIBUTE, TIME_ATTRIBUTE, VOLUME_ATTRIBUTE, "EventID"],
            )
            .unwrap();
        let mut output = Collection::declare(&ctx, "Singles").unwrap();
        output
            .initialize_columns(input.columns().iter().cloned())
            .unwrap();
        Fixture { ctx, input, output }
    }

    fn volume(ctx: &WorkerContext, crystal: i32) -> Arc<VolumeIdentity> {
        let touchable = TouchableHistory::from_world_down(vec![
            TouchableLevel::new("world", 0, Vec3::ZERO),
            TouchableLevel::new("head", 1, Vec3::ZERO),
            TouchableLevel::new("crystal", crystal, Vec3::ZERO),
        ]);
        ctx.volumes().get_or_create(&touchable).unwrap()
    }

    fn push_row(f: &mut Fixture, energy: f64, position: Vec3, time: f64, crystal: i32, event: i64) {
        let v = volume(&f.ctx, crystal);
        f.input.column_mut(ENERGY_ATTRIBUTE).unwrap().push_double(energy).unwrap();
        f.input.column_mut(POSITION_ATTRIBUTE).unwrap().push_vector3(position).unwrap();
        f.input.column_mut(TIME_ATTRIBUTE).unwrap().push_double(time).unwrap();
        f.input
            .column_mut(VOLUME_ATTRIBUTE)
            .unwrap()
            .push(AttributeValue::VolumeId(v))
            .unwrap();
        f.input.column_mut("EventID").unwrap().push_int(event).unwrap();
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "EnergyWinnerPosition".parse::<AdderPolicy>().unwrap(),
            AdderPolicy::EnergyWinnerPosition
        );
        match "Barycenter".parse::<AdderPolicy>() {
            Err(RecorderError::UnknownPolicy { name, valid }) => {
                assert_eq!(name, "Barycenter");
                assert!(valid.contains("EnergyWeightedCentroidPosition"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_winner_keeps_max_energy_position() {
        let mut f = fixture();
        push_row(&mut f, 1.0, A, 3.0, 4, 10);
        push_row(&mut f, 5.0, B, 2.0, 4, 11);
        push_row(&mut f, 2.0, C, 1.0, 4, 12);

        let mut adder = HitsAdder::new(AdderPolicy::EnergyWinnerPosition);
        adder.check_collections(&f.input, &f.output).unwrap();
        assert_eq!(adder.process_event(&f.input, &mut f.output).unwrap(), 1);

        let out = &f.output;
        assert_eq!(out.column(ENERGY_ATTRIBUTE).unwrap().doubles().unwrap(), &[8.0]);
        assert_eq!(out.column(POSITION_ATTRIBUTE).unwrap().vectors().unwrap(), &[B]);
        assert_eq!(out.column(TIME_ATTRIBUTE).unwrap().doubles().unwrap(), &[1.0]);
        assert_eq!(out.column("EventID").unwrap().ints().unwrap(), &[11]);
    }

    #[test]
    fn test_centroid_weights_positions() {
        let mut f = fixture();
        push_row(&mut f, 2.0, Vec3::ZERO, 1.0, 4, 1);
        push_row(&mut f, 2.0, Vec3::new(10.0, 0.0, 0.0), 1.0, 4, 2);

        let mut adder = HitsAdder::new(AdderPolicy::EnergyWeightedCentroidPosition);
        adder.process_event(&f.input, &mut f.output).unwrap();

        let out = &f.output;
        assert_eq!(out.column(ENERGY_ATTRIBUTE).unwrap().doubles().unwrap(), &[4.0]);
        let p = out.column(POSITION_ATTRIBUTE).unwrap().vectors().unwrap()[0];
        assert!(p.approx_eq(&Vec3::new(5.0, 0.0, 0.0), 1e-12));
        // last visited row is the representative
        assert_eq!(out.column("EventID").unwrap().ints().unwrap(), &[2]);
    }

    #[test]
    fn test_zero_energy_volume_emits_nothing() {
        let mut f = fixture();
        push_row(&mut f, 0.0, A, 1.0, 4, 1);
        push_row(&mut f, 0.0, B, 1.0, 4, 1);
        push_row(&mut f, 3.0, C, 1.0, 5, 1);

        let mut adder = HitsAdder::new(AdderPolicy::EnergyWinnerPosition);
        assert_eq!(adder.process_event(&f.input, &mut f.output).unwrap(), 1);
        assert_eq!(f.output.column(POSITION_ATTRIBUTE).unwrap().vectors().unwrap(), &[C]);
    }

    #[test]
    fn test_only_rows_after_marker_are_merged() {
        let mut f = fixture();
        push_row(&mut f, 7.0, A, 1.0, 4, 1);
        f.input.mark_event_boundary();
        push_row(&mut f, 1.0, B, 1.0, 4, 2);

        let mut adder = HitsAdder::new(AdderPolicy::EnergyWinnerPosition);
        adder.process_event(&f.input, &mut f.output).unwrap();
        assert_eq!(f.output.column(ENERGY_ATTRIBUTE).unwrap().doubles().unwrap(), &[1.0]);

        // the merge map does not survive the event
        f.input.mark_event_boundary();
        assert_eq!(adder.process_event(&f.input, &mut f.output).unwrap(), 0);
    }

    #[test]
    fn test_group_volume_depth_merges_sibling_crystals() {
        let mut f = fixture();
        push_row(&mut f, 1.0, A, 1.0, 4, 1);
        push_row(&mut f, 2.0, B, 1.0, 5, 1);

        let mut per_crystal = HitsAdder::new(AdderPolicy::EnergyWinnerPosition);
        assert_eq!(per_crystal.process_event(&f.input, &mut f.output).unwrap(), 2);

        f.output.clear();
        let mut per_head =
            HitsAdder::new(AdderPolicy::EnergyWinnerPosition).with_group_volume_depth(Some(1));
        assert_eq!(per_head.process_event(&f.input, &mut f.output).unwrap(), 1);
        assert_eq!(f.output.column(ENERGY_ATTRIBUTE).unwrap().doubles().unwrap(), &[3.0]);
    }

    #[test]
    fn test_failed_row_leaves_output_aligned() {
        let mut f = fixture();
        push_row(&mut f, 1.0, A, 0.0, 1, 0);
        push_row(&mut f, 2.0, B, 0.0, 2, 0);
        let mut output = Collection::declare(&f.ctx, "Partial").unwrap();
        output
            .initialize_attributes(
                f.ctx.registry(),
                &[ENERGY_ATTRIBUTE, POSITION_ATTRIBUTE, TIME_ATTRIBUTE, "ParticleName"],
            )
            .unwrap();
        let mut adder = HitsAdder::new(AdderPolicy::EnergyWinnerPosition);
        assert!(matches!(
            adder.process_event(&f.input, &mut output),
            Err(RecorderError::MissingAttribute { .. })
        ));
        assert!(output.columns().iter().all(|c| c.is_empty()));

        // the adder is reusable after the failure
        assert_eq!(adder.process_event(&f.input, &mut f.output).unwrap(), 2);
        assert!(f.output.columns().iter().all(|c| c.len() == 2));
    }

    #[test]
    fn test_missing_input_attribute_is_reported() {
        let f = fixture();
        let services = RecordingServices::new(0, Arc::new(TupleStore::in_memory()));
        let ctx = WorkerContext::master(services);
        let mut bare = Collection::declare(&ctx, "Bare").unwrap();
        bare.initialize_attributes(ctx.registry(), &[ENERGY_ATTRIBUTE]).unwrap();
        let adder = HitsAdder::new(AdderPolicy::EnergyWinnerPosition);
        assert!(matches!(
            adder.check_collections(&bare, &f.output),
            Err(RecorderError::MissingAttribute { .. })
        ));
    }
}
