//! Built-in attribute kinds computed from a [`StepRecord`](crate::step::StepRecord)

use std::sync::Arc;

use super::AttributeKind;
use crate::step::{HitContext, StepPoint};
use crate::volume_id::VolumeIdentity;
use crate::RecorderResult;

fn volume_identity(hit: &HitContext<'_>, point: &StepPoint) -> RecorderResult<Arc<VolumeIdentity>> {
    match &point.touchable {
        Some(t) => hit.volumes.get_or_create(t.as_ref()),
        None => Ok(VolumeIdentity::empty()),
    }
}

/// Every kind registered by [`AttributeRegistry::new`](super::AttributeRegistry::new)
pub fn builtin_kinds() -> Vec<AttributeKind> {
    vec![
        // Energies and times
        AttributeKind::double("TotalEnergyDeposit", |h| h.step.total_energy_deposit),
        AttributeKind::double("PreKineticEnergy", |h| h.step.pre.kinetic_energy),
        AttributeKind::double("PostKineticEnergy", |h| h.step.post.kinetic_energy),
        AttributeKind::double("KineticEnergy", |h| h.step.pre.kinetic_energy),
        AttributeKind::double("TrackVertexKineticEnergy", |h| {
            h.step.track_vertex_kinetic_energy
        }),
        AttributeKind::double("GlobalTime", |h| h.step.post.global_time),
        AttributeKind::double("PreGlobalTime", |h| h.step.pre.global_time),
        AttributeKind::double("LocalTime", |h| h.step.post.local_time),
        AttributeKind::double("StepLength", |h| h.step.step_length),
        AttributeKind::double("Weight", |h| h.step.weight),
        // Identifiers
        AttributeKind::int("TrackID", |h| h.step.track_id),
        AttributeKind::int("ParentID", |h| h.step.parent_id),
        AttributeKind::int("EventID", |h| h.step.event_id),
        AttributeKind::int("RunID", |h| h.step.run_id),
        AttributeKind::int("ThreadID", |h| h.step.thread_id),
        AttributeKind::int("PDGCode", |h| h.step.pdg_code),
        AttributeKind::int("PreStepVolumeCopyNo", |h| h.step.pre.copy_number() as i64),
        AttributeKind::int("PostStepVolumeCopyNo", |h| h.step.post.copy_number() as i64),
        // Names
        AttributeKind::string("ParticleName", |h| h.step.particle_name.clone()),
        AttributeKind::string("TrackCreatorProcess", |h| h.step.creator_process.clone()),
        AttributeKind::string("ProcessDefinedStep", |h| h.step.process_defined_step.clone()),
        AttributeKind::string("PreStepVolumeName", |h| h.step.pre.volume_name().to_string()),
        AttributeKind::string("PostStepVolumeName", |h| h.step.post.volume_name().to_string()),
        // Positions and directions
        AttributeKind::vector3("Position", |h| h.step.post.position),
        AttributeKind::vector3("PostPosition", |h| h.step.post.position),
        AttributeKind::vector3("PrePosition", |h| h.step.pre.position),
        AttributeKind::vector3("PrePositionLocal", |h| h.step.pre.local_position()),
        AttributeKind::vector3("PostPositionLocal", |h| h.step.post.local_position()),
        AttributeKind::vector3("PreDirection", |h| h.step.pre.momentum_direction),
        AttributeKind::vector3("PostDirection", |h| h.step.post.momentum_direction),
        AttributeKind::vector3("TrackVertexPosition", |h| h.step.track_vertex_position),
        AttributeKind::vector3("TrackVertexMomentumDirection", |h| {
            h.step.track_vertex_direction
        }),
        AttributeKind::vector3("EventPosition", |h| h.step.event_position),
        // Volume identities
        AttributeKind::volume_id("PreStepUniqueVolumeID", |h| volume_identity(h, &h.step.pre)),
        AttributeKind::volume_id("PostStepUniqueVolumeID", |h| volume_identity(h, &h.step.post)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeType, AttributeValue};
    use crate::geometry::Vec3;
    use crate::step::{StepRecord, TouchableHistory, TouchableLevel};
    use crate::volume_id::VolumeIdentityManager;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let kinds = builtin_kinds();
        let names: HashSet<&str> = kinds.iter().map(|k| k.name()).collect();
        assert_eq!(names.len(), kinds.len());
    }

    #[test]
    fn test_every_type_is_represented() {
        let kinds = builtin_kinds();
        for t in AttributeType::all() {
            assert!(kinds.iter().any(|k| k.value_type() == t), "no {} kind", t);
        }
    }

    #[test]
    fn test_volume_identity_attribute() {
        let touchable = Arc::new(TouchableHistory::from_world_down(vec![
            TouchableLevel::new("world", 0, Vec3::ZERO),
            TouchableLevel::new("crystal", 4, Vec3::ZERO),
        ]));
        let step = StepRecord {
            pre: StepPoint {
                touchable: Some(touchable),
                ..Default::default()
            },
            ..Default::default()
        };
        let volumes = VolumeIdentityManager::new();
        let hit = HitContext::new(&step, &volumes);
        let kinds = builtin_kinds();

        let pre = kinds
            .iter()
            .find(|k| k.name() == "PreStepUniqueVolumeID")
            .unwrap();
        match pre.compute(&hit).unwrap() {
            AttributeValue::VolumeId(id) => assert_eq!(id.as_str(), "0_4"),
            other => panic!("unexpected {:?}", other),
        }

        let post = kinds
            .iter()
            .find(|k| k.name() == "PostStepUniqueVolumeID")
            .unwrap();
        match post.compute(&hit).unwrap() {
            AttributeValue::VolumeId(id) => assert_eq!(id.as_str(), ""),
            other => panic!("unexpected {:?}", other),
        }
    }
}
