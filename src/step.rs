//! Raw per-step records supplied by the host transport engine
//!
//! The recorder never mutates physics state: it reads a [`StepRecord`] for
//! every step, and the touchables attached to its pre/post points.
//!
//! Touchable depth follows the host convention: depth 0 is the volume the
//! point is in, depth `history_depth()` is the world.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::geometry::{Rotation3, Vec3};
use crate::volume_id::VolumeIdentityManager;

// ═══════════════════════════════════════════════════════════════════════════════
// TOUCHABLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Read access to the geometric ancestry of a step point
pub trait Touchable {
    /// Depth of the innermost level (0 for a point in the world volume)
    fn history_depth(&self) -> usize;

    /// Number of levels; 0 when the point is outside the world
    fn level_count(&self) -> usize;

    /// Copy number of the volume `depth` levels above the current one.
    ///
    /// For parameterised or replicated volumes this is the replica number of
    /// the visited instance, which is what identifies it uniquely.
    fn copy_number(&self, depth: usize) -> i32;

    fn volume_name(&self, depth: usize) -> &str;

    fn translation(&self, depth: usize) -> Vec3;

    fn rotation(&self, depth: usize) -> Rotation3;
}

/// One level of a touchable history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchableLevel {
    /// Logical/physical volume name
    pub volume_name: String,
    /// Copy number of the visited instance at this depth
    pub copy_number: i32,
    /// Copy number declared on the physical volume placement. Identical to
    /// `copy_number` for plain placements, shared by every instance of a
    /// parameterised volume.
    pub placement_copy_number: i32,
    /// Global translation of the volume frame
    pub translation: Vec3,
    /// Global rotation of the volume frame
    pub rotation: Rotation3,
}

impl TouchableLevel {
    pub fn new(volume_name: &str, copy_number: i32, translation: Vec3) -> Self {
        Self {
            volume_name: volume_name.to_string(),
            copy_number,
            placement_copy_number: copy_number,
            translation,
            rotation: Rotation3::identity(),
        }
    }

    /// Instance `replica` of a parameterised volume placed with `placement_copy_number`
    pub fn parameterised(
        volume_name: &str,
        placement_copy_number: i32,
        replica: i32,
        translation: Vec3,
    ) -> Self {
        Self {
            volume_name: volume_name.to_string(),
            copy_number: replica,
            placement_copy_number,
            translation,
            rotation: Rotation3::identity(),
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation3) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Concrete touchable: levels ordered from the world (index 0) to the
/// innermost volume (last index)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchableHistory {
    levels: Vec<TouchableLevel>,
}

impl TouchableHistory {
    /// Build from levels ordered world first
    pub fn from_world_down(levels: Vec<TouchableLevel>) -> Self {
        Self { levels }
    }

    /// Levels ordered world first. Note that iterating the levels gives the
    /// placement view of each volume; use [`Touchable::copy_number`] for
    /// per-depth identification.
    pub fn levels(&self) -> &[TouchableLevel] {
        &self.levels
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Placement copy numbers, world first. Every instance of a
    /// parameterised volume shares these, so they cannot identify a hit.
    pub fn placement_copy_numbers(&self) -> Vec<i32> {
        self.levels.iter().map(|l| l.placement_copy_number).collect()
    }

    /// Whether any level of the history is the named volume
    pub fn contains_volume(&self, name: &str) -> bool {
        self.levels.iter().any(|l| l.volume_name == name)
    }

    /// Level at a given depth counted from the innermost volume
    fn level(&self, depth: usize) -> Option<&TouchableLevel> {
        let n = self.levels.len();
        if depth < n {
            Some(&self.levels[n - 1 - depth])
        } else {
            None
        }
    }

    /// Convert a global point to the frame of the innermost volume
    pub fn to_local(&self, global: &Vec3) -> Vec3 {
        match self.level(0) {
            Some(l) => l.rotation.apply_inverse(&(*global - l.translation)),
            None => *global,
        }
    }

    /// Convert a global direction to the frame of the innermost volume
    pub fn direction_to_local(&self, global: &Vec3) -> Vec3 {
        match self.level(0) {
            Some(l) => l.rotation.apply_inverse(global),
            None => *global,
        }
    }
}

impl Touchable for TouchableHistory {
    fn history_depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn copy_number(&self, depth: usize) -> i32 {
        self.level(depth).map(|l| l.copy_number).unwrap_or(-1)
    }

    fn volume_name(&self, depth: usize) -> &str {
        self.level(depth).map(|l| l.volume_name.as_str()).unwrap_or("")
    }

    fn translation(&self, depth: usize) -> Vec3 {
        self.level(depth).map(|l| l.translation).unwrap_or_default()
    }

    fn rotation(&self, depth: usize) -> Rotation3 {
        self.level(depth).map(|l| l.rotation).unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STEPS, TRACKS, EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Pre- or post-step point of a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepPoint {
    pub position: Vec3,
    pub momentum_direction: Vec3,
    pub kinetic_energy: f64,
    pub global_time: f64,
    pub local_time: f64,
    /// `None` once the particle has left the world
    pub touchable: Option<Arc<TouchableHistory>>,
}

impl StepPoint {
    pub fn volume_name(&self) -> &str {
        self.touchable
            .as_ref()
            .map(|t| t.volume_name(0))
            .unwrap_or("")
    }

    pub fn copy_number(&self) -> i32 {
        self.touchable
            .as_ref()
            .map(|t| t.copy_number(0))
            .unwrap_or(-1)
    }

    pub fn local_position(&self) -> Vec3 {
        self.touchable
            .as_ref()
            .map(|t| t.to_local(&self.position))
            .unwrap_or(self.position)
    }
}

/// One simulation step as seen by the recorder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub pre: StepPoint,
    pub post: StepPoint,
    /// Energy deposited along the step (MeV)
    pub total_energy_deposit: f64,
    pub step_length: f64,
    pub weight: f64,
    pub track_id: i64,
    pub parent_id: i64,
    pub event_id: i64,
    pub run_id: i64,
    pub thread_id: i64,
    pub pdg_code: i64,
    pub particle_name: String,
    /// Process that created the track ("none" for primaries)
    pub creator_process: String,
    /// Process that limited this step
    pub process_defined_step: String,
    pub track_vertex_position: Vec3,
    pub track_vertex_kinetic_energy: f64,
    pub track_vertex_direction: Vec3,
    /// Primary vertex of the event
    pub event_position: Vec3,
}

impl StepRecord {
    /// Whether the track that made this step is a primary
    pub fn is_primary(&self) -> bool {
        self.parent_id == 0
    }
}

/// All steps of one track
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: i64,
    pub steps: Vec<StepRecord>,
}

/// All tracks of one event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: i64,
    pub tracks: Vec<TrackRecord>,
}

impl EventRecord {
    pub fn step_count(&self) -> usize {
        self.tracks.iter().map(|t| t.steps.len()).sum()
    }
}

/// What a compute function sees for one hit
#[derive(Clone, Copy)]
pub struct HitContext<'a> {
    pub step: &'a StepRecord,
    pub volumes: &'a VolumeIdentityManager,
}

impl<'a> HitContext<'a> {
    pub fn new(step: &'a StepRecord, volumes: &'a VolumeIdentityManager) -> Self {
        Self { step, volumes }
    }
}
