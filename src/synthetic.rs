//! Toy SPECT event source
//!
//! A point source emits 140.5 keV photons towards a detector head. Each
//! photon crosses the `arf_plane` in front of the head, then is absorbed in a
//! crystal pixel, deposits part of its energy and escapes, or misses the head.
//!
//! ```text
//! world ─┬─ arf_plane            (z = 90)
//!        └─ head (z = 100) ─── crystal[pixel]   (16 × 16 pixels, 4 mm pitch)
//! ```
//!
//! Events are generated from `(seed, run, event)` alone, so the same
//! simulation is produced whatever the number of threads.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::engine::EventSource;
use crate::geometry::Vec3;
use crate::step::{EventRecord, StepPoint, StepRecord, TouchableHistory, TouchableLevel, TrackRecord};

/// Photon energy of the source (MeV)
pub const PHOTON_ENERGY: f64 = 0.1405;
pub const PIXELS_PER_SIDE: i32 = 16;
pub const PIXEL_PITCH: f64 = 4.0;
pub const PLANE_Z: f64 = 90.0;
pub const HEAD_Z: f64 = 100.0;

/// Outcome probabilities of a photon reaching the head
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionModel {
    /// Photon leaves the world without touching the head
    pub miss: f64,
    /// Photon deposits only part of its energy
    pub scatter: f64,
}

impl Default for InteractionModel {
    fn default() -> Self {
        Self {
            miss: 0.2,
            scatter: 0.3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpectSource {
    runs: usize,
    events_per_run: usize,
    seed: u64,
    model: InteractionModel,
    world: Arc<TouchableHistory>,
    plane: Arc<TouchableHistory>,
}

impl SpectSource {
    pub fn new(runs: usize, events_per_run: usize, seed: u64) -> Self {
        let world = TouchableLevel::new("world", 0, Vec3::ZERO);
        Self {
            runs,
            events_per_run,
            seed,
            model: InteractionModel::default(),
            world: Arc::new(TouchableHistory::from_world_down(vec![world.clone()])),
            plane: Arc::new(TouchableHistory::from_world_down(vec![
                world,
                TouchableLevel::new("arf_plane", 0, Vec3::new(0.0, 0.0, PLANE_Z)),
            ])),
        }
    }

    pub fn with_model(mut self, model: InteractionModel) -> Self {
        self.model = model;
        self
    }

    fn crystal(&self, pixel: i32) -> Arc<TouchableHistory> {
        Arc::new(TouchableHistory::from_world_down(vec![
            TouchableLevel::new("world", 0, Vec3::ZERO),
            TouchableLevel::new("head", 0, Vec3::new(0.0, 0.0, HEAD_Z)),
            TouchableLevel::new("crystal", pixel, pixel_center(pixel)),
        ]))
    }

    fn rng_for(&self, run: usize, event: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ ((run as u64) << 32) ^ event as u64)
    }
}

/// Centre of a pixel in the world frame
pub fn pixel_center(pixel: i32) -> Vec3 {
    let half = PIXELS_PER_SIDE as f64 / 2.0;
    let ix = (pixel % PIXELS_PER_SIDE) as f64;
    let iy = (pixel / PIXELS_PER_SIDE) as f64;
    Vec3::new(
        (ix - half + 0.5) * PIXEL_PITCH,
        (iy - half + 0.5) * PIXEL_PITCH,
        HEAD_Z,
    )
}

/// Pixel hit by a point of the head face, if any
pub fn pixel_at(x: f64, y: f64) -> Option<i32> {
    let half = PIXELS_PER_SIDE as f64 / 2.0;
    let ix = (x / PIXEL_PITCH + half).floor();
    let iy = (y / PIXEL_PITCH + half).floor();
    let range = 0.0..PIXELS_PER_SIDE as f64;
    if range.contains(&ix) && range.contains(&iy) {
        Some(iy as i32 * PIXELS_PER_SIDE + ix as i32)
    } else {
        None
    }
}

impl EventSource for SpectSource {
    fn number_of_runs(&self) -> usize {
        self.runs
    }

    fn events_in_run(&self, _run: usize) -> usize {
        self.events_per_run
    }

    fn generate(&self, run: usize, event: usize) -> EventRecord {
        let mut rng = self.rng_for(run, event);
        let event_id = event as i64;

        // direction inside a narrow cone around +z
        let dx: f64 = rng.gen_range(-0.3..0.3);
        let dy: f64 = rng.gen_range(-0.3..0.3);
        let direction = Vec3::new(dx, dy, 1.0).normalized();
        let at_z = |z: f64| direction.scale(z / direction.z);

        let photon = StepRecord {
            event_id,
            track_id: 1,
            parent_id: 0,
            pdg_code: 22,
            weight: 1.0,
            particle_name: "gamma".to_string(),
            creator_process: "none".to_string(),
            track_vertex_kinetic_energy: PHOTON_ENERGY,
            track_vertex_direction: direction,
            ..Default::default()
        };
        let point = |position: Vec3, kinetic_energy: f64, touchable: Option<&Arc<TouchableHistory>>| StepPoint {
            position,
            momentum_direction: direction,
            kinetic_energy,
            global_time: position.norm() / 299.792458,
            local_time: position.norm() / 299.792458,
            touchable: touchable.cloned(),
        };

        let mut steps = vec![
            StepRecord {
                pre: point(Vec3::ZERO, PHOTON_ENERGY, Some(&self.world)),
                post: point(at_z(PLANE_Z), PHOTON_ENERGY, Some(&self.plane)),
                step_length: at_z(PLANE_Z).norm(),
                process_defined_step: "Transportation".to_string(),
                ..photon.clone()
            },
            StepRecord {
                pre: point(at_z(PLANE_Z), PHOTON_ENERGY, Some(&self.plane)),
                post: point(at_z(HEAD_Z), PHOTON_ENERGY, Some(&self.world)),
                step_length: HEAD_Z - PLANE_Z,
                process_defined_step: "Transportation".to_string(),
                ..photon.clone()
            },
        ];
        let mut tracks = Vec::new();

        let entry = at_z(HEAD_Z);
        let pixel = pixel_at(entry.x, entry.y);
        let roll: f64 = rng.gen();
        match pixel {
            Some(pixel) if roll >= self.model.miss => {
                let crystal = self.crystal(pixel);
                let scattered = roll < self.model.miss + self.model.scatter;
                let deposited = if scattered {
                    rng.gen_range(0.09..0.13)
                } else {
                    PHOTON_ENERGY
                };
                let first: f64 = deposited * rng.gen_range(0.2..0.8);
                let first_end = entry + direction.scale(rng.gen_range(0.5..3.0));
                let second_end = first_end + direction.scale(rng.gen_range(0.5..3.0));
                steps.push(StepRecord {
                    pre: point(entry, PHOTON_ENERGY, Some(&crystal)),
                    post: point(first_end, PHOTON_ENERGY - first, Some(&crystal)),
                    total_energy_deposit: first,
                    step_length: (first_end - entry).norm(),
                    process_defined_step: "compt".to_string(),
                    ..photon.clone()
                });
                let electron_deposit = (deposited - first) * 0.25;
                let photon_deposit = deposited - first - electron_deposit;
                steps.push(StepRecord {
                    pre: point(first_end, PHOTON_ENERGY - first, Some(&crystal)),
                    post: point(second_end, PHOTON_ENERGY - deposited, Some(&crystal)),
                    total_energy_deposit: photon_deposit,
                    step_length: (second_end - first_end).norm(),
                    process_defined_step: if scattered { "compt" } else { "phot" }.to_string(),
                    ..photon.clone()
                });
                tracks.push(TrackRecord {
                    track_id: 2,
                    steps: vec![StepRecord {
                        pre: point(second_end, electron_deposit, Some(&crystal)),
                        post: point(second_end + Vec3::new(0.0, 0.0, 0.01), 0.0, Some(&crystal)),
                        total_energy_deposit: electron_deposit,
                        step_length: 0.01,
                        track_id: 2,
                        parent_id: 1,
                        pdg_code: 11,
                        particle_name: "e-".to_string(),
                        creator_process: if scattered { "compt" } else { "phot" }.to_string(),
                        process_defined_step: "eIoni".to_string(),
                        track_vertex_position: second_end,
                        track_vertex_kinetic_energy: electron_deposit,
                        ..photon.clone()
                    }],
                });
            }
            _ => {
                let exit = at_z(2.0 * HEAD_Z);
                steps.push(StepRecord {
                    pre: point(entry, PHOTON_ENERGY, Some(&self.world)),
                    post: point(exit, PHOTON_ENERGY, None),
                    step_length: (exit - entry).norm(),
                    process_defined_step: "Transportation".to_string(),
                    ..photon.clone()
                });
            }
        }

        tracks.insert(0, TrackRecord { track_id: 1, steps });
        EventRecord { event_id, tracks }
    }
}
