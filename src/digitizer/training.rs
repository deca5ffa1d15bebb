//! Training-set rows for angular response functions: the incident particle
//! on a detector plane paired with the energy window it ended up in

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::attributes::{AttributeKind, AttributeType, TypedColumn};
use crate::error::RecorderError;
use crate::geometry::Vec3;
use crate::step::StepRecord;
use crate::RecorderResult;

pub const KINETIC_ENERGY: &str = "KineticEnergy";
pub const THETA: &str = "Theta";
pub const PHI: &str = "Phi";
pub const WINDOW_ID: &str = "EnergyWindowID";

/// Columns of a training-set collection, filled by hand
pub fn training_columns() -> Vec<TypedColumn> {
    vec![
        AttributeKind::manual(KINETIC_ENERGY, AttributeType::Double).new_column(),
        AttributeKind::manual(THETA, AttributeType::Double).new_column(),
        AttributeKind::manual(PHI, AttributeType::Double).new_column(),
        AttributeKind::manual(WINDOW_ID, AttributeType::Int).new_column(),
    ]
}

/// Primary particle crossing into the detector plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncidentParticle {
    pub kinetic_energy: f64,
    pub direction: Vec3,
}

impl IncidentParticle {
    /// The step of a primary entering `plane_volume`, if this is one
    pub fn from_step(step: &StepRecord, plane_volume: &str) -> Option<Self> {
        let entering =
            step.post.volume_name() == plane_volume && step.pre.volume_name() != plane_volume;
        if !step.is_primary() || !entering {
            return None;
        }
        Some(Self {
            kinetic_energy: step.post.kinetic_energy,
            direction: step.post.momentum_direction,
        })
    }

    /// `(theta, phi)` in degrees, both measured from the plane axes:
    /// `theta = acos(dir.y)`, `phi = acos(dir.x)`
    pub fn angles(&self) -> (f64, f64) {
        let d = self.direction.normalized();
        let theta = d.y.clamp(-1.0, 1.0).acos().to_degrees();
        let phi = d.x.clamp(-1.0, 1.0).acos().to_degrees();
        (theta, phi)
    }
}

/// Keeps events that reached no window with probability `1/factor`
#[derive(Debug, Clone)]
pub struct RussianRoulette {
    factor: u32,
    rng: StdRng,
}

impl RussianRoulette {
    pub fn new(factor: u32, seed: u64) -> RecorderResult<Self> {
        if factor == 0 {
            return Err(RecorderError::InvalidParameter(
                "russian roulette factor must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            factor,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Whether an event with the given (exposed) window id is kept
    pub fn keep(&mut self, window_id: i64) -> bool {
        if window_id != 0 || self.factor == 1 {
            return true;
        }
        self.rng.gen::<f64>() < 1.0 / self.factor as f64
    }
}
