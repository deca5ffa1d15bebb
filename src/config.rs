//! Recording configuration
//!
//! Loaded from JSON; every field has a default so partial files work.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::digitizer::{AdderPolicy, EnergyChannel};
use crate::error::RecorderError;
use crate::RecorderResult;

fn default_clear_every() -> usize {
    1
}

fn default_roulette() -> u32 {
    1
}

/// A collection filled from the steps of every event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsCollectionConfig {
    pub name: String,
    /// No output file disables persistence
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub attributes: Vec<String>,
    #[serde(default = "default_clear_every")]
    pub clear_every_n_events: usize,
    /// Record steps that deposited no energy
    #[serde(default)]
    pub keep_zero_edep: bool,
    /// Fill one default row for events that recorded nothing
    #[serde(default)]
    pub store_empty_events: bool,
    /// Volumes whose steps are recorded; empty means all
    #[serde(default)]
    pub volumes: Vec<String>,
}

impl HitsCollectionConfig {
    pub fn new(name: &str, attributes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            output: None,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            clear_every_n_events: 1,
            keep_zero_edep: false,
            store_empty_events: false,
            volumes: Vec::new(),
        }
    }
}

/// Per-event merge of an input collection into singles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdderConfig {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub policy: String,
    /// Group by the volume identity truncated at this depth
    #[serde(default)]
    pub group_volume_depth: Option<usize>,
    #[serde(default = "default_clear_every")]
    pub clear_every_n_events: usize,
}

impl AdderConfig {
    pub fn new(name: &str, input: &str, policy: AdderPolicy) -> Self {
        Self {
            name: name.to_string(),
            input: input.to_string(),
            output: None,
            policy: policy.name().to_string(),
            group_volume_depth: None,
            clear_every_n_events: 1,
        }
    }

    pub fn policy(&self) -> RecorderResult<AdderPolicy> {
        self.policy.parse()
    }
}

/// Energy windows; each channel becomes a collection named after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyWindowsConfig {
    pub name: String,
    pub input: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
    pub channels: Vec<EnergyChannel>,
    #[serde(default = "default_clear_every")]
    pub clear_every_n_events: usize,
}

/// Incident-particle training set driven by an energy-window router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDatasetConfig {
    pub name: String,
    pub energy_windows: String,
    pub plane_volume: String,
    #[serde(default = "default_roulette")]
    pub russian_roulette: u32,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_clear_every")]
    pub clear_every_n_events: usize,
}

/// Complete recording setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// 0 runs everything on the master thread
    pub number_of_threads: usize,
    pub seed: u64,
    pub statistics: bool,
    pub hits: Vec<HitsCollectionConfig>,
    pub adders: Vec<AdderConfig>,
    pub energy_windows: Vec<EnergyWindowsConfig>,
    pub training_datasets: Vec<TrainingDatasetConfig>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            number_of_threads: 0,
            seed: 123_456,
            statistics: true,
            hits: Vec::new(),
            adders: Vec::new(),
            energy_windows: Vec::new(),
            training_datasets: Vec::new(),
        }
    }
}

impl RecorderConfig {
    /// One persistent hits collection
    pub fn minimal() -> Self {
        let mut hits = HitsCollectionConfig::new(
            "Hits",
            &["TotalEnergyDeposit", "PostPosition", "GlobalTime", "PreStepUniqueVolumeID"],
        );
        hits.output = Some(PathBuf::from("hits.json"));
        Self {
            hits: vec![hits],
            ..Self::default()
        }
    }

    /// SPECT head: crystal hits, winner-take-all singles, a Tc99m
    /// scatter/peak window pair and an incident-photon training set
    pub fn spect() -> Self {
        let mut hits = HitsCollectionConfig::new(
            "Hits",
            &[
                "TotalEnergyDeposit",
                "PostPosition",
                "GlobalTime",
                "PreStepUniqueVolumeID",
                "EventID",
                "TrackID",
                "ParticleName",
                "TrackCreatorProcess",
            ],
        );
        hits.output = Some(PathBuf::from("spect.json"));
        hits.volumes = vec!["crystal".to_string()];

        let mut singles = AdderConfig::new("Singles", "Hits", AdderPolicy::EnergyWinnerPosition);
        singles.output = Some(PathBuf::from("spect.json"));

        let windows = EnergyWindowsConfig {
            name: "EnergyWindows".to_string(),
            input: "Singles".to_string(),
            output: Some(PathBuf::from("spect.json")),
            channels: vec![
                EnergyChannel::new("scatter", 0.114, 0.126),
                EnergyChannel::new("peak", 0.126, 0.154),
            ],
            clear_every_n_events: 1,
        };

        let training = TrainingDatasetConfig {
            name: "ArfTraining".to_string(),
            energy_windows: "EnergyWindows".to_string(),
            plane_volume: "arf_plane".to_string(),
            russian_roulette: 50,
            output: Some(PathBuf::from("arf_training.json")),
            clear_every_n_events: 1,
        };

        Self {
            hits: vec![hits],
            adders: vec![singles],
            energy_windows: vec![windows],
            training_datasets: vec![training],
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> RecorderResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RecorderError::Serialization(format!("{}: {}", path.display(), e)))?;
        log::info!("Loaded recording configuration from {:?}", path);
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> RecorderResult<()> {
        let json = self.to_json()?;
        fs::write(path.as_ref(), json)?;
        log::info!("Saved recording configuration to {:?}", path.as_ref());
        Ok(())
    }

    pub fn to_json(&self) -> RecorderResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RecorderError::Serialization(e.to_string()))
    }

    /// Prefix every relative output path with `dir`
    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        let relocate = |output: &mut Option<PathBuf>| {
            if let Some(path) = output {
                if path.is_relative() {
                    *path = dir.join(&*path);
                }
            }
        };
        self.hits.iter_mut().for_each(|c| relocate(&mut c.output));
        self.adders.iter_mut().for_each(|c| relocate(&mut c.output));
        self.energy_windows.iter_mut().for_each(|c| relocate(&mut c.output));
        self.training_datasets.iter_mut().for_each(|c| relocate(&mut c.output));
        self
    }

    /// Names of every collection, in creation order
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.hits.iter().map(|h| h.name.clone()).collect();
        names.extend(self.adders.iter().map(|a| a.name.clone()));
        for windows in &self.energy_windows {
            names.extend(windows.channels.iter().map(|c| c.name.clone()));
        }
        names.extend(self.training_datasets.iter().map(|t| t.name.clone()));
        names
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> RecorderResult<()> {
        let mut seen = HashSet::new();
        for name in self.collection_names() {
            if !seen.insert(name.clone()) {
                return Err(RecorderError::DuplicateTuple(name));
            }
        }

        let check_cadence = |name: &str, n: usize| {
            if n == 0 {
                Err(RecorderError::InvalidParameter(format!(
                    "'{}': clear_every_n_events must be at least 1",
                    name
                )))
            } else {
                Ok(())
            }
        };

        // derived collections may only read collections filled before them
        let mut available: HashSet<&str> = HashSet::new();
        for hits in &self.hits {
            check_cadence(&hits.name, hits.clear_every_n_events)?;
            available.insert(&hits.name);
        }
        for adder in &self.adders {
            check_cadence(&adder.name, adder.clear_every_n_events)?;
            if !available.contains(adder.input.as_str()) {
                return Err(RecorderError::UnknownCollection(adder.input.clone()));
            }
            adder.policy()?;
            available.insert(&adder.name);
        }
        let mut routers = HashSet::new();
        for windows in &self.energy_windows {
            check_cadence(&windows.name, windows.clear_every_n_events)?;
            if !available.contains(windows.input.as_str()) {
                return Err(RecorderError::UnknownCollection(windows.input.clone()));
            }
            if windows.channels.is_empty() {
                return Err(RecorderError::InvalidParameter(format!(
                    "energy windows '{}' has no channel",
                    windows.name
                )));
            }
            for channel in &windows.channels {
                channel.validate()?;
            }
            if !routers.insert(windows.name.as_str()) {
                return Err(RecorderError::DuplicateTuple(windows.name.clone()));
            }
        }
        for training in &self.training_datasets {
            check_cadence(&training.name, training.clear_every_n_events)?;
            if !routers.contains(training.energy_windows.as_str()) {
                return Err(RecorderError::UnknownCollection(training.energy_windows.clone()));
            }
            if training.russian_roulette == 0 {
                return Err(RecorderError::InvalidParameter(format!(
                    "'{}': russian_roulette must be at least 1",
                    training.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_presets_are_valid() {
        RecorderConfig::spect().validate().unwrap();
        RecorderConfig::minimal().validate().unwrap();
        RecorderConfig::default().validate().unwrap();
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = RecorderConfig::spect();
        config.to_json_file(&path).unwrap();
        let loaded = RecorderConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "hits": [ { "name": "H", "attributes": ["EventID"] } ] }"#;
        let config: RecorderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.hits[0].clear_every_n_events, 1);
        assert!(config.hits[0].output.is_none());
        assert!(config.statistics);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let mut config = RecorderConfig::spect();
        config.adders[0].policy = "TakeAll".to_string();
        assert!(matches!(
            config.validate(),
            Err(RecorderError::UnknownPolicy { .. })
        ));
    }

    #[test]
    fn test_duplicate_and_unknown_names_rejected() {
        let mut config = RecorderConfig::spect();
        config.adders[0].name = "Hits".to_string();
        assert!(matches!(config.validate(), Err(RecorderError::DuplicateTuple(_))));

        let mut config = RecorderConfig::spect();
        config.energy_windows[0].input = "Nope".to_string();
        assert!(matches!(config.validate(), Err(RecorderError::UnknownCollection(_))));

        let mut config = RecorderConfig::spect();
        config.training_datasets[0].russian_roulette = 0;
        assert!(config.validate().is_err());

        let mut config = RecorderConfig::spect();
        config.energy_windows[0].channels[0].max = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_output_dir_prefix() {
        let config = RecorderConfig::minimal().with_output_dir(Path::new("/tmp/run"));
        assert_eq!(config.hits[0].output, Some(PathBuf::from("/tmp/run/hits.json")));
    }
}
