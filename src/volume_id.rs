//! Volume identity: canonical key of a nested volume instance
//!
//! A hit is attributed to the physical volume instance it happened in. The
//! instance is identified by the copy numbers of every level of its ancestry,
//! most global first, e.g. `0_1_7` for crystal 7 of head 1 in the world.
//!
//! ```text
//!   depth:   0      1      2      3 ...  14
//!   key:   [ 0  ,  1  ,  7  , -1 ... -1 ]  len 3   (-1 past len = padding)
//!   id:    "0_1_7"
//! ```
//!
//! The key is used as an aggregation key, so equality, hashing and ordering
//! of [`VolumeIdentity`] all go through the key array and never through the
//! touchable the identity was built from. The [`VolumeIdentityManager`] keeps
//! one shared instance per distinct key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::RecorderError;
use crate::geometry::{Rotation3, Vec3};
use crate::step::Touchable;
use crate::RecorderResult;

/// Maximum number of geometry levels a key can hold
pub const MAX_VOLUME_DEPTH: usize = 15;

/// Separator between copy numbers in the string form
pub const VOLUME_ID_SEPARATOR: char = '_';

/// Padding of key entries beyond the used levels
pub const UNUSED_LEVEL: i32 = -1;

// ═══════════════════════════════════════════════════════════════════════════════
// KEY
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-size array of per-depth copy numbers, world first, and the number
/// of levels in use. A copy number of -1 inside the used levels is a real
/// copy number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeKey {
    copy_numbers: [i32; MAX_VOLUME_DEPTH],
    len: u8,
}

impl Default for VolumeKey {
    fn default() -> Self {
        Self {
            copy_numbers: [UNUSED_LEVEL; MAX_VOLUME_DEPTH],
            len: 0,
        }
    }
}

impl VolumeKey {
    /// Compute the key of the volume a touchable points to.
    ///
    /// Uses the per-depth copy number accessor: iterating the placements
    /// would give the same number to every instance of a parameterised
    /// volume. A touchable without levels gives the empty key.
    pub fn compute<T: Touchable + ?Sized>(touchable: &T) -> RecorderResult<Self> {
        if touchable.level_count() == 0 {
            return Ok(Self::default());
        }
        let depth = touchable.history_depth();
        if depth >= MAX_VOLUME_DEPTH {
            return Err(RecorderError::VolumeTooDeep {
                depth,
                max: MAX_VOLUME_DEPTH - 1,
            });
        }
        let mut key = Self::default();
        for i in 0..=depth {
            key.copy_numbers[i] = touchable.copy_number(depth - i);
        }
        key.len = (depth + 1) as u8;
        Ok(key)
    }

    /// Build a key from copy numbers listed world first
    pub fn from_copy_numbers(copy_numbers: &[i32]) -> RecorderResult<Self> {
        if copy_numbers.len() > MAX_VOLUME_DEPTH {
            return Err(RecorderError::VolumeTooDeep {
                depth: copy_numbers.len() - 1,
                max: MAX_VOLUME_DEPTH - 1,
            });
        }
        let mut key = Self::default();
        key.copy_numbers[..copy_numbers.len()].copy_from_slice(copy_numbers);
        key.len = copy_numbers.len() as u8;
        Ok(key)
    }

    /// Every entry, padding included
    pub fn as_array(&self) -> &[i32; MAX_VOLUME_DEPTH] {
        &self.copy_numbers
    }

    /// Used levels only
    pub fn as_slice(&self) -> &[i32] {
        &self.copy_numbers[..self.len()]
    }

    /// Number of used levels
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Key of the ancestor at `depth` (0 = world): levels deeper than
    /// `depth` are dropped
    pub fn truncated(&self, depth: usize) -> Self {
        let mut key = *self;
        let keep = self.len().min(depth + 1);
        for c in key.copy_numbers.iter_mut().skip(keep) {
            *c = UNUSED_LEVEL;
        }
        key.len = keep as u8;
        key
    }

    /// Canonical string form: used levels joined by the separator
    pub fn to_id_string(&self) -> String {
        self.as_slice()
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(&VOLUME_ID_SEPARATOR.to_string())
    }
}

impl fmt::Display for VolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_id_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-depth description kept for display and debugging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDepthId {
    /// 0 = world
    pub depth: usize,
    pub volume_name: String,
    pub copy_number: i32,
    pub translation: Vec3,
    pub rotation: Rotation3,
}

/// Identity of one physical volume instance
#[derive(Debug, Clone, Default)]
pub struct VolumeIdentity {
    key: VolumeKey,
    id: String,
    levels: Vec<VolumeDepthId>,
}

impl VolumeIdentity {
    pub fn new<T: Touchable + ?Sized>(touchable: &T) -> RecorderResult<Self> {
        let key = VolumeKey::compute(touchable)?;
        let depth = touchable.history_depth();
        let levels = (0..key.len())
            .map(|i| VolumeDepthId {
                depth: i,
                volume_name: touchable.volume_name(depth - i).to_string(),
                copy_number: touchable.copy_number(depth - i),
                translation: touchable.translation(depth - i),
                rotation: touchable.rotation(depth - i),
            })
            .collect();
        Ok(Self {
            id: key.to_id_string(),
            key,
            levels,
        })
    }

    /// Identity used for points outside the world and for default rows
    pub fn empty() -> Arc<VolumeIdentity> {
        static EMPTY: OnceLock<Arc<VolumeIdentity>> = OnceLock::new();
        EMPTY
            .get_or_init(|| Arc::new(VolumeIdentity::default()))
            .clone()
    }

    pub fn key(&self) -> &VolumeKey {
        &self.key
    }

    /// Canonical string form
    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn levels(&self) -> &[VolumeDepthId] {
        &self.levels
    }

    /// String form restricted to levels `0..=depth`
    pub fn id_up_to_depth(&self, depth: usize) -> String {
        self.key.truncated(depth).to_id_string()
    }

    /// Human readable dump of the ancestry
    pub fn describe(&self) -> String {
        self.levels
            .iter()
            .map(|l| format!("{}:{}[{}] at {}", l.depth, l.volume_name, l.copy_number, l.translation))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

impl PartialEq for VolumeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for VolumeIdentity {}

impl Hash for VolumeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for VolumeIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VolumeIdentity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for VolumeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MANAGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache of volume identities shared by every thread
#[derive(Debug, Default)]
pub struct VolumeIdentityManager {
    cache: RwLock<HashMap<VolumeKey, Arc<VolumeIdentity>>>,
}

impl VolumeIdentityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached identity for this touchable, creating it on first use
    pub fn get_or_create<T: Touchable + ?Sized>(
        &self,
        touchable: &T,
    ) -> RecorderResult<Arc<VolumeIdentity>> {
        let key = VolumeKey::compute(touchable)?;
        if key.is_empty() {
            return Ok(VolumeIdentity::empty());
        }
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(identity) = cache.get(&key) {
                return Ok(Arc::clone(identity));
            }
        }
        let identity = Arc::new(VolumeIdentity::new(touchable)?);
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.entry(key).or_insert(identity)))
    }

    /// Cached identity for a key, if any hit has produced it
    pub fn get(&self, key: &VolumeKey) -> Option<Arc<VolumeIdentity>> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    /// Number of distinct identities seen so far
    pub fn len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{TouchableHistory, TouchableLevel};

    fn touchable(copies: &[i32]) -> TouchableHistory {
        TouchableHistory::from_world_down(
            copies
                .iter()
                .enumerate()
                .map(|(i, &c)| TouchableLevel::new(&format!("level{}", i), c, Vec3::ZERO))
                .collect(),
        )
    }

    #[test]
    fn test_key_is_world_first_and_padded() {
        let key = VolumeKey::compute(&touchable(&[0, 1, 7])).unwrap();
        assert_eq!(&key.as_array()[..4], &[0, 1, 7, UNUSED_LEVEL]);
        assert_eq!(key.len(), 3);
        assert_eq!(key.to_id_string(), "0_1_7");
    }

    #[test]
    fn test_identical_paths_share_cached_identity() {
        let manager = VolumeIdentityManager::new();
        let a = manager.get_or_create(&touchable(&[0, 2, 5])).unwrap();
        let b = manager.get_or_create(&touchable(&[0, 2, 5])).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(a.key().as_array(), b.key().as_array());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_parameterised_instances_are_distinct() {
        let make = |replica| {
            TouchableHistory::from_world_down(vec![
                TouchableLevel::new("world", 0, Vec3::ZERO),
                TouchableLevel::parameterised("pixel", 0, replica, Vec3::ZERO),
            ])
        };
        let manager = VolumeIdentityManager::new();
        // the placement view cannot tell the replicas apart
        assert_eq!(make(3).placement_copy_numbers(), make(4).placement_copy_numbers());
        let a = manager.get_or_create(&make(3)).unwrap();
        let b = manager.get_or_create(&make(4)).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "0_3");
        assert_eq!(b.as_str(), "0_4");
    }

    #[test]
    fn test_equality_is_by_key_not_by_origin() {
        let a = VolumeIdentity::new(&touchable(&[0, 1])).unwrap();
        let mut other = touchable(&[0, 1]);
        other = TouchableHistory::from_world_down(
            other
                .levels()
                .iter()
                .cloned()
                .map(|mut l| {
                    l.volume_name = "renamed".into();
                    l
                })
                .collect(),
        );
        let b = VolumeIdentity::new(&other).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_truncated_key_and_partial_id() {
        let id = VolumeIdentity::new(&touchable(&[0, 3, 9, 4])).unwrap();
        assert_eq!(id.id_up_to_depth(1), "0_3");
        assert_eq!(id.key().truncated(1).len(), 2);
        assert_eq!(id.levels().len(), 4);
        assert_eq!(id.levels()[2].copy_number, 9);
    }

    #[test]
    fn test_negative_copy_number_inside_path_is_kept() {
        let key = VolumeKey::compute(&touchable(&[0, -1, 7])).unwrap();
        assert_eq!(key.len(), 3);
        assert_eq!(key.as_slice(), &[0, -1, 7]);
        assert_eq!(key.to_id_string(), "0_-1_7");
        let shorter = VolumeKey::from_copy_numbers(&[0]).unwrap();
        assert_ne!(key, shorter);
        assert_eq!(key.truncated(0), shorter);
    }

    #[test]
    fn test_empty_history_maps_to_empty_identity() {
        let manager = VolumeIdentityManager::new();
        let id = manager.get_or_create(&TouchableHistory::default()).unwrap();
        assert!(Arc::ptr_eq(&id, &VolumeIdentity::empty()));
        assert!(id.key().is_empty());
        assert!(manager.is_empty());
        assert!(VolumeIdentity::new(&TouchableHistory::default()).unwrap().levels().is_empty());
    }

    #[test]
    fn test_too_deep_touchable_fails() {
        let copies: Vec<i32> = (0..(MAX_VOLUME_DEPTH as i32 + 1)).collect();
        let result = VolumeKey::compute(&touchable(&copies));
        assert!(matches!(result, Err(RecorderError::VolumeTooDeep { .. })));
    }

    #[test]
    fn test_empty_identity_has_empty_string() {
        let empty = VolumeIdentity::empty();
        assert_eq!(empty.as_str(), "");
        assert!(empty.key().is_empty());
    }
}
