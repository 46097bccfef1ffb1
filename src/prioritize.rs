//! Layer-priority hit selection for the 3D raycast pass.
//!
//! Scene objects live on numbered layers (0..32); a [`LayerMask`] groups
//! layers, and a [`LayerPriority`] is an ordered list of masks where earlier
//! entries always beat later ones regardless of distance. Within one mask
//! the nearest hit wins.

use tracing::warn;

use crate::math::{Ray, Vec3};

// ── Identity and layers ──────────────────────────────────────

/// Opaque handle for a scene object. The engine never dereferences it;
/// consumers resolve ids against their own scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub u64);

/// Bitmask over scene layers 0..32.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Mask matching every layer.
    pub const ALL: Self = Self(u32::MAX);

    /// Mask containing a single layer.
    pub fn single(layer: u8) -> Self {
        Self(1 << layer)
    }

    pub fn contains(self, layer: u8) -> bool {
        self.0 & (1 << layer) != 0
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Ordered layer groups: insertion order is priority, earlier = higher.
/// Immutable for the session once constructed.
#[derive(Debug, Clone)]
pub struct LayerPriority {
    masks: Vec<LayerMask>,
}

impl LayerPriority {
    /// Build a priority list. An empty list falls back to a single
    /// "everything" group so the raycast pass always has a mask to use.
    pub fn new(masks: Vec<LayerMask>) -> Self {
        if masks.is_empty() {
            warn!("empty layer priority list; falling back to a single everything group");
            return Self::everything();
        }
        Self { masks }
    }

    /// Single group matching every layer.
    pub fn everything() -> Self {
        Self {
            masks: vec![LayerMask::ALL],
        }
    }

    pub fn masks(&self) -> &[LayerMask] {
        &self.masks
    }

    pub fn is_single(&self) -> bool {
        self.masks.len() == 1
    }

    /// Priority index of the first group containing `layer`, or `None`.
    pub fn index_of(&self, layer: u8) -> Option<usize> {
        self.masks.iter().position(|m| m.contains(layer))
    }

    /// Union of all groups.
    pub fn combined(&self) -> LayerMask {
        self.masks
            .iter()
            .fold(LayerMask(0), |acc, m| acc.union(*m))
    }
}

// ── Hits and the scene seam ──────────────────────────────────

/// One ray intersection. Transient: produced fresh every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub target: TargetId,
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub layer: u8,
}

/// The 3D physics query engine, supplied by the host scene.
pub trait SceneRaycaster {
    /// First hit along the ray restricted to `mask`, nearest-wins.
    fn raycast(&self, ray: &Ray, max_distance: f32, mask: LayerMask) -> Option<RaycastHit>;

    /// All intersections along the ray, unrestricted.
    fn raycast_all(&self, ray: &Ray, max_distance: f32) -> Vec<RaycastHit>;
}

// ── Prioritization ───────────────────────────────────────────

/// Pick the single best hit: iterate groups in priority order and return the
/// nearest hit inside the first group that has any. An object in a low
/// priority group can never beat a more distant object in a higher one.
/// At exactly equal distances within a group, the first-encountered hit wins.
pub fn prioritize_hits(hits: &[RaycastHit], priority: &LayerPriority) -> Option<RaycastHit> {
    for mask in priority.masks() {
        let mut best: Option<&RaycastHit> = None;
        for hit in hits {
            if mask.contains(hit.layer) && best.map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        }
        if let Some(hit) = best {
            return Some(*hit);
        }
    }
    None
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: u64, distance: f32, layer: u8) -> RaycastHit {
        RaycastHit {
            target: TargetId(id),
            distance,
            point: Vec3::new(0.0, 0.0, distance),
            normal: -Vec3::FORWARD,
            layer,
        }
    }

    #[test]
    fn test_mask_contains() {
        let mask = LayerMask::single(3).union(LayerMask::single(7));
        assert!(mask.contains(3));
        assert!(mask.contains(7));
        assert!(!mask.contains(0));
    }

    #[test]
    fn test_empty_priority_falls_back_to_everything() {
        let priority = LayerPriority::new(vec![]);
        assert!(priority.is_single());
        assert!(priority.masks()[0].contains(31));
    }

    #[test]
    fn test_index_of() {
        let priority =
            LayerPriority::new(vec![LayerMask::single(0), LayerMask::single(5)]);
        assert_eq!(priority.index_of(0), Some(0));
        assert_eq!(priority.index_of(5), Some(1));
        assert_eq!(priority.index_of(9), None);
    }

    #[test]
    fn test_priority_dominates_distance() {
        // Layer 5 (low priority) has a much closer hit; layer 0 still wins
        let priority =
            LayerPriority::new(vec![LayerMask::single(0), LayerMask::single(5)]);
        let hits = [hit(1, 0.5, 5), hit(2, 8.0, 0)];
        let best = prioritize_hits(&hits, &priority).unwrap();
        assert_eq!(best.target, TargetId(2));
    }

    #[test]
    fn test_nearest_within_group() {
        let priority = LayerPriority::everything();
        let hits = [hit(1, 4.0, 0), hit(2, 1.5, 0), hit(3, 3.0, 0)];
        let best = prioritize_hits(&hits, &priority).unwrap();
        assert_eq!(best.target, TargetId(2));
    }

    #[test]
    fn test_equal_distance_keeps_first_encountered() {
        let priority = LayerPriority::everything();
        let hits = [hit(10, 2.0, 0), hit(11, 2.0, 0)];
        let best = prioritize_hits(&hits, &priority).unwrap();
        assert_eq!(best.target, TargetId(10));
    }

    #[test]
    fn test_empty_hits_yield_none() {
        let priority = LayerPriority::everything();
        assert!(prioritize_hits(&[], &priority).is_none());
    }

    #[test]
    fn test_hit_outside_every_group_is_ignored() {
        let priority = LayerPriority::new(vec![LayerMask::single(0)]);
        let hits = [hit(1, 1.0, 4)];
        assert!(prioritize_hits(&hits, &priority).is_none());
    }
}
