//! Reference scene collaborators for demos and tests.
//!
//! The engine only sees the [`SceneRaycaster`] and [`ViewProjector`] seams;
//! these are the simplest useful implementations. A viewer-facing quad scene
//! stands in for the study's holographic widgets, and a pinhole projector
//! stands in for the study camera (at the origin, looking along +Z).

use crate::math::{Ray, Vec2, Vec3};
use crate::overlay::ViewProjector;
use crate::prioritize::{LayerMask, RaycastHit, SceneRaycaster, TargetId};

// ── Quad scene ───────────────────────────────────────────────

/// An axis-aligned quad facing the viewer.
#[derive(Debug, Clone)]
pub struct Quad {
    pub id: TargetId,
    pub layer: u8,
    pub center: Vec3,
    pub width: f32,
    pub height: f32,
}

/// Flat list of viewer-facing quads.
#[derive(Debug, Default)]
pub struct QuadScene {
    quads: Vec<Quad>,
}

impl QuadScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, quad: Quad) {
        self.quads.push(quad);
    }

    fn intersect(quad: &Quad, ray: &Ray, max_distance: f32) -> Option<RaycastHit> {
        if ray.direction.z.abs() < 1e-8 {
            return None; // parallel to the quad plane
        }
        let t = (quad.center.z - ray.origin.z) / ray.direction.z;
        if t < 0.0 || t > max_distance {
            return None;
        }
        let point = ray.at(t);
        if (point.x - quad.center.x).abs() > quad.width * 0.5
            || (point.y - quad.center.y).abs() > quad.height * 0.5
        {
            return None;
        }
        Some(RaycastHit {
            target: quad.id,
            distance: t,
            point,
            normal: -Vec3::FORWARD,
            layer: quad.layer,
        })
    }
}

impl SceneRaycaster for QuadScene {
    fn raycast(&self, ray: &Ray, max_distance: f32, mask: LayerMask) -> Option<RaycastHit> {
        let mut closest: Option<RaycastHit> = None;
        for quad in &self.quads {
            if !mask.contains(quad.layer) {
                continue;
            }
            if let Some(hit) = Self::intersect(quad, ray, max_distance) {
                if closest.map_or(true, |c| hit.distance < c.distance) {
                    closest = Some(hit);
                }
            }
        }
        closest
    }

    fn raycast_all(&self, ray: &Ray, max_distance: f32) -> Vec<RaycastHit> {
        self.quads
            .iter()
            .filter_map(|q| Self::intersect(q, ray, max_distance))
            .collect()
    }
}

// ── Pinhole projector ────────────────────────────────────────

/// Pinhole camera at the origin looking along +Z.
#[derive(Debug, Clone)]
pub struct PinholeProjector {
    /// Focal length in pixels.
    pub focal: f32,
    /// Screen center in pixels.
    pub center: Vec2,
    pub near: f32,
}

impl Default for PinholeProjector {
    fn default() -> Self {
        Self {
            focal: 800.0,
            center: Vec2::new(960.0, 540.0),
            near: 0.3,
        }
    }
}

impl ViewProjector for PinholeProjector {
    fn world_to_screen(&self, point: Vec3) -> Vec2 {
        let z = point.z.max(1e-6);
        Vec2::new(
            self.center.x + self.focal * point.x / z,
            self.center.y + self.focal * point.y / z,
        )
    }

    fn screen_to_world(&self, screen: Vec2, depth: f32) -> Vec3 {
        Vec3::new(
            (screen.x - self.center.x) * depth / self.focal,
            (screen.y - self.center.y) * depth / self.focal,
            depth,
        )
    }

    fn near_clip(&self) -> f32 {
        self.near
    }

    fn forward(&self) -> Vec3 {
        Vec3::FORWARD
    }
}

// ── Tests ────────────────────────────────────────────────────
