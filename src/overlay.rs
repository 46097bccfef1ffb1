//! 2D UI overlay arbitration.
//!
//! The 2D interface system and the 3D physics system are independent query
//! engines with no shared depth buffer. After the prioritized 3D pass, the
//! resolver projects the hit point to screen space, runs the 2D hit-test, and
//! decides whether the UI result supersedes the 3D one — imposing a single
//! consistent "what am I pointing at" answer per frame.

use crate::math::{Vec2, Vec3};
use crate::prioritize::{LayerPriority, RaycastHit, TargetId};

// ── Pointer state ────────────────────────────────────────────

/// Screen-space pointer seeded from the projected gaze hit point.
/// Carries position and per-frame delta, as 2D event systems expect.
#[derive(Debug, Clone, Copy, Default)]
pub struct UiPointerState {
    pub position: Vec2,
    pub delta: Vec2,
}

// ── UI hit and the 2D seam ───────────────────────────────────

/// One 2D hit-test result.
#[derive(Debug, Clone, Copy)]
pub struct UiHit {
    pub target: TargetId,
    /// Distance from the 2D raycast origin; near-clip offset NOT included.
    pub distance: f32,
    pub screen_position: Vec2,
    pub layer: u8,
}

/// The 2D interface hit-test engine, supplied by the host UI system.
pub trait UiHitTester {
    /// All UI elements under the pointer, closest first.
    fn raycast_all(&mut self, pointer: &UiPointerState) -> Vec<UiHit>;
}

/// Projection between world and screen space, supplied by the host camera.
pub trait ViewProjector {
    fn world_to_screen(&self, point: Vec3) -> Vec2;
    /// Back-project a screen position at the given view depth.
    fn screen_to_world(&self, screen: Vec2, depth: f32) -> Vec3;
    fn near_clip(&self) -> f32;
    /// Viewer-forward direction in world space.
    fn forward(&self) -> Vec3;
}

// ── Resolver ─────────────────────────────────────────────────

/// Decides whether the 2D UI hit replaces the 3D physics hit.
#[derive(Debug, Default)]
pub struct OverlayResolver {
    pointer: UiPointerState,
}

impl OverlayResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer(&self) -> &UiPointerState {
        &self.pointer
    }

    /// Run one overlay pass. `hit_point` is the published 3D hit point (or
    /// the last-distance fallback point when the 3D pass missed); `current`
    /// is the prioritized 3D hit, if any. Returns a synthesized hit when the
    /// UI wins, `None` to keep the 3D result.
    pub fn resolve(
        &mut self,
        hit_point: Vec3,
        current: Option<&RaycastHit>,
        priority: &LayerPriority,
        projector: &dyn ViewProjector,
        ui: &mut dyn UiHitTester,
    ) -> Option<RaycastHit> {
        // Seed the 2D pointer from the projected hit point
        let screen = projector.world_to_screen(hit_point);
        self.pointer.delta = screen - self.pointer.position;
        self.pointer.position = screen;

        let candidates = ui.raycast_all(&self.pointer);
        let combined = priority.combined();
        let ui_hit = candidates
            .iter()
            .find(|h| combined.contains(h.layer))?;

        // The 2D raycast originates at the near clip plane
        let ui_distance = ui_hit.distance + projector.near_clip();

        let superseded = match current {
            None => true,
            Some(scene_hit) => {
                if priority.is_single() {
                    scene_hit.distance > ui_distance
                } else {
                    // Missing layers rank as -1, matching "not prioritized"
                    let ui_index =
                        priority.index_of(ui_hit.layer).map_or(-1, |i| i as i32);
                    let scene_index =
                        priority.index_of(scene_hit.layer).map_or(-1, |i| i as i32);
                    scene_index > ui_index
                        || (scene_index == ui_index && scene_hit.distance > ui_distance)
                }
            }
        };

        if !superseded {
            return None;
        }

        Some(RaycastHit {
            target: ui_hit.target,
            distance: ui_distance,
            point: projector.screen_to_world(ui_hit.screen_position, ui_distance),
            normal: -projector.forward(),
            layer: ui_hit.layer,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────
