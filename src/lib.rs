//! Holopoint — gaze/pointer fusion for holographic interaction studies.
//!
//! Fuses viewer head pose with an external handheld infrared tracker into a
//! single "what am I pointing at" answer per frame: TCP bridge and wire
//! decoding for the device, layer-prioritized 3D raycasting, 2D overlay
//! arbitration, and focus-change notification. The binary entry point in
//! `main.rs` drives a demo scene; hosts embed [`fusion::GazeEngine`] and
//! supply their own scene and UI seams.

pub mod channel;
pub mod fusion;
pub mod link;
pub mod math;
pub mod overlay;
pub mod prioritize;
pub mod scene;
pub mod wire;
