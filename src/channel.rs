//! Device channels: a tracker link paired with its wire decoder.
//!
//! One refresh per fusion tick. Every fault — timeout, socket error, or
//! malformed frame — is logged and degrades to the last known good sample.

use tracing::debug;

use crate::link::{ChannelConfig, LinkError, LinkState, TrackerLink};
use crate::wire::{ButtonDecoder, ButtonState, DeviceSample, PointerDecoder};

// ── Pointer channel ──────────────────────────────────────────

/// IR pointer channel: positions and rotation.
pub struct PointerChannel {
    link: TrackerLink,
    decoder: PointerDecoder,
}

impl PointerChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            link: TrackerLink::new(config),
            decoder: PointerDecoder::new(),
        }
    }

    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.link.connect()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// One receive duty cycle; decode into the sample. On any fault the
    /// sample is left byte-for-byte unchanged.
    pub fn refresh(&mut self, sample: &mut DeviceSample) {
        let text = match self.link.receive() {
            Ok(text) => text,
            Err(LinkError::Timeout) => {
                debug!("pointer receive timed out; keeping last sample");
                return;
            }
            Err(err) => {
                debug!(%err, "pointer receive failed; keeping last sample");
                return;
            }
        };
        if let Err(err) = self.decoder.decode_into(&text, sample) {
            debug!(%err, frame = %text, "dropped malformed pointer frame");
        }
    }
}

// ── Gesture channel ──────────────────────────────────────────

/// Gesture/button channel: click, press, and release edges.
pub struct GestureChannel {
    link: TrackerLink,
    decoder: ButtonDecoder,
}

impl GestureChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            link: TrackerLink::new(config),
            decoder: ButtonDecoder::new(),
        }
    }

    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.link.connect()
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    /// One receive duty cycle through the button edge detector.
    pub fn refresh(&mut self) {
        match self.link.receive() {
            Ok(text) => self.decoder.decode(&text),
            Err(LinkError::Timeout) => {
                debug!("gesture receive timed out; keeping button state")
            }
            Err(err) => debug!(%err, "gesture receive failed; keeping button state"),
        }
    }

    /// Consume the one-shot click edge.
    pub fn take_click(&mut self) -> bool {
        self.decoder.take_click()
    }

    /// Consume the one-shot release edge.
    pub fn take_release(&mut self) -> bool {
        self.decoder.take_release()
    }

    pub fn button_state(&self) -> ButtonState {
        self.decoder.state()
    }
}
