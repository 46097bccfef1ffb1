//! Wire decoding for the tracker's delimited ASCII protocol.
//!
//! The pointer channel broadcasts frames of the form `...(X,Y);ROTATION#...`
//! where X/Y are normalized IR coordinates and ROTATION is an absolute angle
//! in degrees (or the literal `NaN` when the device cannot resolve it). The
//! gesture channel broadcasts button frames: `A` for a click, `B` for hold
//! start, `NB` for hold end.
//!
//! Decoding is last-known-good: a malformed or partial frame never clobbers
//! previously accepted fields.

use thiserror::Error;

/// IR x readings at or above this are sensor noise and discarded.
pub const IR_X_CEILING: f32 = 0.999;
/// IR y readings at or above this are sensor noise and discarded.
pub const IR_Y_CEILING: f32 = 1.332;

// ── Device sample ────────────────────────────────────────────

/// Hold state of the device's B button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
}

/// Latest decoded scalar state from the external tracker.
///
/// Overwritten field-by-field as frames arrive; fields a frame does not
/// carry (or carries implausibly) keep their previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceSample {
    /// Normalized IR x position.
    pub ir_x: f32,
    /// Normalized IR y position.
    pub ir_y: f32,
    /// Per-frame rotation differential in degrees (not an absolute angle).
    pub rotation_delta: f32,
    /// One-shot A-button click edge, valid for the tick that consumed it.
    pub click: bool,
    /// B-button hold state.
    pub button: ButtonState,
}

// ── Frame parsing ────────────────────────────────────────────

/// A decode fault. Recoverable: the caller logs it and keeps the prior sample.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame is missing the {0:?} anchor")]
    MissingAnchor(char),
    #[error("{field} field is not a number: {text:?}")]
    BadNumber { field: &'static str, text: String },
}

/// Fields extracted from one pointer frame.
///
/// `None` means the frame carried no acceptable value for that field:
/// an IR coordinate at or above its plausibility ceiling, or a `NaN`
/// rotation reading.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerFrame {
    pub ir_x: Option<f32>,
    pub ir_y: Option<f32>,
    pub rotation: Option<f32>,
}

fn parse_field(field: &'static str, text: &str) -> Result<f32, DecodeError> {
    text.trim().parse().map_err(|_| DecodeError::BadNumber {
        field,
        text: text.to_string(),
    })
}

/// Parse one pointer frame with a fixed 5-anchor scan: the first `(`, the
/// first `,` after it, the first `)` after that, the first `;` after that,
/// and the first `#` after that. Not a general tokenizer — the three fields
/// always appear in this order and count.
pub fn parse_pointer_frame(text: &str) -> Result<PointerFrame, DecodeError> {
    let open = text.find('(').ok_or(DecodeError::MissingAnchor('('))?;
    let comma = text[open..]
        .find(',')
        .map(|i| i + open)
        .ok_or(DecodeError::MissingAnchor(','))?;
    let close = text[comma..]
        .find(')')
        .map(|i| i + comma)
        .ok_or(DecodeError::MissingAnchor(')'))?;
    let semi = text[close..]
        .find(';')
        .map(|i| i + close)
        .ok_or(DecodeError::MissingAnchor(';'))?;
    let pound = text[semi..]
        .find('#')
        .map(|i| i + semi)
        .ok_or(DecodeError::MissingAnchor('#'))?;

    let x = parse_field("ir-x", &text[open + 1..comma])?;
    let y = parse_field("ir-y", &text[comma + 1..close])?;
    let rotation_str = &text[semi + 1..pound];
    let rotation = if rotation_str.contains("NaN") {
        None
    } else {
        Some(parse_field("rotation", rotation_str)?)
    };

    Ok(PointerFrame {
        ir_x: (x < IR_X_CEILING).then_some(x),
        ir_y: (y < IR_Y_CEILING).then_some(y),
        rotation,
    })
}

// ── Pointer decoder ──────────────────────────────────────────

/// Applies pointer frames to a [`DeviceSample`], tracking the previous
/// absolute rotation so the published value is a per-frame differential.
#[derive(Debug, Default)]
pub struct PointerDecoder {
    last_rotation: f32,
}

impl PointerDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one frame into the sample. On error the sample is untouched:
    /// no partial field updates are committed.
    pub fn decode_into(
        &mut self,
        text: &str,
        sample: &mut DeviceSample,
    ) -> Result<(), DecodeError> {
        let frame = parse_pointer_frame(text)?;
        if let Some(x) = frame.ir_x {
            sample.ir_x = x;
        }
        if let Some(y) = frame.ir_y {
            sample.ir_y = y;
        }
        if let Some(rotation) = frame.rotation {
            sample.rotation_delta = rotation - self.last_rotation;
            self.last_rotation = rotation;
        }
        Ok(())
    }
}

// ── Button decoder ───────────────────────────────────────────

/// Edge detector over the gesture channel's noisy repeating broadcast.
///
/// Explicit state machine: Released → Pressed on `B`, Pressed → Released on
/// `NB` (raising a one-shot release edge), plus a separate one-shot click
/// pulse on `A` that stays latched until consumed exactly once. Duplicate or
/// dropped frames are tolerated; there is no delivery guarantee.
#[derive(Debug, Default)]
pub struct ButtonDecoder {
    state: ButtonState,
    clicked: bool,
    released: bool,
}

impl ButtonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one gesture frame through the edge detector.
    pub fn decode(&mut self, text: &str) {
        if text.contains('A') {
            self.clicked = true;
        } else if text.contains('B') && !text.contains("NB") {
            self.released = false;
            self.state = ButtonState::Pressed;
        } else if text.contains("NB") && self.state == ButtonState::Pressed {
            self.state = ButtonState::Released;
            self.released = true;
        }
    }

    /// Consume the one-shot click edge.
    pub fn take_click(&mut self) -> bool {
        std::mem::take(&mut self.clicked)
    }

    /// Consume the one-shot release edge.
    pub fn take_release(&mut self) -> bool {
        std::mem::take(&mut self.released)
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nominal_frame() {
        let mut decoder = PointerDecoder {
            last_rotation: 10.0,
        };
        let mut sample = DeviceSample::default();
        decoder
            .decode_into("junk(0.40,0.60);12.5#tail", &mut sample)
            .unwrap();
        assert!((sample.ir_x - 0.40).abs() < 1e-6);
        assert!((sample.ir_y - 0.60).abs() < 1e-6);
        assert!((sample.rotation_delta - 2.5).abs() < 1e-6);
        assert!((decoder.last_rotation - 12.5).abs() < 1e-6);
    }

    #[test]
    fn test_x_ceiling_discards_x_keeps_y() {
        let mut decoder = PointerDecoder::new();
        let mut sample = DeviceSample {
            ir_x: 0.2,
            ir_y: 0.3,
            ..Default::default()
        };
        decoder
            .decode_into("(1.5,0.7);5.0#", &mut sample)
            .unwrap();
        // x at/above 0.999 is noise; y and rotation still update
        assert!((sample.ir_x - 0.2).abs() < 1e-6);
        assert!((sample.ir_y - 0.7).abs() < 1e-6);
        assert!((sample.rotation_delta - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_y_ceiling_discards_y() {
        let frame = parse_pointer_frame("(0.5,1.332);0#").unwrap();
        assert!(frame.ir_x.is_some());
        assert!(frame.ir_y.is_none());
    }

    #[test]
    fn test_nan_rotation_leaves_delta_unchanged() {
        let mut decoder = PointerDecoder {
            last_rotation: 90.0,
        };
        let mut sample = DeviceSample {
            rotation_delta: 1.25,
            ..Default::default()
        };
        decoder
            .decode_into("(0.1,0.2);NaN#", &mut sample)
            .unwrap();
        assert!((sample.rotation_delta - 1.25).abs() < 1e-6);
        assert!((decoder.last_rotation - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_truncated_frame_is_error() {
        assert_eq!(
            parse_pointer_frame("(0.40,0.60);12.5"),
            Err(DecodeError::MissingAnchor('#'))
        );
        assert_eq!(
            parse_pointer_frame("0.40,0.60"),
            Err(DecodeError::MissingAnchor('('))
        );
    }

    #[test]
    fn test_bad_number_commits_nothing() {
        let mut decoder = PointerDecoder::new();
        let mut sample = DeviceSample {
            ir_x: 0.11,
            ir_y: 0.22,
            rotation_delta: 0.33,
            ..Default::default()
        };
        let before = sample;
        let err = decoder.decode_into("(0.5,oops);1.0#", &mut sample);
        assert!(matches!(
            err,
            Err(DecodeError::BadNumber { field: "ir-y", .. })
        ));
        assert_eq!(sample, before, "decode failure must not commit partial fields");
    }

    #[test]
    fn test_anchors_scan_in_order() {
        // A ';' before the '(' must not confuse the scan
        let frame = parse_pointer_frame(";(0.3,0.4);7.0#").unwrap();
        assert_eq!(frame.rotation, Some(7.0));
    }

    #[test]
    fn test_click_latched_until_consumed() {
        let mut buttons = ButtonDecoder::new();
        buttons.decode("A");
        buttons.decode("A"); // duplicate broadcast
        assert!(buttons.take_click());
        assert!(!buttons.take_click(), "click edge consumed exactly once");
    }

    #[test]
    fn test_press_release_cycle() {
        let mut buttons = ButtonDecoder::new();
        assert_eq!(buttons.state(), ButtonState::Released);

        buttons.decode("B");
        assert_eq!(buttons.state(), ButtonState::Pressed);
        assert!(!buttons.take_release());

        buttons.decode("B"); // repeated hold broadcast
        assert_eq!(buttons.state(), ButtonState::Pressed);

        buttons.decode("NB");
        assert_eq!(buttons.state(), ButtonState::Released);
        assert!(buttons.take_release());
        assert!(!buttons.take_release());
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut buttons = ButtonDecoder::new();
        buttons.decode("NB");
        assert_eq!(buttons.state(), ButtonState::Released);
        assert!(!buttons.take_release());
    }

    #[test]
    fn test_new_press_clears_stale_release() {
        let mut buttons = ButtonDecoder::new();
        buttons.decode("B");
        buttons.decode("NB");
        // Edge not consumed before the next press begins
        buttons.decode("B");
        assert!(!buttons.take_release());
        assert_eq!(buttons.state(), ButtonState::Pressed);
    }
}
