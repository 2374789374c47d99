//! Composite OSC value types carried by fixed-width tags.

mod value;

pub use value::{Color32, MidiMessage, NtpTimestamp, Vector2, Vector3};
