//! Composite OSC value types.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 32-bit RGBA color (`r` tag).
///
/// On the wire the bytes are r, g, b, a. OscCore-derived peers write the
/// reverse order (a, b, g, r), so their colors arrive with channels swapped;
/// [`from_abgr_bytes`](Self::from_abgr_bytes) reads their layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color32 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color32 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Reads r, g, b, a.
    pub const fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    /// Reads the a, b, g, r layout written by OscCore peers.
    pub const fn from_abgr_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[3], bytes[2], bytes[1], bytes[0])
    }

    /// Wire bytes: r, g, b, a.
    pub const fn to_be_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl fmt::Display for Color32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGBA({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// 4-byte MIDI message (`m` tag): port id, status byte, two data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MidiMessage {
    pub port_id: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl MidiMessage {
    pub const fn new(port_id: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            port_id,
            status,
            data1,
            data2,
        }
    }

    pub const fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    /// Wire bytes in field order.
    pub const fn to_be_bytes(self) -> [u8; 4] {
        [self.port_id, self.status, self.data1, self.data2]
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MIDI({}, {}, {}, {})",
            self.port_id, self.status, self.data1, self.data2
        )
    }
}

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch.
const NTP_UNIX_OFFSET_SECS: u64 = 2_208_988_800;

/// NTP 32.32 fixed-point timestamp (`t` tag), seconds since 1900.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NtpTimestamp {
    pub seconds: u32,
    /// Fractional second in units of 1/2^32 s.
    pub fraction: u32,
}

impl NtpTimestamp {
    /// The special "execute immediately" time tag.
    pub const IMMEDIATELY: Self = Self::new(0, 1);

    /// A time tag from whole seconds since 1900 and a fraction.
    pub const fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    /// Seconds in the high 32 bits, fraction in the low 32.
    pub const fn from_bits(bits: u64) -> Self {
        Self::new((bits >> 32) as u32, bits as u32)
    }

    /// Inverse of [`from_bits`](Self::from_bits).
    pub const fn to_bits(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }

    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self::from_bits(u64::from_be_bytes(bytes))
    }

    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.to_bits().to_be_bytes()
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Converts to wall-clock time. Values before the Unix epoch clamp to it.
    pub fn to_system_time(self) -> SystemTime {
        let secs = u64::from(self.seconds).saturating_sub(NTP_UNIX_OFFSET_SECS);
        let nanos = (u64::from(self.fraction) * 1_000_000_000) >> 32;
        UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_nanos(nanos)
    }
}

impl From<SystemTime> for NtpTimestamp {
    fn from(time: SystemTime) -> Self {
        let since_unix = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        let seconds = (since_unix.as_secs() + NTP_UNIX_OFFSET_SECS) as u32;
        let fraction = ((u64::from(since_unix.subsec_nanos()) << 32) / 1_000_000_000) as u32;
        Self::new(seconds, fraction)
    }
}

impl fmt::Display for NtpTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = (u64::from(self.fraction) * 1_000_000_000) >> 32;
        write!(f, "{}.{:09}", self.seconds, nanos)
    }
}

/// Two floats, sent as consecutive `f` elements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Three floats, sent as consecutive `f` elements.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}
