use std::fmt;

/// Eight-sector course bitmask.
///
/// The compass is split into eight 45° sectors; bit N covers
/// `[N*45°, (N+1)*45°)`, with 360° wrapping into sector 0. A zone carries a
/// mask of accepted sectors; mask 0 means the zone ignores course entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseMask(u8);

impl CourseMask {
    /// Mask that disables course filtering.
    pub const IGNORE: CourseMask = CourseMask(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Convert a course in degrees to its single-sector mask.
    ///
    /// 360.0 normalizes to sector 0; anything outside `[0, 360]` (including
    /// the -1.0 "unknown" marker and NaN) yields the empty mask.
    pub fn from_degrees(course: f64) -> Self {
        if !(0.0..=360.0).contains(&course) {
            return Self(0);
        }
        if course == 360.0 {
            return Self(0x01);
        }
        Self(1 << ((course / 45.0) as u8))
    }

    /// True if any sector is shared between the two masks.
    pub const fn intersects(self, other: CourseMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl fmt::Display for CourseMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}
