use serde::Serialize;

/// Three little-endian f32 components (position, rotation, pivot).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }
        Some(Self {
            x: f32_at(data, 0)?,
            y: f32_at(data, 4)?,
            z: f32_at(data, 8)?,
        })
    }

    pub fn components(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn is_finite(self) -> bool {
        self.components().iter().all(|c| c.is_finite())
    }

    /// True when every component satisfies `|c| <= bound`.
    pub fn within(self, bound: f32) -> bool {
        self.is_finite() && self.components().iter().all(|c| c.abs() <= bound)
    }

    /// Every component is zero or a normal float. Small integers read as
    /// floats come out subnormal, which this rejects.
    pub fn is_plausible(self) -> bool {
        self.components().iter().all(|c| *c == 0.0 || c.is_normal())
    }

    pub fn abs_sum(self) -> f32 {
        self.x.abs() + self.y.abs() + self.z.abs()
    }

    pub fn to_degrees(self) -> Self {
        Self {
            x: self.x.to_degrees(),
            y: self.y.to_degrees(),
            z: self.z.to_degrees(),
        }
    }
}

/// Natural grid coordinate: three small non-negative cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct GridCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridCoord {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub fn from_slice(data: &[u8]) -> Option<Self> {
        Some(Self {
            x: u32_at(data, 0)?,
            y: u32_at(data, 4)?,
            z: u32_at(data, 8)?,
        })
    }

    pub fn fits_grid(self, limit: u32) -> bool {
        self.x < limit && self.y < limit && self.z < limit
    }
}

/// Rotation as stored (radians) plus the degree conversion for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rotation {
    pub radians: Vec3,
    pub degrees: Vec3,
}

impl From<Vec3> for Rotation {
    fn from(radians: Vec3) -> Self {
        Self {
            radians,
            degrees: radians.to_degrees(),
        }
    }
}

/// A decoded value together with the payload offset it was read from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Located<T> {
    pub offset: usize,
    pub value: T,
}

impl<T> Located<T> {
    pub fn new(offset: usize, value: T) -> Self {
        Self { offset, value }
    }
}

pub fn u16_at(data: &[u8], pos: usize) -> Option<u16> {
    let b = data.get(pos..pos.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

pub fn u32_at(data: &[u8], pos: usize) -> Option<u32> {
    let b = data.get(pos..pos.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn f32_at(data: &[u8], pos: usize) -> Option<f32> {
    u32_at(data, pos).map(f32::from_bits)
}
