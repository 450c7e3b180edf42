//! Document-space to device-space transforms

use serde::{Deserialize, Serialize};

use crate::document::PageSize;
use crate::error::ViewerError;

/// 2D affine transform `[a b c d e f]`, mapping `(x, y)` to
/// `(a·x + c·y + e, b·x + d·y + f)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// `self ∘ inner`: applies `inner` first, then `self`
    #[must_use]
    pub fn concat(self, inner: Matrix) -> Matrix {
        Matrix {
            a: self.a * inner.a + self.c * inner.b,
            b: self.b * inner.a + self.d * inner.b,
            c: self.a * inner.c + self.c * inner.d,
            d: self.b * inner.c + self.d * inner.d,
            e: self.a * inner.e + self.c * inner.f + self.e,
            f: self.b * inner.e + self.d * inner.f + self.f,
        }
    }

    #[must_use]
    pub fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    /// Length of the transformed unit y vector (font height for text runs)
    #[must_use]
    pub fn vertical_extent(self) -> f32 {
        self.c.hypot(self.d)
    }
}

impl From<[f32; 6]> for Matrix {
    fn from(m: [f32; 6]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }
}

/// Clockwise page rotation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepts any multiple of 90, including negative ones.
    pub fn from_degrees(degrees: i32) -> Result<Self, ViewerError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(ViewerError::InvalidRotation(degrees)),
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Device-space placement of one page at a given scale and rotation.
///
/// Document space has its origin at the bottom-left with y growing upwards;
/// device space has its origin at the top-left with y growing downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageViewport {
    pub scale: f32,
    pub rotation: Rotation,
    /// Device width after rotation
    pub width: f32,
    /// Device height after rotation
    pub height: f32,
    pub transform: Matrix,
}

impl PageViewport {
    #[must_use]
    pub fn new(page: PageSize, scale: f32, rotation: Rotation) -> Self {
        let center_x = page.width / 2.0;
        let center_y = page.height / 2.0;

        // Rotation combined with the y flip.
        let (ra, rb, rc, rd) = match rotation {
            Rotation::Deg0 => (1.0, 0.0, 0.0, -1.0),
            Rotation::Deg90 => (0.0, 1.0, 1.0, 0.0),
            Rotation::Deg180 => (-1.0, 0.0, 0.0, 1.0),
            Rotation::Deg270 => (0.0, -1.0, -1.0, 0.0),
        };

        let (offset_x, offset_y, width, height) = if rotation.is_quarter_turn() {
            (
                center_y * scale,
                center_x * scale,
                page.height * scale,
                page.width * scale,
            )
        } else {
            (
                center_x * scale,
                center_y * scale,
                page.width * scale,
                page.height * scale,
            )
        };

        let transform = Matrix::new(
            ra * scale,
            rb * scale,
            rc * scale,
            rd * scale,
            offset_x - ra * scale * center_x - rc * scale * center_y,
            offset_y - rb * scale * center_x - rd * scale * center_y,
        );

        Self {
            scale,
            rotation,
            width,
            height,
            transform,
        }
    }

    /// Maps a document-space point to device space
    #[must_use]
    pub fn to_device(&self, x: f32, y: f32) -> (f32, f32) {
        self.transform.apply(x, y)
    }
}
