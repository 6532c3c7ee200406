use crate::pal::RGBA;
use rgb::alt::{BGR8, BGRA8};
use rgb::RGB8;

/// Pixel formats the quantizer can read and write.
///
/// All color comparisons and arithmetic are done on the canonical 8-bit [`RGBA`] form,
/// so a format only needs to convert to and from it. Equality is used to skip work on
/// runs of identical pixels, so it must agree with the canonical conversion
/// (equal pixels must convert to equal colors).
pub trait Pixel: Copy + PartialEq + Send + Sync {
    /// Canonical 8-bit-per-channel color of this pixel
    fn to_rgba(self) -> RGBA;

    /// Builds a pixel from a canonical color. Channels the format lacks are dropped.
    fn from_rgba(px: RGBA) -> Self;
}

impl Pixel for RGBA {
    #[inline(always)]
    fn to_rgba(self) -> RGBA {
        self
    }

    #[inline(always)]
    fn from_rgba(px: RGBA) -> Self {
        px
    }
}

impl Pixel for RGB8 {
    #[inline(always)]
    fn to_rgba(self) -> RGBA {
        RGBA::new(self.r, self.g, self.b, 255)
    }

    #[inline(always)]
    fn from_rgba(px: RGBA) -> Self {
        RGB8::new(px.r, px.g, px.b)
    }
}

impl Pixel for BGRA8 {
    #[inline(always)]
    fn to_rgba(self) -> RGBA {
        RGBA::new(self.r, self.g, self.b, self.a)
    }

    #[inline(always)]
    fn from_rgba(px: RGBA) -> Self {
        BGRA8 { b: px.b, g: px.g, r: px.r, a: px.a }
    }
}

impl Pixel for BGR8 {
    #[inline(always)]
    fn to_rgba(self) -> RGBA {
        RGBA::new(self.r, self.g, self.b, 255)
    }

    #[inline(always)]
    fn from_rgba(px: RGBA) -> Self {
        BGR8 { b: px.b, g: px.g, r: px.r }
    }
}

/// Raw `[r, g, b, a]` bytes
impl Pixel for [u8; 4] {
    #[inline(always)]
    fn to_rgba(self) -> RGBA {
        RGBA::new(self[0], self[1], self[2], self[3])
    }

    #[inline(always)]
    fn from_rgba(px: RGBA) -> Self {
        [px.r, px.g, px.b, px.a]
    }
}

#[test]
fn conversions() {
    let c = RGBA::new(10, 20, 30, 40);
    assert_eq!(c, BGRA8::from_rgba(c).to_rgba());
    assert_eq!(c, <[u8; 4]>::from_rgba(c).to_rgba());
    assert_eq!([10, 20, 30, 40], <[u8; 4]>::from_rgba(c));

    // formats without alpha read as opaque
    assert_eq!(RGBA::new(10, 20, 30, 255), RGB8::from_rgba(c).to_rgba());
    let bgr = BGR8::from_rgba(c);
    assert_eq!((30, 20, 10), (bgr.b, bgr.g, bgr.r));
    assert_eq!(RGBA::new(10, 20, 30, 255), bgr.to_rgba());
}
