//! Error diffusion.
//!
//! The second pass calls a [`Dither`] strategy once per pixel, in row-major order, after the
//! pixel's palette index has been chosen. The strategy may push the quantization error into
//! pixels that haven't been visited yet.

use crate::image::Image;
use crate::pal::RGBA;
use crate::pixel::Pixel;

/// Position of the pixel being dithered, and the region the error may spread into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DitherPoint {
    pub x: usize,
    pub y: usize,
    /// Left edge of the dithered region
    pub offset_x: usize,
    /// Top edge of the dithered region
    pub offset_y: usize,
    /// Right edge (exclusive) of the dithered region
    pub width: usize,
    /// Bottom edge (exclusive) of the dithered region
    pub height: usize,
}

/// Dithering strategy invoked by the second pass.
///
/// Implementations may modify pixels after `at` in row-major order, and must not touch
/// pixels that have already been visited.
pub trait Dither {
    /// `source` is the pixel as it was read, `transformed` is the palette color it was mapped to.
    fn dither<P: Pixel>(&self, image: &mut Image<'_, P>, source: P, transformed: P, at: DitherPoint);
}

/// Error diffusion matrix.
///
/// Each entry is `(dx, dy, weight)`: the neighbor at `(x + dx, y + dy)` receives
/// `error * weight / divisor` of the error of every channel, alpha included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDiffuser {
    pub name: &'static str,
    pub entries: &'static [(i32, i32, u8)],
    pub divisor: u8,
}

/// ```text
///        X   7
///    3   5   1
/// ```
pub const FLOYD_STEINBERG: ErrorDiffuser = ErrorDiffuser {
    name: "Floyd-Steinberg",
    entries: &[(1, 0, 7), (-1, 1, 3), (0, 1, 5), (1, 1, 1)],
    divisor: 16,
};

/// Spreads only 3/4 of the error, which keeps small palettes from bleeding.
///
/// ```text
///        X   1   1
///    1   1   1
///        1
/// ```
pub const ATKINSON: ErrorDiffuser = ErrorDiffuser {
    name: "Atkinson",
    entries: &[(1, 0, 1), (2, 0, 1), (-1, 1, 1), (0, 1, 1), (1, 1, 1), (0, 2, 1)],
    divisor: 8,
};

/// ```text
///            X   8   4
///    2   4   8   4   2
/// ```
pub const BURKS: ErrorDiffuser = ErrorDiffuser {
    name: "Burks",
    entries: &[
        (1, 0, 8), (2, 0, 4),
        (-2, 1, 2), (-1, 1, 4), (0, 1, 8), (1, 1, 4), (2, 1, 2),
    ],
    divisor: 32,
};

pub const JARVIS_JUDICE_NINKE: ErrorDiffuser = ErrorDiffuser {
    name: "Jarvis-Judice-Ninke",
    entries: &[
        (1, 0, 7), (2, 0, 5),
        (-2, 1, 3), (-1, 1, 5), (0, 1, 7), (1, 1, 5), (2, 1, 3),
        (-2, 2, 1), (-1, 2, 3), (0, 2, 5), (1, 2, 3), (2, 2, 1),
    ],
    divisor: 48,
};

/// Two-row Sierra
pub const SIERRA2: ErrorDiffuser = ErrorDiffuser {
    name: "Sierra-2",
    entries: &[
        (1, 0, 4), (2, 0, 3),
        (-2, 1, 1), (-1, 1, 2), (0, 1, 3), (1, 1, 2), (2, 1, 1),
    ],
    divisor: 16,
};

pub const SIERRA3: ErrorDiffuser = ErrorDiffuser {
    name: "Sierra-3",
    entries: &[
        (1, 0, 5), (2, 0, 3),
        (-2, 1, 2), (-1, 1, 4), (0, 1, 5), (1, 1, 4), (2, 1, 2),
        (-1, 2, 2), (0, 2, 3), (1, 2, 2),
    ],
    divisor: 32,
};

pub const SIERRA_LITE: ErrorDiffuser = ErrorDiffuser {
    name: "Sierra-Lite",
    entries: &[(1, 0, 2), (-1, 1, 1), (0, 1, 1)],
    divisor: 4,
};

pub const STUCKI: ErrorDiffuser = ErrorDiffuser {
    name: "Stucki",
    entries: &[
        (1, 0, 8), (2, 0, 4),
        (-2, 1, 2), (-1, 1, 4), (0, 1, 8), (1, 1, 4), (2, 1, 2),
        (-2, 2, 1), (-1, 2, 2), (0, 2, 4), (1, 2, 2), (2, 2, 1),
    ],
    divisor: 42,
};

impl Default for ErrorDiffuser {
    #[inline(always)]
    fn default() -> Self {
        FLOYD_STEINBERG
    }
}

/// `value / divisor`, rounded half away from zero
#[inline(always)]
fn div_round(value: i32, divisor: i32) -> i32 {
    if value < 0 {
        (value - divisor / 2) / divisor
    } else {
        (value + divisor / 2) / divisor
    }
}

#[inline(always)]
fn spread(channel: u8, error: i32, weight: i32, divisor: i32) -> u8 {
    (i32::from(channel) + div_round(error * weight, divisor)).clamp(0, 255) as u8
}

impl Dither for ErrorDiffuser {
    fn dither<P: Pixel>(&self, image: &mut Image<'_, P>, source: P, transformed: P, at: DitherPoint) {
        let source = source.to_rgba();
        let transformed = transformed.to_rgba();
        if source == transformed {
            return;
        }
        let error = [
            i32::from(source.r) - i32::from(transformed.r),
            i32::from(source.g) - i32::from(transformed.g),
            i32::from(source.b) - i32::from(transformed.b),
            i32::from(source.a) - i32::from(transformed.a),
        ];
        let divisor = i32::from(self.divisor.max(1));
        let right = at.width.min(image.width());
        let bottom = at.height.min(image.height());

        for &(dx, dy, weight) in self.entries {
            // visited pixels are off limits
            if dy < 0 || (dy == 0 && dx <= 0) {
                continue;
            }
            let (Some(tx), Some(ty)) = (at.x.checked_add_signed(dx as isize), at.y.checked_add_signed(dy as isize)) else {
                continue;
            };
            if tx < at.offset_x || tx >= right || ty < at.offset_y || ty >= bottom {
                continue;
            }
            let weight = i32::from(weight);
            let px = image.pixel(tx, ty).to_rgba();
            let px = RGBA::new(
                spread(px.r, error[0], weight, divisor),
                spread(px.g, error[1], weight, divisor),
                spread(px.b, error[2], weight, divisor),
                spread(px.a, error[3], weight, divisor),
            );
            image.set_pixel(tx, ty, P::from_rgba(px));
        }
    }
}

#[cfg(test)]
fn point(x: usize, y: usize, width: usize, height: usize) -> DitherPoint {
    DitherPoint { x, y, offset_x: 0, offset_y: 0, width, height }
}

#[test]
fn weights() {
    for k in [FLOYD_STEINBERG, BURKS, JARVIS_JUDICE_NINKE, SIERRA2, SIERRA3, SIERRA_LITE, STUCKI] {
        let sum: u32 = k.entries.iter().map(|e| u32::from(e.2)).sum();
        assert_eq!(sum, u32::from(k.divisor), "{}", k.name);
    }
    let sum: u32 = ATKINSON.entries.iter().map(|e| u32::from(e.2)).sum();
    assert_eq!(6, sum);
    // only forward
    for k in [FLOYD_STEINBERG, ATKINSON, BURKS, JARVIS_JUDICE_NINKE, SIERRA2, SIERRA3, SIERRA_LITE, STUCKI] {
        assert!(k.entries.iter().all(|&(dx, dy, _)| dy > 0 || (dy == 0 && dx > 0)), "{}", k.name);
    }
}

#[test]
fn floyd_steinberg_spread() {
    let attr = crate::Attributes::new();
    let mut img = Image::new(&attr, alloc::vec![RGBA::new(100, 100, 100, 255); 6], 3, 2).unwrap();
    FLOYD_STEINBERG.dither(&mut img, RGBA::new(100, 100, 100, 255), RGBA::new(0, 0, 0, 255), point(0, 0, 3, 2));
    // 100 * 7/16 = 43.75
    assert_eq!(RGBA::new(144, 144, 144, 255), img.pixel(1, 0));
    assert_eq!(RGBA::new(100, 100, 100, 255), img.pixel(2, 0));
    // 100 * 5/16 = 31.25, 100 * 1/16 = 6.25
    assert_eq!(RGBA::new(131, 131, 131, 255), img.pixel(0, 1));
    assert_eq!(RGBA::new(106, 106, 106, 255), img.pixel(1, 1));
    assert_eq!(RGBA::new(100, 100, 100, 255), img.pixel(0, 0));
}

#[test]
fn negative_error_and_saturation() {
    let attr = crate::Attributes::new();
    let mut img = Image::new(&attr, alloc::vec![[100u8, 250, 3, 255]; 4], 2, 2).unwrap();
    FLOYD_STEINBERG.dither(&mut img, [100, 250, 3, 255], [200, 0, 103, 0], point(0, 0, 2, 2));
    // -43.75, +109.4, -43.75, +111.6
    assert_eq!([56, 255, 0, 255], img.pixel(1, 0));
    // -31.25, +78.1, -31.25, +79.7
    assert_eq!([69, 255, 0, 255], img.pixel(0, 1));
}

#[test]
fn stays_in_region() {
    let attr = crate::Attributes::new();
    let mut img = Image::new(&attr, alloc::vec![RGBA::new(50, 50, 50, 255); 9], 3, 3).unwrap();
    let black = RGBA::new(0, 0, 0, 255);
    let gray = RGBA::new(50, 50, 50, 255);

    // last column: nothing to the right, nothing below-right
    FLOYD_STEINBERG.dither(&mut img, gray, black, point(2, 0, 3, 3));
    assert_eq!(gray, img.pixel(0, 1));
    assert_ne!(gray, img.pixel(1, 1));
    assert_ne!(gray, img.pixel(2, 1));

    // last row: nothing below
    let before: alloc::vec::Vec<_> = img.rows().flatten().copied().collect();
    FLOYD_STEINBERG.dither(&mut img, gray, black, point(2, 2, 3, 3));
    let after: alloc::vec::Vec<_> = img.rows().flatten().copied().collect();
    assert_eq!(before, after);

    // region narrower than the image
    let mut img = Image::new(&attr, alloc::vec![gray; 9], 3, 3).unwrap();
    let at = DitherPoint { x: 1, y: 1, offset_x: 1, offset_y: 1, width: 2, height: 3 };
    JARVIS_JUDICE_NINKE.dither(&mut img, gray, black, at);
    assert_eq!(gray, img.pixel(2, 1));
    assert_eq!(gray, img.pixel(0, 2));
    assert_ne!(gray, img.pixel(1, 2));
}

#[test]
fn no_error_no_change() {
    let attr = crate::Attributes::new();
    let mut img = Image::new(&attr, alloc::vec![RGBA::new(9, 9, 9, 9); 4], 2, 2).unwrap();
    ATKINSON.dither(&mut img, RGBA::new(1, 2, 3, 4), RGBA::new(1, 2, 3, 4), point(0, 0, 2, 2));
    assert!(img.rows().flatten().all(|&p| p == RGBA::new(9, 9, 9, 9)));
}
