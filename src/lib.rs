//! Octree color quantizer.
//!
//! Converts 24/32-bit images to a palette of up to 255 colors (plus a transparent slot) and one byte per pixel,
//! for GIF, 8-bit PNG and BMP encoders. Optionally dithers with error diffusion.
//!
//! ```rust,ignore
//! let mut attr = octquant::new();
//! attr.set_max_colors(64);
//! let mut img = attr.new_image(pixels, width, height)?;
//! let res = attr.quantize(&mut img)?;
//! let (palette, indices) = res.into_parts();
//! ```
#![cfg_attr(all(not(feature = "std"), feature = "no_std"), no_std)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::wildcard_imports)]

extern crate alloc;

#[cfg(not(any(feature = "std", feature = "no_std")))]
compile_error!("Either the `std` or `no_std` feature must be enabled");

mod attr;
mod dither;
mod error;
mod fixed;
mod image;
mod nearest;
mod octree;
mod pal;
mod pixel;
mod quant;
mod remap;
mod seacow;

#[cfg(not(feature = "threads"))]
mod rayoff;

pub use attr::{Attributes, ControlFlow};
pub use dither::{Dither, DitherPoint, ErrorDiffuser};
pub use dither::{ATKINSON, BURKS, FLOYD_STEINBERG, JARVIS_JUDICE_NINKE, SIERRA2, SIERRA3, SIERRA_LITE, STUCKI};
pub use error::Error;
pub use fixed::PaletteQuantizer;
pub use image::Image;
pub use nearest::NearestCache;
pub use pal::{PalIndex, Palette, RGBA};
pub use pixel::Pixel;
pub use quant::{OctreeQuantizer, QuantizedImage, Quantizer};

/// Re-export of the `rgb` crate, for the pixel types
pub use rgb;

/// Start here: creates new handle for library configuration
///
/// See [`Attributes`]
#[inline(always)]
#[must_use]
pub fn new() -> Attributes {
    Attributes::new()
}

#[cfg(test)]
fn rgba_image(attr: &Attributes, px: &[RGBA], width: usize, height: usize) -> Image<'static, RGBA> {
    attr.new_image(px, width, height).unwrap()
}

#[test]
fn two_by_two() {
    let red = RGBA::new(255, 0, 0, 255);
    let blue = RGBA::new(0, 0, 255, 255);
    let clear = RGBA::new(0, 0, 0, 0);

    let mut attr = new();
    attr.set_max_colors(256);
    attr.set_dithering(false);
    let mut img = rgba_image(&attr, &[red, red, blue, clear], 2, 2);
    let res = attr.quantize(&mut img).unwrap();

    // 255 colors + the reserved slot
    assert_eq!(256, res.palette().len());
    let idx = res.indices();
    assert_eq!(4, idx.len());
    assert_eq!(idx[0], idx[1]);
    assert_eq!(red, res.palette()[idx[0] as usize]);
    assert_eq!(blue, res.palette()[idx[2] as usize]);
    assert_eq!(clear, res.palette()[idx[3] as usize]);
    assert_eq!(res.transparent_index(), idx[3]);

    // tree order: the transparent pixel's leaf (black) comes first
    assert_eq!(&[1, 1, 2, 3], idx);
    assert_eq!(RGBA::new(0, 0, 0, 255), res.palette()[0]);
}

#[test]
fn deterministic() {
    let px: Vec<RGBA> = (0..64 * 64u32).map(|i| RGBA::new((i % 64 * 4) as u8, (i / 64 * 4) as u8, (i * 7 % 256) as u8, 255)).collect();
    for dither in [false, true] {
        let mut attr = new();
        attr.set_max_colors(32);
        attr.set_dithering(dither);
        let a = attr.quantize(&mut rgba_image(&attr, &px, 64, 64)).unwrap();
        let b = attr.quantize(&mut rgba_image(&attr, &px, 64, 64)).unwrap();
        assert_eq!(a.palette(), b.palette());
        assert_eq!(a.indices(), b.indices());
        assert_eq!(33, a.palette().len());
        assert!(a.palette()[..32].iter().filter(|c| c.a == 255).count() > 1);
    }
}

#[test]
fn reuse_does_not_leak() {
    let mut attr = new();
    attr.set_max_colors(4);
    attr.set_dithering(false);
    let mut q = OctreeQuantizer::new(&attr);

    let greens = [RGBA::new(0, 200, 0, 255), RGBA::new(0, 100, 0, 255)];
    let reds = [RGBA::new(200, 0, 0, 255), RGBA::new(100, 0, 0, 255)];
    let first = q.quantize(&attr, &mut rgba_image(&attr, &greens, 2, 1)).unwrap();
    let second = q.quantize(&attr, &mut rgba_image(&attr, &reds, 2, 1)).unwrap();
    let fresh = OctreeQuantizer::new(&attr).quantize(&attr, &mut rgba_image(&attr, &reds, 2, 1)).unwrap();

    assert_eq!(fresh.palette(), second.palette());
    assert_eq!(fresh.indices(), second.indices());
    assert!(!second.palette().contains(&greens[0]));
    assert!(first.palette().contains(&greens[0]));
}

#[test]
fn lossless_few_colors() {
    let near = [
        RGBA::new(1, 2, 3, 255),
        RGBA::new(250, 2, 3, 255),
        RGBA::new(1, 250, 3, 255),
        RGBA::new(100, 100, 100, 255),
        RGBA::new(101, 100, 100, 255),
    ];
    // the full-depth tree tells apart any two colors
    let px: Vec<_> = near.iter().cycle().take(30).copied().collect();
    let mut attr = new();
    attr.set_dithering(false);
    let res = attr.quantize(&mut rgba_image(&attr, &px, 6, 5)).unwrap();
    assert_eq!(px, res.remapped_rgba().unwrap());
    assert_eq!(256, res.palette().len());
    assert_eq!(5, res.palette().iter().filter(|c| c.a == 255).count());

    // shallower trees need colors that differ in the top bits
    let far = [
        RGBA::new(0, 0, 0, 255),
        RGBA::new(255, 0, 0, 255),
        RGBA::new(0, 255, 0, 255),
        RGBA::new(0, 0, 255, 255),
        RGBA::new(96, 96, 96, 255),
    ];
    let px: Vec<_> = far.iter().cycle().take(30).copied().collect();
    attr.set_max_colors(8);
    let res = attr.quantize(&mut rgba_image(&attr, &px, 6, 5)).unwrap();
    assert_eq!(px, res.remapped_rgba().unwrap());
    assert_eq!(9, res.palette().len());
}

#[test]
fn dithering_nearest_match() {
    let attr = new();
    let black = RGBA::new(0, 0, 0, 255);
    let white = RGBA::new(255, 255, 255, 255);
    let img = rgba_image(&attr, &[black, white, white, black], 2, 2);
    let mut q = OctreeQuantizer::new(&attr);
    q.first_pass(&img).unwrap();
    assert_eq!(&[black, white], &Quantizer::<RGBA>::palette(&mut q).unwrap()[..2]);

    let mut cache = NearestCache::new();
    // 3*127² < 3*128²
    assert_eq!(Ok(1), q.quantize_pixel(RGBA::new(128, 128, 128, 255), true, &mut cache));
    assert_eq!(Ok(0), q.quantize_pixel(RGBA::new(127, 127, 127, 255), true, &mut cache));
    // equally far from both
    assert_eq!(Ok(0), q.quantize_pixel(RGBA::new(255, 0, 0, 255), true, &mut cache));
    assert_eq!(3, cache.len());
}

#[test]
fn dithering_averages_out() {
    let attr = new();
    let gray = RGBA::new(128, 128, 128, 255);
    let mut px = alloc::vec![gray; 16 * 16];
    let mut q = PaletteQuantizer::with_palette(&attr, &[RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 255, 255)]).unwrap();
    let mut img = attr.new_image_borrowed(&mut px, 16, 16).unwrap();
    let res = q.quantize(&attr, &mut img).unwrap();
    let whites = res.indices().iter().filter(|&&i| i == 1).count();
    // about half
    assert!((100..=156).contains(&whites), "{whites}");
    drop(img);
    // error was diffused into the caller's pixels
    assert_ne!(gray, px[1]);
}

#[test]
fn dithered_transparent_pixels() {
    let clear = RGBA::new(0, 0, 0, 0);
    let red = RGBA::new(255, 0, 0, 255);
    let blue = RGBA::new(0, 0, 255, 255);
    let mut attr = new();
    attr.set_max_colors(256);
    assert!(attr.dithering());
    let mut img = rgba_image(&attr, &[clear, red, blue, clear, red, clear], 3, 2);
    let res = attr.quantize(&mut img).unwrap();
    let t = res.transparent_index();
    assert_eq!(clear, res.palette()[t as usize]);
    // the nearest search finds the reserved slot ahead of the other all-zero slots
    assert_eq!(t, res.indices()[0]);
    assert_eq!(t, res.indices()[3]);
    assert_eq!(red, res.palette()[res.indices()[1] as usize]);
    assert_eq!(blue, res.palette()[res.indices()[2] as usize]);
}

#[test]
fn custom_dither_sees_every_pixel() {
    use core::cell::RefCell;

    struct Recorder(RefCell<Vec<(usize, usize)>>);
    impl Dither for Recorder {
        fn dither<P: Pixel>(&self, _: &mut Image<'_, P>, _: P, _: P, at: DitherPoint) {
            assert_eq!((0, 0, 3, 2), (at.offset_x, at.offset_y, at.width, at.height));
            self.0.borrow_mut().push((at.x, at.y));
        }
    }

    let attr = new();
    let red = RGBA::new(255, 0, 0, 255);
    let mut img = rgba_image(&attr, &[red; 6], 3, 2);
    let rec = Recorder(RefCell::new(Vec::new()));
    let res = OctreeQuantizer::new(&attr).quantize_dithered(&attr, &mut img, &rec).unwrap();
    assert_eq!(&[0; 6], res.indices());
    assert_eq!(alloc::vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)], rec.0.into_inner());
}

#[test]
fn abort() {
    let mut attr = new();
    attr.set_progress_callback(|p| if p > 45. { ControlFlow::Break } else { ControlFlow::Continue });
    let mut img = rgba_image(&attr, &[RGBA::new(1, 2, 3, 255); 4], 2, 2);
    assert_eq!(Error::Aborted, attr.quantize(&mut img).unwrap_err());
}

#[test]
fn other_pixel_types() {
    use rgb::alt::BGRA8;
    use rgb::RGB8;

    let mut attr = new();
    attr.set_dithering(false);
    let mut px = [RGB8::new(10, 20, 30), RGB8::new(10, 20, 30), RGB8::new(200, 0, 0)];
    let res = attr.quantize(&mut attr.new_image_borrowed(&mut px, 3, 1).unwrap()).unwrap();
    assert_eq!(RGBA::new(10, 20, 30, 255), res.palette()[res.indices()[0] as usize]);

    let mut px = [BGRA8 { b: 3, g: 2, r: 1, a: 255 }, BGRA8 { b: 0, g: 0, r: 0, a: 0 }];
    let res = attr.quantize(&mut attr.new_image_borrowed(&mut px, 1, 2).unwrap()).unwrap();
    assert_eq!(RGBA::new(1, 2, 3, 255), res.palette()[res.indices()[0] as usize]);
    assert_eq!(res.transparent_index(), res.indices()[1]);
}
