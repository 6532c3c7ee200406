use crate::attr::Attributes;
use crate::error::*;
use crate::image::Image;
use crate::nearest::NearestCache;
use crate::pal::{PalIndex, Palette, MAX_COLORS, RGBA};
use crate::pixel::Pixel;
use crate::quant::Quantizer;

/// Maps images to a palette chosen up front, such as the web-safe colors.
///
/// Nothing is learned from the image. Every pixel gets the nearest palette color, with or without
/// dithering, and fully transparent pixels are searched like any other color.
pub struct PaletteQuantizer {
    colors: Palette,
    max_colors: usize,
    palette: Option<Palette>,
    transparent_index: PalIndex,
}

impl PaletteQuantizer {
    /// The 216 colors of the web-safe 6×6×6 cube
    #[must_use]
    pub fn new(attr: &Attributes) -> Self {
        let mut colors = Palette::with_len(216);
        let levels = (0..6u8).map(|l| l * 51);
        let cube = levels.clone().flat_map(|r| {
            levels.clone().flat_map(move |g| (0..6u8).map(move |b| RGBA::new(r, g, b * 51, 255)))
        });
        for (i, c) in cube.enumerate() {
            colors.set(i, c);
        }
        Self::from_palette(attr, colors)
    }

    /// Between 1 and 256 colors
    pub fn with_palette(attr: &Attributes, colors: &[RGBA]) -> Result<Self, Error> {
        if colors.is_empty() || colors.len() > MAX_COLORS {
            attr.verbose_print(alloc::format!("  error: palette of {} colors", colors.len()));
            return Err(ValueOutOfRange);
        }
        Ok(Self::from_palette(attr, Palette::from_colors(colors)))
    }

    fn from_palette(attr: &Attributes, colors: Palette) -> Self {
        Self {
            max_colors: attr.max_colors() as usize,
            colors,
            palette: None,
            transparent_index: 0,
        }
    }
}

impl<P: Pixel> Quantizer<P> for PaletteQuantizer {
    fn reset(&mut self, attr: &Attributes) {
        self.max_colors = attr.max_colors() as usize;
        self.palette = None;
    }

    fn first_pass(&mut self, _image: &Image<'_, P>) -> Result<(), Error> {
        Ok(())
    }

    fn palette(&mut self) -> Result<&Palette, Error> {
        if self.palette.is_none() {
            let mut palette = self.colors.clone();
            palette.truncate(self.max_colors.max(1));
            let last = (palette.len() - 1) as PalIndex;
            self.transparent_index = palette.transparent_index(last);
            self.palette = Some(palette);
        }
        self.palette.as_ref().ok_or(InternalError)
    }

    #[inline(always)]
    fn transparent_index(&self) -> PalIndex {
        self.transparent_index
    }

    #[inline]
    fn quantize_pixel(&self, px: P, _dithering: bool, cache: &mut NearestCache) -> Result<PalIndex, Error> {
        let palette = self.palette.as_ref().ok_or(InternalError)?;
        Ok(cache.search(palette, px.to_rgba()))
    }
}

#[test]
fn web_safe() {
    let attr = Attributes::new();
    let mut q = PaletteQuantizer::new(&attr);
    let pal = Quantizer::<RGBA>::palette(&mut q).unwrap();
    assert_eq!(216, pal.len());
    assert_eq!(RGBA::new(0, 0, 0, 255), pal[0]);
    assert_eq!(RGBA::new(0, 0, 51, 255), pal[1]);
    assert_eq!(RGBA::new(0, 51, 0, 255), pal[6]);
    assert_eq!(RGBA::new(51, 0, 0, 255), pal[36]);
    assert_eq!(RGBA::new(255, 255, 255, 255), pal[215]);
    assert_eq!(215, Quantizer::<RGBA>::transparent_index(&q));
}

#[test]
fn nearest_fixed_colors() {
    let mut attr = Attributes::new();
    attr.set_dithering(false);
    let mut img = Image::new(&attr, alloc::vec![
        RGBA::new(250, 5, 5, 255),
        RGBA::new(20, 20, 20, 255),
        RGBA::new(0, 0, 0, 0),
        RGBA::new(140, 140, 140, 255),
    ], 2, 2).unwrap();
    let mut q = PaletteQuantizer::with_palette(&attr, &[
        RGBA::new(0, 0, 0, 255),
        RGBA::new(255, 0, 0, 255),
        RGBA::new(0, 0, 0, 0),
        RGBA::new(255, 255, 255, 255),
    ]).unwrap();
    let res = q.quantize(&attr, &mut img).unwrap();
    assert_eq!(&[1, 0, 2, 3], res.indices());
    assert_eq!(2, res.transparent_index());
    assert_eq!(4, res.palette().len());
}

#[test]
fn truncated_to_max_colors() {
    let mut attr = Attributes::new();
    attr.set_max_colors(2);
    let colors = [RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 255, 255), RGBA::new(255, 0, 0, 255)];
    let mut q = PaletteQuantizer::with_palette(&attr, &colors).unwrap();
    let mut img = Image::new(&attr, alloc::vec![RGBA::new(255, 0, 0, 255); 2], 2, 1).unwrap();
    let res = q.quantize(&attr, &mut img).unwrap();
    assert_eq!(2, res.palette().len());
    // red is no longer available
    assert!(res.indices().iter().all(|&i| i < 2));

    assert_eq!(Err(ValueOutOfRange), PaletteQuantizer::with_palette(&attr, &[]).map(|_| ()));
    assert_eq!(Err(ValueOutOfRange), PaletteQuantizer::with_palette(&attr, &[RGBA::new(0, 0, 0, 0); 257]).map(|_| ()));
}

#[test]
fn truncation_follows_each_call() {
    let mut attr = Attributes::new();
    attr.set_dithering(false);
    let mut q = PaletteQuantizer::new(&attr);
    let white = RGBA::new(255, 255, 255, 255);

    attr.set_max_colors(6);
    let res = q.quantize(&attr, &mut Image::new(&attr, alloc::vec![white; 2], 2, 1).unwrap()).unwrap();
    assert_eq!(6, res.palette().len());
    assert_eq!(5, res.transparent_index());

    attr.set_max_colors(255);
    let res = q.quantize(&attr, &mut Image::new(&attr, alloc::vec![white; 2], 2, 1).unwrap()).unwrap();
    assert_eq!(216, res.palette().len());
    assert_eq!(&[215, 215], res.indices());
}
