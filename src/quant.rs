use crate::attr::Attributes;
use crate::dither::Dither;
use crate::error::*;
use crate::image::Image;
use crate::nearest::NearestCache;
use crate::octree::{bits_for_colors, Octree};
use crate::pal::{PalIndex, Palette, MAX_COLORS, RGBA, TRANSPARENT};
use crate::pixel::Pixel;
use crate::remap::{remap_dithered, remap_exact};
use alloc::format;
use alloc::vec::Vec;
use core::fmt;

/// Two-pass color quantization.
///
/// The first pass learns the colors of an image, then the palette is frozen, and the second pass maps
/// every pixel to a palette index. Instances can be reused for many images, one at a time.
pub trait Quantizer<P: Pixel> {
    /// Forgets everything learned from a previous image, and takes the number of colors from `attr`
    fn reset(&mut self, attr: &Attributes);

    /// Visits every pixel once, in row-major order
    fn first_pass(&mut self, image: &Image<'_, P>) -> Result<(), Error>;

    /// Builds the palette on first call, and returns the same palette afterwards (until [`Quantizer::reset`]).
    fn palette(&mut self) -> Result<&Palette, Error>;

    /// Palette slot for fully transparent pixels. Valid after [`Quantizer::palette`].
    fn transparent_index(&self) -> PalIndex;

    /// Palette index for a pixel of the second pass.
    ///
    /// When `dithering`, the pixel may have been altered by error diffusion, and it's resolved with a
    /// nearest-color search memoized in `cache`.
    fn quantize_pixel(&self, px: P, dithering: bool, cache: &mut NearestCache) -> Result<PalIndex, Error>;

    /// Generates a palette for the image and maps the image to it, dithering if the attributes ask for it.
    ///
    /// Dithering modifies the pixels of the image.
    fn quantize(&mut self, attr: &Attributes, image: &mut Image<'_, P>) -> Result<QuantizedImage, Error> where Self: Sized + Sync {
        if attr.dithering() {
            return self.quantize_dithered(attr, image, &attr.ditherer());
        }
        let palette = build_palette(self, attr, image)?;
        let indices = remap_exact(&*self, image)?;
        finish(&*self, attr, image, palette, indices)
    }

    /// Like [`Quantizer::quantize`], with a custom dithering strategy regardless of the attributes
    fn quantize_dithered<D: Dither>(&mut self, attr: &Attributes, image: &mut Image<'_, P>, dither: &D) -> Result<QuantizedImage, Error> where Self: Sized {
        let palette = build_palette(self, attr, image)?;
        let indices = remap_dithered(attr, &*self, dither, image, &palette)?;
        finish(&*self, attr, image, palette, indices)
    }
}

fn build_palette<P: Pixel, Q: Quantizer<P>>(quantizer: &mut Q, attr: &Attributes, image: &Image<'_, P>) -> Result<Palette, Error> {
    quantizer.reset(attr);
    quantizer.first_pass(image)?;
    if attr.progress(40.) {
        return Err(Aborted);
    }
    let palette = quantizer.palette()?.clone();
    attr.verbose_print(format!("  made palette of {} slots, transparent slot is {}", palette.len(), quantizer.transparent_index()));
    if attr.progress(50.) {
        return Err(Aborted);
    }
    Ok(palette)
}

fn finish<P: Pixel, Q: Quantizer<P>>(quantizer: &Q, attr: &Attributes, image: &Image<'_, P>, palette: Palette, indices: Vec<PalIndex>) -> Result<QuantizedImage, Error> {
    if attr.progress(100.) {
        return Err(Aborted);
    }
    attr.verbose_printf_flush();
    Ok(QuantizedImage {
        width: image.width(),
        height: image.height(),
        palette,
        indices,
        transparent_index: quantizer.transparent_index(),
    })
}

/// Palette and one palette index per pixel, computed by [`Quantizer::quantize()`]
#[derive(Clone)]
pub struct QuantizedImage {
    width: usize,
    height: usize,
    palette: Palette,
    indices: Vec<PalIndex>,
    transparent_index: PalIndex,
}

impl QuantizedImage {
    #[inline(always)]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// The final palette.
    ///
    /// It has one slot more than the number of colors asked for. Slots without a color are all-zero (transparent black).
    #[inline]
    #[must_use]
    pub fn palette(&self) -> &[RGBA] {
        self.palette.as_slice()
    }

    /// Row-major, `width * height` long, without padding
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[PalIndex] {
        &self.indices
    }

    /// Palette slot that fully transparent pixels were mapped to when dithering was off.
    ///
    /// It's the first all-zero palette entry. It may be past the end of the palette if the palette has none.
    #[inline(always)]
    #[must_use]
    pub fn transparent_index(&self) -> PalIndex {
        self.transparent_index
    }

    /// Palette and indices
    #[must_use]
    pub fn into_parts(self) -> (Vec<RGBA>, Vec<PalIndex>) {
        (self.palette.to_vec(), self.indices)
    }

    /// The quantized image as colors, looked up from the palette
    pub fn remapped_rgba(&self) -> Result<Vec<RGBA>, Error> {
        let mut out = Vec::new();
        out.try_reserve_exact(self.indices.len())?;
        for &idx in &self.indices {
            out.push(*self.palette.get(usize::from(idx)).ok_or(InternalError)?);
        }
        Ok(out)
    }
}

impl fmt::Debug for QuantizedImage {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuantizedImage({}x{}, {} colors)", self.width, self.height, self.palette.len())
    }
}

/// Octree quantizer.
///
/// Colors are counted in an octree, which is then reduced to `max_colors` leaves.
/// Without dithering, pixels are mapped by descending the same tree, so every color of the image
/// maps to the leaf it was counted in.
pub struct OctreeQuantizer {
    max_colors: PalIndex,
    octree: Octree,
    palette: Option<Palette>,
    transparent_index: PalIndex,
}

impl OctreeQuantizer {
    /// Takes max colors from the attributes
    #[must_use]
    pub fn new(attr: &Attributes) -> Self {
        let max_colors = Self::colors_for(attr);
        Self {
            max_colors,
            octree: Octree::new(bits_for_colors(max_colors.into())),
            palette: None,
            transparent_index: max_colors,
        }
    }

    #[inline]
    fn colors_for(attr: &Attributes) -> PalIndex {
        attr.max_colors().clamp(1, (MAX_COLORS - 1) as u32) as PalIndex
    }

    /// Number of colors the palette was last built for
    #[inline(always)]
    #[must_use]
    pub fn max_colors(&self) -> u32 {
        self.max_colors.into()
    }

    /// Number of distinct colors the tree holds. Drops to at most `max_colors` once the palette is made.
    #[inline]
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.octree.leaf_count()
    }
}

impl<P: Pixel> Quantizer<P> for OctreeQuantizer {
    fn reset(&mut self, attr: &Attributes) {
        self.max_colors = Self::colors_for(attr);
        self.octree = Octree::new(bits_for_colors(self.max_colors.into()));
        self.palette = None;
        self.transparent_index = self.max_colors;
    }

    fn first_pass(&mut self, image: &Image<'_, P>) -> Result<(), Error> {
        for row in image.rows() {
            for &px in row {
                self.octree.add_color(px.to_rgba())?;
            }
        }
        Ok(())
    }

    fn palette(&mut self) -> Result<&Palette, Error> {
        if self.palette.is_none() {
            let palette = self.octree.palletize(self.max_colors.into())?;
            self.transparent_index = palette.transparent_index(self.max_colors);
            self.palette = Some(palette);
        }
        self.palette.as_ref().ok_or(InternalError)
    }

    #[inline(always)]
    fn transparent_index(&self) -> PalIndex {
        self.transparent_index
    }

    #[inline]
    fn quantize_pixel(&self, px: P, dithering: bool, cache: &mut NearestCache) -> Result<PalIndex, Error> {
        let px = px.to_rgba();
        if dithering {
            let palette = self.palette.as_ref().ok_or(InternalError)?;
            return Ok(cache.search(palette, px));
        }
        if px == TRANSPARENT {
            return Ok(self.transparent_index);
        }
        self.octree.palette_index(px)
    }
}

#[cfg(test)]
fn attr_no_dither(colors: u32) -> Attributes {
    let mut attr = Attributes::new();
    attr.set_max_colors(colors);
    attr.set_dithering(false);
    attr
}

#[test]
fn palette_is_memoized() {
    let attr = attr_no_dither(3);
    let mut img = Image::new(&attr, alloc::vec![RGBA::new(255, 0, 0, 255), RGBA::new(0, 255, 0, 255), RGBA::new(0, 0, 255, 255)], 3, 1).unwrap();
    let mut q = OctreeQuantizer::new(&attr);
    Quantizer::<RGBA>::reset(&mut q, &attr);
    q.first_pass(&img).unwrap();
    let first = Quantizer::<RGBA>::palette(&mut q).unwrap().clone();
    assert_eq!(3, q.leaf_count());
    let again = Quantizer::<RGBA>::palette(&mut q).unwrap().clone();
    assert_eq!(first, again);
    assert_eq!(4, first.len());
    assert_eq!(3, Quantizer::<RGBA>::transparent_index(&q));

    let res = q.quantize(&attr, &mut img).unwrap();
    assert_eq!(first.as_slice(), res.palette());
}

#[test]
fn transparent_pixels_share_a_slot() {
    let attr = attr_no_dither(255);
    let clear = RGBA::new(0, 0, 0, 0);
    let black = RGBA::new(0, 0, 0, 255);
    let mut img = Image::new(&attr, alloc::vec![black, clear, RGBA::new(9, 9, 9, 255), clear, black, clear], 3, 2).unwrap();
    let res = OctreeQuantizer::new(&attr).quantize(&attr, &mut img).unwrap();
    let t = res.transparent_index();
    assert_eq!(RGBA::new(0, 0, 0, 0), res.palette()[t as usize]);
    assert_eq!(&[0, t, 1, t, 0, t], res.indices());
    // black and transparent black share a leaf, but not a slot
    assert_eq!(black, res.palette()[0]);
}

#[test]
fn unknown_pixel_after_palette() {
    let attr = attr_no_dither(255);
    let img = Image::new(&attr, alloc::vec![RGBA::new(0, 0, 0, 255)], 1, 1).unwrap();
    let mut q = OctreeQuantizer::new(&attr);
    q.first_pass(&img).unwrap();
    Quantizer::<RGBA>::palette(&mut q).unwrap();
    let mut cache = NearestCache::new();
    assert_eq!(Err(InternalError), q.quantize_pixel(RGBA::new(255, 255, 255, 255), false, &mut cache));
    assert_eq!(Ok(0), q.quantize_pixel(RGBA::new(255, 255, 255, 255), true, &mut cache));
    assert_eq!(Ok(1), q.quantize_pixel(RGBA::new(0, 0, 0, 0), false, &mut cache));
}

#[test]
fn result_accessors() {
    let attr = attr_no_dither(4);
    let red = RGBA::new(255, 0, 0, 255);
    let mut img = Image::new(&attr, alloc::vec![red; 6], 2, 3).unwrap();
    let res = OctreeQuantizer::new(&attr).quantize(&attr, &mut img).unwrap();
    assert_eq!((2, 3), (res.width(), res.height()));
    assert_eq!(alloc::vec![red; 6], res.remapped_rgba().unwrap());
    assert_eq!(1, res.transparent_index());
    let (pal, idx) = res.into_parts();
    assert_eq!(5, pal.len());
    assert_eq!(alloc::vec![0; 6], idx);
}

#[test]
fn colors_follow_each_call() {
    let px: Vec<RGBA> = (0..64u8).map(|i| RGBA::new(i % 4 * 85, i / 4 % 4 * 85, i / 16 * 85, 255)).collect();
    let wide = attr_no_dither(255);
    let narrow = attr_no_dither(4);
    let mut q = OctreeQuantizer::new(&wide);

    let res = q.quantize(&narrow, &mut Image::new(&narrow, px.clone(), 8, 8).unwrap()).unwrap();
    assert_eq!(5, res.palette().len());
    assert_eq!(4, q.max_colors());
    assert!(q.leaf_count() <= 4);
    assert!(res.indices().iter().all(|&i| i < 4));
    let fresh = OctreeQuantizer::new(&narrow).quantize(&narrow, &mut Image::new(&narrow, px.clone(), 8, 8).unwrap()).unwrap();
    assert_eq!(fresh.palette(), res.palette());
    assert_eq!(fresh.indices(), res.indices());

    let res = q.quantize(&wide, &mut Image::new(&wide, px.clone(), 8, 8).unwrap()).unwrap();
    assert_eq!(256, res.palette().len());
    assert_eq!(64, q.leaf_count());
    assert_eq!(px, res.remapped_rgba().unwrap());
}
