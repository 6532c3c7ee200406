use crate::attr::Attributes;
use crate::error::*;
use crate::pixel::Pixel;
use crate::seacow::SeaCow;
use alloc::boxed::Box;
use alloc::format;

/// Describes image dimensions and pixels for the library.
///
/// Pixels are mutable because dithering diffuses quantization error into pixels that haven't been visited yet.
pub struct Image<'pixels, P> {
    pixels: SeaCow<'pixels, P>,
    width: usize,
    height: usize,
    stride: usize,
}

impl<'pixels, P: Pixel> Image<'pixels, P> {
    /// Describe dimensions of a slice of pixels.
    ///
    /// See the [`rgb`] and [`bytemuck`](//lib.rs/bytemuck) crates for making `[RGBA]` slices from `[u8]` slices.
    #[inline(always)]
    pub fn new_borrowed(attr: &Attributes, pixels: &'pixels mut [P], width: usize, height: usize) -> Result<Self, Error> {
        Self::new_stride(attr, pixels, width, height, width)
    }

    /// Stride is in pixels. Allows defining regions of larger images or images with padding without copying.
    ///
    /// Otherwise the same as [`Image::new_borrowed`].
    #[inline(always)]
    pub fn new_stride(attr: &Attributes, pixels: &'pixels mut [P], width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        Self::new_internal(attr, SeaCow::borrowed(pixels), width, height, stride)
    }

    /// Takes ownership of the pixels, so that it makes a self-contained type.
    ///
    /// The `pixels` argument can be `Vec<P>`, or `Box<[P]>` or `&[P]`.
    #[inline]
    pub fn new<VecP>(attr: &Attributes, pixels: VecP, width: usize, height: usize) -> Result<Image<'static, P>, Error> where VecP: Into<Box<[P]>> {
        Image::new_internal(attr, SeaCow::boxed(pixels.into()), width, height, width)
    }

    fn new_internal(attr: &Attributes, pixels: SeaCow<'pixels, P>, width: usize, height: usize, stride: usize) -> Result<Self, Error> {
        if width == 0 || height == 0 {
            attr.verbose_print("  error: image has no pixels");
            return Err(Unsupported);
        }
        if stride < width {
            attr.verbose_print(format!("  error: stride {stride} is smaller than width {width}"));
            return Err(ValueOutOfRange);
        }
        let required = stride.checked_mul(height - 1)
            .and_then(|len| len.checked_add(width))
            .ok_or(ValueOutOfRange)?;
        let len = pixels.as_slice().len();
        if len < required {
            attr.verbose_print(format!("Buffer length is {len} pixels, which is not enough for {stride}×{height} pixels"));
            return Err(BufferTooSmall);
        }
        Ok(Self { pixels, width, height, stride })
    }

    /// Width of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height of the image in pixels
    #[must_use]
    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Pixels of row `y`, exactly `width` long
    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[P] {
        let start = y * self.stride;
        &self.pixels.as_slice()[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [P] {
        let start = y * self.stride;
        &mut self.pixels.as_mut_slice()[start..start + self.width]
    }

    #[inline(always)]
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> P {
        self.pixels.as_slice()[y * self.stride + x]
    }

    #[inline(always)]
    pub fn set_pixel(&mut self, x: usize, y: usize, px: P) {
        self.pixels.as_mut_slice()[y * self.stride + x] = px;
    }

    /// All rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[P]> + '_ {
        (0..self.height).map(move |y| self.row(y))
    }

    /// The backing buffer, including stride padding. Copies if the pixels were borrowed.
    #[must_use]
    pub fn into_pixels(self) -> Box<[P]> {
        self.pixels.into_boxed()
    }
}

#[test]
fn geometry_checks() {
    use crate::RGBA;
    let attr = Attributes::new();
    let mut px = alloc::vec![RGBA::new(0, 0, 0, 0); 8];

    assert!(Image::new_borrowed(&attr, &mut px, 1, 1).is_ok());
    assert!(Image::new_borrowed(&attr, &mut px, 4, 2).is_ok());
    assert!(Image::new_borrowed(&attr, &mut px, 8, 1).is_ok());
    assert_eq!(Err(BufferTooSmall), Image::new_borrowed(&attr, &mut px, 9, 1).map(|_| ()));
    assert_eq!(Err(BufferTooSmall), Image::new_borrowed(&attr, &mut px, 4, 3).map(|_| ()));
    assert_eq!(Err(Unsupported), Image::new_borrowed(&attr, &mut px, 0, 1).map(|_| ()));
    assert_eq!(Err(Unsupported), Image::new_borrowed(&attr, &mut px, 4, 0).map(|_| ()));
    assert_eq!(Err(ValueOutOfRange), Image::new_stride(&attr, &mut px, 4, 2, 3).map(|_| ()));
    assert_eq!(Err(ValueOutOfRange), Image::new_stride(&attr, &mut px, 2, 3, usize::MAX).map(|_| ()));

    // the last row doesn't need padding
    assert!(Image::new_stride(&attr, &mut px, 2, 3, 3).is_ok());
}

#[test]
fn stride_rows() {
    let attr = Attributes::new();
    let mut px: alloc::vec::Vec<[u8; 4]> = (0..8u8).map(|n| [n, 0, 0, 255]).collect();
    let mut img = Image::new_stride(&attr, &mut px, 2, 3, 3).unwrap();
    assert_eq!(&[[0, 0, 0, 255], [1, 0, 0, 255]], img.row(0));
    assert_eq!(&[[7, 0, 0, 255]], &img.row(2)[1..]);
    assert_eq!([4, 0, 0, 255], img.pixel(1, 1));
    img.set_pixel(0, 1, [9, 9, 9, 9]);
    img.row_mut(2)[0] = [8, 8, 8, 8];
    assert_eq!(3, img.rows().count());
    drop(img);
    assert_eq!([9, 9, 9, 9], px[3]);
    assert_eq!([8, 8, 8, 8], px[6]);
    assert_eq!([2, 0, 0, 255], px[2]); // padding untouched
}
