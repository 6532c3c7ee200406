use crate::dither::ErrorDiffuser;
use crate::error::Error;
use crate::image::Image;
use crate::pal::{PalIndex, MAX_COLORS};
use crate::pixel::Pixel;
use crate::quant::{OctreeQuantizer, QuantizedImage, Quantizer};
use alloc::boxed::Box;
use alloc::sync::Arc;

/// Starting point and settings for the quantization process
#[derive(Clone)]
pub struct Attributes {
    max_colors: PalIndex,
    dithering: bool,
    ditherer: ErrorDiffuser,

    progress_callback: Option<Arc<dyn Fn(f32) -> ControlFlow + Send + Sync>>,
    log_callback: Option<Arc<dyn Fn(&Attributes, &str) + Send + Sync>>,
    log_flush_callback: Option<Arc<dyn Fn(&Attributes) + Send + Sync>>,
}

impl Attributes {
    /// New handle for library configuration
    ///
    /// See also [`Attributes::new_image()`]
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_colors: (MAX_COLORS - 1) as PalIndex,
            dithering: true,
            ditherer: ErrorDiffuser::default(),
            progress_callback: None,
            log_callback: None,
            log_flush_callback: None,
        }
    }

    /// Make an image from pixels that the image will own.
    ///
    /// The `pixels` argument can be `Vec<P>`, or `Box<[P]>` or `&[P]`.
    /// See [`Attributes::new_image_borrowed`] for a non-copying alternative.
    #[inline]
    pub fn new_image<P: Pixel, VecP>(&self, pixels: VecP, width: usize, height: usize) -> Result<Image<'static, P>, Error> where VecP: Into<Box<[P]>> {
        Image::new(self, pixels, width, height)
    }

    /// Describe dimensions of a slice of pixels.
    ///
    /// Dithering writes the diffused error into these pixels.
    #[inline]
    pub fn new_image_borrowed<'pixels, P: Pixel>(&self, pixels: &'pixels mut [P], width: usize, height: usize) -> Result<Image<'pixels, P>, Error> {
        Image::new_borrowed(self, pixels, width, height)
    }

    /// Like [`Attributes::new_image_borrowed`], with rows `stride` pixels apart
    #[inline]
    pub fn new_image_stride<'pixels, P: Pixel>(&self, pixels: &'pixels mut [P], width: usize, height: usize, stride: usize) -> Result<Image<'pixels, P>, Error> {
        Image::new_stride(self, pixels, width, height, stride)
    }

    /// Generate a palette for the image with the octree quantizer, and map the image to it
    pub fn quantize<P: Pixel>(&self, image: &mut Image<'_, P>) -> Result<QuantizedImage, Error> {
        OctreeQuantizer::new(self).quantize(self, image)
    }

    /// Values outside 1-255 are clamped.
    ///
    /// The palette always has one more slot than this, reserved for the transparent color.
    #[inline]
    pub fn set_max_colors(&mut self, colors: u32) {
        self.max_colors = colors.clamp(1, (MAX_COLORS - 1) as u32) as PalIndex;
    }

    /// Return max number of colors set
    #[inline(always)]
    #[must_use]
    pub fn max_colors(&self) -> u32 {
        self.max_colors.into()
    }

    /// Enables error diffusion in the second pass. It's on by default.
    ///
    /// Without dithering every pixel maps exactly to its octree leaf, and the work is split across threads.
    #[inline(always)]
    pub fn set_dithering(&mut self, enabled: bool) {
        self.dithering = enabled;
    }

    #[inline(always)]
    #[must_use]
    pub fn dithering(&self) -> bool {
        self.dithering
    }

    /// Diffusion matrix used when dithering is on, [`FLOYD_STEINBERG`](crate::FLOYD_STEINBERG) by default
    #[inline(always)]
    pub fn set_ditherer(&mut self, ditherer: ErrorDiffuser) {
        self.ditherer = ditherer;
    }

    #[inline(always)]
    #[must_use]
    pub fn ditherer(&self) -> ErrorDiffuser {
        self.ditherer
    }

    /// Set callback function to be called every time the library wants to print a message.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_log_callback<F: Fn(&Attributes, &str) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_callback = Some(Arc::new(callback));
    }

    /// Callback for flushing output (if you buffer messages, that's the time to flush those buffers)
    #[inline]
    pub fn set_log_flush_callback<F: Fn(&Attributes) + Send + Sync + 'static>(&mut self, callback: F) {
        self.verbose_printf_flush();
        self.log_flush_callback = Some(Arc::new(callback));
    }

    /// Set callback function to be called every time the library makes a progress.
    /// It can be used to cancel operation early.
    ///
    /// To share data with the callback, use `Arc` or `Atomic*` types and `move ||` closures.
    #[inline]
    pub fn set_progress_callback<F: Fn(f32) -> ControlFlow + Send + Sync + 'static>(&mut self, callback: F) {
        self.progress_callback = Some(Arc::new(callback));
    }

    // true == abort
    #[inline]
    #[must_use]
    pub(crate) fn progress(self: &Attributes, percent: f32) -> bool {
        if let Some(f) = &self.progress_callback {
            f(percent) == ControlFlow::Break
        } else {
            false
        }
    }

    #[inline(always)]
    pub(crate) fn verbose_print(self: &Attributes, msg: impl AsRef<str>) {
        fn _print(a: &Attributes, msg: &str) {
            if let Some(f) = &a.log_callback {
                f(a, msg);
            }
        }
        _print(self, msg.as_ref());
    }

    #[inline]
    pub(crate) fn verbose_printf_flush(self: &Attributes) {
        if let Some(f) = &self.log_flush_callback {
            f(self);
        }
    }
}

impl Drop for Attributes {
    fn drop(&mut self) {
        self.verbose_printf_flush();
    }
}

impl Default for Attributes {
    #[inline(always)]
    fn default() -> Attributes {
        Attributes::new()
    }
}

/// Result of callback in [`Attributes::set_progress_callback`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum ControlFlow {
    /// Continue processing as normal
    Continue = 1,
    /// Abort processing and fail
    Break = 0,
}

#[test]
fn getset() {
    let mut a = Attributes::new();
    assert_eq!(255, a.max_colors());
    assert!(a.dithering());
    assert_eq!(crate::FLOYD_STEINBERG, a.ditherer());

    a.set_max_colors(5);
    assert_eq!(5, a.max_colors());
    a.set_max_colors(0);
    assert_eq!(1, a.max_colors());
    a.set_max_colors(256);
    assert_eq!(255, a.max_colors());
    a.set_max_colors(u32::MAX);
    assert_eq!(255, a.max_colors());

    a.set_dithering(false);
    assert!(!a.dithering());
    a.set_ditherer(crate::STUCKI);
    assert_eq!("Stucki", a.ditherer().name);
}

#[test]
fn callbacks() {
    use core::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    let logged = Arc::new(AtomicUsize::new(0));
    let flushed = Arc::new(AtomicUsize::new(0));
    let mut a = Attributes::new();
    {
        let logged = logged.clone();
        a.set_log_callback(move |_, msg| {
            assert!(!msg.is_empty());
            logged.fetch_add(1, SeqCst);
        });
    }
    {
        let flushed = flushed.clone();
        a.set_log_flush_callback(move |_| {
            flushed.fetch_add(1, SeqCst);
        });
    }
    a.verbose_print("hello");
    assert_eq!(1, logged.load(SeqCst));

    assert!(!a.progress(10.));
    a.set_progress_callback(|p| if p < 50. { ControlFlow::Continue } else { ControlFlow::Break });
    assert!(!a.progress(10.));
    assert!(a.progress(50.));

    let b = a.clone();
    drop(a);
    assert_eq!(1, flushed.load(SeqCst));
    drop(b);
    assert_eq!(2, flushed.load(SeqCst));
}
