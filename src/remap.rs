use crate::attr::Attributes;
use crate::dither::{Dither, DitherPoint};
use crate::error::*;
use crate::image::Image;
use crate::nearest::NearestCache;
use crate::pal::{PalIndex, Palette};
use crate::pixel::Pixel;
use crate::quant::Quantizer;
use alloc::vec::Vec;
use core::cell::RefCell;

#[cfg(not(feature = "threads"))]
use crate::rayoff::*;
#[cfg(feature = "threads")]
use rayon::prelude::*;
#[cfg(feature = "threads")]
use thread_local::ThreadLocal;

fn index_buffer(image_len: usize) -> Result<Vec<PalIndex>, Error> {
    let mut indices = Vec::new();
    indices.try_reserve_exact(image_len)?;
    indices.resize(image_len, 0);
    Ok(indices)
}

/// Second pass without dithering.
///
/// Pixels don't affect each other, so rows are mapped in parallel. Runs of identical pixels are
/// looked up once per run, within a row.
#[inline(never)]
pub(crate) fn remap_exact<P: Pixel, Q: Quantizer<P> + Sync>(quantizer: &Q, image: &Image<'_, P>) -> Result<Vec<PalIndex>, Error> {
    let width = image.width();
    let mut indices = index_buffer(width * image.height())?;

    let tls = ThreadLocal::new();
    indices.par_chunks_mut(width).enumerate().try_for_each(|(y, output_row)| -> Result<(), Error> {
        let cache = tls.get_or(|| RefCell::new(NearestCache::new()));
        let cache = &mut *cache.borrow_mut();

        let mut previous = None;
        for (&px, out) in image.row(y).iter().zip(output_row) {
            let index = match previous {
                Some((last_px, last_index)) if last_px == px => last_index,
                _ => quantizer.quantize_pixel(px, false, cache)?,
            };
            previous = Some((px, index));
            *out = index;
        }
        Ok(())
    })?;
    Ok(indices)
}

/// Second pass with dithering.
///
/// Strictly row-major: the dithering hook writes into pixels that haven't been read yet.
/// The hook sees every pixel, including repeats that reuse the previous pixel's index.
#[inline(never)]
pub(crate) fn remap_dithered<P: Pixel, Q: Quantizer<P>, D: Dither>(attr: &Attributes, quantizer: &Q, dither: &D, image: &mut Image<'_, P>, palette: &Palette) -> Result<Vec<PalIndex>, Error> {
    let width = image.width();
    let height = image.height();
    let mut indices = index_buffer(width * height)?;
    let mut cache = NearestCache::new();

    // source pixel, its index, and the palette color it got
    let mut previous: Option<(P, PalIndex, P)> = None;
    for (y, output_row) in indices.chunks_exact_mut(width).enumerate() {
        for (x, out) in output_row.iter_mut().enumerate() {
            let source = image.pixel(x, y);
            let (index, transformed) = match previous {
                Some((last_px, last_index, last_transformed)) if last_px == source => (last_index, last_transformed),
                _ => {
                    let index = quantizer.quantize_pixel(source, true, &mut cache)?;
                    let color = *palette.get(usize::from(index)).ok_or(InternalError)?;
                    (index, P::from_rgba(color))
                },
            };
            previous = Some((source, index, transformed));

            dither.dither(image, source, transformed, DitherPoint {
                x,
                y,
                offset_x: 0,
                offset_y: 0,
                width,
                height,
            });
            *out = index;
        }
        if attr.progress(50. + 49. * (y + 1) as f32 / height as f32) {
            return Err(Aborted);
        }
    }
    attr.verbose_print(alloc::format!("  dithered with {} colors cached", cache.len()));
    Ok(indices)
}
