use crate::pal::{color_distance, PalIndex, RGBA};
use core::hash::{BuildHasher, Hasher};

#[cfg(all(not(feature = "std"), feature = "no_std"))]
use hashbrown::HashMap;
#[cfg(feature = "std")]
use std::collections::HashMap;

/// Memoized nearest-palette-entry search.
///
/// Results are keyed by the exact color, so a cache is only valid for the palette it was filled from.
/// Every quantization run starts with an empty one.
pub struct NearestCache {
    map: HashMap<u32, PalIndex, U32Hasher>,
}

impl NearestCache {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: HashMap::with_hasher(U32Hasher(0)),
        }
    }

    /// Index of the palette entry closest to `px` in RGBA space. Ties go to the lower index.
    ///
    /// The palette must not be empty and must have at most 256 entries.
    #[inline]
    pub fn search(&mut self, palette: &[RGBA], px: RGBA) -> PalIndex {
        let key = u32::from_le_bytes([px.r, px.g, px.b, px.a]);
        *self.map.entry(key).or_insert_with(|| nearest(palette, px))
    }

    /// Number of distinct colors looked up so far
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl Default for NearestCache {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

/// Linear scan, stops early at an exact match
pub(crate) fn nearest(palette: &[RGBA], px: RGBA) -> PalIndex {
    let mut best_index = 0;
    let mut best_distance = u32::MAX;
    for (i, &color) in palette.iter().enumerate() {
        let distance = color_distance(color, px);
        if distance < best_distance {
            best_index = i;
            best_distance = distance;
            if distance == 0 {
                break;
            }
        }
    }
    debug_assert!(best_index <= PalIndex::MAX as usize);
    best_index as PalIndex
}

// Colors are hashed as a single u32
impl BuildHasher for U32Hasher {
    type Hasher = Self;
    #[inline(always)]
    fn build_hasher(&self) -> Self {
        Self(0)
    }
}

pub(crate) struct U32Hasher(pub u32);
impl Hasher for U32Hasher {
    // magic constant from fxhash. For a single 32-bit key that's all it needs!
    #[inline(always)]
    fn finish(&self) -> u64 { u64::from(self.0).wrapping_mul(0x517cc1b727220a95) }
    #[inline(always)]
    fn write_u32(&mut self, i: u32) { self.0 = i; }

    fn write(&mut self, _bytes: &[u8]) { unimplemented!() }
}

#[test]
fn black_white() {
    let black = RGBA::new(0, 0, 0, 255);
    let white = RGBA::new(255, 255, 255, 255);
    let pal = [black, white, RGBA::new(0, 0, 0, 0)];
    let mut cache = NearestCache::new();
    assert!(cache.is_empty());
    assert_eq!(1, cache.search(&pal, RGBA::new(128, 128, 128, 255)));
    assert_eq!(0, cache.search(&pal, RGBA::new(127, 127, 127, 255)));
    assert_eq!(2, cache.search(&pal, RGBA::new(10, 10, 10, 0)));
    assert_eq!(1, cache.search(&pal, RGBA::new(128, 128, 128, 255)));
    assert_eq!(3, cache.len());
    cache.clear();
    assert_eq!(0, cache.len());
}

#[test]
fn ties_go_to_lower_index() {
    let red = RGBA::new(200, 0, 0, 255);
    let blue = RGBA::new(0, 0, 200, 255);
    let purple = RGBA::new(100, 0, 100, 255);
    assert_eq!(0, nearest(&[red, blue], purple));
    assert_eq!(0, nearest(&[blue, red], purple));
    // duplicate entries
    assert_eq!(1, nearest(&[blue, red, red], RGBA::new(200, 0, 0, 255)));
}

#[test]
fn cache_is_keyed_by_exact_color() {
    let pal = [RGBA::new(0, 0, 0, 255), RGBA::new(0, 0, 0, 254)];
    let mut cache = NearestCache::new();
    assert_eq!(0, cache.search(&pal, RGBA::new(0, 0, 0, 255)));
    assert_eq!(1, cache.search(&pal, RGBA::new(0, 0, 0, 254)));
    assert_eq!(2, cache.len());
}
