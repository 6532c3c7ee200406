use arrayvec::ArrayVec;
use core::ops::Deref;

/// 8-bit RGBA in sRGB. This is the canonical color format used for all comparisons and arithmetic.
pub type RGBA = rgb::RGBA<u8>;

/// Index into the output palette
pub type PalIndex = u8;

/// Palettes are stored inline, and indices are one byte
pub(crate) const MAX_COLORS: usize = PalIndex::MAX as usize + 1;

/// Fully transparent black, the "all-zero" color. Unused palette slots have this value too.
pub(crate) const TRANSPARENT: RGBA = RGBA { r: 0, g: 0, b: 0, a: 0 };

/// RGBA colors obtained from [`QuantizedImage`](crate::QuantizedImage)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    entries: ArrayVec<RGBA, MAX_COLORS>,
}

impl Palette {
    /// Palette of `len` slots, all set to the all-zero color
    #[inline]
    pub(crate) fn with_len(len: usize) -> Self {
        debug_assert!(len <= MAX_COLORS);
        let mut entries = ArrayVec::new();
        entries.extend(core::iter::repeat(TRANSPARENT).take(len.min(MAX_COLORS)));
        Self { entries }
    }

    /// Copies at most [`MAX_COLORS`] colors
    pub(crate) fn from_colors(colors: &[RGBA]) -> Self {
        Self {
            entries: colors.iter().copied().take(MAX_COLORS).collect(),
        }
    }

    #[inline(always)]
    pub(crate) fn set(&mut self, idx: usize, color: RGBA) {
        self.entries[idx] = color;
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Palette colors
    #[inline(always)]
    #[must_use]
    pub fn as_slice(&self) -> &[RGBA] {
        &self.entries
    }

    /// Lowest index holding the all-zero (fully transparent) color, or `fallback` if there's none.
    ///
    /// Encoders prefer the transparent entry near the start, so of several transparent entries the first wins.
    #[must_use]
    pub(crate) fn transparent_index(&self, fallback: PalIndex) -> PalIndex {
        self.entries.iter()
            .position(|&c| c == TRANSPARENT)
            .map_or(fallback, |i| i as PalIndex)
    }
}

impl Deref for Palette {
    type Target = [RGBA];

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

/// Squared Euclidean distance in RGBA space
#[inline(always)]
pub(crate) fn color_distance(a: RGBA, b: RGBA) -> u32 {
    let d = |x: u8, y: u8| {
        let d = i32::from(x) - i32::from(y);
        (d * d) as u32
    };
    d(a.r, b.r) + d(a.g, b.g) + d(a.b, b.b) + d(a.a, b.a)
}

#[test]
fn transparent_slot() {
    let mut pal = Palette::with_len(4);
    for i in 0..4 {
        pal.set(i, RGBA::new(i as u8 + 1, 0, 0, 255));
    }
    assert_eq!(9, pal.transparent_index(9));

    pal.set(3, TRANSPARENT);
    assert_eq!(3, pal.transparent_index(9));
    pal.set(1, TRANSPARENT);
    assert_eq!(1, pal.transparent_index(9));

    // zero-alpha isn't enough, all channels must be zero
    let pal = Palette::from_colors(&[RGBA::new(1, 2, 3, 0), RGBA::new(0, 0, 0, 255)]);
    assert_eq!(2, pal.transparent_index(2));
}

#[test]
fn distances() {
    let black = RGBA::new(0, 0, 0, 255);
    let white = RGBA::new(255, 255, 255, 255);
    assert_eq!(0, color_distance(white, white));
    assert_eq!(3 * 255 * 255, color_distance(black, white));
    assert_eq!(4 * 255 * 255, color_distance(TRANSPARENT, white));
    assert_eq!(color_distance(black, RGBA::new(128, 128, 128, 255)), 3 * 128 * 128);
}

#[test]
fn palette_len() {
    assert_eq!(256, Palette::with_len(256).len());
    let mut p = Palette::from_colors(&[RGBA::new(1, 1, 1, 1); 300]);
    assert_eq!(MAX_COLORS, p.len());
    p.truncate(10);
    assert_eq!(10, p.as_slice().len());
    assert!(p.iter().all(|c| *c == RGBA::new(1, 1, 1, 1)));
}
