//! Octree color reduction.
//!
//! Colors are bucketed by successively finer bit-slices of red, green and blue: every level
//! of the tree consumes one bit of each channel, so a node has up to 8 children. Leaves
//! accumulate pixel counts and channel sums. Reduction folds the children of the deepest
//! reducible node into it until the number of leaves fits the palette.
//!
//! Nodes live in an arena (`Vec<Node>`) and refer to each other by index. Nodes that are
//! folded into their parent are detached, and stay in the arena unreachable until the tree is dropped.

use crate::error::*;
use crate::pal::{PalIndex, Palette, MAX_COLORS, RGBA};
use alloc::vec::Vec;
use core::num::NonZeroU32;

/// Deepest tree possible: one level per bit of an 8-bit channel
pub(crate) const MAX_DEPTH: usize = 8;

type NodeId = usize;

const ROOT: NodeId = 0;

/// Index of a child node. The root is never anyone's child, so 0 is free to mean "none".
type ChildId = Option<NonZeroU32>;

#[derive(Clone, Default)]
struct Node {
    children: [ChildId; 8],
    is_leaf: bool,
    pixel_count: u64,
    red: u64,
    green: u64,
    blue: u64,
    /// Valid only after the palette has been built
    palette_index: PalIndex,
}

impl Node {
    #[inline(always)]
    fn increment(&mut self, px: RGBA) {
        self.pixel_count += 1;
        self.red += u64::from(px.r);
        self.green += u64::from(px.g);
        self.blue += u64::from(px.b);
    }

    /// Average of the accumulated colors, always opaque
    fn average(&self) -> RGBA {
        let count = self.pixel_count;
        if count == 0 {
            return RGBA::new(0, 0, 0, 255);
        }
        let avg = |sum: u64| ((sum + count / 2) / count) as u8;
        RGBA::new(avg(self.red), avg(self.green), avg(self.blue), 255)
    }
}

pub(crate) struct Octree {
    nodes: Vec<Node>,
    /// Non-leaf nodes per level, most recently created last
    reducible: [Vec<NodeId>; MAX_DEPTH],
    max_color_bits: u8,
    leaves: usize,
    /// Last color added and the leaf it landed in, for runs of identical pixels
    previous: Option<(RGBA, NodeId)>,
}

/// Bits needed to tell `colors` colors apart, i.e. `ceil(log2(colors))`
#[inline]
#[must_use]
pub(crate) fn bits_for_colors(colors: usize) -> u8 {
    let bits = usize::BITS - colors.max(1).saturating_sub(1).leading_zeros();
    (bits as u8).min(MAX_DEPTH as u8)
}

/// Picks one bit of each channel at `level` (MSB first): blue is the high bit, red the low bit.
#[inline(always)]
fn child_index(px: RGBA, level: u8) -> usize {
    debug_assert!((level as usize) < MAX_DEPTH);
    let shift = 7 - level;
    let r = (px.r >> shift) & 1;
    let g = (px.g >> shift) & 1;
    let b = (px.b >> shift) & 1;
    usize::from(b << 2 | g << 1 | r)
}

impl Octree {
    /// Leaves are created at depth `max_color_bits` (at most 8)
    pub fn new(max_color_bits: u8) -> Self {
        let max_color_bits = max_color_bits.min(MAX_DEPTH as u8);
        // with 0 bits the root is the only leaf
        let root_is_leaf = max_color_bits == 0;
        let mut reducible: [Vec<NodeId>; MAX_DEPTH] = Default::default();
        if !root_is_leaf {
            reducible[0].push(ROOT);
        }
        Self {
            nodes: alloc::vec![Node { is_leaf: root_is_leaf, ..Node::default() }],
            reducible,
            max_color_bits,
            leaves: usize::from(root_is_leaf),
            previous: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    fn new_node(&mut self, level: u8) -> Result<NodeId, Error> {
        let id = self.nodes.len();
        if id > u32::MAX as usize {
            return Err(OutOfMemory);
        }
        self.nodes.try_reserve(1)?;
        let is_leaf = level == self.max_color_bits;
        self.nodes.push(Node { is_leaf, ..Node::default() });
        if is_leaf {
            self.leaves += 1;
        } else {
            let list = &mut self.reducible[level as usize];
            list.try_reserve(1)?;
            list.push(id);
        }
        Ok(id)
    }

    /// Counts one pixel of this color
    pub fn add_color(&mut self, px: RGBA) -> Result<(), Error> {
        if let Some((previous_color, leaf)) = self.previous {
            if previous_color == px {
                self.nodes[leaf].increment(px);
                return Ok(());
            }
        }

        let mut id = ROOT;
        let mut level = 0;
        while !self.nodes[id].is_leaf {
            let idx = child_index(px, level);
            id = match self.nodes[id].children[idx] {
                Some(child) => child.get() as NodeId,
                None => {
                    let child = self.new_node(level + 1)?;
                    self.nodes[id].children[idx] = NonZeroU32::new(child as u32);
                    child
                },
            };
            level += 1;
        }
        self.nodes[id].increment(px);
        self.previous = Some((px, id));
        Ok(())
    }

    /// Folds the deepest most recently created reducible node into a leaf.
    ///
    /// Nodes with a single child don't change the number of leaves, so folding continues until
    /// at least one leaf is gone. Returns the number of leaves removed, 0 if nothing is left to fold.
    pub fn reduce(&mut self) -> usize {
        // the stale leaf may be about to be detached
        self.previous = None;

        loop {
            // level 0 is only the root, the last resort
            let level = (1..MAX_DEPTH).rev()
                .find(|&l| !self.reducible[l].is_empty())
                .unwrap_or(0);
            let Some(id) = self.reducible[level].pop() else {
                return 0;
            };

            let children = core::mem::take(&mut self.nodes[id].children);
            let (mut count, mut red, mut green, mut blue) = (0, 0, 0, 0);
            let mut folded = 0;
            for child in children.iter().flatten() {
                let child = &self.nodes[child.get() as NodeId];
                debug_assert!(child.is_leaf);
                count += child.pixel_count;
                red += child.red;
                green += child.green;
                blue += child.blue;
                folded += 1;
            }

            let node = &mut self.nodes[id];
            node.pixel_count += count;
            node.red += red;
            node.green += green;
            node.blue += blue;
            node.is_leaf = true;

            // the node itself is the new leaf
            self.leaves = self.leaves + 1 - folded;
            if folded > 1 {
                return folded - 1;
            }
        }
    }

    /// Reduces the tree to at most `color_count` leaves and lists their average colors in tree order.
    ///
    /// The palette has `color_count + 1` slots; slots without a leaf stay all-zero (transparent).
    pub fn palletize(&mut self, color_count: usize) -> Result<Palette, Error> {
        let color_count = color_count.clamp(1, MAX_COLORS - 1);
        while self.leaves > color_count {
            if self.reduce() == 0 {
                return Err(InternalError);
            }
        }

        let mut palette = Palette::with_len(color_count + 1);
        let mut next_index = 0;
        self.construct_palette(ROOT, &mut palette, &mut next_index);
        debug_assert_eq!(next_index, self.leaves);
        Ok(palette)
    }

    /// Depth-first, lower child index first
    fn construct_palette(&mut self, id: NodeId, palette: &mut Palette, next_index: &mut usize) {
        let node = &mut self.nodes[id];
        if node.is_leaf {
            palette.set(*next_index, node.average());
            node.palette_index = *next_index as PalIndex;
            *next_index += 1;
            return;
        }
        let children = node.children;
        for child in children.iter().flatten() {
            self.construct_palette(child.get() as NodeId, palette, next_index);
        }
    }

    /// Palette index of a color that has been added to the tree.
    ///
    /// Only valid after [`Octree::palletize`]. Colors that were never added may have no path to a leaf,
    /// which is reported as [`Error::InternalError`].
    pub fn palette_index(&self, px: RGBA) -> Result<PalIndex, Error> {
        let mut node = &self.nodes[ROOT];
        let mut level = 0;
        while !node.is_leaf {
            let child = node.children[child_index(px, level)].ok_or(InternalError)?;
            node = &self.nodes[child.get() as NodeId];
            level += 1;
        }
        Ok(node.palette_index)
    }
}

#[cfg(test)]
fn tree_of(max_color_bits: u8, colors: &[RGBA]) -> Octree {
    let mut tree = Octree::new(max_color_bits);
    for &c in colors {
        tree.add_color(c).unwrap();
    }
    tree
}

#[test]
fn bits() {
    assert_eq!(0, bits_for_colors(0));
    assert_eq!(0, bits_for_colors(1));
    assert_eq!(1, bits_for_colors(2));
    assert_eq!(2, bits_for_colors(3));
    assert_eq!(2, bits_for_colors(4));
    assert_eq!(3, bits_for_colors(5));
    assert_eq!(7, bits_for_colors(128));
    assert_eq!(8, bits_for_colors(129));
    assert_eq!(8, bits_for_colors(255));
    assert_eq!(8, bits_for_colors(100_000));
}

#[test]
fn child_bits() {
    assert_eq!(0, child_index(RGBA::new(0, 0, 0, 255), 0));
    assert_eq!(1, child_index(RGBA::new(0x80, 0, 0, 255), 0));
    assert_eq!(2, child_index(RGBA::new(0, 0x80, 0, 255), 0));
    assert_eq!(4, child_index(RGBA::new(0, 0, 0x80, 255), 0));
    assert_eq!(7, child_index(RGBA::new(1, 1, 1, 255), 7));
    assert_eq!(5, child_index(RGBA::new(0x7F, 0x00, 0x40, 0), 1));
    // alpha doesn't matter
    assert_eq!(child_index(RGBA::new(9, 99, 199, 0), 3), child_index(RGBA::new(9, 99, 199, 255), 3));
}

#[test]
fn lossless_when_few_colors() {
    let colors = [
        RGBA::new(255, 0, 0, 255),
        RGBA::new(0, 0, 255, 255),
        RGBA::new(1, 2, 3, 255),
        RGBA::new(1, 2, 4, 255),
        RGBA::new(200, 100, 50, 255),
    ];
    let mut tree = tree_of(8, &colors);
    assert_eq!(5, tree.leaf_count());
    let pal = tree.palletize(255).unwrap();
    assert_eq!(256, pal.len());
    assert_eq!(5, pal.iter().filter(|c| c.a == 255).count());
    for c in colors {
        let idx = tree.palette_index(c).unwrap();
        assert_eq!(c, pal[idx as usize]);
    }
}

#[test]
fn palette_in_tree_order() {
    // child indices at level 0: black=0, red=1, green=2, blue=4
    let mut tree = tree_of(8, &[
        RGBA::new(0, 0, 255, 255),
        RGBA::new(0, 255, 0, 255),
        RGBA::new(255, 0, 0, 255),
        RGBA::new(0, 0, 0, 255),
    ]);
    let pal = tree.palletize(4).unwrap();
    assert_eq!(&[
        RGBA::new(0, 0, 0, 255),
        RGBA::new(255, 0, 0, 255),
        RGBA::new(0, 255, 0, 255),
        RGBA::new(0, 0, 255, 255),
        RGBA::new(0, 0, 0, 0),
    ], pal.as_slice());
    assert_eq!(3, tree.palette_index(RGBA::new(0, 0, 255, 255)).unwrap());
}

#[test]
fn reduction_averages() {
    // same top 7 bits, so they share a parent at the deepest level
    let mut tree = tree_of(8, &[
        RGBA::new(10, 20, 30, 255),
        RGBA::new(10, 20, 31, 255),
        RGBA::new(11, 21, 31, 255),
    ]);
    assert_eq!(3, tree.leaf_count());
    let pal = tree.palletize(1).unwrap();
    assert_eq!(1, tree.leaf_count());
    assert_eq!(2, pal.len());
    // (10+10+11)/3 = 10.33, (20+20+21)/3 = 20.33, (30+31+31)/3 = 30.67
    assert_eq!(RGBA::new(10, 20, 31, 255), pal[0]);
    assert_eq!(RGBA::new(0, 0, 0, 0), pal[1]);
    assert_eq!(0, tree.palette_index(RGBA::new(11, 21, 31, 255)).unwrap());
}

#[test]
fn reduction_is_monotonic() {
    let colors: Vec<_> = (0..=255u8).flat_map(|i| [RGBA::new(i, 255 - i, i / 2, 255), RGBA::new(i / 3, i, 7, 255)]).collect();
    let mut tree = tree_of(8, &colors);
    let mut leaves = tree.leaf_count();
    assert!(leaves > 16);
    while leaves > 16 {
        let removed = tree.reduce();
        assert!(removed > 0);
        assert_eq!(leaves - removed, tree.leaf_count());
        leaves = tree.leaf_count();
    }

    // everything folds into the root eventually
    while tree.reduce() > 0 {}
    assert_eq!(1, tree.leaf_count());
    assert_eq!(0, tree.reduce());
}

#[test]
fn palettes_for_every_size() {
    let colors: Vec<_> = (0..1000u32).map(|i| RGBA::new((i * 7) as u8, (i * 13) as u8, (i * 31) as u8, 255)).collect();
    for n in [1, 2, 3, 7, 16, 100, 255] {
        let mut tree = tree_of(bits_for_colors(n), &colors);
        let pal = tree.palletize(n).unwrap();
        assert_eq!(n + 1, pal.len());
        assert!(tree.leaf_count() <= n);
        for &c in &colors {
            assert!((tree.palette_index(c).unwrap() as usize) < tree.leaf_count());
        }
    }
}

#[test]
fn single_color_depth() {
    // with 0 bits the root itself is the only leaf
    let mut tree = tree_of(0, &[RGBA::new(1, 2, 3, 255), RGBA::new(3, 4, 5, 255)]);
    assert_eq!(1, tree.leaf_count());
    let pal = tree.palletize(1).unwrap();
    assert_eq!(RGBA::new(2, 3, 4, 255), pal[0]);
    assert_eq!(0, tree.palette_index(RGBA::new(200, 200, 200, 255)).unwrap());
}

#[test]
fn runs_use_previous_leaf() {
    let red = RGBA::new(255, 0, 0, 255);
    let mut tree = tree_of(8, &[red, red, red, RGBA::new(0, 0, 255, 255), red]);
    assert_eq!(2, tree.leaf_count());
    let pal = tree.palletize(255).unwrap();
    let idx = tree.palette_index(red).unwrap();
    assert_eq!(red, pal[idx as usize]);
    let leaf = tree.nodes.iter().find(|n| n.is_leaf && n.red == 4 * 255).unwrap();
    assert_eq!(4, leaf.pixel_count);
}

#[test]
fn unknown_color_is_an_error() {
    let mut tree = tree_of(8, &[RGBA::new(0, 0, 0, 255), RGBA::new(255, 255, 255, 255)]);
    tree.palletize(255).unwrap();
    assert_eq!(Err(InternalError), tree.palette_index(RGBA::new(0, 255, 0, 255)));
}

#[test]
fn empty_tree() {
    let mut tree = Octree::new(8);
    assert_eq!(0, tree.leaf_count());
    assert_eq!(&[ROOT], &tree.reducible[0][..]);
    let pal = tree.palletize(4).unwrap();
    assert_eq!(5, pal.len());
    assert!(pal.iter().all(|&c| c == RGBA::new(0, 0, 0, 0)));

    let tree = Octree::new(0);
    assert_eq!(1, tree.leaf_count());
    assert!(tree.reducible.iter().all(Vec::is_empty));
}
