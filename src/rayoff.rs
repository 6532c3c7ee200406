use core::cell::OnceCell;
use core::slice::ChunksMut;

pub(crate) struct ThreadLocal<T>(OnceCell<T>);

impl<T> ThreadLocal<T> {
    #[inline(always)]
    pub fn new() -> Self {
        Self(OnceCell::new())
    }

    #[inline(always)]
    pub fn get_or(&self, f: impl FnOnce() -> T) -> &T {
        self.0.get_or_init(f)
    }
}

pub(crate) trait FakeRayonSlice<T> {
    fn par_chunks_mut(&mut self, chunk_size: usize) -> ChunksMut<'_, T>;
}

impl<T> FakeRayonSlice<T> for [T] {
    #[inline(always)]
    fn par_chunks_mut(&mut self, chunk_size: usize) -> ChunksMut<'_, T> {
        self.chunks_mut(chunk_size)
    }
}

#[test]
fn sequential_stand_ins() {
    let tls = ThreadLocal::new();
    assert_eq!(1, *tls.get_or(|| 1));
    assert_eq!(1, *tls.get_or(|| 2));

    let mut v = [0u8; 5];
    v.par_chunks_mut(2).enumerate().for_each(|(i, c)| c.fill(i as u8));
    assert_eq!([0, 0, 1, 1, 2], v);
}
