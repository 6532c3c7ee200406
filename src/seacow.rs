use alloc::boxed::Box;

/// Pixels that are either borrowed from the caller or owned by the image.
///
/// Dithering writes diffused error back into the pixels, so both variants are mutable.
pub(crate) struct SeaCow<'a, T> {
    inner: SeaCowInner<'a, T>,
}

enum SeaCowInner<'a, T> {
    Borrowed(&'a mut [T]),
    Boxed(Box<[T]>),
}

impl<'a, T> SeaCow<'a, T> {
    #[inline]
    pub fn borrowed(data: &'a mut [T]) -> Self {
        Self {
            inner: SeaCowInner::Borrowed(data),
        }
    }

    #[inline]
    pub fn boxed(data: Box<[T]>) -> Self {
        Self {
            inner: SeaCowInner::Boxed(data),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match &self.inner {
            SeaCowInner::Borrowed(a) => a,
            SeaCowInner::Boxed(x) => x,
        }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.inner {
            SeaCowInner::Borrowed(a) => a,
            SeaCowInner::Boxed(x) => x,
        }
    }

    /// Copies only if the data was borrowed
    pub fn into_boxed(self) -> Box<[T]> where T: Clone {
        match self.inner {
            SeaCowInner::Borrowed(a) => a.to_vec().into_boxed_slice(),
            SeaCowInner::Boxed(x) => x,
        }
    }
}

#[test]
fn borrowed_writes_through() {
    let mut px = [1u8, 2, 3];
    {
        let mut cow = SeaCow::borrowed(&mut px[..]);
        cow.as_mut_slice()[1] = 20;
        assert_eq!(&[1, 20, 3], cow.as_slice());
    }
    assert_eq!([1, 20, 3], px);

    let mut cow = SeaCow::boxed(alloc::vec![5u8; 2].into_boxed_slice());
    cow.as_mut_slice()[0] = 0;
    assert_eq!(&[0, 5], cow.as_slice());
    assert_eq!(&[0, 5], &*cow.into_boxed());
}
