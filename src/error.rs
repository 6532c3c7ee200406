use alloc::collections::TryReserveError;
use core::fmt;
pub use Error::*;

/// Error codes
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Image geometry doesn't make sense (e.g. stride narrower than the width)
    ValueOutOfRange = 100,
    /// Either the system/process really hit a limit, or some data like image size was ridiculously wrong
    OutOfMemory,
    /// Progress callback said to stop
    Aborted,
    /// Octree lookup found a color path that was never inserted. This is a bug.
    InternalError,
    /// Slice needs to be bigger, or width/height needs to be smaller
    BufferTooSmall,
    /// Zero-sized images can't be quantized
    Unsupported,
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl fmt::Display for Error {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::ValueOutOfRange => "VALUE_OUT_OF_RANGE",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::Aborted => "ABORTED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::BufferTooSmall => "BUFFER_TOO_SMALL",
            Self::Unsupported => "UNSUPPORTED",
        })
    }
}

impl From<TryReserveError> for Error {
    #[cold]
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

#[test]
fn display_names() {
    use alloc::string::ToString;
    assert_eq!("INTERNAL_ERROR", InternalError.to_string());
    assert_eq!("UNSUPPORTED", Unsupported.to_string());

    let mut v: alloc::vec::Vec<u8> = alloc::vec::Vec::new();
    let err = v.try_reserve_exact(usize::MAX).unwrap_err();
    assert_eq!(OutOfMemory, Error::from(err));
}
