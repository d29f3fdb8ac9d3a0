use std::borrow::Cow;

/// A pure per-chunk byte transformation applied before each write.
///
/// The chunk is handed over as an immutable view of the copy buffer, so a
/// transform can never alter bytes the caller may still own. It may return the
/// chunk unchanged (borrowed) or a new sequence of any length, including empty.
pub trait Transform: Send + Sync {
    fn apply<'a>(&self, chunk: &'a [u8]) -> Cow<'a, [u8]>;
}

/// Passes every chunk through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply<'a>(&self, chunk: &'a [u8]) -> Cow<'a, [u8]> {
        Cow::Borrowed(chunk)
    }
}

impl<F> Transform for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn apply<'a>(&self, chunk: &'a [u8]) -> Cow<'a, [u8]> {
        Cow::Owned(self(chunk))
    }
}
