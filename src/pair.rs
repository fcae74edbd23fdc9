/// Two values stored side by side.
///
/// `UniquePtr` keeps its pointer in `first` and its deletion policy in
/// `second`. Stateless policies are zero-sized types, and a zero-sized field
/// occupies no storage, so a `UniquePtr` with such a policy is exactly as
/// large as the pointer it owns.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CompressedPair<F, S> {
    first: F,
    second: S,
}

impl<F, S> CompressedPair<F, S> {
    #[inline]
    pub(crate) const fn new(first: F, second: S) -> Self {
        Self { first, second }
    }

    #[inline]
    pub(crate) fn first(&self) -> &F {
        &self.first
    }

    #[inline]
    pub(crate) fn first_mut(&mut self) -> &mut F {
        &mut self.first
    }

    #[inline]
    pub(crate) fn second(&self) -> &S {
        &self.second
    }

    #[inline]
    pub(crate) fn second_mut(&mut self) -> &mut S {
        &mut self.second
    }
}
