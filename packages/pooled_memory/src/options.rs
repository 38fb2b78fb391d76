/// Determines the contents of freshly allocated memory.
///
/// # Examples
///
/// ```
/// use pooled_memory::{AllocationOptions, MemoryAllocator, PooledMemoryAllocator};
///
/// let allocator = PooledMemoryAllocator::new();
///
/// let segment = allocator.allocate::<u32>(16, AllocationOptions::Clean).unwrap();
/// assert!(segment.span().unwrap().iter().all(|&x| x == 0));
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum AllocationOptions {
    /// The contents are unspecified. Memory reused from a pool still holds whatever the previous
    /// renter left there. This is the default.
    #[default]
    None,

    /// The contents are zero-filled before the memory is handed out.
    Clean,
}

impl AllocationOptions {
    /// Whether the allocator must zero the memory before handing it out.
    #[must_use]
    pub fn is_clean(self) -> bool {
        matches!(self, Self::Clean)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_is_none() {
        assert_eq!(AllocationOptions::default(), AllocationOptions::None);
        assert!(!AllocationOptions::default().is_clean());
        assert!(AllocationOptions::Clean.is_clean());
    }
}
