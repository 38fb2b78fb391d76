use bytemuck::Pod;

/// A plain-data type that can be stored in pooled memory.
///
/// Pooled blocks are reused without being reinitialized, so any bit pattern left behind by a
/// previous renter must be a valid value. [`Pod`] guarantees exactly that. Every [`Pod`] type that
/// is also [`Send`] and [`Sync`] implements this trait automatically.
///
/// Zero-sized types and types aligned to more than 64 bytes implement the trait but are
/// rejected at allocation time.
pub trait Element: Pod + Send + Sync {}

impl<T: Pod + Send + Sync> Element for T {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(u8: Element);
    assert_impl_all!(u32: Element);
    assert_impl_all!(f64: Element);
    assert_impl_all!([u16; 4]: Element);
    assert_not_impl_any!(String: Element);
    assert_not_impl_any!(bool: Element);
}
