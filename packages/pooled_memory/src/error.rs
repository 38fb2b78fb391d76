use std::any::type_name;

use thiserror::Error;

/// Errors that can occur when allocating or accessing pooled memory.
///
/// Every variant describes a violated usage contract. None of them are transient, so retrying
/// the same operation with the same inputs will fail the same way.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested allocation can never be satisfied under the allocator's policy.
    #[error("invalid allocation request for {length} elements of {element_type}: {problem}")]
    InvalidAllocationRequest {
        /// The number of elements that was requested.
        length: usize,

        /// Name of the element type that was requested.
        element_type: &'static str,

        /// A human-readable description of the problem.
        problem: String,
    },

    /// The segment has already been disposed and no longer has any backing memory.
    #[error("the segment has already been disposed")]
    UseAfterDispose,

    /// The logical buffer has been disposed or the view used to access it has been
    /// invalidated by a swap of the owner's contents.
    #[error("the logical buffer has been disposed or this view of it has been invalidated")]
    InvalidGroupAccess,

    /// The caller violated a precondition of a bulk operation. No data was touched.
    #[error("contract violation: {problem}")]
    ContractViolation {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// A bounded slice was requested that would straddle a segment boundary.
    #[error(
        "the slice [{start}, {start}+{length}) crosses a segment boundary (segments hold {buffer_length} elements)"
    )]
    CrossSegmentSliceRequest {
        /// Index of the first element of the requested slice.
        start: usize,

        /// Number of elements in the requested slice.
        length: usize,

        /// Number of elements in each full segment of the logical buffer.
        buffer_length: usize,
    },

    /// The logical buffer is already being accessed in a conflicting way, e.g. a write was
    /// attempted while a read guard over the same buffer is still alive.
    #[error("the logical buffer is already being accessed in a conflicting way")]
    GroupBusy,
}

/// A specialized `Result` type for pooled memory operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn contract_violation(problem: impl Into<String>) -> Self {
        Self::ContractViolation {
            problem: problem.into(),
        }
    }

    pub(crate) fn invalid_allocation<T>(length: usize, problem: impl Into<String>) -> Self {
        Self::InvalidAllocationRequest {
            length,
            element_type: type_name::<T>(),
            problem: problem.into(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn invalid_allocation_names_element_type() {
        let error = Error::invalid_allocation::<u32>(10, "too big");

        let message = error.to_string();
        assert!(message.contains("u32"));
        assert!(message.contains("10 elements"));
        assert!(message.contains("too big"));
    }

    #[test]
    fn cross_segment_message_includes_range() {
        let error = Error::CrossSegmentSliceRequest {
            start: 250,
            length: 10,
            buffer_length: 256,
        };

        let message = error.to_string();
        assert!(message.contains("250"));
        assert!(message.contains("256"));
    }

    #[test]
    fn contract_violation_is_error() {
        let result: Result<()> = Err(Error::contract_violation("destination too short"));

        assert!(matches!(result, Err(Error::ContractViolation { .. })));
    }
}
