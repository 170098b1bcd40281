//! Errors reported while validating layouts and configurations.
//!
//! Misuse of a container (out-of-range copies, misaligned or unset pointers)
//! is a programming error and panics instead; these are the conditions a
//! caller can reasonably check for before committing to a layout.

/// A layout or configuration that cannot be honored.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// The requested alignment is not a power of two.
    #[error("alignment {alignment} is not a power of two")]
    AlignmentNotPowerOfTwo {
        /// The rejected alignment.
        alignment: usize,
    },
    /// The chunked capacity for `capacity` elements, or its byte size, overflows.
    #[error("capacity overflow: {capacity} elements")]
    CapacityOverflow {
        /// The element count that could not be represented.
        capacity: usize,
    },
    /// A block of `bytes` bytes exceeds the largest possible allocation.
    #[error("allocation of {bytes} bytes exceeds isize::MAX")]
    AllocationTooLarge {
        /// The requested block size.
        bytes: usize,
    },
}
