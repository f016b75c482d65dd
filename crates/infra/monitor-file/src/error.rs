//! Error types for monitor file construction and counter registration

use common::FixedStrError;
use thiserror::Error;

/// Monitor file error types
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Slot index or service count beyond the fixed capacity
    #[error("Capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        /// Slot index or count that was requested
        requested: usize,
        /// Number of slots available
        capacity: usize,
    },

    /// Name does not fit its fixed-width field and truncation is not allowed
    #[error("Name '{name}' is {length} bytes, limit is {limit}")]
    NameTooLong {
        /// The rejected name
        name: String,
        /// Its encoded length in bytes
        length: usize,
        /// Maximum payload bytes for the field
        limit: usize,
    },

    /// Service slot was already activated
    #[error("Service slot {slot} is already registered")]
    AlreadyRegistered {
        /// The duplicated slot
        slot: usize,
    },

    /// Service slot used before activation
    #[error("Service slot {slot} has not been registered")]
    NotRegistered {
        /// The inactive slot
        slot: usize,
    },

    /// Buffer requested before the metadata region was written
    #[error("Monitor file metadata has not been initialized")]
    NotInitialized,

    /// Metadata region written twice
    #[error("Monitor file metadata is already initialized")]
    AlreadyInitialized,

    /// Buffer pair handed out before its offsets were resolved
    #[error("Counter buffers for {owner} have not been allocated")]
    NotAllocated {
        /// Gateway or service the buffers belong to
        owner: String,
    },

    /// Mapped region shorter than the layout requires
    #[error("Mapping of {actual} bytes is smaller than the required {required} bytes")]
    MappingTooSmall {
        /// Bytes required
        required: usize,
        /// Bytes available
        actual: usize,
    },

    /// Layout offsets do not fit the 32-bit header fields
    #[error("Layout overflow: {details}")]
    LayoutOverflow {
        /// Which computation overflowed
        details: String,
    },

    /// Header field holds a value no valid writer produces
    #[error("Corrupt header field at offset {offset}: {details}")]
    CorruptHeader {
        /// Byte offset of the field
        offset: usize,
        /// What is wrong with it
        details: String,
    },

    /// Counter buffers are not aligned for atomic words
    #[error("Counter values buffer at address {address:#x} is not {alignment}-byte aligned")]
    MisalignedBuffer {
        /// Start address of the buffer
        address: usize,
        /// Required alignment
        alignment: usize,
    },

    /// No free counter records left in a buffer pair
    #[error("Counters buffer is full ({capacity} counters)")]
    CountersFull {
        /// Number of records the buffer pair holds
        capacity: usize,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What is invalid
        message: String,
    },

    /// String field could not be encoded or decoded
    #[error("String field error: {0}")]
    Encoding(#[from] FixedStrError),

    /// Backing file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for monitor file results
pub type MonitorResult<T> = Result<T, MonitorError>;
