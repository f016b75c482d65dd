//! Monitor file layout
//!
//! ```text
//! +---------------------------------------------------------------------+
//! | version | gw data ref | service data ref | gateway id (S)           |
//! | gw labels offset | gw labels length | gw values offset | gw values length |
//! | service count | svc 0 name (S) | svc 0 location | ... | svc N-1 location |
//! | ...padding... | svc 0 labels off/len, values off/len | ... (N x 4 ints)  |
//! +------------------------- cache line boundary -----------------------+
//! | gw labels | gw values | svc 0 labels | svc 0 values | ... | svc N-1    |
//! +---------------------------------------------------------------------+
//! ```
//!
//! Every offset in this module depends only on the service capacity and the
//! configured buffer lengths, never on how many services are active.

use crate::config::MonitorConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::region::{BufferRegion, IntField, StrField};
use common::{CACHE_LINE_LENGTH, SIZE_OF_INT, align_up};

/// File format version written at offset 0
pub const MONITOR_VERSION: i32 = 1;

/// Width of every string field in bytes
pub const SIZEOF_STRING: usize = 128;

/// Integer fields in the fixed header
pub const NUMBER_OF_INTS_IN_HEADER: usize = 8;

/// Integer fields per service: location plus four reference entries
pub const NUMBER_OF_INTS_PER_SERVICE: usize = 5;

/// Integer fields per service in the reference section
pub const OFFSETS_PER_SERVICE: usize = 4;

/// Default number of service slots
pub const MAX_SERVICE_COUNT: usize = 10;

/// Upper bound accepted for the configured number of service slots
pub const SERVICE_COUNT_LIMIT: usize = 1024;

/// Default gateway counter values buffer length
pub const GATEWAY_COUNTER_VALUES_BUFFER_LENGTH: usize = 1024 * 1024;

/// Default gateway counter labels buffer length
pub const GATEWAY_COUNTER_LABELS_BUFFER_LENGTH: usize = 32 * GATEWAY_COUNTER_VALUES_BUFFER_LENGTH;

/// Default per-service counter values buffer length
pub const SERVICE_COUNTER_VALUES_BUFFER_LENGTH: usize = 1024 * 1024;

/// Default per-service counter labels buffer length
pub const SERVICE_COUNTER_LABELS_BUFFER_LENGTH: usize = 32 * SERVICE_COUNTER_VALUES_BUFFER_LENGTH;

/// Fixed header fields, in file order
pub mod header {
    use super::{IntField, SIZE_OF_INT, SIZEOF_STRING, StrField};

    /// File format version
    pub const VERSION: IntField = IntField::at(0);
    /// Reference to where gateway data begins
    pub const GATEWAY_DATA_REFERENCE: IntField = IntField::at(VERSION.end());
    /// Reference to where service data begins
    pub const SERVICE_DATA_REFERENCE: IntField = IntField::at(GATEWAY_DATA_REFERENCE.end());
    /// Gateway identity string
    pub const GATEWAY_ID: StrField = StrField::new(SERVICE_DATA_REFERENCE.end(), SIZEOF_STRING);
    /// Resolved offset of the gateway labels buffer
    pub const GATEWAY_LABELS_OFFSET: IntField = IntField::at(GATEWAY_ID.end());
    /// Length of the gateway labels buffer
    pub const GATEWAY_LABELS_LENGTH: IntField = IntField::at(GATEWAY_LABELS_OFFSET.end());
    /// Resolved offset of the gateway values buffer
    pub const GATEWAY_VALUES_OFFSET: IntField = IntField::at(GATEWAY_LABELS_LENGTH.end());
    /// Length of the gateway values buffer
    pub const GATEWAY_VALUES_LENGTH: IntField = IntField::at(GATEWAY_VALUES_OFFSET.end());
    /// Number of activated services
    pub const SERVICE_COUNT: IntField = IntField::at(GATEWAY_VALUES_LENGTH.end());
    /// Start of the service descriptor array
    pub const SERVICE_DESCRIPTORS: usize = SERVICE_COUNT.end();

    /// Value stored in `GATEWAY_DATA_REFERENCE`
    pub const GATEWAY_DATA_OFFSET: usize = GATEWAY_ID.offset();
    /// Value stored in `SERVICE_DATA_REFERENCE`
    pub const SERVICE_DATA_OFFSET: usize = SERVICE_COUNT.offset();

    /// Width of one service descriptor: name plus location
    pub const SERVICE_DESCRIPTOR_LENGTH: usize = SIZEOF_STRING + SIZE_OF_INT;
}

/// The four reference-section fields of one service slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceReference {
    /// Resolved offset of the labels buffer
    pub labels_offset: IntField,
    /// Length of the labels buffer
    pub labels_length: IntField,
    /// Resolved offset of the values buffer
    pub values_offset: IntField,
    /// Length of the values buffer
    pub values_length: IntField,
}

/// Offsets derived from the service capacity and buffer lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorLayout {
    max_services: usize,
    metadata_length: usize,
    end_of_metadata: usize,
    service_reference_section: usize,
    gateway_labels_length: usize,
    gateway_values_length: usize,
    service_labels_length: usize,
    service_values_length: usize,
    total_length: usize,
}

impl MonitorLayout {
    /// Metadata length for `max_services` slots, before alignment
    #[must_use]
    pub const fn metadata_length_for(max_services: usize) -> usize {
        NUMBER_OF_INTS_IN_HEADER * SIZE_OF_INT
            + SIZEOF_STRING
            + max_services * (SIZEOF_STRING + NUMBER_OF_INTS_PER_SERVICE * SIZE_OF_INT)
    }

    /// Cache-line aligned start of the data region for `max_services` slots
    #[must_use]
    pub const fn end_of_metadata_for(max_services: usize) -> usize {
        align_up(
            Self::metadata_length_for(max_services) + SIZE_OF_INT,
            CACHE_LINE_LENGTH,
        )
    }

    /// Derive the layout for a validated configuration
    ///
    /// # Errors
    ///
    /// Returns the configuration's validation error, or `LayoutOverflow` if
    /// the file would be too large for 32-bit offsets.
    pub fn compute(config: &MonitorConfig) -> MonitorResult<Self> {
        config.validate()?;

        let max_services = config.max_services;
        let metadata_length = Self::metadata_length_for(max_services);
        let end_of_metadata = Self::end_of_metadata_for(max_services);
        let service_reference_section =
            end_of_metadata - max_services * OFFSETS_PER_SERVICE * SIZE_OF_INT;

        let overflow = || MonitorError::LayoutOverflow {
            details: format!("monitor file for {max_services} services exceeds i32::MAX bytes"),
        };
        let service_block = config
            .service_labels_length
            .checked_add(config.service_values_length)
            .ok_or_else(overflow)?;
        let total_length = service_block
            .checked_mul(max_services)
            .and_then(|services| services.checked_add(config.gateway_labels_length))
            .and_then(|length| length.checked_add(config.gateway_values_length))
            .and_then(|length| length.checked_add(end_of_metadata))
            .filter(|length| i32::try_from(*length).is_ok())
            .ok_or_else(overflow)?;

        Ok(Self {
            max_services,
            metadata_length,
            end_of_metadata,
            service_reference_section,
            gateway_labels_length: config.gateway_labels_length,
            gateway_values_length: config.gateway_values_length,
            service_labels_length: config.service_labels_length,
            service_values_length: config.service_values_length,
            total_length,
        })
    }

    /// Number of service slots
    #[must_use]
    pub const fn max_services(&self) -> usize {
        self.max_services
    }

    /// Unaligned metadata length
    #[must_use]
    pub const fn metadata_length(&self) -> usize {
        self.metadata_length
    }

    /// Start of the data region, a multiple of the cache line length
    #[must_use]
    pub const fn end_of_metadata(&self) -> usize {
        self.end_of_metadata
    }

    /// Start of the service reference section
    #[must_use]
    pub const fn service_reference_section(&self) -> usize {
        self.service_reference_section
    }

    /// Gateway labels buffer length written into a fresh header
    #[must_use]
    pub const fn gateway_labels_length(&self) -> usize {
        self.gateway_labels_length
    }

    /// Gateway values buffer length written into a fresh header
    #[must_use]
    pub const fn gateway_values_length(&self) -> usize {
        self.gateway_values_length
    }

    /// Per-service labels buffer length
    #[must_use]
    pub const fn service_labels_length(&self) -> usize {
        self.service_labels_length
    }

    /// Per-service values buffer length
    #[must_use]
    pub const fn service_values_length(&self) -> usize {
        self.service_values_length
    }

    /// Bytes taken by one service's labels and values
    #[must_use]
    pub const fn service_block_length(&self) -> usize {
        self.service_labels_length + self.service_values_length
    }

    /// Exact length the mapped file must have
    #[must_use]
    pub const fn total_length(&self) -> usize {
        self.total_length
    }

    /// Metadata region, from offset 0 to the data region
    #[must_use]
    pub const fn metadata_region(&self) -> BufferRegion {
        BufferRegion::new(0, self.end_of_metadata)
    }

    /// Data region holding every counter buffer
    #[must_use]
    pub const fn data_region(&self) -> BufferRegion {
        BufferRegion::new(
            self.end_of_metadata,
            self.total_length - self.end_of_metadata,
        )
    }

    /// Fail with `CapacityExceeded` unless `slot` is a valid slot index
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for `slot >= max_services`.
    pub fn check_slot(&self, slot: usize) -> MonitorResult<()> {
        if slot >= self.max_services {
            return Err(MonitorError::CapacityExceeded {
                requested: slot,
                capacity: self.max_services,
            });
        }
        Ok(())
    }

    /// Name field of the descriptor for `slot`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an out-of-range slot.
    pub fn service_name_field(&self, slot: usize) -> MonitorResult<StrField> {
        self.check_slot(slot)?;
        Ok(StrField::new(
            header::SERVICE_DESCRIPTORS + slot * header::SERVICE_DESCRIPTOR_LENGTH,
            SIZEOF_STRING,
        ))
    }

    /// Location field of the descriptor for `slot`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an out-of-range slot.
    pub fn service_location_field(&self, slot: usize) -> MonitorResult<IntField> {
        Ok(IntField::at(self.service_name_field(slot)?.end()))
    }

    /// Reference-section entry for `slot`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an out-of-range slot.
    pub fn service_reference(&self, slot: usize) -> MonitorResult<ServiceReference> {
        self.check_slot(slot)?;
        let base = self.service_reference_section + slot * OFFSETS_PER_SERVICE * SIZE_OF_INT;
        Ok(ServiceReference {
            labels_offset: IntField::at(base),
            labels_length: IntField::at(base + SIZE_OF_INT),
            values_offset: IntField::at(base + 2 * SIZE_OF_INT),
            values_length: IntField::at(base + 3 * SIZE_OF_INT),
        })
    }

    /// Where the labels buffer of `slot` lives, given the gateway buffer lengths
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an out-of-range slot.
    pub fn service_labels_region(
        &self,
        slot: usize,
        gateway_labels_length: usize,
        gateway_values_length: usize,
    ) -> MonitorResult<BufferRegion> {
        self.check_slot(slot)?;
        Ok(BufferRegion::new(
            self.end_of_metadata
                + gateway_labels_length
                + gateway_values_length
                + slot * self.service_block_length(),
            self.service_labels_length,
        ))
    }
}
