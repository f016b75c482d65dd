//! Metadata region: header initialization and read-back

use crate::error::{MonitorError, MonitorResult};
use crate::layout::{MONITOR_VERSION, MonitorLayout, header};
use crate::region::BufferRegion;
use crate::writer::MonitorFileWriter;
use tracing::info;

impl MonitorFileWriter {
    /// Write the fixed header into the metadata region of `file`
    ///
    /// The whole metadata region is zeroed first, so descriptors of slots that
    /// are never activated read back as empty. Gateway buffer offsets are left
    /// at zero until the buffers are allocated.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInitialized` on a second call or when `file` already
    /// carries a header, `MappingTooSmall` if
    /// `file` is shorter than [`Self::total_file_length`], and `NameTooLong`
    /// if the gateway identity does not fit under the reject policy.
    pub fn add_metadata(&mut self, file: &mut [u8]) -> MonitorResult<()> {
        if self.is_initialized() {
            return Err(MonitorError::AlreadyInitialized);
        }
        self.ensure_mapping(file)?;
        if header::VERSION.read(file)? == MONITOR_VERSION {
            return Err(MonitorError::AlreadyInitialized);
        }
        let gateway_id = self.gateway_id().to_string();
        self.check_name(header::GATEWAY_ID, &gateway_id)?;

        let layout = *self.layout();
        layout.metadata_region().slice_mut(file)?.fill(0);

        header::VERSION.write(file, MONITOR_VERSION)?;
        header::GATEWAY_DATA_REFERENCE.write_usize(file, header::GATEWAY_DATA_OFFSET)?;
        header::SERVICE_DATA_REFERENCE.write_usize(file, header::SERVICE_DATA_OFFSET)?;
        self.write_name(file, header::GATEWAY_ID, &gateway_id, "gateway id")?;
        header::GATEWAY_LABELS_OFFSET.write(file, 0)?;
        header::GATEWAY_LABELS_LENGTH.write_usize(file, layout.gateway_labels_length())?;
        header::GATEWAY_VALUES_OFFSET.write(file, 0)?;
        header::GATEWAY_VALUES_LENGTH.write_usize(file, layout.gateway_values_length())?;
        header::SERVICE_COUNT.write(file, 0)?;

        self.mark_initialized();
        info!(
            "Initialized monitor file metadata for gateway '{}' ({} bytes)",
            gateway_id,
            layout.end_of_metadata()
        );
        Ok(())
    }
}

/// Buffer locations recorded for one service slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEntry<'a> {
    /// Slot index
    pub slot: usize,
    /// Service name from the descriptor
    pub name: &'a str,
    /// Labels buffer; offset is zero until allocated
    pub labels: BufferRegion,
    /// Values buffer; offset is zero until allocated
    pub values: BufferRegion,
}

/// Read-only view over an initialized metadata region
///
/// Decodes the header the same way an external reader would, which is what
/// the entity-factory bridge relies on to find resolved buffers.
#[derive(Debug, Clone, Copy)]
pub struct MetadataView<'a> {
    file: &'a [u8],
    layout: &'a MonitorLayout,
}

impl<'a> MetadataView<'a> {
    /// View `file` through `layout`
    #[must_use]
    pub const fn new(file: &'a [u8], layout: &'a MonitorLayout) -> Self {
        Self { file, layout }
    }

    /// File format version
    ///
    /// # Errors
    ///
    /// Returns `MappingTooSmall` if the file does not cover the header.
    pub fn version(&self) -> MonitorResult<i32> {
        header::VERSION.read(self.file)
    }

    /// Offset stored in the gateway-data reference field
    ///
    /// # Errors
    ///
    /// Returns an error if the field is out of bounds or negative.
    pub fn gateway_data_reference(&self) -> MonitorResult<usize> {
        header::GATEWAY_DATA_REFERENCE.read_usize(self.file)
    }

    /// Offset stored in the service-data reference field
    ///
    /// # Errors
    ///
    /// Returns an error if the field is out of bounds or negative.
    pub fn service_data_reference(&self) -> MonitorResult<usize> {
        header::SERVICE_DATA_REFERENCE.read_usize(self.file)
    }

    /// Gateway identity
    ///
    /// # Errors
    ///
    /// Returns an error if the field is out of bounds or not a valid string.
    pub fn gateway_id(&self) -> MonitorResult<&'a str> {
        header::GATEWAY_ID.read(self.file)
    }

    /// Gateway labels buffer as recorded in the header
    ///
    /// # Errors
    ///
    /// Returns an error if a field is out of bounds or negative.
    pub fn gateway_labels(&self) -> MonitorResult<BufferRegion> {
        Ok(BufferRegion::new(
            header::GATEWAY_LABELS_OFFSET.read_usize(self.file)?,
            header::GATEWAY_LABELS_LENGTH.read_usize(self.file)?,
        ))
    }

    /// Gateway values buffer as recorded in the header
    ///
    /// # Errors
    ///
    /// Returns an error if a field is out of bounds or negative.
    pub fn gateway_values(&self) -> MonitorResult<BufferRegion> {
        Ok(BufferRegion::new(
            header::GATEWAY_VALUES_OFFSET.read_usize(self.file)?,
            header::GATEWAY_VALUES_LENGTH.read_usize(self.file)?,
        ))
    }

    /// Number of activated services
    ///
    /// # Errors
    ///
    /// Returns an error if the field is out of bounds or negative.
    pub fn service_count(&self) -> MonitorResult<usize> {
        header::SERVICE_COUNT.read_usize(self.file)
    }

    /// Descriptor and reference entry of `slot`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an out-of-range slot, or a decoding error.
    pub fn service(&self, slot: usize) -> MonitorResult<ServiceEntry<'a>> {
        let reference = self.layout.service_reference(slot)?;
        Ok(ServiceEntry {
            slot,
            name: self.layout.service_name_field(slot)?.read(self.file)?,
            labels: BufferRegion::new(
                reference.labels_offset.read_usize(self.file)?,
                reference.labels_length.read_usize(self.file)?,
            ),
            values: BufferRegion::new(
                reference.values_offset.read_usize(self.file)?,
                reference.values_length.read_usize(self.file)?,
            ),
        })
    }
}
