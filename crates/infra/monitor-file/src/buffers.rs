//! Counter buffer allocation
//!
//! Resolves where each label/value buffer lives in the data region and
//! publishes the offset into the header so readers can find it. Lengths of
//! the gateway buffers are read back from the header rather than taken from
//! the configuration.

use crate::error::{MonitorError, MonitorResult};
use crate::layout::header;
use crate::region::{BufferRegion, IntField};
use crate::writer::MonitorFileWriter;
use tracing::debug;

impl MonitorFileWriter {
    /// Resolve the gateway counter labels buffer
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`Self::add_metadata`], and
    /// `CorruptHeader` if the recorded length does not fit the file.
    pub fn gateway_counter_labels_buffer(&self, file: &mut [u8]) -> MonitorResult<BufferRegion> {
        self.ensure_initialized(file)?;
        let length = header::GATEWAY_LABELS_LENGTH.read_usize(file)?;
        let region = BufferRegion::new(self.layout().end_of_metadata(), length);
        self.publish(file, header::GATEWAY_LABELS_OFFSET, region, header::GATEWAY_LABELS_LENGTH)?;

        debug!(
            "Gateway counter labels at {} ({} bytes)",
            region.offset(),
            region.len()
        );
        Ok(region)
    }

    /// Resolve the gateway counter values buffer, directly after the labels
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before [`Self::add_metadata`], and
    /// `CorruptHeader` if a recorded length does not fit the file.
    pub fn gateway_counter_values_buffer(&self, file: &mut [u8]) -> MonitorResult<BufferRegion> {
        self.ensure_initialized(file)?;
        let labels_length = header::GATEWAY_LABELS_LENGTH.read_usize(file)?;
        let length = header::GATEWAY_VALUES_LENGTH.read_usize(file)?;
        let region = BufferRegion::new(self.layout().end_of_metadata() + labels_length, length);
        self.publish(file, header::GATEWAY_VALUES_OFFSET, region, header::GATEWAY_VALUES_LENGTH)?;

        debug!(
            "Gateway counter values at {} ({} bytes)",
            region.offset(),
            region.len()
        );
        Ok(region)
    }

    /// Resolve the counter labels buffer of service `slot`
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an out-of-range slot, `NotInitialized`
    /// before [`Self::add_metadata`], and `NotRegistered` if the slot has not
    /// been activated.
    pub fn service_counter_labels_buffer(
        &self,
        file: &mut [u8],
        slot: usize,
    ) -> MonitorResult<BufferRegion> {
        let region = self.service_labels_region(file, slot)?;
        let reference = self.layout().service_reference(slot)?;
        self.publish(file, reference.labels_offset, region, reference.labels_length)?;

        debug!(
            "Service slot {} counter labels at {} ({} bytes)",
            slot,
            region.offset(),
            region.len()
        );
        Ok(region)
    }

    /// Resolve the counter values buffer of service `slot`, directly after its labels
    ///
    /// # Errors
    ///
    /// Same conditions as [`Self::service_counter_labels_buffer`].
    pub fn service_counter_values_buffer(
        &self,
        file: &mut [u8],
        slot: usize,
    ) -> MonitorResult<BufferRegion> {
        let labels = self.service_labels_region(file, slot)?;
        let region = BufferRegion::new(labels.end(), self.layout().service_values_length());
        let reference = self.layout().service_reference(slot)?;
        self.publish(file, reference.values_offset, region, reference.values_length)?;

        debug!(
            "Service slot {} counter values at {} ({} bytes)",
            slot,
            region.offset(),
            region.len()
        );
        Ok(region)
    }

    fn service_labels_region(&self, file: &[u8], slot: usize) -> MonitorResult<BufferRegion> {
        self.layout().check_slot(slot)?;
        self.ensure_initialized(file)?;
        if !self.is_slot_active(file, slot)? {
            return Err(MonitorError::NotRegistered { slot });
        }

        self.layout().service_labels_region(
            slot,
            header::GATEWAY_LABELS_LENGTH.read_usize(file)?,
            header::GATEWAY_VALUES_LENGTH.read_usize(file)?,
        )
    }

    /// Record `region.offset()` in `offset_field` once the region is known to fit
    fn publish(
        &self,
        file: &mut [u8],
        offset_field: IntField,
        region: BufferRegion,
        length_field: IntField,
    ) -> MonitorResult<()> {
        if !self.layout().data_region().contains(&region) {
            return Err(MonitorError::CorruptHeader {
                offset: length_field.offset(),
                details: format!(
                    "buffer {}..{} falls outside the data region ending at {}",
                    region.offset(),
                    region.end(),
                    self.layout().total_length()
                ),
            });
        }
        self.ensure_mapping(file)?;
        offset_field.write_usize(file, region.offset())
    }
}
