//! Hands allocated buffers to counter factories
//!
//! Factories borrow the mapped file, so structural writes are finished by
//! the time any counter exists.

use crate::counters::CountersFactory;
use crate::error::{MonitorError, MonitorResult};
use crate::metadata::MetadataView;
use crate::region::BufferRegion;
use crate::writer::MonitorFileWriter;
use tracing::info;

/// Counter factory of one activated service
#[derive(Debug)]
pub struct ServiceEntity<'a> {
    /// Slot the service occupies
    pub slot: usize,
    /// Name recorded in the service descriptor
    pub name: String,
    /// Factory over the slot's buffers
    pub counters: CountersFactory<'a>,
}

/// Every counter factory of a monitor file, usable side by side
#[derive(Debug)]
pub struct MonitoringEntities<'a> {
    /// Gateway-level counters
    pub gateway: CountersFactory<'a>,
    /// Service-level counters, by ascending slot
    pub services: Vec<ServiceEntity<'a>>,
}

impl<'a> MonitoringEntities<'a> {
    /// Factory for `slot`, if that service is active
    pub fn service_mut(&mut self, slot: usize) -> Option<&mut ServiceEntity<'a>> {
        self.services.iter_mut().find(|entity| entity.slot == slot)
    }
}

impl MonitorFileWriter {
    /// Resolve the gateway buffers and return a factory over them
    ///
    /// # Errors
    ///
    /// Returns the allocation errors of the gateway buffers.
    pub fn gateway_entity_factory<'a>(
        &self,
        file: &'a mut [u8],
    ) -> MonitorResult<CountersFactory<'a>> {
        let labels = self.gateway_counter_labels_buffer(file)?;
        let values = self.gateway_counter_values_buffer(file)?;
        self.factory_over(file, labels, values)
    }

    /// Activate `slot` as `name`, resolve its buffers and return a factory over them
    ///
    /// # Errors
    ///
    /// Returns the activation and allocation errors of the slot.
    pub fn service_entity_factory<'a>(
        &mut self,
        file: &'a mut [u8],
        name: &str,
        slot: usize,
    ) -> MonitorResult<CountersFactory<'a>> {
        self.activate_service(file, name, slot)?;
        let labels = self.service_counter_labels_buffer(file, slot)?;
        let values = self.service_counter_values_buffer(file, slot)?;
        self.factory_over(file, labels, values)
    }

    /// Split the data region into the gateway factory and one factory per active service
    ///
    /// The gateway buffers and the buffers of every active slot must already
    /// be allocated; offsets recorded in the header are checked against the
    /// layout before any factory is built.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` before metadata initialization, `NotAllocated`
    /// if a buffer offset was never published, and `CorruptHeader` if a
    /// published buffer does not match the layout.
    pub fn entity_factories<'a>(&self, file: &'a mut [u8]) -> MonitorResult<MonitoringEntities<'a>> {
        self.ensure_mapping(file)?;
        self.ensure_initialized(file)?;
        let layout = *self.layout();

        let view = MetadataView::new(file, &layout);
        let gateway_labels = view.gateway_labels()?;
        let gateway_values = view.gateway_values()?;
        if gateway_labels.offset() == 0 || gateway_values.offset() == 0 {
            return Err(MonitorError::NotAllocated {
                owner: "gateway".to_string(),
            });
        }
        let data_region = layout.data_region();
        check_region(
            data_region,
            gateway_labels,
            BufferRegion::new(layout.end_of_metadata(), gateway_labels.len()),
        )?;
        check_region(
            data_region,
            gateway_values,
            BufferRegion::new(gateway_labels.end(), gateway_values.len()),
        )?;

        let mut slots = Vec::new();
        for slot in 0..layout.max_services() {
            if !self.is_slot_active(file, slot)? {
                continue;
            }
            let entry = view.service(slot)?;
            if entry.labels.offset() == 0 || entry.values.offset() == 0 {
                return Err(MonitorError::NotAllocated {
                    owner: format!("service slot {slot}"),
                });
            }
            let expected =
                layout.service_labels_region(slot, gateway_labels.len(), gateway_values.len())?;
            check_region(data_region, entry.labels, expected)?;
            check_region(
                data_region,
                entry.values,
                BufferRegion::new(expected.end(), layout.service_values_length()),
            )?;
            slots.push((slot, entry.name.to_string()));
        }

        let policy = self.config().name_policy;
        let (_, data) = file.split_at_mut(layout.end_of_metadata());
        let (gateway_block, mut rest) =
            data.split_at_mut(gateway_values.end() - gateway_labels.offset());
        let (labels, values) = gateway_block.split_at_mut(gateway_labels.len());
        let gateway = CountersFactory::new(labels, values, policy)?;

        let mut services = Vec::with_capacity(slots.len());
        let mut consumed = 0;
        for (slot, name) in slots {
            let block = layout.service_block_length();
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(slot * block - consumed);
            let (service_block, tail) = tail.split_at_mut(block);
            rest = tail;
            consumed = (slot + 1) * block;

            let (labels, values) = service_block.split_at_mut(layout.service_labels_length());
            services.push(ServiceEntity {
                slot,
                name,
                counters: CountersFactory::new(labels, values, policy)?,
            });
        }

        info!(
            "Handing out counter factories for gateway '{}' and {} services",
            self.gateway_id(),
            services.len()
        );
        Ok(MonitoringEntities { gateway, services })
    }

    fn factory_over<'a>(
        &self,
        file: &'a mut [u8],
        labels: BufferRegion,
        values: BufferRegion,
    ) -> MonitorResult<CountersFactory<'a>> {
        let pair = BufferRegion::new(labels.offset(), values.end() - labels.offset());
        let (labels, values) = pair.slice_mut(file)?.split_at_mut(labels.len());
        CountersFactory::new(labels, values, self.config().name_policy)
    }
}

fn check_region(
    data: BufferRegion,
    recorded: BufferRegion,
    expected: BufferRegion,
) -> MonitorResult<()> {
    if recorded != expected || !data.contains(&recorded) {
        return Err(MonitorError::CorruptHeader {
            offset: recorded.offset(),
            details: format!(
                "buffer recorded at {}..{}, layout expects {}..{} inside the data region",
                recorded.offset(),
                recorded.end(),
                expected.offset(),
                expected.end()
            ),
        });
    }
    Ok(())
}
