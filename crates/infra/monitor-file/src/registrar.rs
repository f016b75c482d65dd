//! Service slot activation

use crate::error::{MonitorError, MonitorResult};
use crate::layout::header;
use crate::writer::MonitorFileWriter;
use tracing::debug;

impl MonitorFileWriter {
    /// Activate service `slot` under `name`
    ///
    /// Writes the descriptor, bumps the service count and seeds the slot's
    /// reference entry with zero offsets and the fixed buffer lengths, so a
    /// reader can size the buffers before they are allocated. Every check
    /// runs before the first byte is written.
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` for an out-of-range slot, `NotInitialized`
    /// before [`Self::add_metadata`], `AlreadyRegistered` for a slot that is
    /// already active, and `NameTooLong` under the reject policy.
    pub fn activate_service(
        &mut self,
        file: &mut [u8],
        name: &str,
        slot: usize,
    ) -> MonitorResult<()> {
        let layout = *self.layout();
        let name_field = layout.service_name_field(slot)?;
        self.ensure_initialized(file)?;
        if self.is_slot_active(file, slot)? {
            return Err(MonitorError::AlreadyRegistered { slot });
        }
        self.check_name(name_field, name)?;
        self.ensure_mapping(file)?;

        let count = header::SERVICE_COUNT.read_usize(file)?;
        if count >= layout.max_services() {
            return Err(MonitorError::CorruptHeader {
                offset: header::SERVICE_COUNT.offset(),
                details: format!(
                    "service count {count} already at capacity {}",
                    layout.max_services()
                ),
            });
        }

        self.write_name(file, name_field, name, "service name")?;
        layout.service_location_field(slot)?.write(file, 0)?;
        header::SERVICE_COUNT.write_usize(file, count + 1)?;

        let reference = layout.service_reference(slot)?;
        reference.labels_offset.write(file, 0)?;
        reference
            .labels_length
            .write_usize(file, layout.service_labels_length())?;
        reference.values_offset.write(file, 0)?;
        reference
            .values_length
            .write_usize(file, layout.service_values_length())?;

        self.mark_registered(slot);
        debug!(
            "Activated service '{}' in slot {} ({} active)",
            name,
            slot,
            count + 1
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, NamePolicy};
    use crate::layout::SIZEOF_STRING;
    use crate::metadata::MetadataView;
    use crate::region::BufferRegion;

    fn initialized(policy: NamePolicy) -> (MonitorFileWriter, Vec<u8>) {
        let mut writer = MonitorFileWriter::with_config(MonitorConfig {
            max_services: 4,
            gateway_labels_length: 2048,
            gateway_values_length: 64,
            service_labels_length: 2048,
            service_values_length: 64,
            name_policy: policy,
            ..MonitorConfig::for_gateway("gw")
        })
        .unwrap();
        let mut file = vec![0u8; writer.total_file_length()];
        writer.add_metadata(&mut file).unwrap();
        (writer, file)
    }

    #[test]
    fn test_activation_writes_descriptor_and_reference() {
        let (mut writer, mut file) = initialized(NamePolicy::Truncate);
        writer.activate_service(&mut file, "echo", 1).unwrap();

        let view = MetadataView::new(&file, writer.layout());
        let entry = view.service(1).unwrap();
        assert_eq!(entry.name, "echo");
        assert_eq!(entry.labels, BufferRegion::new(0, 2048));
        assert_eq!(entry.values, BufferRegion::new(0, 64));
        assert_eq!(view.service_count().unwrap(), 1);
        assert!(writer.is_registered(1));

        // Neighbouring slots are untouched
        assert_eq!(view.service(0).unwrap().name, "");
        assert_eq!(view.service(2).unwrap().labels, BufferRegion::new(0, 0));
    }

    #[test]
    fn test_count_tracks_activations() {
        let (mut writer, mut file) = initialized(NamePolicy::Truncate);
        for (slot, name) in ["a", "b", "c"].iter().enumerate() {
            writer.activate_service(&mut file, name, slot).unwrap();
        }

        let view = MetadataView::new(&file, writer.layout());
        assert_eq!(view.service_count().unwrap(), 3);
        assert_eq!(writer.active_services(), 3);
        assert_eq!(writer.registered_slots().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_double_activation_fails_without_counting() {
        let (mut writer, mut file) = initialized(NamePolicy::Truncate);
        writer.activate_service(&mut file, "echo", 0).unwrap();

        assert!(matches!(
            writer.activate_service(&mut file, "echo-again", 0),
            Err(MonitorError::AlreadyRegistered { slot: 0 })
        ));

        let view = MetadataView::new(&file, writer.layout());
        assert_eq!(view.service_count().unwrap(), 1);
        assert_eq!(view.service(0).unwrap().name, "echo");
    }

    #[test]
    fn test_activation_out_of_range() {
        let (mut writer, mut file) = initialized(NamePolicy::Truncate);
        let before = file.clone();

        assert!(matches!(
            writer.activate_service(&mut file, "overflow", 4),
            Err(MonitorError::CapacityExceeded { requested: 4, capacity: 4 })
        ));
        assert_eq!(file, before);
    }

    #[test]
    fn test_activation_before_metadata_fails() {
        let mut writer = MonitorFileWriter::new("gw").unwrap();
        let mut file = vec![0u8; 4096];
        assert!(matches!(
            writer.activate_service(&mut file, "echo", 0),
            Err(MonitorError::NotInitialized)
        ));
    }

    #[test]
    fn test_long_service_name() {
        let long_name = "s".repeat(SIZEOF_STRING + 10);

        let (mut writer, mut file) = initialized(NamePolicy::Truncate);
        writer.activate_service(&mut file, &long_name, 0).unwrap();
        let view = MetadataView::new(&file, writer.layout());
        assert_eq!(view.service(0).unwrap().name.len(), SIZEOF_STRING - 4);

        let (mut writer, mut file) = initialized(NamePolicy::Reject);
        assert!(matches!(
            writer.activate_service(&mut file, &long_name, 0),
            Err(MonitorError::NameTooLong { .. })
        ));
        assert!(!writer.is_registered(0));
        let view = MetadataView::new(&file, writer.layout());
        assert_eq!(view.service_count().unwrap(), 0);
    }

    #[test]
    fn test_slot_activated_by_another_writer_is_rejected() {
        let (mut first, mut file) = initialized(NamePolicy::Truncate);
        first.activate_service(&mut file, "echo", 0).unwrap();

        let (mut second, _) = initialized(NamePolicy::Truncate);
        assert!(matches!(
            second.activate_service(&mut file, "echo", 0),
            Err(MonitorError::AlreadyRegistered { slot: 0 })
        ));
        assert!(!second.is_registered(0));

        // The file, not the writer, decides which slots can be allocated
        let labels = second.service_counter_labels_buffer(&mut file, 0).unwrap();
        let view = MetadataView::new(&file, second.layout());
        assert_eq!(view.service_count().unwrap(), 1);
        assert_eq!(view.service(0).unwrap().name, "echo");
        assert_eq!(view.service(0).unwrap().labels, labels);
    }

    #[test]
    fn test_activation_on_uninitialized_file_fails() {
        let (mut writer, _) = initialized(NamePolicy::Truncate);
        let mut other = vec![0u8; writer.total_file_length()];

        assert!(matches!(
            writer.activate_service(&mut other, "echo", 0),
            Err(MonitorError::NotInitialized)
        ));
        assert!(other.iter().all(|b| *b == 0));
    }
}
