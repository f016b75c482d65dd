//! Property tests for layout arithmetic

use monitor_file::layout::{OFFSETS_PER_SERVICE, header};
use monitor_file::{MonitorConfig, MonitorError, MonitorLayout};
use proptest::prelude::*;

const CACHE_LINE: usize = 64;

fn config(max_services: usize, lines: [usize; 4]) -> MonitorConfig {
    MonitorConfig {
        max_services,
        gateway_labels_length: lines[0] * CACHE_LINE,
        gateway_values_length: lines[1] * CACHE_LINE,
        service_labels_length: lines[2] * CACHE_LINE,
        service_values_length: lines[3] * CACHE_LINE,
        ..MonitorConfig::for_gateway("prop-gw")
    }
}

proptest! {
    #[test]
    fn metadata_sections_never_collide(max_services in 0usize..=1024) {
        let end = MonitorLayout::end_of_metadata_for(max_services);
        let descriptors_end =
            header::SERVICE_DESCRIPTORS + max_services * header::SERVICE_DESCRIPTOR_LENGTH;
        let references = end - max_services * OFFSETS_PER_SERVICE * 4;

        prop_assert_eq!(end % CACHE_LINE, 0);
        prop_assert!(end - MonitorLayout::metadata_length_for(max_services) < CACHE_LINE + 4);
        prop_assert!(descriptors_end <= references);
    }

    #[test]
    fn service_blocks_tile_the_data_region(
        max_services in 1usize..=16,
        lines in prop::array::uniform4(1usize..=64),
    ) {
        let layout = MonitorLayout::compute(&config(max_services, lines)).unwrap();
        let gateway_labels = layout.gateway_labels_length();
        let gateway_values = layout.gateway_values_length();

        let mut expected = layout.end_of_metadata() + gateway_labels + gateway_values;
        for slot in 0..max_services {
            let labels = layout.service_labels_region(slot, gateway_labels, gateway_values).unwrap();
            prop_assert_eq!(labels.offset(), expected);
            prop_assert_eq!(labels.offset() % CACHE_LINE, 0);
            expected = labels.end() + layout.service_values_length();
        }
        prop_assert_eq!(expected, layout.total_length());
    }

    #[test]
    fn oversized_layouts_are_rejected(lines in 1usize..=1024) {
        let length = lines * 1024 * 1024;
        let result = MonitorLayout::compute(&MonitorConfig {
            max_services: 1024,
            service_labels_length: length,
            service_values_length: length,
            ..MonitorConfig::for_gateway("prop-gw")
        });
        prop_assert!(
            matches!(result, Err(MonitorError::LayoutOverflow { .. })),
            "expected LayoutOverflow, got {:?}",
            result
        );
    }

    #[test]
    fn unaligned_lengths_are_rejected(extra in 1usize..CACHE_LINE) {
        let mut config = config(2, [32, 1, 32, 1]);
        config.service_values_length += extra;
        prop_assert!(
            matches!(
                MonitorLayout::compute(&config),
                Err(MonitorError::InvalidConfig { .. })
            ),
            "length {} accepted",
            config.service_values_length
        );
    }
}
