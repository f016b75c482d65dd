//! Monitor file configuration

use crate::error::{MonitorError, MonitorResult};
use crate::layout::{
    GATEWAY_COUNTER_LABELS_BUFFER_LENGTH, GATEWAY_COUNTER_VALUES_BUFFER_LENGTH, MAX_SERVICE_COUNT,
    SERVICE_COUNT_LIMIT, SERVICE_COUNTER_LABELS_BUFFER_LENGTH,
    SERVICE_COUNTER_VALUES_BUFFER_LENGTH,
};
use common::{CACHE_LINE_LENGTH, is_aligned};
use serde::{Deserialize, Serialize};

/// What to do with a name that does not fit its fixed-width field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePolicy {
    /// Cut the name on a character boundary and log a warning
    #[default]
    Truncate,
    /// Fail with `MonitorError::NameTooLong`
    Reject,
}

/// Parameters fixing the shape of a monitor file
///
/// Every field has a default, so a partial document deserializes into a
/// complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Gateway identity written into the header
    pub gateway_id: String,
    /// Number of service slots pre-allocated in the file
    pub max_services: usize,
    /// Gateway counter labels buffer length in bytes
    pub gateway_labels_length: usize,
    /// Gateway counter values buffer length in bytes
    pub gateway_values_length: usize,
    /// Per-service counter labels buffer length in bytes
    pub service_labels_length: usize,
    /// Per-service counter values buffer length in bytes
    pub service_values_length: usize,
    /// Handling of over-long gateway, service and counter names
    pub name_policy: NamePolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            gateway_id: String::new(),
            max_services: MAX_SERVICE_COUNT,
            gateway_labels_length: GATEWAY_COUNTER_LABELS_BUFFER_LENGTH,
            gateway_values_length: GATEWAY_COUNTER_VALUES_BUFFER_LENGTH,
            service_labels_length: SERVICE_COUNTER_LABELS_BUFFER_LENGTH,
            service_values_length: SERVICE_COUNTER_VALUES_BUFFER_LENGTH,
            name_policy: NamePolicy::default(),
        }
    }
}

impl MonitorConfig {
    /// Default configuration for the given gateway
    #[must_use]
    pub fn for_gateway(gateway_id: impl Into<String>) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            ..Self::default()
        }
    }

    /// Check the configuration before any layout is derived from it
    ///
    /// # Errors
    ///
    /// Returns `CapacityExceeded` if `max_services` is above the hard limit and
    /// `InvalidConfig` if a buffer length is zero or not a whole number of
    /// cache lines.
    pub fn validate(&self) -> MonitorResult<()> {
        if self.max_services > SERVICE_COUNT_LIMIT {
            return Err(MonitorError::CapacityExceeded {
                requested: self.max_services,
                capacity: SERVICE_COUNT_LIMIT,
            });
        }

        let lengths = [
            ("gateway_labels_length", self.gateway_labels_length),
            ("gateway_values_length", self.gateway_values_length),
            ("service_labels_length", self.service_labels_length),
            ("service_values_length", self.service_values_length),
        ];
        for (name, length) in lengths {
            if length == 0 || !is_aligned(length, CACHE_LINE_LENGTH) {
                return Err(MonitorError::InvalidConfig {
                    message: format!(
                        "{name} must be a non-zero multiple of {CACHE_LINE_LENGTH}, got {length}"
                    ),
                });
            }
        }

        Ok(())
    }
}
