//! Monitor file writer state

use crate::config::{MonitorConfig, NamePolicy};
use crate::error::{MonitorError, MonitorResult};
use crate::layout::{MONITOR_VERSION, MonitorLayout, header};
use crate::region::StrField;
use common::fixed_str;
use tracing::{info, warn};

/// Owns the layout of one monitor file and the structural writes into it
///
/// Construct once per gateway process, attach it to the mapped file with
/// [`MonitorFileWriter::add_metadata`], then allocate the gateway buffers and
/// activate services. Structural operations take the mapped bytes as
/// `&mut [u8]`. The file is authoritative for what has been initialized and
/// activated; the writer keeps a record of its own steps on top of that.
#[derive(Debug)]
pub struct MonitorFileWriter {
    config: MonitorConfig,
    layout: MonitorLayout,
    initialized: bool,
    registered: Vec<bool>,
}

impl MonitorFileWriter {
    /// Writer with the default layout for `gateway_id`
    ///
    /// # Errors
    ///
    /// Propagates layout errors; the default configuration never produces one.
    pub fn new(gateway_id: impl Into<String>) -> MonitorResult<Self> {
        Self::with_config(MonitorConfig::for_gateway(gateway_id))
    }

    /// Writer for an explicit configuration
    ///
    /// # Errors
    ///
    /// Returns the configuration or layout error if `config` is unusable.
    pub fn with_config(config: MonitorConfig) -> MonitorResult<Self> {
        let layout = MonitorLayout::compute(&config)?;

        info!(
            "Monitor file layout for gateway '{}': {} service slots, data at {}, {} bytes total",
            config.gateway_id,
            layout.max_services(),
            layout.end_of_metadata(),
            layout.total_length()
        );

        Ok(Self {
            registered: vec![false; layout.max_services()],
            config,
            layout,
            initialized: false,
        })
    }

    /// Length the mapped file must have before [`Self::add_metadata`]
    #[must_use]
    pub const fn total_file_length(&self) -> usize {
        self.layout.total_length()
    }

    /// Derived layout
    #[must_use]
    pub const fn layout(&self) -> &MonitorLayout {
        &self.layout
    }

    /// Configuration the layout was derived from
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Gateway identity as configured
    #[must_use]
    pub fn gateway_id(&self) -> &str {
        &self.config.gateway_id
    }

    /// Whether the metadata region has been written
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether this writer activated `slot`
    #[must_use]
    pub fn is_registered(&self, slot: usize) -> bool {
        self.registered.get(slot).copied().unwrap_or(false)
    }

    /// Slots this writer activated, in ascending order
    pub fn registered_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.registered
            .iter()
            .enumerate()
            .filter_map(|(slot, active)| active.then_some(slot))
    }

    /// Number of slots this writer activated
    #[must_use]
    pub fn active_services(&self) -> usize {
        self.registered_slots().count()
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn mark_registered(&mut self, slot: usize) {
        if let Some(active) = self.registered.get_mut(slot) {
            *active = true;
        }
    }

    /// Both this writer and `file` must have gone through [`Self::add_metadata`]
    pub(crate) fn ensure_initialized(&self, file: &[u8]) -> MonitorResult<()> {
        if !self.initialized || header::VERSION.read(file)? != MONITOR_VERSION {
            return Err(MonitorError::NotInitialized);
        }
        Ok(())
    }

    /// Whether `slot` is active in `file`
    ///
    /// Activation seeds the slot's labels length, which validation keeps
    /// non-zero, so a zero length means the slot was never activated.
    pub(crate) fn is_slot_active(&self, file: &[u8], slot: usize) -> MonitorResult<bool> {
        let reference = self.layout.service_reference(slot)?;
        Ok(reference.labels_length.read(file)? != 0)
    }

    pub(crate) fn ensure_mapping(&self, file: &[u8]) -> MonitorResult<()> {
        if file.len() < self.layout.total_length() {
            return Err(MonitorError::MappingTooSmall {
                required: self.layout.total_length(),
                actual: file.len(),
            });
        }
        Ok(())
    }

    /// Apply the name policy before anything is written
    pub(crate) fn check_name(&self, field: StrField, name: &str) -> MonitorResult<()> {
        check_name(self.config.name_policy, field.width(), name)
    }

    /// Write `name` into `field`, logging when it had to be cut
    pub(crate) fn write_name(
        &self,
        file: &mut [u8],
        field: StrField,
        name: &str,
        what: &str,
    ) -> MonitorResult<()> {
        self.check_name(field, name)?;
        let encoded = field.write(file, name)?;
        if encoded.truncated {
            warn!(
                "Truncated {} '{}' from {} to {} bytes",
                what,
                name,
                name.len(),
                encoded.written
            );
        }
        Ok(())
    }
}

/// Fail with `NameTooLong` if `policy` forbids cutting `name` into a `width`-byte field
pub(crate) fn check_name(policy: NamePolicy, width: usize, name: &str) -> MonitorResult<()> {
    if policy == NamePolicy::Reject && !fixed_str::fits(name, width) {
        return Err(MonitorError::NameTooLong {
            name: name.to_string(),
            length: name.len(),
            limit: fixed_str::capacity(width),
        });
    }
    Ok(())
}
