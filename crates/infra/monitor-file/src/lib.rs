//! Memory-mapped gateway monitor file
//!
//! A gateway process publishes its counters through one shared file: a
//! fixed header describing the gateway and its service slots, followed by a
//! labels and a values buffer for the gateway and for every slot. External
//! tools map the same file read-only and decode the header to find the
//! buffers.
//!
//! Typical use:
//!
//! ```no_run
//! use monitor_file::{MappedMonitorFile, MonitorFileWriter};
//! use std::path::Path;
//!
//! # fn main() -> monitor_file::MonitorResult<()> {
//! let mut writer = MonitorFileWriter::new("gateway-1")?;
//! let mut file = MappedMonitorFile::for_writer(Path::new("/dev/shm/gateway-1.mon"), &writer)?;
//! writer.add_metadata(file.as_bytes_mut())?;
//!
//! let mut gateway = writer.gateway_entity_factory(file.as_bytes_mut())?;
//! let sessions = gateway.register("sessions")?;
//! sessions.increment();
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]

pub mod bridge;
pub mod buffers;
pub mod config;
pub mod counters;
pub mod error;
pub mod layout;
pub mod mapping;
pub mod metadata;
pub mod region;
pub mod registrar;
pub mod writer;

pub use bridge::{MonitoringEntities, ServiceEntity};
pub use config::{MonitorConfig, NamePolicy};
pub use counters::{
    COUNTER_VALUE_LENGTH, Counter, CountersFactory, LABEL_RECORD_LENGTH, MAX_LABEL_LENGTH,
};
pub use error::{MonitorError, MonitorResult};
pub use layout::{MAX_SERVICE_COUNT, MonitorLayout, SIZEOF_STRING};
pub use mapping::MappedMonitorFile;
pub use metadata::{MetadataView, ServiceEntry};
pub use region::BufferRegion;
pub use writer::MonitorFileWriter;
