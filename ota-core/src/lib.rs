//! OTA Core - Hardware-independent firmware update logic
//!
//! Version discovery, the single-attempt update gate, partition selection,
//! the streaming flash writer and the commit/restart decision. Platform
//! services (HTTP, flash partitions, restart) sit behind the traits in
//! [`transport`] and [`partition`], so everything here runs on the host.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod partition;
pub mod transport;
pub mod updater;
pub mod version;
pub mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use config::OtaConfig;
pub use coordinator::{AttemptOutcome, AttemptState, UpdateCoordinator};
pub use error::{ConfigError, InitError, PartitionError, PlatformError, TransportError, UpdateError};
pub use lock::{UpdateGuard, UpdateLock};
pub use partition::{FlashSession, Partition, PartitionInfo, PartitionSelector, PartitionTable, SystemControl};
pub use transport::{ChunkSink, Deadline, Fetched, HttpTransport};
pub use updater::Updater;
pub use version::{VersionOracle, VersionString, VERSION_MAX_LEN};
pub use writer::{DownloadSummary, StreamingFlashWriter};
