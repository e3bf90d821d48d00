/// Flash partition collaborator and update target selection
use core::fmt;

use crate::error::{PartitionError, PlatformError};

/// Partition metadata as reported by the platform's partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionInfo {
    pub kind: u32,
    pub subtype: u32,
    pub address: u32,
}

/// A platform partition handle with its metadata. Only the platform creates
/// these; the updater selects among them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition<H> {
    handle: H,
    info: PartitionInfo,
}

impl<H: Copy> Partition<H> {
    pub fn new(handle: H, info: PartitionInfo) -> Self {
        Self { handle, info }
    }

    pub fn handle(&self) -> H {
        self.handle
    }

    pub fn info(&self) -> &PartitionInfo {
        &self.info
    }
}

/// An open image write into one partition.
pub trait FlashSession {
    fn write(&mut self, data: &[u8]) -> Result<(), PlatformError>;

    /// Close the session. The platform validates the written image here.
    fn end(self) -> Result<(), PlatformError>;

    /// Close the session and discard what was written.
    fn abort(self);
}

pub trait PartitionTable {
    type Handle: Copy + PartialEq + fmt::Debug;
    type Session: FlashSession;

    /// `None` on a device without an OTA partition layout.
    fn boot_partition(&self) -> Option<Partition<Self::Handle>>;
    fn running_partition(&self) -> Option<Partition<Self::Handle>>;
    fn next_update_partition(&self) -> Option<Partition<Self::Handle>>;

    fn begin_session(&self, target: &Partition<Self::Handle>) -> Result<Self::Session, PlatformError>;

    /// Persist `target` as the partition to boot next.
    fn set_boot_partition(&self, target: &Partition<Self::Handle>) -> Result<(), PlatformError>;
}

pub trait SystemControl {
    /// Restart the device. On hardware this does not return.
    fn restart(&self);
}

pub struct PartitionSelector<'a, P> {
    table: &'a P,
}

impl<'a, P: PartitionTable> PartitionSelector<'a, P> {
    pub fn new(table: &'a P) -> Self {
        Self { table }
    }

    /// The partition the next image is written to.
    pub fn select_target(&self) -> Result<Partition<P::Handle>, PartitionError> {
        let Some(configured) = self.table.boot_partition() else {
            log::error!("ota: trying to update a non OTA partitioned system, aborting update");
            return Err(PartitionError::NotOtaCapable);
        };

        let running = self.table.running_partition();
        match running {
            Some(running) => {
                if running.handle() != configured.handle() {
                    log::warn!(
                        "ota: configured boot partition at offset 0x{:08x}, but running from offset 0x{:08x}",
                        configured.info().address,
                        running.info().address
                    );
                    log::warn!("ota: (this can happen if the OTA boot data or preferred boot image became corrupted)");
                }
                let info = running.info();
                log::info!(
                    "ota: running partition type {} subtype {} (offset 0x{:08x})",
                    info.kind,
                    info.subtype,
                    info.address
                );
            }
            None => log::warn!("ota: running partition unknown"),
        }

        let Some(target) = self.table.next_update_partition() else {
            log::error!("ota: no update partition available, aborting update");
            return Err(PartitionError::NoTarget);
        };
        if running.is_some_and(|running| running.handle() == target.handle()) {
            log::error!("ota: update partition is the running partition, aborting update");
            return Err(PartitionError::NoTarget);
        }

        log::info!(
            "ota: writing to partition subtype {} at offset 0x{:08x}",
            target.info().subtype,
            target.info().address
        );
        Ok(target)
    }
}
