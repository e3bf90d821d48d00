/// One update attempt: lock, select, flash, finalize, commit or abort
use crate::config::OtaConfig;
use crate::error::UpdateError;
use crate::lock::UpdateLock;
use crate::partition::{FlashSession, PartitionSelector, PartitionTable, SystemControl};
use crate::transport::HttpTransport;
use crate::version::VersionString;
use crate::writer::StreamingFlashWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Locked,
    PartitionSelected,
    Flashing,
    Finalizing,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Another attempt holds the lock; nothing was done.
    Busy,
    /// The new image is committed and the restart was triggered.
    Applied,
}

pub struct UpdateCoordinator<'a, T, P, S> {
    config: &'a OtaConfig,
    lock: &'a UpdateLock,
    transport: &'a T,
    platform: &'a P,
    system: &'a S,
    state: AttemptState,
}

impl<'a, T, P, S> UpdateCoordinator<'a, T, P, S>
where
    T: HttpTransport,
    P: PartitionTable,
    S: SystemControl,
{
    pub fn new(config: &'a OtaConfig, lock: &'a UpdateLock, transport: &'a T, platform: &'a P, system: &'a S) -> Self {
        Self {
            config,
            lock,
            transport,
            platform,
            system,
            state: AttemptState::Idle,
        }
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    fn enter(&mut self, next: AttemptState) {
        log::debug!("ota: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Download `version` and, if the platform accepts it, boot into it.
    ///
    /// The lock is released on every path that returns, except after a
    /// successful commit where the restart takes over.
    pub fn run(&mut self, version: &VersionString) -> Result<AttemptOutcome, UpdateError> {
        let lock = self.lock;
        let Some(guard) = lock.try_acquire() else {
            log::error!("ota: unable to acquire firmware update lock, update already in progress");
            return Ok(AttemptOutcome::Busy);
        };
        self.enter(AttemptState::Locked);

        match self.flash(version) {
            Ok(()) => {
                self.enter(AttemptState::Committed);
                log::info!("ota: prepare to restart system");
                guard.hold_until_restart();
                self.system.restart();
                Ok(AttemptOutcome::Applied)
            }
            Err(e) => {
                self.enter(AttemptState::Aborted);
                log::error!("ota: update to {} aborted: {}", version, e);
                drop(guard);
                Err(e)
            }
        }
    }

    fn flash(&mut self, version: &VersionString) -> Result<(), UpdateError> {
        let url = self.config.firmware_url(&version.url_component());
        log::info!("ota: firmware blob that will be downloaded: {}", url);

        let target = PartitionSelector::new(self.platform).select_target()?;
        self.enter(AttemptState::PartitionSelected);

        let session = self.platform.begin_session(&target).map_err(UpdateError::SessionBegin)?;
        log::info!("ota: flash session opened");
        self.enter(AttemptState::Flashing);

        // The image response status is not checked: it cannot gate a
        // streamed write. Closing the session validates the image instead.
        let mut writer = StreamingFlashWriter::new(session);
        let streamed = self
            .transport
            .stream(&url, self.config.download_timeout(), &mut writer);
        let (session, summary) = writer.finish();
        log::info!(
            "ota: download finished, {} bytes received in {} chunks, {} written",
            summary.bytes_received,
            summary.chunks,
            summary.bytes_written
        );

        match streamed {
            Ok(status) => log::debug!("ota: image response status {}", status),
            Err(e) => {
                session.abort();
                return Err(e.into());
            }
        }
        self.enter(AttemptState::Finalizing);

        if summary.failed {
            session.abort();
            return Err(UpdateError::FlashWrite {
                written: summary.bytes_written,
                received: summary.bytes_received,
            });
        }
        session.end().map_err(UpdateError::ImageRejected)?;
        log::info!("ota: image accepted, sha256 {}", summary.digest_hex());

        self.platform
            .set_boot_partition(&target)
            .map_err(UpdateError::Commit)?;
        log::info!(
            "ota: boot partition set to offset 0x{:08x}",
            target.info().address
        );
        Ok(())
    }
}
