/// Public entry points: initialize once, then call `handle` periodically
use crate::config::OtaConfig;
use crate::coordinator::{AttemptOutcome, UpdateCoordinator};
use crate::error::InitError;
use crate::lock::UpdateLock;
use crate::partition::{PartitionTable, SystemControl};
use crate::transport::HttpTransport;
use crate::version::{VersionOracle, VersionString};

/// Owns the update lock and the platform collaborators.
///
/// All entry points take `&self`; share one `Updater` (e.g. in an `Arc`)
/// between a periodic check and a manual trigger and the lock keeps their
/// attempts from overlapping.
pub struct Updater<T, P, S> {
    config: OtaConfig,
    current: VersionString,
    lock: UpdateLock,
    transport: T,
    platform: P,
    system: S,
}

impl<T, P, S> Updater<T, P, S>
where
    T: HttpTransport,
    P: PartitionTable,
    S: SystemControl,
{
    /// Set up the updater. A stored configuration that cannot be used
    /// disables update checks rather than failing, so the device still
    /// boots. Only a running version that does not fit is an error.
    pub fn initialize(
        mut config: OtaConfig,
        current_version: &str,
        transport: T,
        platform: P,
        system: S,
    ) -> Result<Self, InitError> {
        let current = VersionString::new(current_version)?;
        log::info!("ota: software version {}", current);
        if let Err(e) = config.validate() {
            log::error!("ota: {}, update checks disabled", e);
            config.disable();
        } else if !config.is_enabled() {
            log::info!("ota: no server url configured, update checks disabled");
        }

        Ok(Self {
            config,
            current,
            lock: UpdateLock::new(),
            transport,
            platform,
            system,
        })
    }

    /// Run one check-and-maybe-update cycle. Returns true only if a new
    /// image was committed; on hardware the device has restarted by then.
    pub fn handle(&self) -> bool {
        let Some(latest) = self.oracle().check_update(&self.current) else {
            return false;
        };
        log::info!("ota: new firmware available: {} (running {})", latest, self.current);

        let mut coordinator = UpdateCoordinator::new(
            &self.config,
            &self.lock,
            &self.transport,
            &self.platform,
            &self.system,
        );
        match coordinator.run(&latest) {
            Ok(AttemptOutcome::Applied) => {
                log::info!("ota: firmware updated properly");
                true
            }
            Ok(AttemptOutcome::Busy) | Err(_) => false,
        }
    }

    pub fn current_version(&self) -> &VersionString {
        &self.current
    }

    /// Write a newer published version into `buffer`, NUL terminated.
    /// At most `buffer.len() - 1` bytes of version are kept.
    pub fn check_for_update(&self, buffer: &mut [u8]) -> bool {
        let Some(capacity) = buffer.len().checked_sub(1) else {
            return false;
        };
        match self.oracle().check_into(&self.current, &mut buffer[..capacity]) {
            Some(len) => {
                buffer[len] = 0;
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }

    pub fn config(&self) -> &OtaConfig {
        &self.config
    }

    fn oracle(&self) -> VersionOracle<'_, T> {
        VersionOracle::new(&self.config, &self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{count, FakePlatform, RecordingSystem, ScriptedTransport, OTA_1};

    type TestUpdater = Updater<ScriptedTransport, FakePlatform, RecordingSystem>;

    fn updater(base_url: &str, transport: ScriptedTransport, platform: FakePlatform) -> TestUpdater {
        let config = OtaConfig {
            base_url: base_url.to_string(),
            firmware_template: "dashboard_{version}.bin".to_string(),
            ..Default::default()
        };
        Updater::initialize(config, "2.0.0", transport, platform, RecordingSystem::default()).unwrap()
    }

    #[test]
    fn test_disabled_makes_no_network_calls() {
        let updater = updater("", ScriptedTransport::new().latest(200, b"2.0.1\n"), FakePlatform::dual_slot());

        let mut buffer = [0u8; 12];
        assert!(!updater.check_for_update(&mut buffer));
        assert!(!updater.handle());
        assert_eq!(count(&updater.transport.fetches), 0);
        assert_eq!(count(&updater.transport.streams), 0);
    }

    #[test]
    fn test_check_fills_buffer_with_new_version() {
        let updater = updater(
            "http://updates.local",
            ScriptedTransport::new().latest(200, b"2.0.1\n"),
            FakePlatform::dual_slot(),
        );

        let mut buffer = [0xFFu8; 12];
        assert!(updater.check_for_update(&mut buffer));
        assert_eq!(&buffer[..6], b"2.0.1\0");
        assert_eq!(count(&updater.transport.streams), 0);
    }

    #[test]
    fn test_check_respects_buffer_capacity() {
        let updater = updater(
            "http://updates.local",
            ScriptedTransport::new().latest(200, b"2.0.1-rc3"),
            FakePlatform::dual_slot(),
        );

        let mut buffer = [0xFFu8; 6];
        assert!(updater.check_for_update(&mut buffer));
        assert_eq!(&buffer, b"2.0.1\0");
        assert!(!updater.check_for_update(&mut []));
    }

    #[test]
    fn test_check_same_version_is_false() {
        let updater = updater(
            "http://updates.local",
            ScriptedTransport::new().latest(200, b"2.0.0\n"),
            FakePlatform::dual_slot(),
        );
        assert!(!updater.check_for_update(&mut [0u8; 12]));
        assert!(!updater.handle());
        assert_eq!(count(&updater.transport.streams), 0);
    }

    #[test]
    fn test_handle_applies_update() {
        let updater = updater(
            "http://updates.local",
            ScriptedTransport::new().latest(200, b"2.0.1\n").image(10, 1024),
            FakePlatform::dual_slot(),
        );

        assert!(updater.handle());
        assert_eq!(count(&updater.system.restarts), 1);
        assert_eq!(count(&updater.platform.log.commits), 1);
        assert_eq!(updater.platform.log.boot_selected(), Some(OTA_1));
        assert!(updater.is_busy());
        assert_eq!(
            updater.transport.urls(),
            vec![
                "http://updates.local/latest".to_string(),
                "http://updates.local/dashboard_2.0.1.bin".to_string(),
            ]
        );
    }

    #[test]
    fn test_handle_after_failed_download_can_retry() {
        let updater = updater(
            "http://updates.local",
            ScriptedTransport::new().latest(200, b"2.0.1\n").image(10, 1024).fail_after(3),
            FakePlatform::dual_slot(),
        );

        assert!(!updater.handle());
        assert!(!updater.is_busy());
        assert!(!updater.handle());
        assert_eq!(count(&updater.transport.streams), 2);
        assert_eq!(count(&updater.platform.log.commits), 0);
        assert_eq!(count(&updater.system.restarts), 0);
    }

    #[test]
    fn test_handle_while_busy_does_nothing() {
        let updater = updater(
            "http://updates.local",
            ScriptedTransport::new().latest(200, b"2.0.1\n").image(10, 1024),
            FakePlatform::dual_slot(),
        );
        let _attempt = updater.lock.try_acquire().unwrap();

        assert!(!updater.handle());
        assert_eq!(count(&updater.transport.fetches), 1);
        assert_eq!(count(&updater.transport.streams), 0);
    }

    #[test]
    fn test_bad_template_disables_checks() {
        let config = OtaConfig {
            base_url: "http://updates.local".to_string(),
            firmware_template: "fw.bin".to_string(),
            ..Default::default()
        };
        let updater = Updater::initialize(
            config,
            "2.0.0",
            ScriptedTransport::new().latest(200, b"2.0.1\n").image(10, 1024),
            FakePlatform::dual_slot(),
            RecordingSystem::default(),
        )
        .unwrap();

        assert!(!updater.config().is_enabled());
        assert!(!updater.handle());
        assert!(!updater.check_for_update(&mut [0u8; 12]));
        assert_eq!(count(&updater.transport.fetches), 0);
        assert_eq!(count(&updater.transport.streams), 0);
        assert_eq!(count(&updater.platform.log.sessions), 0);
    }

    #[test]
    fn test_initialize_rejects_overlong_running_version() {
        let result = Updater::initialize(
            OtaConfig::default(),
            "2.0.0-beta.1234",
            ScriptedTransport::new(),
            FakePlatform::dual_slot(),
            RecordingSystem::default(),
        );
        assert!(matches!(result, Err(InitError::VersionTooLong { len: 15, .. })));
    }

    #[test]
    fn test_current_version_is_the_running_one() {
        let updater = updater("", ScriptedTransport::new(), FakePlatform::dual_slot());
        assert_eq!(updater.current_version().as_bytes(), b"2.0.0");
    }
}
