// ESP-IDF backends for the update core
//
// Update flow (see ota_core::Updater):
// 1. GET {server}/latest and compare with the running version
// 2. Stream {server}/<preamble>_<version>.bin into the next OTA partition
// 3. Let esp_ota_end validate the image
// 4. Set boot partition
// 5. Restart

pub mod platform;
pub mod system;
pub mod transport;

pub use platform::EspPartitionTable;
pub use system::EspSystem;
pub use transport::EspHttpTransport;

pub type DeviceUpdater = ota_core::Updater<EspHttpTransport, EspPartitionTable, EspSystem>;
