// Centralized version information

// Running firmware version, compared against the server's `latest`.
// Set by build.rs from FIRMWARE_VERSION, falling back to the Cargo version.
pub const FIRMWARE_VERSION: &str = env!("FIRMWARE_VERSION");

// Checked at build time so the updater can never refuse to start
const _: () = assert!(
    FIRMWARE_VERSION.len() <= ota_core::VERSION_MAX_LEN,
    "FIRMWARE_VERSION does not fit the updater's version buffer"
);

// Cargo package version from Cargo.toml
pub const CARGO_VERSION: &str = env!("CARGO_PKG_VERSION");

// Version info string for logging
pub fn version_info() -> String {
    format!("Firmware: {}, Cargo: {}", FIRMWARE_VERSION, CARGO_VERSION)
}
