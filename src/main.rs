use anyhow::Result;
use esp_idf_hal::prelude::Peripherals;
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
use esp_idf_sys as _; // Binstart
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::info;

// Generate ESP-IDF app descriptor
// Note: This macro generates warnings about cfg conditions but they're harmless
#[allow(unexpected_cfgs)]
mod app_desc {
    esp_idf_sys::esp_app_desc!();
}

mod config;
mod logging;
mod network;
mod ota;
mod system;
mod version;

use crate::network::wifi::WifiManager;
use crate::ota::{DeviceUpdater, EspHttpTransport, EspPartitionTable, EspSystem};
use crate::system::button::UpdateButton;

const BUTTON_POLL_INTERVAL: Duration = Duration::from_millis(20);
const LINK_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const CHECK_THREAD_STACK: usize = 16 * 1024;

fn main() -> Result<()> {
    // Initialize ESP-IDF
    esp_idf_svc::sys::link_patches();

    // Initialize our logger with colors and timestamps
    logging::init_logger().map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    info!("ESP32 OTA updater - {}", version::version_info());
    info!("Free heap: {} bytes", unsafe {
        esp_idf_sys::esp_get_free_heap_size()
    });

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let config = config::load_or_default(nvs.clone())?;

    let mut wifi = WifiManager::new(
        peripherals.modem,
        sys_loop,
        nvs,
        config.wifi_ssid.clone(),
        config.wifi_password.clone(),
    )?;
    if let Err(e) = wifi.connect() {
        // Update checks fail soft until the link is back
        log::error!("WiFi connect failed: {:?}, will retry", e);
    }

    let updater = Arc::new(DeviceUpdater::initialize(
        config.ota.clone(),
        version::FIRMWARE_VERSION,
        EspHttpTransport::default(),
        EspPartitionTable,
        EspSystem,
    )?);

    // Periodic check
    let interval = Duration::from_secs(config.check_interval_mins.max(1) as u64 * 60);
    info!("Checking for updates every {} min", interval.as_secs() / 60);
    let periodic = Arc::clone(&updater);
    thread::Builder::new()
        .name("ota-check".to_string())
        .stack_size(CHECK_THREAD_STACK)
        .spawn(move || loop {
            periodic.handle();
            thread::sleep(interval);
        })?;

    // Manual trigger: BOOT button
    let mut button = UpdateButton::new(peripherals.pins.gpio0)?;
    let mut last_link_check = Instant::now();

    loop {
        // A click during a periodic attempt finds the lock held and backs off
        if button.poll_click() {
            info!("Manual update check requested");
            if !updater.handle() {
                info!("No update applied");
            }
        }

        if last_link_check.elapsed() >= LINK_CHECK_INTERVAL {
            wifi.ensure_connected();
            last_link_check = Instant::now();
        }

        thread::sleep(BUTTON_POLL_INTERVAL);
    }
}
