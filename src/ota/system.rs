use esp_idf_hal::delay::FreeRtos;
use ota_core::SystemControl;

pub struct EspSystem;

impl SystemControl for EspSystem {
    fn restart(&self) {
        log::info!("Restarting into new firmware...");
        // Give the log a moment to reach the serial port
        FreeRtos::delay_ms(1000);
        unsafe { esp_idf_sys::esp_restart() }
    }
}
