use std::fs;
use std::path::Path;

/// `#define NAME "value"` lines exported as build-time environment.
const CONFIG_KEYS: [&str; 4] = ["WIFI_SSID", "WIFI_PASSWORD", "OTA_BASE_URL", "OTA_FIRMWARE_PREAMBLE"];

fn main() -> anyhow::Result<()> {
    // Necessary for ESP-IDF
    embuild::espidf::sysenv::output();

    // Add crash log helper for better panic diagnostics
    println!("cargo:rustc-link-arg=-Wl,--undefined=esp_backtrace_print_app_description");

    let config_path = "ota_config.h";
    println!("cargo:rerun-if-changed={}", config_path);
    println!("cargo:rerun-if-env-changed=FIRMWARE_VERSION");

    let contents = if Path::new(config_path).exists() {
        fs::read_to_string(config_path)?
    } else {
        println!("cargo:warning=ota_config.h not found! Copy ota_config.h.example to ota_config.h and fill in your settings.");
        String::new()
    };

    for key in CONFIG_KEYS {
        let define = format!("#define {} ", key);
        let value = contents
            .lines()
            .find(|l| l.trim_start().starts_with(&define))
            .and_then(|l| l.split('"').nth(1))
            .unwrap_or("");
        println!("cargo:rustc-env={}={}", key, value);
    }

    // The running version is fixed at build time; release builds pass it in
    let version = std::env::var("FIRMWARE_VERSION")
        .unwrap_or_else(|_| std::env::var("CARGO_PKG_VERSION").unwrap_or_default());
    println!("cargo:rustc-env=FIRMWARE_VERSION={}", version);

    Ok(())
}
