use anyhow::Result;
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use ota_core::config::VERSION_PLACEHOLDER;
use ota_core::OtaConfig;
use serde::{Deserialize, Serialize};

const CONFIG_NAMESPACE: &str = "ota";
const CONFIG_KEY: &str = "config";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    // WiFi settings
    pub wifi_ssid: String,
    pub wifi_password: String,

    // Update settings
    pub check_interval_mins: u32,
    pub ota: OtaConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        // Compiled in by build.rs from ota_config.h, which should NOT be committed to git
        let wifi_ssid = env!("WIFI_SSID");
        let wifi_password = env!("WIFI_PASSWORD");

        log::info!("Config default: SSID='{}', Password={}, server='{}'",
            wifi_ssid,
            if wifi_password.is_empty() { "<empty>" } else { "<set>" },
            env!("OTA_BASE_URL")
        );

        Self {
            wifi_ssid: wifi_ssid.to_string(),
            wifi_password: wifi_password.to_string(),
            check_interval_mins: 60,
            ota: OtaConfig {
                base_url: env!("OTA_BASE_URL").to_string(),
                firmware_template: default_template(),
                ..Default::default()
            },
        }
    }
}

fn default_template() -> String {
    let preamble = env!("OTA_FIRMWARE_PREAMBLE");
    let preamble = if preamble.is_empty() { "firmware" } else { preamble };
    format!("{}_{}.bin", preamble, VERSION_PLACEHOLDER)
}

impl DeviceConfig {
    pub fn save(&self, nvs: &mut EspNvs<NvsDefault>) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        nvs.set_blob(CONFIG_KEY, &json)?;
        log::info!("Configuration saved to NVS");
        Ok(())
    }
}

pub fn load_or_default(partition: EspDefaultNvsPartition) -> Result<DeviceConfig> {
    let mut nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true)?;

    match load_from_nvs(&nvs) {
        Ok(mut config) => {
            log::info!("Loaded configuration from NVS");

            // Empty fields in NVS fall back to the compiled-in ones
            let defaults = DeviceConfig::default();
            let mut patched = false;
            if config.wifi_ssid.is_empty() || config.wifi_password.is_empty() {
                log::warn!("NVS WiFi credentials empty, using compiled defaults: SSID='{}'", defaults.wifi_ssid);
                config.wifi_ssid = defaults.wifi_ssid;
                config.wifi_password = defaults.wifi_password;
                patched = true;
            }
            if config.ota.base_url.is_empty() && !defaults.ota.base_url.is_empty() {
                log::warn!("NVS update server empty, using compiled default '{}'", defaults.ota.base_url);
                config.ota.base_url = defaults.ota.base_url;
                patched = true;
            }

            if patched {
                if let Err(e) = config.save(&mut nvs) {
                    log::warn!("Failed to save patched config: {:?}", e);
                }
            }
            Ok(config)
        }
        Err(e) => {
            log::warn!("Failed to load config from NVS: {:?}, using defaults", e);
            let config = DeviceConfig::default();

            // Try to save default config to NVS for next time
            if let Err(save_err) = config.save(&mut nvs) {
                log::warn!("Failed to save default config to NVS: {:?}", save_err);
            }
            Ok(config)
        }
    }
}

fn load_from_nvs(nvs: &EspNvs<NvsDefault>) -> Result<DeviceConfig> {
    let mut buf = vec![0u8; 1024]; // Max config size
    let data = nvs.get_blob(CONFIG_KEY, &mut buf)?
        .ok_or_else(|| anyhow::anyhow!("Config not found in NVS"))?;

    let config: DeviceConfig = serde_json::from_slice(data)?;
    Ok(config)
}
