// Partition table and flash sessions over the ESP-IDF OTA API

use core::ffi::c_void;
use esp_idf_sys::{
    esp, esp_ota_abort, esp_ota_begin, esp_ota_end, esp_ota_get_boot_partition,
    esp_ota_get_next_update_partition, esp_ota_get_running_partition, esp_ota_handle_t,
    esp_ota_set_boot_partition, esp_ota_write, esp_partition_t, EspError, OTA_SIZE_UNKNOWN,
};
use ota_core::{FlashSession, Partition, PartitionInfo, PartitionTable, PlatformError};

/// Entry in the partition table. The table lives in flash for the whole
/// program, so the pointer never dangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EspPartition(*const esp_partition_t);

fn platform_error(e: EspError) -> PlatformError {
    PlatformError::new(e.code())
}

fn describe(ptr: *const esp_partition_t) -> Option<Partition<EspPartition>> {
    if ptr.is_null() {
        return None;
    }
    let entry = unsafe { &*ptr };
    Some(Partition::new(
        EspPartition(ptr),
        PartitionInfo {
            kind: entry.type_ as u32,
            subtype: entry.subtype as u32,
            address: entry.address,
        },
    ))
}

pub struct EspPartitionTable;

impl PartitionTable for EspPartitionTable {
    type Handle = EspPartition;
    type Session = EspFlashSession;

    fn boot_partition(&self) -> Option<Partition<EspPartition>> {
        describe(unsafe { esp_ota_get_boot_partition() })
    }

    fn running_partition(&self) -> Option<Partition<EspPartition>> {
        describe(unsafe { esp_ota_get_running_partition() })
    }

    fn next_update_partition(&self) -> Option<Partition<EspPartition>> {
        describe(unsafe { esp_ota_get_next_update_partition(core::ptr::null()) })
    }

    fn begin_session(&self, target: &Partition<EspPartition>) -> Result<EspFlashSession, PlatformError> {
        let mut handle: esp_ota_handle_t = Default::default();
        // Streaming download: the image size is not known up front
        esp!(unsafe { esp_ota_begin(target.handle().0, OTA_SIZE_UNKNOWN as _, &mut handle) })
            .map_err(|e| {
                log::error!("esp_ota_begin failed: {:?}", e);
                platform_error(e)
            })?;
        log::info!("esp_ota_begin succeeded");
        Ok(EspFlashSession { handle: Some(handle) })
    }

    fn set_boot_partition(&self, target: &Partition<EspPartition>) -> Result<(), PlatformError> {
        esp!(unsafe { esp_ota_set_boot_partition(target.handle().0) }).map_err(|e| {
            log::error!("esp_ota_set_boot_partition failed: {:?}", e);
            platform_error(e)
        })
    }
}

pub struct EspFlashSession {
    handle: Option<esp_ota_handle_t>,
}

impl FlashSession for EspFlashSession {
    fn write(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        let handle = self.handle.ok_or(PlatformError::new(esp_idf_sys::ESP_ERR_INVALID_STATE as i32))?;
        esp!(unsafe { esp_ota_write(handle, data.as_ptr() as *const c_void, data.len() as _) })
            .map_err(platform_error)
    }

    fn end(mut self) -> Result<(), PlatformError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        // Validates the image header and checksum
        esp!(unsafe { esp_ota_end(handle) }).map_err(|e| {
            log::error!("esp_ota_end failed: {:?}", e);
            platform_error(e)
        })
    }

    fn abort(mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { esp_ota_abort(handle); }
        }
    }
}

impl Drop for EspFlashSession {
    fn drop(&mut self) {
        // Clean up any ongoing OTA operation
        if let Some(handle) = self.handle.take() {
            unsafe { esp_ota_abort(handle); }
        }
    }
}
