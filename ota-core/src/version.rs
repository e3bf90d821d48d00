/// Latest-version discovery and comparison against the running firmware
use core::fmt;
use heapless::Vec;

use crate::config::OtaConfig;
use crate::error::{InitError, TransportError, UpdateError};
use crate::transport::HttpTransport;

/// Longest version string the updater handles.
pub const VERSION_MAX_LEN: usize = 11;

/// A firmware release identifier. Compared byte for byte, never parsed.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct VersionString(Vec<u8, VERSION_MAX_LEN>);

impl VersionString {
    /// The running version. Unlike a server response it is never truncated.
    pub fn new(version: &str) -> Result<Self, InitError> {
        let bytes = Vec::from_slice(version.as_bytes()).map_err(|_| InitError::VersionTooLong {
            len: version.len(),
            max: VERSION_MAX_LEN,
        })?;
        Ok(Self(bytes))
    }

    /// Normalize a response body: cut at the first `\n`, then keep at most
    /// `VERSION_MAX_LEN` bytes.
    pub fn from_response(body: &[u8]) -> Self {
        let line = first_line(body);
        let kept = &line[..line.len().min(VERSION_MAX_LEN)];
        let mut bytes = Vec::new();
        // kept fits by construction
        let _ = bytes.extend_from_slice(kept);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The version as it goes into the download URL. Printable ASCII is kept
    /// as is; every other byte, and the delimiters `%`, `?` and `#`, is
    /// percent-encoded so no byte of the raw version is lost.
    pub fn url_component(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for &b in self.0.iter() {
            if b.is_ascii_graphic() && !matches!(b, b'%' | b'?' | b'#') {
                out.push(b as char);
            } else {
                out.push_str(&format!("%{:02X}", b));
            }
        }
        out
    }
}

impl fmt::Display for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for VersionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionString({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Everything before the first `\n`, or the whole body.
pub fn first_line(body: &[u8]) -> &[u8] {
    match body.iter().position(|&b| b == b'\n') {
        Some(end) => &body[..end],
        None => body,
    }
}

/// Asks the update server which firmware is current.
pub struct VersionOracle<'a, T> {
    config: &'a OtaConfig,
    transport: &'a T,
}

impl<'a, T: HttpTransport> VersionOracle<'a, T> {
    pub fn new(config: &'a OtaConfig, transport: &'a T) -> Self {
        Self { config, transport }
    }

    /// Fetch `{base_url}/latest` into `buf` and return the length of the
    /// normalized version now at the start of `buf`. A body longer than
    /// `buf` is truncated, not rejected.
    pub fn fetch_latest(&self, buf: &mut [u8]) -> Result<usize, UpdateError> {
        if !self.config.is_enabled() {
            return Err(UpdateError::ConfigDisabled);
        }

        let url = self.config.latest_url();
        log::debug!("ota: fetching {}", url);
        let fetched = self.transport.fetch(&url, self.config.check_timeout(), buf)?;
        if !fetched.is_success() {
            return Err(TransportError::Status(fetched.status).into());
        }

        let len = fetched.len.min(buf.len());
        Ok(first_line(&buf[..len]).len())
    }

    /// Like [`check_update`](Self::check_update) but leaves the candidate in
    /// the caller's buffer. Returns its length if it differs from `current`.
    pub fn check_into(&self, current: &VersionString, buf: &mut [u8]) -> Option<usize> {
        match self.fetch_latest(buf) {
            Ok(len) if &buf[..len] != current.as_bytes() => Some(len),
            Ok(_) => {
                log::info!("ota: already running latest version {}", current);
                None
            }
            Err(UpdateError::ConfigDisabled) => {
                log::info!("ota: no server url found, not checking for updates");
                None
            }
            Err(e) => {
                log::warn!("ota: version check failed: {}", e);
                None
            }
        }
    }

    /// The published version, if it differs from `current`.
    pub fn check_update(&self, current: &VersionString) -> Option<VersionString> {
        let mut buf = [0u8; VERSION_MAX_LEN];
        let len = self.check_into(current, &mut buf)?;
        Some(VersionString::from_response(&buf[..len]))
    }
}
