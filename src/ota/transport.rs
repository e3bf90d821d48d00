// HTTP(S) client backend - one EspHttpConnection per request

use std::time::Duration;

use embedded_svc::http::{client::Client, Headers, Status};
use esp_idf_svc::{
    http::client::{Configuration as HttpConfig, EspHttpConnection},
    io::{EspIOError, Read},
};
use esp_idf_sys::{ESP_ERR_HTTP_EAGAIN, ESP_ERR_TIMEOUT};
use ota_core::{ChunkSink, Deadline, Fetched, HttpTransport, TransportError};

const DEFAULT_BUFFER_SIZE: usize = 4096;

pub struct EspHttpTransport {
    buffer_size: usize,
}

impl Default for EspHttpTransport {
    fn default() -> Self {
        Self { buffer_size: DEFAULT_BUFFER_SIZE }
    }
}

impl EspHttpTransport {
    fn connect(&self, timeout: Duration) -> Result<Client<EspHttpConnection>, TransportError> {
        let config = HttpConfig {
            buffer_size: Some(self.buffer_size),
            timeout: Some(timeout),
            crt_bundle_attach: Some(esp_idf_sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let connection = EspHttpConnection::new(&config).map_err(|e| TransportError::Connect(format!("{:?}", e)))?;
        Ok(Client::wrap(connection))
    }
}

fn is_timeout(e: &EspIOError) -> bool {
    let code = e.0.code();
    code == ESP_ERR_TIMEOUT as i32 || code == ESP_ERR_HTTP_EAGAIN as i32
}

fn request_error(e: EspIOError) -> TransportError {
    if is_timeout(&e) {
        TransportError::Timeout
    } else {
        TransportError::Connect(format!("{:?}", e))
    }
}

fn read_error(e: EspIOError) -> TransportError {
    if is_timeout(&e) {
        TransportError::Timeout
    } else {
        TransportError::Read(format!("{:?}", e))
    }
}

impl HttpTransport for EspHttpTransport {
    fn fetch(&self, url: &str, timeout: Duration, body: &mut [u8]) -> Result<Fetched, TransportError> {
        let mut client = self.connect(timeout)?;
        let deadline = Deadline::start(timeout);
        let request = client.get(url).map_err(request_error)?;
        let mut response = request.submit().map_err(request_error)?;
        let status = response.status();

        // Fill the caller's buffer, then drain whatever doesn't fit
        let mut len = 0;
        let mut overflow = [0u8; 64];
        loop {
            let n = if len < body.len() {
                response.read(&mut body[len..])
            } else {
                response.read(&mut overflow)
            }
            .map_err(read_error)?;
            if n == 0 {
                break;
            }
            deadline.check()?;
            if len < body.len() {
                len += n;
            }
        }

        log::debug!("GET {} -> {} ({} bytes kept)", url, status, len);
        Ok(Fetched { status, len })
    }

    fn stream(&self, url: &str, timeout: Duration, sink: &mut dyn ChunkSink) -> Result<u16, TransportError> {
        let mut client = self.connect(timeout)?;
        // HttpConfig.timeout restarts on every read; this bounds the whole download
        let deadline = Deadline::start(timeout);
        let request = client.get(url).map_err(request_error)?;
        let mut response = request.submit().map_err(request_error)?;
        let status = response.status();
        if let Some(len) = response.header("Content-Length") {
            log::info!("Firmware download started, Content-Length: {}", len);
        }

        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = response.read(&mut buf).map_err(read_error)?;
            if n == 0 {
                break;
            }
            if deadline.is_expired() {
                log::warn!("Firmware download exceeded {}s, giving up", timeout.as_secs());
                return Err(TransportError::Timeout);
            }
            sink.write_chunk(&buf[..n]);
        }
        Ok(status)
    }
}
