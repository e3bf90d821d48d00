//! Test doubles for the transport, partition table and restart collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{PlatformError, TransportError};
use crate::partition::{FlashSession, Partition, PartitionInfo, PartitionTable, SystemControl};
use crate::transport::{ChunkSink, Deadline, Fetched, HttpTransport};

pub const APP_TYPE: u32 = 0x00;
pub const OTA_0: u8 = 0;
pub const OTA_1: u8 = 1;

pub fn partition(slot: u8) -> Partition<u8> {
    Partition::new(
        slot,
        PartitionInfo {
            kind: APP_TYPE,
            subtype: 0x10 + slot as u32,
            address: 0x10000 + slot as u32 * 0x1F_0000,
        },
    )
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

pub struct ScriptedTransport {
    latest: Result<(u16, Vec<u8>), TransportError>,
    chunks: Vec<Vec<u8>>,
    fail_after: Option<usize>,
    stall: Option<Duration>,
    pub urls: Mutex<Vec<String>>,
    pub timeouts: Mutex<Vec<Duration>>,
    pub fetches: AtomicUsize,
    pub streams: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            latest: Err(TransportError::Connect("no route to host".to_string())),
            chunks: Vec::new(),
            fail_after: None,
            stall: None,
            urls: Mutex::new(Vec::new()),
            timeouts: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            streams: AtomicUsize::new(0),
        }
    }

    pub fn latest(mut self, status: u16, body: &[u8]) -> Self {
        self.latest = Ok((status, body.to_vec()));
        self
    }

    pub fn latest_error(mut self, error: TransportError) -> Self {
        self.latest = Err(error);
        self
    }

    /// `chunks` chunks of `chunk_len` bytes, chunk `i` filled with byte `i`.
    pub fn image(mut self, chunks: usize, chunk_len: usize) -> Self {
        self.chunks = (0..chunks).map(|i| vec![i as u8; chunk_len]).collect();
        self
    }

    /// Drop the connection after delivering `delivered` chunks.
    pub fn fail_after(mut self, delivered: usize) -> Self {
        self.fail_after = Some(delivered);
        self
    }

    /// Take `per_chunk` to deliver each image chunk.
    pub fn stall(mut self, per_chunk: Duration) -> Self {
        self.stall = Some(per_chunk);
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Timeout passed with each request, in request order.
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }

    fn record(&self, url: &str, timeout: Duration) {
        self.urls.lock().unwrap().push(url.to_string());
        self.timeouts.lock().unwrap().push(timeout);
    }
}

impl HttpTransport for ScriptedTransport {
    fn fetch(&self, url: &str, timeout: Duration, body: &mut [u8]) -> Result<Fetched, TransportError> {
        bump(&self.fetches);
        self.record(url, timeout);

        let (status, data) = self.latest.clone()?;
        let len = data.len().min(body.len());
        body[..len].copy_from_slice(&data[..len]);
        Ok(Fetched { status, len })
    }

    fn stream(&self, url: &str, timeout: Duration, sink: &mut dyn ChunkSink) -> Result<u16, TransportError> {
        bump(&self.streams);
        self.record(url, timeout);

        let deadline = Deadline::start(timeout);
        for (i, chunk) in self.chunks.iter().enumerate() {
            if self.fail_after == Some(i) {
                return Err(TransportError::Read("connection reset by peer".to_string()));
            }
            if let Some(stall) = self.stall {
                std::thread::sleep(stall);
            }
            deadline.check()?;
            sink.write_chunk(chunk);
        }
        Ok(200)
    }
}

#[derive(Default)]
pub struct FlashLog {
    pub sessions: AtomicUsize,
    pub writes: AtomicUsize,
    pub flashed: Mutex<Vec<u8>>,
    pub ends: AtomicUsize,
    pub aborts: AtomicUsize,
    pub commits: AtomicUsize,
    pub boot_selected: Mutex<Option<u8>>,
}

impl FlashLog {
    pub fn flashed_len(&self) -> usize {
        self.flashed.lock().unwrap().len()
    }

    pub fn boot_selected(&self) -> Option<u8> {
        *self.boot_selected.lock().unwrap()
    }
}

pub struct FakePlatform {
    pub boot: Option<u8>,
    pub running: Option<u8>,
    pub next: Option<u8>,
    pub begin_error: Option<PlatformError>,
    /// Index of the write call that fails.
    pub write_fail_at: Option<usize>,
    pub end_error: Option<PlatformError>,
    pub commit_error: Option<PlatformError>,
    pub log: Arc<FlashLog>,
}

impl FakePlatform {
    /// Booted from ota_0, ota_1 is free.
    pub fn dual_slot() -> Self {
        Self {
            boot: Some(OTA_0),
            running: Some(OTA_0),
            next: Some(OTA_1),
            begin_error: None,
            write_fail_at: None,
            end_error: None,
            commit_error: None,
            log: Arc::default(),
        }
    }
}

impl PartitionTable for FakePlatform {
    type Handle = u8;
    type Session = FakeSession;

    fn boot_partition(&self) -> Option<Partition<u8>> {
        self.boot.map(partition)
    }

    fn running_partition(&self) -> Option<Partition<u8>> {
        self.running.map(partition)
    }

    fn next_update_partition(&self) -> Option<Partition<u8>> {
        self.next.map(partition)
    }

    fn begin_session(&self, _target: &Partition<u8>) -> Result<FakeSession, PlatformError> {
        if let Some(error) = self.begin_error {
            return Err(error);
        }
        bump(&self.log.sessions);
        Ok(FakeSession {
            log: Arc::clone(&self.log),
            calls: 0,
            write_fail_at: self.write_fail_at,
            end_error: self.end_error,
        })
    }

    fn set_boot_partition(&self, target: &Partition<u8>) -> Result<(), PlatformError> {
        bump(&self.log.commits);
        if let Some(error) = self.commit_error {
            return Err(error);
        }
        *self.log.boot_selected.lock().unwrap() = Some(target.handle());
        Ok(())
    }
}

pub struct FakeSession {
    log: Arc<FlashLog>,
    calls: usize,
    write_fail_at: Option<usize>,
    end_error: Option<PlatformError>,
}

impl FlashSession for FakeSession {
    fn write(&mut self, data: &[u8]) -> Result<(), PlatformError> {
        let call = self.calls;
        self.calls += 1;
        bump(&self.log.writes);

        if self.write_fail_at == Some(call) {
            return Err(PlatformError::new(0x1503));
        }
        self.log.flashed.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn end(self) -> Result<(), PlatformError> {
        bump(&self.log.ends);
        match self.end_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn abort(self) {
        bump(&self.log.aborts);
    }
}

#[derive(Default)]
pub struct RecordingSystem {
    pub restarts: AtomicUsize,
}

impl SystemControl for RecordingSystem {
    fn restart(&self) {
        bump(&self.restarts);
    }
}
