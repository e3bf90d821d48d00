/// Streaming sink turning network chunks into flash writes
use core::fmt::Write as _;
use sha2::{Digest, Sha256};

use crate::partition::FlashSession;
use crate::transport::ChunkSink;

/// Received-bytes interval between progress log lines.
pub const PROGRESS_LOG_STEP: usize = 64 * 1024;

/// Accounting for one download, reported whether or not it succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Everything the transport delivered, flashed or not.
    pub bytes_received: usize,
    pub bytes_written: usize,
    pub chunks: usize,
    pub failed: bool,
    /// SHA-256 of the flashed bytes.
    pub digest: [u8; 32],
}

impl DownloadSummary {
    pub fn digest_hex(&self) -> String {
        let mut hex = String::with_capacity(64);
        for byte in self.digest {
            let _ = write!(hex, "{:02x}", byte);
        }
        hex
    }
}

/// Writes each chunk straight through to the open flash session.
///
/// The first failed write makes the writer sticky-failed: later chunks are
/// counted and dropped without touching flash, so the transport can drain
/// the rest of the body.
pub struct StreamingFlashWriter<S> {
    session: S,
    failed: bool,
    bytes_received: usize,
    bytes_written: usize,
    chunks: usize,
    hasher: Sha256,
    next_progress: usize,
}

impl<S: FlashSession> StreamingFlashWriter<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            failed: false,
            bytes_received: 0,
            bytes_written: 0,
            chunks: 0,
            hasher: Sha256::new(),
            next_progress: PROGRESS_LOG_STEP,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn bytes_received(&self) -> usize {
        self.bytes_received
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Hand the session back for closing, with the final accounting.
    pub fn finish(self) -> (S, DownloadSummary) {
        let summary = DownloadSummary {
            bytes_received: self.bytes_received,
            bytes_written: self.bytes_written,
            chunks: self.chunks,
            failed: self.failed,
            digest: self.hasher.finalize().into(),
        };
        (self.session, summary)
    }
}

impl<S: FlashSession> ChunkSink for StreamingFlashWriter<S> {
    fn write_chunk(&mut self, chunk: &[u8]) {
        log::debug!("ota: write_chunk({})", chunk.len());
        self.chunks += 1;
        self.bytes_received += chunk.len();

        if self.failed {
            log::debug!("ota: update error, discarding {} bytes", chunk.len());
            return;
        }

        match self.session.write(chunk) {
            Ok(()) => {
                self.bytes_written += chunk.len();
                self.hasher.update(chunk);
                log::debug!("ota: have written image length {}", self.bytes_written);
            }
            Err(e) => {
                log::error!("ota: flash write failed at byte {}: {}", self.bytes_written, e);
                self.failed = true;
            }
        }

        if self.bytes_received >= self.next_progress {
            log::info!("ota: received {} KiB", self.bytes_received / 1024);
            while self.next_progress <= self.bytes_received {
                self.next_progress += PROGRESS_LOG_STEP;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionTable;
    use crate::testing::{count, partition, FakePlatform, FakeSession, OTA_1};
    use proptest::prelude::*;

    fn writer(platform: &FakePlatform) -> StreamingFlashWriter<FakeSession> {
        StreamingFlashWriter::new(platform.begin_session(&partition(OTA_1)).unwrap())
    }

    #[test]
    fn test_chunks_are_written_in_order() {
        let platform = FakePlatform::dual_slot();
        let mut writer = writer(&platform);

        writer.write_chunk(b"abc");
        writer.write_chunk(b"");
        writer.write_chunk(b"de");

        let (_, summary) = writer.finish();
        assert_eq!(*platform.log.flashed.lock().unwrap(), b"abcde");
        assert_eq!(summary.bytes_received, 5);
        assert_eq!(summary.bytes_written, 5);
        assert_eq!(summary.chunks, 3);
        assert!(!summary.failed);
    }

    #[test]
    fn test_failure_is_sticky_and_counting_continues() {
        let platform = FakePlatform {
            write_fail_at: Some(2),
            ..FakePlatform::dual_slot()
        };
        let mut writer = writer(&platform);

        for _ in 0..10 {
            writer.write_chunk(&[0xE9; 100]);
        }

        assert!(writer.is_failed());
        assert_eq!(writer.bytes_received(), 1000);
        assert_eq!(writer.bytes_written(), 200);
        // two good writes plus the failing one; nothing after
        assert_eq!(count(&platform.log.writes), 3);
        assert_eq!(platform.log.flashed_len(), 200);
    }

    #[test]
    fn test_digest_covers_flashed_bytes() {
        let platform = FakePlatform::dual_slot();
        let mut writer = writer(&platform);
        writer.write_chunk(b"abc");

        let (_, summary) = writer.finish();
        assert_eq!(
            summary.digest_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    proptest! {
        #[test]
        fn prop_received_counts_everything_transported(
            sizes in prop::collection::vec(0usize..2048, 0..40),
            fail_at in prop::option::of(0usize..40),
        ) {
            let platform = FakePlatform {
                write_fail_at: fail_at,
                ..FakePlatform::dual_slot()
            };
            let mut writer = writer(&platform);
            for size in &sizes {
                writer.write_chunk(&vec![0x5A; *size]);
            }
            let (_, summary) = writer.finish();

            let total: usize = sizes.iter().sum();
            prop_assert_eq!(summary.bytes_received, total);
            prop_assert_eq!(summary.chunks, sizes.len());

            match fail_at {
                Some(at) if at < sizes.len() => {
                    prop_assert!(summary.failed);
                    prop_assert_eq!(count(&platform.log.writes), at + 1);
                    prop_assert_eq!(summary.bytes_written, sizes[..at].iter().sum::<usize>());
                }
                _ => {
                    prop_assert!(!summary.failed);
                    prop_assert_eq!(count(&platform.log.writes), sizes.len());
                    prop_assert_eq!(summary.bytes_written, total);
                }
            }
            prop_assert_eq!(platform.log.flashed_len(), summary.bytes_written);
        }
    }
}
