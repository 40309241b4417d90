//! Checksum and content digest functions consumed by the hashing stages
//!
//! The checksum may be called from any number of threads at once. The content
//! digest may not: every call has to go through a [`DigestLock`].

use crate::error::{PipelineError, Result};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Pair of deterministic string hash functions
pub trait DataSigner: Send + Sync {
    /// Checksum of `data`; safe to call concurrently
    fn checksum(&self, data: &str) -> Result<String>;

    /// Content digest of `data`; NOT safe to call concurrently
    fn content_digest(&self, data: &str) -> Result<String>;
}

/// Latency simulation and overheat detection shared by the bundled signers
#[derive(Debug, Default)]
struct Throttle {
    checksum_latency: Duration,
    digest_latency: Duration,
    digest_busy: AtomicBool,
    digest_calls: AtomicU64,
}

/// Clears the busy flag even if the digest body unwinds.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Throttle {
    fn new(checksum_latency: Duration, digest_latency: Duration) -> Self {
        Self {
            checksum_latency,
            digest_latency,
            ..Self::default()
        }
    }

    fn checksum(&self, hash: impl FnOnce() -> String) -> Result<String> {
        if !self.checksum_latency.is_zero() {
            std::thread::sleep(self.checksum_latency);
        }
        Ok(hash())
    }

    fn digest(&self, hash: impl FnOnce() -> String) -> Result<String> {
        if self.digest_busy.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::DigestOverheat);
        }
        let _busy = BusyGuard(&self.digest_busy);

        if !self.digest_latency.is_zero() {
            std::thread::sleep(self.digest_latency);
        }
        let digest = hash();
        self.digest_calls.fetch_add(1, Ordering::Relaxed);
        Ok(digest)
    }
}

/// Default signer: XXH64 checksum in decimal, SHA-256 digest in hex.
///
/// Both functions can be slowed down to make concurrency observable. The
/// digest detects overlapping calls and fails them with
/// [`PipelineError::DigestOverheat`].
#[derive(Debug, Default)]
pub struct StandardSigner {
    throttle: Throttle,
}

impl StandardSigner {
    /// Create a signer without artificial latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signer that sleeps for the given durations on every call
    pub fn with_latency(checksum_latency: Duration, digest_latency: Duration) -> Self {
        Self {
            throttle: Throttle::new(checksum_latency, digest_latency),
        }
    }

    /// Number of completed content digest calls
    pub fn digest_calls(&self) -> u64 {
        self.throttle.digest_calls.load(Ordering::Relaxed)
    }
}

impl DataSigner for StandardSigner {
    fn checksum(&self, data: &str) -> Result<String> {
        self.throttle
            .checksum(|| xxhash_rust::xxh64::xxh64(data.as_bytes(), 0).to_string())
    }

    fn content_digest(&self, data: &str) -> Result<String> {
        self.throttle
            .digest(|| hex::encode(Sha256::digest(data.as_bytes())))
    }
}

/// CRC32 (IEEE) checksum in decimal and MD5 digest in hex.
///
/// The classic pairing of hash functions for this pipeline. Carries the same
/// latency and overheat behaviour as [`StandardSigner`].
#[derive(Debug, Default)]
pub struct ClassicSigner {
    throttle: Throttle,
}

impl ClassicSigner {
    /// Create a signer without artificial latency
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signer that sleeps for the given durations on every call
    pub fn with_latency(checksum_latency: Duration, digest_latency: Duration) -> Self {
        Self {
            throttle: Throttle::new(checksum_latency, digest_latency),
        }
    }

    /// Number of completed content digest calls
    pub fn digest_calls(&self) -> u64 {
        self.throttle.digest_calls.load(Ordering::Relaxed)
    }
}

impl DataSigner for ClassicSigner {
    fn checksum(&self, data: &str) -> Result<String> {
        self.throttle
            .checksum(|| crc32fast::hash(data.as_bytes()).to_string())
    }

    fn content_digest(&self, data: &str) -> Result<String> {
        self.throttle
            .digest(|| hex::encode(Md5::digest(data.as_bytes())))
    }
}

/// Mutual exclusion around [`DataSigner::content_digest`].
///
/// One lock belongs to one stage instance and is shared by all of its item
/// workers; unrelated pipelines never contend on it.
#[derive(Debug)]
pub struct DigestLock {
    stage: &'static str,
    guard: Mutex<()>,
}

impl DigestLock {
    /// Create a lock owned by `stage`
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            guard: Mutex::new(()),
        }
    }

    /// Compute the content digest of `data` while holding the lock
    pub fn digest(&self, signer: &dyn DataSigner, data: &str) -> Result<String> {
        let _held = self
            .guard
            .lock()
            .map_err(|_| PipelineError::LockPoisoned { stage: self.stage })?;
        signer.content_digest(data)
    }
}
