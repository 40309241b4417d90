//! SingleHash stage
//!
//! For every integer `n` emits `checksum(n) + "~" + checksum(digest(n))`.
//! The digest runs under the stage's own lock; the two checksums run in
//! parallel with each other and with other items.

use crate::core::{fan_out_slots, FanOut, Inbox, Outbox, Stage};
use crate::error::Result;
use crate::hash::{DataSigner, DigestLock};
use std::sync::Arc;

/// Separator between the two halves of a single hash
pub const SINGLE_HASH_SEPARATOR: &str = "~";

/// Stage computing the two-part hash of integer inputs
pub struct SingleHashStage {
    signer: Arc<dyn DataSigner>,
    digest_lock: DigestLock,
    fan_out: FanOut,
}

impl SingleHashStage {
    /// Stage name
    pub const NAME: &'static str = "single_hash";

    /// Create a stage with its own digest lock
    pub fn new(signer: Arc<dyn DataSigner>, fan_out: FanOut) -> Self {
        Self {
            signer,
            digest_lock: DigestLock::new(Self::NAME),
            fan_out,
        }
    }

    /// Hash one integer
    pub fn hash_item(&self, value: i64) -> Result<String> {
        let data = value.to_string();
        let digest = self.digest_lock.digest(self.signer.as_ref(), &data)?;

        let halves = fan_out_slots(Self::NAME, 2, |slot| match slot {
            0 => self.signer.checksum(&data),
            _ => self.signer.checksum(&digest),
        })?;

        Ok(halves.join(SINGLE_HASH_SEPARATOR))
    }
}

impl Stage for SingleHashStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, inbox: Inbox, outbox: Outbox) -> Result<()> {
        self.fan_out.for_each(Self::NAME, &inbox, |item| {
            let value = item.into_int(Self::NAME)?;
            let hash = self.hash_item(value)?;
            tracing::trace!(value, %hash, "single hash");
            outbox.send(hash)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PipelineItem, StageStats};
    use crate::error::PipelineError;
    use crate::hash::{ClassicSigner, StandardSigner};
    use crossbeam::channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    /// Digest that only completes once `expected` callers are inside it at
    /// the same time, or fails after `patience`.
    struct RendezvousSigner {
        inside: Arc<AtomicUsize>,
        expected: usize,
        patience: Duration,
    }

    impl DataSigner for RendezvousSigner {
        fn checksum(&self, data: &str) -> Result<String> {
            StandardSigner::new().checksum(data)
        }

        fn content_digest(&self, data: &str) -> Result<String> {
            self.inside.fetch_add(1, Ordering::SeqCst);
            let deadline = Instant::now() + self.patience;
            while self.inside.load(Ordering::SeqCst) < self.expected {
                if Instant::now() > deadline {
                    self.inside.fetch_sub(1, Ordering::SeqCst);
                    return Err(PipelineError::config("digest calls never overlapped"));
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            StandardSigner::new().content_digest(data)
        }
    }

    fn expected(signer: &StandardSigner, value: i64) -> String {
        let data = value.to_string();
        let digest = signer.content_digest(&data).unwrap();
        format!(
            "{}~{}",
            signer.checksum(&data).unwrap(),
            signer.checksum(&digest).unwrap()
        )
    }

    fn run_stage(stage: &SingleHashStage, inputs: Vec<PipelineItem>) -> Result<Vec<String>> {
        let stats = Arc::new(StageStats::default());
        let (in_tx, in_rx) = bounded(inputs.len().max(1));
        let (out_tx, out_rx) = bounded(inputs.len().max(1));
        for item in inputs {
            in_tx.send(item).unwrap();
        }
        drop(in_tx);

        stage.run(
            Inbox::new(in_rx, stats.clone()),
            Outbox::new(SingleHashStage::NAME, out_tx, stats),
        )?;
        Ok(out_rx
            .iter()
            .map(|item| item.into_text("test").unwrap())
            .collect())
    }

    #[test]
    fn test_hash_item_matches_definition() {
        let reference = StandardSigner::new();
        let stage = SingleHashStage::new(Arc::new(StandardSigner::new()), FanOut::PerItem);

        for value in [0, 1, -7, 1_000_000] {
            assert_eq!(stage.hash_item(value).unwrap(), expected(&reference, value));
        }
    }

    #[test]
    fn test_many_concurrent_items_do_not_overheat() {
        let signer = Arc::new(StandardSigner::with_latency(
            Duration::ZERO,
            Duration::from_millis(1),
        ));
        let stage = SingleHashStage::new(signer.clone(), FanOut::PerItem);
        let inputs: Vec<PipelineItem> = (0..100).map(PipelineItem::Int).collect();

        let mut out = run_stage(&stage, inputs).unwrap();
        out.sort();

        let reference = StandardSigner::new();
        let mut want: Vec<String> = (0..100).map(|v| expected(&reference, v)).collect();
        want.sort();

        assert_eq!(out, want);
        assert_eq!(signer.digest_calls(), 100);
    }

    #[test]
    fn test_bounded_workers_same_results() {
        let stage = SingleHashStage::new(Arc::new(StandardSigner::new()), FanOut::Workers(2));
        let inputs: Vec<PipelineItem> = (0..10).map(PipelineItem::Int).collect();

        let mut out = run_stage(&stage, inputs).unwrap();
        out.sort();

        let reference = StandardSigner::new();
        let mut want: Vec<String> = (0..10).map(|v| expected(&reference, v)).collect();
        want.sort();
        assert_eq!(out, want);
    }

    #[test]
    fn test_separate_stages_do_not_share_digest_lock() {
        let inside = Arc::new(AtomicUsize::new(0));
        let stage = || {
            SingleHashStage::new(
                Arc::new(RendezvousSigner {
                    inside: Arc::clone(&inside),
                    expected: 2,
                    patience: Duration::from_secs(5),
                }),
                FanOut::PerItem,
            )
        };
        let (first, second) = (stage(), stage());

        // Both digests must be in flight at once to complete
        let (a, b) = std::thread::scope(|s| {
            let a = s.spawn(|| first.hash_item(0));
            let b = s.spawn(|| second.hash_item(1));
            (a.join().unwrap(), b.join().unwrap())
        });

        let reference = StandardSigner::new();
        assert_eq!(a.unwrap(), expected(&reference, 0));
        assert_eq!(b.unwrap(), expected(&reference, 1));
    }

    #[test]
    fn test_one_stage_serializes_its_digests() {
        let stage = SingleHashStage::new(
            Arc::new(RendezvousSigner {
                inside: Arc::new(AtomicUsize::new(0)),
                expected: 2,
                patience: Duration::from_millis(100),
            }),
            FanOut::PerItem,
        );

        let (a, b) = std::thread::scope(|s| {
            let a = s.spawn(|| stage.hash_item(0));
            let b = s.spawn(|| stage.hash_item(1));
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(a.is_err());
        assert!(b.is_err());
    }

    #[test]
    fn test_classic_signer_value() {
        let stage = SingleHashStage::new(Arc::new(ClassicSigner::new()), FanOut::PerItem);
        assert_eq!(stage.hash_item(0).unwrap(), "4108050209~502633748");
    }

    #[test]
    fn test_rejects_text_items() {
        let stage = SingleHashStage::new(Arc::new(StandardSigner::new()), FanOut::PerItem);
        let err = run_stage(&stage, vec![PipelineItem::from("zero")]).unwrap_err();
        assert!(matches!(err, PipelineError::TypeMismatch { .. }));
    }

    #[test]
    fn test_empty_input_emits_nothing() {
        let stage = SingleHashStage::new(Arc::new(StandardSigner::new()), FanOut::PerItem);
        assert!(run_stage(&stage, vec![]).unwrap().is_empty());
    }
}
