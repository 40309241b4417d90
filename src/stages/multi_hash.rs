//! MultiHash stage
//!
//! For every string `s` emits `checksum("0" + s) + ... + checksum("5" + s)`.

use crate::core::{fan_out_slots, FanOut, Inbox, Outbox, Stage};
use crate::error::Result;
use crate::hash::DataSigner;
use std::sync::Arc;

/// Number of checksums concatenated per item
pub const MULTI_HASH_WIDTH: usize = 6;

/// Stage computing the six-way positional checksum of string inputs
pub struct MultiHashStage {
    signer: Arc<dyn DataSigner>,
    fan_out: FanOut,
}

impl MultiHashStage {
    /// Stage name
    pub const NAME: &'static str = "multi_hash";

    /// Create a new stage
    pub fn new(signer: Arc<dyn DataSigner>, fan_out: FanOut) -> Self {
        Self { signer, fan_out }
    }

    /// Hash one string; slot `th` always holds `checksum(th + data)`
    pub fn hash_item(&self, data: &str) -> Result<String> {
        let slots = fan_out_slots(Self::NAME, MULTI_HASH_WIDTH, |th| {
            self.signer.checksum(&format!("{}{}", th, data))
        })?;
        Ok(slots.concat())
    }
}

impl Stage for MultiHashStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, inbox: Inbox, outbox: Outbox) -> Result<()> {
        self.fan_out.for_each(Self::NAME, &inbox, |item| {
            let data = item.into_text(Self::NAME)?;
            let hash = self.hash_item(&data)?;
            tracing::trace!(%data, %hash, "multi hash");
            outbox.send(hash)
        })
    }
}
