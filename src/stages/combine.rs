//! Combine stage: the sorting barrier at the end of the pipeline

use crate::core::{Inbox, Outbox, Stage};
use crate::error::Result;

/// Separator between combined parts
pub const COMBINE_SEPARATOR: &str = "_";

/// Sort `parts` ascending by byte order and join them with `"_"`
pub fn combine(mut parts: Vec<String>) -> String {
    parts.sort_unstable();
    parts.join(COMBINE_SEPARATOR)
}

/// Terminal stage collecting every string into one signature
#[derive(Debug, Default, Clone, Copy)]
pub struct CombineStage;

impl CombineStage {
    /// Stage name
    pub const NAME: &'static str = "combine";

    /// Create a new stage
    pub fn new() -> Self {
        Self
    }
}

impl Stage for CombineStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn run(&self, inbox: Inbox, outbox: Outbox) -> Result<()> {
        let parts = inbox
            .iter()
            .map(|item| item.into_text(Self::NAME))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(parts = parts.len(), "combining results");
        outbox.send(combine(parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PipelineItem, StageStats};
    use crate::error::PipelineError;
    use crossbeam::channel::bounded;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_combine_sorts_and_joins() {
        let parts = vec!["b".to_string(), "c".to_string(), "a".to_string()];
        assert_eq!(combine(parts), "a_b_c");
    }

    #[test]
    fn test_combine_byte_order() {
        let parts = vec!["a".to_string(), "B".to_string(), "10".to_string(), "9".to_string()];
        assert_eq!(combine(parts), "10_9_B_a");
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(combine(Vec::new()), "");
    }

    #[test]
    fn test_stage_emits_exactly_one_item() {
        let stats = Arc::new(StageStats::default());
        let (in_tx, in_rx) = bounded(4);
        let (out_tx, out_rx) = bounded(4);
        in_tx.send(PipelineItem::from("y")).unwrap();
        in_tx.send(PipelineItem::from("x")).unwrap();
        drop(in_tx);

        CombineStage::new()
            .run(
                Inbox::new(in_rx, stats.clone()),
                Outbox::new(CombineStage::NAME, out_tx, stats),
            )
            .unwrap();

        let out: Vec<_> = out_rx.iter().collect();
        assert_eq!(out, vec![PipelineItem::from("x_y")]);
    }

    #[test]
    fn test_stage_rejects_int() {
        let stats = Arc::new(StageStats::default());
        let (in_tx, in_rx) = bounded(1);
        let (out_tx, _out_rx) = bounded(1);
        in_tx.send(PipelineItem::Int(1)).unwrap();
        drop(in_tx);

        let err = CombineStage::new()
            .run(
                Inbox::new(in_rx, stats.clone()),
                Outbox::new(CombineStage::NAME, out_tx, stats),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::TypeMismatch { stage: "combine", .. }));
    }

    proptest! {
        #[test]
        fn prop_combine_permutation_invariant(
            (parts, shuffled) in prop::collection::vec("[a-z0-9~]{0,8}", 0..12)
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle()))
        ) {
            let mut sorted = parts.clone();
            sorted.sort();
            prop_assert_eq!(combine(shuffled), combine(parts));
            prop_assert_eq!(combine(sorted.clone()), sorted.join("_"));
        }
    }
}
