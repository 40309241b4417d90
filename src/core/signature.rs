//! The `SingleHash -> MultiHash -> Combine` signature pipeline

use super::stage::serialize_millis;
use crate::config::PipelineConfig;
use crate::core::{PipelineExecutor, PipelineItem, StageReport};
use crate::error::Result;
use crate::hash::DataSigner;
use crate::stages::{CombineStage, MultiHashStage, SingleHashStage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a signature run
#[derive(Debug, Clone, Serialize)]
pub struct SignatureReport {
    /// Inputs in the order they were fed
    pub inputs: Vec<i64>,
    /// Combined signature
    pub signature: String,
    /// Per-stage statistics
    pub stages: Vec<StageReport>,
    /// Total wall time
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl SignatureReport {
    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Signature Summary ===");
        println!("Inputs:     {}", self.inputs.len());
        println!("Duration:   {:.2?}", self.elapsed);
        for stage in &self.stages {
            println!(
                "  {:<12} in {:>5}  out {:>5}  {:>10.2?}",
                stage.name, stage.received, stage.emitted, stage.elapsed
            );
        }
        println!("Signature:  {}", self.signature);
    }
}

/// Build the three-stage signature pipeline around `signer`.
///
/// The SingleHash stage gets its own digest lock, so two pipelines built
/// here never contend with each other.
pub fn signature_pipeline(config: &PipelineConfig, signer: Arc<dyn DataSigner>) -> PipelineExecutor {
    let fan_out = config.fan_out();
    PipelineExecutor::from_config(config)
        .stage(SingleHashStage::new(Arc::clone(&signer), fan_out))
        .stage(MultiHashStage::new(signer, fan_out))
        .stage(CombineStage::new())
}

/// Compute the combined signature of `inputs` with a fresh signer built from `config`
pub fn compute_signature(inputs: &[i64], config: &PipelineConfig) -> Result<SignatureReport> {
    compute_signature_with(inputs, config, config.build_signer())
}

/// Compute the combined signature of `inputs` with a caller-supplied signer.
///
/// The digest lock only serializes calls made by this run. Passing one
/// [`StandardSigner`](crate::hash::StandardSigner) to pipelines that run at
/// the same time lets their digests overlap, and the signer fails them with
/// [`DigestOverheat`](crate::error::PipelineError::DigestOverheat). Give each
/// concurrent run its own signer.
pub fn compute_signature_with(
    inputs: &[i64],
    config: &PipelineConfig,
    signer: Arc<dyn DataSigner>,
) -> Result<SignatureReport> {
    config.validate()?;

    let executor = signature_pipeline(config, signer);
    let output = executor.execute(inputs.iter().copied().map(PipelineItem::Int))?;
    let stages = output.stages.clone();
    let elapsed = output.elapsed;

    Ok(SignatureReport {
        inputs: inputs.to_vec(),
        signature: output.into_signature()?,
        stages,
        elapsed,
    })
}
