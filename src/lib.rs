//! # SignPipe - Concurrent Hashing Pipeline
//!
//! SignPipe feeds integers through a chain of concurrently running stages
//! connected by bounded channels and produces a single combined signature.
//!
//! ## Features
//!
//! - **Stage Chaining**: Any number of stages, each on its own thread
//! - **Bounded Channels**: Backpressure between stages (default capacity 100)
//! - **Fan-Out**: One thread per item, or a fixed rayon pool per stage
//! - **Serialized Digest**: The content digest never runs concurrently within a stage
//! - **Deterministic Output**: Results are sorted before they are combined
//!
//! ## Quick Start
//!
//! ```no_run
//! use signpipe::{compute_signature, PipelineConfig};
//!
//! let report = compute_signature(&[0, 1], &PipelineConfig::default()).unwrap();
//! println!("{}", report.signature);
//! ```
//!
//! ## Custom Pipelines
//!
//! ```no_run
//! use signpipe::core::{FnStage, Inbox, Outbox, PipelineExecutor, PipelineItem};
//!
//! let executor = PipelineExecutor::new(16)
//!     .stage(FnStage::new("square", |inbox: Inbox, outbox: Outbox| {
//!         for item in inbox.iter() {
//!             let n = item.into_int("square")?;
//!             outbox.send(n * n)?;
//!         }
//!         Ok(())
//!     }));
//!
//! let output = executor.execute((1..=4).map(PipelineItem::Int)).unwrap();
//! println!("{:?}", output.items);
//! ```
//!
//! ## Individual Stages
//!
//! ```no_run
//! use signpipe::core::FanOut;
//! use signpipe::hash::StandardSigner;
//! use signpipe::stages::{combine, MultiHashStage, SingleHashStage};
//! use std::sync::Arc;
//!
//! let signer = Arc::new(StandardSigner::new());
//! let single = SingleHashStage::new(signer.clone(), FanOut::PerItem).hash_item(0).unwrap();
//! let multi = MultiHashStage::new(signer, FanOut::PerItem).hash_item(&single).unwrap();
//! println!("{}", combine(vec![multi]));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod hash;
pub mod stages;

// Re-export commonly used types
pub use config::{FanOutStrategy, PipelineConfig, SignerKind};
pub use core::{compute_signature, PipelineExecutor, PipelineItem, SignatureReport};
pub use error::{PipelineError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use signpipe::prelude::*;
    //! ```

    pub use crate::config::{FanOutStrategy, PipelineConfig, SignerKind};
    pub use crate::core::{
        compute_signature, compute_signature_with, signature_pipeline, FanOut, FnStage, Inbox,
        Outbox, PipelineExecutor, PipelineItem, SignatureReport, Stage,
    };
    pub use crate::error::{PipelineError, Result};
    pub use crate::hash::{ClassicSigner, DataSigner, DigestLock, StandardSigner};
    pub use crate::stages::{combine, CombineStage, MultiHashStage, SingleHashStage};
}
