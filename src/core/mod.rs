//! Core pipeline engine
//!
//! Provides the item type, the stage abstraction, fan-out strategies and the
//! executor that runs stages concurrently over bounded channels.

mod executor;
mod fanout;
mod item;
mod signature;
mod stage;

pub use executor::*;
pub use fanout::*;
pub use item::*;
pub use signature::*;
pub use stage::*;
