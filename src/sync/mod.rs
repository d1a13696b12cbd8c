//! The reconciliation engine: log sync, gap repair, catch-up and the
//! scheduler that drives them per chain.

pub mod catchup;
pub mod context;
pub mod error;
pub mod gaps;
pub mod healer;
pub mod logs;
pub mod pass;
pub mod scheduler;

pub use catchup::BackfillTally;
pub use context::{ChainContext, SyncOptions};
pub use error::SyncError;
pub use healer::HealOutcome;
pub use pass::{run_chain_pass, PassReport};
pub use scheduler::Scheduler;
