// Update transaction: resolve the target version, back up, apply, roll back.
//
// - UpdateOrchestrator: drives the transaction state machine
// - BackupSet: scratch-directory snapshots used for rollback
// - CancelToken: Ctrl-C state shared with the transaction
// - UpdateInteraction: yes/no prompts
pub mod backup;
pub mod cancel;
pub mod interaction;
pub mod transaction;

pub use cancel::CancelToken;
pub use interaction::UpdateInteraction;
pub use transaction::{TargetRequest, UpdateOrchestrator, UpdateOutcome, UpdatePlan};
