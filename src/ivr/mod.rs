//! The IVR core — one conversational session per inbound call.
//!
//! # State Machine
//!
//! ```text
//! AnsweringCall → CollectingLanguage → CollectingDistrict → CollectingCategory
//!              → CollectingGender → CollectingOrdering → LookingUpWorkers
//!              → AnnouncingResults → [AnnouncingWorker1] → [AnnouncingWorker2]
//!              → HangingUp
//! ```
//!
//! Every collecting step plays its prompt, then waits one digit with a
//! bounded window. Any failure (the digit-collection timeout included)
//! aborts the remaining dialogue; all paths converge on a single
//! best-effort hangup performed by the entry point's session handler.

pub mod collect;
pub mod prompts;
pub mod session;
pub mod testing;
