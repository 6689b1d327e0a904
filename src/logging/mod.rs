//! Run accounting.
//!
//! `tally` holds the counters every worker bumps after a successful operation, `report`
//! holds the per-worker and whole-run summaries the orchestrator produces once all
//! workers are done.

pub mod report;
pub mod tally;
