// crates/client/src/lib.rs
//! Client for the proposal-desk vectorization job.
//!
//! Triggers a run over HTTP, then polls the status endpoint until the run
//! reaches a terminal state, the ceiling passes, or the caller cancels.

pub mod api;
pub mod error;
pub mod poller;
pub mod vectorize;

pub use api::{HttpVectorizationApi, VectorizationApi};
pub use error::ClientError;
pub use poller::{PollConfig, PollHandle, PollOutcome, StatusPoller};
pub use vectorize::{trigger_and_wait, VectorizeOutcome};
