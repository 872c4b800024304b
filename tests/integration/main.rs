//! Integration test crate: deterministic mock collaborators plus an
//! end-to-end tick replay through the assembled core.

mod mock_store;
mod simulation;
