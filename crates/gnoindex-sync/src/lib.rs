//! gnoindex-sync: keeps the transaction index in step with the chain.
//!
//! [`SyncEngine`] indexes blocks sequentially and checkpoints after each
//! one; [`Supervisor`] restarts it after recoverable failures.

pub mod builder;
pub mod engine;
pub mod supervisor;

pub use builder::SyncEngineBuilder;
pub use engine::SyncEngine;
pub use supervisor::Supervisor;
