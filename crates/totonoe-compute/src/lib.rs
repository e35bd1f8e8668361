//! Compute resources for Totonoe
//!
//! Implements the engine's lifecycle contract for servers and managed
//! disks. Each resource definition here is a thin consumer of the engine:
//! it declares a schema, an id grammar and a wire mapping, and the
//! `Reconciler` owns everything else (existence probes, locking, polling,
//! idempotent delete).
//!
//! A disk that is attached to a server shares the server's lock token, so
//! disk mutations and server mutations against the same machine are
//! serialized in-process.

pub mod disk;
pub mod model;
pub mod server;

pub use disk::DiskResource;
pub use model::{
    DiskModel, DiskSource, ServerModel, disk_schema, server_lock_token, server_schema,
};
pub use server::ServerResource;
