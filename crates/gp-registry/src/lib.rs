//! # gp-registry
//!
//! Registry plumbing for the policy engine.
//!
//! - [`TypedValue`]: decoded registry values (strings, DWORD/QWORD,
//!   multi-strings, raw bytes) and their on-disk encodings.
//! - [`RegistryStore`]: the narrow key/value interface every backend is
//!   reached through. [`MemoryStore`] is a live-style implementation.
//! - [`codec`] and [`PolStore`]: the `Registry.pol` binary format and an
//!   in-memory key-store over it with `**del.` / `**delvals.` markers.
//!
//! ## Key invariants
//!
//! - Keys and value names compare case-insensitively; the policy file keeps
//!   the casing each entry was first written with.
//! - Serializing a store, parsing it and serializing again yields identical
//!   bytes.
//! - Plain absence of a value is never deletion evidence; only markers are.

pub mod codec;
pub mod error;
pub mod memory;
pub mod pol_store;
pub mod store;
pub mod value;

pub use codec::PolEntry;
pub use error::RegistryError;
pub use memory::MemoryStore;
pub use pol_store::PolStore;
pub use store::RegistryStore;
pub use value::{kind, TypedValue};
