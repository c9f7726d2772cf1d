//! # Cryptographic Primitives
//!
//! Thin wrappers around audited hash implementations. The commitment and
//! signature scheme that binds a proof to the transaction spending its seal
//! is an external collaborator and deliberately not modelled here.

pub mod hash;

pub use hash::{sha256, sha256_array, sha256_multi, tagged_sha256};
