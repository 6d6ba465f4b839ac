//! # Cryptographic Primitives for Passlock
//!
//! Passlock needs exactly two things from cryptography: a fast hash and a
//! way to remember a password without remembering the password. Both live
//! here.
//!
//! - **BLAKE3** for hashing, with `derive_key` mode for domain separation.
//! - **Salted commitments** for claim passwords, verified in constant time.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. The commitment is a keyed BLAKE3 derivation and the equality
//! check is `blake3::Hash`'s constant-time `PartialEq`. If you're tempted to
//! compare digests with `==` on byte slices, please reconsider.

pub mod commitment;
pub mod hash;

pub use commitment::{Blake3Commitment, CommitmentScheme, PasswordCommitment};
pub use hash::{blake3_hash, domain_separated_hash};
