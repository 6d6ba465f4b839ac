//! # Password Commitments
//!
//! A transfer never stores its claim password. It stores a commitment:
//!
//! ```text
//! digest = BLAKE3-derive_key(PASSWORD_COMMITMENT_CONTEXT, salt || password)
//! ```
//!
//! The salt is 16 random bytes drawn per transfer, so two transfers locked
//! with the same password still have unrelated digests and a precomputed
//! table of common passwords is useless against the stored records.
//!
//! Verification recomputes the digest and compares it in constant time.
//! The scheme sits behind [`CommitmentScheme`] so the ledger never knows
//! which hash or comparison it is using.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::hash::{digest_eq, domain_separated_hash_multi};
use crate::config::{HASH_OUTPUT_LENGTH, PASSWORD_COMMITMENT_CONTEXT, PASSWORD_SALT_LENGTH};

// ---------------------------------------------------------------------------
// PasswordCommitment
// ---------------------------------------------------------------------------

/// A one-way, salted commitment to a claim password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCommitment {
    /// Random per-commitment salt.
    pub salt: [u8; PASSWORD_SALT_LENGTH],
    /// Digest of `salt || password` under the commitment domain.
    pub digest: [u8; HASH_OUTPUT_LENGTH],
}

impl PasswordCommitment {
    /// Returns the hex-encoded digest. Handy for logs; reveals nothing
    /// about the password.
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

impl fmt::Debug for PasswordCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars is plenty to tell two commitments apart in a log.
        write!(f, "PasswordCommitment({}..)", &self.digest_hex()[..8])
    }
}

// ---------------------------------------------------------------------------
// CommitmentScheme
// ---------------------------------------------------------------------------

/// Commit-and-verify for claim passwords.
///
/// Implementations must make `verify` constant-time with respect to the
/// stored digest. The ledger calls nothing else.
pub trait CommitmentScheme: Send + Sync {
    /// Produces a fresh commitment to `password`.
    fn commit(&self, password: &str) -> PasswordCommitment;

    /// Returns `true` if `password` opens `commitment`.
    fn verify(&self, commitment: &PasswordCommitment, password: &str) -> bool;
}

/// The default scheme: salted BLAKE3 `derive_key`, constant-time compare.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Commitment;

impl Blake3Commitment {
    fn digest(salt: &[u8; PASSWORD_SALT_LENGTH], password: &str) -> [u8; HASH_OUTPUT_LENGTH] {
        // The salt is fixed-width, so `salt || password` is unambiguous.
        domain_separated_hash_multi(PASSWORD_COMMITMENT_CONTEXT, &[salt, password.as_bytes()])
    }

    /// Commits with a caller-supplied salt. Deterministic; used by tests and
    /// by anyone who needs to reproduce a stored commitment.
    pub fn commit_with_salt(
        &self,
        salt: [u8; PASSWORD_SALT_LENGTH],
        password: &str,
    ) -> PasswordCommitment {
        PasswordCommitment {
            salt,
            digest: Self::digest(&salt, password),
        }
    }
}

impl CommitmentScheme for Blake3Commitment {
    fn commit(&self, password: &str) -> PasswordCommitment {
        let mut salt = [0u8; PASSWORD_SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        self.commit_with_salt(salt, password)
    }

    fn verify(&self, commitment: &PasswordCommitment, password: &str) -> bool {
        let candidate = Self::digest(&commitment.salt, password);
        digest_eq(&candidate, &commitment.digest)
    }
}
