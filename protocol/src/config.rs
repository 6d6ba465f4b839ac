//! # Protocol Configuration & Constants
//!
//! Every magic number in Passlock lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! Fee tiers and the cancel cooldown are frozen onto each transfer at
//! creation, so changing these defaults only affects transfers created
//! afterwards. Still, pick them carefully.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Networks the node knows how to label. Purely informational — there is
/// no consensus layer, so nothing breaks if two nodes disagree.
pub const NETWORK_DEVNET: &str = "devnet";
pub const NETWORK_TESTNET: &str = "testnet";
pub const NETWORK_MAINNET: &str = "mainnet";

// ---------------------------------------------------------------------------
// Fee Schedule Defaults
// ---------------------------------------------------------------------------

/// Upper bound (inclusive) of the cheapest fee tier, in smallest units.
pub const DEFAULT_FEE_LIMIT_ONE: u64 = 100_000;

/// Upper bound (inclusive) of the middle fee tier.
pub const DEFAULT_FEE_LIMIT_TWO: u64 = 10_000_000;

/// Tier one rate: 100 / 10_000 = 1.00%.
pub const DEFAULT_FEE_RATE_ONE: u64 = 100;

/// Tier two rate: 50 / 10_000 = 0.50%.
pub const DEFAULT_FEE_RATE_TWO: u64 = 50;

/// Tier three rate: 25 / 10_000 = 0.25%.
pub const DEFAULT_FEE_RATE_THREE: u64 = 25;

/// Denominator for all fee rates. Basis points, because everyone already
/// knows what a basis point is.
pub const DEFAULT_FEE_SCALING_FACTOR: u64 = 10_000;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long the sender keeps the exclusive right to cancel. One hour is long
/// enough to notice a typo in the receiver address, short enough that the
/// receiver isn't left staring at a spinner all afternoon.
pub const DEFAULT_CANCEL_COOLDOWN: Duration = Duration::from_secs(3_600);

/// Upper bound for a configured cancel cooldown. Thirty days. Anything
/// longer is not a cooldown, it's a savings account.
pub const MAX_CANCEL_COOLDOWN: Duration = Duration::from_secs(30 * 24 * 3_600);

// ---------------------------------------------------------------------------
// Password Policy
// ---------------------------------------------------------------------------

/// Minimum password length in characters. The password is the only thing
/// standing between a stranger and the escrowed funds once the cooldown
/// ends, so "1234" doesn't cut it.
pub const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Length of the random salt mixed into every password commitment.
pub const PASSWORD_SALT_LENGTH: usize = 16;

/// BLAKE3 `derive_key` context for password commitments. Changing this
/// invalidates every stored commitment, so don't.
pub const PASSWORD_COMMITMENT_CONTEXT: &str = "passlock 2026-01 transfer password commitment";

/// Hash output length in bytes.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Canonical string form of the chain-native asset sentinel.
pub const NATIVE_ASSET_SYMBOL: &str = "native";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default REST / JSON-RPC API port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Returns `true` for the network labels the node accepts.
pub fn is_known_network(network: &str) -> bool {
    matches!(network, NETWORK_DEVNET | NETWORK_TESTNET | NETWORK_MAINNET)
}
