//! # Timing — Windows and Clocks
//!
//! A transfer's life is split into three adjacent windows:
//!
//! ```text
//! created_at            created_at + cooldown            expires_at
//!     |------ cancel window ------|------ claim window ------|------ expired ------>
//!           (sender may cancel)       (receiver may claim)     (anyone may reclaim)
//! ```
//!
//! The cancel window includes its end instant; the claim window starts
//! strictly after it. No instant belongs to both, so a receiver can never
//! claim while the sender can still cancel.
//!
//! Time itself comes from a [`Clock`]. Production uses [`SystemClock`];
//! tests wind a [`ManualClock`] forward instead of sleeping.

pub mod clock;
pub mod cooldown;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::{CooldownError, CooldownPolicy, TransferPhase};
