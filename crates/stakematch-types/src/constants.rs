//! System-wide constants for the StakeMatch wagering core.

/// Basis-point denominator for fee math (100% = 10,000 bps).
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Hard cap on the platform fee (10%). Configurations above this are
/// rejected outright.
pub const MAX_PLATFORM_FEE_BPS: u32 = 1_000;

/// Hard cap on the referral fee (5%), independent of the platform cap.
pub const MAX_REFERRAL_FEE_BPS: u32 = 500;

/// Default platform fee in basis points (5.5%).
pub const DEFAULT_PLATFORM_FEE_BPS: u32 = 550;

/// Default referral fee in basis points (1%).
pub const DEFAULT_REFERRAL_FEE_BPS: u32 = 100;

/// Default join deadline for a created match (10 minutes).
pub const DEFAULT_MATCH_TTL_MS: u64 = 600_000;

/// Default deadline for a queued matchmaking request (2 minutes).
pub const DEFAULT_REQUEST_TTL_MS: u64 = 120_000;

/// Failsafe expiry for the sweep lock (60 seconds).
pub const DEFAULT_SWEEP_LOCK_TTL_MS: u64 = 60_000;

/// Default maximum entries processed per sweep.
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 100;

/// Attempts at acquiring a fresh transfer handle before surfacing
/// `NetworkUnavailable`.
pub const DEFAULT_HANDLE_RETRIES: u32 = 3;

/// Base delay between handle-acquisition retries; doubles per attempt.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

/// Hard timeout for the transfer confirmation poll (30 seconds).
pub const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 30_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "StakeMatch";
