//! Security primitives: step-up token verification and sensitive-action
//! rate limiting.

pub mod rate_limit;
pub mod stepup;

pub use rate_limit::RateLimitManager;
pub use stepup::StepUpVerifier;
