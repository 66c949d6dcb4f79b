// marble — Workload bootstrap
//
// Authenticator → pre_main (activation over the service) → Launch.

pub mod authenticator;
pub mod launch;
pub mod premain;

pub use self::authenticator::Authenticator;
pub use self::launch::Launch;
pub use self::premain::{pre_main, MarbleIdentity};
