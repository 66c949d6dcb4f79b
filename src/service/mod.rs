// service — Workload-facing activation RPC

pub mod client;
pub mod messages;
pub mod server;

pub use self::messages::{ActivationGrant, ActivationReply};
pub use self::server::{Server, Stopper};
