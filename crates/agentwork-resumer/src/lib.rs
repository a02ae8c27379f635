//! agentwork-resumer: automatic follow-ups for agent work hierarchies.
//!
//! [`AutoResumer`] listens to a [`agentwork_fs::WorkStore`] and to agent idle
//! signals, and uses two injected capabilities to act on them:
//! - [`MessageSender`]: deliver text into a live session
//! - [`WorkStartHandler`]: provision a session for externally started work

pub mod capability;
pub mod messages;
pub mod resumer;

pub use capability::{CapabilityFuture, MessageSender, WorkStartHandler};
pub use resumer::{AutoResumer, IdleSignal};
