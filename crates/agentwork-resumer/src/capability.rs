//! Capabilities the resumer borrows from the host platform.

use agentwork_core::Work;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by capability methods.
pub type CapabilityFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Delivers text into a live agent session.
pub trait MessageSender: Send + Sync {
    fn send_message<'a>(&'a self, session_id: &'a str, content: &'a str) -> CapabilityFuture<'a>;
}

/// Provisions a session for an item started by another process and delivers
/// its kickoff message.
pub trait WorkStartHandler: Send + Sync {
    fn handle_work_start<'a>(&'a self, work: &'a Work) -> CapabilityFuture<'a>;
}
