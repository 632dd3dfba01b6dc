//! Protocol services layered over transport channels.

mod session;

pub use session::McpSession;
