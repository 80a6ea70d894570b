pub mod manager;
pub mod session;

pub use manager::{ChannelSession, SessionManager};
pub use session::UiSession;
