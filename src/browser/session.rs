use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// The UI operations the collectors need from a live browser session.
///
/// Collectors only ever talk to this trait, so the resolution state machine
/// and the scroll loop can run against a scripted session in tests.
#[async_trait]
pub trait UiSession: Send + Sync {
    async fn click(&self, selector: &str) -> Result<()>;

    /// Type into an input after focusing it. The search UI must receive the
    /// full string before match results are read.
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    /// Select-all-and-delete on a contenteditable input.
    async fn clear_input(&self, selector: &str) -> Result<()>;

    async fn text_of(&self, selector: &str) -> Result<String>;

    async fn exists(&self, selector: &str) -> bool;

    /// Poll until the selector matches or the timeout elapses.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Scroll an element's content backwards (towards older history).
    async fn scroll_up(&self, selector: &str, pixels: i64) -> Result<()>;

    /// Full HTML of the current document.
    async fn html(&self) -> Result<String>;
}
