//! Browser capability used to pass the portal's client-side challenge.
//!
//! The token acquirer only needs to load a page and run script in it, so the
//! capability is kept to that surface. [`chromium::ChromiumLauncher`] drives a
//! real Chromium through chromiumoxide; tests substitute their own launcher.

pub mod chromium;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Starts a fresh browser process for each session.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// One live browser with a single page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate the page and wait for it to load.
    async fn load_page(&mut self, url: &str) -> Result<()>;

    /// Evaluate an expression in the page context and return its value.
    async fn eval_script(&self, expression: &str) -> Result<Value>;

    /// Run `body` as a function with `args` followed by a completion callback
    /// as its `arguments`, and return the value passed to that callback.
    async fn eval_async_script(&self, body: &str, args: Vec<Value>) -> Result<Value>;

    /// Terminate the browser process and release its resources.
    async fn close(self: Box<Self>) -> Result<()>;
}
