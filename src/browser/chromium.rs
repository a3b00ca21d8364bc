//! Chromium-backed browser sessions using chromiumoxide.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::{debug, warn};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{BrowserLauncher, BrowserSession};
use crate::config::BrowserConfig;
use crate::error::{Error, Result};

const ASYNC_WRAPPER: &str = r#"new Promise((resolve, reject) => {
    const args = __ARGS__;
    args.push(resolve);
    try {
        (function () { __BODY__ }).apply(window, args);
    } catch (e) {
        reject(e);
    }
})"#;

/// How long the CDP event loop gets to drain once the process has exited.
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Launches one Chromium process per session.
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn cdp_config(&self) -> Result<CdpBrowserConfig> {
        let mut builder = CdpBrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox");
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| Error::Acquisition(format!("failed to build browser config: {}", e)))
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let (mut browser, mut handler) = Browser::launch(self.cdp_config()?)
            .await
            .map_err(|e| Error::Acquisition(format!("failed to launch Chromium: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                // The process is already up; do not leave it behind.
                let closed = shut_down(&mut browser, handler, JOIN_TIMEOUT).await;
                if let Err(close_err) = closed {
                    warn!("{}", close_err);
                }
                return Err(Error::Acquisition(format!("failed to open page: {}", e)));
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    async fn evaluate(&self, params: EvaluateParams) -> Result<Value> {
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| Error::Acquisition(format!("script evaluation failed: {}", e)))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn load_page(&mut self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| Error::Acquisition(format!("failed to load {}: {}", url, e)))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| Error::Acquisition(format!("navigation to {} failed: {}", url, e)))?;
        Ok(())
    }

    async fn eval_script(&self, expression: &str) -> Result<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .build()
            .map_err(Error::Acquisition)?;
        self.evaluate(params).await
    }

    async fn eval_async_script(&self, body: &str, args: Vec<Value>) -> Result<Value> {
        let args = serde_json::to_string(&args)
            .map_err(|e| Error::Acquisition(format!("failed to encode script args: {}", e)))?;
        let expression = ASYNC_WRAPPER
            .replace("__BODY__", body)
            .replace("__ARGS__", &args);
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(Error::Acquisition)?;
        self.evaluate(params).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromiumSession {
            mut browser,
            page,
            handler,
        } = *self;
        drop(page);

        shut_down(&mut browser, handler, JOIN_TIMEOUT).await
    }
}

/// Process-level control over a launched browser.
#[async_trait]
trait BrowserProcess: Send {
    async fn request_close(&mut self) -> Result<()>;
    async fn force_kill(&mut self);
    async fn wait_exit(&mut self);
}

#[async_trait]
impl BrowserProcess for Browser {
    async fn request_close(&mut self) -> Result<()> {
        self.close()
            .await
            .map(|_| ())
            .map_err(|e| Error::Acquisition(format!("failed to close Chromium: {}", e)))
    }

    async fn force_kill(&mut self) {
        if let Some(Err(e)) = self.kill().await {
            warn!("failed to kill Chromium: {}", e);
        }
    }

    async fn wait_exit(&mut self) {
        if let Err(e) = self.wait().await {
            warn!("failed waiting for Chromium to exit: {}", e);
        }
    }
}

/// Closes the browser, killing it if it ignores the close request, then
/// waits for the process and joins the event loop.
async fn shut_down<P: BrowserProcess>(
    process: &mut P,
    handler: JoinHandle<()>,
    join_timeout: Duration,
) -> Result<()> {
    let closed = process.request_close().await;
    if let Err(e) = &closed {
        warn!("{}; killing the process", e);
        process.force_kill().await;
    }
    process.wait_exit().await;

    let abort = handler.abort_handle();
    if timeout(join_timeout, handler).await.is_err() {
        warn!("browser event loop still running after exit; aborting it");
        abort.abort();
    }

    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FakeProcess {
        close_fails: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FakeProcess {
        fn new(close_fails: bool) -> Self {
            Self {
                close_fails,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BrowserProcess for FakeProcess {
        async fn request_close(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push("close");
            if self.close_fails {
                return Err(Error::Acquisition("Request timed out".into()));
            }
            Ok(())
        }

        async fn force_kill(&mut self) {
            self.calls.lock().unwrap().push("kill");
        }

        async fn wait_exit(&mut self) {
            self.calls.lock().unwrap().push("wait");
        }
    }

    #[tokio::test]
    async fn clean_close_waits_without_killing() {
        let mut process = FakeProcess::new(false);
        let handler = tokio::spawn(async {});

        shut_down(&mut process, handler, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(process.calls(), vec!["close", "wait"]);
    }

    #[tokio::test]
    async fn failed_close_kills_before_waiting() {
        let mut process = FakeProcess::new(true);
        let handler = tokio::spawn(async {});

        let err = shut_down(&mut process, handler, Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Acquisition(_)));
        assert_eq!(process.calls(), vec!["close", "kill", "wait"]);
    }

    #[tokio::test]
    async fn finished_event_loop_is_joined() {
        let mut process = FakeProcess::new(false);
        let drained = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&drained);
        let handler = tokio::spawn(async move {
            tokio::task::yield_now().await;
            *flag.lock().unwrap() = true;
        });

        shut_down(&mut process, handler, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(*drained.lock().unwrap());
    }

    #[tokio::test]
    async fn stuck_event_loop_is_aborted() {
        let mut process = FakeProcess::new(false);
        let handler = tokio::spawn(std::future::pending::<()>());
        let abort = handler.abort_handle();

        shut_down(&mut process, handler, Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(abort.is_finished());
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn evaluates_sync_and_async_scripts() {
        let launcher = ChromiumLauncher::new(BrowserConfig::default());
        let mut session = launcher.launch().await.expect("failed to launch");

        session
            .load_page("data:text/html,<script>var site_key_sunat = 'abc';</script>")
            .await
            .expect("navigation failed");

        let key = session
            .eval_script("site_key_sunat")
            .await
            .expect("eval failed");
        assert_eq!(key, Value::String("abc".into()));

        let doubled = session
            .eval_async_script(
                "var n = arguments[0]; var done = arguments[arguments.length - 1]; done(n * 2);",
                vec![Value::from(21)],
            )
            .await
            .expect("async eval failed");
        assert_eq!(doubled, Value::from(42));

        session.close().await.expect("close failed");
    }
}
