use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::Value;

use crate::browser::{BrowserLauncher, BrowserSession};
use crate::config::PortalConfig;
use crate::error::{Error, Result};

const SITE_KEY_EXPRESSION: &str = "typeof site_key_sunat === 'undefined' ? null : site_key_sunat";

const EXECUTE_CAPTCHA: &str = r#"
    var siteKey = arguments[0];
    var done = arguments[arguments.length - 1];
    grecaptcha.ready(function () {
        grecaptcha.execute(siteKey, { action: 'token' }).then(done);
    });
"#;

/// Anything that can hand out a single-use portal token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn acquire_token(&self) -> Result<String>;
}

/// Obtains a reCAPTCHA token by running the portal's own widget in a
/// dedicated browser.
pub struct ChallengeTokenAcquirer<L> {
    launcher: L,
    page_url: String,
    settle_delay: Duration,
    token_timeout: Duration,
}

impl<L: BrowserLauncher> ChallengeTokenAcquirer<L> {
    pub fn new(launcher: L, portal: &PortalConfig) -> Self {
        Self {
            launcher,
            page_url: portal.page_url.clone(),
            settle_delay: portal.settle_delay,
            token_timeout: portal.token_timeout,
        }
    }

    async fn extract(&self, session: &mut dyn BrowserSession) -> Result<String> {
        session.load_page(&self.page_url).await?;
        tokio::time::sleep(self.settle_delay).await;

        let site_key = match session.eval_script(SITE_KEY_EXPRESSION).await? {
            Value::String(key) if !key.is_empty() => key,
            other => {
                return Err(Error::Acquisition(format!(
                    "site key not exposed by page (got {})",
                    other
                )));
            }
        };
        debug!("site key: {}", site_key);

        let resolved = tokio::time::timeout(
            self.token_timeout,
            session.eval_async_script(EXECUTE_CAPTCHA, vec![Value::String(site_key)]),
        )
        .await
        .map_err(|_| {
            Error::Acquisition(format!(
                "captcha did not resolve within {:?}",
                self.token_timeout
            ))
        })??;

        match resolved {
            Value::String(token) if !token.is_empty() => Ok(token),
            other => Err(Error::Acquisition(format!(
                "captcha resolved to an unusable token: {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl<L: BrowserLauncher> TokenSource for ChallengeTokenAcquirer<L> {
    async fn acquire_token(&self) -> Result<String> {
        info!("Acquiring captcha token from {}", self.page_url);
        let mut session = self.launcher.launch().await?;

        let result = self.extract(session.as_mut()).await;

        if let Err(e) = session.close().await {
            warn!("browser teardown failed: {}", e);
        }

        result
    }
}
