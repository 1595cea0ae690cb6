//! Headless dialog confirmation using Chrome DevTools Protocol

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{EventJavascriptDialogOpening, HandleJavaScriptDialogParams};
use futures::StreamExt;

/// Grace period after navigation for late-firing handlers.
const SETTLE_MS: u64 = 1000;

/// Navigates to a URL and reports whether a dialog with the expected message opened.
#[async_trait]
pub trait HeadlessChecker: Send + Sync {
    async fn trigger_and_observe(&self, url: &str, expected_alert: &str) -> bool;
}

pub struct ChromeHeadless {
    browser: Browser,
    timeout: Duration,
}

impl ChromeHeadless {
    pub async fn launch(timeout: Duration) -> Result<Self> {
        tracing::info!("Launching headless Chrome for dialog confirmation");

        let config = BrowserConfig::builder()
            .no_sandbox()
            .args(vec![
                "--headless",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--disable-xss-auditor",
                "--window-size=1280,800",
            ])
            .build()
            .map_err(|e| anyhow::anyhow!("Browser config error: {}", e))?;

        let (browser, mut handler) = Browser::launch(config).await.context("Failed to launch browser")?;

        tokio::spawn(async move {
            while handler.next().await.is_some() {}
        });

        Ok(Self { browser, timeout })
    }

    async fn observe(&self, url: &str, expected_alert: &str) -> Result<bool> {
        let page = self.browser.new_page("about:blank").await?;
        let mut dialogs = page.event_listener::<EventJavascriptDialogOpening>().await?;

        let watch = async {
            while let Some(event) = dialogs.next().await {
                let hit = event.message == expected_alert;
                // An unanswered dialog stalls the page, so every dialog is accepted.
                let _ = page.execute(HandleJavaScriptDialogParams::new(true)).await;
                if hit {
                    return true;
                }
            }
            false
        };
        let navigate = async {
            if let Err(e) = page.goto(url).await {
                tracing::debug!(url, "headless navigation error: {}", e);
            }
            tokio::time::sleep(Duration::from_millis(SETTLE_MS)).await;
            false
        };

        let hit = tokio::time::timeout(self.timeout, async {
            tokio::select! {
                hit = watch => hit,
                done = navigate => done,
            }
        })
        .await
        .unwrap_or(false);

        let _ = page.close().await;
        Ok(hit)
    }
}

#[async_trait]
impl HeadlessChecker for ChromeHeadless {
    async fn trigger_and_observe(&self, url: &str, expected_alert: &str) -> bool {
        match self.observe(url, expected_alert).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::debug!(url, "headless check failed: {:#}", e);
                false
            }
        }
    }
}
