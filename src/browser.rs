//! Headless browser rendering.
//!
//! Both scraping pipelines only need one thing from a browser: the rendered
//! HTML of a URL. [`PageRenderer`] captures that, and [`ChromeRenderer`]
//! provides it with a single headless Chrome session shared by every request.
//! Tests substitute in-memory renderers.

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::Handler;
use futures::StreamExt;
use std::error::Error;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::BrowserSettings;

/// Something that can turn a URL into rendered HTML.
pub trait PageRenderer {
    /// Load `url` and return the page source once it has settled.
    async fn render(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// A headless Chrome session driven over the DevTools protocol.
///
/// Pages are opened per request and closed afterwards; the browser process
/// lives until [`ChromeRenderer::close`] is called.
pub struct ChromeRenderer {
    browser: Browser,
    handler_task: JoinHandle<()>,
    settle_delay: Duration,
    page_timeout: Duration,
}

impl std::fmt::Debug for ChromeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeRenderer")
            .field("settle_delay", &self.settle_delay)
            .field("page_timeout", &self.page_timeout)
            .finish()
    }
}

impl ChromeRenderer {
    /// Launch Chrome with the given settings.
    #[instrument(level = "info", skip_all, fields(headless = settings.headless))]
    pub async fn launch(settings: &BrowserSettings) -> Result<Self, Box<dyn Error>> {
        let mut builder = BrowserConfig::builder()
            .arg("--log-level=3")
            .request_timeout(Duration::from_millis(settings.page_timeout_ms));
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build()?;

        let (browser, handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(drive_handler(handler));
        info!("Browser launched");

        Ok(Self {
            browser,
            handler_task,
            settle_delay: Duration::from_millis(settings.settle_delay_ms),
            page_timeout: Duration::from_millis(settings.page_timeout_ms),
        })
    }

    /// Shut the browser down and wait for the process to exit.
    #[instrument(level = "info", skip_all)]
    pub async fn close(mut self) -> Result<(), Box<dyn Error>> {
        info!("Closing browser");
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler_task.abort();
        closed?;
        Ok(())
    }
}

impl PageRenderer for ChromeRenderer {
    /// Every tab opened here is closed again, whether the load succeeds,
    /// fails, or runs out of time.
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn render(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let page = self.browser.new_page("about:blank").await?;
        let closer = page.clone();
        let html = run_then_cleanup(
            self.page_timeout + self.settle_delay,
            load(page, url.to_string(), self.settle_delay),
            async move {
                if let Err(e) = closer.close().await {
                    debug!(error = %e, "Failed to close page");
                }
            },
        )
        .await?;
        debug!(
            bytes = html.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Rendered page"
        );
        Ok(html)
    }
}

async fn load(page: Page, url: String, settle_delay: Duration) -> Result<String, Box<dyn Error>> {
    page.goto(url.as_str()).await?;
    page.wait_for_navigation().await?;
    sleep(settle_delay).await;
    Ok(page.content().await?)
}

/// Run `work` with a time limit, then always run `cleanup`.
async fn run_then_cleanup<T, W, C>(limit: Duration, work: W, cleanup: C) -> Result<T, Box<dyn Error>>
where
    W: Future<Output = Result<T, Box<dyn Error>>>,
    C: Future<Output = ()>,
{
    let outcome = timeout(limit, work).await;
    cleanup.await;
    match outcome {
        Ok(res) => res,
        Err(_) => Err(format!("page load timed out after {} ms", limit.as_millis()).into()),
    }
}

async fn drive_handler(mut handler: Handler) {
    while let Some(event) = handler.next().await {
        if let Err(e) = event {
            debug!(error = %e, "Browser handler event error");
        }
    }
}
