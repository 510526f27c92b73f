use std::fs;
use std::path::Path;
use std::time::Duration;

use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use rand::Rng;
use reqwest::Client;
use tokio::time::Instant;

use crate::fips::FipsLookup;
use crate::parser::{ParseError, parse_last_page, parse_record_count};
use crate::types::RawPage;

#[derive(Debug, thiserror::Error)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Browser error: {0}")]
    BrowserError(#[from] CdpError),
    #[error("Invalid browser configuration: {0}")]
    BrowserConfig(String),
    #[error("Timed out waiting for element: {0}")]
    SelectorTimeout(String),
    #[error("Failed to decode page value: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

const SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);
const SELECTOR_POLL: Duration = Duration::from_millis(250);

const DISPLAY_ALL_CHECKBOX: &str = "#displayAllCheckbox";
const RECORD_INFO: &str = "#mycdrs_info";
const PAGINATION: &str = "#mycdrs_paginate";
const TABLE: &str = "#tableDiv #mycdrs";
const NEXT_BUTTON: &str = "#mycdrs_next";

/// A paginated table that can be read one page at a time.
///
/// `has_next` is a capability query: once it returns `false` the caller stops
/// without calling `advance`.
#[allow(async_fn_in_trait)]
pub trait Paginator {
    /// Markup of the table currently shown.
    async fn table_html(&mut self) -> Result<String, ScraperError>;
    async fn has_next(&mut self) -> Result<bool, ScraperError>;
    async fn advance(&mut self) -> Result<(), ScraperError>;
}

/// Uniformly random pause between page advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDelay {
    min: Duration,
    max: Duration,
}

impl PageDelay {
    pub const POLITE: PageDelay = PageDelay {
        min: Duration::from_secs(1),
        max: Duration::from_secs(2),
    };

    pub fn new(a: Duration, b: Duration) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn sample(&self) -> Duration {
        rand::rng().random_range(self.min..=self.max)
    }
}

impl Default for PageDelay {
    fn default() -> Self {
        Self::POLITE
    }
}

/// Saves pages `1..=last_page` into `dir`, stopping early if the paginator
/// reports no further pages. Returns the number of pages written.
pub async fn download_pages<P: Paginator>(
    paginator: &mut P,
    last_page: u32,
    dir: &Path,
    delay: PageDelay,
) -> Result<u32, ScraperError> {
    let mut saved = 0;

    for page_number in 1..=last_page {
        let html = paginator.table_html().await?;
        let path = RawPage::path_in(dir, page_number);
        fs::write(&path, html)?;
        saved += 1;
        log::info!("Downloaded {}", path.display());

        if !paginator.has_next().await? {
            if page_number < last_page {
                log::warn!(
                    "Next page unavailable after page {} of {}, stopping",
                    page_number,
                    last_page
                );
            }
            break;
        }
        paginator.advance().await?;

        tokio::time::sleep(delay.sample()).await;
    }

    Ok(saved)
}

/// DataTables marks an exhausted "next" control with a `disabled` class.
fn next_enabled(class: &str) -> bool {
    !class.contains("disabled")
}

/// [`Paginator`] over the DataTables listing rendered in a browser tab.
pub struct BrowserPaginator {
    page: Page,
}

impl BrowserPaginator {
    /// Opens `url` and switches the table to show every column.
    pub async fn open(browser: &Browser, url: &str) -> Result<Self, ScraperError> {
        log::info!("Opening {}", url);
        let page = browser.new_page(url).await?;
        page.wait_for_navigation().await?;

        let paginator = Self { page };
        paginator.show_all_columns().await?;
        Ok(paginator)
    }

    async fn show_all_columns(&self) -> Result<(), ScraperError> {
        let checkbox = self.wait_for(DISPLAY_ALL_CHECKBOX).await?;
        let checked: bool = self
            .page
            .evaluate("document.querySelector('#displayAllCheckbox').checked")
            .await?
            .into_value()?;

        if !checked {
            log::debug!("Enabling display of all columns");
            checkbox.click().await?;
        }
        Ok(())
    }

    pub async fn record_count(&self) -> Result<u64, ScraperError> {
        let info = self.wait_for(RECORD_INFO).await?;
        let text = info
            .inner_text()
            .await?
            .ok_or_else(|| ParseError::MissingElement(RECORD_INFO.to_string()))?;
        Ok(parse_record_count(&text)?)
    }

    pub async fn last_page(&self) -> Result<u32, ScraperError> {
        let pagination = self.wait_for(PAGINATION).await?;
        let html = pagination
            .inner_html()
            .await?
            .ok_or_else(|| ParseError::MissingElement(PAGINATION.to_string()))?;
        Ok(parse_last_page(&html)?)
    }

    async fn wait_for(&self, selector: &str) -> Result<Element, ScraperError> {
        let deadline = Instant::now() + SELECTOR_TIMEOUT;
        loop {
            match self.page.find_element(selector).await {
                Ok(element) => return Ok(element),
                Err(e) if Instant::now() < deadline => {
                    log::trace!("Waiting for {}: {}", selector, e);
                    tokio::time::sleep(SELECTOR_POLL).await;
                }
                Err(e) => {
                    log::error!("Selector {} never appeared: {e:?}", selector);
                    return Err(ScraperError::SelectorTimeout(selector.to_string()));
                }
            }
        }
    }
}

impl Paginator for BrowserPaginator {
    async fn table_html(&mut self) -> Result<String, ScraperError> {
        let table = self.wait_for(TABLE).await?;
        let html = table
            .inner_html()
            .await?
            .ok_or_else(|| ParseError::MissingElement(TABLE.to_string()))?;
        Ok(html)
    }

    async fn has_next(&mut self) -> Result<bool, ScraperError> {
        let next = self.wait_for(NEXT_BUTTON).await?;
        let class = next.attribute("class").await?.unwrap_or_default();
        Ok(next_enabled(&class))
    }

    async fn advance(&mut self) -> Result<(), ScraperError> {
        self.wait_for(NEXT_BUTTON).await?.click().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Show the browser window instead of running headless.
    pub headed: bool,
    pub delay: PageDelay,
}

#[derive(Debug, Clone)]
pub struct WebScraper {
    client: Client,
    listing_url: String,
    reference_url: String,
}

impl WebScraper {
    pub fn new() -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self {
            client,
            listing_url: crate::LISTING_URL.to_string(),
            reference_url: crate::FIPS_REFERENCE_URL.to_string(),
        })
    }

    pub async fn fetch_fips_lookup(&self) -> Result<FipsLookup, ScraperError> {
        log::info!("Fetching county FIPS reference from {}", self.reference_url);
        let text = self.get_text(&self.reference_url).await?;
        Ok(FipsLookup::from_reference(&text)?)
    }

    /// Walks the listing in a browser and saves every page into `pages_dir`.
    /// Returns the record count the listing reports.
    pub async fn fetch_pages(
        &self,
        pages_dir: &Path,
        options: &FetchOptions,
    ) -> Result<u64, ScraperError> {
        fs::create_dir_all(pages_dir)?;

        let mut builder = BrowserConfig::builder();
        if options.headed {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScraperError::BrowserConfig)?;

        let (mut browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = self.walk_listing(&browser, pages_dir, options.delay).await;

        if let Err(e) = browser.close().await {
            log::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = browser.wait().await {
            log::warn!("Failed to wait for browser exit: {}", e);
        }
        if let Err(e) = handler_task.await {
            log::warn!("Browser handler ended abnormally: {}", e);
        }

        result
    }

    async fn walk_listing(
        &self,
        browser: &Browser,
        pages_dir: &Path,
        delay: PageDelay,
    ) -> Result<u64, ScraperError> {
        let mut paginator = BrowserPaginator::open(browser, &self.listing_url).await?;

        let total = paginator.record_count().await?;
        let last_page = paginator.last_page().await?;
        log::info!("Listing reports {} records over {} pages", total, last_page);

        let saved = download_pages(&mut paginator, last_page, pages_dir, delay).await?;
        log::info!("Saved {} page(s) to {}", saved, pages_dir.display());

        Ok(total)
    }

    async fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        Ok(self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))?
            .error_for_status()?
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))?)
    }
}
