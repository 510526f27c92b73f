mod parser;
pub mod fips;
pub mod normalizer;
pub mod scraper;
pub mod types;
pub mod utils;

pub use fips::FipsLookup;
pub use parser::ParseError;
pub use crate::scraper::{
    BrowserPaginator, FetchOptions, PageDelay, Paginator, ScraperError, WebScraper,
};

pub(crate) const BASE_URL: &str = "https://oag.my.site.com";

pub const LISTING_URL: &str = "https://oag.my.site.com/cdr/cdrreportdeaths";

pub const FIPS_REFERENCE_URL: &str =
    "https://www2.census.gov/geo/docs/reference/codes2020/cou/st48_tx_cou2020.txt";

pub const DEFAULT_PAGES_DIR: &str = "pages";

pub const DEFAULT_OUTPUT_FILE: &str = "tx-custodial-deaths.csv";
