use std::time::Duration;
use thiserror::Error;

/// Outcome of a single page-driver call that did not succeed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// The operation did not complete within its bound
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The driver rejected or failed the command
    #[error("driver command failed: {0}")]
    Command(String),

    /// The underlying browser session is gone
    #[error("driver session is closed")]
    SessionClosed,
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Failures of a scraping run, narrowest scope first
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("item {index} on {site} page {page} dropped: {reason}")]
    ItemExtraction {
        site: String,
        page: usize,
        index: usize,
        reason: String,
    },

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: DriverError,
    },

    #[error("pagination of {site} failed on page {page}: {source}")]
    Pagination {
        site: String,
        page: usize,
        #[source]
        source: DriverError,
    },

    #[error("site {site} aborted: {reason}")]
    SiteFatal { site: String, reason: String },

    #[error("could not start a browser session: {0}")]
    SessionInit(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_error_names_site_and_page() {
        let err = ScrapeError::Pagination {
            site: "amazon-es".to_string(),
            page: 2,
            source: DriverError::Timeout(Duration::from_millis(500)),
        };
        assert_eq!(
            err.to_string(),
            "pagination of amazon-es failed on page 2: timed out after 500ms"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ScrapeError = io_err.into();
        assert!(matches!(err, ScrapeError::Io(_)));
    }
}
