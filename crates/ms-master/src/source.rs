//! Module source acquisition.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where module bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Bytes already in memory
    Bytes(Vec<u8>),
    /// A local file
    Path(PathBuf),
    /// An `http://` or `https://` locator
    Url(String),
}

impl Source {
    /// Interpret a command-line style argument as a URL or a path.
    pub fn parse(locator: &str) -> Self {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            Source::Url(locator.to_string())
        } else {
            Source::Path(PathBuf::from(locator))
        }
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Url(url) => f.write_str(url),
        }
    }
}

/// The module bytes could not be obtained.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Resolve a source to its raw bytes.
pub async fn fetch(source: Source) -> Result<Vec<u8>, LoadError> {
    match source {
        Source::Bytes(bytes) => Ok(bytes),
        Source::Path(path) => match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(source) => Err(LoadError::Io { path, source }),
        },
        Source::Url(url) => fetch_url(url).await,
    }
}

async fn fetch_url(url: String) -> Result<Vec<u8>, LoadError> {
    let response = match reqwest::get(&url).await {
        Ok(response) => response,
        Err(source) => return Err(LoadError::Http { url, source }),
    };
    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Status {
            url,
            status: status.as_u16(),
        });
    }
    match response.bytes().await {
        Ok(bytes) => Ok(bytes.to_vec()),
        Err(source) => Err(LoadError::Http { url, source }),
    }
}
