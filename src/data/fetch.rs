use crate::error::{BenchError, Result};

/// Retrieves the raw bytes of a dataset archive.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) downloads.
#[cfg(feature = "download")]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "download")]
impl HttpFetcher {
    pub fn new() -> Result<HttpFetcher> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BenchError::data_unavailable("http client", e))?;
        Ok(HttpFetcher { client })
    }
}

#[cfg(feature = "download")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        info!("Downloading {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| BenchError::data_unavailable(url, e))?;
        let bytes = response
            .bytes()
            .map_err(|e| BenchError::data_unavailable(url, e))?;
        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

/// Refuses every download; datasets must already be on disk.
#[derive(Copy, Clone, Debug, Default)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(BenchError::data_unavailable(
            url,
            "downloads are disabled in this build",
        ))
    }
}

/// The fetcher the benchmark binaries use: HTTP when the `download` feature is enabled.
#[cfg(feature = "download")]
pub fn default_fetcher() -> Result<Box<dyn Fetcher>> {
    Ok(Box::new(HttpFetcher::new()?))
}

#[cfg(not(feature = "download"))]
pub fn default_fetcher() -> Result<Box<dyn Fetcher>> {
    Ok(Box::new(OfflineFetcher))
}
