use bytes::Bytes;
use reqwest::Client;
use streaming::io::{FetchError, Fetcher, FsFetcher};
use tracing::debug;

pub fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Fetches over HTTP(S). Relative URLs are joined onto `base`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Option<String>,
}

impl HttpFetcher {
    pub fn new(base: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base,
        }
    }

    fn resolve(&self, url: &str) -> Result<String, FetchError> {
        if is_http(url) {
            return Ok(url.to_string());
        }
        match &self.base {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            )),
            None => Err(FetchError::Unsupported(url.to_string())),
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let target = self.resolve(url)?;
        debug!(url = %target, "GET");
        let resp = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(target));
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                url: target,
                status: status.as_u16(),
            });
        }
        resp.bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

/// Routes absolute HTTP URLs to the network and everything else to the
/// local asset root, when there is one.
pub struct SceneFetcher {
    local: Option<FsFetcher>,
    http: HttpFetcher,
}

impl SceneFetcher {
    pub fn from_root(root: &str) -> Self {
        if is_http(root) {
            Self {
                local: None,
                http: HttpFetcher::new(Some(root.to_string())),
            }
        } else {
            Self {
                local: Some(FsFetcher::new(root)),
                http: HttpFetcher::new(None),
            }
        }
    }
}

impl Fetcher for SceneFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        match &self.local {
            Some(local) if !is_http(url) => local.fetch(url).await,
            _ => self.http.fetch(url).await,
        }
    }
}
