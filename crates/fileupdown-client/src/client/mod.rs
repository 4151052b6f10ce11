use crate::error::{ApiError, Error, HttpApiError};
use crate::resources::{files::Files, stats::Stats};
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::multipart::Form;
use reqwest::{Client as HttpClient, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const BASE_URL_ENV: &str = "FILEUPDOWN_API_URL";
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Applies to every request, uploads included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub default_headers: HeaderMap,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let base_url = std::env::var(BASE_URL_ENV).ok().filter(|s| !s.is_empty());
        Self {
            base_url,
            timeout: None,
            default_headers: HeaderMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

#[derive(Clone)]
pub struct FileManager {
    pub files: Files,
    pub stats: Stats,
}

impl FileManager {
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        let inner = Arc::new(Inner::new(options)?);
        Ok(Self {
            files: Files::new(inner.clone()),
            stats: Stats::new(inner),
        })
    }

    pub fn base_url(&self) -> &Url {
        self.files.base_url()
    }
}

pub(crate) struct Inner {
    http: HttpClient,
    base_url: Url,
    timeout: Duration,
    default_headers: HeaderMap,
    user_agent: HeaderValue,
}

impl Inner {
    fn new(options: ClientOptions) -> Result<Self, Error> {
        let base_url_str = options.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base_url = Url::parse(base_url_str)?;
        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);

        let http = HttpClient::builder().build()?;
        let user_agent = HeaderValue::from_str(&format!(
            "fileupdown-client/{}",
            env!("CARGO_PKG_VERSION")
        ))?;

        Ok(Self {
            http,
            base_url,
            timeout,
            default_headers: options.default_headers,
            user_agent,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> Result<Url, Error> {
        if path.starts_with('/') {
            return Ok(self.base_url.join(path)?);
        }
        Ok(self.base_url.join(&format!("/{path}"))?)
    }

    fn make_headers(&self, extra: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, self.user_agent.clone());

        for (name, value) in self.default_headers.iter() {
            headers.insert(name, value.clone());
        }
        for (name, value) in extra.iter() {
            headers.insert(name, value.clone());
        }
        headers
    }

    fn url_with_query(
        &self,
        path: &str,
        query: Option<Vec<(String, String)>>,
    ) -> Result<Url, Error> {
        let mut url = self.build_url(path)?;
        if let Some(pairs) = query {
            if !pairs.is_empty() {
                let mut qp = url.query_pairs_mut();
                for (k, v) in pairs {
                    qp.append_pair(&k, &v);
                }
            }
        }
        Ok(url)
    }

    pub async fn request_json<T, B>(
        &self,
        method: Method,
        path: &str,
        query: Option<Vec<(String, String)>>,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, Error>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .request_raw(method, path, query, body, HeaderMap::new())
            .await?;
        decode_json(response)
    }

    pub async fn request_multipart_json<T>(
        &self,
        method: Method,
        path: &str,
        form: Form,
    ) -> Result<ApiResponse<T>, Error>
    where
        T: DeserializeOwned,
    {
        let url = self.build_url(path)?;
        let headers = self.make_headers(&HeaderMap::new());
        let req = self
            .http
            .request(method.clone(), url.clone())
            .headers(headers)
            .multipart(form);

        debug!(%method, %url, "sending multipart request");
        let response = self.send(req).await?;
        decode_json(response)
    }

    pub async fn request_raw<B>(
        &self,
        method: Method,
        path: &str,
        query: Option<Vec<(String, String)>>,
        body: Option<&B>,
        extra_headers: HeaderMap,
    ) -> Result<ApiResponse<Bytes>, Error>
    where
        B: Serialize + ?Sized,
    {
        let body_bytes = match body {
            Some(b) => Some(serde_json::to_vec(b)?),
            None => None,
        };

        let url = self.url_with_query(path, query)?;
        let mut headers = self.make_headers(&extra_headers);
        if body_bytes.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut req = self
            .http
            .request(method.clone(), url.clone())
            .headers(headers);
        if let Some(bytes) = body_bytes {
            req = req.body(bytes);
        }

        debug!(%method, %url, "sending request");
        self.send(req).await
    }

    /// Sends once and reads the whole body under the blanket timeout, then
    /// turns non-2xx into [`HttpApiError`]. There is no retry.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<ApiResponse<Bytes>, Error> {
        let exchange = async {
            let resp = req.send().await?;
            let status = resp.status();
            let headers = resp.headers().clone();
            let body = resp.bytes().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let (status, headers, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => {
                warn!(timeout = ?self.timeout, "request timed out");
                return Err(Error::Timeout);
            }
            Ok(Err(err)) => {
                warn!(error = %err, "transport failure");
                if err.is_timeout() {
                    return Err(Error::Timeout);
                }
                return Err(Error::Transport(err));
            }
            Ok(Ok(parts)) => parts,
        };

        if status.is_success() {
            return Ok(ApiResponse {
                data: body,
                status,
                headers,
            });
        }

        let json = serde_json::from_slice::<Value>(&body).ok();
        let api_err = ApiError::new(Some(status), json);
        warn!(%status, message = %api_err.message, "request failed");
        Err(Error::Http(HttpApiError::from_status(Some(status), api_err)))
    }
}

fn decode_json<T: DeserializeOwned>(response: ApiResponse<Bytes>) -> Result<ApiResponse<T>, Error> {
    let data = serde_json::from_slice::<T>(&response.data)?;
    Ok(ApiResponse {
        data,
        status: response.status,
        headers: response.headers,
    })
}
