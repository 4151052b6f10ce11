use crate::client::{ApiResponse, Inner};
use crate::error::Error;
use crate::types::stats::StorageStats;
use reqwest::Method;
use std::sync::Arc;

#[derive(Clone)]
pub struct Stats {
    inner: Arc<Inner>,
}

impl Stats {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub async fn get(&self) -> Result<StorageStats, Error> {
        Ok(self.get_with_response().await?.data)
    }

    pub async fn get_with_response(&self) -> Result<ApiResponse<StorageStats>, Error> {
        self.inner
            .request_json(Method::GET, "/api/v1/stats", None, Option::<&()>::None)
            .await
    }
}
