use crate::adapters::ensure_success;
use crate::domain::ports::BoundarySource;
use crate::utils::error::{LocatorError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

/// 從 `{base_url}/{region}/{country}.poly` 下載邊界檔
#[derive(Debug, Clone)]
pub struct GeofabrikBoundarySource {
    client: Client,
    base_url: String,
}

impl GeofabrikBoundarySource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn boundary_url(&self, region: &str, country: &str) -> Result<String> {
        for (field, value) in [("region", region), ("country", country)] {
            if value.trim().is_empty() || value.contains("..") {
                return Err(LocatorError::InvalidConfigValueError {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: "Must be a non-empty path segment".to_string(),
                });
            }
        }
        Ok(format!(
            "{}/{}/{}.poly",
            self.base_url.trim_end_matches('/'),
            region,
            country
        ))
    }
}

#[async_trait]
impl BoundarySource for GeofabrikBoundarySource {
    async fn fetch_boundary(&self, region: &str, country: &str) -> Result<String> {
        let url = self.boundary_url(region, country)?;
        tracing::info!("📥 Downloading boundary file {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(LocatorError::NotFound {
                query: format!("{}/{}", region, country),
            });
        }
        let text = ensure_success("boundary source", response).await?.text().await?;
        Ok(text)
    }
}
