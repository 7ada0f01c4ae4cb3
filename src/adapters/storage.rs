use crate::adapters::ensure_success;
use crate::domain::ports::DirectoryLister;
use crate::utils::error::{LocatorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

const SOURCE: &str = "storage listing";

/// 物件儲存 JSON API 的目錄列表，回傳每個物件的 `mediaLink`
#[derive(Debug, Clone)]
pub struct StorageListingClient {
    client: Client,
}

impl StorageListingClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_page(&self, directory_url: &str, page_token: Option<&str>) -> Result<Value> {
        let mut request = self.client.get(directory_url);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let response = ensure_success(SOURCE, request.send().await?).await?;
        Ok(response.json().await?)
    }
}

fn media_links(page: &Value) -> Result<Vec<String>> {
    let items = page
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| LocatorError::malformed(SOURCE, "'items' is missing or not a list"))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.get("mediaLink")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    LocatorError::malformed(SOURCE, format!("item {} has no 'mediaLink'", index))
                })
        })
        .collect()
}

#[async_trait]
impl DirectoryLister for StorageListingClient {
    async fn list_files(&self, directory_url: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.fetch_page(directory_url, page_token.as_deref()).await?;
            files.extend(media_links(&page)?);

            match page.get("nextPageToken").and_then(Value::as_str) {
                Some(next) if page_token.as_deref() == Some(next) => {
                    return Err(LocatorError::malformed(
                        SOURCE,
                        format!("page token '{}' repeated", next),
                    ));
                }
                Some(next) => page_token = Some(next.to_string()),
                None => break,
            }
        }

        tracing::debug!("Listed {} files in {}", files.len(), directory_url);
        Ok(files)
    }
}
