// Adapters layer: HTTP implementations of the collaborator ports in domain::ports.

pub mod boundary;
pub mod catalog;
pub mod geocode;
pub mod storage;

pub use boundary::GeofabrikBoundarySource;
pub use catalog::BigQueryCatalog;
pub use geocode::GoogleGeocoder;
pub use storage::StorageListingClient;

use crate::utils::error::{LocatorError, Result};
use reqwest::{Client, Response};
use std::time::Duration;

/// 建立所有 adapter 共用的 HTTP client
pub fn http_client(timeout: Option<Duration>) -> Result<Client> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// 非 2xx 回應轉成 `MalformedResponse`
pub(crate) async fn ensure_success(source_name: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::debug!("{} returned {}: {}", source_name, status, body);
    Err(LocatorError::malformed(
        source_name,
        format!("unexpected HTTP status {}", status),
    ))
}
