use crate::domain::model::{BoundingBox, CatalogEntry, GeoPoint};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 影像目錄（例如 BigQuery 上的 Sentinel-2 索引表）
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn query_by_tile_code(&self, code_prefix: &str) -> Result<Vec<CatalogEntry>>;
    async fn query_by_bounding_box(&self, bbox: &BoundingBox) -> Result<Vec<CatalogEntry>>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<GeoPoint>;
}

#[async_trait]
pub trait DirectoryLister: Send + Sync {
    async fn list_files(&self, directory_url: &str) -> Result<Vec<String>>;
}

/// 邊界檔來源（`.poly` 格式文字）
#[async_trait]
pub trait BoundarySource: Send + Sync {
    async fn fetch_boundary(&self, region: &str, country: &str) -> Result<String>;
}

pub trait ConfigProvider: Send + Sync {
    fn storage_api_url(&self) -> &str;
    fn concurrency_limit(&self) -> usize;
    fn max_cover_level(&self) -> u8;
    fn max_cover_cells(&self) -> usize;
    fn strict_boundary_parsing(&self) -> bool;
}
