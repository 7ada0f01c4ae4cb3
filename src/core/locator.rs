//! 影像查詢流程：點、地址、經緯度矩形、多邊形與具名區域。

use crate::core::coverer::{CoverOptions, SphericalCellCoverer};
use crate::core::fanout::{require_any_success, FanoutFetcher};
use crate::core::mgrs;
use crate::core::poly::{NumericPolicy, PolyParser};
use crate::domain::model::{
    AreaCount, BoundingBox, CatalogEntry, FetchOutcome, FetchTask, GeoPoint, GridTileCode,
    ImageListing,
};
use crate::domain::ports::{BoundarySource, Catalog, ConfigProvider, DirectoryLister, Geocoder};
use crate::utils::error::{LocatorError, Result};
use std::sync::Arc;

/// 將目錄列轉成儲存服務的列表 URL：
/// `{storage_api_url}{bucket 內路徑}/GRANULE/{granule_id}/IMG_DATA/`
pub fn directory_url(storage_api_url: &str, entry: &CatalogEntry) -> Result<String> {
    let relative = entry
        .base_url
        .strip_prefix("gs://")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_bucket, path)| path.trim_end_matches('/'))
        .filter(|path| !path.is_empty())
        .ok_or_else(|| {
            LocatorError::malformed(
                "catalog",
                format!("base_url '{}' is not a gs://<bucket>/<path> URL", entry.base_url),
            )
        })?;

    Ok(format!(
        "{}{}/GRANULE/{}/IMG_DATA/",
        storage_api_url, relative, entry.granule_id
    ))
}

pub struct ImageLocator {
    catalog: Arc<dyn Catalog>,
    geocoder: Arc<dyn Geocoder>,
    lister: Arc<dyn DirectoryLister>,
    boundaries: Option<Arc<dyn BoundarySource>>,
    fetcher: FanoutFetcher,
    coverer: SphericalCellCoverer,
    parser: PolyParser,
    storage_api_url: String,
}

impl ImageLocator {
    pub fn new(
        config: &dyn ConfigProvider,
        catalog: Arc<dyn Catalog>,
        geocoder: Arc<dyn Geocoder>,
        lister: Arc<dyn DirectoryLister>,
    ) -> Result<Self> {
        let fetcher = FanoutFetcher::new(config.concurrency_limit())?;
        let coverer = SphericalCellCoverer::new(CoverOptions {
            max_level: config.max_cover_level(),
            max_cells: config.max_cover_cells(),
        })?;
        let parser = PolyParser::with_policy(if config.strict_boundary_parsing() {
            NumericPolicy::Strict
        } else {
            NumericPolicy::Lenient
        });

        Ok(Self {
            catalog,
            geocoder,
            lister,
            boundaries: None,
            fetcher,
            coverer,
            parser,
            storage_api_url: config.storage_api_url().to_string(),
        })
    }

    pub fn with_boundary_source(mut self, source: Arc<dyn BoundarySource>) -> Self {
        self.boundaries = Some(source);
        self
    }

    pub fn fetcher(&self) -> &FanoutFetcher {
        &self.fetcher
    }

    pub fn tile_code_for(&self, point: &GeoPoint) -> Result<GridTileCode> {
        mgrs::grid_tile_code(point)
    }

    pub async fn images_at_point(&self, point: &GeoPoint) -> Result<ImageListing> {
        let code = self.tile_code_for(point)?.to_string();
        tracing::info!(
            "📍 ({}, {}) is in tile {}",
            point.latitude,
            point.longitude,
            code
        );

        let entries = self.catalog.query_by_tile_code(&code).await?;
        let mut listing = self.list_entries(&entries).await?;
        listing.tile_code = Some(code);
        Ok(listing)
    }

    pub async fn images_at_address(&self, address: &str) -> Result<ImageListing> {
        let point = self.geocoder.geocode(address).await?;
        tracing::info!(
            "🗺️ Geocoded '{}' to ({}, {})",
            address,
            point.latitude,
            point.longitude
        );
        self.images_at_point(&point).await
    }

    pub async fn images_in_area(&self, bbox: &BoundingBox) -> Result<ImageListing> {
        let entries = self.catalog.query_by_bounding_box(bbox).await?;
        self.list_entries(&entries).await
    }

    /// 多邊形內的影像目錄數。每個覆蓋格子各做一次矩形查詢，部分格子失敗時仍回傳其餘總數
    pub async fn image_count_in_polygon(&self, poly_text: &str) -> Result<AreaCount> {
        let rings = self.parser.parse(poly_text)?;
        let cells = self.coverer.cover_all(&rings)?;
        tracing::info!(
            "🧩 Covered {} rings with {} cells",
            rings.len(),
            cells.len()
        );

        for cell in &cells {
            tracing::debug!("Cell {} at level {}", cell.token(), cell.level);
        }

        let tasks = FetchTask::numbered(cells.into_iter().map(|cell| cell.bounding_box));
        let catalog = self.catalog.clone();
        let storage_api_url = self.storage_api_url.clone();
        let outcomes = self
            .fetcher
            .run(tasks, move |bbox: BoundingBox| {
                let catalog = catalog.clone();
                let storage_api_url = storage_api_url.clone();
                async move {
                    catalog
                        .query_by_bounding_box(&bbox)
                        .await?
                        .iter()
                        .map(|entry| directory_url(&storage_api_url, entry))
                        .collect::<Result<Vec<String>>>()
                }
            })
            .await;
        require_any_success(&outcomes)?;

        let count = AreaCount {
            cells: outcomes.len(),
            failed_cells: outcomes.iter().filter(|o| !o.is_success()).count(),
            images: outcomes
                .iter()
                .filter_map(FetchOutcome::payload)
                .map(<[String]>::len)
                .sum(),
        };
        tracing::info!("📊 {} images across {} cells", count.images, count.cells);
        Ok(count)
    }

    pub async fn image_count_in_region(&self, region: &str, country: &str) -> Result<AreaCount> {
        let source = self.boundaries.as_ref().ok_or_else(|| LocatorError::MissingConfigError {
            field: "boundary_base_url".to_string(),
        })?;
        let text = source.fetch_boundary(region, country).await?;
        self.image_count_in_polygon(&text).await
    }

    async fn list_entries(&self, entries: &[CatalogEntry]) -> Result<ImageListing> {
        tracing::debug!("Listing {} directories", entries.len());

        // 無法轉成目錄 URL 的列只讓自己的任務失敗
        let lister = self.lister.clone();
        let storage_api_url = self.storage_api_url.clone();
        let outcomes = self
            .fetcher
            .run(
                FetchTask::numbered(entries.iter().cloned()),
                move |entry: CatalogEntry| {
                    let lister = lister.clone();
                    let storage_api_url = storage_api_url.clone();
                    async move {
                        let url = directory_url(&storage_api_url, &entry)?;
                        lister.list_files(&url).await
                    }
                },
            )
            .await;
        require_any_success(&outcomes)?;

        let directories = outcomes.len();
        let mut failed = 0;
        let mut files = Vec::new();
        for outcome in outcomes {
            match outcome.into_result() {
                Ok(payload) => files.extend(payload),
                Err(e) => {
                    failed += 1;
                    tracing::debug!("Skipping directory ({:?}): {}", e.category(), e);
                }
            }
        }

        Ok(ImageListing {
            tile_code: None,
            directories,
            failed_directories: failed,
            files,
        })
    }
}
