use crate::utils::error::{LocatorError, Result};
use crate::utils::validation::validate_coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// WGS84 經緯度點（度）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        validate_coordinate("latitude", latitude, -90.0, 90.0)?;
        validate_coordinate("longitude", longitude, -180.0, 180.0)?;
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hemisphere {
    North,
    South,
}

/// UTM 投影座標
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCoordinate {
    pub zone_number: u8,
    pub easting: f64,
    pub northing: f64,
    pub hemisphere: Hemisphere,
}

/// MGRS 風格的 100km 圖塊代碼，例如 `10SEG`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridTileCode {
    pub zone: u8,
    pub band: char,
    pub column: char,
    pub row: char,
}

impl fmt::Display for GridTileCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{}{}{}", self.zone, self.band, self.column, self.row)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRing {
    pub points: Vec<GeoPoint>,
}

impl BoundaryRing {
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// 經緯度矩形，`west > east` 表示跨越 180 度經線
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        validate_coordinate("north", north, -90.0, 90.0)?;
        validate_coordinate("south", south, -90.0, north)?;
        validate_coordinate("east", east, -180.0, 180.0)?;
        validate_coordinate("west", west, -180.0, 180.0)?;
        Ok(Self {
            north,
            south,
            east,
            west,
        })
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        if point.latitude < self.south || point.latitude > self.north {
            return false;
        }
        self.lng_segments()
            .iter()
            .flatten()
            .any(|(w, e)| point.longitude >= *w && point.longitude <= *e)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        if self.south > other.north || other.south > self.north {
            return false;
        }
        let mine = self.lng_segments();
        let theirs = other.lng_segments();
        mine.iter().flatten().any(|(w1, e1)| {
            theirs
                .iter()
                .flatten()
                .any(|(w2, e2)| w1 <= e2 && w2 <= e1)
        })
    }

    fn lng_segments(&self) -> [Option<(f64, f64)>; 2] {
        if self.crosses_antimeridian() {
            [Some((self.west, 180.0)), Some((-180.0, self.east))]
        } else {
            [Some((self.west, self.east)), None]
        }
    }
}

/// 覆蓋結果中的一個階層式球面格子
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoveredCell {
    pub id: u64,
    pub level: u8,
    pub bounding_box: BoundingBox,
}

impl CoveredCell {
    /// 十六進位 token，去除尾端的 0
    pub fn token(&self) -> String {
        if self.id == 0 {
            return "X".to_string();
        }
        let hex = format!("{:016x}", self.id);
        hex.trim_end_matches('0').to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTask<T> {
    pub id: usize,
    pub target: T,
}

impl<T> FetchTask<T> {
    pub fn new(id: usize, target: T) -> Self {
        Self { id, target }
    }

    /// 依輸入順序編號
    pub fn numbered(targets: impl IntoIterator<Item = T>) -> Vec<Self> {
        targets
            .into_iter()
            .enumerate()
            .map(|(id, target)| Self::new(id, target))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub reason: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome<T> {
    pub task: FetchTask<T>,
    pub result: std::result::Result<Vec<String>, TaskFailure>,
}

impl<T> FetchOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn payload(&self) -> Option<&[String]> {
        self.result.as_ref().ok().map(Vec::as_slice)
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.result.as_ref().err()
    }

    /// 失敗轉成 `LocatorError::TaskFailure`
    pub fn into_result(self) -> Result<Vec<String>> {
        self.result
            .map_err(|failure| LocatorError::TaskFailure {
                reason: failure.reason,
            })
    }
}

/// 目錄查詢的一列結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub granule_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageListing {
    pub tile_code: Option<String>,
    pub directories: usize,
    pub failed_directories: usize,
    pub files: Vec<String>,
}

impl ImageListing {
    /// 輸出平面 URL 清單；`<`、`>`、`&` 保持原樣不轉義
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.files)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaCount {
    pub cells: usize,
    pub failed_cells: usize,
    pub images: usize,
}
