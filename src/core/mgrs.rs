//! 經緯度 → UTM 投影座標 → MGRS 100km 圖塊代碼。
//!
//! 純函式，無 I/O。投影使用橫麥卡托級數展開（WGS84 橢球），
//! 不處理挪威與斯瓦巴群島的特殊分區。

use crate::domain::model::{GeoPoint, GridTileCode, Hemisphere, ProjectedCoordinate};
use crate::utils::error::{LocatorError, Result};
use crate::utils::validation::validate_coordinate;

pub const MIN_LATITUDE: f64 = -80.0;
pub const MAX_LATITUDE: f64 = 84.0;

const K0: f64 = 0.9996;
const E: f64 = 0.00669438;
const E2: f64 = E * E;
const E3: f64 = E2 * E;
const E_P2: f64 = E / (1.0 - E);

const M1: f64 = 1.0 - E / 4.0 - 3.0 * E2 / 64.0 - 5.0 * E3 / 256.0;
const M2: f64 = 3.0 * E / 8.0 + 3.0 * E2 / 32.0 + 45.0 * E3 / 1024.0;
const M3: f64 = 15.0 * E2 / 256.0 + 45.0 * E3 / 1024.0;
const M4: f64 = 35.0 * E3 / 3072.0;

const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;
const SQUARE_SIZE: f64 = 100_000.0;

const BAND_LETTERS: &[u8; 20] = b"CDEFGHJKLMNPQRSTUVWX";
const E100K_LETTERS: [&[u8; 8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];
const N100K_LETTERS: [&[u8; 20]; 2] = [b"ABCDEFGHJKLMNPQRSTUV", b"FGHJKLMNPQRSTUVABCDE"];

/// 6 度分區編號；經度 180 歸入第 60 區
pub fn zone_number(longitude: f64) -> u8 {
    if longitude >= 180.0 {
        return 60;
    }
    ((longitude + 180.0) / 6.0).floor() as u8 + 1
}

fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

fn check_latitude(latitude: f64) -> Result<()> {
    validate_coordinate("latitude", latitude, MIN_LATITUDE, MAX_LATITUDE)
}

pub fn to_projected(point: &GeoPoint) -> Result<ProjectedCoordinate> {
    check_latitude(point.latitude)?;
    validate_coordinate("longitude", point.longitude, -180.0, 180.0)?;

    let zone = zone_number(point.longitude);

    let lat_rad = point.latitude.to_radians();
    let lat_sin = lat_rad.sin();
    let lat_cos = lat_rad.cos();
    let lat_tan = lat_rad.tan();
    let lat_tan2 = lat_tan * lat_tan;
    let lat_tan4 = lat_tan2 * lat_tan2;

    // 相對中央經線的經差，正規化到 [-180, 180)
    let delta_lon = (point.longitude - central_meridian(zone) + 180.0).rem_euclid(360.0) - 180.0;

    let n = EQUATORIAL_RADIUS / (1.0 - E * lat_sin * lat_sin).sqrt();
    let c = E_P2 * lat_cos * lat_cos;

    let a = lat_cos * delta_lon.to_radians();
    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let m = EQUATORIAL_RADIUS
        * (M1 * lat_rad - M2 * (2.0 * lat_rad).sin() + M3 * (4.0 * lat_rad).sin()
            - M4 * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + a3 / 6.0 * (1.0 - lat_tan2 + c)
            + a5 / 120.0 * (5.0 - 18.0 * lat_tan2 + lat_tan4 + 72.0 * c - 58.0 * E_P2))
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * lat_tan
            * (a2 / 2.0
                + a4 / 24.0 * (5.0 - lat_tan2 + 9.0 * c + 4.0 * c * c)
                + a6 / 720.0 * (61.0 - 58.0 * lat_tan2 + lat_tan4 + 600.0 * c - 330.0 * E_P2)));

    let hemisphere = if point.latitude < 0.0 {
        northing += FALSE_NORTHING_SOUTH;
        Hemisphere::South
    } else {
        Hemisphere::North
    };

    Ok(ProjectedCoordinate {
        zone_number: zone,
        easting,
        northing,
        hemisphere,
    })
}

/// 緯度帶字母；84 度落在最後一個字母 X
pub fn band(latitude: f64) -> Result<char> {
    check_latitude(latitude)?;
    let index = (((latitude - MIN_LATITUDE) / 8.0).floor() as usize).min(BAND_LETTERS.len() - 1);
    Ok(BAND_LETTERS[index] as char)
}

pub fn to_grid_tile_code(coord: &ProjectedCoordinate, band: char) -> Result<GridTileCode> {
    if !(1..=60).contains(&coord.zone_number) {
        return Err(LocatorError::out_of_range(
            "zone_number",
            coord.zone_number as f64,
            "must be between 1 and 60",
        ));
    }
    if !band.is_ascii() || !BAND_LETTERS.contains(&(band as u8)) {
        return Err(LocatorError::out_of_range(
            "band",
            band as u32 as f64,
            format!("'{}' is not a latitude band letter", band),
        ));
    }

    let zone_index = (coord.zone_number - 1) as usize;

    let column = (coord.easting / SQUARE_SIZE).floor();
    if !(1.0..=8.0).contains(&column) {
        return Err(LocatorError::out_of_range(
            "easting",
            coord.easting,
            "100km column must be between 1 and 8",
        ));
    }
    if coord.northing.is_nan() || coord.northing < 0.0 {
        return Err(LocatorError::out_of_range(
            "northing",
            coord.northing,
            "must not be negative",
        ));
    }
    let row = (coord.northing / SQUARE_SIZE).floor() as usize % 20;

    let column_letters = E100K_LETTERS[zone_index % 3];
    let row_letters = N100K_LETTERS[zone_index % 2];

    Ok(GridTileCode {
        zone: coord.zone_number,
        band,
        column: column_letters[column as usize - 1] as char,
        row: row_letters[row] as char,
    })
}

/// 點 → 圖塊代碼的完整組合
pub fn grid_tile_code(point: &GeoPoint) -> Result<GridTileCode> {
    let projected = to_projected(point)?;
    let band = band(point.latitude)?;
    to_grid_tile_code(&projected, band)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng).unwrap()
    }

    #[test]
    fn test_googleplex_projection() {
        let utm = to_projected(&point(37.4224764, -122.0842499)).unwrap();
        assert_eq!(utm.zone_number, 10);
        assert_eq!(utm.hemisphere, Hemisphere::North);
        assert!((utm.easting - 581_027.7).abs() < 1.0);
        assert!((utm.northing - 4_142_134.2).abs() < 1.0);
    }

    #[test]
    fn test_googleplex_tile_code() {
        let code = grid_tile_code(&point(37.4224764, -122.0842499)).unwrap();
        assert_eq!(code.zone, 10);
        assert_eq!(code.band, 'S');
        assert_eq!(code.to_string(), "10SEG");
    }

    #[test]
    fn test_known_city_tiles() {
        let cases = [
            ((55.6761, 12.5683), "33UUB"),
            ((-33.8688, 151.2093), "56HLH"),
            ((51.5074, -0.1278), "30UXC"),
            ((40.7128, -74.006), "18TWL"),
            ((-4.7, 27.8), "35MNQ"),
        ];
        for ((lat, lng), expected) in cases {
            assert_eq!(grid_tile_code(&point(lat, lng)).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn test_southern_hemisphere_false_northing() {
        let utm = to_projected(&point(-33.8688, 151.2093)).unwrap();
        assert_eq!(utm.hemisphere, Hemisphere::South);
        assert_eq!(utm.zone_number, 56);
        assert!(utm.northing > 6_000_000.0);
    }

    #[test]
    fn test_tile_code_is_deterministic() {
        let p = point(-6.0, -170.0);
        let first = grid_tile_code(&p).unwrap();
        let second = grid_tile_code(&p).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "02MPU");
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(band(-80.0).unwrap(), 'C');
        assert_eq!(band(84.0).unwrap(), 'X');
        assert_eq!(band(72.0).unwrap(), 'X');
        assert_eq!(band(71.999).unwrap(), 'W');
        assert_eq!(band(0.0).unwrap(), 'N');
        assert_eq!(band(-0.001).unwrap(), 'M');
    }

    #[test]
    fn test_out_of_range_latitudes() {
        for lat in [-80.0001, 84.0001, 89.0, -90.0] {
            let err = band(lat).unwrap_err();
            assert!(matches!(err, LocatorError::OutOfRange { .. }));
            let err = to_projected(&point(lat, 10.0)).unwrap_err();
            assert!(matches!(err, LocatorError::OutOfRange { .. }));
        }
    }

    #[test]
    fn test_band_edges_produce_codes() {
        assert_eq!(grid_tile_code(&point(-80.0, 0.0)).unwrap().to_string(), "31CDM");
        assert_eq!(grid_tile_code(&point(84.0, 0.0)).unwrap().to_string(), "31XDP");
    }

    #[test]
    fn test_zone_number_edges() {
        assert_eq!(zone_number(-180.0), 1);
        assert_eq!(zone_number(-174.0), 2);
        assert_eq!(zone_number(179.99), 60);
        assert_eq!(zone_number(180.0), 60);
    }

    #[test]
    fn test_zone_is_zero_padded() {
        let code = grid_tile_code(&point(-6.0, -170.0)).unwrap();
        assert!(code.to_string().starts_with("02"));
    }

    #[test]
    fn test_column_out_of_range() {
        let coord = ProjectedCoordinate {
            zone_number: 31,
            easting: 50_000.0,
            northing: 1_000.0,
            hemisphere: Hemisphere::North,
        };
        assert!(to_grid_tile_code(&coord, 'N').is_err());
    }

    #[test]
    fn test_rejects_unknown_band_letter() {
        let utm = to_projected(&point(0.5, 3.0)).unwrap();
        assert!(to_grid_tile_code(&utm, 'I').is_err());
        assert_eq!(to_grid_tile_code(&utm, 'N').unwrap().to_string(), "31NEA");
    }
}
