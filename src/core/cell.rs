//! 立方體投影的階層式球面格子。
//!
//! 球面投影到外切立方體的 6 個面上，每個面以四分樹細分到第 30 層。
//! (u, v) 為面上的 gnomonic 座標，(s, t) 經過二次轉換讓格子面積較平均。
//! 格子的邊都是大圓弧。

use crate::domain::model::{BoundingBox, GeoPoint};

pub const MAX_LEVEL: u8 = 30;
pub const NUM_FACES: u8 = 6;

const POS_BITS: u32 = 61;
const EPSILON: f64 = 1e-15;
const LNG_TOLERANCE: f64 = 1e-9;

/// 單位向量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const NORTH_POLE: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };
    pub const SOUTH_POLE: Point3 = Point3 {
        x: 0.0,
        y: 0.0,
        z: -1.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn from_degrees(latitude: f64, longitude: f64) -> Self {
        let lat = latitude.to_radians();
        let lng = longitude.to_radians();
        Self::new(lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin())
    }

    pub fn from_geo(point: &GeoPoint) -> Self {
        Self::from_degrees(point.latitude, point.longitude)
    }

    pub fn dot(&self, other: &Point3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Point3) -> Point3 {
        Point3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalize(&self) -> Point3 {
        let n = self.norm();
        if n == 0.0 {
            return *self;
        }
        Point3::new(self.x / n, self.y / n, self.z / n)
    }

    pub fn neg(&self) -> Point3 {
        Point3::new(-self.x, -self.y, -self.z)
    }

    pub fn add(&self, other: &Point3) -> Point3 {
        Point3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// 兩點夾角（弧度）
    pub fn angle(&self, other: &Point3) -> f64 {
        self.cross(other).norm().atan2(self.dot(other))
    }

    pub fn latitude(&self) -> f64 {
        self.z.atan2(self.x.hypot(self.y)).to_degrees()
    }

    pub fn longitude(&self) -> f64 {
        self.y.atan2(self.x).to_degrees()
    }
}

/// 兩條大圓弧 AB、CD 是否在內部相交（端點相碰不算）
pub fn edges_cross(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> bool {
    let ab = a.cross(b);
    let acb = -ab.dot(c);
    let bda = ab.dot(d);
    if acb * bda <= 0.0 {
        return false;
    }
    let cd = c.cross(d);
    let cbd = -cd.dot(b);
    let dac = cd.dot(a);
    acb * cbd > 0.0 && acb * dac > 0.0
}

/// 大圓弧 AB 上的緯度範圍（度），含弧中段往極區凸出的部分
pub fn arc_latitude_range(a: &Point3, b: &Point3) -> (f64, f64) {
    let mut lo = a.latitude().min(b.latitude());
    let mut hi = a.latitude().max(b.latitude());

    let n = a.cross(b);
    if n.norm() < EPSILON {
        return (lo, hi);
    }
    let n = n.normalize();
    // 大圓上 z 最大的點
    let top = Point3::new(-n.z * n.x, -n.z * n.y, 1.0 - n.z * n.z);
    if top.norm() < EPSILON {
        return (lo, hi);
    }
    let top = top.normalize();
    for extreme in [top, top.neg()] {
        if a.cross(&extreme).dot(&n) > 0.0 && extreme.cross(b).dot(&n) > 0.0 {
            let lat = extreme.latitude();
            lo = lo.min(lat);
            hi = hi.max(lat);
        }
    }
    (lo, hi)
}

fn st_to_uv(s: f64) -> f64 {
    if s >= 0.5 {
        (4.0 * s * s - 1.0) / 3.0
    } else {
        (1.0 - 4.0 * (1.0 - s) * (1.0 - s)) / 3.0
    }
}

fn uv_to_st(u: f64) -> f64 {
    if u >= 0.0 {
        0.5 * (1.0 + 3.0 * u).sqrt()
    } else {
        1.0 - 0.5 * (1.0 - 3.0 * u).sqrt()
    }
}

fn face_uv_to_xyz(face: u8, u: f64, v: f64) -> Point3 {
    match face {
        0 => Point3::new(1.0, u, v),
        1 => Point3::new(-u, 1.0, v),
        2 => Point3::new(-u, -v, 1.0),
        3 => Point3::new(-1.0, -v, -u),
        4 => Point3::new(v, -1.0, -u),
        _ => Point3::new(v, u, -1.0),
    }
}

/// 以指定面投影；點不在該面的半球時回傳 None
fn face_xyz_to_uv(face: u8, p: &Point3) -> Option<(f64, f64)> {
    let (axis, u, v) = match face {
        0 => (p.x, p.y / p.x, p.z / p.x),
        1 => (p.y, -p.x / p.y, p.z / p.y),
        2 => (p.z, -p.x / p.z, -p.y / p.z),
        3 => (-p.x, p.z / p.x, p.y / p.x),
        4 => (-p.y, p.z / p.y, -p.x / p.y),
        _ => (-p.z, -p.y / p.z, -p.x / p.z),
    };
    if axis <= 0.0 {
        return None;
    }
    Some((u, v))
}

/// 點所在的面：絕對值最大的座標軸
pub fn face_of(p: &Point3) -> u8 {
    let (ax, ay, az) = (p.x.abs(), p.y.abs(), p.z.abs());
    let (axis, component) = if ax >= ay && ax >= az {
        (0, p.x)
    } else if ay >= az {
        (1, p.y)
    } else {
        (2, p.z)
    };
    if component < 0.0 {
        axis + 3
    } else {
        axis
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    face: u8,
    level: u8,
    i: u32,
    j: u32,
}

impl CellId {
    pub fn from_face(face: u8) -> Self {
        Self {
            face: face % NUM_FACES,
            level: 0,
            i: 0,
            j: 0,
        }
    }

    /// 包含該點、位於指定層級的格子
    pub fn from_point(p: &Point3, level: u8) -> Self {
        let level = level.min(MAX_LEVEL);
        let face = face_of(p);
        let (u, v) = face_xyz_to_uv(face, p).unwrap_or((0.0, 0.0));
        let size = (1u64 << level) as f64;
        let max_index = (1u64 << level) - 1;
        let to_index = |st: f64| ((st * size).floor().max(0.0) as u64).min(max_index) as u32;
        Self {
            face,
            level,
            i: to_index(uv_to_st(u)),
            j: to_index(uv_to_st(v)),
        }
    }

    pub fn face(&self) -> u8 {
        self.face
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_leaf(&self) -> bool {
        self.level >= MAX_LEVEL
    }

    /// 64 位元識別碼：3 位元面編號、2*level 位元的 Z 序位置，接一個結尾 1 位元
    pub fn id(&self) -> u64 {
        let mut position = 0u64;
        for bit in 0..self.level as u32 {
            position |= (((self.i >> bit) & 1) as u64) << (2 * bit + 1);
            position |= (((self.j >> bit) & 1) as u64) << (2 * bit);
        }
        let shift = POS_BITS - 2 * self.level as u32;
        ((self.face as u64) << POS_BITS) | (position << shift) | (1u64 << (shift - 1))
    }

    pub fn parent(&self) -> Option<CellId> {
        if self.level == 0 {
            return None;
        }
        Some(CellId {
            face: self.face,
            level: self.level - 1,
            i: self.i >> 1,
            j: self.j >> 1,
        })
    }

    pub fn children(&self) -> Option<[CellId; 4]> {
        if self.is_leaf() {
            return None;
        }
        let child = |di: u32, dj: u32| CellId {
            face: self.face,
            level: self.level + 1,
            i: (self.i << 1) | di,
            j: (self.j << 1) | dj,
        };
        Some([child(0, 0), child(1, 0), child(1, 1), child(0, 1)])
    }

    pub fn contains(&self, other: &CellId) -> bool {
        if self.face != other.face || self.level > other.level {
            return false;
        }
        let shift = other.level - self.level;
        other.i >> shift == self.i && other.j >> shift == self.j
    }

    fn st_bounds(&self) -> (f64, f64, f64, f64) {
        let size = (1u64 << self.level) as f64;
        (
            self.i as f64 / size,
            (self.i as f64 + 1.0) / size,
            self.j as f64 / size,
            (self.j as f64 + 1.0) / size,
        )
    }

    fn vertex_at(&self, s: f64, t: f64) -> Point3 {
        face_uv_to_xyz(self.face, st_to_uv(s), st_to_uv(t)).normalize()
    }

    /// 逆時針的四個頂點
    pub fn vertices(&self) -> [Point3; 4] {
        let (s0, s1, t0, t1) = self.st_bounds();
        [
            self.vertex_at(s0, t0),
            self.vertex_at(s1, t0),
            self.vertex_at(s1, t1),
            self.vertex_at(s0, t1),
        ]
    }

    pub fn center(&self) -> Point3 {
        let (s0, s1, t0, t1) = self.st_bounds();
        self.vertex_at((s0 + s1) / 2.0, (t0 + t1) / 2.0)
    }

    /// 中心到最遠頂點的夾角（弧度）
    pub fn radius(&self) -> f64 {
        let center = self.center();
        self.vertices()
            .iter()
            .map(|v| center.angle(v))
            .fold(0.0, f64::max)
    }

    /// 閉區間判斷，邊界上的點也算在內
    pub fn contains_point(&self, p: &Point3) -> bool {
        let Some((u, v)) = face_xyz_to_uv(self.face, p) else {
            return false;
        };
        let (s0, s1, t0, t1) = self.st_bounds();
        let s = uv_to_st(u);
        let t = uv_to_st(v);
        s >= s0 - EPSILON && s <= s1 + EPSILON && t >= t0 - EPSILON && t <= t1 + EPSILON
    }

    /// 包住整個格子的最小經緯度矩形
    pub fn rect_bound(&self) -> BoundingBox {
        let vertices = self.vertices();

        let mut south = f64::INFINITY;
        let mut north = f64::NEG_INFINITY;
        for k in 0..4 {
            let (lo, hi) = arc_latitude_range(&vertices[k], &vertices[(k + 1) % 4]);
            south = south.min(lo);
            north = north.max(hi);
        }

        let has_north_pole = self.contains_point(&Point3::NORTH_POLE);
        let has_south_pole = self.contains_point(&Point3::SOUTH_POLE);
        if has_north_pole {
            north = 90.0;
        }
        if has_south_pole {
            south = -90.0;
        }
        if has_north_pole || has_south_pole {
            return BoundingBox {
                north,
                south,
                east: 180.0,
                west: -180.0,
            };
        }

        // 經度沿著不經過極點的大圓弧單調變化，頂點即可決定範圍
        let center_lng = self.center().longitude();
        let mut min_delta = f64::INFINITY;
        let mut max_delta = f64::NEG_INFINITY;
        for vertex in &vertices {
            let delta = wrap_degrees(vertex.longitude() - center_lng);
            min_delta = min_delta.min(delta);
            max_delta = max_delta.max(delta);
        }

        if max_delta - min_delta >= 360.0 {
            return BoundingBox {
                north,
                south,
                east: 180.0,
                west: -180.0,
            };
        }

        let mut east = center_lng + max_delta;
        let mut west = center_lng + min_delta;
        if east > 180.0 + LNG_TOLERANCE {
            east -= 360.0;
        }
        if west < -180.0 - LNG_TOLERANCE {
            west += 360.0;
        }

        BoundingBox {
            north: north.min(90.0),
            south: south.max(-90.0),
            east: east.clamp(-180.0, 180.0),
            west: west.clamp(-180.0, 180.0),
        }
    }
}

/// 正規化到 [-180, 180]
fn wrap_degrees(degrees: f64) -> f64 {
    if (-180.0..=180.0).contains(&degrees) {
        return degrees;
    }
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_round_trip_for_axes() {
        assert_eq!(face_of(&Point3::new(1.0, 0.0, 0.0)), 0);
        assert_eq!(face_of(&Point3::new(0.0, 1.0, 0.0)), 1);
        assert_eq!(face_of(&Point3::NORTH_POLE), 2);
        assert_eq!(face_of(&Point3::new(-1.0, 0.0, 0.0)), 3);
        assert_eq!(face_of(&Point3::new(0.0, -1.0, 0.0)), 4);
        assert_eq!(face_of(&Point3::SOUTH_POLE), 5);
    }

    #[test]
    fn test_st_uv_are_inverse() {
        for s in [0.0, 0.1, 0.25, 0.5, 0.77, 1.0] {
            assert!((uv_to_st(st_to_uv(s)) - s).abs() < 1e-12);
        }
    }

    #[test]
    fn test_from_point_contains_point() {
        let p = Point3::from_degrees(55.6761, 12.5683);
        for level in [0, 5, 12, 20, 30] {
            let cell = CellId::from_point(&p, level);
            assert_eq!(cell.level(), level);
            assert!(cell.contains_point(&p), "level {level}");
        }
    }

    #[test]
    fn test_children_are_contained_and_distinct() {
        let parent = CellId::from_point(&Point3::from_degrees(10.0, 20.0), 7);
        let children = parent.children().unwrap();
        for child in &children {
            assert!(parent.contains(child));
            assert_eq!(child.parent(), Some(parent));
            assert!(parent.contains_point(&child.center()));
        }
        let mut ids: Vec<u64> = children.iter().map(CellId::id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_ids_are_hierarchical() {
        let leaf = CellId::from_point(&Point3::from_degrees(-33.0, 151.0), MAX_LEVEL);
        assert!(leaf.children().is_none());
        assert_eq!(leaf.id() & 1, 1);

        let face = CellId::from_face(3);
        assert_eq!(face.id(), (3u64 << 61) | (1u64 << 60));
        assert!(face.parent().is_none());
    }

    #[test]
    fn test_face_zero_bound() {
        let rect = CellId::from_face(0).rect_bound();
        assert!((rect.west + 45.0).abs() < 1e-9);
        assert!((rect.east - 45.0).abs() < 1e-9);
        // top edge bulges to 45 degrees at the central meridian
        assert!((rect.north - 45.0).abs() < 1e-9);
        assert!((rect.south + 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_polar_face_bound_is_full_longitude() {
        let rect = CellId::from_face(2).rect_bound();
        assert_eq!(rect.north, 90.0);
        assert_eq!(rect.west, -180.0);
        assert_eq!(rect.east, 180.0);
        assert!(rect.south > 35.0 && rect.south < 36.0);
    }

    #[test]
    fn test_rect_bound_encloses_cell_points() {
        let cell = CellId::from_point(&Point3::from_degrees(48.85, 2.35), 9);
        let rect = cell.rect_bound();
        let center = cell.center();
        let geo = GeoPoint {
            latitude: center.latitude(),
            longitude: center.longitude(),
        };
        assert!(rect.contains(&geo));
        for v in cell.vertices() {
            assert!(v.latitude() <= rect.north + 1e-9);
            assert!(v.latitude() >= rect.south - 1e-9);
        }
    }

    #[test]
    fn test_antimeridian_cell_bound_wraps() {
        let rect = CellId::from_face(3).rect_bound();
        assert!(rect.crosses_antimeridian());
        assert!((rect.west - 135.0).abs() < 1e-9);
        assert!((rect.east + 135.0).abs() < 1e-9);

        // below the face level the 180th meridian is a cell boundary
        let cell = CellId::from_point(&Point3::from_degrees(0.5, 179.99), 4);
        let rect = cell.rect_bound();
        assert!(!rect.crosses_antimeridian());
        assert!((rect.east - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_edges_cross() {
        let a = Point3::from_degrees(0.0, -1.0);
        let b = Point3::from_degrees(0.0, 1.0);
        let c = Point3::from_degrees(-1.0, 0.0);
        let d = Point3::from_degrees(1.0, 0.0);
        assert!(edges_cross(&a, &b, &c, &d));
        let e = Point3::from_degrees(1.0, 2.0);
        let f = Point3::from_degrees(-1.0, 2.0);
        assert!(!edges_cross(&a, &b, &e, &f));
    }

    #[test]
    fn test_arc_latitude_bulge() {
        let a = Point3::from_degrees(60.0, -30.0);
        let b = Point3::from_degrees(60.0, 30.0);
        let (lo, hi) = arc_latitude_range(&a, &b);
        assert!((lo - 60.0).abs() < 1e-9);
        assert!(hi > 60.0);
    }
}
