//! 以有限數量的階層格子近似一個球面多邊形。
//!
//! 從與多邊形相交的立方體面開始，優先細分較大的格子，直到格子數量上限
//! 或最細層級。完全落在多邊形內或已達最細層級的格子直接成為結果。
//! 每個結果格子都與多邊形相交，且結果數量不超過 `max_cells`。

use crate::core::cell::{arc_latitude_range, edges_cross, CellId, Point3, MAX_LEVEL, NUM_FACES};
use crate::domain::model::{BoundaryRing, BoundingBox, CoveredCell};
use crate::utils::error::{LocatorError, Result};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

const HEMISPHERE_MARGIN: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverOptions {
    pub max_level: u8,
    pub max_cells: usize,
}

impl Default for CoverOptions {
    fn default() -> Self {
        Self {
            max_level: MAX_LEVEL,
            max_cells: 100,
        }
    }
}

/// 單一外環的球面多邊形（不支援洞）。
///
/// 環必須落在某個開半球內：以頂點重心為中心做 gnomonic 投影時，
/// 大圓邊會變成直線，點是否在內部就能用平面射線法判斷。
#[derive(Debug, Clone)]
pub struct SphericalLoop {
    vertices: Vec<Point3>,
    centroid: Point3,
    axis_u: Point3,
    axis_v: Point3,
    projected: Vec<(f64, f64)>,
    radius: f64,
}

impl SphericalLoop {
    pub fn from_ring(ring: &BoundaryRing) -> Result<Self> {
        if let Some(point) = ring
            .points
            .iter()
            .find(|p| !p.latitude.is_finite() || !p.longitude.is_finite())
        {
            return Err(LocatorError::DegeneratePolygon {
                reason: format!(
                    "vertex ({}, {}) is not a finite coordinate",
                    point.longitude, point.latitude
                ),
            });
        }

        let mut vertices: Vec<Point3> = Vec::with_capacity(ring.len());
        for point in &ring.points {
            let p = Point3::from_geo(point);
            if vertices.last().map_or(true, |last| last.angle(&p) > 0.0) {
                vertices.push(p);
            }
        }
        // 首尾重複的點視為同一點
        while vertices.len() > 1 && vertices[0].angle(&vertices[vertices.len() - 1]) == 0.0 {
            vertices.pop();
        }

        if vertices.len() < 3 {
            return Err(LocatorError::DegeneratePolygon {
                reason: format!("ring has {} distinct points, need at least 3", vertices.len()),
            });
        }

        let sum = vertices
            .iter()
            .fold(Point3::new(0.0, 0.0, 0.0), |acc, v| acc.add(v));
        if sum.norm() < HEMISPHERE_MARGIN {
            return Err(LocatorError::DegeneratePolygon {
                reason: "ring vertices are spread over the whole sphere".to_string(),
            });
        }
        let centroid = sum.normalize();

        if vertices.iter().any(|v| v.dot(&centroid) <= HEMISPHERE_MARGIN) {
            return Err(LocatorError::DegeneratePolygon {
                reason: "ring does not fit inside a single hemisphere".to_string(),
            });
        }

        let helper = if centroid.x.abs() < 0.9 {
            Point3::new(1.0, 0.0, 0.0)
        } else {
            Point3::new(0.0, 1.0, 0.0)
        };
        let axis_u = centroid.cross(&helper).normalize();
        let axis_v = centroid.cross(&axis_u);

        let project = |p: &Point3| {
            let d = p.dot(&centroid);
            (p.dot(&axis_u) / d, p.dot(&axis_v) / d)
        };
        let projected: Vec<(f64, f64)> = vertices.iter().map(project).collect();

        let twice_area: f64 = (0..projected.len())
            .map(|k| {
                let (x1, y1) = projected[k];
                let (x2, y2) = projected[(k + 1) % projected.len()];
                x1 * y2 - x2 * y1
            })
            .sum();
        if twice_area.abs() < 1e-18 {
            return Err(LocatorError::DegeneratePolygon {
                reason: "ring encloses no area".to_string(),
            });
        }

        let radius = vertices
            .iter()
            .map(|v| centroid.angle(v))
            .fold(0.0, f64::max);

        Ok(Self {
            vertices,
            centroid,
            axis_u,
            axis_v,
            projected,
            radius,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    fn edges(&self) -> impl Iterator<Item = (&Point3, &Point3)> {
        let n = self.vertices.len();
        (0..n).map(move |k| (&self.vertices[k], &self.vertices[(k + 1) % n]))
    }

    pub fn contains_point(&self, p: &Point3) -> bool {
        let d = p.dot(&self.centroid);
        if d <= 0.0 {
            return false;
        }
        let (px, py) = (p.dot(&self.axis_u) / d, p.dot(&self.axis_v) / d);

        let mut inside = false;
        let n = self.projected.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.projected[i];
            let (xj, yj) = self.projected[j];
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn may_touch(&self, cell: &CellId) -> bool {
        self.centroid.angle(&cell.center()) <= self.radius + cell.radius() + HEMISPHERE_MARGIN
    }

    fn crosses_cell_edges(&self, corners: &[Point3; 4]) -> bool {
        self.edges().any(|(a, b)| {
            (0..4).any(|k| edges_cross(a, b, &corners[k], &corners[(k + 1) % 4]))
        })
    }

    pub fn intersects_cell(&self, cell: &CellId) -> bool {
        if !self.may_touch(cell) {
            return false;
        }
        let corners = cell.vertices();
        corners.iter().any(|c| self.contains_point(c))
            || self.vertices.iter().any(|v| cell.contains_point(v))
            || self.crosses_cell_edges(&corners)
    }

    pub fn contains_cell(&self, cell: &CellId) -> bool {
        let corners = cell.vertices();
        corners.iter().all(|c| self.contains_point(c))
            && !self.crosses_cell_edges(&corners)
            && !self.vertices.iter().any(|v| cell.contains_point(v))
    }

    /// 含大圓邊凸出部分的經緯度外框（不處理跨 180 度經線的環）
    pub fn bounding_box(&self) -> BoundingBox {
        let mut north = f64::NEG_INFINITY;
        let mut south = f64::INFINITY;
        let mut east = f64::NEG_INFINITY;
        let mut west = f64::INFINITY;
        for (a, b) in self.edges() {
            let (lo, hi) = arc_latitude_range(a, b);
            south = south.min(lo);
            north = north.max(hi);
            east = east.max(a.longitude());
            west = west.min(a.longitude());
        }
        if self.contains_point(&Point3::NORTH_POLE) {
            north = 90.0;
        }
        if self.contains_point(&Point3::SOUTH_POLE) {
            south = -90.0;
        }
        BoundingBox {
            north,
            south,
            east,
            west,
        }
    }
}

struct Candidate {
    cell: CellId,
    /// 與多邊形相交的子格，附帶是否為終端格
    children: Vec<(CellId, bool)>,
    terminal_children: usize,
    sequence: u64,
}

impl Candidate {
    fn priority(&self) -> (Reverse<u8>, Reverse<usize>, Reverse<usize>, Reverse<u64>) {
        (
            Reverse(self.cell.level()),
            Reverse(self.children.len()),
            Reverse(self.terminal_children),
            Reverse(self.sequence),
        )
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.priority() == other.priority()
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

struct CoverState {
    result: Vec<CellId>,
    queue: BinaryHeap<Candidate>,
    sequence: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalCellCoverer {
    options: CoverOptions,
}

impl SphericalCellCoverer {
    pub fn new(options: CoverOptions) -> Result<Self> {
        if options.max_level > MAX_LEVEL {
            return Err(LocatorError::InvalidConfigValueError {
                field: "max_level".to_string(),
                value: options.max_level.to_string(),
                reason: format!("Value must be between 0 and {}", MAX_LEVEL),
            });
        }
        if options.max_cells == 0 {
            return Err(LocatorError::InvalidConfigValueError {
                field: "max_cells".to_string(),
                value: "0".to_string(),
                reason: "Value must be at least 1".to_string(),
            });
        }
        Ok(Self { options })
    }

    pub fn cover(&self, ring: &BoundaryRing) -> Result<Vec<CoveredCell>> {
        let region = SphericalLoop::from_ring(ring)?;
        let cells = self.cover_loop(&region)?;
        tracing::debug!(
            "Covered ring of {} vertices with {} cells",
            region.num_vertices(),
            cells.len()
        );
        Ok(cells
            .into_iter()
            .map(|cell| CoveredCell {
                id: cell.id(),
                level: cell.level(),
                bounding_box: cell.rect_bound(),
            })
            .collect())
    }

    /// 每個環各自覆蓋後串接，每個環的格子數各自受 `max_cells` 限制
    pub fn cover_all(&self, rings: &[BoundaryRing]) -> Result<Vec<CoveredCell>> {
        let mut cells = Vec::new();
        for ring in rings {
            cells.extend(self.cover(ring)?);
        }
        Ok(cells)
    }

    fn cover_loop(&self, region: &SphericalLoop) -> Result<Vec<CellId>> {
        let faces: Vec<CellId> = (0..NUM_FACES)
            .map(CellId::from_face)
            .filter(|face| region.intersects_cell(face))
            .collect();

        if faces.len() > self.options.max_cells {
            return Err(LocatorError::CoverageLimit {
                required: faces.len(),
                max_cells: self.options.max_cells,
            });
        }

        let mut state = CoverState {
            result: Vec::new(),
            queue: BinaryHeap::new(),
            sequence: 0,
        };
        for face in faces {
            let terminal = self.is_terminal(region, &face);
            self.add_candidate(region, face, terminal, &mut state);
        }

        // 不變量：result + queue 的數量永遠不超過 max_cells
        while let Some(candidate) = state.queue.pop() {
            let expanded_size =
                state.result.len() + state.queue.len() + candidate.children.len();
            if expanded_size <= self.options.max_cells {
                for (child, terminal) in candidate.children {
                    self.add_candidate(region, child, terminal, &mut state);
                }
            } else {
                state.result.push(candidate.cell);
            }
        }

        Ok(normalize_cells(state.result))
    }

    fn is_terminal(&self, region: &SphericalLoop, cell: &CellId) -> bool {
        cell.level() >= self.options.max_level || region.contains_cell(cell)
    }

    fn add_candidate(
        &self,
        region: &SphericalLoop,
        cell: CellId,
        terminal: bool,
        state: &mut CoverState,
    ) {
        if terminal {
            state.result.push(cell);
            return;
        }

        let children: Vec<(CellId, bool)> = cell
            .children()
            .into_iter()
            .flatten()
            .filter(|child| region.intersects_cell(child))
            .map(|child| {
                let terminal = self.is_terminal(region, &child);
                (child, terminal)
            })
            .collect();

        if children.is_empty() {
            // 只碰到格子邊界的情況，保留父格
            state.result.push(cell);
            return;
        }

        let terminal_children = children.iter().filter(|(_, terminal)| *terminal).count();
        state.sequence += 1;
        state.queue.push(Candidate {
            cell,
            children,
            terminal_children,
            sequence: state.sequence,
        });
    }
}

/// 四個子格都在集合內時以父格取代，並移除被其他格子包含的格子
fn normalize_cells(cells: Vec<CellId>) -> Vec<CellId> {
    let mut set: HashSet<CellId> = cells.into_iter().collect();
    loop {
        let complete: HashSet<CellId> = set
            .iter()
            .filter_map(CellId::parent)
            .filter(|parent| {
                parent
                    .children()
                    .is_some_and(|children| children.iter().all(|c| set.contains(c)))
            })
            .collect();
        if complete.is_empty() {
            break;
        }
        for parent in complete {
            for child in parent.children().into_iter().flatten() {
                set.remove(&child);
            }
            set.insert(parent);
        }
    }

    let mut result: Vec<CellId> = set
        .iter()
        .filter(|cell| {
            std::iter::successors(cell.parent(), CellId::parent).all(|a| !set.contains(&a))
        })
        .copied()
        .collect();
    result.sort_by_key(CellId::id);
    result
}

/// 以指定的層級與數量上限覆蓋單一環
pub fn cover(ring: &BoundaryRing, max_level: u8, max_cells: usize) -> Result<Vec<CoveredCell>> {
    SphericalCellCoverer::new(CoverOptions {
        max_level,
        max_cells,
    })?
    .cover(ring)
}
