//! Contour lines via Marching Squares.
//!
//! Every 2×2 quad of cell values is classified into a 4-bit case from the
//! corners at or above the threshold (`tl = 8, tr = 4, br = 2, bl = 1`) and
//! looked up in a fixed table of edge pairs. Crossing positions are linearly
//! interpolated along each edge. Segments are emitted per quad and are not
//! stitched into polylines.
//!
//! Saddle cases 5 and 10 always use the same pairing; the centre value is
//! never consulted, so an ambiguous quad can split differently from its
//! asymptotic-decider interpretation.

#[cfg(feature = "threading")]
use rayon::prelude::*;
use log::debug;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::{Result, TerrainError};
use crate::grid::{ElevationGrid, Raster};
use crate::params::ContourParams;

/// Refuse requests that would produce more levels than this.
pub const MAX_LEVELS: usize = 10_000;

/// Every n-th multiple of the interval is a major contour.
pub const MAJOR_EVERY: i64 = 5;

/// Largest level index that `f64` still represents exactly (2^53).
const MAX_EXACT_INDEX: f64 = 9_007_199_254_740_992.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// All segments of one elevation level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourLevel {
    pub level: f64,
    pub major: bool,
    pub segments: Vec<Segment>,
}

/// Unordered contour segments grouped by level, ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContourSet {
    pub interval: f64,
    pub levels: Vec<ContourLevel>,
}

impl ContourSet {
    /// Flattened `(level, segment)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (f64, &Segment)> + '_ {
        self.levels
            .iter()
            .flat_map(|l| l.segments.iter().map(move |s| (l.level, s)))
    }

    pub fn segment_count(&self) -> usize {
        self.levels.iter().map(|l| l.segments.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segment_count() == 0
    }

    /// GeoJSON `FeatureCollection` with one `MultiLineString` per level.
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self
            .levels
            .iter()
            .filter(|l| !l.segments.is_empty())
            .map(|l| {
                let lines: Vec<Value> = l
                    .segments
                    .iter()
                    .map(|s| json!([[s.start.x, s.start.y], [s.end.x, s.end.y]]))
                    .collect();
                json!({
                    "type": "Feature",
                    "properties": { "elevation": l.level, "major": l.major },
                    "geometry": { "type": "MultiLineString", "coordinates": lines },
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }
}

// ── Case table ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuadCase {
    Empty,
    One(Edge, Edge),
    /// Ambiguous saddle: two disjoint segments.
    Two((Edge, Edge), (Edge, Edge)),
}

use Edge::{Bottom, Left, Right, Top};

/// Indexed by `tl·8 | tr·4 | br·2 | bl·1`.
const CASES: [QuadCase; 16] = [
    QuadCase::Empty,                               // 0
    QuadCase::One(Left, Bottom),                   // 1
    QuadCase::One(Bottom, Right),                  // 2
    QuadCase::One(Left, Right),                    // 3
    QuadCase::One(Top, Right),                     // 4
    QuadCase::Two((Left, Top), (Bottom, Right)),   // 5
    QuadCase::One(Top, Bottom),                    // 6
    QuadCase::One(Left, Top),                      // 7
    QuadCase::One(Left, Top),                      // 8
    QuadCase::One(Top, Bottom),                    // 9
    QuadCase::Two((Top, Right), (Left, Bottom)),   // 10
    QuadCase::One(Top, Right),                     // 11
    QuadCase::One(Left, Right),                    // 12
    QuadCase::One(Bottom, Right),                  // 13
    QuadCase::One(Left, Bottom),                   // 14
    QuadCase::Empty,                               // 15
];

/// Corner values of the quad whose top-left cell is `(row, col)`.
#[derive(Debug, Clone, Copy)]
struct Quad {
    row: f64,
    col: f64,
    tl: f64,
    tr: f64,
    br: f64,
    bl: f64,
}

impl Quad {
    fn case(&self, threshold: f64) -> usize {
        let bit = |v: f64, w: usize| if v >= threshold { w } else { 0 };
        bit(self.tl, 8) | bit(self.tr, 4) | bit(self.br, 2) | bit(self.bl, 1)
    }

    /// Crossing point on `edge` in fractional `(col, row)` grid coordinates.
    fn crossing(&self, edge: Edge, threshold: f64) -> (f64, f64) {
        let (r, c) = (self.row, self.col);
        match edge {
            Top => (c + frac(self.tl, self.tr, threshold), r),
            Right => (c + 1.0, r + frac(self.tr, self.br, threshold)),
            Bottom => (c + frac(self.bl, self.br, threshold), r + 1.0),
            Left => (c, r + frac(self.tl, self.bl, threshold)),
        }
    }

    fn segments(&self, threshold: f64, out: &mut Vec<((f64, f64), (f64, f64))>) {
        let mut emit = |(a, b): (Edge, Edge)| {
            out.push((self.crossing(a, threshold), self.crossing(b, threshold)));
        };
        match CASES[self.case(threshold)] {
            QuadCase::Empty => {}
            QuadCase::One(a, b) => emit((a, b)),
            QuadCase::Two(first, second) => {
                emit(first);
                emit(second);
            }
        }
    }
}

/// Position of `threshold` between `v1` and `v2`, as a fraction of the edge.
#[inline]
fn frac(v1: f64, v2: f64, threshold: f64) -> f64 {
    if v1 == v2 {
        0.5
    } else {
        (threshold - v1) / (v2 - v1)
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Segments for a single threshold, in the grid's geographic space.
///
/// Cell `(row, col)` is placed at `(min_x + col·cell_x, max_y − row·cell_y)`,
/// the cell's north-west corner. The renderer samples values at cell centres,
/// so overlaid on a rendering of the same grid the lines sit half a cell to
/// the north-west.
pub fn march_level(grid: &ElevationGrid, threshold: f64) -> Vec<Segment> {
    let (w, h) = (grid.width(), grid.height());
    if w < 2 || h < 2 {
        return Vec::new();
    }
    let extent = grid.extent();
    let (cell_x, cell_y) = grid.cell_size();
    let to_geo = |(col, row): (f64, f64)| Point {
        x: extent.min_x + col * cell_x,
        y: extent.max_y - row * cell_y,
    };

    let mut raw = Vec::new();
    for r in 0..h - 1 {
        for c in 0..w - 1 {
            let corners = [
                grid.value(r, c),
                grid.value(r, c + 1),
                grid.value(r + 1, c + 1),
                grid.value(r + 1, c),
            ];
            let [Some(tl), Some(tr), Some(br), Some(bl)] = corners else {
                continue;
            };
            let quad = Quad {
                row: r as f64,
                col: c as f64,
                tl: tl as f64,
                tr: tr as f64,
                br: br as f64,
                bl: bl as f64,
            };
            quad.segments(threshold, &mut raw);
        }
    }

    raw.into_iter()
        .map(|(a, b)| Segment { start: to_geo(a), end: to_geo(b) })
        .collect()
}

/// Contours at every multiple of `interval` inside the elevation window.
///
/// The window defaults to the grid's observed range; `min_elevation` and
/// `max_elevation` narrow or widen it. Levels are `k · interval` for integer
/// `k` from `ceil(min / interval)` to `floor(max / interval)`; those with `k`
/// divisible by five are major.
pub fn contours(grid: &ElevationGrid, params: &ContourParams) -> Result<ContourSet> {
    let interval = params.interval;
    if !interval.is_finite() || interval <= 0.0 {
        return Err(TerrainError::precondition(format!(
            "contour interval must be positive, got {interval}"
        )));
    }

    for (name, bound) in [("min_elevation", params.min_elevation), ("max_elevation", params.max_elevation)] {
        if let Some(v) = bound.filter(|v| !v.is_finite()) {
            return Err(TerrainError::precondition(format!("{name} must be finite, got {v}")));
        }
    }

    let empty = ContourSet { interval, levels: Vec::new() };
    let Some((observed_min, observed_max)) = grid.range() else {
        return Ok(empty);
    };
    let min = params.min_elevation.unwrap_or(observed_min as f64);
    let max = params.max_elevation.unwrap_or(observed_max as f64);
    if !(min <= max) {
        return Ok(empty);
    }

    // Bounded in f64 before any integer cast; k must stay exact in both.
    let k_lo = (min / interval).ceil();
    let k_hi = (max / interval).floor();
    if k_hi < k_lo {
        return Ok(empty);
    }
    let count = k_hi - k_lo + 1.0;
    if !(count <= MAX_LEVELS as f64) {
        return Err(TerrainError::precondition(format!(
            "interval {interval} over [{min}, {max}] yields {count} levels (limit {MAX_LEVELS})"
        )));
    }
    if k_lo.abs() > MAX_EXACT_INDEX || k_hi.abs() > MAX_EXACT_INDEX {
        return Err(TerrainError::precondition(format!(
            "levels over [{min}, {max}] are too far from zero for interval {interval}"
        )));
    }
    let (k_min, k_max) = (k_lo as i64, k_hi as i64);

    let ks: Vec<i64> = (k_min..=k_max).collect();
    let extract = |&k: &i64| {
        let level = k as f64 * interval;
        ContourLevel { level, major: k % MAJOR_EVERY == 0, segments: march_level(grid, level) }
    };

    #[cfg(feature = "threading")]
    let levels: Vec<ContourLevel> = ks.par_iter().map(extract).collect();
    #[cfg(not(feature = "threading"))]
    let levels: Vec<ContourLevel> = ks.iter().map(extract).collect();

    let set = ContourSet { interval, levels };
    debug!(
        "contours: {} levels, {} segments at interval {interval}",
        set.levels.len(),
        set.segment_count()
    );
    Ok(set)
}
