//! Voxel grid partitioning
//!
//! Points are hashed into axis-aligned cubic cells of a fixed edge length.
//! The lattice is anchored at an origin chosen by [`OriginPolicy`] and cell
//! indices are derived with the rounding rule in [`CellRounding`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use surfelmap_core::{Error, IntensityPoint3f, Point3f, Result};
use tracing::debug;

/// Integer coordinates of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelKey {
    pub i: i64,
    pub j: i64,
    pub k: i64,
}

impl VoxelKey {
    pub fn new(i: i64, j: i64, k: i64) -> Self {
        Self { i, j, k }
    }
}

/// How the lattice origin is chosen
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum OriginPolicy {
    /// True per-axis minimum over all input points
    #[default]
    Minimum,
    /// Per-axis minimum of the input and zero.
    ///
    /// Reproduces scans whose running minimum started at zero: clouds that
    /// lie entirely in the positive octant keep the origin at zero.
    ZeroClamped,
    /// A caller supplied origin
    Fixed(Point3f),
}

/// Rounding applied to `(position - origin) / cell_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CellRounding {
    /// Round toward negative infinity, giving a uniform lattice on both
    /// sides of the origin
    #[default]
    Floor,
    /// Integer cast semantics. Cells `-1` and `0` merge into one double
    /// width cell around the origin.
    TruncateTowardZero,
}

/// Smallest scaled offset that still converts to an `i64` key
const KEY_LOWER_LIMIT: f32 = i64::MIN as f32;
/// Scaled offsets must stay strictly below this
const KEY_UPPER_LIMIT: f32 = -(i64::MIN as f32);

impl CellRounding {
    /// Round a scaled offset to a cell index.
    ///
    /// Finite offsets outside the `i64` range yield `None` instead of
    /// saturating, so distant cells never collapse onto one key. Non-finite
    /// offsets keep cast semantics (NaN maps to cell 0).
    fn apply(self, value: f32) -> Option<i64> {
        let rounded = match self {
            CellRounding::Floor => value.floor(),
            CellRounding::TruncateTowardZero => value.trunc(),
        };
        if rounded.is_finite() && !(KEY_LOWER_LIMIT..KEY_UPPER_LIMIT).contains(&rounded) {
            return None;
        }
        Some(rounded as i64)
    }
}

/// Axis-aligned box covering every partitioned point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBounds {
    pub min: Point3f,
    pub max: Point3f,
}

/// Points bucketed by grid cell
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cell_size: f32,
    origin: Point3f,
    rounding: CellRounding,
    bounds: Option<GridBounds>,
    cells: HashMap<VoxelKey, Vec<IntensityPoint3f>>,
}

impl Grid {
    /// Edge length of every cell
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Lattice origin the cell keys are relative to
    pub fn origin(&self) -> Point3f {
        self.origin
    }

    /// Box covering the input points, `None` for an empty grid
    pub fn bounds(&self) -> Option<GridBounds> {
        self.bounds
    }

    /// Number of non-empty cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Total number of points across all cells
    pub fn point_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Points in one cell. Unknown keys yield an empty slice.
    pub fn cell(&self, key: &VoxelKey) -> &[IntensityPoint3f] {
        self.cells.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate cells in arbitrary order
    pub fn cells(&self) -> impl Iterator<Item = (&VoxelKey, &Vec<IntensityPoint3f>)> + '_ {
        self.cells.iter()
    }

    /// Cells in ascending key order, for reproducible downstream output
    pub fn cells_sorted(&self) -> Vec<(VoxelKey, &[IntensityPoint3f])> {
        let mut cells: Vec<(VoxelKey, &[IntensityPoint3f])> = self
            .cells
            .iter()
            .map(|(key, points)| (*key, points.as_slice()))
            .collect();
        cells.sort_unstable_by_key(|(key, _)| *key);
        cells
    }

    /// Key of the cell a position falls into under this grid's lattice
    pub fn key_for(&self, position: &Point3f) -> Result<VoxelKey> {
        voxel_key(position, &self.origin, self.cell_size, self.rounding)
    }
}

/// Splits point sequences into voxel cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPartitioner {
    cell_size: f32,
    origin: OriginPolicy,
    rounding: CellRounding,
}

impl GridPartitioner {
    /// Create a partitioner with the default origin and rounding policies.
    ///
    /// # Arguments
    /// * `cell_size` - Edge length of each cubic cell, must be positive
    pub fn new(cell_size: f32) -> Result<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(Error::InvalidData(
                "cell_size must be a positive finite number".to_string(),
            ));
        }

        Ok(Self {
            cell_size,
            origin: OriginPolicy::default(),
            rounding: CellRounding::default(),
        })
    }

    pub fn with_origin(mut self, origin: OriginPolicy) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_rounding(mut self, rounding: CellRounding) -> Self {
        self.rounding = rounding;
        self
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Bucket `points` into cells.
    ///
    /// Partitioning is deterministic: the same points, cell size and policies
    /// always yield the same grid. Empty input yields an empty grid.
    ///
    /// Fails with [`Error::InvalidData`] when a point lies so far from the
    /// origin, relative to the cell size, that its cell index does not fit a
    /// [`VoxelKey`].
    pub fn partition(&self, points: &[IntensityPoint3f]) -> Result<Grid> {
        let bounds = compute_bounds(points);
        let origin = match (self.origin, bounds) {
            (OriginPolicy::Fixed(origin), _) => origin,
            (_, None) => Point3f::origin(),
            (OriginPolicy::Minimum, Some(b)) => b.min,
            (OriginPolicy::ZeroClamped, Some(b)) => {
                Point3f::new(b.min.x.min(0.0), b.min.y.min(0.0), b.min.z.min(0.0))
            }
        };

        let mut cells: HashMap<VoxelKey, Vec<IntensityPoint3f>> = HashMap::new();
        for point in points {
            let key = voxel_key(&point.position, &origin, self.cell_size, self.rounding)?;
            cells.entry(key).or_default().push(*point);
        }

        if let Some(b) = bounds {
            debug!(
                min = ?b.min,
                max = ?b.max,
                ?origin,
                cell_size = self.cell_size,
                cells = cells.len(),
                points = points.len(),
                "partitioned point cloud"
            );
        }

        Ok(Grid {
            cell_size: self.cell_size,
            origin,
            rounding: self.rounding,
            bounds,
            cells,
        })
    }
}

/// Cell key of `position` on the lattice anchored at `origin`
pub fn voxel_key(
    position: &Point3f,
    origin: &Point3f,
    cell_size: f32,
    rounding: CellRounding,
) -> Result<VoxelKey> {
    let relative = (position - origin) / cell_size;
    match (
        rounding.apply(relative.x),
        rounding.apply(relative.y),
        rounding.apply(relative.z),
    ) {
        (Some(i), Some(j), Some(k)) => Ok(VoxelKey::new(i, j, k)),
        _ => Err(Error::InvalidData(format!(
            "position {:?} is {:?} cells from the grid origin, outside the cell key range",
            position, relative
        ))),
    }
}

fn compute_bounds(points: &[IntensityPoint3f]) -> Option<GridBounds> {
    let first = points.first()?.position;
    let mut min = first;
    let mut max = first;

    for point in points {
        let p = point.position;
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        min.z = min.z.min(p.z);

        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        max.z = max.z.max(p.z);
    }

    Some(GridBounds { min, max })
}
