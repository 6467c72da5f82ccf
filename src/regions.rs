use serde::Serialize;

use crate::buffer::BinaryMask;
use crate::errors::{AgroScanError, Result};

/// Minimum number of on-pixels a mask needs before region extraction is
/// worth running; heads short-circuit below this with a zero result.
pub const MIN_VEGETATION_PIXELS: u64 = 100;

/// What a connected patch of mask-true pixels represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Canopy,
    Chlorosis,
    Necrosis,
    TextureAnomaly,
}

impl RegionKind {
    pub fn label(&self) -> &'static str {
        match self {
            RegionKind::Canopy => "canopy",
            RegionKind::Chlorosis => "chlorosis",
            RegionKind::Necrosis => "necrosis",
            RegionKind::TextureAnomaly => "texture_anomaly",
        }
    }
}

/// A connected region extracted from a binary mask.
///
/// Coordinates are in the resolution of the original buffer (rescaled when
/// extraction ran on a downscaled copy). Ids are assigned in area-descending
/// order and are stable only within one extraction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub id: u32,
    pub kind: RegionKind,
    /// Centroid (x, y).
    pub center: (u32, u32),
    pub area_pixels: u32,
    /// (x_min, y_min, x_max, y_max), inclusive, contained in image bounds.
    pub bbox: (u32, u32, u32, u32),
}

/// Area bounds and caps applied to extracted regions.
#[derive(Debug, Clone)]
pub struct RegionFilter {
    /// Minimum region area in original-resolution pixels.
    pub min_area: u32,
    /// Maximum region area in original-resolution pixels; `None` = unbounded.
    pub max_area: Option<u32>,
    /// Keep at most this many regions (largest first).
    pub max_regions: usize,
    /// Scale factor the mask was downscaled by (1.0 = full resolution).
    /// Region coordinates are rescaled back by this factor.
    pub scale: f32,
}

impl RegionFilter {
    pub fn new(min_area: u32, max_area: Option<u32>, max_regions: usize) -> Self {
        Self {
            min_area,
            max_area,
            max_regions,
            scale: 1.0,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min_area == 0 {
            return Err(AgroScanError::InvalidParameter {
                name: "min_area",
                value: 0.0,
                range: ">= 1",
            });
        }
        if let Some(max_area) = self.max_area {
            if max_area < self.min_area {
                return Err(AgroScanError::InvalidParameter {
                    name: "max_area",
                    value: max_area as f64,
                    range: ">= min_area",
                });
            }
        }
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(AgroScanError::InvalidParameter {
                name: "scale",
                value: self.scale as f64,
                range: "(0, 1]",
            });
        }
        Ok(())
    }
}

/// Union-find over provisional labels for the two-pass labeling.
struct Labels {
    parent: Vec<u32>,
}

impl Labels {
    fn new() -> Self {
        // Index 0 is background and never unioned.
        Self { parent: vec![0] }
    }

    fn make(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression.
        let mut current = label;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // Smaller root wins so labels keep scan order.
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi as usize] = lo;
        }
    }
}

/// Label 8-connected components and extract their statistics, filtered by
/// area bounds, sorted area-descending (ties keep first-encountered order),
/// truncated to `max_regions`, ids reassigned 1..N.
pub fn extract_regions(
    mask: &BinaryMask,
    kind: RegionKind,
    filter: &RegionFilter,
) -> Result<Vec<Region>> {
    filter.validate()?;

    let (width, height) = mask.dimensions();
    let mut labels = Labels::new();
    let mut label_map = vec![0u32; width as usize * height as usize];

    // First pass: provisional labels, unioning across left/up-left/up/up-right.
    for y in 0..height {
        for x in 0..width {
            if !mask.get(x, y) {
                continue;
            }
            let idx = y as usize * width as usize + x as usize;
            let mut neighbor_label = 0u32;
            let neighbors: [(i32, i32); 4] = [(-1, 0), (-1, -1), (0, -1), (1, -1)];
            for (dx, dy) in neighbors {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || ny < 0 || nx >= width as i32 {
                    continue;
                }
                let nidx = ny as usize * width as usize + nx as usize;
                let nlabel = label_map[nidx];
                if nlabel == 0 {
                    continue;
                }
                if neighbor_label == 0 {
                    neighbor_label = nlabel;
                } else {
                    labels.union(neighbor_label, nlabel);
                }
            }
            label_map[idx] = if neighbor_label == 0 {
                labels.make()
            } else {
                neighbor_label
            };
        }
    }

    // Second pass: resolve roots and accumulate per-component statistics.
    #[derive(Clone)]
    struct Stats {
        area: u64,
        sum_x: u64,
        sum_y: u64,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
        order: u32,
    }
    let mut stats: Vec<Option<Stats>> = vec![None; labels.parent.len()];
    let mut next_order = 0u32;

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * width as usize + x as usize;
            let label = label_map[idx];
            if label == 0 {
                continue;
            }
            let root = labels.find(label) as usize;
            let entry = stats[root].get_or_insert_with(|| {
                let order = next_order;
                next_order += 1;
                Stats {
                    area: 0,
                    sum_x: 0,
                    sum_y: 0,
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    order,
                }
            });
            entry.area += 1;
            entry.sum_x += x as u64;
            entry.sum_y += y as u64;
            entry.min_x = entry.min_x.min(x);
            entry.min_y = entry.min_y.min(y);
            entry.max_x = entry.max_x.max(x);
            entry.max_y = entry.max_y.max(y);
        }
    }

    // Area bounds arrive in original-resolution pixels; compare in mask
    // space by shrinking them with the square of the scale factor.
    let scale = filter.scale;
    let scale_sq = (scale * scale) as f64;
    let adjusted_min = filter.min_area as f64 * scale_sq;
    let adjusted_max = filter.max_area.map(|m| m as f64 * scale_sq);

    let mut kept: Vec<Stats> = stats
        .into_iter()
        .flatten()
        .filter(|s| {
            let area = s.area as f64;
            area >= adjusted_min && adjusted_max.map_or(true, |m| area <= m)
        })
        .collect();

    // Stable sort: equal areas keep first-encountered order.
    kept.sort_by(|a, b| b.area.cmp(&a.area).then(a.order.cmp(&b.order)));
    kept.truncate(filter.max_regions);

    let regions = kept
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let cx = (s.sum_x as f64 / s.area as f64) as f32;
            let cy = (s.sum_y as f64 / s.area as f64) as f32;
            Region {
                id: i as u32 + 1,
                kind,
                center: ((cx / scale) as u32, (cy / scale) as u32),
                area_pixels: (s.area as f64 / scale_sq) as u32,
                bbox: (
                    (s.min_x as f32 / scale) as u32,
                    (s.min_y as f32 / scale) as u32,
                    (s.max_x as f32 / scale) as u32,
                    (s.max_y as f32 / scale) as u32,
                ),
            }
        })
        .collect();

    Ok(regions)
}
