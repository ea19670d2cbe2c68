//! Spatial-split BVH builder.
//!
//! Each node first looks for a binned object split over reference
//! centroids. When the two object-split children overlap noticeably, a
//! spatial split is also evaluated: references are binned by extent, and a
//! triangle straddling the chosen plane is clipped and referenced from both
//! children. The cheaper split under the surface area heuristic wins.
//! Nodes keep splitting while the winning split costs less than a leaf, and
//! always while they hold more than `max_leaf_size` references. When no
//! binned split separates the references a median split is used instead.
//!
//! Nodes live in an index arena rooted at [`Sbvh::ROOT`]; leaves own a
//! `[start, end)` range of [`Sbvh::references`], which may list a face more
//! than once.

use std::time::Instant;

use lumen_core::Face;
use lumen_math::{split_triangle, Aabb, Vec3};
use serde::{Deserialize, Serialize};

/// Build settings. Invalid values are clamped by [`SbvhConfig::sanitized`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SbvhConfig {
    /// Centroid buckets per axis for object splits (min 2)
    pub bin_count: usize,
    /// Extent buckets per axis for spatial splits (min 2)
    pub spatial_bin_count: usize,
    /// Nodes with at most this many references become leaves (min 1)
    pub leaf_size: usize,
    /// Nodes with more references than this are split even when the SAH
    /// prefers a leaf (at least `leaf_size`)
    pub max_leaf_size: usize,
    /// Nodes at this depth become leaves regardless of size (min 1)
    pub max_depth: usize,
    /// SAH cost of visiting a node
    pub traversal_cost: f32,
    /// SAH cost of one triangle test
    pub intersection_cost: f32,
    /// Spatial splits are tried when the object-split children overlap by
    /// more than this fraction of the root's area
    pub spatial_alpha: f32,
    /// Extra references allowed, as a fraction of the face count
    pub duplication_budget: f32,
}

impl Default for SbvhConfig {
    fn default() -> Self {
        Self {
            bin_count: 16,
            spatial_bin_count: 32,
            leaf_size: 4,
            max_leaf_size: 16,
            max_depth: 64,
            traversal_cost: 1.0,
            intersection_cost: 1.0,
            spatial_alpha: 1e-5,
            duplication_budget: 0.5,
        }
    }
}

impl SbvhConfig {
    pub fn with_bins(mut self, bin_count: usize, spatial_bin_count: usize) -> Self {
        self.bin_count = bin_count;
        self.spatial_bin_count = spatial_bin_count;
        self
    }

    pub fn with_leaf_size(mut self, leaf_size: usize) -> Self {
        self.leaf_size = leaf_size;
        self
    }

    pub fn with_max_leaf_size(mut self, max_leaf_size: usize) -> Self {
        self.max_leaf_size = max_leaf_size;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_costs(mut self, traversal_cost: f32, intersection_cost: f32) -> Self {
        self.traversal_cost = traversal_cost;
        self.intersection_cost = intersection_cost;
        self
    }

    pub fn with_spatial_alpha(mut self, spatial_alpha: f32) -> Self {
        self.spatial_alpha = spatial_alpha;
        self
    }

    pub fn with_duplication_budget(mut self, duplication_budget: f32) -> Self {
        self.duplication_budget = duplication_budget;
        self
    }

    /// Clamp every field into its usable range.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        self.bin_count = self.bin_count.max(2);
        self.spatial_bin_count = self.spatial_bin_count.max(2);
        self.leaf_size = self.leaf_size.max(1);
        self.max_leaf_size = self.max_leaf_size.max(self.leaf_size);
        self.max_depth = self.max_depth.max(1);
        if self.traversal_cost.is_nan() || self.traversal_cost < 0.0 {
            self.traversal_cost = defaults.traversal_cost;
        }
        if self.intersection_cost.is_nan() || self.intersection_cost <= 0.0 {
            self.intersection_cost = defaults.intersection_cost;
        }
        if self.spatial_alpha.is_nan() || self.spatial_alpha < 0.0 {
            self.spatial_alpha = 0.0;
        }
        if self.duplication_budget.is_nan() || self.duplication_budget < 0.0 {
            self.duplication_budget = 0.0;
        }
        self
    }
}

/// A face handle plus the part of the face's bounds it stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRef {
    pub face: usize,
    pub bounds: Aabb,
}

/// Binary build node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildNode {
    Interior { bounds: Aabb, children: [usize; 2] },
    Leaf { bounds: Aabb, start: usize, end: usize },
}

impl BuildNode {
    pub fn bounds(&self) -> Aabb {
        match self {
            BuildNode::Interior { bounds, .. } | BuildNode::Leaf { bounds, .. } => *bounds,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BuildNode::Leaf { .. })
    }
}

/// Aggregate numbers reported after a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Total nodes, interior and leaf
    pub boxes: usize,
    pub leaves: usize,
    /// Reference count including duplicates
    pub references: usize,
    /// References beyond one per face
    pub duplicated: usize,
    pub max_depth: usize,
    /// Largest leaf reference count
    pub max_leaf: usize,
}

/// A built hierarchy.
#[derive(Debug, Clone)]
pub struct Sbvh {
    pub nodes: Vec<BuildNode>,
    /// Face indices in leaf order
    pub references: Vec<usize>,
    pub stats: BuildStats,
}

impl Sbvh {
    pub const ROOT: usize = 0;

    pub fn root(&self) -> &BuildNode {
        &self.nodes[Self::ROOT]
    }

    pub fn bounds(&self) -> Aabb {
        self.root().bounds()
    }

    /// Face indices owned by a leaf; empty for interior nodes.
    pub fn leaf_references(&self, node: usize) -> &[usize] {
        match self.nodes[node] {
            BuildNode::Leaf { start, end, .. } => &self.references[start..end],
            BuildNode::Interior { .. } => &[],
        }
    }

    /// Append every face index reachable from `node` to `out`.
    pub fn collect_faces(&self, node: usize, out: &mut Vec<usize>) {
        let mut stack = vec![node];
        while let Some(index) = stack.pop() {
            match self.nodes[index] {
                BuildNode::Leaf { start, end, .. } => {
                    out.extend_from_slice(&self.references[start..end])
                }
                BuildNode::Interior { children, .. } => stack.extend_from_slice(&children),
            }
        }
    }
}

/// SBVH builder.
#[derive(Debug, Clone, Default)]
pub struct SbvhBuilder {
    config: SbvhConfig,
}

impl SbvhBuilder {
    pub fn new(config: SbvhConfig) -> Self {
        Self {
            config: config.sanitized(),
        }
    }

    pub fn config(&self) -> &SbvhConfig {
        &self.config
    }

    /// Build a hierarchy over `faces`.
    ///
    /// An empty face list yields a single empty leaf with zero-size bounds.
    pub fn build(&self, faces: &[Face]) -> Sbvh {
        let start = Instant::now();

        let refs: Vec<FaceRef> = faces
            .iter()
            .enumerate()
            .map(|(face, f)| FaceRef {
                face,
                bounds: f.bounds(),
            })
            .collect();

        let extra = (faces.len() as f32 * self.config.duplication_budget).floor() as usize;
        let mut ctx = BuildContext {
            faces,
            config: &self.config,
            nodes: Vec::with_capacity(2 * faces.len().max(1)),
            references: Vec::with_capacity(faces.len()),
            stats: BuildStats::default(),
            reference_count: faces.len(),
            max_references: faces.len() + extra,
            root_area: 0.0,
        };

        if refs.is_empty() {
            let bounds = Aabb::from_points(Vec3::ZERO, Vec3::ZERO);
            ctx.nodes.push(BuildNode::Leaf {
                bounds,
                start: 0,
                end: 0,
            });
            ctx.stats.leaves = 1;
        } else {
            let bounds = bounds_of(&refs);
            ctx.root_area = bounds.half_area();
            ctx.build_node(refs, bounds, 0);
        }

        let mut stats = ctx.stats;
        stats.boxes = ctx.nodes.len();
        stats.references = ctx.references.len();
        stats.duplicated = ctx.references.len().saturating_sub(faces.len());

        log::info!(
            "SBVH built in {:.2?}: {} boxes, {} leaves, {} references ({} duplicated), depth {}, largest leaf {}",
            start.elapsed(),
            stats.boxes,
            stats.leaves,
            stats.references,
            stats.duplicated,
            stats.max_depth,
            stats.max_leaf
        );

        Sbvh {
            nodes: ctx.nodes,
            references: ctx.references,
            stats,
        }
    }
}

struct ObjectSplit {
    axis: usize,
    boundary: usize,
    min: f32,
    scale: f32,
    bins: usize,
    cost: f32,
    left_bounds: Aabb,
    right_bounds: Aabb,
}

struct SpatialSplit {
    axis: usize,
    boundary: usize,
    min: f32,
    scale: f32,
    bins: usize,
    position: f32,
    cost: f32,
    left_bounds: Aabb,
    right_bounds: Aabb,
    left_count: usize,
    right_count: usize,
}

struct BuildContext<'a> {
    faces: &'a [Face],
    config: &'a SbvhConfig,
    nodes: Vec<BuildNode>,
    references: Vec<usize>,
    stats: BuildStats,
    /// Live references across the whole build, duplicates included
    reference_count: usize,
    max_references: usize,
    root_area: f32,
}

impl BuildContext<'_> {
    fn build_node(&mut self, refs: Vec<FaceRef>, bounds: Aabb, depth: usize) -> usize {
        let index = self.nodes.len();
        self.nodes.push(BuildNode::Leaf {
            bounds,
            start: 0,
            end: 0,
        });
        self.stats.max_depth = self.stats.max_depth.max(depth);

        if refs.len() <= self.config.leaf_size || depth >= self.config.max_depth {
            self.make_leaf(index, &refs, bounds);
            return index;
        }

        // Zero area makes every split cost infinite
        let parent_area = bounds.half_area();
        if parent_area.is_nan() || parent_area <= 0.0 {
            self.make_leaf(index, &refs, bounds);
            return index;
        }

        let forced = refs.len() > self.config.max_leaf_size;
        let leaf_cost = self.config.intersection_cost * refs.len() as f32;
        match self.split(&refs, &bounds, parent_area) {
            Some((cost, left, right)) if forced || cost < leaf_cost => {
                drop(refs);
                let left_bounds = bounds_of(&left);
                let right_bounds = bounds_of(&right);
                let l = self.build_node(left, left_bounds, depth + 1);
                let r = self.build_node(right, right_bounds, depth + 1);
                self.nodes[index] = BuildNode::Interior {
                    bounds,
                    children: [l, r],
                };
            }
            Some((_, left, right)) => {
                // Give back the references a rejected spatial split duplicated
                self.reference_count -= left.len() + right.len() - refs.len();
                self.make_leaf(index, &refs, bounds);
            }
            None => self.make_leaf(index, &refs, bounds),
        }
        index
    }

    fn make_leaf(&mut self, index: usize, refs: &[FaceRef], bounds: Aabb) {
        let start = self.references.len();
        self.references.extend(refs.iter().map(|r| r.face));
        let end = self.references.len();
        self.nodes[index] = BuildNode::Leaf { bounds, start, end };
        self.stats.leaves += 1;
        self.stats.max_leaf = self.stats.max_leaf.max(refs.len());
    }

    /// Pick and apply the cheapest split, returning its SAH cost and the two
    /// reference sets. When neither an object nor a spatial split separates
    /// the references, falls back to a median split over centroids.
    fn split(&mut self, refs: &[FaceRef], bounds: &Aabb, parent_area: f32) -> Option<(f32, Vec<FaceRef>, Vec<FaceRef>)> {
        let object = self.find_object_split(refs, parent_area);

        let try_spatial = self.reference_count < self.max_references
            && match &object {
                Some(o) => {
                    let overlap = o.left_bounds.intersection(&o.right_bounds).half_area();
                    overlap > self.config.spatial_alpha * self.root_area
                }
                None => true,
            };

        if try_spatial {
            if let Some(spatial) = self.find_spatial_split(refs, bounds, parent_area) {
                let cheaper = match &object {
                    Some(o) => spatial.cost < o.cost,
                    None => true,
                };
                if cheaper {
                    if let Some((left, right)) = self.perform_spatial_split(refs, &spatial) {
                        return Some((spatial.cost, left, right));
                    }
                }
            }
        }

        match object {
            Some(o) => {
                let (left, right) = perform_object_split(refs, &o);
                Some((o.cost, left, right))
            }
            None => self.median_split(refs, parent_area),
        }
    }

    /// Halve the references in centroid order along the widest centroid
    /// axis. Coincident centroids keep their input order.
    fn median_split(&self, refs: &[FaceRef], parent_area: f32) -> Option<(f32, Vec<FaceRef>, Vec<FaceRef>)> {
        if refs.len() < 2 {
            return None;
        }
        let mut centroids = Aabb::EMPTY;
        for r in refs {
            centroids.grow_point(r.bounds.centroid());
        }
        let axis = centroids.longest_axis();

        let mut left = refs.to_vec();
        left.sort_by(|a, b| a.bounds.centroid()[axis].total_cmp(&b.bounds.centroid()[axis]));
        let right = left.split_off(refs.len() / 2);

        let cost = self.sah(
            bounds_of(&left).half_area(),
            left.len(),
            bounds_of(&right).half_area(),
            right.len(),
            parent_area,
        );
        Some((cost, left, right))
    }

    fn sah(&self, left_area: f32, left_count: usize, right_area: f32, right_count: usize, parent_area: f32) -> f32 {
        self.config.traversal_cost
            + self.config.intersection_cost
                * (left_area * left_count as f32 + right_area * right_count as f32)
                / parent_area
    }

    fn find_object_split(&self, refs: &[FaceRef], parent_area: f32) -> Option<ObjectSplit> {
        let bins = self.config.bin_count;
        let mut centroid_bounds = Aabb::EMPTY;
        for r in refs {
            centroid_bounds.grow_point(r.bounds.centroid());
        }

        let mut best: Option<ObjectSplit> = None;
        for axis in 0..3 {
            let min = centroid_bounds.min[axis];
            let extent = centroid_bounds.max[axis] - min;
            if extent.is_nan() || extent <= 0.0 {
                continue;
            }
            let scale = bins as f32 / extent;

            let mut bin_bounds = vec![Aabb::EMPTY; bins];
            let mut bin_counts = vec![0usize; bins];
            for r in refs {
                let b = bin_index(r.bounds.centroid()[axis], min, scale, bins);
                bin_bounds[b].grow(&r.bounds);
                bin_counts[b] += 1;
            }

            let (right_bounds, right_counts) = suffix_sweep(&bin_bounds, &bin_counts);

            let mut left_bounds = Aabb::EMPTY;
            let mut left_count = 0;
            for boundary in 1..bins {
                left_bounds.grow(&bin_bounds[boundary - 1]);
                left_count += bin_counts[boundary - 1];
                let right_count = right_counts[boundary];
                if left_count == 0 || right_count == 0 {
                    continue;
                }

                let cost = self.sah(
                    left_bounds.half_area(),
                    left_count,
                    right_bounds[boundary].half_area(),
                    right_count,
                    parent_area,
                );
                if best.as_ref().map_or(true, |b| cost < b.cost) {
                    best = Some(ObjectSplit {
                        axis,
                        boundary,
                        min,
                        scale,
                        bins,
                        cost,
                        left_bounds,
                        right_bounds: right_bounds[boundary],
                    });
                }
            }
        }
        best
    }

    fn find_spatial_split(&self, refs: &[FaceRef], bounds: &Aabb, parent_area: f32) -> Option<SpatialSplit> {
        let bins = self.config.spatial_bin_count;

        let mut best: Option<SpatialSplit> = None;
        for axis in 0..3 {
            let min = bounds.min[axis];
            let extent = bounds.max[axis] - min;
            if extent.is_nan() || extent <= 0.0 {
                continue;
            }
            let scale = bins as f32 / extent;
            let width = extent / bins as f32;

            let mut bin_bounds = vec![Aabb::EMPTY; bins];
            let mut entries = vec![0usize; bins];
            let mut exits = vec![0usize; bins];

            for r in refs {
                let first = bin_index(r.bounds.min[axis], min, scale, bins);
                let last = bin_index(r.bounds.max[axis], min, scale, bins).max(first);
                let verts = &self.faces[r.face].verts;

                // Walk the planes the reference crosses, clipping as we go
                let mut rest = r.bounds;
                for (b, bin) in bin_bounds.iter_mut().enumerate().take(last).skip(first) {
                    let plane = min + width * (b + 1) as f32;
                    let (left, right) = split_triangle(verts, axis, plane);
                    let part = left.intersection(&rest);
                    if !part.is_empty() {
                        bin.grow(&part);
                    }
                    rest = right.intersection(&rest);
                }
                if !rest.is_empty() {
                    bin_bounds[last].grow(&rest);
                }

                entries[first] += 1;
                exits[last] += 1;
            }

            let (right_bounds, right_counts) = suffix_sweep(&bin_bounds, &exits);

            let mut left_bounds = Aabb::EMPTY;
            let mut left_count = 0;
            for boundary in 1..bins {
                left_bounds.grow(&bin_bounds[boundary - 1]);
                left_count += entries[boundary - 1];
                let right_count = right_counts[boundary];
                if left_count == 0 || right_count == 0 {
                    continue;
                }

                let cost = self.sah(
                    left_bounds.half_area(),
                    left_count,
                    right_bounds[boundary].half_area(),
                    right_count,
                    parent_area,
                );
                if best.as_ref().map_or(true, |b| cost < b.cost) {
                    best = Some(SpatialSplit {
                        axis,
                        boundary,
                        min,
                        scale,
                        bins,
                        position: min + width * boundary as f32,
                        cost,
                        left_bounds,
                        right_bounds: right_bounds[boundary],
                        left_count,
                        right_count,
                    });
                }
            }
        }
        best
    }

    /// Distribute references across the spatial split plane.
    ///
    /// Straddling references are kept whole on one side when that is cheaper
    /// than duplicating them, or when the duplication budget is spent.
    /// Returns `None` if the split fails to make progress.
    fn perform_spatial_split(&mut self, refs: &[FaceRef], split: &SpatialSplit) -> Option<(Vec<FaceRef>, Vec<FaceRef>)> {
        let axis = split.axis;
        let mut left = Vec::with_capacity(split.left_count);
        let mut right = Vec::with_capacity(split.right_count);
        let mut straddling = Vec::new();

        for r in refs {
            let first = bin_index(r.bounds.min[axis], split.min, split.scale, split.bins);
            let last = bin_index(r.bounds.max[axis], split.min, split.scale, split.bins).max(first);
            if last < split.boundary {
                left.push(*r);
            } else if first >= split.boundary {
                right.push(*r);
            } else {
                straddling.push(*r);
            }
        }

        let mut left_bounds = split.left_bounds;
        let mut right_bounds = split.right_bounds;
        let mut left_count = split.left_count as f32;
        let mut right_count = split.right_count as f32;
        let mut duplicated = 0;

        for r in straddling {
            let split_cost = left_bounds.half_area() * left_count + right_bounds.half_area() * right_count;
            let to_left = Aabb::union(&left_bounds, &r.bounds).half_area() * left_count
                + right_bounds.half_area() * (right_count - 1.0);
            let to_right = left_bounds.half_area() * (left_count - 1.0)
                + Aabb::union(&right_bounds, &r.bounds).half_area() * right_count;

            let can_duplicate = self.reference_count < self.max_references;
            let keep_whole = !can_duplicate || to_left.min(to_right) < split_cost;

            let (left_part, right_part) = if keep_whole {
                (Aabb::EMPTY, Aabb::EMPTY)
            } else {
                let (l, rr) = split_triangle(&self.faces[r.face].verts, axis, split.position);
                (l.intersection(&r.bounds), rr.intersection(&r.bounds))
            };

            if !keep_whole && !left_part.is_empty() && !right_part.is_empty() {
                left.push(FaceRef {
                    face: r.face,
                    bounds: left_part,
                });
                right.push(FaceRef {
                    face: r.face,
                    bounds: right_part,
                });
                self.reference_count += 1;
                duplicated += 1;
            } else if (keep_whole && to_left <= to_right) || (!keep_whole && right_part.is_empty()) {
                left.push(r);
                left_bounds.grow(&r.bounds);
                right_count -= 1.0;
            } else {
                right.push(r);
                right_bounds.grow(&r.bounds);
                left_count -= 1.0;
            }
        }

        let n = refs.len();
        if left.is_empty() || right.is_empty() || (left.len() == n && right.len() == n) {
            self.reference_count -= duplicated;
            return None;
        }
        Some((left, right))
    }
}

fn perform_object_split(refs: &[FaceRef], split: &ObjectSplit) -> (Vec<FaceRef>, Vec<FaceRef>) {
    refs.iter().partition(|r| {
        bin_index(r.bounds.centroid()[split.axis], split.min, split.scale, split.bins) < split.boundary
    })
}

/// Bounds and counts of every bin suffix `[i, bins)`.
fn suffix_sweep(bin_bounds: &[Aabb], counts: &[usize]) -> (Vec<Aabb>, Vec<usize>) {
    let bins = bin_bounds.len();
    let mut bounds = vec![Aabb::EMPTY; bins];
    let mut totals = vec![0usize; bins];
    let mut acc = Aabb::EMPTY;
    let mut total = 0;
    for i in (0..bins).rev() {
        acc.grow(&bin_bounds[i]);
        total += counts[i];
        bounds[i] = acc;
        totals[i] = total;
    }
    (bounds, totals)
}

#[inline]
fn bin_index(value: f32, min: f32, scale: f32, bins: usize) -> usize {
    // Float-to-int casts saturate, so values below `min` land in bin 0
    (((value - min) * scale) as usize).min(bins - 1)
}

fn bounds_of(refs: &[FaceRef]) -> Aabb {
    let mut bounds = Aabb::EMPTY;
    for r in refs {
        bounds.grow(&r.bounds);
    }
    bounds
}
