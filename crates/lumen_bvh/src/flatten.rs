//! Flattening of the binary build tree into wide, index-addressed boxes.
//!
//! Boxes are stored breadth-first: the root is box 0 and every parent
//! precedes its children. The boost array is the prefix of boxes shallower
//! than [`FlattenConfig::boost_depth`]. It is packed as a separate small
//! buffer that traversal reads the top levels and the root rejection from,
//! so it keeps the indices of the full array.

use bytemuck::{Pod, Zeroable};
use lumen_core::Scene;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::sbvh::{BuildNode, Sbvh};

/// Widest node the traversal kernels understand.
pub const MAX_CHILDREN: usize = 8;

/// Thin box axes are widened to this size so slab tests stay robust.
const BOX_PADDING: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenConfig {
    /// Children per flattened box, 2..=8
    pub max_children: usize,
    /// Boxes above this depth form the boost array
    pub boost_depth: usize,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            max_children: MAX_CHILDREN,
            boost_depth: 2,
        }
    }
}

impl FlattenConfig {
    pub fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children;
        self
    }

    pub fn with_boost_depth(mut self, boost_depth: usize) -> Self {
        self.boost_depth = boost_depth;
        self
    }
}

/// Device-side box, 80 bytes.
///
/// Leaves have `children_count == 0` and own faces `[start, end)`; interior
/// boxes list `children_count` box indices and leave the range at zero.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FlatBox {
    pub min: [f32; 3],
    pub start: i32,
    pub max: [f32; 3],
    pub end: i32,
    pub children: [i32; MAX_CHILDREN],
    pub children_count: i32,
    pub _pad: [i32; 3],
}

impl FlatBox {
    fn new(bounds: lumen_math::Aabb) -> Self {
        let padded = bounds.padded(BOX_PADDING);
        Self {
            min: padded.min.to_array(),
            start: 0,
            max: padded.max.to_array(),
            end: 0,
            children: [-1; MAX_CHILDREN],
            children_count: 0,
            _pad: [0; 3],
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children_count == 0
    }

    /// Child box indices.
    pub fn child_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.children[..self.children_count.max(0) as usize]
            .iter()
            .map(|&c| c as usize)
    }

    pub fn face_range(&self) -> std::ops::Range<usize> {
        self.start.max(0) as usize..self.end.max(0) as usize
    }
}

/// Flattened hierarchy ready for packing.
#[derive(Debug, Clone, Default)]
pub struct FlatBvh {
    /// Every box, breadth-first
    pub boxes: Vec<FlatBox>,
    /// Length of the boost prefix of `boxes`
    pub boost_count: usize,
    /// Source face index for each slot of the reordered face list
    pub face_indices: Vec<usize>,
}

impl FlatBvh {
    pub fn boost(&self) -> &[FlatBox] {
        &self.boxes[..self.boost_count]
    }

    /// Slots of the reordered face list reachable from `index`.
    pub fn collect_slots(&self, index: usize, out: &mut Vec<usize>) {
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            let b = &self.boxes[i];
            if b.is_leaf() {
                out.extend(b.face_range());
            } else {
                stack.extend(b.child_indices());
            }
        }
    }
}

/// Collapse a built hierarchy into wide boxes.
pub fn flatten(sbvh: &Sbvh, config: &FlattenConfig) -> FlatBvh {
    let max_children = config.max_children.clamp(2, MAX_CHILDREN);

    let mut boxes = vec![FlatBox::new(sbvh.root().bounds())];
    let mut depths = vec![0usize];
    let mut queue = VecDeque::from([(0usize, Sbvh::ROOT)]);

    while let Some((flat, node)) = queue.pop_front() {
        match sbvh.nodes[node] {
            BuildNode::Leaf { start, end, .. } => {
                boxes[flat].start = start as i32;
                boxes[flat].end = end as i32;
            }
            BuildNode::Interior { .. } => {
                let children = collapse(sbvh, node, max_children);
                let depth = depths[flat] + 1;
                boxes[flat].children_count = children.len() as i32;
                for (slot, child) in children.into_iter().enumerate() {
                    let child_flat = boxes.len();
                    boxes[flat].children[slot] = child_flat as i32;
                    boxes.push(FlatBox::new(sbvh.nodes[child].bounds()));
                    depths.push(depth);
                    queue.push_back((child_flat, child));
                }
            }
        }
    }

    // Breadth-first order keeps depths sorted, so this is a prefix
    let boost_count = depths.iter().take_while(|&&d| d < config.boost_depth).count();

    log::info!(
        "Flattened {} build nodes into {} boxes ({} boosted)",
        sbvh.nodes.len(),
        boxes.len(),
        boost_count
    );

    FlatBvh {
        boxes,
        boost_count,
        face_indices: sbvh.references.clone(),
    }
}

/// Pull grandchildren up into `node` until it has `max_children` children,
/// always opening the interior child with the largest surface area.
fn collapse(sbvh: &Sbvh, node: usize, max_children: usize) -> Vec<usize> {
    let mut children = match sbvh.nodes[node] {
        BuildNode::Interior { children, .. } => children.to_vec(),
        BuildNode::Leaf { .. } => return Vec::new(),
    };

    while children.len() < max_children {
        let widest = children
            .iter()
            .enumerate()
            .filter(|(_, c)| !sbvh.nodes[**c].is_leaf())
            .max_by(|(_, a), (_, b)| {
                let area_a = sbvh.nodes[**a].bounds().surface_area();
                let area_b = sbvh.nodes[**b].bounds().surface_area();
                area_a.total_cmp(&area_b)
            })
            .map(|(i, _)| i);

        let Some(i) = widest else { break };
        if let BuildNode::Interior { children: grand, .. } = sbvh.nodes[children[i]] {
            children[i] = grand[0];
            children.insert(i + 1, grand[1]);
        }
    }
    children
}

/// Rewrite the scene's faces into flattened reference order, duplicating
/// spatially split faces, so leaf ranges index the face list directly.
pub fn flatten_faces(scene: &mut Scene, bvh: &FlatBvh) {
    let faces = std::mem::take(&mut scene.faces);
    scene.faces = bvh.face_indices.iter().map(|&i| faces[i].clone()).collect();
    log::debug!(
        "Reordered {} faces into {} face slots",
        faces.len(),
        scene.faces.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbvh::{SbvhBuilder, SbvhConfig};
    use lumen_core::{Material, Scene};
    use lumen_math::Vec3;
    use std::collections::BTreeSet;

    fn cube_scene() -> Scene {
        let mut scene = Scene::new("cube");
        let mat = scene.add_material(Material::default());
        for face in Scene::cube(Vec3::ZERO, 1.0, mat) {
            scene.add_face(face);
        }
        scene
    }

    fn build(scene: &Scene, leaf_size: usize) -> Sbvh {
        let config = SbvhConfig::default()
            .with_leaf_size(leaf_size)
            .with_max_leaf_size(leaf_size);
        SbvhBuilder::new(config).build(&scene.faces)
    }

    #[test]
    fn test_flat_box_layout() {
        assert_eq!(std::mem::size_of::<FlatBox>(), 80);
    }

    #[test]
    fn test_flatten_round_trip_cube() {
        let scene = cube_scene();
        let sbvh = build(&scene, 1);
        let flat = flatten(&sbvh, &FlattenConfig::default());

        let mut direct = Vec::new();
        sbvh.collect_faces(Sbvh::ROOT, &mut direct);

        let mut slots = Vec::new();
        flat.collect_slots(0, &mut slots);
        let via_flat: Vec<usize> = slots.iter().map(|&s| flat.face_indices[s]).collect();

        let direct: BTreeSet<usize> = direct.into_iter().collect();
        let via_flat: BTreeSet<usize> = via_flat.into_iter().collect();
        assert_eq!(direct, via_flat);
        assert_eq!(via_flat, (0..12).collect());
    }

    #[test]
    fn test_parents_precede_children() {
        let scene = cube_scene();
        let flat = flatten(&build(&scene, 1), &FlattenConfig::default().with_max_children(2));
        for (i, b) in flat.boxes.iter().enumerate() {
            assert!(b.children_count as usize <= 2);
            for child in b.child_indices() {
                assert!(child > i);
            }
        }
    }

    #[test]
    fn test_children_contained_in_parent() {
        let scene = cube_scene();
        let flat = flatten(&build(&scene, 1), &FlattenConfig::default());
        for b in &flat.boxes {
            for child in b.child_indices() {
                let c = &flat.boxes[child];
                for axis in 0..3 {
                    assert!(c.min[axis] >= b.min[axis] - 1e-4);
                    assert!(c.max[axis] <= b.max[axis] + 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_boost_prefix() {
        let scene = cube_scene();
        let sbvh = build(&scene, 1);

        let flat = flatten(&sbvh, &FlattenConfig::default().with_max_children(2).with_boost_depth(2));
        // Root plus its two children
        assert_eq!(flat.boost_count, 3);
        assert_eq!(flat.boost(), &flat.boxes[..3]);

        let none = flatten(&sbvh, &FlattenConfig::default().with_boost_depth(0));
        assert!(none.boost().is_empty());
    }

    #[test]
    fn test_wide_root_uses_all_slots() {
        let scene = cube_scene();
        let flat = flatten(&build(&scene, 1), &FlattenConfig::default());
        // Twelve single-face leaves leave enough grandchildren to fill the root
        assert_eq!(flat.boxes[0].children_count, MAX_CHILDREN as i32);
    }

    #[test]
    fn test_flatten_faces_reorders_scene() {
        let mut scene = cube_scene();
        let original = scene.faces.clone();
        let flat = flatten(&build(&scene, 2), &FlattenConfig::default());
        flatten_faces(&mut scene, &flat);

        assert_eq!(scene.faces.len(), flat.face_indices.len());
        for (slot, &source) in flat.face_indices.iter().enumerate() {
            assert_eq!(scene.faces[slot].verts, original[source].verts);
        }
        for b in flat.boxes.iter().filter(|b| b.is_leaf()) {
            assert!(b.face_range().end <= scene.faces.len());
        }
    }

    #[test]
    fn test_flatten_empty() {
        let sbvh = SbvhBuilder::default().build(&[]);
        let flat = flatten(&sbvh, &FlattenConfig::default());
        assert_eq!(flat.boxes.len(), 1);
        assert!(flat.boxes[0].is_leaf());
        assert!(flat.boxes[0].face_range().is_empty());
        assert_eq!(flat.boost_count, 1);
    }
}
