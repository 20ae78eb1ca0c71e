use std::collections::{HashMap, HashSet};

use geo_types::Rect;
use itertools::Itertools;
use rayon::prelude::*;

use crate::object_id::ObjectId;
use crate::region::Region;

pub const OVERLAP_CONTAINMENT_THRESHOLD: f64 = 98.0;

pub struct HierarchyNode {
    pub region: Region,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl HierarchyNode {
    pub fn id(&self) -> ObjectId {
        self.region.id
    }
}

pub struct Hierarchy {
    pub nodes: HashMap<usize, HierarchyNode>,
    pub roots: Vec<usize>,
}

impl Hierarchy {
    pub fn depth(&self, idx: usize) -> usize {
        let mut depth = 1;
        let mut current = idx;
        while let Some(parent) = self.nodes.get(&current).and_then(|n| n.parent) {
            depth += 1;
            current = parent;
        }
        depth
    }

    pub fn ancestors(&self, idx: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&idx).and_then(|n| n.parent);
        while let Some(i) = current {
            out.push(i);
            current = self.nodes.get(&i).and_then(|n| n.parent);
        }
        out
    }
}

fn bbox_covers(outer: Rect<f64>, inner: Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

/// Candidate set for one country: every region whose bbox is covered by
/// the country's bbox, plus the country itself, sorted area-descending
/// then rank-ascending (the fold in [`fold_country`] consumes from the
/// back, so the smallest/highest-rank element is processed first).
fn select_country_members(country_idx: usize, regions: &[Region]) -> Vec<usize> {
    let country = &regions[country_idx];
    let mut members: Vec<usize> = regions
        .iter()
        .enumerate()
        .filter(|(idx, r)| *idx == country_idx || bbox_covers(country.bbox(), r.bbox()))
        .map(|(idx, _)| idx)
        .collect();

    members.sort_by(|&a, &b| {
        regions[b]
            .area()
            .partial_cmp(&regions[a].area())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| regions[a].rank().cmp(&regions[b].rank()))
    });
    members
}

/// The core fold: repeatedly attach the smallest remaining region to the
/// first (smallest-area) predecessor that contains it, scanning backward.
/// On a rank inversion the attachment direction flips. Either way the
/// smallest element is popped; an unattached element is simply discarded.
fn fold_country(mut stack: Vec<usize>, regions: &[Region]) -> HashMap<usize, usize> {
    let mut parent_of = HashMap::new();

    while stack.len() > 1 {
        let t = *stack.last().unwrap();
        let mut attach_at = None;
        for i in (0..stack.len() - 1).rev() {
            let p = stack[i];
            if regions[p].contains(&regions[t], OVERLAP_CONTAINMENT_THRESHOLD) {
                attach_at = Some(p);
                break;
            }
        }
        match attach_at {
            Some(p) => {
                if regions[t].rank() > regions[p].rank() {
                    parent_of.insert(t, p);
                } else {
                    parent_of.insert(p, t);
                }
                stack.pop();
            }
            None => {
                stack.pop();
            }
        }
    }

    parent_of
}

/// Builds the full hierarchy: per-country tree construction (in
/// parallel), then merge of trees whose country regions share a name.
pub fn build(regions: Vec<Region>) -> Hierarchy {
    let country_indices: Vec<usize> = regions
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_country())
        .map(|(idx, _)| idx)
        .collect();

    let per_country: Vec<HashMap<usize, usize>> = country_indices
        .par_iter()
        .map(|&country_idx| {
            let members = select_country_members(country_idx, &regions);
            fold_country(members, &regions)
        })
        .collect();

    let mut parent_of: HashMap<usize, usize> = HashMap::new();
    for local in per_country {
        for (child, parent) in local {
            parent_of.entry(child).or_insert(parent);
        }
    }

    let mut keep: HashSet<usize> = country_indices.iter().copied().collect();
    for (&child, &parent) in &parent_of {
        keep.insert(child);
        keep.insert(parent);
    }

    let mut children_of: HashMap<usize, Vec<usize>> = HashMap::new();
    for (&child, &parent) in &parent_of {
        children_of.entry(parent).or_default().push(child);
    }
    for children in children_of.values_mut() {
        children.sort_by_key(|&idx| regions[idx].id.packed());
    }

    let mut regions: Vec<Option<Region>> = regions.into_iter().map(Some).collect();
    let mut nodes = HashMap::new();
    for idx in keep {
        let region = regions[idx].take().expect("region visited once");
        nodes.insert(
            idx,
            HierarchyNode {
                region,
                parent: parent_of.get(&idx).copied(),
                children: children_of.remove(&idx).unwrap_or_default(),
            },
        );
    }

    let roots = merge_same_name_roots(&mut nodes, &country_indices, &parent_of);

    Hierarchy { nodes, roots }
}

/// Merges country trees whose roots share an object id: keeps the larger
/// root, reparents the smaller root's children onto it, then normalizes
/// duplicate-id siblings throughout the merged tree.
fn merge_same_name_roots(
    nodes: &mut HashMap<usize, HierarchyNode>,
    country_indices: &[usize],
    parent_of: &HashMap<usize, usize>,
) -> Vec<usize> {
    let mut by_id: HashMap<ObjectId, Vec<usize>> = HashMap::new();
    for &idx in country_indices {
        if parent_of.contains_key(&idx) {
            // a country that got attached under another node (e.g. an
            // enclave) is not itself a forest root.
            continue;
        }
        by_id.entry(nodes[&idx].id()).or_default().push(idx);
    }

    let mut roots = Vec::new();
    for (_, mut group) in by_id {
        group.sort_by(|&a, &b| {
            nodes[&b]
                .region
                .area()
                .partial_cmp(&nodes[&a].region.area())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let keep = group[0];
        for &other in &group[1..] {
            let other_children = std::mem::take(&mut nodes.get_mut(&other).unwrap().children);
            for child in &other_children {
                if let Some(child_node) = nodes.get_mut(child) {
                    child_node.parent = Some(keep);
                }
            }
            nodes.get_mut(&keep).unwrap().children.extend(other_children);
            nodes.remove(&other);
        }
        normalize_children(nodes, keep);
        roots.push(keep);
    }
    roots.sort_by_key(|&idx| nodes[&idx].id().packed());
    roots
}

/// Post-order: fold duplicate-id siblings anywhere in the subtree rooted
/// at `idx` into one node each, recursively.
fn normalize_children(nodes: &mut HashMap<usize, HierarchyNode>, idx: usize) {
    let children = nodes[&idx].children.clone();
    for &child in &children {
        normalize_children(nodes, child);
    }

    let children = nodes[&idx].children.clone();
    let mut groups: HashMap<ObjectId, Vec<usize>> = HashMap::new();
    for &child in &children {
        groups.entry(nodes[&child].id()).or_default().push(child);
    }

    let mut merged_children = Vec::new();
    for (_, mut group) in groups {
        group.sort_by(|&a, &b| {
            nodes[&b]
                .region
                .area()
                .partial_cmp(&nodes[&a].region.area())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let keep = group[0];
        for &other in &group[1..] {
            let other_children = std::mem::take(&mut nodes.get_mut(&other).unwrap().children);
            for c in &other_children {
                if let Some(n) = nodes.get_mut(c) {
                    n.parent = Some(keep);
                }
            }
            nodes.get_mut(&keep).unwrap().children.extend(other_children);
            nodes.remove(&other);
        }
        merged_children.push(keep);
    }
    merged_children.sort_by_key(|&idx| nodes[&idx].id().packed());
    nodes.get_mut(&idx).unwrap().children = merged_children;
}

/// Country names of every root, deduplicated, preserving discovery order.
pub fn country_names(hierarchy: &Hierarchy) -> Vec<String> {
    hierarchy
        .roots
        .iter()
        .filter_map(|idx| hierarchy.nodes.get(idx))
        .filter_map(|n| n.region.name.default_name().map(str::to_string))
        .unique()
        .collect()
}
