use std::collections::BTreeMap;
use std::fmt;

use crate::hierarchy::Hierarchy;

#[derive(Debug, Default, Clone, serde_derive::Serialize)]
pub struct Stats {
    pub region_count: usize,
    pub point_city_count: usize,
    pub by_label: BTreeMap<String, usize>,
}

impl Stats {
    pub fn compute(hierarchy: &Hierarchy, point_city_count: usize) -> Self {
        let mut by_label = BTreeMap::new();
        for node in hierarchy.nodes.values() {
            let label = node.region.label();
            if !label.is_empty() {
                *by_label.entry(label.to_string()).or_insert(0) += 1;
            }
        }
        Stats {
            region_count: hierarchy.nodes.len(),
            point_city_count,
            by_label,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "regions: {}", self.region_count)?;
        writeln!(f, "point cities consumed into regions: {}", self.point_city_count)?;
        for (label, count) in &self.by_label {
            writeln!(f, "  {}: {}", label, count)?;
        }
        Ok(())
    }
}
