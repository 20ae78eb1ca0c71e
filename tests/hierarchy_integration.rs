//! End-to-end checks over the public API: repair feeding the hierarchy
//! builder feeding the serializer, without needing an external PBF fixture
//! (the raw OSM feature stream is an external collaborator with its own
//! reader, so these tests build `Region`/`PointCity` values directly, the
//! same way the unit tests in each module do).

use std::collections::HashSet;

use geo_types::{Coordinate, LineString, MultiPolygon, Point, Polygon};

use geohierarchy::hierarchy::{self, Hierarchy};
use geohierarchy::lang_name::LangName;
use geohierarchy::object_id::{Kind, ObjectId};
use geohierarchy::region::{PointCity, Region};
use geohierarchy::region_data::{AdminLevel, PlaceKind, RegionData};
use geohierarchy::repair;
use geohierarchy::serializer::serialize_jsonl;

fn square(min: (f64, f64), max: (f64, f64)) -> MultiPolygon<f64> {
    let exterior = LineString(vec![
        Coordinate { x: min.0, y: min.1 },
        Coordinate { x: max.0, y: min.1 },
        Coordinate { x: max.0, y: max.1 },
        Coordinate { x: min.0, y: max.1 },
        Coordinate { x: min.0, y: min.1 },
    ]);
    MultiPolygon(vec![Polygon::new(exterior, vec![])])
}

fn named_region(id: u64, name: &str, level: u8, polygon: MultiPolygon<f64>) -> Region {
    let mut n = LangName::new();
    n.set("default", name);
    let mut data = RegionData::new();
    data.admin_level = AdminLevel::Level(level);
    Region::new(ObjectId::new(Kind::Relation, id), n, data, polygon).unwrap()
}

/// Smallest-nesting: two disjoint countries each carry their own
/// independently-rooted subtree, and the deepest region nests two levels
/// down from its country.
#[test]
fn smallest_nesting_produces_two_independent_country_trees() {
    let country_1 = named_region(1, "Country_1", 2, square((0.0, 0.0), (20.0, 20.0)));
    let region_3 = named_region(3, "Region_3", 4, square((1.0, 1.0), (3.0, 3.0)));
    let region_5 = named_region(5, "Region_5", 4, square((12.0, 12.0), (18.0, 18.0)));
    let subregion_6 = named_region(6, "Subregion_6", 6, square((13.0, 13.0), (14.0, 14.0)));
    let subregion_7 = named_region(7, "Subregion_7", 6, square((15.0, 15.0), (16.0, 16.0)));

    let country_2 = named_region(2, "Country_2", 2, square((50.0, 50.0), (70.0, 70.0)));
    let region_8 = named_region(8, "Region_8", 4, square((55.0, 55.0), (65.0, 65.0)));

    let h = hierarchy::build(vec![
        country_1, region_3, region_5, subregion_6, subregion_7, country_2, region_8,
    ]);

    let mut names = hierarchy::country_names(&h);
    names.sort();
    assert_eq!(names, vec!["Country_1".to_string(), "Country_2".to_string()]);
    assert_eq!(h.roots.len(), 2);

    let root_1 = h
        .roots
        .iter()
        .find(|&&idx| h.nodes[&idx].region.name.default_name() == Some("Country_1"))
        .copied()
        .unwrap();
    assert_eq!(h.nodes[&root_1].children.len(), 2);

    let region_5_idx = h
        .nodes
        .iter()
        .find(|(_, n)| n.region.name.default_name() == Some("Region_5"))
        .map(|(&idx, _)| idx)
        .unwrap();
    assert_eq!(h.nodes[&region_5_idx].children.len(), 2);
    assert_eq!(h.depth(region_5_idx), 2);
    let subregion_6_idx = h.nodes[&region_5_idx].children[0];
    assert_eq!(h.depth(subregion_6_idx), 3);

    let root_2 = h
        .roots
        .iter()
        .find(|&&idx| h.nodes[&idx].region.name.default_name() == Some("Country_2"))
        .copied()
        .unwrap();
    assert_eq!(h.nodes[&root_2].children.len(), 1);
}

/// Over a larger forest, every non-root node is contained (or ≥98%
/// overlapping) in its parent, and no node has two same-id children.
#[test]
fn containment_soundness_and_sibling_uniqueness_hold() {
    let country = named_region(1, "Country", 2, square((0.0, 0.0), (100.0, 100.0)));
    let region_a = named_region(2, "RegionA", 4, square((0.0, 0.0), (40.0, 40.0)));
    let region_b = named_region(3, "RegionB", 4, square((50.0, 50.0), (90.0, 90.0)));
    let sub_a1 = named_region(4, "SubA1", 6, square((5.0, 5.0), (15.0, 15.0)));
    let sub_a2 = named_region(5, "SubA2", 6, square((20.0, 20.0), (30.0, 30.0)));
    let sub_b1 = named_region(6, "SubB1", 6, square((55.0, 55.0), (65.0, 65.0)));

    let h = hierarchy::build(vec![country, region_a, region_b, sub_a1, sub_a2, sub_b1]);
    assert_containment_sound(&h);
    assert_sibling_uniqueness(&h);
}

fn assert_containment_sound(h: &Hierarchy) {
    for node in h.nodes.values() {
        if let Some(parent_idx) = node.parent {
            let parent = &h.nodes[&parent_idx];
            assert!(
                parent.region.contains(&node.region, hierarchy::OVERLAP_CONTAINMENT_THRESHOLD),
                "{} is not contained in its parent {}",
                node.region.id,
                parent.region.id
            );
        }
    }
}

fn assert_sibling_uniqueness(h: &Hierarchy) {
    for node in h.nodes.values() {
        let mut seen = HashSet::new();
        for &child_idx in &node.children {
            let id = h.nodes[&child_idx].region.id;
            assert!(seen.insert(id), "duplicate sibling id {}", id);
        }
    }
}

/// Running the full repair + build + serialize chain twice on the same
/// input yields byte-identical JSONL.
#[test]
fn hierarchy_and_serialization_are_deterministic() {
    let build_input = || {
        let country = named_region(1, "Country", 2, square((0.0, 0.0), (100.0, 100.0)));
        let region = named_region(2, "Region", 4, square((10.0, 10.0), (40.0, 40.0)));
        let mut cities = LangName::new();
        cities.set("default", "Capital");
        let mut data = RegionData::new();
        data.place = PlaceKind::City;
        let point_city = PointCity::new(ObjectId::new(Kind::Node, 9), cities, data, Point::new(20.0, 20.0));
        (vec![country, region], vec![point_city])
    };

    let mut paths = Vec::new();
    for i in 0..2 {
        let (regions, points) = build_input();
        let repaired = repair::repair(regions, points);
        let h = hierarchy::build(repaired);
        let path = std::env::temp_dir().join(format!("geohierarchy-determinism-test-{}.jsonl", i));
        serialize_jsonl(&h, path.to_str().unwrap(), false).unwrap();
        paths.push(path);
    }

    let a = std::fs::read(&paths[0]).unwrap();
    let b = std::fs::read(&paths[1]).unwrap();
    assert_eq!(a, b, "two runs over identical input produced different JSONL");

    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

/// An admin-center-fused region keeps the place/name it borrowed from its
/// `PointCity` and still nests correctly under its country afterward.
#[test]
fn repaired_admin_center_region_nests_under_its_country() {
    let country = named_region(1, "Bigland", 2, square((0.0, 0.0), (100.0, 100.0)));

    // City sanity clamp is 10*pi*r^2; with City's radius (0.078) that's
    // ~0.19 mercator units, so the admin-center region has to stay small.
    let mut admin_center_data = RegionData::new();
    admin_center_data.admin_center = Some(ObjectId::new(Kind::Node, 42));
    let fused_region = Region::new(
        ObjectId::new(Kind::Relation, 2),
        LangName::new(),
        admin_center_data,
        square((10.0, 10.0), (10.3, 10.3)),
    )
    .unwrap();

    let mut city_name = LangName::new();
    city_name.set("default", "Metropolis");
    let mut city_data = RegionData::new();
    city_data.place = PlaceKind::City;
    let city = PointCity::new(
        ObjectId::new(Kind::Node, 42),
        city_name,
        city_data,
        Point::new(10.15, 10.15),
    );

    let repaired = repair::repair(vec![country, fused_region], vec![city]);
    assert_eq!(repaired.len(), 2);

    let h = hierarchy::build(repaired);
    assert_eq!(h.roots.len(), 1);
    let root = h.roots[0];
    assert_eq!(h.nodes[&root].children.len(), 1);
    let child_idx = h.nodes[&root].children[0];
    assert_eq!(h.nodes[&child_idx].region.name.default_name(), Some("Metropolis"));
    assert_eq!(h.nodes[&child_idx].region.data.place, PlaceKind::City);
}

/// Re-running repair over the already-repaired region set (no more
/// point-cities left to fuse or approximate) is a no-op.
#[test]
fn repair_is_idempotent_once_point_cities_are_consumed() {
    let country = named_region(1, "Country", 2, square((0.0, 0.0), (10.0, 10.0)));
    let first_pass = repair::repair(vec![country], vec![]);
    let second_pass = repair::repair(first_pass.clone(), vec![]);

    assert_eq!(first_pass.len(), second_pass.len());
    for (a, b) in first_pass.iter().zip(second_pass.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.name.default_name(), b.name.default_name());
        assert_eq!(a.label(), b.label());
    }
}
