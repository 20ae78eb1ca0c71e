use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use geo_types::Point;
use log::{debug, info, warn};
use osm_boundaries_utils::build_boundary;
use osmpbfreader::objects::{OsmId, OsmObj};
use osmpbfreader::OsmPbfReader;

use crate::collector::RegionInfo;
use crate::error::CoreError;
use crate::hierarchy::{self, Hierarchy};
use crate::lang_name::LangName;
use crate::object_id::ObjectId;
use crate::region::{PointCity, Region};
use crate::repair;
use crate::stats::Stats;

fn object_id_of(osm_id: OsmId) -> ObjectId {
    match osm_id {
        OsmId::Node(n) => ObjectId::from_osm_node(n.0 as u64),
        OsmId::Way(w) => ObjectId::from_osm_way(w.0 as u64),
        OsmId::Relation(r) => ObjectId::from_osm_relation(r.0 as u64),
    }
}

fn is_region_candidate(obj: &OsmObj) -> bool {
    let tags = obj.tags();
    tags.get("place").is_some()
        || (tags.get("boundary").map_or(false, |v| v == "administrative")
            && tags.get("admin_level").is_some())
}

fn collect(objects: &BTreeMap<OsmId, OsmObj>) -> RegionInfo {
    let mut info = RegionInfo::new();

    for obj in objects.values() {
        if !is_region_candidate(obj) {
            continue;
        }
        let id = object_id_of(obj.id());
        let tags: Vec<(&str, &str)> = obj
            .tags()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        info.observe(id, tags);

        if let OsmObj::Relation(relation) = obj {
            if let Some(center) = relation
                .refs
                .iter()
                .find(|r| r.role == "admin_centre")
                .and_then(|r| objects.get(&r.member))
            {
                info.set_admin_center(id, object_id_of(center.id()));
            }
        }
    }

    info
}

fn build_regions_and_points(
    objects: &BTreeMap<OsmId, OsmObj>,
    info: &RegionInfo,
) -> (Vec<Region>, Vec<PointCity>) {
    let mut regions = Vec::new();
    let mut point_cities = Vec::new();

    for (&id, data) in &info.region_data {
        let obj = match objects.get(&to_osm_id(id)) {
            Some(o) => o,
            None => continue,
        };

        match obj {
            OsmObj::Relation(relation) => {
                let name = LangName::from_tags(
                    relation.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                );
                let boundary = match build_boundary(relation, objects) {
                    Some(b) => b,
                    None => {
                        warn!("{}", CoreError::GeometryInvalid(id.to_string()));
                        continue;
                    }
                };
                match Region::new(id, name, *data, boundary) {
                    Some(region) => regions.push(region),
                    None => warn!("{}", CoreError::GeometryInvalid(id.to_string())),
                }
            }
            OsmObj::Node(node) => {
                let name = LangName::from_tags(
                    node.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                );
                let point = Point::new(node.lon(), node.lat());
                point_cities.push(PointCity::new(id, name, *data, point));
            }
            OsmObj::Way(_) => {
                debug!("way {} tagged as a region candidate, unsupported, skipped", id);
            }
        }
    }

    (regions, point_cities)
}

fn to_osm_id(id: ObjectId) -> OsmId {
    use crate::object_id::Kind;
    use osmpbfreader::objects::{NodeId, RelationId, WayId};
    match id.kind() {
        Some(Kind::Node) | Some(Kind::ObsoleteNode) => OsmId::Node(NodeId(id.serial() as i64)),
        Some(Kind::Way) | Some(Kind::ObsoleteWay) => OsmId::Way(WayId(id.serial() as i64)),
        _ => OsmId::Relation(RelationId(id.serial() as i64)),
    }
}

pub fn run(pbf: &mut OsmPbfReader<File>) -> Result<(Hierarchy, Stats), CoreError> {
    info!("reading pbf...");
    let objects = pbf
        .get_objs_and_deps(is_region_candidate)
        .map_err(|e| CoreError::IoMissing(e.to_string()))?;
    info!("read {} candidate-related objects", objects.len());

    let region_info = collect(&objects);
    info!("collected {} region-info entries", region_info.region_data.len());

    let (regions, point_cities) = build_regions_and_points(&objects, &region_info);
    info!(
        "materialized {} regions and {} point cities",
        regions.len(),
        point_cities.len()
    );

    let point_city_count = point_cities.len();
    let repaired = repair::repair(regions, point_cities);
    info!("repair pass left {} regions", repaired.len());

    let hierarchy = hierarchy::build(repaired);
    let stats = Stats::compute(&hierarchy, point_city_count);
    Ok((hierarchy, stats))
}

pub fn run_from_file(pbf_path: impl AsRef<Path>) -> Result<(Hierarchy, Stats), CoreError> {
    let path = pbf_path.as_ref();
    let file = File::open(path).map_err(|e| CoreError::IoMissing(e.to_string()))?;
    let mut parsed = OsmPbfReader::new(file);
    run(&mut parsed)
}
