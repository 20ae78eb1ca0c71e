use std::f64::consts::PI;

use log::warn;

use crate::object_id::ObjectId;
use crate::region::{disc_polygon, PointCity, Region};
use crate::region_data::PlaceKind;

const DISC_POINTS: usize = 16;

pub fn repair(regions: Vec<Region>, point_cities: Vec<PointCity>) -> Vec<Region> {
    let (fused, unconsumed_cities) = fuse_admin_centers(regions, point_cities);
    let mut out = fused;
    out.extend(approximate_points(unconsumed_cities));
    out.retain(|r| !r.label().is_empty() && r.name.default_name().map_or(false, |n| !n.is_empty()));
    out
}

/// Phase 1: for every region with an `admin_center` reference, try to
/// borrow the referenced point-city's name/place and mark the city
/// consumed.
fn fuse_admin_centers(
    regions: Vec<Region>,
    point_cities: Vec<PointCity>,
) -> (Vec<Region>, Vec<PointCity>) {
    let mut cities_by_id: std::collections::HashMap<ObjectId, PointCity> =
        point_cities.into_iter().map(|c| (c.id, c)).collect();

    let (mut with_admin_center, without_admin_center): (Vec<Region>, Vec<Region>) =
        regions.into_iter().partition(|r| r.data.admin_center.is_some());

    // Built once, upfront, from the regions that were *not* split out for
    // admin-center fixing -- the pre-existing, independently named/ranked
    // locality regions a point-city might already be represented by
    // elsewhere in the input. Unlike a per-pass dedup set, this can catch
    // a city shadowed by a region nothing in this loop ever touches.
    let locality_checker: Vec<(&str, i32, &Region)> = without_admin_center
        .iter()
        .filter_map(|r| {
            let name = r.name.default_name().filter(|n| !n.is_empty())?;
            r.is_locality().then(|| (name, r.rank(), r))
        })
        .collect();

    // Ascending-area, ascending-id order for determinism.
    with_admin_center.sort_by(|a, b| {
        a.area()
            .partial_cmp(&b.area())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    // Fixed clamp regardless of the matched city's own place kind: the
    // original keys this off City's radius specifically, not the
    // admin-center's, so a town- or locality-labeled admin-centre is not
    // punished for having a smaller approximation radius.
    let city_radius = PlaceKind::City.approximation_radius().unwrap();
    let max_area = 10.0 * PI * city_radius * city_radius;

    for region in with_admin_center.iter_mut() {
        let admin_center = region
            .data
            .admin_center
            .expect("partitioned into with_admin_center by this field being Some");
        if region.is_country() {
            continue;
        }
        if !region.label().is_empty() {
            continue;
        }
        let city = match cities_by_id.get(&admin_center) {
            Some(c) => c,
            None => continue,
        };
        if region.area() > max_area {
            warn!(
                "skipping admin-center fusion for {}: area {} exceeds sanity clamp {}",
                region.id,
                region.area(),
                max_area
            );
            continue;
        }
        let city_rank = city.data.rank();
        let city_name = city.name.default_name().unwrap_or("");
        let is_shadowed = locality_checker
            .iter()
            .any(|(name, rank, existing)| *name == city_name && *rank == city_rank && existing.contains_point(city.point));
        if is_shadowed {
            continue;
        }

        region.name = city.name.clone();
        region.data.place = city.data.place;
        region.data.admin_level = city.data.admin_level;

        cities_by_id.remove(&admin_center);
    }

    let mut out = with_admin_center;
    out.extend(without_admin_center);
    (out, cities_by_id.into_values().collect())
}

/// Phase 2: synthesize a disc-shaped `Region` for every remaining
/// point-city with a known, non-locality place kind.
fn approximate_points(cities: Vec<PointCity>) -> Vec<Region> {
    cities
        .into_iter()
        .filter_map(|city| {
            let radius = city.data.place.approximation_radius()?;
            let polygon = disc_polygon(city.point, radius, DISC_POINTS);
            Region::new(
                city.id,
                city.name,
                city.data,
                geo_types::MultiPolygon(vec![polygon]),
            )
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lang_name::LangName;
    use crate::object_id::Kind;
    use geo_types::Point;
    use crate::region_data::{AdminLevel, RegionData};
    use geo_types::{Coordinate, LineString, MultiPolygon, Polygon};

    fn square_region_sized(id: u64, admin_center: Option<ObjectId>, side: f64) -> Region {
        let exterior = LineString(vec![
            Coordinate { x: 0.0, y: 0.0 },
            Coordinate { x: side, y: 0.0 },
            Coordinate { x: side, y: side },
            Coordinate { x: 0.0, y: side },
            Coordinate { x: 0.0, y: 0.0 },
        ]);
        let mut data = RegionData::new();
        data.admin_center = admin_center;
        Region::new(
            ObjectId::new(Kind::Relation, id),
            LangName::new(),
            data,
            MultiPolygon(vec![Polygon::new(exterior, vec![])]),
        )
        .unwrap()
    }

    // Well under the 10*pi*0.078^2 ~= 0.191 sanity clamp.
    fn square_region(id: u64, admin_center: Option<ObjectId>) -> Region {
        square_region_sized(id, admin_center, 0.1)
    }

    fn city(id: u64, name: &str, place: PlaceKind, point: (f64, f64)) -> PointCity {
        let mut name_map = LangName::new();
        name_map.set("default", name);
        let mut data = RegionData::new();
        data.place = place;
        PointCity::new(
            ObjectId::new(Kind::Node, id),
            name_map,
            data,
            Point::new(point.0, point.1),
        )
    }

    #[test]
    fn admin_center_fusion_borrows_city_name_and_place() {
        let city_id = ObjectId::new(Kind::Node, 9);
        let region = square_region(1, Some(city_id));
        let city = city(9, "Metropolis", PlaceKind::City, (5.0, 5.0));

        let result = repair(vec![region], vec![city]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name.default_name(), Some("Metropolis"));
        assert_eq!(result[0].data.place, PlaceKind::City);
    }

    #[test]
    fn locality_admin_center_still_fuses() {
        // a locality point-city has no approximation radius of its own,
        // but that only matters for point-approximation (phase 2); the
        // admin-center clamp is fixed at City's radius, so fusion must
        // not skip it.
        let city_id = ObjectId::new(Kind::Node, 9);
        let region = square_region(1, Some(city_id));
        let city = city(9, "Crossroads", PlaceKind::Locality, (5.0, 5.0));

        let result = repair(vec![region], vec![city]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name.default_name(), Some("Crossroads"));
        assert_eq!(result[0].data.place, PlaceKind::Locality);
    }

    #[test]
    fn preexisting_standalone_locality_shadows_admin_center_fusion() {
        // A pre-existing, independent locality region ("Harborview") with
        // the same name and rank as an admin-center's referenced city, and
        // whose polygon already covers that city's point. Nothing in this
        // pass fuses or touches this region -- the checker must still be
        // built from it upfront, not only from same-pass fusions.
        let mut existing_name = LangName::new();
        existing_name.set("default", "Harborview");
        let mut existing_data = RegionData::new();
        existing_data.place = PlaceKind::City;
        let existing_locality = Region::new(
            ObjectId::new(Kind::Relation, 2),
            existing_name,
            existing_data,
            {
                let exterior = LineString(vec![
                    Coordinate { x: 0.0, y: 0.0 },
                    Coordinate { x: 20.0, y: 0.0 },
                    Coordinate { x: 20.0, y: 20.0 },
                    Coordinate { x: 0.0, y: 20.0 },
                    Coordinate { x: 0.0, y: 0.0 },
                ]);
                MultiPolygon(vec![Polygon::new(exterior, vec![])])
            },
        )
        .unwrap();

        let city_id = ObjectId::new(Kind::Node, 9);
        let admin_region = square_region(1, Some(city_id));
        let city = city(9, "Harborview", PlaceKind::City, (5.05, 5.05));

        let result = repair(vec![existing_locality, admin_region], vec![city]);

        // the admin-center region stayed unlabeled (fusion was shadowed)
        // and was dropped by the final filter.
        assert!(
            !result.iter().any(|r| r.id == ObjectId::new(Kind::Relation, 1)),
            "admin-center region should not have been fused or kept"
        );
        // the city was left unconsumed and fell through to point-approximation
        // under its own id, instead of being absorbed into the admin region.
        let approximated = result
            .iter()
            .find(|r| r.id == ObjectId::new(Kind::Node, 9))
            .expect("unconsumed city should have been point-approximated");
        assert_eq!(approximated.name.default_name(), Some("Harborview"));
        assert!(approximated.area() < 1.0, "approximated disc should be small, not the admin region's square");

        // the pre-existing locality region itself survives untouched.
        assert!(result.iter().any(|r| r.id == ObjectId::new(Kind::Relation, 2)));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn oversized_region_is_not_fused() {
        let city_id = ObjectId::new(Kind::Node, 9);
        // the clamp is fixed at City's radius regardless of the matched
        // city's own place kind, so a 10x10 region is far beyond it even
        // though the admin-centre here is a hamlet.
        let region = square_region_sized(1, Some(city_id), 10.0);
        let city = city(9, "Tiny", PlaceKind::Hamlet, (5.0, 5.0));

        let result = repair(vec![region], vec![city]);
        // the area region stays unlabeled and is filtered out, but the
        // unconsumed city still gets its own disc-approximated region.
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name.default_name(), Some("Tiny"));
    }

    #[test]
    fn unconsumed_city_becomes_disc_region() {
        let city = city(1, "Smallville", PlaceKind::Town, (0.0, 0.0));
        let result = repair(vec![], vec![city]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name.default_name(), Some("Smallville"));
        assert!(result[0].area() > 0.0);
    }

    #[test]
    fn locality_point_city_is_dropped() {
        let city = city(1, "Nowhere", PlaceKind::Locality, (0.0, 0.0));
        let result = repair(vec![], vec![city]);
        assert!(result.is_empty());
    }
}
