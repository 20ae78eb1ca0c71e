use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains as GeoContains;
use geo::algorithm::intersects::Intersects;
use geo_types::{Coordinate, LineString, MultiPolygon, Point, Polygon, Rect};
use lazy_static::lazy_static;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

const DEFAULT_GRID_STEP: f64 = 0.1;

pub struct Country {
    pub name: String,
    pub polygon: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

impl Country {
    pub fn new(name: impl Into<String>, polygon: MultiPolygon<f64>) -> Option<Self> {
        let bbox = polygon.bounding_rect()?;
        Some(Country {
            name: name.into(),
            polygon,
            bbox,
        })
    }
}

struct GridCell {
    bbox: Rect<f64>,
    countries: Vec<usize>,
}

impl RTreeObject for GridCell {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min().x, self.bbox.min().y],
            [self.bbox.max().x, self.bbox.max().y],
        )
    }
}

pub struct AffiliationIndex {
    countries: Vec<Country>,
    tree: RTree<GridCell>,
    have_borders_for_whole_world: bool,
}

impl AffiliationIndex {
    /// Builds the grid in parallel: each cell is tested against every
    /// country whose bbox intersects the cell's bbox first (a cheap
    /// filter before the full polygon `intersects`).
    pub fn build(countries: Vec<Country>, have_borders_for_whole_world: bool) -> Self {
        Self::build_with_step(countries, have_borders_for_whole_world, DEFAULT_GRID_STEP)
    }

    pub fn build_with_step(
        countries: Vec<Country>,
        have_borders_for_whole_world: bool,
        step: f64,
    ) -> Self {
        let world_bbox = countries
            .iter()
            .fold(None::<Rect<f64>>, |acc, c| match acc {
                None => Some(c.bbox),
                Some(r) => Some(union_rect(r, c.bbox)),
            })
            .unwrap_or_else(|| Rect::new((0.0, 0.0), (0.0, 0.0)));

        let nx = (((world_bbox.max().x - world_bbox.min().x) / step).ceil() as i64).max(1);
        let ny = (((world_bbox.max().y - world_bbox.min().y) / step).ceil() as i64).max(1);

        let cells: Vec<(i64, i64)> = (0..nx)
            .flat_map(|ix| (0..ny).map(move |iy| (ix, iy)))
            .collect();

        let grid_cells: Vec<GridCell> = cells
            .into_par_iter()
            .filter_map(|(ix, iy)| {
                let min_x = world_bbox.min().x + (ix as f64) * step;
                let min_y = world_bbox.min().y + (iy as f64) * step;
                let cell_bbox = Rect::new((min_x, min_y), (min_x + step, min_y + step));

                let matches: Vec<usize> = countries
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| rect_intersects(&c.bbox, &cell_bbox))
                    .filter(|(_, c)| c.polygon.intersects(&rect_to_polygon(cell_bbox)))
                    .map(|(i, _)| i)
                    .collect();

                if matches.is_empty() {
                    None
                } else {
                    Some(GridCell {
                        bbox: cell_bbox,
                        countries: matches,
                    })
                }
            })
            .collect();

        AffiliationIndex {
            countries,
            tree: RTree::bulk_load(grid_cells),
            have_borders_for_whole_world,
        }
    }

    pub fn has_region_by_name(&self, name: &str) -> bool {
        self.countries.iter().any(|c| c.name == name)
    }

    /// Returns the (deduplicated, discovery-ordered) country names whose
    /// polygon contains `point`.
    pub fn affiliations_point(&self, point: Point<f64>) -> Vec<String> {
        let envelope = AABB::from_point([point.x(), point.y()]);
        let candidates: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .flat_map(|cell| cell.countries.iter().copied())
            .collect();

        if candidates.is_empty() {
            return Vec::new();
        }

        if self.have_borders_for_whole_world && candidates.len() == 1 {
            return vec![self.countries[candidates[0]].name.clone()];
        }

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for idx in candidates {
            let country = &self.countries[idx];
            if seen.contains(&idx) {
                continue;
            }
            if country.bbox.min().x <= point.x()
                && point.x() <= country.bbox.max().x
                && country.bbox.min().y <= point.y()
                && point.y() <= country.bbox.max().y
                && country.polygon.contains(&point)
            {
                seen.insert(idx);
                out.push(country.name.clone());
            }
        }
        out
    }

    /// Unions `affiliations_point` over the outer-ring points of a
    /// feature's bbox corners; a cheap over-approximation suitable for
    /// bucketing a feature's candidate countries.
    pub fn affiliations_bbox(&self, bbox: Rect<f64>) -> Vec<String> {
        let corners = [
            Point::new(bbox.min().x, bbox.min().y),
            Point::new(bbox.max().x, bbox.min().y),
            Point::new(bbox.max().x, bbox.max().y),
            Point::new(bbox.min().x, bbox.max().y),
        ];
        let mut out = Vec::new();
        for p in &corners {
            for name in self.affiliations_point(*p) {
                if !out.contains(&name) {
                    out.push(name);
                }
            }
        }
        out
    }
}

fn rect_to_polygon(rect: Rect<f64>) -> Polygon<f64> {
    let exterior = LineString(vec![
        Coordinate { x: rect.min().x, y: rect.min().y },
        Coordinate { x: rect.max().x, y: rect.min().y },
        Coordinate { x: rect.max().x, y: rect.max().y },
        Coordinate { x: rect.min().x, y: rect.max().y },
        Coordinate { x: rect.min().x, y: rect.min().y },
    ]);
    Polygon::new(exterior, vec![])
}

fn rect_intersects(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && a.max().x >= b.min().x && a.min().y <= b.max().y && a.max().y >= b.min().y
}

fn union_rect(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
        (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
    )
}

/// Either a full grid index, or a fixed single-bucket fallback for test
/// fixtures and single-country extracts where no border file is given.
pub enum Affiliation {
    Index(Arc<AffiliationIndex>),
    Single(String),
}

impl Affiliation {
    pub fn affiliations_point(&self, point: Point<f64>) -> Vec<String> {
        match self {
            Affiliation::Index(index) => index.affiliations_point(point),
            Affiliation::Single(name) => vec![name.clone()],
        }
    }
}

lazy_static! {
    static ref MEMO: Mutex<HashMap<(String, bool), Arc<AffiliationIndex>>> =
        Mutex::new(HashMap::new());
}

/// Returns a shared, memoized index for `path`, building it with `build`
/// only on first request for this `(path, have_borders_for_whole_world)`
/// pair. Concurrent callers block on the same mutex and the second one
/// observes the freshly inserted entry instead of rebuilding.
pub fn memoized_index(
    path: &str,
    have_borders_for_whole_world: bool,
    build: impl FnOnce() -> AffiliationIndex,
) -> Arc<AffiliationIndex> {
    let key = (path.to_string(), have_borders_for_whole_world);
    let mut memo = MEMO.lock().unwrap();
    if let Some(existing) = memo.get(&key) {
        return Arc::clone(existing);
    }
    let index = Arc::new(build());
    memo.insert(key, Arc::clone(&index));
    index
}
