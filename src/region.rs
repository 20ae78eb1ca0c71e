use geo::algorithm::area::Area;
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains as GeoContains;
use geo_booleanop::boolean::BooleanOp;
use geo_types::{Coordinate, MultiPolygon, Point, Polygon, Rect};

use crate::lang_name::LangName;
use crate::object_id::ObjectId;
use crate::region_data::RegionData;

#[derive(Debug, Clone)]
pub struct Region {
    pub id: ObjectId,
    pub name: LangName,
    pub data: RegionData,
    pub polygon: MultiPolygon<f64>,
    bbox: Rect<f64>,
    area: f64,
}

impl Region {
    pub fn new(
        id: ObjectId,
        name: LangName,
        data: RegionData,
        polygon: MultiPolygon<f64>,
    ) -> Option<Self> {
        let bbox = polygon.bounding_rect()?;
        let area = polygon.unsigned_area();
        Some(Region {
            id,
            name,
            data,
            polygon,
            bbox,
            area,
        })
    }

    pub fn bbox(&self) -> Rect<f64> {
        self.bbox
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn rank(&self) -> i32 {
        self.data.rank()
    }

    pub fn label(&self) -> &'static str {
        self.data.label()
    }

    pub fn is_country(&self) -> bool {
        self.data.is_country()
    }

    pub fn is_locality(&self) -> bool {
        self.label() == "locality"
    }

    /// `bbox cover AND (polygon cover OR overlap% >= threshold)`, the
    /// containment test the hierarchy builder folds over.
    pub fn contains(&self, other: &Region, overlap_threshold: f64) -> bool {
        if !bbox_covers(&self.bbox, &other.bbox) {
            return false;
        }
        if self.polygon.contains(&other.polygon) {
            return true;
        }
        self.overlap_percentage(other) >= overlap_threshold
    }

    pub fn contains_point(&self, point: Point<f64>) -> bool {
        rect_contains_point(&self.bbox, point) && self.polygon.contains(&point)
    }

    /// `area(intersection) / min(area(a), area(b)) * 100`.
    pub fn overlap_percentage(&self, other: &Region) -> f64 {
        let min_area = self.area.min(other.area);
        if min_area <= 0.0 {
            return 0.0;
        }
        let intersection = self.polygon.intersection(&other.polygon);
        let intersection_area = intersection.unsigned_area();
        (intersection_area / min_area) * 100.0
    }

    pub fn center(&self) -> Point<f64> {
        use geo::algorithm::centroid::Centroid;
        self.polygon
            .centroid()
            .unwrap_or_else(|| Point::new(self.bbox.min().x, self.bbox.min().y))
    }
}

#[derive(Debug, Clone)]
pub struct PointCity {
    pub id: ObjectId,
    pub name: LangName,
    pub data: RegionData,
    pub point: Point<f64>,
}

impl PointCity {
    pub fn new(id: ObjectId, name: LangName, data: RegionData, point: Point<f64>) -> Self {
        PointCity {
            id,
            name,
            data,
            point,
        }
    }
}

fn bbox_covers(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && outer.max().x >= inner.max().x
        && outer.max().y >= inner.max().y
}

fn rect_contains_point(rect: &Rect<f64>, point: Point<f64>) -> bool {
    let Coordinate { x, y } = point.0;
    rect.min().x <= x && x <= rect.max().x && rect.min().y <= y && y <= rect.max().y
}

/// Synthesizes a regular `n`-point polygon of the given radius (mercator
/// units) around `center`.
pub fn disc_polygon(center: Point<f64>, radius: f64, points: usize) -> Polygon<f64> {
    use std::f64::consts::PI;
    let mut coords: Vec<Coordinate<f64>> = (0..points)
        .map(|i| {
            let angle = 2.0 * PI * (i as f64) / (points as f64);
            Coordinate {
                x: center.x() + radius * angle.cos(),
                y: center.y() + radius * angle.sin(),
            }
        })
        .collect();
    coords.push(coords[0]);
    Polygon::new(coords.into(), vec![])
}
