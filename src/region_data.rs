use crate::object_id::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde_derive::Serialize, serde_derive::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaceKind {
    Unknown,
    City,
    Town,
    Village,
    Suburb,
    Neighbourhood,
    Hamlet,
    Locality,
    IsolatedDwelling,
}

impl PlaceKind {
    pub fn from_tag(tag: &str) -> PlaceKind {
        match tag {
            "city" => PlaceKind::City,
            "town" => PlaceKind::Town,
            "village" => PlaceKind::Village,
            "suburb" => PlaceKind::Suburb,
            "neighbourhood" | "neighborhood" => PlaceKind::Neighbourhood,
            "hamlet" => PlaceKind::Hamlet,
            "locality" => PlaceKind::Locality,
            "isolated_dwelling" => PlaceKind::IsolatedDwelling,
            _ => PlaceKind::Unknown,
        }
    }

    /// Disc radius (mercator units) used by point-approximation. Returns
    /// `None` for kinds the repair pass never approximates.
    pub fn approximation_radius(self) -> Option<f64> {
        match self {
            PlaceKind::City => Some(0.078),
            PlaceKind::Town => Some(0.033),
            PlaceKind::Village => Some(0.013),
            PlaceKind::Hamlet => Some(0.0067),
            PlaceKind::Suburb => Some(0.016),
            PlaceKind::Neighbourhood | PlaceKind::IsolatedDwelling => Some(0.0035),
            PlaceKind::Locality | PlaceKind::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde_derive::Serialize, serde_derive::Deserialize)]
pub enum AdminLevel {
    Unknown,
    Level(u8),
}

impl AdminLevel {
    pub fn from_tag(tag: &str) -> AdminLevel {
        match tag.parse::<u8>() {
            Ok(level) if (1..=12).contains(&level) => AdminLevel::Level(level),
            _ => AdminLevel::Unknown,
        }
    }

    pub fn value(self) -> Option<u8> {
        match self {
            AdminLevel::Level(l) => Some(l),
            AdminLevel::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct IsoCode {
    pub alpha2: [u8; 3],
    pub alpha3: [u8; 4],
    pub numeric: [u8; 4],
}

impl IsoCode {
    pub fn set_alpha2(&mut self, s: &str) {
        write_ascii(&mut self.alpha2, s);
    }

    pub fn set_alpha3(&mut self, s: &str) {
        write_ascii(&mut self.alpha3, s);
    }

    pub fn set_numeric(&mut self, s: &str) {
        write_ascii(&mut self.numeric, s);
    }

    pub fn alpha2_str(&self) -> &str {
        ascii_str(&self.alpha2)
    }

    pub fn alpha3_str(&self) -> &str {
        ascii_str(&self.alpha3)
    }
}

fn write_ascii(buf: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(buf.len() - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
    for b in &mut buf[n..] {
        *b = 0;
    }
}

fn ascii_str(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end]).unwrap_or("")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct RegionData {
    pub admin_level: AdminLevel,
    pub place: PlaceKind,
    pub admin_center: Option<ObjectId>,
    pub iso_code: Option<IsoCode>,
}

impl RegionData {
    pub fn new() -> Self {
        RegionData {
            admin_level: AdminLevel::Unknown,
            place: PlaceKind::Unknown,
            admin_center: None,
            iso_code: None,
        }
    }

    pub fn is_country(&self) -> bool {
        self.place == PlaceKind::Unknown && self.admin_level == AdminLevel::Level(2)
    }

    pub const NO_RANK: i32 = -1;

    /// Place-kind ranks are offset above the highest admin-level rank
    /// (subregion, 6) so a place is always deeper than any admin area it
    /// is found inside, regardless of which specific kind it is. Without
    /// the offset, `PlaceKind::City`'s ordinal (1) would sit below
    /// `admin_level=2`'s rank and spuriously invert the parent/child
    /// attach direction in `hierarchy::fold_country` whenever a city-kind
    /// region nests directly under a country.
    const PLACE_RANK_BASE: i32 = 10;

    pub fn rank(&self) -> i32 {
        match self.place {
            PlaceKind::Locality
            | PlaceKind::IsolatedDwelling
            | PlaceKind::City
            | PlaceKind::Town
            | PlaceKind::Village
            | PlaceKind::Hamlet => Self::PLACE_RANK_BASE + self.place as i32,
            PlaceKind::Suburb | PlaceKind::Neighbourhood => Self::PLACE_RANK_BASE + self.place as i32,
            PlaceKind::Unknown => match self.admin_level {
                AdminLevel::Level(2) => 2,
                AdminLevel::Level(4) => 4,
                AdminLevel::Level(6) => 6,
                _ => Self::NO_RANK,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self.place {
            PlaceKind::Locality | PlaceKind::IsolatedDwelling | PlaceKind::City
            | PlaceKind::Town | PlaceKind::Village | PlaceKind::Hamlet => "locality",
            PlaceKind::Suburb => "suburb",
            PlaceKind::Neighbourhood => "sublocality",
            PlaceKind::Unknown => match self.admin_level {
                AdminLevel::Level(2) => "country",
                AdminLevel::Level(4) => "region",
                AdminLevel::Level(6) => "subregion",
                _ => "",
            },
        }
    }
}

impl Default for RegionData {
    fn default() -> Self {
        RegionData::new()
    }
}
