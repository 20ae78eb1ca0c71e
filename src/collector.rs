use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use crate::error::CoreError;
use crate::object_id::{self, ObjectId};
use crate::region_data::{AdminLevel, IsoCode, PlaceKind, RegionData};

const FORMAT_VERSION: u8 = 0;

#[derive(Debug, Clone, Default)]
pub struct RegionInfo {
    pub region_data: BTreeMap<ObjectId, RegionData>,
}

impl RegionInfo {
    pub fn new() -> Self {
        RegionInfo::default()
    }

    pub fn observe<'a>(
        &mut self,
        id: ObjectId,
        tags: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let mut data = RegionData::new();
        let mut is_boundary = false;
        let tags: Vec<(&str, &str)> = tags.into_iter().collect();

        for &(key, value) in &tags {
            match key {
                "place" => data.place = PlaceKind::from_tag(value),
                "boundary" if value == "administrative" => is_boundary = true,
                "admin_level" => data.admin_level = AdminLevel::from_tag(value),
                "admin_centre" => { /* resolved from relation members, not tags */ }
                _ => {}
            }
        }

        if !is_boundary {
            data.admin_level = AdminLevel::Unknown;
        }

        if data.place == PlaceKind::Unknown && data.admin_level == AdminLevel::Unknown {
            return;
        }

        if data.admin_level == AdminLevel::Level(2) {
            let mut iso = IsoCode::default();
            let mut has_iso = false;
            for &(key, value) in &tags {
                match key {
                    "ISO3166-1:alpha2" => {
                        iso.set_alpha2(value);
                        has_iso = true;
                    }
                    "ISO3166-1:alpha3" => {
                        iso.set_alpha3(value);
                        has_iso = true;
                    }
                    "ISO3166-1:numeric" => {
                        iso.set_numeric(value);
                        has_iso = true;
                    }
                    _ => {}
                }
            }
            if has_iso {
                data.iso_code = Some(iso);
            }
        }

        self.region_data.insert(id, data);
    }

    pub fn set_admin_center(&mut self, id: ObjectId, admin_center: ObjectId) {
        if let Some(data) = self.region_data.get_mut(&id) {
            data.admin_center = Some(admin_center);
        }
    }

    /// Writes the versioned binary format: 1-byte version, then two
    /// length-prefixed maps (region data, iso codes). Each `RegionData`
    /// record is the literal `{admin_level: u8, place: u8, admin_center:
    /// u64, reserved: u8}` layout: absence of an admin center is encoded as
    /// [`object_id::NONE_SENTINEL`] in the fixed `admin_center` slot rather
    /// than a smuggled-in presence flag, and `reserved` is always zero.
    pub fn save(&self, mut out: impl Write) -> Result<(), CoreError> {
        out.write_all(&[FORMAT_VERSION]).map_err(io_err)?;

        write_map(&mut out, self.region_data.iter(), |w, data| {
            w.write_all(&[admin_level_byte(data.admin_level), data.place as u8])?;
            let admin_center = data
                .admin_center
                .map(|id| id.packed())
                .unwrap_or(object_id::NONE_SENTINEL);
            w.write_all(&admin_center.to_le_bytes())?;
            w.write_all(&[0u8])?; // reserved
            Ok(())
        })
        .map_err(io_err)?;

        let iso_entries: Vec<_> = self
            .region_data
            .iter()
            .filter_map(|(id, data)| data.iso_code.map(|iso| (*id, iso)))
            .collect();
        write_map(&mut out, iso_entries.iter().map(|(id, iso)| (id, iso)), |w, iso| {
            w.write_all(&iso.alpha2)?;
            w.write_all(&iso.alpha3)?;
            w.write_all(&iso.numeric)?;
            Ok(())
        })
        .map_err(io_err)?;

        Ok(())
    }

    /// Reads the binary format written by [`RegionInfo::save`], validating
    /// the version byte.
    pub fn load(mut input: impl Read) -> Result<Self, CoreError> {
        let mut version = [0u8; 1];
        input.read_exact(&mut version).map_err(io_err)?;
        if version[0] != FORMAT_VERSION {
            return Err(CoreError::FormatMismatch {
                expected: FORMAT_VERSION,
                found: version[0],
            });
        }

        let mut region_data = BTreeMap::new();
        read_map(&mut input, |r| {
            let mut header = [0u8; 2];
            r.read_exact(&mut header).map_err(io_err)?;
            let mut center_bytes = [0u8; 8];
            r.read_exact(&mut center_bytes).map_err(io_err)?;
            let mut reserved = [0u8; 1];
            r.read_exact(&mut reserved).map_err(io_err)?;
            let packed_center = u64::from_le_bytes(center_bytes);
            let admin_center = if packed_center == object_id::NONE_SENTINEL {
                None
            } else {
                Some(ObjectId::from_packed(packed_center))
            };
            Ok(RegionData {
                admin_level: admin_level_from_byte(header[0]),
                place: place_from_byte(header[1]),
                admin_center,
                iso_code: None,
            })
        })
        .map_err(io_err)?
        .into_iter()
        .for_each(|(id, data)| {
            region_data.insert(id, data);
        });

        let iso_codes: Vec<(ObjectId, IsoCode)> = read_map(&mut input, |r| {
            let mut iso = IsoCode::default();
            r.read_exact(&mut iso.alpha2).map_err(io_err)?;
            r.read_exact(&mut iso.alpha3).map_err(io_err)?;
            r.read_exact(&mut iso.numeric).map_err(io_err)?;
            Ok(iso)
        })
        .map_err(io_err)?;

        for (id, iso) in iso_codes {
            if let Some(data) = region_data.get_mut(&id) {
                data.iso_code = Some(iso);
            }
        }

        Ok(RegionInfo { region_data })
    }
}

fn admin_level_byte(level: AdminLevel) -> u8 {
    level.value().unwrap_or(0)
}

fn admin_level_from_byte(byte: u8) -> AdminLevel {
    if (1..=12).contains(&byte) {
        AdminLevel::Level(byte)
    } else {
        AdminLevel::Unknown
    }
}

fn place_from_byte(byte: u8) -> PlaceKind {
    match byte {
        1 => PlaceKind::City,
        2 => PlaceKind::Town,
        3 => PlaceKind::Village,
        4 => PlaceKind::Suburb,
        5 => PlaceKind::Neighbourhood,
        6 => PlaceKind::Hamlet,
        7 => PlaceKind::Locality,
        8 => PlaceKind::IsolatedDwelling,
        _ => PlaceKind::Unknown,
    }
}

fn write_map<'a, K, V: 'a>(
    out: &mut impl Write,
    entries: impl Iterator<Item = (&'a ObjectId, &'a V)> + ExactSizeIterator,
    mut write_value: impl FnMut(&mut dyn Write, &V) -> io::Result<()>,
) -> io::Result<()>
where
    K: 'a,
{
    out.write_all(&(entries.len() as u64).to_le_bytes())?;
    for (id, value) in entries {
        out.write_all(&id.packed().to_le_bytes())?;
        write_value(out, value)?;
    }
    Ok(())
}

fn read_map<V>(
    input: &mut impl Read,
    mut read_value: impl FnMut(&mut dyn Read) -> Result<V, CoreError>,
) -> Result<Vec<(ObjectId, V)>, CoreError> {
    let mut len_bytes = [0u8; 8];
    input.read_exact(&mut len_bytes).map_err(io_err)?;
    let len = u64::from_le_bytes(len_bytes) as usize;
    let mut out = Vec::with_capacity(len.min(1 << 20));
    for _ in 0..len {
        let mut id_bytes = [0u8; 8];
        input.read_exact(&mut id_bytes).map_err(io_err)?;
        let id = ObjectId::from_packed(u64::from_le_bytes(id_bytes));
        let value = read_value(input)?;
        out.push((id, value));
    }
    Ok(out)
}

fn io_err(e: io::Error) -> CoreError {
    CoreError::IoMissing(e.to_string())
}
