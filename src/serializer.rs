use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use log::warn;
use serde_json::{json, Value};

use crate::error::CoreError;
use crate::hierarchy::Hierarchy;
use crate::lang_name::LangName;

fn is_gzip_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

fn open_writer(path: &str) -> Result<Box<dyn Write>, CoreError> {
    let file = File::create(path).map_err(|e| CoreError::IoMissing(e.to_string()))?;
    let buffered = BufWriter::new(file);
    if is_gzip_path(path) {
        Ok(Box::new(GzEncoder::new(buffered, Compression::default())))
    } else {
        Ok(Box::new(buffered))
    }
}

fn english_or_transliterated_name(name: &LangName) -> String {
    if let Some(en) = name.get("en") {
        return en.to_string();
    }
    name.international_names()
        .next()
        .map(|(_, v)| v.to_string())
        .unwrap_or_default()
}

/// Builds the `address` object: this node's own label first, then each
/// ancestor's, innermost wins on a label collision.
fn build_address(hierarchy: &Hierarchy, idx: usize, verbose: bool) -> Value {
    let mut by_label: BTreeMap<&'static str, Value> = BTreeMap::new();
    let mut chain = vec![idx];
    chain.extend(hierarchy.ancestors(idx));

    for &i in &chain {
        let node = match hierarchy.nodes.get(&i) {
            Some(n) => n,
            None => continue,
        };
        let label = node.region.label();
        if label.is_empty() || by_label.contains_key(label) {
            continue;
        }
        let name = node.region.name.default_name().unwrap_or("").to_string();
        if !verbose {
            by_label.insert(label, Value::String(name));
        } else {
            by_label.insert(
                label,
                json!({
                    "name": name,
                    "_i": node.region.id.packed(),
                    "_a": node.region.area(),
                    "_r": node.region.rank(),
                }),
            );
        }
    }

    Value::Object(by_label.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
}

fn build_locales(hierarchy: &Hierarchy, idx: usize) -> Value {
    let mut by_label: BTreeMap<&'static str, String> = BTreeMap::new();
    let mut chain = vec![idx];
    chain.extend(hierarchy.ancestors(idx));

    for &i in &chain {
        let node = match hierarchy.nodes.get(&i) {
            Some(n) => n,
            None => continue,
        };
        let label = node.region.label();
        if label.is_empty() || by_label.contains_key(label) {
            continue;
        }
        by_label.insert(label, english_or_transliterated_name(&node.region.name));
    }

    json!({ "en": Value::Object(by_label.into_iter().map(|(k, v)| (k.to_string(), Value::String(v))).collect()) })
}

fn region_code(hierarchy: &Hierarchy, idx: usize) -> Option<String> {
    let node = hierarchy.nodes.get(&idx)?;
    let iso = node.region.data.iso_code?;
    let code = iso.alpha2_str();
    if code.is_empty() {
        None
    } else {
        Some(code.to_string())
    }
}

fn to_json_line(hierarchy: &Hierarchy, idx: usize, verbose: bool) -> Value {
    let node = &hierarchy.nodes[&idx];
    let center = node.region.center();
    let mut properties = json!({
        "name": node.region.name.default_name().unwrap_or(""),
        "rank": node.region.rank(),
        "address": build_address(hierarchy, idx, verbose),
        "locales": build_locales(hierarchy, idx),
    });
    if let Some(code) = region_code(hierarchy, idx) {
        properties["code"] = Value::String(code);
    }

    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": [center.x(), center.y()],
        },
        "properties": properties,
    })
}

/// Sorts node indices by object id and drops any index whose id was
/// already emitted by an earlier one. Two distinct nodes can share an
/// object id when they sit under different parents in different country
/// trees (`NormalizeChildren` only dedupes siblings of one parent). The
/// second emission is a `duplicate-id` warning, not a fatal error.
fn sorted_deduped_indices(hierarchy: &Hierarchy) -> Vec<usize> {
    let mut indices: Vec<usize> = hierarchy.nodes.keys().copied().collect();
    indices.sort_by_key(|&i| hierarchy.nodes[&i].id().packed());

    let mut out = Vec::with_capacity(indices.len());
    let mut last_id = None;
    for idx in indices {
        let id = hierarchy.nodes[&idx].id();
        if last_id == Some(id) {
            warn!("{}", CoreError::DuplicateId(id.to_string()));
            continue;
        }
        last_id = Some(id);
        out.push(idx);
    }
    out
}

/// Streams one JSON object per line, one per hierarchy node (not just
/// roots).
pub fn serialize_jsonl(hierarchy: &Hierarchy, path: &str, verbose: bool) -> Result<(), CoreError> {
    let mut writer = open_writer(path)?;
    let indices = sorted_deduped_indices(hierarchy);

    for idx in indices {
        let line = to_json_line(hierarchy, idx, verbose);
        serde_json::to_writer(&mut writer, &line).map_err(|e| CoreError::Internal(e.to_string()))?;
        writer
            .write_all(b"\n")
            .map_err(|e| CoreError::IoMissing(e.to_string()))?;
    }
    Ok(())
}

pub fn serialize_csv(hierarchy: &Hierarchy, path: &str) -> Result<(), CoreError> {
    let mut writer = open_writer(path)?;
    writeln!(writer, "Id;Parent id;Lat;Lon;Main type;Name;Level")
        .map_err(|e| CoreError::IoMissing(e.to_string()))?;

    let indices = sorted_deduped_indices(hierarchy);

    for idx in indices {
        let node = &hierarchy.nodes[&idx];
        let center = node.region.center();
        let parent_id = node
            .parent
            .and_then(|p| hierarchy.nodes.get(&p))
            .map(|p| p.id().to_string())
            .unwrap_or_default();
        let name = node.region.name.default_name().unwrap_or("");
        writeln!(
            writer,
            "{};{};{:.7};{:.7};{};{};{}",
            node.id(),
            parent_id,
            center.y(),
            center.x(),
            node.region.label(),
            name,
            hierarchy.depth(idx)
        )
        .map_err(|e| CoreError::IoMissing(e.to_string()))?;
    }
    Ok(())
}
