//! CSV codecs for taxonomy nodes and proficiency mappings.
//!
//! Readers require a header row, match column names case-insensitively,
//! trim every field, and accept quoted fields. A record that cannot be read
//! becomes a row error instead of failing the whole file.

use std::collections::HashMap;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use skilltree_core::defaults::{MAPPING_CSV_HEADER, TAXONOMY_CSV_HEADER};
use skilltree_core::{normalize_name, Error, NodeTree, ProficiencyMapping, Result};
use tracing::warn;

use crate::report::{ImportPhase, RowError};

/// One data row of a taxonomy CSV, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxonomyRow {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    pub name: String,
    pub description: String,
    /// Raw `type` cell; checked by the structural rules.
    pub kind: String,
    /// Name of the parent node; empty for clusters.
    pub parent: String,
}

/// One data row of a proficiency mapping CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRow {
    pub row: usize,
    pub skill_name: String,
    pub description: String,
    pub level_title: String,
}

/// Rows read from a file plus the records that could not be read.
#[derive(Debug, Clone, Default)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub errors: Vec<RowError>,
}

fn csv_error(e: csv::Error) -> Error {
    Error::Csv(e.to_string())
}

fn header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .collect()
}

fn require_columns(map: &HashMap<String, usize>, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !map.contains_key(&c.to_lowercase()))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::Csv(format!(
            "Missing required column(s): {}",
            missing.join(", ")
        )))
    }
}

fn field(record: &StringRecord, map: &HashMap<String, usize>, column: &str) -> String {
    map.get(&column.to_lowercase())
        .and_then(|&i| record.get(i))
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Read every record of a CSV with the given required header columns.
fn read_records<R, T, F>(reader: R, required: &[&str], mut build: F) -> Result<Parsed<T>>
where
    R: Read,
    F: FnMut(usize, &StringRecord, &HashMap<String, usize>) -> T,
{
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(csv_error)?.clone();
    let map = header_map(&headers);
    require_columns(&map, required)?;

    let mut parsed = Parsed {
        rows: Vec::new(),
        errors: Vec::new(),
    };
    for (idx, result) in rdr.records().enumerate() {
        let row = idx + 1;
        match result {
            Ok(record) => {
                // Blank lines carry no data.
                if record.iter().all(|f| f.trim().is_empty()) {
                    continue;
                }
                parsed.rows.push(build(row, &record, &map));
            }
            Err(e) => parsed.errors.push(RowError {
                row,
                name: String::new(),
                message: format!("Malformed CSV record: {}", e),
                phase: ImportPhase::Structural,
            }),
        }
    }
    Ok(parsed)
}

/// Parse a taxonomy CSV with columns `name, description, type, parent`.
pub fn parse_taxonomy_csv<R: Read>(reader: R) -> Result<Parsed<TaxonomyRow>> {
    read_records(reader, &TAXONOMY_CSV_HEADER, |row, record, map| TaxonomyRow {
        row,
        name: field(record, map, "name"),
        description: field(record, map, "description"),
        kind: field(record, map, "type"),
        parent: field(record, map, "parent"),
    })
}

/// Parse a mapping CSV with columns
/// `Skill Name, Proficiency Description, Proficiency Level`.
pub fn parse_mapping_csv<R: Read>(reader: R) -> Result<Parsed<MappingRow>> {
    read_records(reader, &MAPPING_CSV_HEADER, |row, record, map| MappingRow {
        row,
        skill_name: field(record, map, MAPPING_CSV_HEADER[0]),
        description: field(record, map, MAPPING_CSV_HEADER[1]),
        level_title: field(record, map, MAPPING_CSV_HEADER[2]),
    })
}

fn write_csv<'a, I>(header: &[&str], rows: I) -> Result<String>
where
    I: IntoIterator<Item = Vec<&'a str>>,
{
    let mut wtr = WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(header).map_err(csv_error)?;
    for row in rows {
        wtr.write_record(&row).map_err(csv_error)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| Error::Internal(e.to_string()))
}

/// Taxonomy import template: header plus three sample rows.
pub fn taxonomy_template() -> Result<String> {
    write_csv(
        &TAXONOMY_CSV_HEADER,
        [
            vec![
                "Data Science",
                "Skills for extracting insight from data",
                "cluster",
                "",
            ],
            vec![
                "Machine Learning",
                "Building and evaluating predictive models",
                "group",
                "Data Science",
            ],
            vec![
                "Python for ML",
                "Using Python libraries for machine learning",
                "skill",
                "Machine Learning",
            ],
        ],
    )
}

/// Mapping import template: header plus one sample row.
pub fn mapping_template() -> Result<String> {
    write_csv(
        &MAPPING_CSV_HEADER,
        [vec![
            "Python for ML",
            "Trains and evaluates a scikit-learn model",
            "Intermediate",
        ]],
    )
}

/// Names carried by more than one node of the tree, in first-seen order.
///
/// The store only requires names to be unique among siblings, while an
/// import file requires them to be unique across the file.
pub fn repeated_names(tree: &[NodeTree]) -> Vec<String> {
    fn walk(node: &NodeTree, seen: &mut HashMap<String, usize>, order: &mut Vec<String>) {
        let count = seen.entry(normalize_name(&node.node.name)).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push(node.node.name.clone());
        }
        for child in &node.children {
            walk(child, seen, order);
        }
    }

    let mut seen = HashMap::new();
    let mut repeated = Vec::new();
    for root in tree {
        walk(root, &mut seen, &mut repeated);
    }
    repeated
}

/// Export the visible tree, every parent before its children.
///
/// Parents are referenced by name, so a tree that repeats a name under
/// different parents (see [`repeated_names`]) does not re-import cleanly:
/// the later rows with a repeated name are rejected as duplicates.
pub fn export_taxonomy(tree: &[NodeTree]) -> Result<String> {
    fn walk<'a>(node: &'a NodeTree, parent: &'a str, out: &mut Vec<Vec<&'a str>>) {
        out.push(vec![
            node.node.name.as_str(),
            node.node.description.as_str(),
            node.node.kind().as_str(),
            parent,
        ]);
        for child in &node.children {
            walk(child, &node.node.name, out);
        }
    }

    let repeated = repeated_names(tree);
    if !repeated.is_empty() {
        warn!(
            names = %repeated.join(", "),
            "Exported taxonomy repeats names and will not re-import cleanly"
        );
    }

    let mut rows = Vec::new();
    for root in tree {
        walk(root, "", &mut rows);
    }
    write_csv(&TAXONOMY_CSV_HEADER, rows)
}

/// Export active mappings.
pub fn export_mappings(mappings: &[ProficiencyMapping]) -> Result<String> {
    write_csv(
        &MAPPING_CSV_HEADER,
        mappings.iter().map(|m| {
            vec![
                m.skill_name.as_str(),
                m.proficiency_description.as_str(),
                m.proficiency_level_title.as_str(),
            ]
        }),
    )
}
