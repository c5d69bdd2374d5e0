//! Instrument document → per-column calibration tables.
//!
//! Walks the `columns`, `probes` and optional `plugin-absorption-correction`
//! sections of the vendor document:
//!
//! - visible `line` columns are selected (id → nickname)
//! - per-column concentrations come from `cells/pc`
//! - each retained graph record becomes one `Sample` row
//! - blank rows are subtracted per column
//! - bounds and curves persisted by a previous run are recovered
//!
//! Columns are emitted in the order their first graph record appears; selected
//! columns without any retained record follow in sheet order with empty tables.

use std::collections::HashMap;

use roxmltree::Node;
use tracing::{debug, error, warn};

use crate::domain::{Bounds, CalibrationTable, ColumnDatum, ColumnMap, CurvePoint, Sample};
use crate::error::{DecodeError, TableParseError};
use crate::io::binary::{decode_f32_array, decode_i32_array};
use crate::math::nan_max;

/// Section holding state persisted by a previous correction run.
pub const PLUGIN_SECTION: &str = "plugin-absorption-correction";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Probe name marking the blank.
    pub blank_name: Option<String>,
}

impl DecodeOptions {
    fn is_blank(&self, probe_name: &str) -> bool {
        self.blank_name.as_deref() == Some(probe_name)
    }
}

/// A visible line column and its concentration table (probe id → value).
struct LineColumn {
    nickname: String,
    concentrations: HashMap<String, f64>,
}

#[derive(Default)]
struct Persisted {
    bounds: Option<Bounds>,
    curve: Option<Vec<CurvePoint>>,
}

/// Decode every visible line column of the document rooted at `root`.
pub fn decode_tables(root: Node, options: &DecodeOptions) -> Result<ColumnMap, TableParseError> {
    let selected = select_lines(root)?;
    debug!(columns = selected.len(), "selected visible line columns");
    let lines: HashMap<&str, &LineColumn> = selected.iter().map(|(id, line)| (id.as_str(), line)).collect();

    let mut order: Vec<String> = Vec::new();
    let mut rows: HashMap<String, Vec<Sample>> = HashMap::new();

    let probes = child(root, "probes").ok_or(TableParseError::MissingSection("probes"))?;
    for probe in children(probes, "probe") {
        if probe.attribute("visible").unwrap_or("no") == "no" {
            continue;
        }
        let probe_id = required(probe, "probe", "id", None)?;
        let probe_name = required(probe, "probe", "name", None)?;
        let is_blank = options.is_blank(probe_name);

        for spe in children(probe, "spe") {
            if spe.attribute("disabled") == Some("yes") {
                continue;
            }
            let parallel = required(spe, "spe", "name", None)?;

            let graphs = children(spe, "graphs").flat_map(|g| children(g, "graph"));
            for graph in graphs {
                let column_id = required(graph, "graph", "id", None)?;
                let Some(line) = lines.get(column_id) else {
                    continue;
                };

                let waveform = decode_graph(graph).map_err(|source| {
                    error!(column_id, probe = probe_name, %source, "failed to decode graph");
                    TableParseError::Decode {
                        column_id: column_id.to_string(),
                        probe: probe_name.to_string(),
                        source,
                    }
                })?;

                let concentration = if is_blank {
                    0.0
                } else {
                    *line.concentrations.get(probe_id).ok_or_else(|| {
                        TableParseError::MissingConcentration {
                            column_id: column_id.to_string(),
                            probe_id: probe_id.to_string(),
                        }
                    })?
                };

                if !rows.contains_key(column_id) {
                    order.push(column_id.to_string());
                }
                rows.entry(column_id.to_string()).or_default().push(Sample {
                    probe: probe_name.to_string(),
                    parallel: parallel.to_string(),
                    concentration,
                    intensity: nan_max(&waveform),
                    raw_samples: waveform,
                    is_blank,
                });
            }
        }
    }

    let mut persisted = match child(root, PLUGIN_SECTION) {
        Some(section) => decode_persisted(section)?,
        None => HashMap::new(),
    };

    for (column_id, _) in &selected {
        if !rows.contains_key(column_id) {
            warn!(column_id = %column_id, "visible line column has no retained graph records");
            order.push(column_id.clone());
        }
    }

    let mut columns = ColumnMap::new();
    for column_id in order {
        let mut table = CalibrationTable::new(rows.remove(&column_id).unwrap_or_default());
        if let Some(blank) = table.subtract_blank() {
            debug!(column_id = %column_id, blank = blank.intensity, "subtracted blank");
        }

        let state = persisted.remove(&column_id).unwrap_or_default();
        let nickname = lines
            .get(column_id.as_str())
            .map(|l| l.nickname.clone())
            .unwrap_or_default();

        columns.insert(ColumnDatum {
            column_id,
            nickname,
            table,
            bounds: state.bounds,
            prior_curve: state.curve,
        });
    }

    for column_id in persisted.keys() {
        warn!(column_id = %column_id, "persisted state for a column that is not a visible line column; ignored");
    }

    Ok(columns)
}

/// Visible line columns in sheet order.
fn select_lines(root: Node) -> Result<Vec<(String, LineColumn)>, TableParseError> {
    let section = child(root, "columns").ok_or(TableParseError::MissingSection("columns"))?;

    let mut lines: Vec<(String, LineColumn)> = Vec::new();
    for column in children(section, "sheet").flat_map(|s| children(s, "column")) {
        if column.attribute("visible") == Some("no") || column.attribute("type") != Some("line") {
            continue;
        }
        let column_id = required(column, "column", "id", None)?;
        let nickname = required(column, "column", "name", Some(column_id))?;

        let mut concentrations = HashMap::new();
        for pc in children(column, "cells").flat_map(|c| children(c, "pc")) {
            let probe_id = required(pc, "pc", "i", Some(column_id))?;
            let value = pc
                .attribute("cm")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            concentrations.insert(probe_id.to_string(), value);
        }

        let line = LineColumn {
            nickname: nickname.to_string(),
            concentrations,
        };
        match lines.iter_mut().find(|(id, _)| id.as_str() == column_id) {
            Some(existing) => existing.1 = line,
            None => lines.push((column_id.to_string(), line)),
        }
    }
    Ok(lines)
}

/// Decode `yvals` and apply the optional `bad` mask.
fn decode_graph(graph: Node) -> Result<Vec<f64>, DecodeError> {
    let yvals = child(graph, "yvals").ok_or(DecodeError::MissingElement("yvals"))?;
    let mut values = decode_f32_array(yvals.text().unwrap_or(""))?;

    let declared = match yvals.attribute("value_array_size") {
        Some(raw) => {
            let size = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| DecodeError::InvalidSize(raw.to_string()))?;
            if size != values.len() {
                return Err(DecodeError::SizeMismatch {
                    declared: size,
                    decoded: values.len(),
                });
            }
            size
        }
        None => values.len(),
    };

    if let Some(bad) = child(graph, "bad") {
        let mut mask = vec![false; declared];
        for index in decode_i32_array(bad.text().unwrap_or(""))? {
            let slot = usize::try_from(index)
                .ok()
                .and_then(|i| mask.get_mut(i))
                .ok_or(DecodeError::MaskOutOfRange {
                    index,
                    size: declared,
                })?;
            *slot = true;
        }
        for (value, masked) in values.iter_mut().zip(mask) {
            if masked {
                *value = f64::NAN;
            }
        }
    }

    Ok(values)
}

fn decode_persisted(section: Node) -> Result<HashMap<String, Persisted>, TableParseError> {
    let mut out = HashMap::new();
    for column in children(section, "column") {
        let column_id = required(column, "column", "id", None)?;
        let mut state = Persisted::default();

        if let Some(bounds) = child(column, "bounds") {
            let lb = persisted_number(bounds, "lb", column_id)?;
            let ub = persisted_number(bounds, "ub", column_id)?;
            let bounds = Bounds::new(lb, ub).map_err(|source| TableParseError::InvalidBounds {
                column_id: column_id.to_string(),
                source,
            })?;
            state.bounds = Some(bounds);
        }

        if let Some(polynom) = child(column, "polynom") {
            let mut curve = Vec::new();
            for point in children(polynom, "point") {
                curve.push(CurvePoint {
                    x: persisted_number(point, "x", column_id)?,
                    y: persisted_number(point, "y", column_id)?,
                });
            }
            state.curve = Some(curve);
        }

        out.insert(column_id.to_string(), state);
    }
    Ok(out)
}

fn persisted_number(node: Node, field: &'static str, column_id: &str) -> Result<f64, TableParseError> {
    let raw = node.attribute(field).unwrap_or("");
    raw.trim()
        .parse::<f64>()
        .map_err(|_| TableParseError::InvalidPersisted {
            column_id: column_id.to_string(),
            field,
            value: raw.to_string(),
        })
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |n| n.has_tag_name(name))
}

fn required<'a>(
    node: Node<'a, '_>,
    element: &'static str,
    attribute: &'static str,
    column_id: Option<&str>,
) -> Result<&'a str, TableParseError> {
    node.attribute(attribute)
        .ok_or_else(|| TableParseError::MissingAttribute {
            element,
            attribute,
            column_id: column_id.map(str::to_string),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::binary::{encode_f32_array, encode_i32_array};

    fn graph(column_id: &str, values: &[f64]) -> String {
        format!(
            r#"<graph id="{column_id}"><yvals value_array_size="{}">{}</yvals></graph>"#,
            values.len(),
            encode_f32_array(values)
        )
    }

    fn document(columns: &str, probes: &str, plugin: &str) -> String {
        format!("<root><columns><sheet>{columns}</sheet></columns><probes>{probes}</probes>{plugin}</root>")
    }

    const COLUMNS: &str = r#"
        <column id="10" name="Cu 324.754" type="line" visible="yes">
            <cells><pc i="p1" cm="1.0"/><pc i="p2" cm="2.0"/><pc i="p3"/></cells>
        </column>
        <column id="11" name="Hidden" type="line" visible="no"><cells><pc i="p1" cm="1"/></cells></column>
        <column id="12" name="Note" type="text"><cells><pc i="p1" cm="1"/></cells></column>
        <column id="13" name="Fe 259.940" type="line">
            <cells><pc i="p1" cm="5"/><pc i="p2" cm="6"/></cells>
        </column>
    "#;

    fn decode(xml: &str, blank: Option<&str>) -> Result<ColumnMap, TableParseError> {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let options = DecodeOptions {
            blank_name: blank.map(str::to_string),
        };
        decode_tables(doc.root_element(), &options)
    }

    #[test]
    fn selects_only_visible_line_columns() {
        let probes = format!(
            r#"<probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>{}{}{}{}</graphs></spe></probe>"#,
            graph("13", &[1.0, 3.0]),
            graph("10", &[1.0, 2.0]),
            graph("11", &[9.0]),
            graph("12", &[9.0]),
        );
        let columns = decode(&document(COLUMNS, &probes, ""), None).unwrap();

        let pairs: Vec<(&str, &str)> = columns
            .iter()
            .map(|c| (c.column_id.as_str(), c.nickname.as_str()))
            .collect();
        assert_eq!(pairs, vec![("13", "Fe 259.940"), ("10", "Cu 324.754")]);

        let row = &columns.get("13").unwrap().table.rows()[0];
        assert_eq!(row.concentration, 5.0);
        assert_eq!(row.intensity, 3.0);
    }

    #[test]
    fn skips_hidden_probes_and_disabled_runs() {
        let probes = format!(
            r#"
            <probe id="p1" name="S1" visible="yes">
                <spe name="1"><graphs>{}</graphs></spe>
                <spe name="2" disabled="yes"><graphs>{}</graphs></spe>
            </probe>
            <probe id="p2" name="S2"><spe name="1"><graphs>{}</graphs></spe></probe>
            <probe id="p2" name="S2" visible="no"><spe name="1"><graphs>{}</graphs></spe></probe>
            "#,
            graph("10", &[1.0]),
            graph("10", &[100.0]),
            graph("10", &[2.0]),
            graph("10", &[2.0]),
        );
        let columns = decode(&document(COLUMNS, &probes, ""), None).unwrap();

        let table = &columns.get("10").unwrap().table;
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].parallel, "1");
    }

    #[test]
    fn line_columns_without_records_are_kept_empty() {
        let probes = format!(
            r#"
            <probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>{}</graphs></spe></probe>
            <probe id="p2" name="S2" visible="no"><spe name="1"><graphs>{}</graphs></spe></probe>
            "#,
            graph("10", &[1.0]),
            graph("13", &[4.0]),
        );
        let columns = decode(&document(COLUMNS, &probes, ""), None).unwrap();

        let pairs: Vec<(&str, &str)> = columns
            .iter()
            .map(|c| (c.column_id.as_str(), c.nickname.as_str()))
            .collect();
        assert_eq!(pairs, vec![("10", "Cu 324.754"), ("13", "Fe 259.940")]);
        assert!(columns.get("13").unwrap().table.is_empty());
    }

    #[test]
    fn unparsable_concentration_is_nan_and_missing_one_is_an_error() {
        let probes = format!(
            r#"<probe id="p3" name="S3" visible="yes"><spe name="1"><graphs>{}</graphs></spe></probe>"#,
            graph("10", &[1.0]),
        );
        let columns = decode(&document(COLUMNS, &probes, ""), None).unwrap();
        assert!(columns.get("10").unwrap().table.rows()[0].concentration.is_nan());

        let probes = format!(
            r#"<probe id="p9" name="S9" visible="yes"><spe name="1"><graphs>{}</graphs></spe></probe>"#,
            graph("10", &[1.0]),
        );
        let err = decode(&document(COLUMNS, &probes, ""), None).unwrap_err();
        assert!(matches!(err, TableParseError::MissingConcentration { ref probe_id, .. } if probe_id == "p9"));
        assert_eq!(err.column_id(), Some("10"));
    }

    #[test]
    fn mask_replaces_bad_positions_with_nan() {
        let probes = format!(
            r#"<probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>
                <graph id="10"><yvals value_array_size="4">{}</yvals><bad>{}</bad></graph>
            </graphs></spe></probe>"#,
            encode_f32_array(&[1.0, 50.0, 3.0, 2.0]),
            encode_i32_array(&[1]),
        );
        let columns = decode(&document(COLUMNS, &probes, ""), None).unwrap();

        let row = &columns.get("10").unwrap().table.rows()[0];
        assert!(row.raw_samples[1].is_nan());
        assert_eq!(row.intensity, 3.0);
    }

    #[test]
    fn size_mismatch_names_the_column() {
        let probes = format!(
            r#"<probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>
                <graph id="10"><yvals value_array_size="5">{}</yvals></graph>
            </graphs></spe></probe>"#,
            encode_f32_array(&[1.0, 2.0, 3.0]),
        );
        let err = decode(&document(COLUMNS, &probes, ""), None).unwrap_err();
        assert_eq!(err.column_id(), Some("10"));
        assert!(matches!(
            err,
            TableParseError::Decode {
                source: DecodeError::SizeMismatch { declared: 5, decoded: 3 },
                ..
            }
        ));
    }

    #[test]
    fn out_of_range_mask_index_is_rejected() {
        let probes = format!(
            r#"<probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>
                <graph id="10"><yvals value_array_size="2">{}</yvals><bad>{}</bad></graph>
            </graphs></spe></probe>"#,
            encode_f32_array(&[1.0, 2.0]),
            encode_i32_array(&[2]),
        );
        let err = decode(&document(COLUMNS, &probes, ""), None).unwrap_err();
        assert!(matches!(
            err,
            TableParseError::Decode {
                source: DecodeError::MaskOutOfRange { index: 2, size: 2 },
                ..
            }
        ));
    }

    #[test]
    fn blank_probe_is_subtracted() {
        let probes = format!(
            r#"
            <probe id="b" name="Blank" visible="yes">
                <spe name="1"><graphs>{}</graphs></spe>
                <spe name="2"><graphs>{}</graphs></spe>
            </probe>
            <probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>{}</graphs></spe></probe>
            "#,
            graph("10", &[0.25]),
            graph("10", &[0.75]),
            graph("10", &[2.0]),
        );
        let columns = decode(&document(COLUMNS, &probes, ""), Some("Blank")).unwrap();

        let table = &columns.get("10").unwrap().table;
        let blank: Vec<&Sample> = table.rows().iter().filter(|r| r.is_blank).collect();
        assert_eq!(blank.len(), 2);
        assert_eq!(blank[0].concentration, 0.0);
        assert_eq!(blank[0].intensity + blank[1].intensity, 0.0);

        let sample = table.non_blank().next().unwrap();
        assert_eq!(sample.intensity, 1.5);
        assert_eq!(sample.raw_samples, vec![1.5]);
    }

    #[test]
    fn persisted_state_is_recovered() {
        let probes = format!(
            r#"<probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>{}{}</graphs></spe></probe>"#,
            graph("10", &[1.0]),
            graph("13", &[1.0]),
        );
        let plugin = r#"<plugin-absorption-correction>
            <column id="10"><bounds lb="0.5" ub="2.5"/><polynom><point x="1" y="1.5"/><point x="2" y="3"/></polynom></column>
        </plugin-absorption-correction>"#;
        let columns = decode(&document(COLUMNS, &probes, plugin), None).unwrap();

        let column = columns.get("10").unwrap();
        assert_eq!(column.bounds, Some(Bounds::new(0.5, 2.5).unwrap()));
        assert_eq!(
            column.prior_curve,
            Some(vec![CurvePoint { x: 1.0, y: 1.5 }, CurvePoint { x: 2.0, y: 3.0 }])
        );
        assert_eq!(columns.get("13").unwrap().bounds, None);
    }

    #[test]
    fn malformed_persisted_bounds_name_the_column() {
        let probes = format!(
            r#"<probe id="p1" name="S1" visible="yes"><spe name="1"><graphs>{}</graphs></spe></probe>"#,
            graph("10", &[1.0]),
        );
        let plugin = r#"<plugin-absorption-correction><column id="10"><bounds lb="x" ub="2"/></column></plugin-absorption-correction>"#;
        let err = decode(&document(COLUMNS, &probes, plugin), None).unwrap_err();
        assert!(matches!(err, TableParseError::InvalidPersisted { field: "lb", .. }));
        assert_eq!(err.column_id(), Some("10"));

        let plugin = r#"<plugin-absorption-correction><column id="10"><bounds lb="3" ub="2"/></column></plugin-absorption-correction>"#;
        let err = decode(&document(COLUMNS, &probes, plugin), None).unwrap_err();
        assert!(matches!(err, TableParseError::InvalidBounds { .. }));
    }

    #[test]
    fn missing_sections_are_reported() {
        let err = decode("<root><probes/></root>", None).unwrap_err();
        assert!(matches!(err, TableParseError::MissingSection("columns")));

        let err = decode("<root><columns/></root>", None).unwrap_err();
        assert!(matches!(err, TableParseError::MissingSection("probes")));
    }
}
