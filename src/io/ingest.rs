//! Instrument-data ingestion.
//!
//! `DataIngestor` is the one boundary where low-level failures (path
//! resolution, IO, XML syntax, binary payloads) become the typed
//! `IngestError` taxonomy. Each stage is timed and logged; nothing here fits
//! or transforms data beyond decoding.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info};

use crate::domain::DatasetSnapshot;
use crate::error::{IngestError, LoadError};
use crate::io::filepath;
use crate::io::meta::decode_meta;
use crate::io::table::{DecodeOptions, decode_tables};

#[derive(Debug, Clone, Default)]
pub struct DataIngestor {
    options: DecodeOptions,
}

impl DataIngestor {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    /// Resolve the data path from the host wrapper and parse the file.
    pub fn parse(&self, wrapper: &str) -> Result<DatasetSnapshot, IngestError> {
        let started = Instant::now();
        let resolved = filepath::resolve(wrapper);
        info!(elapsed_s = started.elapsed().as_secs_f64(), "filepath parsing finished");

        let path = resolved.map_err(|e| {
            error!(error = %e, "failed to resolve the data file path");
            e
        })?;
        info!(path = %path.display(), "filepath to data");

        self.parse_file(&path)
    }

    /// Load and decode the instrument document at `path`.
    pub fn parse_file(&self, path: &Path) -> Result<DatasetSnapshot, IngestError> {
        let started = Instant::now();
        let result = self.decode_file(path);
        info!(elapsed_s = started.elapsed().as_secs_f64(), "data parsing finished");
        result
    }

    fn decode_file(&self, path: &Path) -> Result<DatasetSnapshot, IngestError> {
        debug!(path = %path.display(), "load data");
        let text = load(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to load the data file");
            e
        })?;

        let doc = roxmltree::Document::parse(&text).map_err(|source| {
            error!(path = %path.display(), error = %source, "data file is not well-formed XML");
            LoadError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let root = doc.root_element();

        debug!(path = %path.display(), "parse data");
        let meta = decode_meta(root).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to parse metadata");
            e
        })?;

        let columns = decode_tables(root, &self.options).map_err(|e| {
            error!(
                path = %path.display(),
                column_id = e.column_id().unwrap_or("-"),
                error = %e,
                "failed to parse calibration tables"
            );
            e
        })?;

        debug!(columns = columns.len(), "data parsed successfully");
        Ok(DatasetSnapshot {
            filepath: path.to_path_buf(),
            meta,
            columns,
        })
    }
}

fn load(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound {
                path: PathBuf::from(path),
            }
        } else {
            LoadError::Io {
                path: PathBuf::from(path),
                source,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolveError, TableParseError};
    use crate::io::binary::encode_f32_array;
    use crate::io::filepath::wrapper_for;

    fn write(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("py_table.xml");
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn parses_a_document_through_the_wrapper() {
        let dir = tempfile::tempdir().unwrap();
        let xml = format!(
            r#"<root>
                <titul><device>Grand</device></titul>
                <columns><sheet><column id="1" name="Cu" type="line"><cells><pc i="p" cm="2"/></cells></column></sheet></columns>
                <probes><probe id="p" name="S" visible="yes"><spe name="1"><graphs>
                    <graph id="1"><yvals>{}</yvals></graph>
                </graphs></spe></probe></probes>
            </root>"#,
            encode_f32_array(&[0.5, 4.0, 1.0])
        );
        let path = write(dir.path(), &xml);

        let snapshot = DataIngestor::default().parse(&wrapper_for(&path)).unwrap();
        assert_eq!(snapshot.filepath, path);
        assert_eq!(snapshot.meta.device.as_deref(), Some("Grand"));
        assert_eq!(snapshot.columns.len(), 1);
        assert_eq!(snapshot.columns.get("1").unwrap().table.rows()[0].intensity, 4.0);
    }

    #[test]
    fn failures_keep_their_stage() {
        let dir = tempfile::tempdir().unwrap();

        let err = DataIngestor::default().parse("<input/>").unwrap_err();
        assert!(matches!(err, IngestError::Resolve(ResolveError::EmptyPath)));

        let missing = dir.path().join("absent.xml");
        let err = DataIngestor::default().parse_file(&missing).unwrap_err();
        assert!(matches!(err, IngestError::Load(LoadError::NotFound { .. })));

        let path = write(dir.path(), "<root>");
        let err = DataIngestor::default().parse_file(&path).unwrap_err();
        assert!(matches!(err, IngestError::Load(LoadError::Malformed { .. })));

        let path = write(dir.path(), "<root><probes/></root>");
        let err = DataIngestor::default().parse_file(&path).unwrap_err();
        assert!(matches!(err, IngestError::Table(TableParseError::MissingSection("columns"))));
    }
}
