//! Tabular data loading

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Where a training table comes from
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A delimited file on disk; `.tsv` files are tab separated
    Path(PathBuf),
    /// An in-memory CSV buffer, e.g. an uploaded request body
    Buffer(Vec<u8>),
}

impl DataSource {
    /// Short description for logs
    pub fn describe(&self) -> String {
        match self {
            DataSource::Path(path) => path.display().to_string(),
            DataSource::Buffer(bytes) => format!("<buffer: {} bytes>", bytes.len()),
        }
    }
}

impl From<PathBuf> for DataSource {
    fn from(path: PathBuf) -> Self {
        DataSource::Path(path)
    }
}

impl From<&Path> for DataSource {
    fn from(path: &Path) -> Self {
        DataSource::Path(path.to_path_buf())
    }
}

impl From<&str> for DataSource {
    fn from(path: &str) -> Self {
        DataSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for DataSource {
    fn from(bytes: Vec<u8>) -> Self {
        DataSource::Buffer(bytes)
    }
}

/// CSV loader with schema inference over the whole file
pub struct DataLoader {
    /// Rows scanned to infer column types; `None` scans everything
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: None,
        }
    }

    /// Limit schema inference to the first `n` rows
    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    /// Read a table from any data source
    pub fn load(&self, source: &DataSource) -> Result<DataFrame> {
        let df = match source {
            DataSource::Path(path) => self.load_path(path)?,
            DataSource::Buffer(bytes) => self.load_buffer(bytes.clone(), b',')?,
        };
        debug!(
            source = %source.describe(),
            rows = df.height(),
            columns = df.width(),
            "Loaded table"
        );
        Ok(df)
    }

    fn load_path(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::DataSourceNotFound {
                path: path.to_path_buf(),
            },
            _ => PipelineError::DataError(format!("{}: {}", path.display(), e)),
        })?;

        let is_tsv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("tsv"))
            .unwrap_or(false);
        let delimiter = if is_tsv { b'\t' } else { b',' };

        self.options(delimiter)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))
    }

    fn load_buffer(&self, bytes: Vec<u8>, delimiter: u8) -> Result<DataFrame> {
        self.options(delimiter)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(PipelineError::from)
    }

    fn options(&self, delimiter: u8) -> CsvReadOptions {
        let parse_opts = CsvParseOptions::default().with_separator(delimiter);
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
    }
}

/// Read a table with the default loader
pub fn read_table(source: impl Into<DataSource>) -> Result<DataFrame> {
    DataLoader::new().load(&source.into())
}
