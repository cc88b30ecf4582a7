//! In-memory delimited tables.
//!
//! Cells are `Option<String>`: `None` is the single absence marker for blank
//! cells and null spellings, whatever path the table was built from.

mod normalizer;

use crate::template::HeaderSpec;
use normalizer::{normalize_cell, normalize_header};
use std::collections::HashSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Format tag of every table this module reads.
pub const TABLE_FORMAT: &str = "CSV";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("CSV file {path} could not be opened: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV data could not be parsed: {0}")]
    Csv(#[from] csv::Error),
    #[error("separator '{0}' must be a single ASCII character")]
    InvalidSeparator(String),
    #[error("header row {0} is beyond the end of the file")]
    HeaderRowMissing(usize),
    #[error("column '{0}' appears more than once in the header")]
    DuplicateColumn(String),
    #[error("line {line} has {found} fields, expected {expected}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("column '{column}' holds {found} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Option<String>>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn load<P: AsRef<Path>>(
        path: P,
        separator: &str,
        header: HeaderSpec,
    ) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, separator, header)
    }

    pub fn from_reader<R: Read>(
        reader: R,
        separator: &str,
        header: HeaderSpec,
    ) -> Result<Self, LoadError> {
        let delimiter = parse_separator(separator)?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);

        let mut names: Option<Vec<String>> = None;
        let mut rows: Vec<(u64, csv::StringRecord)> = Vec::new();
        let mut index = 0usize;

        for record in csv_reader.records() {
            let record = record?;
            if is_blank(&record) {
                continue;
            }

            match header {
                HeaderSpec::Row(header_row) if index < header_row => {}
                HeaderSpec::Row(header_row) if index == header_row => {
                    names = Some(
                        record
                            .iter()
                            .enumerate()
                            .map(|(position, raw)| normalize_header(position, raw))
                            .collect(),
                    );
                }
                _ => {
                    let line = record.position().map(|pos| pos.line()).unwrap_or(0);
                    rows.push((line, record));
                }
            }
            index += 1;
        }

        let names = match (header, names) {
            (_, Some(names)) => names,
            (HeaderSpec::Row(header_row), None) => {
                return Err(LoadError::HeaderRowMissing(header_row))
            }
            (HeaderSpec::Absent, None) => {
                let width = rows.first().map(|(_, record)| record.len()).unwrap_or(0);
                (0..width).map(|position| position.to_string()).collect()
            }
        };

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(LoadError::DuplicateColumn(name.clone()));
            }
        }

        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for (line, record) in &rows {
            if record.len() != columns.len() {
                return Err(LoadError::RaggedRow {
                    line: *line,
                    expected: columns.len(),
                    found: record.len(),
                });
            }
            for (column, raw) in columns.iter_mut().zip(record.iter()) {
                column.cells.push(normalize_cell(raw));
            }
        }

        Ok(Self {
            row_count: rows.len(),
            columns,
        })
    }

    /// Builds a table from already materialized columns of equal length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, LoadError> {
        let row_count = columns.first().map(|column| column.cells.len()).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(LoadError::DuplicateColumn(column.name.clone()));
            }
            if column.cells.len() != row_count {
                return Err(LoadError::ColumnLength {
                    column: column.name.clone(),
                    expected: row_count,
                    found: column.cells.len(),
                });
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Columns whose names are unique and whose lengths are all `row_count`.
    pub(crate) fn from_aligned(columns: Vec<Column>, row_count: usize) -> Self {
        Self { columns, row_count }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        separator: &str,
        header: bool,
    ) -> Result<(), LoadError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.write(file, separator, header)
    }

    /// Serializes the table; absent cells are written as empty fields.
    pub fn write<W: Write>(
        &self,
        writer: W,
        separator: &str,
        header: bool,
    ) -> Result<(), LoadError> {
        let delimiter = parse_separator(separator)?;
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        if header {
            csv_writer.write_record(self.column_names())?;
        }

        for row in 0..self.row_count {
            csv_writer.write_record(
                self.columns
                    .iter()
                    .map(|column| column.cells[row].as_deref().unwrap_or("")),
            )?;
        }

        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

pub fn parse_separator(separator: &str) -> Result<u8, LoadError> {
    let decoded = match separator {
        "\\t" => "\t",
        other => other,
    };

    match decoded.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(LoadError::InvalidSeparator(separator.to_string())),
    }
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.iter().all(|field| field.trim().is_empty()) && record.len() <= 1
}
