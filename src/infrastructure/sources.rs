//! Readers for NCBI taxonomy tables and rrnDB copy-number tables.
//!
//! The table format is always chosen by the caller; nothing is sniffed.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::str::FromStr;

use csv::{StringRecord, Trim};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{Edge, RawObservation, RemapTable, TaxonomyTree};
use crate::infrastructure::{InfraError, InfraResult};

/// Layout of the header-less taxonomy tables (`nodes`, `merged`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Comma separated, e.g. `562,561,species`
    #[default]
    Csv,
    /// NCBI taxdump, e.g. `562\t|\t561\t|\tspecies\t|`
    Dmp,
}

impl TableFormat {
    /// Header-less, flexible reader for this layout.
    ///
    /// dmp fields are separated by `\t|\t` and never quoted, so the pipe is
    /// the delimiter and the tabs are trimmed away.
    fn reader<R: Read>(&self, rdr: R) -> csv::Reader<R> {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(false).flexible(true).trim(Trim::All);
        match self {
            TableFormat::Csv => builder.delimiter(b','),
            TableFormat::Dmp => builder.delimiter(b'|').quoting(false),
        };
        builder.from_reader(rdr)
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "dmp" => Ok(Self::Dmp),
            other => Err(format!("unknown table format '{other}' (expected csv, dmp)")),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Csv => f.write_str("csv"),
            TableFormat::Dmp => f.write_str("dmp"),
        }
    }
}

/// Layout of a delimited copy-number table with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyNumberTable {
    pub delimiter: char,
    pub tax_id_column: String,
    pub value_column: String,
}

impl Default for CopyNumberTable {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            tax_id_column: "NCBI tax id".to_string(),
            value_column: "16S gene count".to_string(),
        }
    }
}

fn open(path: &Path) -> InfraResult<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| InfraError::io(format!("open {}", path.display()), e))
}

fn csv_err(source_name: &str, e: csv::Error) -> InfraError {
    let line = e.position().map_or(0, |p| p.line() as usize);
    let message = e.to_string();
    match e.into_kind() {
        csv::ErrorKind::Io(io) => InfraError::io(format!("read {source_name}"), io),
        _ => InfraError::Parse {
            source_name: source_name.to_string(),
            line,
            message,
        },
    }
}

fn line_of(record: &StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

/// First two columns of every non-blank row.
fn read_pairs<R: Read>(
    reader: R,
    format: TableFormat,
    source_name: &str,
) -> InfraResult<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for record in format.reader(reader).into_records() {
        let record = record.map_err(|e| csv_err(source_name, e))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        match (record.get(0), record.get(1)) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
                pairs.push((a.to_string(), b.to_string()))
            }
            _ => {
                return Err(InfraError::Parse {
                    source_name: source_name.to_string(),
                    line: line_of(&record),
                    message: format!(
                        "expected at least two fields, got '{}'",
                        record.iter().collect::<Vec<_>>().join(",")
                    ),
                })
            }
        }
    }
    Ok(pairs)
}

/// Read `tax_id,parent_id[,...]` rows.
#[instrument(level = "debug", skip(reader))]
pub fn read_edges_from<R: Read>(
    reader: R,
    format: TableFormat,
    source_name: &str,
) -> InfraResult<Vec<Edge>> {
    let edges: Vec<Edge> = read_pairs(reader, format, source_name)?
        .into_iter()
        .map(Edge::from)
        .collect();
    debug!(edges = edges.len(), "read edges");
    Ok(edges)
}

pub fn read_edges(path: &Path, format: TableFormat) -> InfraResult<Vec<Edge>> {
    read_edges_from(open(path)?, format, &path.display().to_string())
}

/// Read `old_tax_id,tax_id` rows into a remap table.
#[instrument(level = "debug", skip(reader))]
pub fn read_remap_from<R: Read>(
    reader: R,
    format: TableFormat,
    source_name: &str,
) -> InfraResult<RemapTable> {
    let remap: RemapTable = read_pairs(reader, format, source_name)?
        .into_iter()
        .collect();
    debug!(entries = remap.len(), "read merged tax ids");
    Ok(remap)
}

pub fn read_remap(path: &Path, format: TableFormat) -> InfraResult<RemapTable> {
    read_remap_from(open(path)?, format, &path.display().to_string())
}

/// Read observations from a copy-number table.
///
/// Quoted fields may contain the delimiter or line breaks. Some published
/// rrnDB releases also carry raw, unquoted newlines inside fields, so a row
/// shorter than the header is joined with the following records until it is
/// wide enough. The broken field is concatenated with the next record's
/// first field.
#[instrument(level = "debug", skip(reader, table))]
pub fn read_observations_from<R: Read>(
    reader: R,
    table: &CopyNumberTable,
    source_name: &str,
) -> InfraResult<Vec<RawObservation>> {
    let delimiter = u8::try_from(table.delimiter).map_err(|_| InfraError::Parse {
        source_name: source_name.to_string(),
        line: 0,
        message: format!("delimiter '{}' is not a single-byte character", table.delimiter),
    })?;
    let mut records = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader)
        .into_records();
    let mut next_record = || -> InfraResult<Option<Vec<String>>> {
        match records.next() {
            Some(record) => {
                let record = record.map_err(|e| csv_err(source_name, e))?;
                Ok(Some(record.iter().map(str::to_string).collect()))
            }
            None => Ok(None),
        }
    };
    let is_blank = |row: &[String]| row.iter().all(|f| f.trim().is_empty());

    let header = loop {
        match next_record()? {
            Some(row) if is_blank(&row) => continue,
            Some(row) => break row,
            None => {
                return Err(InfraError::Parse {
                    source_name: source_name.to_string(),
                    line: 1,
                    message: "missing header row".to_string(),
                })
            }
        }
    };
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| InfraError::MissingColumn {
                source_name: source_name.to_string(),
                column: name.to_string(),
            })
    };
    let tax_col = column(&table.tax_id_column)?;
    let value_col = column(&table.value_column)?;
    let width = header.len();

    let mut observations = Vec::new();
    let mut joined = 0usize;
    while let Some(mut row) = next_record()? {
        if is_blank(&row) {
            continue;
        }
        while row.len() < width {
            let Some(next) = next_record()? else {
                break;
            };
            let mut rest = next.into_iter();
            if let (Some(last), Some(first)) = (row.last_mut(), rest.next()) {
                last.push_str(&first);
            }
            row.extend(rest);
            joined += 1;
        }

        match (row.get(tax_col), row.get(value_col)) {
            (Some(tax_id), Some(value)) if !tax_id.trim().is_empty() => {
                observations.push(RawObservation::text(tax_id.trim(), value.as_str()));
            }
            _ => debug!(row = ?row, "skipping incomplete row"),
        }
    }
    debug!(observations = observations.len(), joined, "read copy numbers");
    Ok(observations)
}

pub fn read_observations(path: &Path, table: &CopyNumberTable) -> InfraResult<Vec<RawObservation>> {
    read_observations_from(open(path)?, table, &path.display().to_string())
}

/// Write `tax_id,copy_number` for every node, ordered by numeric tax id.
/// Unresolved nodes get an empty value.
pub fn write_table<W: Write>(tree: &TaxonomyTree, mut writer: W) -> std::io::Result<()> {
    let mut rows: Vec<(&str, Option<f64>)> = tree
        .nodes()
        .map(|(_, node)| (node.tax_id.as_str(), node.value))
        .collect();
    rows.sort_by(|a, b| (a.0.len(), a.0).cmp(&(b.0.len(), b.0)));

    writeln!(writer, "tax_id,copy_number")?;
    for (tax_id, value) in rows {
        match value {
            Some(v) => writeln!(writer, "{tax_id},{v}")?,
            None => writeln!(writer, "{tax_id},")?,
        }
    }
    writer.flush()
}

pub fn write_table_to_path(tree: &TaxonomyTree, path: &Path) -> InfraResult<()> {
    let file = File::create(path)
        .map_err(|e| InfraError::io(format!("create {}", path.display()), e))?;
    write_table(tree, BufWriter::new(file))
        .map_err(|e| InfraError::io(format!("write {}", path.display()), e))
}
