//! Delimited-text and line-delimited JSON export of typed tables.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde_json::Map;

use crate::error_handling::types::{ExportError, FilterError};
use crate::table::{Column, Tabular};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Ndjson,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Ndjson => "ndjson",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Ndjson => "application/x-ndjson",
        }
    }

    pub fn file_name(self, stem: &str) -> String {
        format!("{}.{}", stem, self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "ndjson" | "jsonl" | "json" => Ok(ExportFormat::Ndjson),
            other => Err(FilterError::BadValue(format!("unknown export format {:?}", other))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Quotes a field when it holds a delimiter, a quote or a line break.
fn csv_field(raw: &str) -> String {
    if raw.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

pub fn write_csv<W, R>(out: &mut W, rows: &[R], columns: &[R::Column]) -> Result<(), ExportError>
where
    W: Write,
    R: Tabular,
{
    let header: Vec<String> = columns.iter().map(|c| csv_field(c.name())).collect();
    write!(out, "{}\r\n", header.join(","))?;
    for row in rows {
        let line: Vec<String> = columns
            .iter()
            .map(|c| csv_field(&row.cell(*c).to_string()))
            .collect();
        write!(out, "{}\r\n", line.join(","))?;
    }
    Ok(())
}

/// One JSON object per line; keys follow the column order.
pub fn write_ndjson<W, R>(out: &mut W, rows: &[R], columns: &[R::Column]) -> Result<(), ExportError>
where
    W: Write,
    R: Tabular,
{
    for row in rows {
        let object: Map<String, serde_json::Value> = columns
            .iter()
            .map(|c| (c.name().to_string(), row.cell(*c).to_json()))
            .collect();
        serde_json::to_writer(&mut *out, &object)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}

pub fn export<W, R>(format: ExportFormat, out: &mut W, rows: &[R], columns: &[R::Column]) -> Result<(), ExportError>
where
    W: Write,
    R: Tabular,
{
    match format {
        ExportFormat::Csv => write_csv(out, rows, columns),
        ExportFormat::Ndjson => write_ndjson(out, rows, columns),
    }
}

pub fn export_bytes<R: Tabular>(format: ExportFormat, rows: &[R], columns: &[R::Column]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    export(format, &mut buffer, rows, columns)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::AggregateMetric;
    use crate::table::{AggregateColumn, LogColumn};
    use crate::test_support::{record_at, sample_rows};

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_csv_export_follows_columns() {
        let mut record = record_at("1.2.3.4", "TCP", "PERMIT", 443, 0);
        record.interface = "dmz,east".into();
        let columns = [LogColumn::Interface, LogColumn::DestinationPort, LogColumn::Action];
        let bytes = export_bytes(ExportFormat::Csv, &[record], &columns).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "interfaceint,portdst,action\r\n\"dmz,east\",443,PERMIT\r\n");
    }

    #[test]
    fn test_ndjson_keeps_column_order() {
        let rows = sample_rows();
        let columns = [
            AggregateColumn::Metric(AggregateMetric::Deny),
            AggregateColumn::SourceIp,
        ];
        let bytes = export_bytes(ExportFormat::Ndjson, &rows[..2], &columns).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            r#"{"deny":0,"source_ip":"10.70.1.1"}"#,
            r#"{"deny":1,"source_ip":"8.8.8.8"}"#,
        ]);
    }

    #[test]
    fn test_format_parsing_and_names() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("jsonl".parse::<ExportFormat>().unwrap(), ExportFormat::Ndjson);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Ndjson.file_name("logs"), "logs.ndjson");
    }
}
