// src/results_export.rs
//! Serialising a resolved table: CSV, JSON, aligned text and xlsx.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use directories::UserDirs;
use serde_json::{Map, Value as Json};
use unicode_segmentation::UnicodeSegmentation;

use crate::resolver::{Column, ResolvedTable, ACTIONS_COLUMN};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
    Text,
    Xlsx,
}

impl OutputFormat {
    pub fn parse(name: &str) -> Result<Self> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "csv" => OutputFormat::Csv,
            "json" => OutputFormat::Json,
            "txt" | "text" => OutputFormat::Text,
            "xlsx" | "excel" => OutputFormat::Xlsx,
            other => bail!("Unknown output format '{other}' (csv, json, txt, xlsx)"),
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Text => "txt",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

/// RFC-4180 CSV escaping
pub fn escape_csv(field: &str) -> String {
    let needs_quotes = field.contains(',')
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r');
    if needs_quotes {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn exported_columns(table: &ResolvedTable) -> Vec<&Column> {
    table
        .columns
        .iter()
        .filter(|c| c.key != ACTIONS_COLUMN)
        .collect()
}

pub fn to_csv(table: &ResolvedTable) -> String {
    let (headers, rows) = table.to_grid();
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(headers.iter().map(|h| escape_csv(h)).collect::<Vec<_>>().join(","));
    for row in &rows {
        lines.push(row.iter().map(|c| escape_csv(c)).collect::<Vec<_>>().join(","));
    }
    lines.join("\r\n")
}

/// Array of row objects keyed by column display name, values typed.
pub fn to_json(table: &ResolvedTable) -> Json {
    let cols = exported_columns(table);
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let obj: Map<String, Json> = cols
                .iter()
                .map(|c| {
                    let v = row.get(&c.key).map(Value::to_json).unwrap_or(Json::Null);
                    (c.name.clone(), v)
                })
                .collect();
            Json::Object(obj)
        })
        .collect();
    Json::Array(rows)
}

fn display_width(s: &str) -> usize {
    s.graphemes(true).count()
}

fn pad(s: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(s));
    format!("{s}{}", " ".repeat(fill))
}

pub fn to_text(table: &ResolvedTable) -> String {
    let (headers, rows) = table.to_grid();
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(display_width(cell).max(if cell.is_empty() { 4 } else { 0 }));
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = headers.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect();
    out.push_str(header.join(" | ").trim_end());
    out.push('\n');
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&sep.join("-+-"));
    out.push('\n');
    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad(if c.is_empty() { "NULL" } else { c }, *w))
            .collect();
        out.push_str(cells.join(" | ").trim_end());
        out.push('\n');
    }
    out
}

pub fn write_xlsx(path: &Path, table: &ResolvedTable) -> Result<()> {
    use rust_xlsxwriter::{Format, Workbook};

    let cols = exported_columns(table);
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (c, col) in cols.iter().enumerate() {
        sheet.write_with_format(0, c as u16, col.name.as_str(), &bold)?;
        sheet.set_column_width(c as u16, 15.0)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = r as u32 + 1;
        for (c, col) in cols.iter().enumerate() {
            let c = c as u16;
            match row.get(&col.key) {
                None | Some(Value::Null) => {}
                Some(Value::Integer(i)) => {
                    sheet.write_number(r, c, *i as f64)?;
                }
                Some(Value::Decimal(d)) => {
                    sheet.write_number(r, c, *d)?;
                }
                Some(Value::Bool(b)) => {
                    sheet.write_boolean(r, c, *b)?;
                }
                Some(other) => {
                    sheet.write_string(r, c, other.to_string())?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

pub fn write_table(path: &Path, table: &ResolvedTable, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => fs::write(path, to_csv(table))?,
        OutputFormat::Json => fs::write(path, serde_json::to_string_pretty(&to_json(table))?)?,
        OutputFormat::Text => fs::write(path, to_text(table))?,
        OutputFormat::Xlsx => write_xlsx(path, table)?,
    }
    Ok(())
}

/// The user's Downloads directory, else home, else the working directory.
pub fn downloads_folder() -> PathBuf {
    if let Some(user_dirs) = UserDirs::new() {
        if let Some(dl) = user_dirs.download_dir() {
            return dl.to_path_buf();
        }
        return user_dirs.home_dir().to_path_buf();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn export_csv_to(dir: &Path, table: &ResolvedTable) -> Result<PathBuf> {
    let target = dir.join(format!("entity_{}.csv", table.entity_id));
    fs::write(&target, to_csv(table))?;
    Ok(target)
}
