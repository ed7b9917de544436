//! Parser for the flat text table format
//!
//! One line per (variable, field) pair:
//!
//! ```text
//! pt.bins: 0 10 20
//! pt.xsec: 1.5 2.5
//! pt.jes: +0.1,-0.2 +0.3,-0.1
//! ```
//!
//! Blank lines separate variables. Order of appearance defines both variable
//! order and field order. The serializer is `Display for Table`.

use crate::error::{Error, Result};
use crate::table::{Table, Variable};
use std::fs;
use std::path::Path;

/// Parse a table file
pub fn parse_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_table_str(&content, &path.display().to_string())
}

/// Parse a table from a string, with `source` named in errors and warnings
pub fn parse_table_str(content: &str, source: &str) -> Result<Table> {
    let mut table = Table::new();
    parse_into(content, source, &mut table)?;
    Ok(table)
}

/// Parse a table into an existing collection, accumulating variables
pub fn parse_into(content: &str, source: &str, table: &mut Table) -> Result<()> {
    for (idx, line) in content.lines().enumerate() {
        let line_n = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let dot = line.find('.').ok_or_else(|| Error::Parse {
            file: source.to_string(),
            line: line_n,
            message: "expected '.' in line".to_string(),
        })?;
        let colon = line[dot + 1..].find(':').map(|i| dot + 1 + i).ok_or_else(|| Error::Parse {
            file: source.to_string(),
            line: line_n,
            message: "expected ':' in line".to_string(),
        })?;

        let var_name = &line[..dot];
        let field = &line[dot + 1..colon];
        let values: Vec<String> = line[colon + 1..]
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let var = table
            .vars
            .entry(var_name.to_string())
            .or_insert_with(Variable::new);

        if field == "bins" {
            if !var.bin_edges.is_empty() {
                log::warn!(
                    "{}:{}: repeated binning for variable \"{}\", ignored",
                    source,
                    line_n,
                    var_name
                );
                continue;
            }
            var.bin_edges = values;
        } else {
            if var.fields.contains_key(field) {
                log::warn!(
                    "{}:{}: repeated field \"{}\" in variable \"{}\", ignored",
                    source,
                    line_n,
                    field,
                    var_name
                );
                continue;
            }
            var.fields.insert(field.to_string(), values);
        }
    }
    Ok(())
}
