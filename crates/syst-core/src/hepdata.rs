//! Ingestion of HEPData-style dataset dumps
//!
//! Converts the bibliographic text dump into the table shape the editing
//! pipeline consumes: one variable per `*dataset:` block, with `xsec` and
//! `stat` fields from the cross-section column and one field per `DSYS`
//! systematic.

use crate::error::{Error, Result};
use crate::table::{Table, Variable};

/// Parse a dump from a string into a fresh table
pub fn parse_hepdata_str(content: &str, source: &str) -> Result<Table> {
    let mut table = Table::new();
    ingest_into(content, source, &mut table)?;
    Ok(table)
}

/// Parse a dump into an existing table, accumulating variables across inputs
///
/// A `*dataset:` line opens a variable named by the path segment after the
/// last `/`; a repeated name is warned about and that dataset is skipped.
/// Header lines starting with `*` before the first bin line are ignored; a
/// blank line (or a `*` line once bins began) closes the variable.
pub fn ingest_into(content: &str, source: &str, table: &mut Table) -> Result<()> {
    let mut current: Option<String> = None;
    for (idx, line) in content.lines().enumerate() {
        let line_n = idx + 1;
        if let Some(name) = current.as_deref() {
            let star = line.starts_with('*');
            if !star && !line.trim().is_empty() {
                let var = &mut table.vars[name];
                parse_bin_line(line, line_n, source, name, var)?;
                continue;
            }
            if star && table.vars[name].bin_edges.is_empty() {
                continue;
            }
            current = None;
            continue;
        }
        if let Some(rest) = line.strip_prefix("*dataset:") {
            let name = rest.rsplit('/').next().unwrap_or(rest).trim();
            if table.vars.contains_key(name) {
                log::warn!(
                    "{}:{}: repeated variable \"{}\", ignored",
                    source,
                    line_n,
                    name
                );
            } else {
                table.vars.insert(name.to_string(), Variable::new());
                current = Some(name.to_string());
            }
        }
    }
    Ok(())
}

/// Parse one bin line: `lo TO hi; xsec +- stat (DSYS=v:name,...)`
fn parse_bin_line(
    line: &str,
    line_n: usize,
    source: &str,
    var_name: &str,
    var: &mut Variable,
) -> Result<()> {
    let err = |message: String| Error::Parse {
        file: source.to_string(),
        line: line_n,
        message,
    };

    let semi = line
        .find(';')
        .ok_or_else(|| err("expected ';'".to_string()))?;
    let bin: Vec<&str> = line[..semi].split_whitespace().collect();
    let (lo, hi) = match bin.as_slice() {
        [lo, to, hi] if *to == "TO" => (*lo, *hi),
        _ => {
            return Err(err(format!(
                "unexpected bin definition: {}",
                line[..semi].trim()
            )))
        }
    };
    match var.bin_edges.last() {
        None => var.bin_edges.push(lo.to_string()),
        Some(last) if last != lo => {
            return Err(err(format!(
                "mismatch in bin edges in \"{}\": {} and {}",
                var_name, last, lo
            )))
        }
        Some(_) => {}
    }
    var.bin_edges.push(hi.to_string());

    let paren = line[semi + 1..]
        .find('(')
        .map(|i| semi + 1 + i)
        .ok_or_else(|| err("expected '('".to_string()))?;
    let mid: Vec<&str> = line[semi + 1..paren].split_whitespace().collect();
    let (xsec, stat) = match mid.as_slice() {
        [xsec, pm, stat] if *pm == "+-" => (*xsec, *stat),
        _ => {
            return Err(err(format!(
                "unexpected cross section: {}",
                line[semi + 1..paren].trim()
            )))
        }
    };
    var.fields
        .entry("xsec".to_string())
        .or_default()
        .push(xsec.to_string());
    var.fields
        .entry("stat".to_string())
        .or_default()
        .push(stat.to_string());

    let rparen = line
        .rfind(')')
        .filter(|&i| i > paren)
        .ok_or_else(|| err("missing closing ')'".to_string()))?;
    let content = &line[paren + 1..rparen];

    // a DSYS value may itself contain a comma (asymmetric pair), so entries
    // run to the next DSYS= occurrence rather than the next comma
    let starts: Vec<usize> = content.match_indices("DSYS=").map(|(i, _)| i).collect();
    for (k, &start) in starts.iter().enumerate() {
        let end = starts.get(k + 1).copied().unwrap_or(content.len());
        let entry = content[start + 5..end].trim_end_matches([',', ' ', '\t']);
        let colon = entry.find(':').ok_or_else(|| {
            err(format!("expected ':' in systematic entry \"{}\"", entry))
        })?;
        let value = entry[..colon].trim();
        let name = entry[colon + 1..].trim();
        var.fields
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }
    Ok(())
}
