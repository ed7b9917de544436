//! Merge engine for folding multiple parsed inputs into one table
//!
//! The first input seeds the result. Later inputs add new variables
//! wholesale and override fields of variables already present, subject to a
//! binning-compatibility check: identical edge text, or a per-edge
//! fractional tolerance when one is configured.

use crate::error::{Error, Result};
use crate::numeric::parse_number;
use crate::table::Table;

/// Merge parsed tables in order, later files overriding earlier ones
///
/// Each entry pairs a table with the source name used in error messages.
/// `tol` enables tolerance-based edge comparison; without it, bin edges must
/// match textually.
pub fn merge_tables(tables: Vec<(Table, String)>, tol: Option<f64>) -> Result<Table> {
    let mut iter = tables.into_iter();
    let mut result = match iter.next() {
        Some((table, _)) => table,
        None => return Ok(Table::new()),
    };

    for (table, source) in iter {
        for (name, var) in table.vars {
            match result.vars.get_mut(&name) {
                None => {
                    result.vars.insert(name, var);
                }
                Some(existing) => {
                    if !edges_compatible(&existing.bin_edges, &var.bin_edges, tol, &name)? {
                        return Err(Error::BinningMismatch {
                            variable: name,
                            origin: source,
                        });
                    }
                    // the result keeps its own edges; incoming fields win
                    for (field, values) in var.fields {
                        existing.fields.insert(field, values);
                    }
                }
            }
        }
    }
    Ok(result)
}

fn edges_compatible(
    ours: &[String],
    theirs: &[String],
    tol: Option<f64>,
    variable: &str,
) -> Result<bool> {
    if ours.len() != theirs.len() {
        return Ok(false);
    }
    for (a, b) in ours.iter().zip(theirs) {
        if a == b {
            continue;
        }
        let tol = match tol {
            Some(t) => t,
            None => return Ok(false),
        };
        let x1 = parse_number(a).ok_or_else(|| Error::numeric(a, "bins", variable))?;
        let x2 = parse_number(b).ok_or_else(|| Error::numeric(b, "bins", variable))?;
        if !((1.0 - x1 / x2).abs() < tol) {
            return Ok(false);
        }
    }
    Ok(true)
}
