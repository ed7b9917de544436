//! Core table types for binned uncertainty data

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named binned quantity with its bin edges and uncertainty fields
///
/// `bin_edges` holds N+1 decimal strings defining N bins; every field holds
/// exactly one string value per bin. Values stay text until a stage needs
/// them numerically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Variable {
    /// Bin edges, stored as the decimal strings they were read with
    pub bin_edges: Vec<String>,
    /// Per-bin value vectors, keyed by field name, in insertion order
    pub fields: IndexMap<String, Vec<String>>,
}

impl Variable {
    /// Create an empty variable
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bins defined by the edges
    pub fn bin_count(&self) -> usize {
        self.bin_edges.len().saturating_sub(1)
    }

    /// Get a field's values by name
    pub fn field(&self, name: &str) -> Option<&Vec<String>> {
        self.fields.get(name)
    }
}

/// An ordered collection of named variables
///
/// Constructed fresh per run from one or more parsed inputs, mutated in
/// place by each pipeline stage, then serialized. Variable order is
/// insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Variables keyed by name, in insertion order
    pub vars: IndexMap<String, Variable>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of variables
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Get a variable by name
    pub fn var(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    /// Validate the bin-count invariant for every variable
    ///
    /// Every variable must have at least two bin edges, and every field's
    /// value count must equal the bin count.
    pub fn check(&self) -> Result<()> {
        for (name, var) in &self.vars {
            if var.bin_edges.is_empty() {
                return Err(Error::EmptyBinning {
                    variable: name.clone(),
                });
            }
            let bins = var.bin_count();
            for (field, values) in &var.fields {
                if values.len() != bins {
                    return Err(Error::BinCountMismatch {
                        variable: name.clone(),
                        field: field.clone(),
                        count: values.len(),
                        bins,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Serialize in the flat text form: one `name.bins:` line and one
/// `name.field:` line per field, a blank line terminating each variable
impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, var) in &self.vars {
            write!(f, "{}.bins:", name)?;
            for edge in &var.bin_edges {
                write!(f, " {}", edge)?;
            }
            writeln!(f)?;
            for (field, values) in &var.fields {
                write!(f, "{}.{}:", name, field)?;
                for v in values {
                    write!(f, " {}", v)?;
                }
                writeln!(f)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
