//! Pattern-based field selection
//!
//! Every stage that picks fields by name goes through a `FieldSelector`:
//! a list of regular expressions matched against the whole field name, with
//! an optional "everything except" inversion.

use crate::error::{Error, Result};
use regex::Regex;

/// Selects field names by a list of whole-name regular expressions
#[derive(Debug, Clone)]
pub struct FieldSelector {
    patterns: Vec<Regex>,
    invert: bool,
}

impl FieldSelector {
    /// Compile a selector from pattern strings
    ///
    /// Each pattern is anchored to match the entire field name. With
    /// `invert`, selection is flipped: an empty pattern list then selects
    /// every field instead of none.
    pub fn new<S: AsRef<str>>(patterns: &[S], invert: bool) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{})$", p))
                    .map_err(|e| Error::Config(format!("bad field pattern \"{}\": {}", p, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns, invert })
    }

    /// Whether `name` is selected
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name)) != self.invert
    }
}
