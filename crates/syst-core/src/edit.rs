//! Field-level editing pipeline
//!
//! Stages run in a fixed order over the whole in-memory table: remove,
//! symmetrize, aggregate, top-N reduction, reorder. Each stage revalidates
//! the bin-count invariant when it finishes.

use crate::error::{Error, Result};
use crate::numeric::{format_number, parse_magnitude, DEFAULT_PRECISION};
use crate::selector::FieldSelector;
use crate::table::Table;
use std::cmp::Ordering;

/// Configuration for the aggregation stage
#[derive(Debug, Clone)]
pub struct AggregateSpec {
    /// Name of the field receiving the aggregated values
    pub output: String,
    /// Selects the fields to consume
    pub selector: FieldSelector,
    /// Sum squares and take the square root instead of summing linearly
    pub quadrature: bool,
}

impl AggregateSpec {
    /// Build from a flag's argument list: output field name first, patterns
    /// after
    ///
    /// Inclusive aggregation requires at least one pattern; exclusive
    /// aggregation with no patterns consumes every field.
    pub fn from_args(args: &[String], quadrature: bool, exclusive: bool) -> Result<Self> {
        let output = args
            .first()
            .ok_or_else(|| Error::Config("aggregation needs an output field name".to_string()))?;
        if !exclusive && args.len() < 2 {
            return Err(Error::Config(
                "inclusive aggregation needs at least one field pattern".to_string(),
            ));
        }
        Ok(Self {
            output: output.clone(),
            selector: FieldSelector::new(&args[1..], exclusive)?,
            quadrature,
        })
    }
}

/// Configuration for the top-N reduction stage
#[derive(Debug, Clone)]
pub struct TopSpec {
    /// Number of contributions kept verbatim
    pub n: usize,
    /// Name of the combined residual field
    pub others: String,
    /// Fields that pass through untouched
    pub exclude: FieldSelector,
}

impl TopSpec {
    /// Parse the `n[:name]` flag argument; the residual name defaults to
    /// `others`
    pub fn from_arg(arg: &str, exclude: FieldSelector) -> Result<Self> {
        let (n_str, others) = match arg.split_once(':') {
            Some((n, name)) => (n, name),
            None => (arg, "others"),
        };
        if others.is_empty() {
            return Err(Error::Config(format!(
                "empty residual field name in \"{}\"",
                arg
            )));
        }
        let n = n_str.parse().map_err(|_| {
            Error::Config(format!("bad field count \"{}\" in \"{}\"", n_str, arg))
        })?;
        Ok(Self {
            n,
            others: others.to_string(),
            exclude,
        })
    }
}

/// The requested stages, applied by [`apply`] in pipeline order
#[derive(Debug, Clone)]
pub struct EditOptions {
    /// Delete fields matching this selector
    pub remove: Option<FieldSelector>,
    /// Collapse asymmetric uncertainty pairs
    pub symmetrize: bool,
    /// Aggregate a field selection into one field
    pub aggregate: Option<AggregateSpec>,
    /// Keep the highest-impact fields, combine the rest
    pub top: Option<TopSpec>,
    /// Field names to move to the front, in order
    pub order: Vec<String>,
    /// Fractional digits for computed values
    pub precision: usize,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            remove: None,
            symmetrize: false,
            aggregate: None,
            top: None,
            order: Vec::new(),
            precision: DEFAULT_PRECISION,
        }
    }
}

/// Run the requested stages in their fixed order
pub fn apply(table: &mut Table, opts: &EditOptions) -> Result<()> {
    if let Some(selector) = &opts.remove {
        remove(table, selector);
        table.check()?;
    }
    if opts.symmetrize {
        symmetrize(table)?;
        table.check()?;
    }
    if let Some(spec) = &opts.aggregate {
        aggregate(table, spec, opts.precision)?;
        table.check()?;
    }
    if let Some(spec) = &opts.top {
        top_n(table, spec, opts.precision)?;
        table.check()?;
    }
    if !opts.order.is_empty() {
        reorder(table, &opts.order);
        table.check()?;
    }
    Ok(())
}

/// Delete every field matching `selector`, in every variable
///
/// Matching nothing is not an error; survivor order is preserved.
pub fn remove(table: &mut Table, selector: &FieldSelector) {
    for var in table.vars.values_mut() {
        var.fields.retain(|name, _| !selector.matches(name));
    }
}

/// Collapse asymmetric uncertainty pairs into single values
///
/// A value with a comma is split into its two parts; the part with the
/// larger magnitude survives, sign included. A value without a comma loses
/// a single leading sign if it has one.
pub fn symmetrize(table: &mut Table) -> Result<()> {
    for (var_name, var) in &mut table.vars {
        for (field, values) in &mut var.fields {
            for value in values.iter_mut() {
                if let Some(comma) = value.find(',') {
                    let upper = parse_magnitude(&value[..comma])
                        .ok_or_else(|| Error::numeric(&value[..comma], field, var_name))?;
                    let lower = parse_magnitude(&value[comma + 1..])
                        .ok_or_else(|| Error::numeric(&value[comma + 1..], field, var_name))?;
                    *value = if upper > lower {
                        value[..comma].to_string()
                    } else {
                        value[comma + 1..].to_string()
                    };
                } else if value.starts_with('+') || value.starts_with('-') {
                    value.remove(0);
                }
            }
        }
    }
    Ok(())
}

/// Aggregate selected fields into one output field, per bin
///
/// Linear mode sums value magnitudes; quadrature mode sums squares and takes
/// the square root. Consumed fields are deleted; a pre-existing output field
/// is rewritten in place at its original position, a new one is appended.
pub fn aggregate(table: &mut Table, spec: &AggregateSpec, precision: usize) -> Result<()> {
    for (var_name, var) in &mut table.vars {
        // a pre-existing output field is consumed too, contributing nothing
        let consumed: Vec<String> = var
            .fields
            .keys()
            .filter(|name| spec.selector.matches(name.as_str()) || **name == spec.output)
            .cloned()
            .collect();

        let mut sums = vec![0.0; var.bin_count()];
        for name in &consumed {
            if *name == spec.output {
                continue;
            }
            let values = &var.fields[name.as_str()];
            for (sum, value) in sums.iter_mut().zip(values) {
                let x = parse_magnitude(value)
                    .ok_or_else(|| Error::numeric(value, name, var_name))?;
                *sum += if spec.quadrature { x * x } else { x };
            }
        }

        let formatted: Vec<String> = sums
            .iter()
            .map(|&s| {
                let total = if spec.quadrature { s.sqrt() } else { s };
                format_number(total, precision)
            })
            .collect();

        var.fields
            .retain(|name, _| *name == spec.output || !consumed.contains(name));
        if let Some(slot) = var.fields.get_mut(&spec.output) {
            *slot = formatted;
        } else {
            var.fields.insert(spec.output.clone(), formatted);
        }
    }
    Ok(())
}

/// Keep the `n` highest-impact fields, combine the rest in quadrature
///
/// Impact is the per-bin ratio of a field's value to the `xsec` reference,
/// summed across bins. Excluded fields and `xsec` pass through untouched in
/// their original relative order; kept fields follow in descending-impact
/// order; the combined residual comes last. No residual field is created
/// when nothing remains to combine.
pub fn top_n(table: &mut Table, spec: &TopSpec, precision: usize) -> Result<()> {
    for (var_name, var) in &mut table.vars {
        let xsec = var.fields.get("xsec").ok_or_else(|| Error::MissingField {
            field: "xsec".to_string(),
            variable: var_name.clone(),
        })?;
        let reference = xsec
            .iter()
            .map(|v| parse_magnitude(v).ok_or_else(|| Error::numeric(v, "xsec", var_name)))
            .collect::<Result<Vec<f64>>>()?;

        // candidate impact scores, in original field order
        let mut scored: Vec<(String, f64)> = Vec::new();
        for (name, values) in &var.fields {
            if name == "xsec" || spec.exclude.matches(name) {
                continue;
            }
            let mut score = 0.0;
            for (value, r) in values.iter().zip(&reference) {
                let x = parse_magnitude(value)
                    .ok_or_else(|| Error::numeric(value, name, var_name))?;
                score += x / r;
            }
            scored.push((name.clone(), score));
        }

        if spec.n > scored.len() {
            return Err(Error::Config(format!(
                "top {} requested but variable \"{}\" has only {} candidate fields",
                spec.n,
                var_name,
                scored.len()
            )));
        }

        let mut ranked = scored.clone();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        let kept: Vec<String> = ranked[..spec.n].iter().map(|(name, _)| name.clone()).collect();
        let remainder: Vec<String> = scored
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !kept.contains(name))
            .cloned()
            .collect();

        if !remainder.is_empty() {
            let mut sums = vec![0.0; var.bin_count()];
            for name in &remainder {
                let values = &var.fields[name.as_str()];
                for (sum, value) in sums.iter_mut().zip(values) {
                    let x = parse_magnitude(value)
                        .ok_or_else(|| Error::numeric(value, name, var_name))?;
                    *sum += x * x;
                }
            }
            let combined: Vec<String> = sums
                .iter()
                .map(|&s| format_number(s.sqrt(), precision))
                .collect();
            var.fields.retain(|name, _| !remainder.contains(name));
            var.fields.insert(spec.others.clone(), combined);
        }

        // passthrough first, kept by descending impact, residual last
        let has_residual = !remainder.is_empty();
        let rank = |name: &str| -> (u8, usize) {
            if let Some(pos) = kept.iter().position(|k| k == name) {
                (1, pos)
            } else if has_residual && name == spec.others {
                (2, 0)
            } else {
                (0, 0)
            }
        };
        var.fields.sort_by(|k1, _, k2, _| rank(k1).cmp(&rank(k2)));
    }
    Ok(())
}

/// Stably move fields named in `names` to the front, in that order
///
/// Fields absent from the list keep their relative order after all listed
/// fields.
pub fn reorder(table: &mut Table, names: &[String]) {
    for var in table.vars.values_mut() {
        let rank =
            |name: &str| names.iter().position(|n| n == name).unwrap_or(names.len());
        var.fields.sort_by(|k1, _, k2, _| rank(k1).cmp(&rank(k2)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_table_str;

    fn table(text: &str) -> Table {
        parse_table_str(text, "test.txt").unwrap()
    }

    fn field_names(table: &Table, var: &str) -> Vec<String> {
        table.var(var).unwrap().fields.keys().cloned().collect()
    }

    #[test]
    fn test_remove() {
        let mut t = table("pt.bins: 0 10\npt.xsec: 1\npt.jes1: 0.1\npt.jes2: 0.2\n");
        let sel = FieldSelector::new(&["jes.*"], false).unwrap();
        remove(&mut t, &sel);
        assert_eq!(field_names(&t, "pt"), ["xsec"]);
    }

    #[test]
    fn test_remove_matching_nothing() {
        let mut t = table("pt.bins: 0 10\npt.xsec: 1\n");
        let sel = FieldSelector::new(&["nope"], false).unwrap();
        remove(&mut t, &sel);
        assert_eq!(field_names(&t, "pt"), ["xsec"]);
    }

    #[test]
    fn test_remove_then_reorder_never_resurrects() {
        let mut t = table("pt.bins: 0 10\npt.xsec: 1\npt.X: 0.1\npt.jes: 0.2\n");
        let sel = FieldSelector::new(&["X"], false).unwrap();
        remove(&mut t, &sel);
        reorder(&mut t, &["jes".to_string(), "xsec".to_string()]);
        assert_eq!(field_names(&t, "pt"), ["jes", "xsec"]);
    }

    #[test]
    fn test_symmetrize_keeps_larger_with_sign() {
        let mut t = table("pt.bins: 0 10\npt.jes: +1.5,-2.0\n");
        symmetrize(&mut t).unwrap();
        assert_eq!(t.var("pt").unwrap().fields["jes"], vec!["-2.0"]);
    }

    #[test]
    fn test_symmetrize_strips_lone_sign() {
        let mut t = table("pt.bins: 0 10 20\npt.jes: -0.5 +0.25\n");
        symmetrize(&mut t).unwrap();
        assert_eq!(t.var("pt").unwrap().fields["jes"], vec!["0.5", "0.25"]);
    }

    #[test]
    fn test_symmetrize_tie_keeps_second() {
        let mut t = table("pt.bins: 0 10\npt.jes: +0.5,-0.5\n");
        symmetrize(&mut t).unwrap();
        assert_eq!(t.var("pt").unwrap().fields["jes"], vec!["-0.5"]);
    }

    #[test]
    fn test_symmetrize_idempotent() {
        let mut t = table("pt.bins: 0 10 20\npt.jes: 0.5,-0.25 3.5\npt.stat: 0.1 +0.2\n");
        symmetrize(&mut t).unwrap();
        let once = t.to_string();
        symmetrize(&mut t).unwrap();
        assert_eq!(t.to_string(), once);
    }

    #[test]
    fn test_symmetrize_malformed_part() {
        let mut t = table("pt.bins: 0 10\npt.jes: +1.5,-x\n");
        let err = symmetrize(&mut t).unwrap_err();
        match err {
            Error::NumericFormat { value, field, variable } => {
                assert_eq!(value, "-x");
                assert_eq!(field, "jes");
                assert_eq!(variable, "pt");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_aggregate_quadrature() {
        let mut t = table("pt.bins: 0 10 20\npt.a: 3 4\npt.b: 4 3\n");
        let spec = AggregateSpec::from_args(
            &["sum".to_string(), "a".to_string(), "b".to_string()],
            true,
            false,
        )
        .unwrap();
        aggregate(&mut t, &spec, 8).unwrap();
        assert_eq!(
            t.var("pt").unwrap().fields["sum"],
            vec!["5.00000000", "5.00000000"]
        );
        assert_eq!(field_names(&t, "pt"), ["sum"]);
    }

    #[test]
    fn test_aggregate_linear_strips_signs() {
        let mut t = table("pt.bins: 0 10 20\npt.a: -1 2\npt.b: 2 1\n");
        let spec = AggregateSpec::from_args(
            &["sum".to_string(), "a".to_string(), "b".to_string()],
            false,
            false,
        )
        .unwrap();
        aggregate(&mut t, &spec, 8).unwrap();
        assert_eq!(
            t.var("pt").unwrap().fields["sum"],
            vec!["3.00000000", "3.00000000"]
        );
    }

    #[test]
    fn test_aggregate_exclusive() {
        let mut t = table("pt.bins: 0 10\npt.xsec: 1\npt.a: 3\npt.b: 4\n");
        let spec = AggregateSpec::from_args(
            &["sum".to_string(), "xsec".to_string()],
            true,
            true,
        )
        .unwrap();
        aggregate(&mut t, &spec, 8).unwrap();
        assert_eq!(field_names(&t, "pt"), ["xsec", "sum"]);
        assert_eq!(t.var("pt").unwrap().fields["sum"], vec!["5.00000000"]);
    }

    #[test]
    fn test_aggregate_reuses_output_slot_in_place() {
        let mut t = table("pt.bins: 0 10\npt.sum: 9\npt.xsec: 1\npt.a: 3\npt.b: 4\n");
        let spec = AggregateSpec::from_args(
            &["sum".to_string(), "a".to_string(), "b".to_string()],
            true,
            false,
        )
        .unwrap();
        aggregate(&mut t, &spec, 8).unwrap();
        // the stale "9" does not leak into the accumulation
        assert_eq!(t.var("pt").unwrap().fields["sum"], vec!["5.00000000"]);
        // output keeps its original position
        assert_eq!(field_names(&t, "pt"), ["sum", "xsec"]);
    }

    #[test]
    fn test_aggregate_inclusive_needs_patterns() {
        let err = AggregateSpec::from_args(&["sum".to_string()], false, false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        // exclusive mode accepts the bare output name
        assert!(AggregateSpec::from_args(&["sum".to_string()], false, true).is_ok());
    }

    #[test]
    fn test_aggregate_unparsable_value() {
        let mut t = table("pt.bins: 0 10\npt.a: bad\n");
        let spec =
            AggregateSpec::from_args(&["sum".to_string(), "a".to_string()], false, false).unwrap();
        let err = aggregate(&mut t, &spec, 8).unwrap_err();
        match err {
            Error::NumericFormat { value, field, .. } => {
                assert_eq!(value, "bad");
                assert_eq!(field, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn top_spec(n: usize, exclude: &[&str]) -> TopSpec {
        TopSpec {
            n,
            others: "others".to_string(),
            exclude: FieldSelector::new(exclude, false).unwrap(),
        }
    }

    #[test]
    fn test_top_n_keeps_highest_impact() {
        let mut t = table(
            "pt.bins: 0 10\npt.xsec: 1\npt.c: 2\npt.a: 5\npt.d: 1\npt.b: 3\n",
        );
        top_n(&mut t, &top_spec(2, &[]), 8).unwrap();
        // sqrt(2^2 + 1^2)
        assert_eq!(
            field_names(&t, "pt"),
            ["xsec", "a", "b", "others"]
        );
        assert_eq!(t.var("pt").unwrap().fields["others"], vec!["2.23606798"]);
    }

    #[test]
    fn test_top_n_excluded_fields_pass_through() {
        let mut t = table(
            "pt.bins: 0 10\npt.stat: 9\npt.xsec: 1\npt.a: 5\npt.b: 3\npt.c: 2\n",
        );
        top_n(&mut t, &top_spec(1, &["stat"]), 8).unwrap();
        // stat is huge but excluded: untouched and still in front
        assert_eq!(field_names(&t, "pt"), ["stat", "xsec", "a", "others"]);
        assert_eq!(t.var("pt").unwrap().fields["stat"], vec!["9"]);
    }

    #[test]
    fn test_top_n_requires_xsec() {
        let mut t = table("pt.bins: 0 10\npt.a: 5\n");
        let err = top_n(&mut t, &top_spec(1, &[]), 8).unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field, .. } if field == "xsec"));
    }

    #[test]
    fn test_top_n_too_large() {
        let mut t = table("pt.bins: 0 10\npt.xsec: 1\npt.a: 5\n");
        let err = top_n(&mut t, &top_spec(2, &[]), 8).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_top_n_exact_count_leaves_no_residual() {
        let mut t = table("pt.bins: 0 10\npt.xsec: 1\npt.a: 5\npt.b: 3\n");
        top_n(&mut t, &top_spec(2, &[]), 8).unwrap();
        assert_eq!(field_names(&t, "pt"), ["xsec", "a", "b"]);
    }

    #[test]
    fn test_top_n_residual_independent_of_remainder_order() {
        let mut t1 = table("pt.bins: 0 10\npt.xsec: 1\npt.a: 5\npt.b: 3\npt.c: 2\n");
        let mut t2 = table("pt.bins: 0 10\npt.xsec: 1\npt.a: 5\npt.c: 2\npt.b: 3\n");
        top_n(&mut t1, &top_spec(1, &[]), 8).unwrap();
        top_n(&mut t2, &top_spec(1, &[]), 8).unwrap();
        assert_eq!(
            t1.var("pt").unwrap().fields["others"],
            t2.var("pt").unwrap().fields["others"]
        );
    }

    #[test]
    fn test_top_n_impact_normalized_by_reference() {
        // raw values favor b, impact (value/xsec per bin) favors a
        let mut t = table(
            "pt.bins: 0 10 20\npt.xsec: 1 100\npt.a: 5 1\npt.b: 1 90\npt.c: 0.1 0.1\n",
        );
        top_n(&mut t, &top_spec(1, &[]), 8).unwrap();
        assert_eq!(field_names(&t, "pt"), ["xsec", "a", "others"]);
    }

    #[test]
    fn test_reorder() {
        let mut t = table("pt.bins: 0 10\npt.c: 1\npt.a: 2\npt.b: 3\npt.d: 4\n");
        reorder(&mut t, &["b".to_string(), "a".to_string()]);
        assert_eq!(field_names(&t, "pt"), ["b", "a", "c", "d"]);
    }

    #[test]
    fn test_reorder_unknown_names_ignored() {
        let mut t = table("pt.bins: 0 10\npt.a: 1\npt.b: 2\n");
        reorder(&mut t, &["nope".to_string(), "b".to_string()]);
        assert_eq!(field_names(&t, "pt"), ["b", "a"]);
    }

    #[test]
    fn test_apply_runs_stages_in_fixed_order() {
        let mut t = table(
            "pt.bins: 0 10\npt.xsec: 1\npt.drop: 7\npt.jes: +0.3,-0.4\npt.stat: 0.1\n",
        );
        let opts = EditOptions {
            remove: Some(FieldSelector::new(&["drop"], false).unwrap()),
            symmetrize: true,
            aggregate: Some(
                AggregateSpec::from_args(
                    &["total".to_string(), "jes".to_string(), "stat".to_string()],
                    true,
                    false,
                )
                .unwrap(),
            ),
            top: None,
            order: vec!["total".to_string()],
            precision: 8,
        };
        apply(&mut t, &opts).unwrap();
        assert_eq!(field_names(&t, "pt"), ["total", "xsec"]);
        // sqrt(0.4^2 + 0.1^2)
        assert_eq!(t.var("pt").unwrap().fields["total"], vec!["0.41231056"]);
    }
}
