//! Comparative report: throughput per implementation, normalized to a baseline.
//!
//! The baseline is resolved once per report and applied to every group. A
//! group without baseline samples fails the whole report; nothing is printed
//! for it.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::footprint::{format_thousands, Footprints};
use crate::orchestrator::RawSample;

/// Baseline used by convention when it is part of the include set.
pub const PREFERRED_BASELINE: &str = "vavr";

/// Significant digits of the relative-speed column.
pub const SIGNIFICANT_DIGITS: usize = 3;

const RULE_WIDTH: usize = 80;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaselinePolicy {
    /// [`PREFERRED_BASELINE`] if included, else the alphabetically first tag.
    #[default]
    Convention,
    /// Always this tag.
    Fixed(String),
}

impl BaselinePolicy {
    /// Pick the baseline among `candidates`, the included tags that every
    /// reported group registers.
    pub fn resolve(&self, candidates: &BTreeSet<String>) -> Option<String> {
        match self {
            BaselinePolicy::Fixed(tag) => Some(tag.clone()),
            BaselinePolicy::Convention if candidates.contains(PREFERRED_BASELINE) => {
                Some(PREFERRED_BASELINE.to_string())
            }
            BaselinePolicy::Convention => candidates.iter().next().cloned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub rank: usize,
    pub tag: String,
    /// Geometric mean over this tag's (operation, size) cells.
    pub ops_per_sec: f64,
    /// Geometric mean of per-cell ratios against the baseline; `None` when the
    /// tag shares no cell with the baseline.
    pub relative: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub operation: String,
    pub container_size: usize,
    pub tag: String,
    pub ops_per_sec: f64,
    pub relative: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub group: String,
    pub rows: Vec<Row>,
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline: String,
    pub groups: Vec<GroupReport>,
    pub footprints: Option<Footprints>,
}

type CellKey = (String, usize);

impl ComparisonReport {
    /// Aggregate `samples` of the requested groups and tags.
    ///
    /// Groups with no samples at all are left out; a group whose samples lack
    /// the baseline is an error.
    pub fn build(
        include_tags: &BTreeSet<String>,
        group_names: &[String],
        samples: &[RawSample],
        policy: &BaselinePolicy,
    ) -> Result<Self, ReportError> {
        let included = |s: &&RawSample| include_tags.is_empty() || include_tags.contains(&s.tag);
        let selected: Vec<(&String, Vec<&RawSample>)> = group_names
            .iter()
            .map(|name| {
                let group_samples = samples
                    .iter()
                    .filter(|s| &s.group == name)
                    .filter(included)
                    .collect::<Vec<_>>();
                (name, group_samples)
            })
            .filter(|(_, group_samples)| !group_samples.is_empty())
            .collect();
        if selected.is_empty() {
            return Err(ReportError::Empty);
        }

        let baseline = policy
            .resolve(&baseline_candidates(&selected))
            .ok_or(ReportError::Empty)?;

        let mut groups = Vec::with_capacity(selected.len());
        for (name, group_samples) in &selected {
            groups.push(build_group(name, group_samples, &baseline)?);
        }

        Ok(Self {
            baseline,
            groups,
            footprints: None,
        })
    }

    pub fn with_footprints(mut self, footprints: Footprints) -> Self {
        if !footprints.is_empty() {
            self.footprints = Some(footprints);
        }
        self
    }

    pub fn group(&self, name: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group == name)
    }

    pub fn print(&self, out: &mut dyn Write) -> io::Result<()> {
        for group in &self.groups {
            self.print_group(out, group)?;
        }
        if let Some(footprints) = &self.footprints {
            print_footprints(out, footprints)?;
        }
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))
    }

    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.print(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn print_group(&self, out: &mut dyn Write, group: &GroupReport) -> io::Result<()> {
        writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
        writeln!(out, "{} (baseline: {})", group.group, self.baseline)?;
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;

        let tag_w = column_width("implementation", group.rows.iter().map(|r| r.tag.as_str()));
        writeln!(out, "{:>4}  {:<tag_w$}  {:>18}  {:>10}", "rank", "implementation", "ops/s", "relative")?;
        for row in &group.rows {
            writeln!(
                out,
                "{:>4}  {:<tag_w$}  {:>18}  {:>10}",
                row.rank,
                row.tag,
                format_ops(row.ops_per_sec),
                format_relative(row.relative),
            )?;
        }

        writeln!(out)?;
        let op_w = column_width("operation", group.cells.iter().map(|c| c.operation.as_str()));
        writeln!(
            out,
            "  {:<op_w$}  {:>8}  {:<tag_w$}  {:>18}  {:>10}",
            "operation", "size", "implementation", "ops/s", "relative"
        )?;
        for cell in &group.cells {
            writeln!(
                out,
                "  {:<op_w$}  {:>8}  {:<tag_w$}  {:>18}  {:>10}",
                cell.operation,
                cell.container_size,
                cell.tag,
                format_ops(cell.ops_per_sec),
                format_relative(cell.relative),
            )?;
        }
        Ok(())
    }
}

/// Tags measured in every selected group. Without one, every measured tag is
/// a candidate and the groups lacking the chosen baseline fail.
fn baseline_candidates(selected: &[(&String, Vec<&RawSample>)]) -> BTreeSet<String> {
    let per_group: Vec<BTreeSet<&str>> = selected
        .iter()
        .map(|(_, group_samples)| group_samples.iter().map(|s| s.tag.as_str()).collect())
        .collect();
    let shared: BTreeSet<String> = per_group
        .iter()
        .flatten()
        .filter(|tag| per_group.iter().all(|tags| tags.contains(*tag)))
        .map(|tag| tag.to_string())
        .collect();
    if !shared.is_empty() {
        return shared;
    }
    per_group.into_iter().flatten().map(str::to_string).collect()
}

fn build_group(name: &str, samples: &[&RawSample], baseline: &str) -> Result<GroupReport, ReportError> {
    if !samples.iter().any(|s| s.tag == baseline) {
        return Err(ReportError::MissingBaseline {
            group: name.to_string(),
            baseline: baseline.to_string(),
        });
    }

    // Repeated samples of one (cell, tag) are averaged.
    let mut sums: BTreeMap<CellKey, BTreeMap<String, (f64, usize)>> = BTreeMap::new();
    for s in samples {
        let slot = sums
            .entry((s.operation.clone(), s.container_size))
            .or_default()
            .entry(s.tag.clone())
            .or_insert((0.0, 0));
        slot.0 += s.ops_per_sec;
        slot.1 += 1;
    }
    let table: BTreeMap<CellKey, BTreeMap<String, f64>> = sums
        .into_iter()
        .map(|(key, per_tag)| {
            let means = per_tag
                .into_iter()
                .map(|(tag, (sum, n))| (tag, sum / n as f64))
                .collect();
            (key, means)
        })
        .collect();

    let mut cells = Vec::new();
    let mut per_tag: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for ((operation, container_size), by_tag) in &table {
        let base = match by_tag.get(baseline) {
            Some(&b) if b.is_finite() && b > 0.0 => Some(b),
            Some(_) => {
                return Err(ReportError::DegenerateBaseline {
                    group: name.to_string(),
                    operation: operation.clone(),
                    container_size: *container_size,
                    baseline: baseline.to_string(),
                })
            }
            None => None,
        };
        for (tag, &ops) in by_tag {
            let relative = base.map(|b| ops / b);
            let entry = per_tag.entry(tag.as_str()).or_default();
            entry.0.push(ops);
            if let Some(r) = relative {
                entry.1.push(r);
            }
            cells.push(Cell {
                operation: operation.clone(),
                container_size: *container_size,
                tag: tag.clone(),
                ops_per_sec: ops,
                relative,
            });
        }
    }

    let mut rows: Vec<Row> = per_tag
        .into_iter()
        .map(|(tag, (ops, ratios))| Row {
            rank: 0,
            tag: tag.to_string(),
            ops_per_sec: geometric_mean(&ops).unwrap_or(0.0),
            relative: geometric_mean(&ratios),
        })
        .collect();
    rows.sort_by(|a, b| {
        let key = |r: &Row| r.relative.unwrap_or(f64::NEG_INFINITY);
        key(b).total_cmp(&key(a)).then_with(|| a.tag.cmp(&b.tag))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }

    Ok(GroupReport {
        group: name.to_string(),
        rows,
        cells,
    })
}

fn geometric_mean(values: &[f64]) -> Option<f64> {
    match values {
        [] => return None,
        [only] => return Some(*only),
        _ => {}
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    Some((log_sum / values.len() as f64).exp())
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values.map(str::len).chain([header.len()]).max().unwrap_or(header.len())
}

/// Round to `digits` significant digits: `2.13456` -> `"2.13"`, `0.012345` -> `"0.0123"`.
///
/// Integer digits past `digits` print as zeros: `1234.5` -> `"1230"`.
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() || digits == 0 {
        return format!("{value}");
    }
    let digits = digits as i32;
    let exponent = |v: f64| v.abs().log10().floor() as i32;
    let scale = 10f64.powi(digits - 1 - exponent(value));
    let rounded = (value * scale).round() / scale;
    // Rounding may carry into a new leading digit (9.996 -> 10.0).
    let decimals = (digits - 1 - exponent(rounded)).max(0) as usize;
    format!("{rounded:.decimals$}")
}

fn format_relative(relative: Option<f64>) -> String {
    match relative {
        Some(r) => format_significant(r, SIGNIFICANT_DIGITS),
        None => "n/a".to_string(),
    }
}

fn format_ops(ops: f64) -> String {
    format_thousands(ops.max(0.0).round() as u64)
}

fn print_footprints(out: &mut dyn Write, footprints: &Footprints) -> io::Result<()> {
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "Memory footprint")?;
    for (size, rows) in footprints {
        writeln!(out, "{}", "-".repeat(RULE_WIDTH))?;
        writeln!(out, "container size {size}")?;
        let label_w = column_width("implementation", rows.iter().map(|r| r.label.as_str()));
        writeln!(out, "  {:<label_w$}  {:>14}  {:>10}", "implementation", "bytes", "bytes/elem")?;
        for row in rows {
            let per_element = row.bytes as f64 / (*size).max(1) as f64;
            writeln!(out, "  {:<label_w$}  {:>14}  {:>10.1}", row.label, row.size, per_element)?;
        }
    }
    Ok(())
}
