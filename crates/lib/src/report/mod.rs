//! Run result aggregation and rendering.
//!
//! A [`RunReport`] is the ordered collection of per-combination results for a
//! run. It derives the overall exit status and renders the summary table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::execute::types::{BuildResult, serialize_secs};

/// Aggregated results for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
  /// Results in expansion order.
  pub results: Vec<BuildResult>,

  /// Combinations never dispatched because of fail-fast.
  pub skipped: usize,

  /// Ordinal of the failure that stopped dispatching, if any.
  pub aborted_by: Option<usize>,

  #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
  pub elapsed: Duration,
}

impl RunReport {
  /// Build a report from results collected in any order.
  pub fn aggregate(mut results: Vec<BuildResult>, skipped: usize, aborted_by: Option<usize>, elapsed: Duration) -> Self {
    results.sort_by_key(|r| r.ordinal);
    Self {
      results,
      skipped,
      aborted_by,
      elapsed,
    }
  }

  pub fn successes(&self) -> impl Iterator<Item = &BuildResult> {
    self.results.iter().filter(|r| r.status.is_success())
  }

  pub fn failures(&self) -> impl Iterator<Item = &BuildResult> {
    self.results.iter().filter(|r| !r.status.is_success())
  }

  pub fn failure_count(&self) -> usize {
    self.failures().count()
  }

  pub fn is_success(&self) -> bool {
    self.failure_count() == 0
  }

  /// Process exit status for the run.
  ///
  /// `0` when every attempted combination succeeded, otherwise the number of
  /// failures. When fail-fast stopped the run, the triggering failure's own
  /// code is used if it is positive. Never `0` when anything failed.
  pub fn exit_code(&self) -> i32 {
    let failures = self.failure_count();
    if failures == 0 {
      return 0;
    }

    let trigger = self
      .aborted_by
      .and_then(|ordinal| self.results.iter().find(|r| r.ordinal == ordinal))
      .and_then(|r| r.status.exit_code())
      .filter(|code| *code > 0);

    trigger.unwrap_or_else(|| i32::try_from(failures).unwrap_or(i32::MAX)).max(1)
  }

  /// Flags whose value is not the same across every result.
  pub fn varying_flags(&self) -> Vec<String> {
    let mut seen: BTreeMap<&str, BTreeSet<bool>> = BTreeMap::new();
    for result in &self.results {
      for (name, value) in &result.combination.flags {
        seen.entry(name.as_str()).or_default().insert(*value);
      }
    }

    seen
      .into_iter()
      .filter(|(_, values)| values.len() > 1)
      .map(|(name, _)| name.to_string())
      .collect()
  }

  /// Render the summary table followed by a totals line.
  pub fn render(&self) -> String {
    let flags = self.varying_flags();

    let mut header: Vec<String> = ["OS", "Arch", "BuildType"].iter().map(|s| s.to_string()).collect();
    header.extend(flags.iter().cloned());
    header.push("Elapsed".to_string());
    header.push("Result".to_string());

    let rows: Vec<Vec<String>> = self
      .results
      .iter()
      .map(|r| {
        let c = &r.combination;
        let mut row = vec![c.platform.to_string(), c.arch.to_string(), c.build_type.to_string()];
        row.extend(flags.iter().map(|f| if c.flag(f) { "on" } else { "off" }.to_string()));
        row.push(format_duration(r.elapsed));
        row.push(r.status.label());
        row
      })
      .collect();

    // widths in chars, matching how `{:<width$}` pads
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
      for (width, cell) in widths.iter_mut().zip(row) {
        *width = (*width).max(cell.chars().count());
      }
    }

    let mut out = String::new();
    for row in std::iter::once(&header).chain(rows.iter()) {
      let line: Vec<String> = row
        .iter()
        .zip(&widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
      let _ = writeln!(out, "{}", line.join("  ").trim_end());
    }

    let _ = writeln!(out);
    let _ = write!(
      out,
      "{}/{} succeeded, {} failed",
      self.successes().count(),
      self.results.len(),
      self.failure_count()
    );
    if self.skipped > 0 {
      let _ = write!(out, ", {} skipped", self.skipped);
    }
    let _ = write!(out, " in {}", format_duration(self.elapsed));

    out
  }
}

/// Format a duration for display.
pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}
