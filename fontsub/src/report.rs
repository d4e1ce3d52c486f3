//! End of build summary of what subsetting saved.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::SubsetEntry;

/// One accepted subset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub name: String,
    pub reduction_percent: f64,
    pub before: String,
    pub after: String,
}

impl ReportLine {
    pub fn new(entry: &SubsetEntry) -> ReportLine {
        ReportLine {
            name: entry.identity.to_string(),
            reduction_percent: reduction_percent(entry.original_size, entry.subset_size),
            before: format_size(entry.original_size),
            after: format_size(entry.subset_size),
        }
    }
}

/// Collects [`ReportLine`]s from any thread.
#[derive(Debug, Default)]
pub struct Report {
    lines: Mutex<Vec<ReportLine>>,
}

impl Report {
    pub fn record(&self, entry: &SubsetEntry) {
        self.lines.lock().push(ReportLine::new(entry));
    }

    /// Everything recorded so far, leaving the report empty.
    pub fn drain(&self) -> Vec<ReportLine> {
        std::mem::take(&mut *self.lines.lock())
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How much smaller `after` is than `before`, as a percentage.
pub fn reduction_percent(before: usize, after: usize) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (1.0 - after as f64 / before as f64) * 100.0
}

/// Such as `512 B`, `12.35 kB` or `1.20 MB`.
pub fn format_size(bytes: usize) -> String {
    match bytes {
        0..=999 => format!("{bytes} B"),
        1_000..=999_999 => format!("{:.2} kB", bytes as f64 / 1_000.0),
        _ => format!("{:.2} MB", bytes as f64 / 1_000_000.0),
    }
}

/// Aligned columns, one line per subset, sorted by name.
pub fn format_summary(lines: &[ReportLine]) -> String {
    let mut lines: Vec<_> = lines.iter().collect();
    lines.sort_by(|a, b| a.name.cmp(&b.name));

    let name_width = lines.iter().map(|l| l.name.len()).max().unwrap_or(0);
    let before_width = lines.iter().map(|l| l.before.len()).max().unwrap_or(0);
    let after_width = lines.iter().map(|l| l.after.len()).max().unwrap_or(0);

    let mut summary = String::new();
    for line in lines {
        summary.push_str(&format!(
            "{:<name_width$}  {:>6.2}% smaller  {:>before_width$} -> {:>after_width$}\n",
            line.name, line.reduction_percent, line.before, line.after,
        ));
    }
    summary
}
