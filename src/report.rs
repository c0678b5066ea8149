//! The `preds.txt` report: header plus one formatted row per image.

mod pprint;
mod table;

use std::path::Path;
use anyhow::{Context, Result};
use crate::aggregation::PredictionTable;
use crate::common::ClassLayout;

pub use pprint::{repr_str, PyValue, WIDTH};

/// `"%.1f %%" % (value * 100)`, in single precision.
pub fn format_percent(value: f32) -> String {
    format!("{:.1} %", value * 100f32)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub name: String,
    pub scores: Vec<String>,
}

impl ReportRow {
    pub fn new(name: &str, scores: &[f32]) -> Self {
        Self {
            name: name.to_string(),
            scores: scores.iter().map(|&s| format_percent(s)).collect(),
        }
    }

    pub fn cells(&self) -> Vec<String> {
        std::iter::once(self.name.clone()).chain(self.scores.iter().cloned()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub layout: ClassLayout,
    pub rows: Vec<ReportRow>,
}

impl Report {
    /// Rows in table order. The table must already be collapsed when the layout is binary.
    pub fn from_table(table: &PredictionTable, layout: ClassLayout) -> Result<Self> {
        table.check()?;
        if let Some(n) = table.num_classes() {
            anyhow::ensure!(
                n == layout.num_classes(),
                "{:?} report needs {} classes, predictions have {}",
                layout,
                layout.num_classes(),
                n
            );
        }
        let rows = table.iter().map(|(name, scores)| ReportRow::new(name, &scores)).collect();
        Ok(Self { layout, rows })
    }

    pub fn header(&self) -> Vec<String> {
        self.layout.header().iter().map(|s| s.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The two pretty-printed lists, each followed by a newline.
    pub fn render(&self) -> String {
        let header = PyValue::from(self.header());
        let rows = PyValue::List(self.rows.iter().map(|r| PyValue::from(r.cells())).collect());
        format!("{}\n{}\n", header.pformat(WIDTH), rows.pformat(WIDTH))
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.render())
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        log::info!("Wrote {} predictions to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn to_table(&self) -> String {
        let rows: Vec<Vec<String>> = self.rows.iter().map(|r| r.cells()).collect();
        table::render(&self.header(), &rows)
    }
}
