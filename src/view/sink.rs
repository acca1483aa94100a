//! View sink
//!
//! The rendering target. Anything that can set the text of an element,
//! replace the rows of a container, toggle a class of elements and draw a
//! chart can act as the page.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// One table row, already formatted
pub type TableRow = Vec<String>;

/// Data for one chart canvas
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChartSeries {
    pub title: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            labels: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn point(mut self, label: impl Into<String>, value: f64) -> Self {
        self.labels.push(label.into());
        self.values.push(value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rendering primitives
pub trait ViewSink: Send + Sync {
    /// Set the text content of one element
    fn set_text(&self, element_id: &str, text: &str);

    /// Replace all children of a container with the given rows
    fn replace_children(&self, container_id: &str, rows: Vec<TableRow>);

    /// Show or hide every element carrying `class`
    fn set_visible(&self, class: &str, visible: bool);

    /// Redraw a chart canvas
    fn draw_chart(&self, canvas_id: &str, series: ChartSeries);
}

#[derive(Debug, Default, Clone)]
struct PageState {
    texts: BTreeMap<String, String>,
    containers: BTreeMap<String, Vec<TableRow>>,
    visibility: BTreeMap<String, bool>,
    charts: BTreeMap<String, ChartSeries>,
    chart_draws: usize,
}

/// Sink that keeps the rendered page in memory
///
/// Used by the CLI to print what a browser would show, and by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    page: RwLock<PageState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> PageState {
        match self.page.read() {
            Ok(page) => page.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut PageState)) {
        match self.page.write() {
            Ok(mut page) => f(&mut page),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn text(&self, element_id: &str) -> Option<String> {
        self.read().texts.get(element_id).cloned()
    }

    pub fn rows(&self, container_id: &str) -> Vec<TableRow> {
        self.read()
            .containers
            .get(container_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Visibility of a class; `None` if never toggled
    pub fn is_visible(&self, class: &str) -> Option<bool> {
        self.read().visibility.get(class).copied()
    }

    pub fn chart(&self, canvas_id: &str) -> Option<ChartSeries> {
        self.read().charts.get(canvas_id).cloned()
    }

    /// Total number of chart draws since creation
    pub fn chart_draws(&self) -> usize {
        self.read().chart_draws
    }

    /// Every text element, sorted by id
    pub fn texts(&self) -> Vec<(String, String)> {
        self.read().texts.into_iter().collect()
    }
}

impl ViewSink for MemorySink {
    fn set_text(&self, element_id: &str, text: &str) {
        self.update(|page| {
            page.texts.insert(element_id.to_string(), text.to_string());
        });
    }

    fn replace_children(&self, container_id: &str, rows: Vec<TableRow>) {
        self.update(|page| {
            page.containers.insert(container_id.to_string(), rows);
        });
    }

    fn set_visible(&self, class: &str, visible: bool) {
        self.update(|page| {
            page.visibility.insert(class.to_string(), visible);
        });
    }

    fn draw_chart(&self, canvas_id: &str, series: ChartSeries) {
        self.update(|page| {
            page.charts.insert(canvas_id.to_string(), series);
            page.chart_draws += 1;
        });
    }
}
