use serde::{Deserialize, Serialize};

/// Synthetic status derived for student reports the faculty did not cover.
pub const FACULTY_NOT_PRESENT: &str = "Faculty Not Present";

/// One row of the monthly summary (and of the exported sheet).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRecord {
    pub subject: String,
    pub status: String,
    pub username: String,
    pub division: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusCount {
    pub subject: String,
    pub status: String,
    pub count: usize,
}

/// Stacked bar chart: one bar per subject, one stacked series per status.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StackedBarChart {
    pub title: String,
    pub x_title: &'static str,
    pub y_title: &'static str,
    pub legend_title: &'static str,
    pub subjects: Vec<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChartSeries {
    pub status: String,
    /// Aligned with `StackedBarChart::subjects`.
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub division: String,
    pub month: u32,
    pub year: i32,
    pub start_date: String,
    pub end_date: String,
    pub summary: Vec<StatusRecord>,
    pub aggregate: Vec<StatusCount>,
    pub chart: StackedBarChart,
}

#[derive(Debug, Deserialize)]
pub struct MonthlyReportQuery {
    pub division: String,
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DivisionSubjects {
    pub division: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportOptions {
    pub divisions: Vec<DivisionSubjects>,
    pub months: Vec<u32>,
    pub years: Vec<i32>,
    pub default_month: u32,
}
