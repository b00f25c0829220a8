use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::{
    models::{
        auth::AuthenticatedUser,
        notification::{Notification, NotificationFilter},
        report::{
            ChartSeries, DivisionSubjects, MonthlyReport, MonthlyReportQuery, ReportOptions,
            StackedBarChart, StatusCount, StatusRecord, FACULTY_NOT_PRESENT,
        },
        timetable::TimetableFilter,
        user::UserRole,
    },
    services::{parse_date, ServiceError, ServiceResult},
    store::Store,
};

pub const FIRST_REPORT_YEAR: i32 = 2025;
pub const SHEET_NAME: &str = "Monthly Report";
const UNAVAILABLE_RESPONSE: &str = "i'm unavailable";
const NO_ASSIGNMENT: &str = "No division or subject assigned to you in the timetable.";

/// First and last day of the month, inclusive.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((start, next.pred_opt()?))
}

pub fn export_filename(division: &str, month: u32, year: i32) -> String {
    format!("{division}_{month}_{year}_report.xlsx")
}

fn record_of(n: &Notification) -> StatusRecord {
    StatusRecord {
        subject: n.subject.clone(),
        status: n.status.clone(),
        username: n.username.clone(),
        division: n.division.clone(),
        date: n.date.clone(),
    }
}

/// One synthetic `Faculty Not Present` record per (date, time, subject)
/// group of student reports that the faculty records do not cover, or
/// whose first matching faculty record was answered with "I'm unavailable".
/// The records are attributed to `reporter`, the faculty member running the report.
pub fn derive_absences(
    reporter: &str,
    faculty: &[Notification],
    students: &[Notification],
) -> Vec<StatusRecord> {
    let mut groups: BTreeMap<(&str, &str, &str), &Notification> = BTreeMap::new();
    for s in students {
        groups
            .entry((s.date.as_str(), s.time.as_str(), s.subject.as_str()))
            .or_insert(s);
    }

    groups
        .into_iter()
        .filter(|((date, time, subject), _)| {
            let matched = faculty
                .iter()
                .find(|f| f.date == *date && f.time == *time && f.subject == *subject);
            match matched {
                None => true,
                Some(f) => f.response.as_ref().is_some_and(|r| {
                    r.message.trim().to_lowercase() == UNAVAILABLE_RESPONSE
                }),
            }
        })
        .map(|(_, s)| StatusRecord {
            subject: s.subject.clone(),
            status: FACULTY_NOT_PRESENT.to_string(),
            username: reporter.to_string(),
            division: s.division.clone(),
            date: s.date.clone(),
        })
        .collect()
}

/// Counts per (subject, status), sorted by subject then status.
pub fn aggregate(records: &[StatusRecord]) -> Vec<StatusCount> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for r in records {
        *counts.entry((r.subject.as_str(), r.status.as_str())).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((subject, status), count)| StatusCount {
            subject: subject.to_string(),
            status: status.to_string(),
            count,
        })
        .collect()
}

pub fn chart(aggregate: &[StatusCount], division: &str, month_start: NaiveDate) -> StackedBarChart {
    let subjects: Vec<String> = aggregate
        .iter()
        .map(|c| c.subject.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let statuses: BTreeSet<&str> = aggregate.iter().map(|c| c.status.as_str()).collect();

    let series = statuses
        .into_iter()
        .map(|status| ChartSeries {
            status: status.to_string(),
            counts: subjects
                .iter()
                .map(|subject| {
                    aggregate
                        .iter()
                        .find(|c| c.status == status && &c.subject == subject)
                        .map_or(0, |c| c.count)
                })
                .collect(),
        })
        .collect();

    StackedBarChart {
        title: format!(
            "Monthly Class Report - {} ({})",
            division,
            month_start.format("%B %Y")
        ),
        x_title: "Subject",
        y_title: "Total Classes (per status)",
        legend_title: "Class Status",
        subjects,
        series,
    }
}

/// Single-sheet workbook holding the raw summary rows.
pub fn export_xlsx(summary: &[StatusRecord]) -> anyhow::Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in ["subject", "status", "username", "division", "date"]
        .into_iter()
        .enumerate()
    {
        sheet.write_string_with_format(0, col as u16, title, &header)?;
    }
    for (i, r) in summary.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &r.subject)?;
        sheet.write_string(row, 1, &r.status)?;
        sheet.write_string(row, 2, &r.username)?;
        sheet.write_string(row, 3, &r.division)?;
        sheet.write_string(row, 4, &r.date)?;
    }

    Ok(workbook.save_to_buffer()?)
}

pub struct ReportService;

impl ReportService {
    /// Divisions the faculty member teaches in, with the subjects taught there.
    async fn assignments(
        store: &dyn Store,
        user: &AuthenticatedUser,
    ) -> ServiceResult<Vec<DivisionSubjects>> {
        let rows = store
            .list_timetable(&TimetableFilter::default().faculty(&user.username))
            .await?;

        let mut by_division: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for e in rows.into_iter().filter(|e| !e.division.is_empty()) {
            by_division.entry(e.division).or_default().insert(e.subject);
        }
        Ok(by_division
            .into_iter()
            .map(|(division, subjects)| DivisionSubjects {
                division,
                subjects: subjects.into_iter().collect(),
            })
            .collect())
    }

    pub async fn options(
        store: &dyn Store,
        user: &AuthenticatedUser,
        today: NaiveDate,
    ) -> ServiceResult<ReportOptions> {
        let divisions = Self::assignments(store, user).await?;
        if divisions.is_empty() {
            return Err(ServiceError::NotFound(NO_ASSIGNMENT.into()));
        }
        Ok(ReportOptions {
            divisions,
            months: (1..=12).collect(),
            years: (FIRST_REPORT_YEAR..=today.year().max(FIRST_REPORT_YEAR)).collect(),
            default_month: today.month(),
        })
    }

    pub async fn monthly(
        store: &dyn Store,
        user: &AuthenticatedUser,
        query: &MonthlyReportQuery,
    ) -> ServiceResult<MonthlyReport> {
        let (start, end) = month_range(query.year, query.month).ok_or_else(|| {
            ServiceError::BadRequest(format!("Invalid month {}/{}", query.month, query.year))
        })?;

        let subjects = Self::assignments(store, user)
            .await?
            .into_iter()
            .find(|d| d.division == query.division)
            .map(|d| d.subjects)
            .ok_or_else(|| ServiceError::NotFound(NO_ASSIGNMENT.into()))?;

        let from = start.format("%Y-%m-%d").to_string();
        let to = end.format("%Y-%m-%d").to_string();
        let in_month = NotificationFilter::default()
            .division(&query.division)
            .subject_in(&subjects)
            .date_between(&from, &to);

        let keep_dated = |rows: Vec<Notification>| -> Vec<Notification> {
            rows.into_iter()
                .filter(|n| parse_date(&n.date).is_some())
                .collect()
        };
        let faculty = keep_dated(
            store
                .list_notifications(
                    &in_month
                        .clone()
                        .role(UserRole::Faculty)
                        .username(&user.username),
                )
                .await?,
        );
        let students = keep_dated(
            store
                .list_notifications(&in_month.role(UserRole::Student))
                .await?,
        );

        let mut summary: Vec<StatusRecord> = faculty.iter().map(record_of).collect();
        summary.extend(derive_absences(&user.username, &faculty, &students));

        let aggregate = aggregate(&summary);
        let chart = chart(&aggregate, &query.division, start);

        info!(
            "Monthly report for {} {}/{} by {}: {} records",
            query.division,
            query.month,
            query.year,
            user.username,
            summary.len()
        );

        Ok(MonthlyReport {
            division: query.division.clone(),
            month: query.month,
            year: query.year,
            start_date: from,
            end_date: to,
            summary,
            aggregate,
            chart,
        })
    }
}
