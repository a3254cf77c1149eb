//! Case records, per-month summaries, and the source seam between the
//! report pipeline and storage.
//!
//! The summary is produced in three steps: raw case/diagnosis rows inside
//! the reporting period are deduplicated, counted per signout month, and
//! pivoted into one count column per month of the quarter.  [`MySqlCaseSource`]
//! pushes these steps into SQL; [`InMemoryCaseSource`] performs them over
//! records held in memory.
//!
//! [`MySqlCaseSource`]: crate::mysql::MySqlCaseSource

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::quarter::ReportPeriod;

/// One case/diagnosis association as stored by the laboratory system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Case identifier.
    pub case_id: String,
    /// Date the case report was finalized.
    pub signout_date: NaiveDate,
    /// Diagnosis category.
    pub diagnosis: Option<String>,
    /// Attending physician.
    pub physician: String,
    /// Patient gender as recorded; may be blank.
    pub gender: Option<String>,
    /// Facility the case was received from.
    pub facility: String,
}

/// Case counts for one physician, diagnosis, gender and facility.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryRow {
    /// Attending physician.
    pub physician: String,
    /// Diagnosis category; empty when the source had none.
    pub diagnosis: String,
    /// Patient gender as recorded.
    pub gender: Option<String>,
    /// Facility name as stored in the data.
    pub facility: String,
    /// Case counts, one per month of the quarter.
    pub counts: [i64; 3],
}

/// Pivoted query result: one row per physician/diagnosis/gender/facility.
///
/// Rows are ordered by physician ascending, gender descending, then
/// diagnosis ascending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryTable {
    months: [String; 3],
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    /// Creates a table, sorting `rows` into report order.
    pub fn new(months: [String; 3], mut rows: Vec<SummaryRow>) -> Self {
        sort_rows(&mut rows);
        Self { months, rows }
    }

    /// Returns the `YYYY-MM` month keys of the count columns.
    pub fn months(&self) -> &[String; 3] {
        &self.months
    }

    /// Returns the rows in report order.
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Returns whether no case matched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the facility name as stored in the data, taken from the first row.
    pub fn facility_name(&self) -> Option<&str> {
        self.rows.first().map(|row| row.facility.as_str())
    }
}

fn sort_rows(rows: &mut [SummaryRow]) {
    rows.sort_by(|a, b| {
        a.physician
            .cmp(&b.physician)
            .then_with(|| b.gender.cmp(&a.gender))
            .then_with(|| a.diagnosis.cmp(&b.diagnosis))
            .then_with(|| a.facility.cmp(&b.facility))
    });
}

/// Source of quarterly case summaries.
#[async_trait]
pub trait CaseSource: Send + Sync {
    /// Summarizes the cases of facilities whose name contains `facility`
    /// (case-insensitively) that were signed out during `period`.
    ///
    /// An empty table means nothing matched; it is not an error.
    async fn fetch_summary(&self, facility: &str, period: &ReportPeriod) -> Result<SummaryTable>;
}

/// Case source backed by records held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCaseSource {
    records: Vec<CaseRecord>,
}

impl InMemoryCaseSource {
    /// Creates a source over `records`.
    pub fn new(records: Vec<CaseRecord>) -> Self {
        Self { records }
    }

    /// Loads records from a JSON array of [`CaseRecord`] objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|source| ReportError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<CaseRecord> = serde_json::from_slice(&data)?;
        debug!("Loaded {} case records from {}", records.len(), path.display());
        Ok(Self::new(records))
    }
}

#[async_trait]
impl CaseSource for InMemoryCaseSource {
    async fn fetch_summary(&self, facility: &str, period: &ReportPeriod) -> Result<SummaryTable> {
        Ok(summarize(&self.records, facility, period))
    }
}

/// Deduplicates, counts and pivots `records` for one facility filter and quarter.
pub fn summarize(records: &[CaseRecord], facility: &str, period: &ReportPeriod) -> SummaryTable {
    let (start, end) = period.day_range();
    let months = period.months();
    let needle = facility.to_lowercase();

    let distinct: BTreeSet<(&str, String, &str, &str, Option<&str>, &str)> = records
        .iter()
        .filter(|record| {
            let day = record.signout_date.format("%Y-%m-%d").to_string();
            day >= start && day <= end
        })
        .filter(|record| record.facility.to_lowercase().contains(&needle))
        .map(|record| {
            (
                record.case_id.as_str(),
                record.signout_date.format("%Y-%m").to_string(),
                record.diagnosis.as_deref().unwrap_or_default(),
                record.physician.as_str(),
                record.gender.as_deref(),
                record.facility.as_str(),
            )
        })
        .collect();

    let mut pivot: BTreeMap<(&str, &str, Option<&str>, &str), [i64; 3]> = BTreeMap::new();
    for (_, month, diagnosis, physician, gender, facility) in &distinct {
        let counts = pivot
            .entry((*physician, *diagnosis, *gender, *facility))
            .or_insert([0; 3]);
        if let Some(index) = months.iter().position(|candidate| candidate == month) {
            counts[index] += 1;
        }
    }

    let rows = pivot
        .into_iter()
        .map(|((physician, diagnosis, gender, facility), counts)| SummaryRow {
            physician: physician.to_owned(),
            diagnosis: diagnosis.to_owned(),
            gender: gender.map(str::to_owned),
            facility: facility.to_owned(),
            counts,
        })
        .collect();

    SummaryTable::new(months, rows)
}
