//! Case summaries computed by the laboratory MySQL database.

use async_trait::async_trait;
use log::{debug, info};
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder};

use crate::cases::{CaseSource, SummaryRow, SummaryTable};
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::quarter::ReportPeriod;

/// Escape character declared in the `LIKE ... ESCAPE` clause.
const LIKE_ESCAPE: char = '!';

/// Builds the deduplicate/count/pivot query for one quarter.
///
/// Only the shape of the statement is generated here; every value (day
/// range, facility pattern, and month keys) is bound as a parameter in the
/// order returned by [`summary_params`].
pub fn summary_query() -> String {
    let pivot_columns: Vec<String> = (1..=3)
        .map(|column| {
            format!("        CAST(SUM(CASE WHEN signout = ? THEN ct ELSE 0 END) AS SIGNED) AS month_{column}")
        })
        .collect();

    format!(
        "WITH tmp AS (
    SELECT DISTINCT
        a.gopath_id,
        SUBSTR(a.signout_date, 1, 7) AS signout,
        b.category AS diag,
        a.attending_physician,
        b.gender AS gender,
        a.facility_name
    FROM rpt_ap_case a
    JOIN rpt_ap_diag_general b ON a.gopath_id = b.gopath_id
    WHERE a.signout_date BETWEEN ? AND ?
      AND LOWER(a.facility_name) LIKE LOWER(CONCAT('%', ?, '%')) ESCAPE '{LIKE_ESCAPE}'
),
summary AS (
    SELECT signout, diag, attending_physician, gender, facility_name, COUNT(*) AS ct
    FROM tmp
    GROUP BY signout, diag, attending_physician, gender, facility_name
)
SELECT
        attending_physician,
        diag,
        gender,
        facility_name,
{}
FROM summary
GROUP BY attending_physician, diag, gender, facility_name
ORDER BY attending_physician ASC, gender DESC, diag ASC",
        pivot_columns.join(",\n")
    )
}

/// Returns the bound parameters of [`summary_query`]: start day, end day,
/// facility pattern, then the three month keys.
pub fn summary_params(facility: &str, period: &ReportPeriod) -> (String, String, String, String, String, String) {
    let (start, end) = period.day_range();
    let [first, second, third] = period.months();
    (start, end, escape_like(facility), first, second, third)
}

/// Escapes `LIKE` wildcards so the facility filter matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_') || ch == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

type RawSummaryRow = (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
    i64,
    i64,
);

/// Case source querying the laboratory database.
///
/// A connection is opened for each summary and closed once the rows are read.
#[derive(Clone, Debug)]
pub struct MySqlCaseSource {
    config: DatabaseConfig,
}

impl MySqlCaseSource {
    /// Creates a source for the database described by `config`.
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn opts(&self) -> OptsBuilder {
        OptsBuilder::default()
            .ip_or_hostname(self.config.host.clone())
            .tcp_port(self.config.port)
            .user(Some(self.config.user.clone()))
            .pass(Some(self.config.password.clone()))
            .db_name(Some(self.config.name.clone()))
    }
}

#[async_trait]
impl CaseSource for MySqlCaseSource {
    async fn fetch_summary(&self, facility: &str, period: &ReportPeriod) -> Result<SummaryTable> {
        info!(
            "Querying {}:{}/{} for facility filter {:?} in {}",
            self.config.host, self.config.port, self.config.name, facility, period
        );
        let query = summary_query();
        let mut conn = Conn::new(self.opts()).await?;
        let rows: Vec<RawSummaryRow> = conn
            .exec(query.as_str(), summary_params(facility, period))
            .await?;
        conn.disconnect().await?;
        debug!("Summary query returned {} row(s)", rows.len());

        let rows = rows
            .into_iter()
            .map(|(physician, diagnosis, gender, facility, m1, m2, m3)| SummaryRow {
                physician: physician.unwrap_or_default(),
                diagnosis: diagnosis.unwrap_or_default(),
                gender,
                facility: facility.unwrap_or_default(),
                counts: [m1, m2, m3],
            })
            .collect();
        Ok(SummaryTable::new(period.months(), rows))
    }
}
