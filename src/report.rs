//! Rendering of a quarterly case review and the end-to-end report pipeline.
//!
//! A [`SummaryTable`] is first turned into [`SlidePlan`]s: for every
//! physician one overall slide (genders summed) followed by one slide per
//! gender observed for that physician.  Each plan is then laid out as a
//! [`Slide`] and inserted into the template after its introduction slide.
//!
//! [`ReportGenerator`] ties the stages together: it resolves the previous
//! quarter, fetches the summary from a [`CaseSource`], renders the deck and
//! writes it to the output directory.  The file is staged next to its final
//! name and renamed into place, so readers never observe a partial report.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, info, warn};
use tempfile::NamedTempFile;

use crate::builder::{DeckBuilder, RenderedDeck, SlideSize, DEFAULT_BLANK_LAYOUT_INDEX};
use crate::cases::{CaseSource, SummaryRow, SummaryTable};
use crate::config::{AppConfig, DEFAULT_FOOTER_TEXT};
use crate::error::{DeckBuildError, ReportError, Result};
use crate::model::{Frame, HorizontalAlignment, RichParagraph, Shape, Slide, TableBlock, TextBox};
use crate::quarter::ReportPeriod;
use crate::richtext::{Rgb, Span};
use crate::template::{load_template, resolve_template_path};

/// MIME type of the generated report.
pub const PPTX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Message shown when the facility has no cases in the reporting period.
pub const NO_DATA_MESSAGE: &str = "No data found for this facility in the previous quarter.";

/// Label used for blank or missing gender values.
pub const UNKNOWN_GENDER_LABEL: &str = "Other";

const DIAGNOSIS_HEADER: &str = "diag";
const INTRO_TYPEFACE: &str = "Arial";
const TITLE_COLOR: Rgb = Rgb(255, 51, 51);

/// A rendered table cell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CellValue {
    /// Literal text, such as a diagnosis.
    Text(String),
    /// A case count.
    Count(i64),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(text) => f.write_str(text),
            CellValue::Count(count) => write!(f, "{count}"),
        }
    }
}

/// Diagnosis-by-month table shown on one slide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataTable {
    /// Column headers: `diag` followed by the month keys.
    pub header: Vec<String>,
    /// One row per diagnosis.
    pub rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    fn new(months: &[String; 3]) -> Self {
        let mut header = Vec::with_capacity(4);
        header.push(DIAGNOSIS_HEADER.to_owned());
        header.extend(months.iter().cloned());
        Self {
            header,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, diagnosis: &str, counts: [i64; 3]) {
        let mut row = Vec::with_capacity(4);
        row.push(CellValue::Text(diagnosis.to_owned()));
        row.extend(counts.into_iter().map(CellValue::Count));
        self.rows.push(row);
    }
}

/// Which rows of a physician a slide covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlideScope {
    /// All genders summed.
    Overall,
    /// One gender group, carrying its display label.
    Gender(String),
}

impl SlideScope {
    /// Returns the title-cased slide title.
    pub fn title(&self) -> String {
        match self {
            SlideScope::Overall => title_case("Diagnosis results, overall"),
            SlideScope::Gender(label) => title_case(&format!("Diagnosis results, {label} patients")),
        }
    }
}

/// Content of one generated slide before layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlidePlan {
    /// Physician the slide belongs to.
    pub physician: String,
    /// Rows covered by the slide.
    pub scope: SlideScope,
    /// Table shown on the slide.
    pub table: DataTable,
}

fn gender_key(row: &SummaryRow) -> Option<&str> {
    row.gender.as_deref().filter(|gender| !gender.trim().is_empty())
}

/// Plans the generated slides for `table`, in deck order.
///
/// Physicians and their gender groups follow the order of first appearance
/// in the table.  Blank and missing genders share one group labelled
/// [`UNKNOWN_GENDER_LABEL`]: neither carries a usable value, and rendering
/// them separately would produce two slides with the same title for the
/// same physician.
pub fn plan_slides(table: &SummaryTable) -> Vec<SlidePlan> {
    let mut physicians: Vec<(&str, Vec<&SummaryRow>)> = Vec::new();
    for row in table.rows() {
        match physicians.iter_mut().find(|(name, _)| *name == row.physician) {
            Some((_, rows)) => rows.push(row),
            None => physicians.push((row.physician.as_str(), vec![row])),
        }
    }

    let mut plans = Vec::new();
    for (physician, rows) in physicians {
        let mut overall: BTreeMap<&str, [i64; 3]> = BTreeMap::new();
        let mut genders: Vec<(Option<&str>, DataTable)> = Vec::new();

        for row in &rows {
            let totals = overall.entry(row.diagnosis.as_str()).or_insert([0; 3]);
            for (total, count) in totals.iter_mut().zip(row.counts) {
                *total += count;
            }

            let key = gender_key(row);
            let index = match genders.iter().position(|(existing, _)| *existing == key) {
                Some(index) => index,
                None => {
                    genders.push((key, DataTable::new(table.months())));
                    genders.len() - 1
                }
            };
            genders[index].1.push(&row.diagnosis, row.counts);
        }

        let mut overall_table = DataTable::new(table.months());
        for (diagnosis, counts) in overall {
            overall_table.push(diagnosis, counts);
        }
        plans.push(SlidePlan {
            physician: physician.to_owned(),
            scope: SlideScope::Overall,
            table: overall_table,
        });

        for (key, data) in genders {
            plans.push(SlidePlan {
                physician: physician.to_owned(),
                scope: SlideScope::Gender(key.unwrap_or(UNKNOWN_GENDER_LABEL).to_owned()),
                table: data,
            });
        }
    }
    plans
}

/// Capitalizes the first letter of every word and lowercases the rest.
///
/// A word is a maximal run of alphabetic characters, so `"dr. o'neil"`
/// becomes `"Dr. O'Neil"`.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_word = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if in_word {
                result.extend(ch.to_lowercase());
            } else {
                result.extend(ch.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(ch);
            in_word = false;
        }
    }
    result
}

/// Reduces a facility name to characters safe for a file name.
///
/// Keeps letters, digits, underscores, whitespace and hyphens, trims the
/// ends, then replaces spaces with underscores.
pub fn sanitize_facility_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace() || matches!(ch, '_' | '-'))
        .collect();
    kept.trim().replace(' ', "_")
}

/// Returns the report file name, e.g. `North_Clinic-Report-Q4_2025.pptx`.
pub fn report_file_name(facility: &str, period: &ReportPeriod) -> String {
    format!("{}-Report-{}.pptx", sanitize_facility_name(facility), period.tag())
}

/// Builds the two replacement paragraphs of the introduction slide.
pub fn intro_paragraphs(facility: &str, period: &ReportPeriod, report_date: NaiveDate) -> Vec<RichParagraph> {
    let title = Span::new(format!("{facility} - Case Review\n(Breakdown by Doctors)"))
        .bold()
        .sized(30.0)
        .with_typeface(INTRO_TYPEFACE);
    let subtitle = Span::new(format!(
        "Received Cases: {}, GPIS LIS\nDate Reported: {}",
        period.tag(),
        report_date.format("%B %d, %Y")
    ))
    .sized(20.0)
    .with_typeface(INTRO_TYPEFACE);
    vec![RichParagraph::single(title), RichParagraph::single(subtitle)]
}

/// Placement and fixed text of generated content slides, in inches.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportLayout {
    /// Slide title box.
    pub title: Frame,
    /// Facility and doctor label box.
    pub label: Frame,
    /// Footer box.
    pub footer: Frame,
    /// Contact line shown in the footer.
    pub footer_text: String,
    /// Top edge of the data table.
    pub table_top: f64,
    /// Width of the diagnosis column.
    pub diagnosis_width: f64,
    /// Width of each month column.
    pub month_width: f64,
    /// Height of a table row before capping.
    pub row_height: f64,
    /// Maximum table height.
    pub max_table_height: f64,
}

impl Default for ReportLayout {
    fn default() -> Self {
        Self {
            title: Frame::new(0.3, 0.2, 6.0, 0.4),
            label: Frame::new(6.3, 0.2, 3.0, 0.6),
            footer: Frame::new(0.5, 6.9, 9.0, 0.3),
            footer_text: DEFAULT_FOOTER_TEXT.to_owned(),
            table_top: 0.9,
            diagnosis_width: 2.5,
            month_width: 0.5,
            row_height: 0.3,
            max_table_height: 5.5,
        }
    }
}

impl ReportLayout {
    /// Replaces the footer contact line.
    pub fn with_footer_text(mut self, footer_text: impl Into<String>) -> Self {
        self.footer_text = footer_text.into();
        self
    }

    /// Lays out one planned slide for a deck of the given size.
    pub fn compose_slide(&self, plan: &SlidePlan, facility: &str, size: SlideSize) -> Slide {
        let title = TextBox::new(self.title).with_paragraph(RichParagraph::single(
            Span::new(plan.scope.title())
                .bold()
                .sized(20.0)
                .colored(TITLE_COLOR),
        ));

        let label = TextBox::new(self.label).with_paragraph(
            RichParagraph::single(
                Span::new(format!("Facility: {facility}\nDoctor: {}", plan.physician)).sized(10.0),
            )
            .with_alignment(HorizontalAlignment::Right),
        );

        let footer = TextBox::new(self.footer).with_paragraph(RichParagraph::single(
            Span::new(self.footer_text.clone()).sized(8.0),
        ));

        Slide::new().with_shapes([
            Shape::TextBox(title),
            Shape::TextBox(label),
            Shape::Table(self.table(&plan.table, size)),
            Shape::TextBox(footer),
        ])
    }

    fn table(&self, data: &DataTable, size: SlideSize) -> TableBlock {
        let widths: Vec<f64> = data
            .header
            .iter()
            .map(|column| {
                if column == DIAGNOSIS_HEADER {
                    self.diagnosis_width
                } else {
                    self.month_width
                }
            })
            .collect();
        let total_width: f64 = widths.iter().sum();
        let height = ((data.rows.len() + 1) as f64 * self.row_height).min(self.max_table_height);
        let frame = Frame::new(
            (size.width - total_width) / 2.0,
            self.table_top,
            total_width,
            height,
        );

        let header = data
            .header
            .iter()
            .map(|column| RichParagraph::single(Span::new(column.as_str()).bold().sized(9.0)))
            .collect();
        let mut table = TableBlock::new(frame, widths).with_row(header);
        for row in &data.rows {
            table = table.with_row(
                row.iter()
                    .map(|cell| RichParagraph::single(Span::new(cell.to_string()).sized(8.0)))
                    .collect(),
            );
        }
        table
    }
}

/// Renders the report deck for a non-empty summary.
///
/// The facility name shown on every slide is the one stored in the data,
/// not the filter text the user selected.
pub fn render_report(
    builder: DeckBuilder,
    summary: &SummaryTable,
    period: &ReportPeriod,
    report_date: NaiveDate,
    layout: &ReportLayout,
) -> std::result::Result<RenderedDeck, DeckBuildError> {
    let facility = summary.facility_name().unwrap_or_default();
    let size = builder.slide_size();
    let mut builder = builder.with_intro_text(intro_paragraphs(facility, period, report_date));
    for plan in plan_slides(summary) {
        debug!("Adding slide {:?} for {}", plan.scope, plan.physician);
        builder.push_slide(layout.compose_slide(&plan, facility, size));
    }
    builder.render()
}

/// A report saved by [`ReportGenerator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedReport {
    /// Location of the saved file.
    pub path: PathBuf,
    /// Contents of the saved file.
    pub bytes: Vec<u8>,
    /// Number of slides, the introduction included.
    pub slide_count: usize,
}

impl GeneratedReport {
    /// Returns the file name of the saved report.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Writes `bytes` to a temporary file in `dir` and renames it to `path`.
fn save_atomically(dir: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// The query, render, and save pipeline behind every front end.
pub struct ReportGenerator {
    source: Arc<dyn CaseSource>,
    template_path: PathBuf,
    output_dir: PathBuf,
    layout: ReportLayout,
    blank_layout_index: usize,
}

impl ReportGenerator {
    /// Creates a generator with the default layout.
    pub fn new(
        source: Arc<dyn CaseSource>,
        template_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            template_path: template_path.into(),
            output_dir: output_dir.into(),
            layout: ReportLayout::default(),
            blank_layout_index: DEFAULT_BLANK_LAYOUT_INDEX,
        }
    }

    /// Creates a generator from the application configuration, resolving
    /// the template location.
    pub fn from_config(config: &AppConfig, source: Arc<dyn CaseSource>) -> Result<Self> {
        let template_path = resolve_template_path(config.template_path.as_deref())?;
        Ok(Self::new(source, template_path, config.output_dir.clone())
            .with_layout(ReportLayout::default().with_footer_text(config.footer_text.clone()))
            .with_blank_layout_index(config.blank_layout_index))
    }

    /// Replaces the slide layout.
    pub fn with_layout(mut self, layout: ReportLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Selects the template layout used for generated slides.
    pub fn with_blank_layout_index(mut self, index: usize) -> Self {
        self.blank_layout_index = index;
        self
    }

    /// Returns the template the generator reads.
    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Returns the directory reports are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Generates the previous-quarter report for `facility` as of today.
    ///
    /// Returns `Ok(None)` without writing anything when no case matched.
    pub async fn generate(&self, facility: &str) -> Result<Option<GeneratedReport>> {
        self.generate_on(facility, chrono::Local::now().date_naive()).await
    }

    /// Generates the report as if run on `today`.
    ///
    /// `today` selects the quarter and is printed as the report date.
    pub async fn generate_on(
        &self,
        facility: &str,
        today: NaiveDate,
    ) -> Result<Option<GeneratedReport>> {
        let period = ReportPeriod::previous_quarter(today);
        info!("Generating {} report for facility filter {:?}", period, facility);

        let summary = self.source.fetch_summary(facility, &period).await?;
        let Some(facility_name) = summary.facility_name().map(str::to_owned) else {
            warn!("No cases for {:?} in {}", facility, period);
            return Ok(None);
        };
        info!("Summary has {} row(s) for {}", summary.rows().len(), facility_name);

        let builder = load_template(&self.template_path)
            .await?
            .with_blank_layout_index(self.blank_layout_index);
        let deck = render_report(builder, &summary, &period, today, &self.layout)?;
        info!("Rendered {} slide(s)", deck.slide_count);

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| ReportError::Write {
                path: self.output_dir.clone(),
                source,
            })?;
        let path = self.output_dir.join(report_file_name(&facility_name, &period));
        let (dir, target, bytes) = (self.output_dir.clone(), path.clone(), deck.bytes);
        let bytes = tokio::task::spawn_blocking(move || {
            save_atomically(&dir, &target, &bytes).map(|()| bytes)
        })
        .await
        .unwrap_or_else(|err| Err(io::Error::other(err)))
        .map_err(|source| ReportError::Write {
            path: path.clone(),
            source,
        })?;
        info!("Report written to {}", path.display());
        Ok(Some(GeneratedReport {
            path,
            bytes,
            slide_count: deck.slide_count,
        }))
    }
}
