//! Web form for generating reports.
//!
//! `GET /` shows a facility picker; `POST /report` runs the pipeline for the
//! selected facility and answers with the `.pptx` attachment, or with the
//! form again plus a warning when the facility had no cases.

use std::sync::Arc;

use axum::extract::{Form, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info, warn};
use quick_xml::escape::escape;
use serde::Deserialize;

use crate::error::{ReportError, Result};
use crate::report::{GeneratedReport, ReportGenerator, NO_DATA_MESSAGE, PPTX_MIME};

const PAGE_TITLE: &str = "Gopath Report Generator";
const HEADING: &str = "Gopath Quarterly Adenoma Report";

/// Shared state of the web front end.
#[derive(Clone)]
pub struct FrontEnd {
    generator: Arc<ReportGenerator>,
    facilities: Arc<Vec<String>>,
}

impl FrontEnd {
    /// Creates the front end offering `facilities`.
    pub fn new(generator: ReportGenerator, facilities: Vec<String>) -> Self {
        Self {
            generator: Arc::new(generator),
            facilities: Arc::new(facilities),
        }
    }

    /// Returns the selectable facilities.
    pub fn facilities(&self) -> &[String] {
        &self.facilities
    }
}

/// Form submitted by the "Generate Report" button.
#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    /// Selected facility.
    pub facility: String,
}

/// Failures surfaced to browser clients.
#[derive(Debug, thiserror::Error)]
pub enum FrontEndError {
    /// The submitted facility is not one of the configured ones.
    #[error("Unknown facility: {0}")]
    UnknownFacility(String),
    /// Report generation failed.
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl IntoResponse for FrontEndError {
    fn into_response(self) -> Response {
        match &self {
            FrontEndError::UnknownFacility(name) => {
                warn!("Rejected report request for unknown facility {:?}", name);
                (
                    StatusCode::BAD_REQUEST,
                    Html(message_page("Please select a facility from the list.")),
                )
                    .into_response()
            }
            FrontEndError::Report(err) => {
                error!("Report generation failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(message_page("The report could not be generated. Please try again later.")),
                )
                    .into_response()
            }
        }
    }
}

/// Builds the front-end router.
pub fn router(front_end: FrontEnd) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/report", post(generate_report))
        .with_state(front_end)
}

/// Serves the front end on `bind` until the process is stopped.
pub async fn serve(front_end: FrontEnd, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(ReportError::Server)?;
    info!("Report front end listening on http://{}", bind);
    axum::serve(listener, router(front_end))
        .await
        .map_err(ReportError::Server)
}

async fn index(State(front_end): State<FrontEnd>) -> Html<String> {
    Html(form_page(front_end.facilities(), None, None))
}

async fn generate_report(
    State(front_end): State<FrontEnd>,
    Form(request): Form<ReportRequest>,
) -> std::result::Result<Response, FrontEndError> {
    if !front_end.facilities().contains(&request.facility) {
        return Err(FrontEndError::UnknownFacility(request.facility));
    }

    match front_end.generator.generate(&request.facility).await? {
        Some(report) => {
            info!("Serving {} ({} bytes)", report.path.display(), report.bytes.len());
            Ok(attachment(report))
        }
        None => Ok(Html(form_page(
            front_end.facilities(),
            Some(&request.facility),
            Some(NO_DATA_MESSAGE),
        ))
        .into_response()),
    }
}

fn attachment(report: GeneratedReport) -> Response {
    let file_name = report.file_name();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(PPTX_MIME)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.bytes,
    )
        .into_response()
}

fn page(body: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>",
            "<body style=\"max-width:40rem;margin:2rem auto;font-family:sans-serif\">",
            "<h1>{heading}</h1>{body}</body></html>"
        ),
        title = PAGE_TITLE,
        heading = HEADING,
        body = body
    )
}

fn message_page(message: &str) -> String {
    page(&format!(
        "<p>{}</p><p><a href=\"/\">Back</a></p>",
        escape(message)
    ))
}

fn form_page(facilities: &[String], selected: Option<&str>, warning: Option<&str>) -> String {
    let options: String = facilities
        .iter()
        .map(|facility| {
            let escaped = escape(facility.as_str());
            let marker = if selected == Some(facility.as_str()) {
                " selected"
            } else {
                ""
            };
            format!("<option value=\"{escaped}\"{marker}>{escaped}</option>")
        })
        .collect();
    let warning = warning
        .map(|text| format!("<p class=\"warning\" style=\"color:#8a6d00\">{}</p>", escape(text)))
        .unwrap_or_default();

    page(&format!(
        concat!(
            "<form method=\"post\" action=\"/report\">",
            "<label for=\"facility\">Select a facility:</label> ",
            "<select id=\"facility\" name=\"facility\">{options}</select> ",
            "<button type=\"submit\">Generate Report</button></form>{warning}"
        ),
        options = options,
        warning = warning
    ))
}
