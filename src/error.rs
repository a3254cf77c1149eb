//! Error types shared by the report pipeline.

use std::io;
use std::path::PathBuf;

/// Errors raised while reading or writing a slide deck package.
#[derive(Debug, thiserror::Error)]
pub enum DeckBuildError {
    /// The template archive could not be read or the output archive written.
    #[error("Slide package archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    /// A package part contained XML that could not be processed.
    #[error("Slide package XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    /// An XML attribute inside a package part was malformed.
    #[error("Slide package XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),
    /// Writing into an in-memory buffer failed.
    #[error("Slide package I/O error: {0}")]
    Io(#[from] io::Error),
    /// A part required to assemble the deck does not exist in the package.
    #[error("Slide package part {0} is missing")]
    MissingPart(String),
    /// A part exists but its content does not have the expected shape.
    #[error("Slide package part {part} is malformed: {message}")]
    Malformed {
        /// Name of the offending part.
        part: String,
        /// Description of the problem.
        message: String,
    },
}

impl DeckBuildError {
    pub(crate) fn malformed(part: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            part: part.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by report generation.
///
/// An empty query result is not an error; see
/// [`ReportGenerator::generate`](crate::report::ReportGenerator::generate).
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The configuration is incomplete or inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration file {path}: {source}")]
    ConfigParse {
        /// Path of the configuration file.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },
    /// Connecting to or querying the case database failed.
    #[error("Case database error: {0}")]
    Database(#[from] mysql_async::Error),
    /// Case records supplied from a file could not be decoded.
    #[error("Failed to decode case records: {0}")]
    Records(#[from] serde_json::Error),
    /// No slide template could be located.
    #[error("Unable to locate slide template. Checked: {0}. Set CASE_REVIEW_TEMPLATE or template_path.")]
    TemplateNotFound(String),
    /// The slide template could not be turned into a report deck.
    #[error(transparent)]
    Deck(#[from] DeckBuildError),
    /// Reading an input file failed.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// Writing the report or creating the output directory failed.
    #[error("Failed to write {path}: {source}")]
    Write {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The front end could not bind or serve its listener.
    #[error("Front end server error: {0}")]
    Server(#[source] io::Error),
}

/// Result alias for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
