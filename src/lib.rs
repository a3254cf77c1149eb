//! Core entry point for the case_review_report crate.
//!
//! Quarterly case-review decks are produced in three stages: the previous
//! quarter is resolved ([`quarter`]), case counts are aggregated per
//! physician, diagnosis and gender ([`cases`], [`mysql`]), and the counts are
//! rendered into a copy of a slide template ([`report`], [`builder`]).

pub mod builder;
pub mod cases;
pub mod config;
pub mod elements;
pub mod error;
pub mod model;
pub mod mysql;
pub mod package;
pub mod quarter;
pub mod report;
pub mod richtext;
pub mod template;
pub mod web;

pub use error::{DeckBuildError, ReportError, Result};
