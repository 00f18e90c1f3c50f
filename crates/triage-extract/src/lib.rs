//! # triage-extract
//!
//! Turns free-form model text into contract-complete JSON objects.
//!
//! This crate provides two pieces that always run together:
//!
//! 1. [`extractor::ResponseExtractor`] recovers the first JSON object from
//!    raw text (direct parse, balanced braces, fenced block) or reports
//!    `NotFound`. It never guesses at content.
//! 2. [`validator::SchemaValidator`] checks the object against the calling
//!    endpoint's `FieldSpec`s and substitutes explicit defaults for anything
//!    missing or mistyped.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use triage_contracts::fields::EndpointKind;
//! use triage_extract::{ResponseExtractor, SchemaValidator};
//!
//! let extraction = ResponseExtractor::new().extract(text, Some(EndpointKind::QuickScan));
//! let validated = SchemaValidator::new().validate(&extraction, &EndpointKind::QuickScan.field_specs());
//! ```

pub mod extractor;
pub mod validator;

pub use extractor::{Extraction, ExtractionAttempt, RawResponse, ResponseExtractor, Strategy};
pub use validator::{schema_for, SchemaValidator, Validated, ValidationGap};
