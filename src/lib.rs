//! A PDF content-stream interpreter.
//!
//! Turns a PDF document into a stream of drawing calls: text showing,
//! path painting, color and graphics-state changes, XObject invocation.
//! Consumers implement [`interp::device::PDFDevice`] to receive those calls;
//! layout analysis, text extraction, and rendering all build on top of that
//! trait rather than living in this crate.

pub mod casting;
pub mod codec;
pub mod document;
pub mod error;
pub mod font;
pub mod interp;
pub mod model;
pub mod parser;
pub mod utils;

pub use error::{PdfError, Result};
