//! Pipeline build seeding.
//!
//! Turns a declarative pipeline definition into a persisted graph of
//! stages and jobs for one pipeline run, keeping only the jobs whose
//! `only`/`except` policies admit the run. The [`markup`] module carries
//! the Gollum wiki tags filter used when rendering project wikis.

pub mod ci;
pub mod config;
pub mod error;
pub mod markup;
