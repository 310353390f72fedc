use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use ciseed::ci::{Pipeline, StageRecord};
use ciseed::markup::Document;

/// Machine-readable result of a `seed` run.
#[derive(Debug, Serialize)]
pub struct SeedReport<'a> {
    pub pipeline: &'a Pipeline,
    pub stages: &'a [StageRecord],
    pub skipped_stages: &'a [String],
}

impl<'a> SeedReport<'a> {
    pub fn new(pipeline: &'a Pipeline, skipped_stages: &'a [String]) -> Self {
        Self {
            pipeline,
            stages: pipeline.stages(),
            skipped_stages,
        }
    }
}

/// Machine-readable result of a `wiki` run.
#[derive(Debug, Serialize)]
pub struct WikiReport<'a> {
    pub html: String,
    pub nodes: &'a Document,
}

pub fn export_json<T: Serialize>(value: &T, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciseed::ci::Project;

    #[test]
    fn test_seed_report_json_includes_skipped_stages() {
        let pipeline = Pipeline::new(Project::new(3, "group/json"), "feature");
        let skipped = vec!["deploy".to_string()];
        let mut buffer = Vec::new();

        export_json(&SeedReport::new(&pipeline, &skipped), false, &mut buffer).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value["pipeline"]["project"]["path"], "group/json");
        assert_eq!(value["pipeline"]["ref"], "feature");
        assert_eq!(value["stages"], serde_json::json!([]));
        assert_eq!(value["skipped_stages"], serde_json::json!(["deploy"]));
    }

    #[test]
    fn test_pretty_json_spans_lines() {
        let pipeline = Pipeline::new(Project::new(3, "group/json"), "feature");
        let mut buffer = Vec::new();

        export_json(&SeedReport::new(&pipeline, &[]), true, &mut buffer).unwrap();

        assert!(String::from_utf8(buffer).unwrap().lines().count() > 1);
    }
}
