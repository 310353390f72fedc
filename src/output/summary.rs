use std::fmt::Write;

use ciseed::ci::Pipeline;
use comfy_table::{Cell, Color as TableColor};

use super::styling::{dim, emoji, heading, highlight, success, value};
use super::tables::{create_table, cyan_header, flag_cell, when_cell};

/// Prints a human-readable summary of a seeded pipeline to stdout.
///
/// Displays:
/// - Overview: Project, ref, source and the committed pipeline ID
/// - Stages: Every persisted stage in position order with its job count
/// - Jobs: Scheduling attributes of every persisted job
/// - Skipped: Declared stages that had no jobs for this pipeline
pub fn print_summary(pipeline: &Pipeline, skipped: &[String]) {
    println!("{}", render_summary(pipeline, skipped));
}

fn add_section_header(output: &mut String, icon: &str, title: &str) {
    let _ = writeln!(output, "{} {}", emoji(icon), heading(title));
}

fn render_summary(pipeline: &Pipeline, skipped: &[String]) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");

    let pipeline_id = pipeline
        .id()
        .map_or_else(|| "not persisted".to_string(), |id| format!("#{id}"));
    let ref_display = if pipeline.tag {
        format!("{} (tag)", pipeline.ref_)
    } else {
        pipeline.ref_.clone()
    };

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Project:"),
        value(&pipeline.project.path),
        dim("Pipeline:"),
        success(pipeline_id),
        dim("Ref:"),
        value(ref_display),
        dim("Source:"),
        value(pipeline.source),
        dim("Stages / jobs:"),
        highlight(format!(
            "{} / {}",
            pipeline.stages().len(),
            pipeline.builds().count()
        )),
        dim("Created:"),
        dim(pipeline.created_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if pipeline.stages().is_empty() {
        let _ = writeln!(output, "{}", highlight("No stages seeded."));
        return output;
    }

    add_section_header(&mut output, "📋", "Stages");

    let mut stages_table = create_table();
    stages_table.set_header(cyan_header(&["Position", "Stage", "Jobs"]));
    for stage in pipeline.stages() {
        stages_table.add_row(vec![
            Cell::new(stage.position),
            Cell::new(&stage.name),
            Cell::new(
                stage
                    .builds
                    .iter()
                    .map(|build| build.name.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        ]);
    }
    let _ = writeln!(output, "{stages_table}\n");

    add_section_header(&mut output, "🔧", "Jobs");

    let mut jobs_table = create_table();
    jobs_table.set_header(cyan_header(&[
        "Job",
        "Stage",
        "When",
        "Allow Failure",
        "Protected",
        "Tags",
        "Environment",
    ]));
    for build in pipeline.builds() {
        jobs_table.add_row(vec![
            Cell::new(&build.name),
            Cell::new(&build.stage),
            when_cell(build.when),
            flag_cell(build.allow_failure),
            flag_cell(build.protected),
            Cell::new(build.tag_list.join(", ")),
            build
                .environment
                .as_deref()
                .map_or_else(|| Cell::new("-").fg(TableColor::DarkGrey), Cell::new),
        ]);
    }
    let _ = writeln!(output, "{jobs_table}\n");

    if !skipped.is_empty() {
        add_section_header(&mut output, "⏭️", "Skipped Stages");
        let _ = writeln!(
            output,
            "  {} {}\n",
            dim("No jobs for this pipeline:"),
            dim(skipped.join(", "))
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciseed::ci::{
        parse_pipeline, MemoryStore, PipelineContext, PipelineSeeder, PipelineStore, Project,
        ProtectedRefs,
    };
    use std::sync::Arc;

    fn seeded_pipeline(ref_: &str) -> Pipeline {
        let definitions = parse_pipeline(
            r"
stages: [build, test, deploy]
compile:
  stage: build
  script: make
rspec:
  script: rspec
  tags: [docker]
production:
  stage: deploy
  script: deploy
  when: manual
  environment: production
  only: [tags]
",
        )
        .unwrap();
        let store = MemoryStore::new();
        let mut pipeline = Pipeline::new(Project::new(1, "group/project"), ref_);
        let protection = Arc::new(ProtectedRefs::new(&["master"]).unwrap());
        let context = PipelineContext::from_pipeline(&pipeline, protection);
        let id = PipelineSeeder::build(&context, &definitions)
            .finalize(&mut pipeline, &store)
            .unwrap();
        store.reload(id).unwrap()
    }

    #[test]
    fn test_render_summary_lists_stages_and_jobs() {
        let pipeline = seeded_pipeline("master");
        let output = console::strip_ansi_codes(&render_summary(&pipeline, &["deploy".to_string()]))
            .to_string();

        assert!(output.contains("group/project"));
        assert!(output.contains("#1"));
        assert!(output.contains("compile"));
        assert!(output.contains("rspec"));
        assert!(output.contains("docker"));
        assert!(!output.contains("production"));
        assert!(output.contains("Skipped Stages"));
        assert!(output.contains("deploy"));
    }

    #[test]
    fn test_render_summary_without_stages() {
        let pipeline = Pipeline::new(Project::new(1, "group/project"), "master");
        let output = console::strip_ansi_codes(&render_summary(&pipeline, &[])).to_string();

        assert!(output.contains("not persisted"));
        assert!(output.contains("No stages seeded."));
        assert!(!output.contains("Jobs"));
    }
}
