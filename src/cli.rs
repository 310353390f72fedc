use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use log::{info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ciseed::ci::{
    parse_pipeline, MemoryStore, Pipeline, PipelineContext, PipelineSeeder, PipelineSource,
    PipelineStore, Project, ProtectedRefs, StageDefinition, TriggerRequest,
};
use ciseed::config::{Config, OutputFormat};
use ciseed::markup::{DirectoryWiki, FilterContext, GollumTagsFilter};

use crate::output::{self, PhaseProgress, SeedReport, WikiReport};

#[derive(Parser)]
#[command(name = "ciseed")]
#[command(author, version, about = "CI Pipeline Seeding Tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./ciseed.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the result to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed and persist a pipeline from a CI definition file
    Seed(SeedArgs),

    /// Expand Gollum wiki tags in a piece of text
    Wiki {
        text: String,

        /// Checked-out wiki repository internal images are resolved against
        #[arg(short, long)]
        wiki_dir: PathBuf,

        /// Base path wiki files are served from (defaults to /<project>/wikis)
        #[arg(short, long)]
        base_path: Option<String>,
    },
}

#[derive(Args)]
struct SeedArgs {
    /// Pipeline definition (e.g., .gitlab-ci.yml)
    file: PathBuf,

    #[arg(short = 'r', long = "ref")]
    ref_: String,

    /// The ref is a tag
    #[arg(short, long, default_value_t = false)]
    tag: bool,

    /// Trigger request ID that created the pipeline
    #[arg(long)]
    trigger: Option<u64>,

    /// Pipeline source (defaults to 'trigger' with --trigger, 'push' otherwise)
    #[arg(short, long)]
    source: Option<PipelineSource>,

    /// Pipeline variable, may be repeated
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_variable)]
    variables: Vec<(String, String)>,

    /// Additional protected ref or pattern, may be repeated
    #[arg(long)]
    protected: Vec<String>,

    #[arg(long)]
    project_id: Option<u64>,

    #[arg(short = 'P', long)]
    project: Option<String>,

    /// Keep the seeded pipeline in memory only
    #[arg(long, default_value_t = false)]
    no_store: bool,
}

fn parse_variable(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got: {raw}"))?;
    if key.trim().is_empty() {
        return Err(format!("variable name can't be blank: {raw}"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn load_definitions(path: &Path) -> Result<Vec<StageDefinition>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline definition: {}", path.display()))?;
    parse_pipeline(&content)
        .with_context(|| format!("Failed to parse pipeline definition: {}", path.display()))
}

fn open_store(config: &Config, disabled: bool) -> Result<MemoryStore> {
    if disabled || !config.store.enabled {
        warn!("Pipeline store disabled, the seeded pipeline will not be kept");
        return Ok(MemoryStore::new());
    }

    let path = match &config.store.path {
        Some(path) => path.clone(),
        None => MemoryStore::default_path()?,
    };
    MemoryStore::open(&path)
        .with_context(|| format!("Failed to open pipeline store: {}", path.display()))
}

impl Cli {
    fn execute_seed(&self, config: &Config, args: &SeedArgs) -> Result<()> {
        let project = Project::new(
            args.project_id.unwrap_or(config.project.id),
            args.project.as_deref().unwrap_or(&config.project.path),
        );
        info!(
            "Seeding pipeline for project {} on ref {}",
            project.path, args.ref_
        );

        let mut patterns = config.protection.protected_refs.clone();
        patterns.extend(args.protected.iter().cloned());
        let protection = ProtectedRefs::new(&patterns)?;

        let store = open_store(config, args.no_store)?;

        let progress = PhaseProgress::start_loading();
        let definitions = load_definitions(&args.file)?;
        let progress = progress.finish_loading_start_seeding(definitions.len());

        let source = args.source.unwrap_or(match args.trigger {
            Some(_) => PipelineSource::Trigger,
            None => PipelineSource::Push,
        });
        let variables: IndexMap<String, String> = args.variables.iter().cloned().collect();
        let mut pipeline = Pipeline::new(project, args.ref_.as_str())
            .with_tag(args.tag)
            .with_source(source)
            .with_variables(variables);
        if let Some(id) = args.trigger {
            pipeline = pipeline.with_trigger_request(TriggerRequest { id });
        }

        let context = PipelineContext::from_pipeline(&pipeline, Arc::new(protection));
        let seeder = PipelineSeeder::build(&context, &definitions);
        let skipped: Vec<String> = seeder
            .stages()
            .iter()
            .filter(|stage| !stage.is_included())
            .map(|stage| stage.name().to_string())
            .collect();
        let progress = progress.finish_seeding_start_persisting(seeder.included_stages().count());

        let id = seeder.finalize(&mut pipeline, &store)?;
        let pipeline = store.reload(id)?;
        progress.finish_persisting();

        let report = SeedReport::new(&pipeline, &skipped);
        match self.output_format(config) {
            OutputFormat::Summary => {
                output::print_summary(&pipeline, &skipped);
                if self.output.is_some() {
                    self.emit(&report, config)?;
                }
            }
            OutputFormat::Json => self.emit(&report, config)?,
        }

        Ok(())
    }

    fn execute_wiki(
        &self,
        config: &Config,
        text: &str,
        wiki_dir: &Path,
        base_path: Option<&str>,
    ) -> Result<()> {
        let base_path = base_path.map_or_else(
            || format!("/{}/wikis", config.project.path),
            ToString::to_string,
        );
        info!("Rendering wiki tags against: {}", wiki_dir.display());

        let wiki = DirectoryWiki::new(wiki_dir, base_path);
        let context = FilterContext {
            project_wiki: Some(&wiki),
        };
        let document = GollumTagsFilter::call(text, &context)?;

        match self.output_format(config) {
            OutputFormat::Summary => match &self.output {
                Some(output_path) => std::fs::write(output_path, document.to_html())
                    .with_context(|| format!("Failed to write {}", output_path.display()))?,
                None => println!("{}", document.to_html()),
            },
            OutputFormat::Json => self.emit(
                &WikiReport {
                    html: document.to_html(),
                    nodes: &document,
                },
                config,
            )?,
        }

        Ok(())
    }

    fn output_format(&self, config: &Config) -> OutputFormat {
        self.format.unwrap_or(config.output.format)
    }

    fn emit<T: Serialize>(&self, value: &T, config: &Config) -> Result<()> {
        let pretty = self.pretty || config.output.pretty;

        if let Some(output_path) = &self.output {
            let mut file = std::fs::File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            output::export_json(value, pretty, &mut file)?;
            info!("Result written to: {}", output_path.display());
        } else {
            output::export_json(value, pretty, &mut std::io::stdout().lock())?;
        }

        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Seed(args) => self.execute_seed(&config, args),
            Commands::Wiki {
                text,
                wiki_dir,
                base_path,
            } => self.execute_wiki(&config, text, wiki_dir, base_path.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse_variable("DEPLOY=true").unwrap(),
            ("DEPLOY".to_string(), "true".to_string())
        );
        assert_eq!(
            parse_variable("URL=http://a?b=c").unwrap(),
            ("URL".to_string(), "http://a?b=c".to_string())
        );
        assert!(parse_variable("DEPLOY").is_err());
        assert!(parse_variable("=true").is_err());
    }

    #[test]
    fn test_cli_parses_seed_command() {
        let cli = Cli::try_parse_from([
            "ciseed",
            "seed",
            ".gitlab-ci.yml",
            "--ref",
            "v1.0.0",
            "--tag",
            "--trigger",
            "7",
            "--var",
            "DEPLOY=true",
            "--protected",
            "v*",
            "--format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.format, Some(OutputFormat::Json));
        let Commands::Seed(args) = cli.command else {
            panic!("expected seed command");
        };
        assert_eq!(args.ref_, "v1.0.0");
        assert!(args.tag);
        assert_eq!(args.trigger, Some(7));
        assert_eq!(args.source, None);
        assert_eq!(
            args.variables,
            vec![("DEPLOY".to_string(), "true".to_string())]
        );
        assert_eq!(args.protected, vec!["v*"]);
    }

    #[test]
    fn test_cli_rejects_unknown_source() {
        let result = Cli::try_parse_from([
            "ciseed", "seed", "ci.yml", "--ref", "master", "--source", "cron",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_seed_writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let definition = dir.path().join(".gitlab-ci.yml");
        std::fs::write(
            &definition,
            "rspec:\n  script: rspec\nproduction:\n  stage: deploy\n  script: deploy\n  only: [tags]\n",
        )
        .unwrap();
        let report = dir.path().join("report.json");

        let cli = Cli::try_parse_from([
            "ciseed",
            "seed",
            definition.to_str().unwrap(),
            "--ref",
            "master",
            "--no-store",
            "--format",
            "json",
            "--output",
            report.to_str().unwrap(),
        ])
        .unwrap();
        let Commands::Seed(args) = &cli.command else {
            panic!("expected seed command");
        };
        cli.execute_seed(&Config::default(), args).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(value["stages"].as_array().unwrap().len(), 1);
        assert_eq!(value["stages"][0]["name"], "test");
        assert_eq!(value["stages"][0]["builds"][0]["protected"], true);
        assert_eq!(
            value["skipped_stages"],
            serde_json::json!(["build", "deploy"])
        );
    }
}
