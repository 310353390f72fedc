use indexmap::IndexMap;
use log::debug;
use serde_yaml::{Mapping, Value};

use super::policy::Policy;
use super::resource::When;
use crate::error::{Result, SeedError};

const DEFAULT_STAGES: [&str; 3] = ["build", "test", "deploy"];
const DEFAULT_JOB_STAGE: &str = "test";

/// Top-level keys that configure the whole pipeline rather than a job.
const RESERVED_KEYS: [&str; 11] = [
    "image",
    "services",
    "before_script",
    "after_script",
    "variables",
    "cache",
    "stages",
    "types",
    "include",
    "default",
    "workflow",
];

/// Global keys inherited by every job that does not set them itself.
const INHERITED_KEYS: [&str; 5] = ["image", "services", "before_script", "after_script", "cache"];

/// Keys consumed into typed [`JobDefinition`] fields; everything else lands
/// in `options`.
const TYPED_JOB_KEYS: [&str; 8] = [
    "stage",
    "only",
    "except",
    "when",
    "allow_failure",
    "tags",
    "environment",
    "variables",
];

/// A declared job, immutable once parsed.
#[derive(Debug, Clone, Default)]
pub struct JobDefinition {
    pub name: String,
    pub stage: String,
    /// Overrides the stage index recorded on the job
    pub stage_idx: Option<usize>,
    pub only: Option<Policy>,
    pub except: Option<Policy>,
    pub when: When,
    pub allow_failure: bool,
    /// Runner tags
    pub tags: Vec<String>,
    pub environment: Option<String>,
    pub variables: IndexMap<String, String>,
    /// Remaining job keys (script, image, artifacts, ...)
    pub options: serde_json::Value,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: DEFAULT_JOB_STAGE.to_string(),
            options: serde_json::Value::Object(serde_json::Map::new()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_only(mut self, policy: Policy) -> Self {
        self.only = Some(policy);
        self
    }

    #[must_use]
    pub fn with_except(mut self, policy: Policy) -> Self {
        self.except = Some(policy);
        self
    }
}

/// One declared stage and the jobs assigned to it, in declaration order.
///
/// A stage's position is its place in the declared list, assigned by
/// [`PipelineSeeder::build`](super::seed::PipelineSeeder::build).
#[derive(Debug, Clone)]
pub struct StageDefinition {
    pub name: String,
    pub builds: Vec<JobDefinition>,
}

impl StageDefinition {
    pub fn new(name: impl Into<String>, builds: Vec<JobDefinition>) -> Self {
        let name = name.into();
        let builds = builds
            .into_iter()
            .map(|mut build| {
                build.stage.clone_from(&name);
                build
            })
            .collect();
        Self { name, builds }
    }
}

/// Parses a `.gitlab-ci.yml` style document into ordered stage definitions.
///
/// Every declared stage is returned, including stages with no jobs, so the
/// caller sees the full declaration order. Hidden jobs (names starting with
/// `.`) are skipped.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML, a job references an
/// undeclared stage, a job has neither `script` nor `trigger`, or an
/// `only`/`except` clause is malformed.
pub fn parse_pipeline(content: &str) -> Result<Vec<StageDefinition>> {
    let document: Value = serde_yaml::from_str(content)?;
    let Value::Mapping(root) = document else {
        return Err(SeedError::Definition("pipeline definition should be a hash".into()));
    };

    let stage_names = declared_stages(&root)?;
    let global_variables = match root.get("variables") {
        Some(value) => variables_map("variables", value)?,
        None => IndexMap::new(),
    };

    let mut stages: Vec<StageDefinition> = stage_names
        .iter()
        .map(|name| StageDefinition::new(name.clone(), Vec::new()))
        .collect();

    for (key, value) in &root {
        let Some(name) = key.as_str() else {
            return Err(SeedError::Definition(format!("job name should be a string: {key:?}")));
        };
        if RESERVED_KEYS.contains(&name) {
            continue;
        }
        if name.starts_with('.') {
            debug!("Skipping hidden job {name}");
            continue;
        }

        let Value::Mapping(body) = value else {
            return Err(SeedError::Definition(format!("jobs:{name} config should be a hash")));
        };

        let job = parse_job(name, body, &root, &global_variables)?;
        let stage = stages
            .iter_mut()
            .find(|stage| stage.name == job.stage)
            .ok_or_else(|| {
                SeedError::Definition(format!(
                    "jobs:{name} stage parameter should be {}",
                    stage_names.join(", ")
                ))
            })?;
        stage.builds.push(job);
    }

    if stages.iter().all(|stage| stage.builds.is_empty()) {
        return Err(SeedError::Definition("pipeline definition contains no jobs".into()));
    }

    Ok(stages)
}

fn declared_stages(root: &Mapping) -> Result<Vec<String>> {
    let Some(value) = root.get("stages").or_else(|| root.get("types")) else {
        return Ok(DEFAULT_STAGES.iter().map(ToString::to_string).collect());
    };

    let invalid = || SeedError::Definition("stages should be an array of strings".into());
    let Value::Sequence(items) = value else {
        return Err(invalid());
    };

    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let name = item.as_str().ok_or_else(invalid)?;
        if names.iter().any(|existing| existing == name) {
            return Err(SeedError::Definition(format!("stage {name} is declared twice")));
        }
        names.push(name.to_string());
    }
    Ok(names)
}

fn parse_job(
    name: &str,
    body: &Mapping,
    root: &Mapping,
    global_variables: &IndexMap<String, String>,
) -> Result<JobDefinition> {
    if !body.contains_key("script") && !body.contains_key("trigger") {
        return Err(SeedError::Definition(format!("jobs:{name} script can't be blank")));
    }

    let mut job = JobDefinition::new(name);

    if let Some(stage) = body.get("stage") {
        job.stage = stage
            .as_str()
            .ok_or_else(|| SeedError::Definition(format!("jobs:{name} stage should be a string")))?
            .to_string();
    }

    job.only = body
        .get("only")
        .map(|value| Policy::from_yaml(name, value))
        .transpose()?;
    job.except = body
        .get("except")
        .map(|value| Policy::from_yaml(name, value))
        .transpose()?;

    if let Some(when) = body.get("when") {
        job.when = when
            .as_str()
            .ok_or_else(|| SeedError::Definition(format!("jobs:{name} when should be a string")))?
            .parse()?;
    }

    job.allow_failure = match body.get("allow_failure") {
        Some(value) => value.as_bool().ok_or_else(|| {
            SeedError::Definition(format!("jobs:{name} allow_failure should be a boolean"))
        })?,
        None => job.when == When::Manual,
    };

    if let Some(tags) = body.get("tags") {
        job.tags = tags
            .as_sequence()
            .and_then(|items| {
                items
                    .iter()
                    .map(|tag| tag.as_str().map(ToString::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| {
                SeedError::Definition(format!("jobs:{name} tags should be an array of strings"))
            })?;
    }

    job.environment = match body.get("environment") {
        None => None,
        Some(Value::String(environment)) => Some(environment.clone()),
        Some(Value::Mapping(environment)) => environment
            .get("name")
            .and_then(Value::as_str)
            .map(ToString::to_string),
        Some(_) => {
            return Err(SeedError::Definition(format!(
                "jobs:{name} environment should be a string or a hash"
            )))
        }
    };

    job.variables = global_variables.clone();
    if let Some(value) = body.get("variables") {
        job.variables
            .extend(variables_map(&format!("jobs:{name} variables"), value)?);
    }

    job.options = job_options(body, root)?;

    Ok(job)
}

fn job_options(body: &Mapping, root: &Mapping) -> Result<serde_json::Value> {
    let mut options = serde_json::Map::new();

    for key in INHERITED_KEYS {
        if let Some(value) = root.get(key) {
            options.insert(key.to_string(), serde_json::to_value(value)?);
        }
    }

    for (key, value) in body {
        let Some(key) = key.as_str() else {
            continue;
        };
        if TYPED_JOB_KEYS.contains(&key) {
            continue;
        }
        options.insert(key.to_string(), serde_json::to_value(value)?);
    }

    Ok(serde_json::Value::Object(options))
}

fn variables_map(location: &str, value: &Value) -> Result<IndexMap<String, String>> {
    let Value::Mapping(mapping) = value else {
        return Err(SeedError::Definition(format!("{location} should be a hash")));
    };

    mapping
        .iter()
        .map(|(key, value)| {
            let key = key
                .as_str()
                .ok_or_else(|| {
                    SeedError::Definition(format!("{location} keys should be strings"))
                })?;
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => {
                    return Err(SeedError::Definition(format!(
                        "{location} value of {key} should be a string or a number"
                    )))
                }
            };
            Ok((key.to_string(), value))
        })
        .collect()
}
