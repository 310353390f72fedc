use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SeedError};

pub type PipelineId = u64;
pub type StageId = u64;
pub type BuildId = u64;

const MAX_NAME_LENGTH: usize = 255;

/// A project that owns pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    /// Full path (e.g., "group/project")
    pub path: String,
}

impl Project {
    pub fn new(id: u64, path: impl Into<String>) -> Self {
        Self {
            id,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub id: u64,
}

/// What caused a pipeline to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineSource {
    #[default]
    Push,
    Web,
    Trigger,
    Schedule,
    Api,
    Pipeline,
    External,
}

impl FromStr for PipelineSource {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "push" => Ok(Self::Push),
            "web" => Ok(Self::Web),
            "trigger" => Ok(Self::Trigger),
            "schedule" => Ok(Self::Schedule),
            "api" => Ok(Self::Api),
            "pipeline" => Ok(Self::Pipeline),
            "external" => Ok(Self::External),
            other => Err(SeedError::Config(format!("Unknown pipeline source: {other}"))),
        }
    }
}

impl fmt::Display for PipelineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Push => "push",
            Self::Web => "web",
            Self::Trigger => "trigger",
            Self::Schedule => "schedule",
            Self::Api => "api",
            Self::Pipeline => "pipeline",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// When a job runs relative to the outcome of earlier stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum When {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
    Manual,
}

impl FromStr for When {
    type Err = SeedError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on_success" => Ok(Self::OnSuccess),
            "on_failure" => Ok(Self::OnFailure),
            "always" => Ok(Self::Always),
            "manual" => Ok(Self::Manual),
            other => Err(SeedError::Definition(format!(
                "when should be on_success, on_failure, always or manual, got: {other}"
            ))),
        }
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OnSuccess => "on_success",
            Self::OnFailure => "on_failure",
            Self::Always => "always",
            Self::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// A pipeline record.
///
/// Stages attached with [`Pipeline::attach`] are only written when the
/// pipeline itself is committed through a
/// [`PipelineStore`](super::store::PipelineStore). Neither stages nor jobs
/// can be persisted on their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    id: Option<PipelineId>,
    pub project: Project,
    /// Git reference the pipeline runs for (e.g., "main", "v1.0.0")
    #[serde(rename = "ref")]
    pub ref_: String,
    pub tag: bool,
    pub source: PipelineSource,
    pub trigger_requests: Vec<TriggerRequest>,
    pub variables: IndexMap<String, String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    stages: Vec<StageRecord>,
}

impl Pipeline {
    pub fn new(project: Project, ref_: impl Into<String>) -> Self {
        Self {
            id: None,
            project,
            ref_: ref_.into(),
            tag: false,
            source: PipelineSource::default(),
            trigger_requests: Vec::new(),
            variables: IndexMap::new(),
            status: "created".to_string(),
            created_at: Utc::now(),
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: bool) -> Self {
        self.tag = tag;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: PipelineSource) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn with_trigger_request(mut self, trigger_request: TriggerRequest) -> Self {
        self.trigger_requests.push(trigger_request);
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: IndexMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn id(&self) -> Option<PipelineId> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Attaches a materialized stage so it is written with the next commit.
    pub fn attach(&mut self, stage: StageRecord) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn builds(&self) -> impl Iterator<Item = &JobRecord> {
        self.stages.iter().flat_map(|stage| stage.builds.iter())
    }

    pub(super) fn stages_mut(&mut self) -> &mut Vec<StageRecord> {
        &mut self.stages
    }

    pub(super) fn assign_id(&mut self, id: PipelineId) {
        self.id = Some(id);
    }

    pub(super) fn validate(&self) -> Result<()> {
        if self.project.id == 0 {
            return Err(SeedError::Validation("pipeline project can't be blank".into()));
        }
        if self.ref_.trim().is_empty() {
            return Err(SeedError::Validation("pipeline ref can't be blank".into()));
        }
        Ok(())
    }
}

/// An unsaved or persisted stage owning its jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    id: Option<StageId>,
    pub name: String,
    pub position: usize,
    pub pipeline_id: Option<PipelineId>,
    pub project_id: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub builds: Vec<JobRecord>,
}

impl StageRecord {
    pub(super) fn new(
        name: String,
        position: usize,
        pipeline_id: Option<PipelineId>,
        project_id: u64,
    ) -> Self {
        Self {
            id: None,
            name,
            position,
            pipeline_id,
            project_id,
            builds: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<StageId> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub(super) fn assign_identity(&mut self, id: StageId, pipeline_id: PipelineId) {
        self.id = Some(id);
        self.pipeline_id = Some(pipeline_id);
    }

    pub(super) fn validate(&self, project_id: u64) -> Result<()> {
        validate_name("stage", &self.name)?;
        if self.project_id != project_id {
            return Err(SeedError::Validation(format!(
                "stage {} belongs to project {} but the pipeline belongs to project {project_id}",
                self.name, self.project_id
            )));
        }
        for build in &self.builds {
            build.validate(self)?;
        }
        Ok(())
    }
}

/// An unsaved or persisted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    id: Option<BuildId>,
    pub name: String,
    /// Name of the owning stage
    pub stage: String,
    pub stage_idx: usize,
    stage_id: Option<StageId>,
    pub pipeline_id: Option<PipelineId>,
    pub project_id: u64,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub tag: bool,
    pub protected: bool,
    pub trigger_request_id: Option<u64>,
    pub when: When,
    pub allow_failure: bool,
    pub tag_list: Vec<String>,
    pub environment: Option<String>,
    pub yaml_variables: IndexMap<String, String>,
    pub options: serde_json::Value,
    pub status: String,
}

impl JobRecord {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        name: String,
        stage: String,
        stage_idx: usize,
        pipeline_id: Option<PipelineId>,
        project_id: u64,
        ref_: String,
        tag: bool,
        protected: bool,
        trigger_request_id: Option<u64>,
    ) -> Self {
        Self {
            id: None,
            name,
            stage,
            stage_idx,
            stage_id: None,
            pipeline_id,
            project_id,
            ref_,
            tag,
            protected,
            trigger_request_id,
            when: When::default(),
            allow_failure: false,
            tag_list: Vec::new(),
            environment: None,
            yaml_variables: IndexMap::new(),
            options: serde_json::Value::Null,
            status: "created".to_string(),
        }
    }

    pub fn id(&self) -> Option<BuildId> {
        self.id
    }

    pub fn stage_id(&self) -> Option<StageId> {
        self.stage_id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub(super) fn assign_identity(
        &mut self,
        id: BuildId,
        stage_id: StageId,
        pipeline_id: PipelineId,
    ) {
        self.id = Some(id);
        self.stage_id = Some(stage_id);
        self.pipeline_id = Some(pipeline_id);
    }

    fn validate(&self, stage: &StageRecord) -> Result<()> {
        validate_name("job", &self.name)?;
        if self.ref_.trim().is_empty() {
            return Err(SeedError::Validation(format!("job {} ref can't be blank", self.name)));
        }
        if self.stage != stage.name {
            return Err(SeedError::Validation(format!(
                "job {} declares stage {} but is attached to stage {}",
                self.name, self.stage, stage.name
            )));
        }
        if self.project_id != stage.project_id {
            return Err(SeedError::Validation(format!(
                "job {} belongs to a different project than stage {}",
                self.name, stage.name
            )));
        }
        Ok(())
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SeedError::Validation(format!("{kind} name can't be blank")));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(SeedError::Validation(format!(
            "{kind} name is too long (maximum is {MAX_NAME_LENGTH} characters)"
        )));
    }
    Ok(())
}
