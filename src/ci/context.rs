use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use super::protection::RefProtection;
use super::resource::{Pipeline, PipelineId, PipelineSource, Project, TriggerRequest};

/// Read-only snapshot of everything seeds need to know about a pipeline.
///
/// Shared by reference between all stage and job seeds built for one
/// pipeline. The protection verdict for the ref is looked up lazily and
/// cached, so every job in the pipeline sees the same answer.
pub struct PipelineContext {
    project: Project,
    pipeline: Option<PipelineId>,
    ref_: String,
    tag: bool,
    source: PipelineSource,
    trigger_request: Option<TriggerRequest>,
    variables: IndexMap<String, String>,
    protection: Arc<dyn RefProtection>,
    protected: OnceCell<bool>,
}

impl PipelineContext {
    pub fn from_pipeline(pipeline: &Pipeline, protection: Arc<dyn RefProtection>) -> Self {
        let mut variables = predefined_variables(pipeline);
        variables.extend(
            pipeline
                .variables
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );

        Self {
            project: pipeline.project.clone(),
            pipeline: pipeline.id(),
            ref_: pipeline.ref_.clone(),
            tag: pipeline.tag,
            source: pipeline.source,
            trigger_request: pipeline.trigger_requests.first().cloned(),
            variables,
            protection,
            protected: OnceCell::new(),
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }

    pub fn ref_(&self) -> &str {
        &self.ref_
    }

    pub fn is_tag(&self) -> bool {
        self.tag
    }

    pub fn source(&self) -> PipelineSource {
        self.source
    }

    pub fn trigger_request(&self) -> Option<&TriggerRequest> {
        self.trigger_request.as_ref()
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn is_protected(&self) -> bool {
        *self
            .protected
            .get_or_init(|| self.protection.is_protected(&self.project, &self.ref_))
    }
}

fn predefined_variables(pipeline: &Pipeline) -> IndexMap<String, String> {
    let mut variables = IndexMap::new();
    variables.insert("CI".to_string(), "true".to_string());
    variables.insert("CI_COMMIT_REF_NAME".to_string(), pipeline.ref_.clone());
    if pipeline.tag {
        variables.insert("CI_COMMIT_TAG".to_string(), pipeline.ref_.clone());
    }
    variables.insert("CI_PIPELINE_SOURCE".to_string(), pipeline.source.to_string());
    variables.insert("CI_PROJECT_ID".to_string(), pipeline.project.id.to_string());
    variables.insert("CI_PROJECT_PATH".to_string(), pipeline.project.path.clone());
    variables
}
