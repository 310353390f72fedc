use indexmap::IndexMap;
use serde::Serialize;

use crate::ci::context::PipelineContext;
use crate::ci::definition::JobDefinition;
use crate::ci::resource::{JobRecord, PipelineId, Project, TriggerRequest, When};
use crate::error::Result;

/// Attributes a job will be created with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildAttributes {
    pub name: String,
    pub stage: String,
    pub stage_idx: usize,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub tag: bool,
    pub protected: bool,
    pub trigger_request: Option<TriggerRequest>,
    pub project: Project,
    pub pipeline: Option<PipelineId>,
    pub when: When,
    pub allow_failure: bool,
    pub tag_list: Vec<String>,
    pub environment: Option<String>,
    pub yaml_variables: IndexMap<String, String>,
    pub options: serde_json::Value,
}

/// An intention to create one job.
///
/// Only a [`StageSeed`](super::stage::StageSeed) builds job seeds, and only
/// for definitions that passed the pipeline's `only`/`except` policies.
#[derive(Clone, Copy)]
pub struct JobSeed<'a> {
    definition: &'a JobDefinition,
    context: &'a PipelineContext,
    /// Name of the owning stage
    stage: &'a str,
    stage_idx: usize,
}

impl<'a> JobSeed<'a> {
    pub(super) fn new(
        definition: &'a JobDefinition,
        context: &'a PipelineContext,
        stage: &'a str,
        stage_idx: usize,
    ) -> Self {
        Self {
            definition,
            context,
            stage,
            stage_idx: definition.stage_idx.unwrap_or(stage_idx),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn attributes(&self) -> BuildAttributes {
        BuildAttributes {
            name: self.definition.name.clone(),
            stage: self.stage.to_string(),
            stage_idx: self.stage_idx,
            ref_: self.context.ref_().to_string(),
            tag: self.context.is_tag(),
            protected: self.context.is_protected(),
            trigger_request: self.context.trigger_request().cloned(),
            project: self.context.project().clone(),
            pipeline: self.context.pipeline(),
            when: self.definition.when,
            allow_failure: self.definition.allow_failure,
            tag_list: self.definition.tags.clone(),
            environment: self.definition.environment.clone(),
            yaml_variables: self.definition.variables.clone(),
            options: self.definition.options.clone(),
        }
    }

    /// Attributes as a generic JSON object.
    pub fn to_map(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.attributes())?)
    }

    /// Builds the unsaved job record. It has no identity and no stage id
    /// until its stage is committed through the pipeline.
    pub fn to_resource(&self) -> JobRecord {
        let attributes = self.attributes();
        let mut job = JobRecord::new(
            attributes.name,
            attributes.stage,
            attributes.stage_idx,
            attributes.pipeline,
            attributes.project.id,
            attributes.ref_,
            attributes.tag,
            attributes.protected,
            attributes.trigger_request.map(|trigger| trigger.id),
        );
        job.when = attributes.when;
        job.allow_failure = attributes.allow_failure;
        job.tag_list = attributes.tag_list;
        job.environment = attributes.environment;
        job.yaml_variables = attributes.yaml_variables;
        job.options = attributes.options;
        job
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::context::tests::{create_test_pipeline, StaticProtection};

    fn context(protected: bool) -> PipelineContext {
        PipelineContext::from_pipeline(
            &create_test_pipeline("master"),
            StaticProtection::new(protected),
        )
    }

    #[test]
    fn test_attributes_reflect_context() {
        let pipeline = create_test_pipeline("v2.0")
            .with_tag(true)
            .with_trigger_request(TriggerRequest { id: 3 });
        let context = PipelineContext::from_pipeline(&pipeline, StaticProtection::new(true));
        let definition = JobDefinition::new("rspec");

        let attributes = JobSeed::new(&definition, &context, "test", 1).attributes();

        assert_eq!(attributes.name, "rspec");
        assert_eq!(attributes.ref_, "v2.0");
        assert!(attributes.tag);
        assert!(attributes.protected);
        assert_eq!(attributes.trigger_request, Some(TriggerRequest { id: 3 }));
        assert_eq!(attributes.project.path, "group/project");
        assert_eq!(attributes.pipeline, None);
        assert_eq!(attributes.stage_idx, 1);
    }

    #[test]
    fn test_stage_index_override() {
        let context = context(false);
        let mut definition = JobDefinition::new("rspec");
        definition.stage_idx = Some(4);

        assert_eq!(
            JobSeed::new(&definition, &context, "test", 1).attributes().stage_idx,
            4
        );
    }

    #[test]
    fn test_attributes_are_stable_across_calls() {
        let context = context(false);
        let definition = JobDefinition::new("rspec");
        let seed = JobSeed::new(&definition, &context, "test", 0);

        assert_eq!(seed.attributes(), seed.attributes());
    }

    #[test]
    fn test_to_map_uses_ref_key() {
        let context = context(false);
        let definition = JobDefinition::new("rspec");

        let map = JobSeed::new(&definition, &context, "test", 0).to_map().unwrap();

        assert_eq!(map["ref"], "master");
        assert_eq!(map["protected"], false);
        assert_eq!(map["when"], "on_success");
    }

    #[test]
    fn test_stage_comes_from_owning_stage() {
        let context = context(false);
        let definition = JobDefinition::new("compile");

        let seed = JobSeed::new(&definition, &context, "build", 0);

        assert_eq!(definition.stage, "test");
        assert_eq!(seed.attributes().stage, "build");
        assert_eq!(seed.to_resource().stage, "build");
    }

    #[test]
    fn test_to_resource_is_unsaved() {
        let context = context(true);
        let definition = JobDefinition::new("rspec");

        let job = JobSeed::new(&definition, &context, "test", 0).to_resource();

        assert!(!job.is_persisted());
        assert_eq!(job.stage_id(), None);
        assert_eq!(job.name, "rspec");
        assert_eq!(job.stage, "test");
        assert_eq!(job.project_id, 1);
        assert!(job.protected);
        assert_eq!(job.status, "created");
    }
}
