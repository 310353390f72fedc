use log::debug;
use serde::Serialize;

use super::build::JobSeed;
use crate::ci::context::PipelineContext;
use crate::ci::definition::StageDefinition;
use crate::ci::policy;
use crate::ci::resource::{PipelineId, Project, StageRecord};

/// Attributes a stage will be created with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageAttributes {
    pub name: String,
    pub position: usize,
    pub pipeline: Option<PipelineId>,
    pub project: Project,
}

/// An intention to create one stage with the jobs that pass their policies.
pub struct StageSeed<'a> {
    context: &'a PipelineContext,
    name: String,
    position: usize,
    seeds: Vec<JobSeed<'a>>,
}

impl<'a> StageSeed<'a> {
    /// `position` is the stage's place in the declared stage list.
    pub(super) fn new(
        context: &'a PipelineContext,
        definition: &'a StageDefinition,
        position: usize,
    ) -> Self {
        let seeds: Vec<JobSeed<'a>> = definition
            .builds
            .iter()
            .filter(|build| policy::included(build, context))
            .map(|build| JobSeed::new(build, context, &definition.name, position))
            .collect();

        debug!(
            "Stage {} includes {} of {} jobs for ref {}",
            definition.name,
            seeds.len(),
            definition.builds.len(),
            context.ref_()
        );

        Self {
            context,
            name: definition.name.clone(),
            position,
            seeds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of jobs included by their `only`/`except` policies.
    pub fn size(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_included(&self) -> bool {
        self.size() > 0
    }

    pub fn seeds(&self) -> &[JobSeed<'a>] {
        &self.seeds
    }

    pub fn attributes(&self) -> StageAttributes {
        StageAttributes {
            name: self.name.clone(),
            position: self.position,
            pipeline: self.context.pipeline(),
            project: self.context.project().clone(),
        }
    }

    /// Builds the unsaved stage with one unsaved job per seed.
    ///
    /// The result is only written when attached to its pipeline and the
    /// pipeline is committed.
    pub fn to_resource(&self) -> StageRecord {
        let attributes = self.attributes();
        let mut stage = StageRecord::new(
            attributes.name,
            attributes.position,
            attributes.pipeline,
            attributes.project.id,
        );
        stage.builds = self.seeds.iter().map(JobSeed::to_resource).collect();
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ci::context::tests::{create_test_pipeline, StaticProtection};
    use crate::ci::definition::JobDefinition;
    use crate::ci::policy::Policy;
    use crate::ci::resource::{Pipeline, TriggerRequest};
    use crate::ci::store::{MemoryStore, PipelineStore};
    use std::sync::atomic::Ordering;

    fn test_stage(builds: Vec<JobDefinition>) -> StageDefinition {
        StageDefinition::new("test", builds)
    }

    fn default_builds() -> Vec<JobDefinition> {
        vec![
            JobDefinition::new("rspec"),
            JobDefinition::new("spinach"),
            JobDefinition::new("deploy").with_only(Policy::refs(&["feature"]).unwrap()),
        ]
    }

    fn persisted_pipeline(store: &MemoryStore) -> Pipeline {
        let mut pipeline =
            create_test_pipeline("master").with_trigger_request(TriggerRequest { id: 11 });
        store.save_within_transaction(&mut pipeline).unwrap();
        pipeline
    }

    fn context(pipeline: &Pipeline, protected: bool) -> PipelineContext {
        PipelineContext::from_pipeline(pipeline, StaticProtection::new(protected))
    }

    #[test]
    fn test_size_counts_included_jobs() {
        let pipeline = create_test_pipeline("master");
        let context = context(&pipeline, false);
        let definition = test_stage(default_builds());

        let stage = StageSeed::new(&context, &definition, 0);

        assert_eq!(stage.size(), 2);
    }

    #[test]
    fn test_attributes_of_a_stage() {
        let store = MemoryStore::new();
        let pipeline = persisted_pipeline(&store);
        let context = context(&pipeline, false);
        let definition = test_stage(default_builds());

        let attributes = StageSeed::new(&context, &definition, 0).attributes();

        assert_eq!(attributes.name, "test");
        assert_eq!(attributes.position, 0);
        assert_eq!(attributes.pipeline, pipeline.id());
        assert_eq!(attributes.project, pipeline.project);
    }

    #[test]
    fn test_included_when_it_contains_build_seeds() {
        let pipeline = create_test_pipeline("master");
        let context = context(&pipeline, false);
        let definition = test_stage(vec![
            JobDefinition::new("deploy").with_only(Policy::refs(&["master"]).unwrap())
        ]);

        assert!(StageSeed::new(&context, &definition, 0).is_included());
    }

    #[test]
    fn test_not_included_without_build_seeds() {
        let pipeline = create_test_pipeline("master");
        let context = context(&pipeline, false);
        let definition = test_stage(vec![
            JobDefinition::new("deploy").with_only(Policy::refs(&["feature"]).unwrap())
        ]);

        let stage = StageSeed::new(&context, &definition, 0);

        assert!(!stage.is_included());
        assert_eq!(stage.size(), 0);
        assert!(stage.seeds().is_empty());
        assert_eq!(stage.attributes().name, "test");
    }

    #[test]
    fn test_seeds_include_valid_attributes() {
        let store = MemoryStore::new();
        let pipeline = persisted_pipeline(&store);
        let context = context(&pipeline, false);
        let definition = test_stage(default_builds());

        let attributes: Vec<_> = StageSeed::new(&context, &definition, 0)
            .seeds()
            .iter()
            .map(JobSeed::attributes)
            .collect();

        assert_eq!(attributes.len(), 2);
        assert!(attributes.iter().all(|a| a.ref_ == "master"));
        assert!(attributes.iter().all(|a| !a.tag));
        assert!(attributes.iter().all(|a| a.project == pipeline.project));
        assert!(attributes
            .iter()
            .all(|a| a.trigger_request.as_ref() == pipeline.trigger_requests.first()));
    }

    #[test]
    fn test_seeds_are_protected_when_ref_is_protected() {
        let pipeline = create_test_pipeline("master");
        let context = context(&pipeline, true);
        let definition = test_stage(default_builds());

        let stage = StageSeed::new(&context, &definition, 0);

        assert!(stage.seeds().iter().all(|seed| seed.attributes().protected));
    }

    #[test]
    fn test_seeds_are_unprotected_when_ref_is_not_protected() {
        let pipeline = create_test_pipeline("master");
        let context = context(&pipeline, false);
        let definition = test_stage(default_builds());

        let stage = StageSeed::new(&context, &definition, 0);

        assert!(stage
            .seeds()
            .iter()
            .all(|seed| !seed.attributes().protected));
    }

    #[test]
    fn test_protection_is_checked_once_for_all_seeds() {
        let pipeline = create_test_pipeline("master");
        let protection = StaticProtection::new(true);
        let context = PipelineContext::from_pipeline(&pipeline, protection.clone());
        let definition = test_stage(default_builds());

        let stage = StageSeed::new(&context, &definition, 0);
        for seed in stage.seeds() {
            seed.attributes();
        }
        stage.to_resource();

        assert_eq!(protection.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_seeds_are_filtered_by_policies() {
        let pipeline = create_test_pipeline("master");
        let context = context(&pipeline, false);
        let definition = test_stage(default_builds());

        let stage = StageSeed::new(&context, &definition, 0);
        let names: Vec<_> = stage.seeds().iter().map(JobSeed::name).collect();

        assert!(names.contains(&"rspec"));
        assert!(names.contains(&"spinach"));
        assert!(!names.contains(&"deploy"));
    }

    #[test]
    fn test_seeds_keep_declaration_order() {
        let pipeline = create_test_pipeline("master");
        let context = context(&pipeline, false);
        let definition = test_stage(vec![
            JobDefinition::new("c"),
            JobDefinition::new("a"),
            JobDefinition::new("skipped").with_except(Policy::refs(&["master"]).unwrap()),
            JobDefinition::new("b"),
        ]);

        let stage = StageSeed::new(&context, &definition, 0);
        let names: Vec<_> = stage.seeds().iter().map(JobSeed::name).collect();

        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_to_resource_builds_a_valid_stage_with_all_builds() {
        let store = MemoryStore::new();
        let mut pipeline = persisted_pipeline(&store);
        let context = context(&pipeline, false);
        let definition = test_stage(default_builds());
        let stage = StageSeed::new(&context, &definition, 0);

        pipeline.attach(stage.to_resource());
        let id = store.save_within_transaction(&mut pipeline).unwrap();

        let stages = store.stages_of(id).unwrap();
        let builds = store.builds_of(id).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(builds.len(), 2);
        assert!(builds.iter().all(|job| job.stage_id().is_some()));
        assert!(builds.iter().all(|job| job.pipeline_id == Some(id)));
        assert!(builds
            .iter()
            .all(|job| job.project_id == pipeline.project.id));
        assert!(stages.iter().all(|stage| stage.pipeline_id == Some(id)));
        assert!(stages
            .iter()
            .all(|stage| stage.project_id == pipeline.project.id));

        let reloaded = store.reload(id).unwrap();
        assert_eq!(reloaded.stages().len(), 1);
        assert_eq!(reloaded.builds().count(), 2);
    }

    #[test]
    fn test_to_resource_can_not_be_persisted_without_pipeline_assignment() {
        let store = MemoryStore::new();
        let mut pipeline = persisted_pipeline(&store);
        let context = context(&pipeline, false);
        let definition = test_stage(default_builds());

        let stage = StageSeed::new(&context, &definition, 0).to_resource();
        let id = store.save_within_transaction(&mut pipeline).unwrap();

        assert!(!stage.is_persisted());
        assert!(stage.builds.iter().all(|job| !job.is_persisted()));
        assert_eq!(store.stages_of(id).unwrap().len(), 0);
        assert_eq!(store.builds_of(id).unwrap().len(), 0);
    }
}
