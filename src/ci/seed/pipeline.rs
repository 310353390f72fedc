use log::{debug, info};

use super::stage::StageSeed;
use crate::ci::context::PipelineContext;
use crate::ci::definition::StageDefinition;
use crate::ci::resource::{Pipeline, PipelineId};
use crate::ci::store::PipelineStore;
use crate::error::{Result, SeedError};

/// Expands declared stages into stage seeds and commits the included ones.
pub struct PipelineSeeder<'a> {
    context: &'a PipelineContext,
    stages: Vec<StageSeed<'a>>,
}

impl<'a> PipelineSeeder<'a> {
    /// Builds one stage seed per definition, positioned by declaration order.
    pub fn build(context: &'a PipelineContext, definitions: &'a [StageDefinition]) -> Self {
        let stages = definitions
            .iter()
            .enumerate()
            .map(|(position, definition)| StageSeed::new(context, definition, position))
            .collect();

        Self { context, stages }
    }

    pub fn stages(&self) -> &[StageSeed<'a>] {
        &self.stages
    }

    /// Stages that contain at least one included job, in position order.
    pub fn included_stages(&self) -> impl Iterator<Item = &StageSeed<'a>> {
        self.stages.iter().filter(|stage| stage.is_included())
    }

    /// Total number of included jobs across all stages.
    pub fn size(&self) -> usize {
        self.stages.iter().map(StageSeed::size).sum()
    }

    /// Materializes every included stage, attaches it to `pipeline` and
    /// commits the whole graph in one transaction.
    ///
    /// Stages without included jobs are dropped; the remaining stages keep
    /// their declared positions.
    ///
    /// # Errors
    ///
    /// Returns an error if no stage contains an included job, the pipeline
    /// belongs to another project than the seeding context, or the store
    /// rejects the graph. In every error case nothing is written: a new
    /// pipeline stays unpersisted and `pipeline` is left unchanged.
    pub fn finalize(
        self,
        pipeline: &mut Pipeline,
        store: &dyn PipelineStore,
    ) -> Result<PipelineId> {
        if pipeline.project != *self.context.project() {
            return Err(SeedError::Validation(format!(
                "pipeline belongs to {} but was seeded for {}",
                pipeline.project.path,
                self.context.project().path
            )));
        }

        let mut stages: Vec<&StageSeed<'a>> = self.included_stages().collect();
        if stages.is_empty() {
            return Err(SeedError::Validation("no stages / jobs for this pipeline".into()));
        }
        stages.sort_by_key(|stage| stage.position());

        for stage in self.stages.iter().filter(|stage| !stage.is_included()) {
            debug!("Dropping stage {} without included jobs", stage.name());
        }

        let mut staged = pipeline.clone();
        for stage in &stages {
            staged.attach(stage.to_resource());
        }

        let id = store.save_within_transaction(&mut staged)?;
        *pipeline = staged;

        info!(
            "Seeded pipeline {id} for {} with {} stages and {} jobs",
            self.context.ref_(),
            stages.len(),
            self.size()
        );

        Ok(id)
    }
}
