mod context;
mod definition;
mod policy;
mod protection;
mod resource;
mod seed;
mod store;

pub use context::PipelineContext;
pub use definition::{parse_pipeline, JobDefinition, StageDefinition};
pub use policy::{included, Policy};
pub use protection::{ProtectedRefs, RefProtection};
pub use resource::{
    JobRecord, Pipeline, PipelineId, PipelineSource, Project, StageRecord, TriggerRequest, When,
};
pub use seed::{BuildAttributes, JobSeed, PipelineSeeder, StageAttributes, StageSeed};
pub use store::{MemoryStore, PipelineStore};
