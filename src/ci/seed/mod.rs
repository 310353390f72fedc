mod build;
mod pipeline;
mod stage;

pub use build::{BuildAttributes, JobSeed};
pub use pipeline::PipelineSeeder;
pub use stage::{StageAttributes, StageSeed};
