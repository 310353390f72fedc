use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::resource::{BuildId, JobRecord, Pipeline, PipelineId, StageId, StageRecord};
use crate::error::{Result, SeedError};

/// Persistence collaborator for seeded pipelines.
///
/// The only write path is [`PipelineStore::save_within_transaction`], which
/// commits a pipeline together with every stage attached to it. A commit
/// either writes the whole graph or nothing.
pub trait PipelineStore: Send + Sync {
    /// Commits the pipeline and its attached, not yet persisted stages and
    /// jobs. Identities are assigned to `pipeline` only when the commit
    /// succeeds.
    fn save_within_transaction(&self, pipeline: &mut Pipeline) -> Result<PipelineId>;

    /// Loads a committed pipeline with its stages and jobs attached.
    fn reload(&self, id: PipelineId) -> Result<Pipeline>;

    fn stages_of(&self, id: PipelineId) -> Result<Vec<StageRecord>>;

    fn builds_of(&self, id: PipelineId) -> Result<Vec<JobRecord>>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    last_id: u64,
    pipelines: IndexMap<PipelineId, Pipeline>,
    stages: IndexMap<StageId, StageRecord>,
    builds: IndexMap<BuildId, JobRecord>,
}

impl StoreState {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn stages_of(&self, id: PipelineId) -> Vec<StageRecord> {
        let mut stages: Vec<StageRecord> = self
            .stages
            .values()
            .filter(|stage| stage.pipeline_id == Some(id))
            .map(|stage| {
                let mut stage = stage.clone();
                let stage_id = stage.id();
                stage.builds = self
                    .builds
                    .values()
                    .filter(|build| build.stage_id() == stage_id)
                    .cloned()
                    .collect();
                stage
            })
            .collect();
        stages.sort_by_key(|stage| stage.position);
        stages
    }
}

/// Reference [`PipelineStore`] keeping records in memory, optionally
/// mirrored to a JSON file after every commit.
///
/// With a file configured, the snapshot is written before the in-memory
/// state is swapped, so a failed write leaves both untouched.
pub struct MemoryStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Opens a store backed by the JSON file at `path`, loading existing
    /// records if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let content = fs::read_to_string(path)?;
            let state: StoreState = serde_json::from_str(&content)?;
            debug!(
                "Loaded {} pipelines from store: {}",
                state.pipelines.len(),
                path.display()
            );
            state
        } else {
            StoreState::default()
        };

        info!("Pipeline store at: {}", path.display());

        Ok(Self {
            path: Some(path.to_path_buf()),
            state: Mutex::new(state),
        })
    }

    /// Platform-specific default store file:
    /// - Linux: `~/.local/share/ciseed/pipelines.json`
    /// - macOS: `~/Library/Application Support/ciseed/pipelines.json`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| SeedError::Store("No data directory found".into()))?
            .join("ciseed");
        fs::create_dir_all(&data_dir)?;
        Ok(data_dir.join("pipelines.json"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| SeedError::Store("store lock poisoned".into()))
    }

    fn write_snapshot(&self, state: &StoreState) -> Result<()> {
        if let Some(path) = &self.path {
            fs::write(path, serde_json::to_string(state)?)?;
            debug!("Wrote store snapshot: {}", path.display());
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStore for MemoryStore {
    fn save_within_transaction(&self, pipeline: &mut Pipeline) -> Result<PipelineId> {
        let mut state = self.lock()?;

        validate(pipeline, &state)?;

        let mut next = state.clone();
        let mut staged = pipeline.clone();

        let pipeline_id = match staged.id() {
            Some(id) => id,
            None => {
                let id = next.next_id();
                staged.assign_id(id);
                id
            }
        };

        let mut new_stages = 0;
        let mut new_builds = 0;
        for stage in staged.stages_mut().iter_mut().filter(|s| !s.is_persisted()) {
            let stage_id = next.next_id();
            stage.assign_identity(stage_id, pipeline_id);
            for build in &mut stage.builds {
                let build_id = next.next_id();
                build.assign_identity(build_id, stage_id, pipeline_id);
                next.builds.insert(build_id, build.clone());
                new_builds += 1;
            }

            let mut row = stage.clone();
            row.builds.clear();
            next.stages.insert(stage_id, row);
            new_stages += 1;
        }

        let mut row = staged.clone();
        row.stages_mut().clear();
        next.pipelines.insert(pipeline_id, row);

        self.write_snapshot(&next)?;
        *state = next;
        *pipeline = staged;

        info!(
            "Committed pipeline {pipeline_id} with {new_stages} new stages and {new_builds} new jobs"
        );

        Ok(pipeline_id)
    }

    fn reload(&self, id: PipelineId) -> Result<Pipeline> {
        let state = self.lock()?;
        let mut pipeline = state
            .pipelines
            .get(&id)
            .cloned()
            .ok_or_else(|| SeedError::NotFound(id.to_string()))?;

        for stage in state.stages_of(id) {
            pipeline.attach(stage);
        }
        Ok(pipeline)
    }

    fn stages_of(&self, id: PipelineId) -> Result<Vec<StageRecord>> {
        Ok(self.lock()?.stages_of(id))
    }

    fn builds_of(&self, id: PipelineId) -> Result<Vec<JobRecord>> {
        let state = self.lock()?;
        Ok(state
            .builds
            .values()
            .filter(|build| build.pipeline_id == Some(id))
            .cloned()
            .collect())
    }
}

fn validate(pipeline: &Pipeline, state: &StoreState) -> Result<()> {
    pipeline.validate()?;

    let mut stage_names: Vec<&str> = Vec::new();
    if let Some(id) = pipeline.id() {
        if !state.pipelines.contains_key(&id) {
            return Err(SeedError::NotFound(id.to_string()));
        }
        stage_names.extend(
            state
                .stages
                .values()
                .filter(|stage| stage.pipeline_id == Some(id))
                .map(|stage| stage.name.as_str()),
        );
    }

    for stage in pipeline.stages().iter().filter(|s| !s.is_persisted()) {
        stage.validate(pipeline.project.id)?;
        if stage_names.contains(&stage.name.as_str()) {
            return Err(SeedError::Validation(format!(
                "stage {} already exists in this pipeline",
                stage.name
            )));
        }
        stage_names.push(&stage.name);
    }

    Ok(())
}
