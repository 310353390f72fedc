use globset::{Glob, GlobMatcher};
use log::debug;

use super::resource::Project;
use crate::error::{Result, SeedError};

/// Answers whether a ref is protected for a project.
///
/// Lookups may be expensive, so callers go through
/// [`PipelineContext::is_protected`](super::context::PipelineContext::is_protected),
/// which asks at most once per context.
pub trait RefProtection: Send + Sync {
    fn is_protected(&self, project: &Project, ref_: &str) -> bool;
}

/// Protected refs configured as exact names or wildcard patterns
/// (e.g., "release/*").
#[derive(Debug, Clone, Default)]
pub struct ProtectedRefs {
    patterns: Vec<ProtectedPattern>,
}

#[derive(Debug, Clone)]
enum ProtectedPattern {
    Exact(String),
    Wildcard(GlobMatcher),
}

impl ProtectedRefs {
    /// Compiles the given patterns. A pattern containing `*` is a wildcard
    /// that also matches across `/`.
    ///
    /// # Errors
    ///
    /// Returns an error if a wildcard pattern cannot be compiled.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                if pattern.contains('*') {
                    let glob = Glob::new(pattern).map_err(|e| {
                        SeedError::Config(format!("Invalid protected ref pattern '{pattern}': {e}"))
                    })?;
                    Ok(ProtectedPattern::Wildcard(glob.compile_matcher()))
                } else {
                    Ok(ProtectedPattern::Exact(pattern.to_string()))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }
}

impl RefProtection for ProtectedRefs {
    fn is_protected(&self, project: &Project, ref_: &str) -> bool {
        let protected = self.patterns.iter().any(|pattern| match pattern {
            ProtectedPattern::Exact(name) => name == ref_,
            ProtectedPattern::Wildcard(matcher) => matcher.is_match(ref_),
        });
        debug!(
            "Ref {ref_} of {} is {}",
            project.path,
            if protected { "protected" } else { "not protected" }
        );
        protected
    }
}
