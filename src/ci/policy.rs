//! `only` / `except` policies deciding whether a job belongs in a pipeline.
//!
//! A policy is either a list of ref clauses or a mapping with `refs` and/or
//! `variables` keys:
//!
//! ```yaml
//! deploy:
//!   only:
//!     - master
//!     - /^release-.*$/
//!     - tags
//!   except:
//!     variables:
//!       - $SKIP_DEPLOY == "true"
//! ```
//!
//! Patterns are compiled when the definition is loaded so evaluation never
//! fails and never performs I/O.

use globset::{Glob, GlobMatcher};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;

use super::context::PipelineContext;
use super::definition::JobDefinition;
use super::resource::PipelineSource;
use crate::error::{Result, SeedError};

static VARIABLE_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_]*)\s*(?:(==|!=|=~)\s*(.+))?$")
        .expect("variable expression pattern is valid")
});

/// Decides whether a job is part of the pipeline described by `context`.
///
/// A job without policies is always included. `only` is evaluated first and
/// every key it declares must match; `except` then excludes the job if any
/// of its keys match.
pub fn included(definition: &JobDefinition, context: &PipelineContext) -> bool {
    let passes_only = definition
        .only
        .as_ref()
        .map_or(true, |policy| policy.all_satisfied_by(context));
    let hits_except = definition
        .except
        .as_ref()
        .is_some_and(|policy| policy.any_satisfied_by(context));

    passes_only && !hits_except
}

/// A parsed `only` or `except` entry.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    refs: Option<Vec<RefClause>>,
    variables: Option<Vec<VariableExpression>>,
}

impl Policy {
    /// Builds a ref-only policy from clause strings.
    ///
    /// # Errors
    ///
    /// Returns an error if any clause is a malformed regex or glob.
    pub fn refs<S: AsRef<str>>(clauses: &[S]) -> Result<Self> {
        let refs = clauses
            .iter()
            .map(|clause| RefClause::parse(clause.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            refs: Some(refs),
            variables: None,
        })
    }

    /// Builds a variables-only policy from expression strings.
    ///
    /// # Errors
    ///
    /// Returns an error if any expression is malformed.
    pub fn variables<S: AsRef<str>>(expressions: &[S]) -> Result<Self> {
        let variables = expressions
            .iter()
            .map(|expression| VariableExpression::parse(expression.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            refs: None,
            variables: Some(variables),
        })
    }

    /// Parses the YAML value of an `only` or `except` key.
    pub fn from_yaml(job: &str, value: &Value) -> Result<Self> {
        match value {
            Value::String(clause) => Self::refs(&[clause]),
            Value::Sequence(_) => Self::refs(&string_list(job, "refs", value)?),
            Value::Mapping(mapping) => {
                let mut policy = Self::default();
                for (key, value) in mapping {
                    match key.as_str() {
                        Some("refs") => {
                            policy.refs = Self::refs(&string_list(job, "refs", value)?)?.refs;
                        }
                        Some("variables") => {
                            policy.variables =
                                Self::variables(&string_list(job, "variables", value)?)?.variables;
                        }
                        _ => {
                            return Err(SeedError::Policy(format!(
                                "jobs:{job} policy contains unknown key: {key:?}"
                            )))
                        }
                    }
                }
                Ok(policy)
            }
            _ => Err(SeedError::Policy(format!(
                "jobs:{job} policy should be an array of strings or a hash"
            ))),
        }
    }

    fn all_satisfied_by(&self, context: &PipelineContext) -> bool {
        self.key_results(context).all(|matched| matched)
    }

    fn any_satisfied_by(&self, context: &PipelineContext) -> bool {
        self.key_results(context).any(|matched| matched)
    }

    /// One lazily evaluated result per declared key.
    fn key_results<'a>(&'a self, context: &'a PipelineContext) -> impl Iterator<Item = bool> + 'a {
        let refs = self
            .refs
            .iter()
            .map(move |clauses| clauses.iter().any(|clause| clause.matches(context)));
        let variables = self.variables.iter().map(move |expressions| {
            expressions
                .iter()
                .any(|expression| expression.evaluate(context))
        });
        refs.chain(variables)
    }
}

fn string_list(job: &str, key: &str, value: &Value) -> Result<Vec<String>> {
    let invalid = || SeedError::Policy(format!("jobs:{job} {key} should be an array of strings"));
    match value {
        Value::String(single) => Ok(vec![single.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(ToString::to_string).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Branches,
    Tags,
    Triggers,
    Api,
    Pushes,
    Schedules,
    Web,
    Pipelines,
    External,
}

impl Keyword {
    fn parse(clause: &str) -> Option<Self> {
        match clause {
            "branches" => Some(Self::Branches),
            "tags" => Some(Self::Tags),
            "triggers" => Some(Self::Triggers),
            "api" => Some(Self::Api),
            "pushes" => Some(Self::Pushes),
            "schedules" => Some(Self::Schedules),
            "web" => Some(Self::Web),
            "pipelines" => Some(Self::Pipelines),
            "external" => Some(Self::External),
            _ => None,
        }
    }

    fn matches(self, context: &PipelineContext) -> bool {
        match self {
            Self::Branches => !context.is_tag(),
            Self::Tags => context.is_tag(),
            Self::Triggers => {
                context.trigger_request().is_some() || context.source() == PipelineSource::Trigger
            }
            Self::Api => context.source() == PipelineSource::Api,
            Self::Pushes => context.source() == PipelineSource::Push,
            Self::Schedules => context.source() == PipelineSource::Schedule,
            Self::Web => context.source() == PipelineSource::Web,
            Self::Pipelines => context.source() == PipelineSource::Pipeline,
            Self::External => context.source() == PipelineSource::External,
        }
    }
}

#[derive(Debug, Clone)]
enum RefPattern {
    Exact(String),
    Regex(Regex),
    Glob(GlobMatcher),
}

impl RefPattern {
    fn parse(pattern: &str) -> Result<Self> {
        if let Some(body) = regex_literal(pattern) {
            let regex = Regex::new(&body)
                .map_err(|e| SeedError::Policy(format!("invalid regex {pattern}: {e}")))?;
            return Ok(Self::Regex(regex));
        }

        if pattern.contains(['*', '?', '[']) {
            let glob = Glob::new(pattern)
                .map_err(|e| SeedError::Policy(format!("invalid glob {pattern}: {e}")))?;
            return Ok(Self::Glob(glob.compile_matcher()));
        }

        Ok(Self::Exact(pattern.to_string()))
    }

    fn matches(&self, ref_: &str) -> bool {
        match self {
            Self::Exact(name) => name == ref_,
            Self::Regex(regex) => regex.is_match(ref_),
            Self::Glob(matcher) => matcher.is_match(ref_),
        }
    }
}

/// A single ref clause: a keyword, or a pattern optionally scoped to a
/// project with `pattern@group/project`.
#[derive(Debug, Clone)]
enum RefClause {
    Keyword(Keyword),
    Pattern {
        pattern: RefPattern,
        project_path: Option<String>,
    },
}

impl RefClause {
    fn parse(clause: &str) -> Result<Self> {
        if let Some(keyword) = Keyword::parse(clause) {
            return Ok(Self::Keyword(keyword));
        }

        let (pattern, project_path) = match clause.split_once('@') {
            Some((pattern, path)) if !path.is_empty() => (pattern, Some(path.to_string())),
            _ => (clause, None),
        };

        if pattern.is_empty() {
            return Err(SeedError::Policy(format!("empty ref pattern in clause: {clause}")));
        }

        Ok(Self::Pattern {
            pattern: RefPattern::parse(pattern)?,
            project_path,
        })
    }

    fn matches(&self, context: &PipelineContext) -> bool {
        match self {
            Self::Keyword(keyword) => keyword.matches(context),
            Self::Pattern {
                pattern,
                project_path,
            } => {
                if let Some(path) = project_path {
                    if path != &context.project().path {
                        return false;
                    }
                }
                pattern.matches(context.ref_())
            }
        }
    }
}

/// Turns `/body/` or `/body/i` into a regex source string.
fn regex_literal(pattern: &str) -> Option<String> {
    let rest = pattern.strip_prefix('/')?;
    if let Some(body) = rest.strip_suffix("/i") {
        return Some(format!("(?i){body}"));
    }
    rest.strip_suffix('/').map(ToString::to_string)
}

#[derive(Debug, Clone)]
enum Comparison {
    Present,
    Equals(String),
    NotEquals(String),
    Matches(Regex),
}

/// `$VAR`, `$VAR == "value"`, `$VAR != "value"` or `$VAR =~ /regex/`.
#[derive(Debug, Clone)]
struct VariableExpression {
    name: String,
    comparison: Comparison,
}

impl VariableExpression {
    fn parse(expression: &str) -> Result<Self> {
        let invalid = || SeedError::Policy(format!("invalid variable expression: {expression}"));
        let captures = VARIABLE_EXPRESSION
            .captures(expression.trim())
            .ok_or_else(invalid)?;

        let name = captures[1].to_string();
        let comparison = match (captures.get(2), captures.get(3)) {
            (None, _) => Comparison::Present,
            (Some(operator), Some(operand)) => {
                let operand = operand.as_str().trim();
                match operator.as_str() {
                    "==" => Comparison::Equals(string_literal(operand).ok_or_else(invalid)?),
                    "!=" => Comparison::NotEquals(string_literal(operand).ok_or_else(invalid)?),
                    _ => {
                        let body = regex_literal(operand).ok_or_else(invalid)?;
                        let regex = Regex::new(&body).map_err(|e| {
                            SeedError::Policy(format!("invalid regex in {expression}: {e}"))
                        })?;
                        Comparison::Matches(regex)
                    }
                }
            }
            (Some(_), None) => return Err(invalid()),
        };

        Ok(Self { name, comparison })
    }

    fn evaluate(&self, context: &PipelineContext) -> bool {
        let value = context.variable(&self.name);
        match &self.comparison {
            Comparison::Present => value.is_some_and(|v| !v.is_empty()),
            Comparison::Equals(expected) => value == Some(expected.as_str()),
            Comparison::NotEquals(expected) => value != Some(expected.as_str()),
            Comparison::Matches(regex) => value.is_some_and(|v| regex.is_match(v)),
        }
    }
}

fn string_literal(operand: &str) -> Option<String> {
    ['"', '\''].iter().find_map(|quote| {
        operand
            .strip_prefix(*quote)
            .and_then(|rest| rest.strip_suffix(*quote))
            .map(ToString::to_string)
    })
}
