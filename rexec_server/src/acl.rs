use std::{fs, io, path::Path};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AclError {
    #[error("could not read acl file: {0}")]
    Io(#[from] io::Error),

    #[error("acl file is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid path pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// one entry of the acl file
#[derive(Clone, Debug, Deserialize)]
pub struct RuleSpec {
    pub path: String,
    #[serde(default)]
    pub allow: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AclFile {
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug)]
struct Rule {
    pattern: Regex,
    allow: Vec<String>,
}

/// Maps request paths to the identities allowed to use them.
///
/// Patterns must match the whole path. The first matching rule decides,
/// a path without a matching rule is denied.
#[derive(Debug)]
pub struct Acl {
    rules: Vec<Rule>,
}

impl Acl {
    pub fn load(path: &Path) -> Result<Self, AclError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, AclError> {
        let file: AclFile = serde_json::from_str(text)?;
        Self::from_rules(file.rules)
    }

    pub fn from_rules(specs: Vec<RuleSpec>) -> Result<Self, AclError> {
        let rules = specs
            .into_iter()
            .map(|spec| {
                let pattern = Regex::new(&format!("^(?:{})$", spec.path)).map_err(|source| {
                    AclError::Pattern {
                        pattern: spec.path.clone(),
                        source,
                    }
                })?;
                Ok(Rule {
                    pattern,
                    allow: spec.allow,
                })
            })
            .collect::<Result<Vec<_>, AclError>>()?;
        Ok(Self { rules })
    }

    pub fn is_allowed(&self, path: &str, identity: &str) -> bool {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(path))
            .map_or(false, |rule| rule.allow.iter().any(|allowed| allowed == identity))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
