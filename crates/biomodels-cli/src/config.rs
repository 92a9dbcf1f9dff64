//! `config.properties` loading.
//!
//! Java-style properties: one `key=value`, `key: value` or `key value` per
//! line. The key ends at the first `=`, `:` or whitespace; `#` and `!` start
//! comments. Continuation lines and escapes are not supported.

use anyhow::{anyhow, bail, Context, Result};
use biomodels_graph::neo4j::{Neo4jConfig, DEFAULT_PASSWORD, DEFAULT_URI, DEFAULT_USER};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const NEO4J_KEYS: [&str; 3] = ["neo4jUri", "neo4jUser", "neo4jPassword"];

/// Where the release graph lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphBackend {
    /// JSON snapshot, rewritten on commit.
    Snapshot(PathBuf),
    Neo4j(Neo4jConfig),
}

impl GraphBackend {
    /// A `scheme://` target is a Neo4j URI; anything else is a snapshot path.
    pub fn from_target(target: &str, user: &str, password: &str) -> Self {
        if target.contains("://") {
            GraphBackend::Neo4j(Neo4jConfig::new(target, user, password))
        } else {
            GraphBackend::Snapshot(PathBuf::from(target))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            GraphBackend::Snapshot(path) => path.display().to_string(),
            GraphBackend::Neo4j(config) => config.uri.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertConfig {
    /// dbId of the Person the instance edit is authored by.
    pub person_id: i64,
    pub backend: GraphBackend,
    pub note: Option<String>,
}

impl InsertConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read properties file {}", path.display()))?;
        Self::from_properties(&parse_properties(&text))
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    /// `graphSnapshot` selects a snapshot file. Otherwise the run goes to
    /// Neo4j, with unset `neo4j*` properties taking their defaults.
    pub fn from_properties(props: &BTreeMap<String, String>) -> Result<Self> {
        let person_id = props
            .get("personId")
            .ok_or_else(|| anyhow!("missing required property `personId`"))?;
        let person_id = person_id
            .parse::<i64>()
            .with_context(|| format!("`personId` is not an integer: {person_id:?}"))?;

        let uses_neo4j = NEO4J_KEYS.iter().any(|key| props.contains_key(*key));
        let backend = match props.get("graphSnapshot") {
            Some(_) if uses_neo4j => {
                bail!("`graphSnapshot` cannot be combined with `neo4jUri`, `neo4jUser` or `neo4jPassword`")
            }
            Some(path) => GraphBackend::Snapshot(PathBuf::from(path)),
            None => {
                let get = |key: &str, default: &str| {
                    props.get(key).cloned().unwrap_or_else(|| default.to_string())
                };
                GraphBackend::Neo4j(Neo4jConfig::new(
                    get("neo4jUri", DEFAULT_URI),
                    get("neo4jUser", DEFAULT_USER),
                    get("neo4jPassword", DEFAULT_PASSWORD),
                ))
            }
        };
        let note = props.get("note").filter(|n| !n.is_empty()).cloned();

        Ok(Self {
            person_id,
            backend,
            note,
        })
    }
}

pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let end = line
            .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
            .unwrap_or(line.len());
        let (key, rest) = line.split_at(end);
        let rest = rest.trim_start();
        let value = rest.strip_prefix(['=', ':']).unwrap_or(rest);
        props.insert(key.to_string(), value.trim().to_string());
    }
    props
}
