//! Index templates and lifecycle policies
//!
//! Templates can come from a directory laid out as `templates/<index>.json`
//! and `policies/<name>.json`, or from the minimal built-in set.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::debug;

use crate::core::error::{IndexerError, IndexerResult};
use crate::core::traits::TemplatesAndPoliciesReader;
use crate::data::indices::{ALL_INDICES, OPEN_DISTRO_INDEX};

const TEMPLATES_DIR: &str = "templates";
const POLICIES_DIR: &str = "policies";
const JSON_EXTENSION: &str = "json";

/// Reads templates and policies from disk
#[derive(Debug, Clone)]
pub struct FileTemplatesReader {
    path: PathBuf,
}

impl FileTemplatesReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TemplatesAndPoliciesReader for FileTemplatesReader {
    fn templates(&self) -> IndexerResult<BTreeMap<String, Vec<u8>>> {
        let dir = self.path.join(TEMPLATES_DIR);
        let mut templates = BTreeMap::new();
        for name in ALL_INDICES.iter().copied().chain(std::iter::once(OPEN_DISTRO_INDEX)) {
            let file = dir.join(format!("{}.{}", name, JSON_EXTENSION));
            if !file.is_file() {
                debug!(target: "es_indexer::templates", "no template for {} in {}", name, dir.display());
                continue;
            }
            templates.insert(name.to_string(), read_json(&file)?);
        }

        Ok(templates)
    }

    fn policies(&self) -> IndexerResult<BTreeMap<String, Vec<u8>>> {
        let dir = self.path.join(POLICIES_DIR);
        let mut policies = BTreeMap::new();
        if !dir.is_dir() {
            return Ok(policies);
        }

        let entries = fs::read_dir(&dir)
            .map_err(|err| IndexerError::Configuration(format!("cannot read {}: {}", dir.display(), err)))?;
        for entry in entries {
            let path = entry
                .map_err(|err| IndexerError::Configuration(format!("cannot read {}: {}", dir.display(), err)))?
                .path();
            if path.extension().and_then(|extension| extension.to_str()) != Some(JSON_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            policies.insert(name.to_string(), read_json(&path)?);
        }

        Ok(policies)
    }
}

fn read_json(path: &Path) -> IndexerResult<Vec<u8>> {
    let bytes = fs::read(path)
        .map_err(|err| IndexerError::Configuration(format!("cannot read {}: {}", path.display(), err)))?;
    serde_json::from_slice::<Value>(&bytes)
        .map_err(|err| IndexerError::Configuration(format!("invalid json in {}: {}", path.display(), err)))?;
    Ok(bytes)
}

/// Minimal templates for every index; the rollover policy only when Kibana is used
#[derive(Debug, Clone, Default)]
pub struct BuiltinTemplatesReader {
    use_kibana: bool,
}

impl BuiltinTemplatesReader {
    pub fn new(use_kibana: bool) -> Self {
        Self { use_kibana }
    }
}

impl TemplatesAndPoliciesReader for BuiltinTemplatesReader {
    fn templates(&self) -> IndexerResult<BTreeMap<String, Vec<u8>>> {
        let mut templates = BTreeMap::new();
        templates.insert(
            OPEN_DISTRO_INDEX.to_string(),
            serde_json::to_vec(&json!({
                "index_patterns": [".opendistro-*"],
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                }
            }))?,
        );

        for index in ALL_INDICES {
            let mut settings = json!({
                "number_of_shards": 3,
                "number_of_replicas": 0
            });
            if self.use_kibana {
                settings["opendistro.index_state_management.rollover_alias"] = json!(index);
            }

            let template = json!({
                "index_patterns": [format!("{}-*", index)],
                "settings": settings,
                "mappings": {
                    "properties": mapping_properties(index)
                }
            });
            templates.insert(index.to_string(), serde_json::to_vec(&template)?);
        }

        Ok(templates)
    }

    fn policies(&self) -> IndexerResult<BTreeMap<String, Vec<u8>>> {
        let mut policies = BTreeMap::new();
        if !self.use_kibana {
            return Ok(policies);
        }

        let patterns: Vec<String> = ALL_INDICES.iter().map(|index| format!("{}-*", index)).collect();
        let policy = json!({
            "policy": {
                "description": "Rollover policy of the indexer indices",
                "default_state": "hot",
                "states": [
                    {
                        "name": "hot",
                        "actions": [{"rollover": {"min_size": "60gb"}}],
                        "transitions": [{"state_name": "warm", "conditions": {"min_size": "60gb"}}]
                    },
                    {
                        "name": "warm",
                        "actions": [{"replica_count": {"number_of_replicas": 1}}],
                        "transitions": []
                    }
                ],
                "ism_template": {
                    "index_patterns": patterns,
                    "priority": 100
                }
            }
        });
        policies.insert(OPEN_DISTRO_INDEX.to_string(), serde_json::to_vec(&policy)?);

        Ok(policies)
    }
}

fn mapping_properties(index: &str) -> Value {
    match index {
        "validators" => json!({"publicKeys": {"type": "keyword"}}),
        "rating" => json!({"rating": {"type": "double"}}),
        "epochinfo" => json!({
            "accumulatedFees": {"type": "keyword"},
            "developerFees": {"type": "keyword"}
        }),
        "tags" => json!({
            "count": {"type": "long"},
            "tag": {"type": "keyword"}
        }),
        "accounts" | "accountsesdt" => json!({
            "address": {"type": "keyword"},
            "balance": {"type": "keyword"},
            "balanceNum": {"type": "double"},
            "token": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
            "identifier": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
            "type": {"type": "keyword"},
            "timestamp": {"type": "date", "format": "epoch_second"}
        }),
        "tokens" => json!({
            "token": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
            "identifier": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
            "type": {"type": "keyword"},
            "currentOwner": {"type": "keyword"},
            "timestamp": {"type": "date", "format": "epoch_second"}
        }),
        _ => json!({
            "timestamp": {"type": "date", "format": "epoch_second"}
        }),
    }
}
