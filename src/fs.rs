use crate::{error::SequenceError, types::Config};
use anyhow::{Context, Result};
use std::{collections::HashMap, collections::HashSet, fs, path::Path};

pub fn open_file<P: AsRef<Path>>(path: P) -> Result<Config>
where
    P: std::fmt::Debug,
{
    let file = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to open file: {:?}", path))?;
    let config = parse_config(&file).with_context(|| format!("Failed to load {:?}", path))?;
    Ok(config)
}

/// Prompt answers for non-interactive runs: a JSON object of name to value.
pub fn open_inputs<P: AsRef<Path>>(path: P) -> Result<HashMap<String, String>>
where
    P: std::fmt::Debug,
{
    let file = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to open file: {:?}", path))?;
    let values: HashMap<String, serde_json::Value> = serde_json::from_str(&file)
        .with_context(|| format!("Failed to parse inputs json: {:?}", path))?;
    Ok(values
        .into_iter()
        .map(|(k, v)| (k, crate::substitute::display_value(&v)))
        .collect())
}

pub fn parse_config(s: &str) -> Result<Config, SequenceError> {
    let config: Config =
        serde_json::from_str(s).map_err(|e| SequenceError::Config(e.to_string()))?;
    check_config(&config)?;
    Ok(config)
}

/// Checks that have to pass before any node runs.
pub fn check_config(config: &Config) -> Result<(), SequenceError> {
    if config.nodes.is_empty() {
        return Err(SequenceError::Config(
            "config must contain a non-empty 'nodes' array".into(),
        ));
    }
    let mut seen = HashSet::new();
    for (i, node) in config.nodes.iter().enumerate() {
        if node.id.is_empty()
            || !node
                .id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(SequenceError::Config(format!(
                "node at index {}: id '{}' must match [a-zA-Z0-9_-]+",
                i, node.id
            )));
        }
        if !seen.insert(node.id.as_str()) {
            return Err(SequenceError::Config(format!(
                "duplicate node id: {}",
                node.id
            )));
        }
    }
    Ok(())
}
