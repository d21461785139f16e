use crate::types::StoredResponse;
use log::warn;
use serde_json::Value;
use std::collections::HashMap;

/// Per-run state. One instance per sequence run; nothing in it outlives the run.
#[derive(Debug, Default)]
pub struct ExecutionState {
    variables: HashMap<String, Value>,
    responses: HashMap<String, StoredResponse>,
    user_inputs: HashMap<String, String>,
}

impl ExecutionState {
    pub fn new(variables: HashMap<String, Value>) -> Self {
        Self {
            variables,
            ..Default::default()
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn input(&self, name: &str) -> Option<&str> {
        self.user_inputs.get(name).map(String::as_str)
    }

    pub fn response(&self, node_id: &str) -> Option<&StoredResponse> {
        self.responses.get(node_id)
    }

    pub fn responses(&self) -> &HashMap<String, StoredResponse> {
        &self.responses
    }

    /// Replace the inputs of the previous prompting node with a fresh set.
    pub fn begin_prompts(&mut self, inputs: HashMap<String, String>) {
        self.user_inputs = inputs;
    }

    pub fn store_response(&mut self, node_id: &str, response: StoredResponse) {
        if self
            .responses
            .insert(node_id.to_string(), response)
            .is_some()
        {
            warn!("Response for node {} was overwritten", node_id);
        }
    }

    pub fn into_responses(self) -> HashMap<String, StoredResponse> {
        self.responses
    }
}
