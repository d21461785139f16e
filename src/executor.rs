//! Sequence execution.
//!
//! Nodes run strictly in order, one request at a time. For each node:
//! prompts are collected, URL/headers/body are substituted, conditions decide
//! whether to skip, the request is sent, the response is validated and then
//! stored under the node id for later references.

use crate::{
    conditions::evaluate_conditions,
    error::SequenceError,
    fs::check_config,
    interact::{BrowserLauncher, InputCollector, NoBrowser, NoInput},
    state::ExecutionState,
    substitute::{display_value, DynamicValues, Substitutor, SystemValues},
    transport::{HttpRequest, RequestBody, Transport},
    types::{BodyFormat, Config, Defaults, Node, StoredResponse},
    validation::{effective_validations, validate_response},
};
use log::{debug, info, warn};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

/// Request timeout when neither the node nor the defaults give one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    Executed { id: String, status: u16 },
    Skipped { id: String },
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunReport {
    /// One entry per node, in config order.
    pub outcomes: Vec<NodeOutcome>,
    pub responses: HashMap<String, StoredResponse>,
}

impl RunReport {
    pub fn executed(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o {
            NodeOutcome::Executed { id, .. } => Some(id.as_str()),
            NodeOutcome::Skipped { .. } => None,
        })
    }
}

/// Runs sequences against a transport. Prompt answers, browser launching
/// and dynamic values can be swapped out; by default prompts get no answers,
/// browsers are not opened and `$guid`/`$timestamp` are real.
pub struct SequenceRunner<T: Transport> {
    transport: T,
    inputs: Box<dyn InputCollector>,
    browser: Box<dyn BrowserLauncher>,
    dynamic: Box<dyn DynamicValues>,
}

impl<T: Transport> SequenceRunner<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            inputs: Box::new(NoInput),
            browser: Box::new(NoBrowser),
            dynamic: Box::new(SystemValues),
        }
    }

    pub fn with_inputs(mut self, inputs: impl InputCollector + 'static) -> Self {
        self.inputs = Box::new(inputs);
        self
    }

    pub fn with_browser(mut self, browser: impl BrowserLauncher + 'static) -> Self {
        self.browser = Box::new(browser);
        self
    }

    pub fn with_dynamic_values(mut self, dynamic: impl DynamicValues + 'static) -> Self {
        self.dynamic = Box::new(dynamic);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute every node of `config`. Stops at the first transport or
    /// validation failure; skipped nodes do not stop the run.
    pub fn run(&mut self, config: &Config) -> Result<RunReport, SequenceError> {
        check_config(config)?;
        let mut state = ExecutionState::new(config.variables.clone());
        let mut outcomes = Vec::with_capacity(config.nodes.len());
        for (i, node) in config.nodes.iter().enumerate() {
            info!(
                "[{}/{}] {} ({})",
                i + 1,
                config.nodes.len(),
                node.name,
                node.id
            );
            let outcome = self.process_node(config, node, &mut state)?;
            outcomes.push(outcome);
        }
        Ok(RunReport {
            outcomes,
            responses: state.into_responses(),
        })
    }

    fn process_node(
        &mut self,
        config: &Config,
        node: &Node,
        state: &mut ExecutionState,
    ) -> Result<NodeOutcome, SequenceError> {
        // Inputs are scoped to the node that prompted for them.
        let answers = match &node.user_prompts {
            Some(prompts) => self
                .inputs
                .collect(node, prompts)
                .map_err(|source| SequenceError::Input {
                    node_id: node.id.clone(),
                    source,
                })?,
            None => HashMap::new(),
        };
        state.begin_prompts(answers);

        let timestamp = self.dynamic.timestamp_millis();
        let request = {
            let mut sub = Substitutor::new(state, self.dynamic.as_mut(), timestamp);
            let url = sub.apply_str(&node.url);
            let headers: BTreeMap<String, String> = merge_headers(node, &config.defaults)
                .into_iter()
                .map(|(k, v)| {
                    let v = sub.apply_str(&v);
                    (k, v)
                })
                .collect();
            let body = node.body.as_ref().map(|b| sub.apply(b));

            if !evaluate_conditions(&node.conditions, state, &mut sub) {
                info!("Skipping {}: conditions not met", node.id);
                return Ok(NodeOutcome::Skipped {
                    id: node.id.clone(),
                });
            }
            build_request(node, &config.defaults, url, headers, body)
        };

        if config.enable_debug {
            debug!(
                "Request {} {} headers={:?} body={:?}",
                request.method, request.url, request.headers, request.body
            );
        }

        let raw = self
            .transport
            .send(&request)
            .map_err(|source| SequenceError::Transport {
                node_id: node.id.clone(),
                source,
            })?;
        let response = StoredResponse {
            body: parse_body(&raw.body),
            status_code: raw.status,
        };
        if config.enable_debug {
            debug!(
                "Response {} status={} body={}",
                node.id, response.status_code, response.body
            );
        }

        {
            let validations = effective_validations(node, &config.defaults);
            let mut sub = Substitutor::new(state, self.dynamic.as_mut(), timestamp);
            validate_response(&validations, &response, &mut sub).map_err(|failure| {
                SequenceError::Validation {
                    node_id: node.id.clone(),
                    failure,
                }
            })?;
            if config.enable_debug {
                debug!("{} validation(s) passed for {}", validations.len(), node.id);
            }
        }

        let status = response.status_code;
        state.store_response(&node.id, response);

        if let Some(path) = &node.launch_browser {
            match state.response(&node.id).and_then(|r| r.field(path)) {
                Some(url) => self.browser.launch(&display_value(&url)),
                None => warn!(
                    "No browser URL at {} in response of {}",
                    path, node.id
                ),
            }
        }

        Ok(NodeOutcome::Executed {
            id: node.id.clone(),
            status,
        })
    }
}

/// Default headers (unless skipped) overlaid with the node's headers.
pub fn merge_headers(node: &Node, defaults: &Defaults) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    if !node.skip_default_headers {
        headers.extend(defaults.headers.clone());
    }
    headers.extend(node.headers.clone());
    headers
}

/// Prefix `baseUrl` unless `url` is already absolute.
pub fn resolve_url(url: &str, base_url: Option<&str>) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match base_url {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
        None => url.to_string(),
    }
}

fn build_request(
    node: &Node,
    defaults: &Defaults,
    url: String,
    mut headers: BTreeMap<String, String>,
    body: Option<Value>,
) -> HttpRequest {
    let body = body.map(|b| match node.body_format {
        BodyFormat::Json => match b {
            Value::String(s) => RequestBody::Text(s),
            other => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    headers.insert("Content-Type".into(), "application/json".into());
                }
                RequestBody::Json(other.to_string())
            }
        },
        BodyFormat::FormUrlencoded => match b {
            Value::Object(obj) => RequestBody::Form(
                obj.iter()
                    .map(|(k, v)| (k.clone(), display_value(v)))
                    .collect(),
            ),
            other => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    headers.insert(
                        "Content-Type".into(),
                        "application/x-www-form-urlencoded".into(),
                    );
                }
                RequestBody::Text(display_value(&other))
            }
        },
    });
    let timeout = node
        .timeout
        .or(defaults.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    HttpRequest {
        method: node.method,
        url: resolve_url(&url, defaults.base_url.as_deref()),
        headers,
        body,
        timeout: Duration::from_secs(timeout),
    }
}

/// JSON when it parses, the raw text otherwise, null when empty.
fn parse_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
