#![allow(dead_code)]

use flowsphere::{
    interact::BrowserLauncher,
    transport::{HttpRequest, HttpResponse, Transport, TransportError},
    Config,
};
use serde_json::Value;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

enum Reply {
    Respond(u16, String),
    Fail(String),
}

/// In-memory transport: replies are scripted per URL, every request is kept.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, Reply>,
    pub requests: Vec<HttpRequest>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, status: u16, body: Value) -> Self {
        self.replies
            .insert(url.to_string(), Reply::Respond(status, body.to_string()));
        self
    }

    pub fn on_text(mut self, url: &str, status: u16, body: &str) -> Self {
        self.replies
            .insert(url.to_string(), Reply::Respond(status, body.to_string()));
        self
    }

    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.replies
            .insert(url.to_string(), Reply::Fail(message.to_string()));
        self
    }

    pub fn urls(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.url.as_str()).collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.push(request.clone());
        match self.replies.get(&request.url) {
            Some(Reply::Respond(status, body)) => Ok(HttpResponse {
                status: *status,
                body: body.clone(),
            }),
            Some(Reply::Fail(message)) => Err(TransportError::Connection(message.clone())),
            None => Err(TransportError::Connection(format!(
                "no reply scripted for {}",
                request.url
            ))),
        }
    }
}

/// Browser launcher that only remembers the URLs it was given.
#[derive(Default, Clone)]
pub struct RecordingBrowser {
    pub opened: Rc<RefCell<Vec<String>>>,
}

impl BrowserLauncher for RecordingBrowser {
    fn launch(&mut self, url: &str) {
        self.opened.borrow_mut().push(url.to_string());
    }
}

pub fn config(v: Value) -> Config {
    serde_json::from_value(v).expect("test config must deserialize")
}
