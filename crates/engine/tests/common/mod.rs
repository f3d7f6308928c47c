#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Shared test double for the list service.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

use pagefeed_engine::client::ListClient;
use pagefeed_engine::error::{Error, Result};

/// In-memory stand-in for the remote list service.
///
/// Responses are served either in scripted order or by URL-substring
/// routing; every request (and POST payload) is recorded for assertions.
pub struct MockService {
    scripted: Mutex<VecDeque<Value>>,
    routes: Mutex<Vec<(String, Value)>>,
    pub requests: Mutex<Vec<String>>,
    pub posts: Mutex<Vec<(String, Value)>>,
}

impl MockService {
    pub fn scripted(bodies: Vec<Value>) -> Self {
        Self {
            scripted: Mutex::new(bodies.into()),
            routes: Mutex::new(Vec::new()),
            requests: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn routed(routes: Vec<(&str, Value)>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            routes: Mutex::new(
                routes
                    .into_iter()
                    .map(|(pattern, body)| (pattern.to_string(), body))
                    .collect(),
            ),
            requests: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ListClient for MockService {
    async fn get_json(&self, url: &str) -> Result<Value> {
        self.requests.lock().push(url.to_string());

        if let Some(body) = self.scripted.lock().pop_front() {
            return Ok(body);
        }

        let routes = self.routes.lock();
        for (pattern, body) in routes.iter() {
            if url.contains(pattern.as_str()) {
                return Ok(body.clone());
            }
        }

        Err(Error::Status {
            status: 404,
            body: format!("no route for {url}"),
        })
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.posts.lock().push((url.to_string(), body.clone()));
        Ok(serde_json::json!({"Id": 1, "created": true}))
    }

    fn site_url(&self) -> &str {
        "https://example.test/site"
    }
}
