use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;

use crate::engine::{ModelClient, ModelError};
use crate::prompt::{REQUEST_END, REQUEST_START};

/// Reply used for descriptions that ask to exercise the failure path.
pub const NOT_JSON_REPLY: &str = "This is not valid JSON to test error handling";

enum Reply {
    Spec(Value),
    Text(&'static str),
}

struct Canned {
    name: &'static str,
    patterns: Vec<Regex>,
    reply: Reply,
}

/// Offline [`ModelClient`] that answers from a fixed table of replies keyed
/// by regular expressions over the user's description.
///
/// Used when no provider is configured (`useMock`) and for demos. Matching is
/// case-insensitive; the first matching entry wins and unmatched
/// descriptions get a two-node server/database diagram.
pub struct CannedClient {
    table: Vec<Canned>,
    delay: Duration,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(&format!("(?is){p}")).ok())
        .collect()
}

impl Default for CannedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CannedClient {
    pub fn new() -> Self {
        let table = vec![
            Canned {
                name: "not_json",
                patterns: compile(&[r"test\s*error", r"invalid\s*json"]),
                reply: Reply::Text(NOT_JSON_REPLY),
            },
            Canned {
                name: "basic_web_app",
                patterns: compile(&[
                    r"load\s*balancer.*ec2.*database",
                    r"web\s*application.*server.*database",
                    r"application\s*load\s*balancer.*web.*rds",
                ]),
                reply: Reply::Spec(json!({
                    "nodes": [
                        {"type": "LoadBalancer", "name": "ALB", "properties": {"scheme": "internet-facing"}},
                        {"type": "EC2", "name": "WebServer1", "properties": {"instance_type": "t3.micro"}},
                        {"type": "EC2", "name": "WebServer2", "properties": {"instance_type": "t3.micro"}},
                        {"type": "RDS", "name": "Database", "properties": {"engine": "postgres"}}
                    ],
                    "connections": [
                        {"from": "ALB", "to": "WebServer1", "label": "http"},
                        {"from": "ALB", "to": "WebServer2", "label": "http"},
                        {"from": "WebServer1", "to": "Database", "label": "sql"},
                        {"from": "WebServer2", "to": "Database", "label": "sql"}
                    ],
                    "clusters": [
                        {"name": "Web Tier", "nodes": ["WebServer1", "WebServer2"]}
                    ]
                })),
            },
            Canned {
                name: "microservices",
                patterns: compile(&[
                    r"microservice.*api\s*gateway.*queue",
                    r"authentication.*payment.*order.*service",
                    r"api\s*gateway.*sqs.*services",
                ]),
                reply: Reply::Spec(json!({
                    "nodes": [
                        {"type": "LoadBalancer", "name": "APIGateway", "properties": {}},
                        {"type": "Lambda", "name": "AuthService", "properties": {"runtime": "python3.12"}},
                        {"type": "Lambda", "name": "PaymentService", "properties": {"runtime": "python3.12"}},
                        {"type": "Lambda", "name": "OrderService", "properties": {"runtime": "python3.12"}},
                        {"type": "SQS", "name": "MessageQueue", "properties": {}},
                        {"type": "RDS", "name": "SharedDB", "properties": {}}
                    ],
                    "connections": [
                        {"from": "APIGateway", "to": "AuthService", "label": "route"},
                        {"from": "APIGateway", "to": "PaymentService", "label": "route"},
                        {"from": "APIGateway", "to": "OrderService", "label": "route"},
                        {"from": "OrderService", "to": "MessageQueue", "label": "publish"},
                        {"from": "MessageQueue", "to": "PaymentService", "label": "subscribe"},
                        {"from": "AuthService", "to": "SharedDB", "label": "query"},
                        {"from": "PaymentService", "to": "SharedDB", "label": "query"},
                        {"from": "OrderService", "to": "SharedDB", "label": "query"}
                    ],
                    "clusters": [
                        {"name": "Microservices", "nodes": ["AuthService", "PaymentService", "OrderService"]}
                    ]
                })),
            },
            Canned {
                name: "simple_storage",
                patterns: compile(&[r"s3.*lambda", r"storage.*function", r"bucket.*serverless"]),
                reply: Reply::Spec(json!({
                    "nodes": [
                        {"type": "S3", "name": "DataBucket", "properties": {"versioning": true}},
                        {"type": "Lambda", "name": "ProcessFunction", "properties": {"runtime": "python3.12"}},
                        {"type": "SQS", "name": "EventQueue", "properties": {}}
                    ],
                    "connections": [
                        {"from": "DataBucket", "to": "EventQueue", "label": "event"},
                        {"from": "EventQueue", "to": "ProcessFunction", "label": "trigger"}
                    ],
                    "clusters": []
                })),
            },
        ];

        Self {
            table,
            delay: Duration::ZERO,
        }
    }

    /// Sleep before every reply, to mimic network latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn reply_for(&self, request: &str) -> String {
        for entry in &self.table {
            if entry.patterns.iter().any(|p| p.is_match(request)) {
                tracing::info!(pattern = entry.name, "matched canned reply");
                return match &entry.reply {
                    Reply::Spec(value) => serde_json::to_string_pretty(value).unwrap_or_default(),
                    Reply::Text(text) => text.to_string(),
                };
            }
        }

        tracing::info!("no canned pattern matched, using default reply");
        let fallback = json!({
            "nodes": [
                {"type": "EC2", "name": "Server1", "properties": {}},
                {"type": "RDS", "name": "Database", "properties": {}}
            ],
            "connections": [
                {"from": "Server1", "to": "Database", "label": "queries"}
            ],
            "clusters": []
        });
        serde_json::to_string_pretty(&fallback).unwrap_or_default()
    }
}

/// The user's text inside the request markers, or the whole prompt when the
/// markers are missing.
fn extract_request(prompt: &str) -> &str {
    let Some(start) = prompt.find(REQUEST_START) else {
        return prompt;
    };
    let body = &prompt[start + REQUEST_START.len()..];
    let body = body.find(REQUEST_END).map_or(body, |end| &body[..end]);
    // Skip the instruction line that precedes the description.
    body.split_once(':').map_or(body, |(_, rest)| rest).trim()
}

#[async_trait]
impl ModelClient for CannedClient {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.reply_for(extract_request(prompt)))
    }

    fn describe(&self) -> String {
        "mock (canned replies)".to_string()
    }
}
