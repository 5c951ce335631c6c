//! Test doubles shared across module tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::ai::provider::{Generation, GenerationParams, TextGenerator, task_name};
use crate::sql::{QueryExecutor, QueryRows};
use crate::types::{QuorumError, Result};

#[derive(Default)]
struct Script {
    replies: HashMap<String, String>,
    failing: Vec<String>,
    failing_when: Vec<(String, String)>,
    calls: Vec<String>,
}

/// Generator answering by the prompt's task header
///
/// Clones share the script and the call log.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<Script>>,
    default_reply: Arc<String>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            script: Arc::default(),
            default_reply: Arc::new("No structured content.".to_string()),
        }
    }

    pub fn on(self, task: &str, reply: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .insert(task.to_string(), reply.to_string());
        self
    }

    pub fn fail_on(self, task: &str) -> Self {
        self.script.lock().unwrap().failing.push(task.to_string());
        self
    }

    /// Fail `task` only for prompts containing `needle`
    pub fn fail_when(self, task: &str, needle: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .failing_when
            .push((task.to_string(), needle.to_string()));
        self
    }

    pub fn with_default(mut self, reply: &str) -> Self {
        self.default_reply = Arc::new(reply.to_string());
        self
    }

    pub fn calls_for(&self, task: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|t| *t == task)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<Generation> {
        let task = task_name(prompt).unwrap_or("").to_string();
        let mut script = self.script.lock().unwrap();
        script.calls.push(task.clone());
        let targeted = script
            .failing_when
            .iter()
            .any(|(t, needle)| *t == task && prompt.contains(needle.as_str()));
        if targeted || script.failing.contains(&task) {
            return Err(QuorumError::generation(format!("scripted failure: {}", task)));
        }
        let reply = script
            .replies
            .get(&task)
            .cloned()
            .unwrap_or_else(|| self.default_reply.to_string());
        Ok(Generation::from_raw(&reply))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Generator whose every call fails
pub struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<Generation> {
        Err(QuorumError::generation("generator unavailable"))
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn model(&self) -> &str {
        "none"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Executor returning fixed rows and recording every statement
pub struct StaticExecutor {
    rows: Vec<Value>,
    calls: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl StaticExecutor {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            calls: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for StaticExecutor {
    async fn execute(&self, sql: &str, _timeout: Duration) -> Result<QueryRows> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(QueryRows::new(self.rows.clone()))
    }

    fn source_id(&self) -> &str {
        "static"
    }
}

/// Executor that sleeps before answering
pub struct SlowExecutor {
    delay: Duration,
}

impl SlowExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl QueryExecutor for SlowExecutor {
    async fn execute(&self, _sql: &str, _timeout: Duration) -> Result<QueryRows> {
        tokio::time::sleep(self.delay).await;
        Ok(QueryRows::default())
    }

    fn source_id(&self) -> &str {
        "slow"
    }
}
