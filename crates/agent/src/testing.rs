//! Scripted collaborators for agent tests

use async_trait::async_trait;
use ragwise_common::config::AgentConfig;
use ragwise_common::llm::{CompletionService, OutputSchema, Prompt, TextStream};
use ragwise_common::{AppError, Document, DocumentOrigin, Result};
use ragwise_search::{DocumentStore, WebSearchProvider};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::Agent;

/// Key for free-text generation calls
const GENERATE: &str = "generate";

/// Completion service answering from per-schema scripts
///
/// Each structured schema name (and `generate` for free text) has a queue of
/// responses. The last response of a queue repeats once the rest are used.
/// Unscripted free-text calls answer `generated answer N`.
#[derive(Default)]
pub(crate) struct ScriptedCompletion {
    structured: Mutex<HashMap<String, VecDeque<Value>>>,
    answers: Mutex<VecDeque<String>>,
    calls: Mutex<HashMap<String, usize>>,
    prompts: Mutex<HashMap<String, Vec<Prompt>>>,
    stalled: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashMap<String, fn() -> AppError>>,
}

impl ScriptedCompletion {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(self: Arc<Self>, schema: &str, values: impl IntoIterator<Item = Value>) -> Arc<Self> {
        self.structured
            .lock()
            .unwrap()
            .entry(schema.to_string())
            .or_default()
            .extend(values);
        self
    }

    pub fn route(self: Arc<Self>, datasource: &str) -> Arc<Self> {
        self.script("route_query", [json!({ "datasource": datasource })])
    }

    pub fn relevance(self: Arc<Self>, verdicts: &[bool]) -> Arc<Self> {
        self.script("grade_documents", verdicts.iter().map(|v| json!({ "binary_score": v })))
    }

    pub fn grounded(self: Arc<Self>, verdicts: &[bool]) -> Arc<Self> {
        self.script("grade_hallucinations", verdicts.iter().map(|v| json!({ "binary_score": v })))
    }

    pub fn useful(self: Arc<Self>, verdicts: &[bool]) -> Arc<Self> {
        self.script("grade_answer", verdicts.iter().map(|v| json!({ "binary_score": v })))
    }

    pub fn answers(self: Arc<Self>, answers: &[&str]) -> Arc<Self> {
        self.answers.lock().unwrap().extend(answers.iter().map(|a| a.to_string()));
        self
    }

    /// Calls for `key` never complete
    pub fn stall(self: Arc<Self>, key: &str) -> Arc<Self> {
        self.stalled.lock().unwrap().insert(key.to_string());
        self
    }

    /// Calls for `key` take `delay` before answering
    pub fn delay(self: Arc<Self>, key: &str, delay: Duration) -> Arc<Self> {
        self.delays.lock().unwrap().insert(key.to_string(), delay);
        self
    }

    /// Calls for `key` fail with the given error
    pub fn fail(self: Arc<Self>, key: &str, error: fn() -> AppError) -> Arc<Self> {
        self.failing.lock().unwrap().insert(key.to_string(), error);
        self
    }

    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// Rendered user messages sent for `key`, oldest first
    pub fn users(&self, key: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .get(key)
            .map(|prompts| prompts.iter().map(Prompt::render_user).collect())
            .unwrap_or_default()
    }

    pub fn last_user(&self, key: &str) -> Option<String> {
        self.users(key).pop()
    }

    pub fn last_system(&self, key: &str) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .get(key)
            .and_then(|prompts| prompts.last())
            .map(|p| p.system.clone())
    }

    /// Record the call, then stall or fail if scripted to
    async fn enter(&self, key: &str, prompt: &Prompt) -> Result<usize> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(key.to_string()).or_default();
            *n += 1;
            *n
        };
        self.prompts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push(prompt.clone());

        let delay = self.delays.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let stalled = self.stalled.lock().unwrap().contains(key);
        if stalled {
            std::future::pending::<()>().await;
        }
        let failure = self.failing.lock().unwrap().get(key).copied();
        match failure {
            Some(error) => Err(error()),
            None => Ok(n),
        }
    }

    fn next_answer(&self, n: usize) -> String {
        let mut answers = self.answers.lock().unwrap();
        match answers.len() {
            0 => format!("generated answer {}", n),
            1 => answers[0].clone(),
            _ => answers.pop_front().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let n = self.enter(GENERATE, prompt).await?;
        Ok(self.next_answer(n))
    }

    async fn complete_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value> {
        self.enter(&schema.name, prompt).await?;
        let mut scripts = self.structured.lock().unwrap();
        let queue = scripts.get_mut(&schema.name).ok_or_else(|| AppError::Internal {
            message: format!("no script for {}", schema.name),
        })?;
        let value = if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() };
        value.ok_or_else(|| AppError::Internal {
            message: format!("script for {} is empty", schema.name),
        })
    }

    async fn complete_stream(&self, prompt: &Prompt) -> Result<TextStream> {
        let n = self.enter(GENERATE, prompt).await?;
        let chunks: Vec<Result<String>> = self
            .next_answer(n)
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Store returning its documents in insertion order
pub(crate) struct StubStore {
    documents: Vec<Document>,
    fail: bool,
    searches: AtomicUsize,
}

impl StubStore {
    pub fn with_documents(contents: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            documents: contents
                .iter()
                .map(|c| Document::new(*c, DocumentOrigin::Vectorstore))
                .collect(),
            fail: false,
            searches: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            documents: Vec::new(),
            fail: true,
            searches: AtomicUsize::new(0),
        })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for StubStore {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<Document>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::upstream("store", "index offline"));
        }
        Ok(self.documents.iter().take(k).cloned().collect())
    }

    async fn index(&self, documents: Vec<Document>) -> Result<usize> {
        Ok(documents.len())
    }

    async fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Web search returning fixed results
pub(crate) struct StubWebSearch {
    documents: Vec<Document>,
    searches: AtomicUsize,
}

impl StubWebSearch {
    pub fn with_results(contents: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            documents: contents
                .iter()
                .map(|c| Document::new(*c, DocumentOrigin::WebSearch).with_source("https://web.example"))
                .collect(),
            searches: AtomicUsize::new(0),
        })
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearchProvider for StubWebSearch {
    async fn search(&self, _query: &str) -> Result<Vec<Document>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.clone())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

pub(crate) fn agent_config() -> AgentConfig {
    AgentConfig {
        vectorstore_topics: "agents, prompt engineering and adversarial attacks".to_string(),
        ..AgentConfig::default()
    }
}

pub(crate) fn agent(
    llm: Arc<ScriptedCompletion>,
    store: Arc<StubStore>,
    web: Arc<StubWebSearch>,
    config: AgentConfig,
) -> Arc<Agent> {
    Arc::new(Agent::new(llm, store, web, config, 4))
}
