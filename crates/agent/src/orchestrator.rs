//! Turn orchestrator
//!
//! Drives a [`SessionState`] through the state machine in [`crate::graph`]:
//! each step runs its chain, reports an [`Outcome`], and the transition
//! table picks the next step. Every collaborator call is bounded by the
//! operation timeout and the turn's cancellation token; the turn as a whole
//! is bounded by the turn timeout.
//!
//! Generation is capped at `max_generation_attempts` calls per turn. A grade
//! failing on the last allowed attempt ends the turn with
//! [`TurnStatus::RetryBudgetExceeded`] and the configured fallback answer.

use crate::chains::{
    apply_policy, AnswerGenerator, AnswerGrader, Datasource, HallucinationGrader, RelevanceGrader, Router,
};
use crate::graph::{self, Node, Outcome};
use crate::guard::CallGuard;
use crate::retriever::Retriever;
use crate::state::{Question, SessionState};
use crate::stream::{EventSink, TurnEvent, TurnStream};
use crate::UNGROUNDED_ANSWER_SENTINEL;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use ragwise_common::config::{AgentConfig, BudgetFallback};
use ragwise_common::llm::CompletionService;
use ragwise_common::{metrics, AppError, Document, Result};
use ragwise_search::{DocumentStore, WebSearchProvider};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How a completed turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The answer passed both graders
    Answered,
    /// Generation attempts ran out; the answer is the configured fallback
    RetryBudgetExceeded,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Answered => "answered",
            TurnStatus::RetryBudgetExceeded => "retry_budget_exceeded",
        }
    }
}

/// Result of a completed turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutput {
    pub question: Question,
    pub answer: String,
    pub status: TurnStatus,
    /// Documents the final answer was generated from
    pub documents: Vec<Document>,
    pub path: Vec<Node>,
    pub generate_attempts: u32,
}

/// Adaptive retrieval-augmented answering agent
///
/// Holds no per-turn state; one instance serves any number of concurrent turns.
pub struct Agent {
    router: Router,
    retriever: Retriever,
    relevance: RelevanceGrader,
    web_search: Arc<dyn WebSearchProvider>,
    generator: AnswerGenerator,
    hallucination: HallucinationGrader,
    answer: AnswerGrader,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        store: Arc<dyn DocumentStore>,
        web_search: Arc<dyn WebSearchProvider>,
        config: AgentConfig,
        top_k: usize,
    ) -> Self {
        Self {
            router: Router::new(llm.clone(), &config.vectorstore_topics),
            retriever: Retriever::new(store, top_k),
            relevance: RelevanceGrader::new(llm.clone()),
            web_search,
            generator: AnswerGenerator::new(llm.clone()),
            hallucination: HallucinationGrader::new(llm.clone()),
            answer: AnswerGrader::new(llm),
            config,
        }
    }

    /// Answer a question
    pub async fn run(&self, question: &str) -> Result<TurnOutput> {
        self.run_with_cancellation(question, CancellationToken::new()).await
    }

    /// Answer a question, stopping with `Cancelled` once `token` fires
    pub async fn run_with_cancellation(&self, question: &str, token: CancellationToken) -> Result<TurnOutput> {
        self.execute(question, token, &EventSink::disabled()).await
    }

    /// Answer a question as a stream of progress events
    ///
    /// Must be called within a tokio runtime. Dropping the stream cancels the turn.
    pub fn stream(self: &Arc<Self>, question: impl Into<String>) -> TurnStream {
        self.stream_with_cancellation(question, CancellationToken::new())
    }

    pub fn stream_with_cancellation(
        self: &Arc<Self>,
        question: impl Into<String>,
        token: CancellationToken,
    ) -> TurnStream {
        let (tx, rx) = mpsc::channel(self.config.stream_buffer.max(1));
        let question = question.into();
        let agent = Arc::clone(self);
        let turn_token = token.clone();

        tokio::spawn(async move {
            let sink = EventSink::new(tx);
            let terminal = match agent.execute(&question, turn_token, &sink).await {
                Ok(output) => TurnEvent::Completed { output },
                Err(e) => TurnEvent::from_error(&e),
            };
            sink.emit(terminal).await;
        });

        TurnStream::new(rx, token.drop_guard())
    }

    #[instrument(skip(self, token, sink), fields(streaming = sink.is_enabled()))]
    async fn execute(&self, question: &str, token: CancellationToken, sink: &EventSink) -> Result<TurnOutput> {
        let question = Question::new(question)?;
        let start = Instant::now();
        let guard = CallGuard::new(token, self.config.operation_timeout());
        let mut state = SessionState::new(question);

        let turn_timeout = self.config.turn_timeout();
        let result = match tokio::time::timeout(turn_timeout, self.drive(&mut state, &guard, sink)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout {
                operation: "turn".to_string(),
                timeout_ms: turn_timeout.as_millis() as u64,
            }),
        };
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(outcome) => {
                let output = self.finish(state, outcome);
                metrics::record_turn(elapsed, output.status.as_str(), output.generate_attempts);
                info!(
                    status = output.status.as_str(),
                    generate_attempts = output.generate_attempts,
                    path = ?output.path,
                    duration_ms = (elapsed * 1000.0) as u64,
                    "Turn complete"
                );
                Ok(output)
            }
            Err(e) => {
                metrics::record_turn(elapsed, "error", state.generate_attempts);
                warn!(error = %e, path = ?state.path, "Turn failed");
                Err(e)
            }
        }
    }

    /// Run steps until END, returning the outcome that led there
    async fn drive(&self, state: &mut SessionState, guard: &CallGuard, sink: &EventSink) -> Result<Outcome> {
        let mut node = graph::START;
        let mut last_outcome = None;

        loop {
            guard.check()?;
            state.path.push(node);
            metrics::record_node(node.as_str());
            sink.emit(TurnEvent::NodeEntered { node }).await;

            let outcome = match node {
                Node::Route => self.route(state, guard).await?,
                Node::Retrieve => self.retrieve(state, guard).await?,
                Node::GradeDocuments => self.grade_documents(state, guard).await?,
                Node::WebSearch => self.web_search(state, guard).await?,
                Node::Generate => self.generate(state, guard, sink).await?,
                Node::End => {
                    return last_outcome.ok_or_else(|| AppError::Internal {
                        message: "turn reached END without an outcome".to_string(),
                    })
                }
            };

            let next = graph::next(node, outcome)?;
            debug!(from = %node, %outcome, to = %next, "Transition");
            last_outcome = Some(outcome);
            node = next;
        }
    }

    async fn route(&self, state: &mut SessionState, guard: &CallGuard) -> Result<Outcome> {
        let datasource = guard.call("route", self.router.route(state.question().as_str())).await?;
        Ok(match datasource {
            Datasource::Vectorstore => Outcome::RoutedToVectorstore,
            Datasource::Websearch => Outcome::RoutedToWebSearch,
        })
    }

    async fn retrieve(&self, state: &mut SessionState, guard: &CallGuard) -> Result<Outcome> {
        let documents = guard
            .call("retrieve", self.retriever.retrieve(state.question().as_str()))
            .await?;
        state.documents = Some(documents);
        Ok(Outcome::Retrieved)
    }

    async fn grade_documents(&self, state: &mut SessionState, guard: &CallGuard) -> Result<Outcome> {
        let documents = state.documents.take().ok_or_else(|| AppError::Internal {
            message: "GRADE_DOCUMENTS reached with undefined documents".to_string(),
        })?;

        let question = state.question().as_str();
        // Boxed before buffering so the turn future stays Send
        let grades: Vec<BoxFuture<'_, Result<bool>>> = documents
            .iter()
            .map(|doc| guard.call("grade_document", self.relevance.grade(question, doc)).boxed())
            .collect();
        let verdicts: Vec<bool> = stream::iter(grades)
            .buffered(self.config.grading_concurrency.max(1))
            .try_collect()
            .await?;

        let verdict = apply_policy(
            documents,
            &verdicts,
            self.config.relevance_policy,
            self.config.min_relevant_documents,
        );
        info!(
            graded = verdicts.len(),
            kept = verdict.kept.len(),
            needs_web_search = verdict.needs_web_search,
            "Documents graded"
        );

        state.documents = Some(verdict.kept);
        state.needs_web_search = verdict.needs_web_search;

        // The outgoing edge consumes the flag
        Ok(if std::mem::take(&mut state.needs_web_search) {
            Outcome::DocumentsInsufficient
        } else {
            Outcome::DocumentsRelevant
        })
    }

    async fn web_search(&self, state: &mut SessionState, guard: &CallGuard) -> Result<Outcome> {
        let documents = guard
            .call("web_search", self.web_search.search(state.question().as_str()))
            .await?;
        info!(provider = self.web_search.name(), results = documents.len(), "Web search complete");
        state.documents = Some(documents);
        Ok(Outcome::Searched)
    }

    async fn generate(&self, state: &mut SessionState, guard: &CallGuard, sink: &EventSink) -> Result<Outcome> {
        state.generate_attempts += 1;
        let attempt = state.generate_attempts;

        let Some(documents) = state.documents.as_deref() else {
            return Err(AppError::Internal {
                message: "GENERATE reached with undefined documents".to_string(),
            });
        };
        let question = state.question().as_str();

        sink.emit(TurnEvent::GenerationStarted { attempt }).await;
        let generation = if sink.is_enabled() {
            // Timed per chunk inside; waiting on a slow consumer is not the model's time
            self.generator.generate_streaming(question, documents, guard, sink).await?
        } else {
            guard.call("generate", self.generator.generate(question, documents)).await?
        };

        // Usefulness is only judged for grounded answers
        let grounded = guard
            .call("grade_hallucinations", self.hallucination.grade(documents, &generation))
            .await?;
        let verdict = if !grounded {
            Outcome::NotSupported
        } else if guard
            .call("grade_answer", self.answer.grade(question, &generation))
            .await?
        {
            Outcome::Useful
        } else {
            Outcome::NotUseful
        };

        state.generation = Some(generation);

        let outcome = match verdict {
            Outcome::Useful => Outcome::Useful,
            failed if attempt >= self.config.max_generation_attempts => {
                warn!(
                    attempt,
                    max_attempts = self.config.max_generation_attempts,
                    last_verdict = %failed,
                    "Generation budget exhausted"
                );
                Outcome::RetryBudgetExhausted
            }
            Outcome::NotUseful => {
                // Escalating to web search discards the answer
                state.generation = None;
                Outcome::NotUseful
            }
            other => other,
        };
        let kept = match outcome {
            Outcome::Useful => true,
            Outcome::RetryBudgetExhausted => self.config.budget_fallback == BudgetFallback::BestEffort,
            _ => false,
        };
        if !kept {
            sink.emit(TurnEvent::GenerationDiscarded { attempt }).await;
        }

        debug!(attempt, grounded, %outcome, kept, "Generation graded");
        Ok(outcome)
    }

    fn finish(&self, state: SessionState, outcome: Outcome) -> TurnOutput {
        let question = state.question().clone();
        let (status, answer) = match outcome {
            Outcome::RetryBudgetExhausted => {
                let answer = match self.config.budget_fallback {
                    BudgetFallback::Sentinel => None,
                    BudgetFallback::BestEffort => state.generation,
                };
                (
                    TurnStatus::RetryBudgetExceeded,
                    answer.unwrap_or_else(|| UNGROUNDED_ANSWER_SENTINEL.to_string()),
                )
            }
            _ => (TurnStatus::Answered, state.generation.unwrap_or_default()),
        };

        TurnOutput {
            question,
            answer,
            status,
            documents: state.documents.unwrap_or_default(),
            path: state.path,
            generate_attempts: state.generate_attempts,
        }
    }
}
