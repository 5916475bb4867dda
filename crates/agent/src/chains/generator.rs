//! Answer generation from retrieved context

use crate::guard::CallGuard;
use crate::stream::{EventSink, TurnEvent};
use crate::NO_CONTEXT_ANSWER;
use futures::StreamExt;
use ragwise_common::documents::format_context;
use ragwise_common::llm::{CompletionService, Prompt};
use ragwise_common::{Document, Result};
use std::sync::Arc;

const SYSTEM: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.";

/// Free-text answer from a question and its documents
pub struct AnswerGenerator {
    llm: Arc<dyn CompletionService>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    fn prompt(question: &str, documents: &[Document]) -> Prompt {
        Prompt::new(SYSTEM, format!("Question: {}", question)).with_context(format_context(documents))
    }

    /// Generate an answer; an empty document set yields [`NO_CONTEXT_ANSWER`]
    pub async fn generate(&self, question: &str, documents: &[Document]) -> Result<String> {
        if documents.is_empty() {
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }
        self.llm.complete(&Self::prompt(question, documents)).await
    }

    /// Same answer as [`generate`](Self::generate), forwarding each chunk to
    /// `sink` as a token event while the full text accumulates
    ///
    /// `guard` bounds opening the stream and each wait for a chunk. Time spent
    /// handing tokens to a slow consumer is not counted.
    pub(crate) async fn generate_streaming(
        &self,
        question: &str,
        documents: &[Document],
        guard: &CallGuard,
        sink: &EventSink,
    ) -> Result<String> {
        if documents.is_empty() {
            sink.emit(TurnEvent::Token {
                text: NO_CONTEXT_ANSWER.to_string(),
            })
            .await;
            return Ok(NO_CONTEXT_ANSWER.to_string());
        }

        let prompt = Self::prompt(question, documents);
        let mut chunks = guard.call("generate", self.llm.complete_stream(&prompt)).await?;
        let mut answer = String::new();
        while let Some(chunk) = guard.call("generate", async { Ok(chunks.next().await) }).await? {
            let chunk = chunk?;
            if chunk.is_empty() {
                continue;
            }
            answer.push_str(&chunk);
            sink.emit(TurnEvent::Token { text: chunk }).await;
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCompletion;
    use ragwise_common::DocumentOrigin;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn docs() -> Vec<Document> {
        vec![Document::new("Task decomposition splits goals into subgoals.", DocumentOrigin::Vectorstore)
            .with_title("Agents")]
    }

    #[tokio::test]
    async fn test_generate_includes_context() {
        let llm = ScriptedCompletion::new().answers(&["Split the goal."]);
        let generator = AnswerGenerator::new(llm.clone());

        let answer = generator.generate("What is task decomposition?", &docs()).await.unwrap();
        assert_eq!(answer, "Split the goal.");

        let user = llm.last_user("generate").unwrap();
        assert!(user.contains("Question: What is task decomposition?"));
        assert!(user.contains("[1] Agents\nTask decomposition splits goals into subgoals."));
    }

    #[tokio::test]
    async fn test_empty_documents_skip_the_model() {
        let llm = ScriptedCompletion::new();
        let generator = AnswerGenerator::new(llm.clone());

        assert_eq!(generator.generate("q", &[]).await.unwrap(), NO_CONTEXT_ANSWER);
        assert_eq!(llm.calls("generate"), 0);
    }

    #[tokio::test]
    async fn test_streaming_matches_plain_generation() {
        let llm = ScriptedCompletion::new().answers(&["Split the goal into steps."]);
        let generator = AnswerGenerator::new(llm);
        let (tx, mut rx) = mpsc::channel(16);

        let answer = generator
            .generate_streaming(
                "q",
                &docs(),
                &CallGuard::new(CancellationToken::new(), Duration::from_secs(5)),
                &EventSink::new(tx),
            )
            .await
            .unwrap();
        assert_eq!(answer, "Split the goal into steps.");

        let mut streamed = String::new();
        while let Ok(TurnEvent::Token { text }) = rx.try_recv() {
            streamed.push_str(&text);
        }
        assert_eq!(streamed, answer);
    }
}
