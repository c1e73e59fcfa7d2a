//! Interactive question/answer loop over any line-oriented input.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use docchat_core::error::{Error, Result};
use docchat_core::types::ChatTurn;

use crate::generate::{build_context, GenerationOrchestrator};
use crate::retriever::Retriever;

pub const PROMPT: &str = "\nYou: ";
pub const GOODBYE: &str = "Exiting the chatbot. Goodbye!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingInput,
    Retrieving,
    Generating,
    Terminated,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Turns answered successfully.
    pub turns: usize,
    pub failures: usize,
}

/// `exit` or `quit`, any case, surrounding whitespace ignored.
pub fn is_exit_keyword(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

pub struct ChatSession<'a> {
    retriever: &'a Retriever,
    generator: &'a GenerationOrchestrator,
    cancel: CancellationToken,
    k: usize,
    state: SessionState,
}

impl<'a> ChatSession<'a> {
    pub fn new(retriever: &'a Retriever, generator: &'a GenerationOrchestrator, cancel: CancellationToken) -> Self {
        let k = retriever.config().k;
        Self { retriever, generator, cancel, k, state: SessionState::Idle }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn state(&self) -> SessionState { self.state }

    /// One retrieve-then-generate turn.
    pub async fn ask(&mut self, query: &str) -> Result<ChatTurn> {
        self.state = SessionState::Retrieving;
        let turn = self.turn(query).await;
        self.state = SessionState::Idle;
        turn
    }

    async fn turn(&mut self, query: &str) -> Result<ChatTurn> {
        let retrieved = self.retriever.retrieve(query, self.k).await?;
        self.state = SessionState::Generating;
        let answer = self.generator.answer(query, &retrieved).await?;
        Ok(ChatTurn { query: query.to_string(), context: build_context(&retrieved), answer })
    }

    /// Read queries until `exit`/`quit`, end of input or cancellation.
    ///
    /// Per-turn failures are reported on `output` and the loop carries on;
    /// only I/O errors on `input`/`output` end it early.
    pub async fn run<R, W>(&mut self, input: R, output: &mut W) -> std::io::Result<SessionSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut summary = SessionSummary::default();
        loop {
            self.state = SessionState::AwaitingInput;
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;

            let line = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            if is_exit_keyword(&line) {
                output.write_all(format!("{GOODBYE}\n").as_bytes()).await?;
                break;
            }
            let query = line.trim();
            if query.is_empty() {
                continue;
            }

            match self.ask(query).await {
                Ok(turn) => {
                    summary.turns += 1;
                    output.write_all(format!("\nAI: {}\n", turn.answer).as_bytes()).await?;
                }
                Err(Error::Cancelled { .. }) => break,
                Err(e) => {
                    summary.failures += 1;
                    warn!(error = %e, "turn failed");
                    output.write_all(format!("An error occurred while processing your request: {e}\n").as_bytes()).await?;
                }
            }
        }
        output.flush().await?;
        self.state = SessionState::Terminated;
        info!(turns = summary.turns, failures = summary.failures, "chat session ended");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_keywords() {
        for word in ["exit", "quit", "EXIT", "Quit", "  quit \t"] {
            assert!(is_exit_keyword(word), "{word:?}");
        }
        for word in ["", "exit now", "q", "quitting"] {
            assert!(!is_exit_keyword(word), "{word:?}");
        }
    }
}
