use crate::models::RetrievalHit;
use crate::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const EXPLAIN_INSTRUCTION: &str =
    "Provide a clear, instructor-style explanation suitable for a college-level course.";
pub const HINT_INSTRUCTION: &str = "Give a short hint that helps the student think, but do not provide a full answer. Ask a guiding question.";
pub const EXAM_PREP_INSTRUCTION: &str = "Answer concisely and precisely. Use correct terminology. Structure the response as bullet points when appropriate.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseMode {
    #[default]
    Explain,
    Hint,
    ExamPrep,
}

impl ResponseMode {
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Explain => EXPLAIN_INSTRUCTION,
            Self::Hint => HINT_INSTRUCTION,
            Self::ExamPrep => EXAM_PREP_INSTRUCTION,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Explain => "Explain",
            Self::Hint => "Hint",
            Self::ExamPrep => "Exam Prep",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .to_lowercase()
            .chars()
            .filter(|ch| ch.is_alphanumeric())
            .collect();

        match normalized.as_str() {
            "explain" => Ok(Self::Explain),
            "hint" => Ok(Self::Hint),
            "examprep" | "exam" => Ok(Self::ExamPrep),
            _ => Err(format!(
                "unknown response mode `{value}` (expected explain, hint or exam-prep)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPrompt(String);

impl SystemPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The whole file becomes the system instruction, untouched.
    pub fn load(path: &Path) -> Result<Self, QueryError> {
        Ok(Self(std::fs::read_to_string(path)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A fully assembled model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
}

/// How the student's question is framed before it reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryContext<'a> {
    /// The question is sent as typed.
    Plain,
    /// The question is prefixed with a mode instruction and the rolling summary.
    Session {
        mode: ResponseMode,
        summary: &'a str,
    },
}

pub struct PromptAssembler {
    system: SystemPrompt,
}

impl PromptAssembler {
    pub fn new(system: SystemPrompt) -> Self {
        Self { system }
    }

    pub fn assemble(
        &self,
        hits: &[RetrievalHit],
        question: &str,
        context: QueryContext<'_>,
    ) -> ChatRequest {
        let context_text = hits
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        ChatRequest {
            system: self.system.as_str().to_string(),
            user: format!(
                "Context:\n{context_text}\n\nQuestion:\n{}",
                frame_question(question, context)
            ),
        }
    }
}

pub fn frame_question(question: &str, context: QueryContext<'_>) -> String {
    match context {
        QueryContext::Plain => question.to_string(),
        QueryContext::Session { mode, summary } => format!(
            "Response mode instruction:\n{}\n\nConversation so far:\n{summary}\n\nStudent question:\n{question}",
            mode.instruction()
        ),
    }
}
