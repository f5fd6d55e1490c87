//! Wire contract of the task-suggestion proxy.
//!
//! The proxy accepts a [`GenerateTasksRequest`] on [`GENERATE_TASKS_PATH`]
//! and answers with either a [`GenerateTasksResponse`] or an [`ErrorBody`].
//! The completion model returns one blob of comma-separated text;
//! [`parse_task_list`] turns it into task titles.

use serde::{Deserialize, Serialize};

/// HTTP path of the generate-tasks endpoint.
pub const GENERATE_TASKS_PATH: &str = "/api/generate-tasks";

/// Request body for the generate-tasks endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateTasksRequest {
    /// Free-form description of what the user wants to get done.
    #[serde(default)]
    pub prompt: String,
}

impl GenerateTasksRequest {
    /// Creates a request for the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// Successful response of the generate-tasks endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateTasksResponse {
    /// Suggested task titles in the order the model produced them.
    pub tasks: Vec<String>,
}

/// Error body returned with every non-2xx JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short, user-presentable error message.
    pub error: String,
    /// Underlying cause, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    /// Creates an error body without details.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    /// Attaches details to the error body.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Splits generated text on commas, trims each entry, and drops empty
/// ones. Order is preserved.
#[must_use]
pub fn parse_task_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds the completion prompt sent upstream for a user prompt.
#[must_use]
pub fn build_prompt(prompt: &str) -> String {
    format!(
        "Generate a list of 3-5 todo tasks based on the following prompt: \"{prompt}\". \
         The output should be a clean, unformatted list of tasks. Each task should be \
         separated by a comma. For example: \"Write a blog post about Next.js, Research \
         new front-end frameworks, Deploy the project to Vercel\". Do not include any \
         markdown, numbering, or bullet points."
    )
}
