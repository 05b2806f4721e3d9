use crate::context::Context;
use crate::error::{ExecutionError, ValidationError};
use crate::function::{Function, FunctionOptions};
use crate::result::{FunctionResult, Progress};
use crate::schema::{FunctionParameter, FunctionSchema, Parameters};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

const CATEGORIES: [&str; 6] = [
    "nixos",
    "nix",
    "home-manager",
    "general",
    "troubleshooting",
    "configuration",
];

const STAGES: u64 = 4;

/// Answers a free-form question through the AI provider in the call options.
pub struct AskFunction {
    schema: FunctionSchema,
}

impl AskFunction {
    pub fn new() -> Self {
        let schema = FunctionSchema::new(
            "ask",
            "Ask questions about NixOS, Nix, Home Manager, or general system configuration",
            vec![
                FunctionParameter::string(
                    "question",
                    "The question to ask about NixOS, Nix, or Home Manager",
                    true,
                )
                .with_length(Some(1), None),
                FunctionParameter::string_enum("category", "Category of the question", false, CATEGORIES)
                    .with_default("general"),
                FunctionParameter::string("context", "Additional context for the question", false),
            ],
        )
        .with_example(
            "Ask a general NixOS question",
            json!({"question": "How do I enable SSH on NixOS?", "category": "nixos"}),
            "Detailed answer with configuration examples and explanations",
        )
        .with_example(
            "Ask about Home Manager configuration",
            json!({
                "question": "How do I configure Git with Home Manager?",
                "category": "home-manager",
                "context": "I want to set up my development environment"
            }),
            "Home Manager configuration examples",
        );

        Self { schema }
    }

    fn build_prompt(question: &str, category: &str, context: Option<&str>) -> String {
        let mut parts = vec![format!("Question: {}", question), format!("Category: {}", category)];
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            parts.push(format!("Context: {}", context.trim()));
        }
        parts.join("\n")
    }
}

impl Default for AskFunction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Function for AskFunction {
    fn schema(&self) -> &FunctionSchema {
        &self.schema
    }

    fn validate_parameters(&self, params: &Parameters) -> Result<(), ValidationError> {
        self.schema.validate(params)?;
        let blank = params
            .get("question")
            .and_then(|q| q.as_str())
            .is_some_and(|q| q.trim().is_empty());
        if blank {
            return Err(ValidationError::Invalid {
                parameter: "question".into(),
                message: "must not be blank".into(),
            });
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &Context,
        params: &Parameters,
        options: &FunctionOptions,
    ) -> Result<FunctionResult, ExecutionError> {
        let question = params
            .get("question")
            .and_then(|q| q.as_str())
            .unwrap_or_default()
            .trim();
        let category = self
            .schema
            .param_or_default(params, "category")
            .and_then(|c| c.as_str())
            .unwrap_or("general");
        let context = params.get("context").and_then(|c| c.as_str());

        options.report(Progress::new(1, STAGES, "Processing question").with_stage("preparation"));

        let Some(provider) = options.provider.as_ref() else {
            return Ok(FunctionResult::failure(
                "No AI provider configured. Set ANTHROPIC_API_KEY or NIXAI_USE_MOCK=1",
            ));
        };

        let prompt = Self::build_prompt(question, category, context);
        options.report(Progress::new(2, STAGES, "Querying AI provider").with_stage("processing"));
        debug!("Asking {} provider: {}", provider.name(), question);

        let answer = match ctx.run(provider.query(&prompt)).await? {
            Ok(answer) => answer,
            Err(e) => {
                return Ok(FunctionResult::failure_with_message(
                    e.to_string(),
                    "Failed to get answer from AI provider",
                ));
            }
        };

        options.report(Progress::new(3, STAGES, "Processing response").with_stage("formatting"));
        let data = json!({
            "answer": answer.trim(),
            "category": category,
            "provider": provider.name(),
        });
        options.report(Progress::new(4, STAGES, "Completed successfully").with_stage("complete"));

        Ok(FunctionResult::success(data))
    }
}
