//! Request handler: one fresh reasoning loop per question.
//!
//! The handler owns only read-only, shareable parts (tool catalog, tool
//! set, LLM gateway, budget manager, settings). Every call to
//! [`RequestHandler::ask`] builds its own [`AgentState`](crate::state::AgentState)
//! inside a new [`ReasoningLoop`], so concurrent requests share nothing
//! mutable except the GitHub client's rate-limit tracker.

use crate::context::BudgetManager;
use crate::llm::LlmGateway;
use crate::outcome::LoopOutcome;
use crate::reasoning::ReasoningLoop;
use repolens_config::{AgentConfig, AppConfig, ConfigError};
use repolens_core::message::ConversationTurn;
use repolens_core::provider::Provider;
use repolens_core::{GithubError, ProviderError, RepoLocator, RepoLocatorError, ToolCatalog};
use repolens_github::{GithubApi, GithubClient};
use repolens_tools::ToolSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build GitHub client: {0}")]
    Github(#[from] GithubError),

    #[error("failed to build LLM provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("invalid repo_name: {0}")]
    InvalidRepo(#[from] RepoLocatorError),

    #[error("user_prompt must not be empty")]
    EmptyQuestion,
}

impl HandlerError {
    /// Caused by the request rather than by the process setup.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::InvalidRepo(_) | Self::EmptyQuestion)
    }
}

pub struct RequestHandler {
    catalog: ToolCatalog,
    tools: ToolSet,
    llm: LlmGateway,
    budget: BudgetManager,
    config: AgentConfig,
}

impl RequestHandler {
    /// Assemble from already-built collaborators.
    pub fn new(provider: Arc<dyn Provider>, github: Arc<dyn GithubApi>, config: &AppConfig) -> Self {
        Self {
            catalog: ToolCatalog::standard(),
            tools: ToolSet::new(github, &config.tools),
            llm: LlmGateway::new(provider, &config.llm),
            budget: BudgetManager::from_config(&config.agent),
            config: config.agent.clone(),
        }
    }

    /// Build the real GitHub client and LLM provider. Missing credentials
    /// are a startup failure.
    pub fn from_config(config: &AppConfig) -> Result<Self, HandlerError> {
        config.require_credentials()?;
        let github = GithubClient::new(&config.github)?;
        let provider = repolens_providers::build_from_config(&config.llm)?;
        info!(
            provider = provider.name(),
            model = %config.llm.model,
            max_iterations = config.agent.max_iterations,
            "Request handler ready"
        );
        Ok(Self::new(provider, Arc::new(github), config))
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Answer one question about `repo`.
    pub async fn ask(
        &self,
        repo: RepoLocator,
        question: &str,
        history: &[ConversationTurn],
    ) -> LoopOutcome {
        ReasoningLoop::new(
            repo,
            &self.catalog,
            &self.tools,
            &self.llm,
            &self.budget,
            &self.config,
        )
        .run(question, history)
        .await
    }

    /// Like [`ask`](Self::ask), from the raw wire fields.
    pub async fn ask_repo(
        &self,
        repo_name: &str,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<LoopOutcome, HandlerError> {
        let repo = RepoLocator::parse(repo_name)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(HandlerError::EmptyQuestion);
        }
        Ok(self.ask(repo, question, history).await)
    }
}
