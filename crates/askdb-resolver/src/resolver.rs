use std::{sync::Arc, time::Duration};

use askdb_core::{
  database::{QueryExecutor, SchemaInspector},
  model::{
    AssistantMessage, CompletionRequest, LanguageModel, ModelMessage, ToolCall, ToolChoice,
  },
  store::ChatStore,
  tool::{ASK_DATABASE, ToolInvocation, build_tool, single_call},
};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::{
  context::{DEFAULT_SYSTEM_PROMPT, assemble_context},
  error::ResolveError,
};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
  /// System prompt template; `{SCHEMA}` is replaced by the schema JSON.
  pub system_prompt: String,
  /// Sampling temperature of the SQL-generating call.
  pub temperature:   f32,
  /// Delay after the `sql` and `results` events of a stream.
  pub event_pause:   Duration,
}

impl Default for ResolverConfig {
  fn default() -> Self {
    Self {
      system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
      temperature:   0.2,
      event_pause:   Duration::from_millis(100),
    }
  }
}

/// Outcome of a non-streamed resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
  pub sql:         String,
  /// Serialised result rows, exactly as fed back to the model.
  pub results:     String,
  pub explanation: String,
}

/// The first phase's output: everything the follow-up call needs.
pub(crate) struct Plan {
  pub(crate) context: Vec<ModelMessage>,
  pub(crate) reply:   AssistantMessage,
  pub(crate) call:    ToolCall,
  pub(crate) sql:     String,
}

impl Plan {
  /// The second model call: the original context, the assistant's tool
  /// call, and the tool result answering it. No tools are offered.
  pub(crate) fn follow_up(self, results: &str) -> CompletionRequest {
    let mut messages = self.context;
    messages.push(self.reply.into());
    messages.push(ModelMessage::tool_result(&self.call, results));
    CompletionRequest { messages, ..Default::default() }
  }
}

/// Turns a question about the target database into SQL, runs it, and has the
/// model explain the results.
///
/// Generic over the history store `H`, the target database `D` and the
/// language model `M`. Cheap to clone; all collaborators are shared.
pub struct Resolver<H, D, M> {
  pub(crate) history:  Arc<H>,
  pub(crate) database: Arc<D>,
  pub(crate) model:    Arc<M>,
  pub(crate) config:   Arc<ResolverConfig>,
}

impl<H, D, M> Clone for Resolver<H, D, M> {
  fn clone(&self) -> Self {
    Self {
      history:  Arc::clone(&self.history),
      database: Arc::clone(&self.database),
      model:    Arc::clone(&self.model),
      config:   Arc::clone(&self.config),
    }
  }
}

impl<H, D, M> Resolver<H, D, M>
where
  H: ChatStore,
  D: SchemaInspector + QueryExecutor,
  M: LanguageModel,
{
  pub fn new(history: Arc<H>, database: Arc<D>, model: Arc<M>, config: ResolverConfig) -> Self {
    Self { history, database, model, config: Arc::new(config) }
  }

  pub fn config(&self) -> &ResolverConfig { &self.config }

  /// Resolve `question` in `chat_id` and wait for the whole explanation.
  ///
  /// On success the question and the explanation are appended to the chat
  /// as one user and one assistant message. On failure nothing is written.
  pub async fn resolve(&self, question: &str, chat_id: i64) -> Result<Resolution, ResolveError> {
    let span = info_span!("resolve", request_id = %Uuid::new_v4(), chat_id);
    async move {
      let plan = self.plan(question, chat_id).await?;
      let sql = plan.sql.clone();
      let results = self.run_query(&sql).await?;

      let reply = self
        .model
        .complete(plan.follow_up(&results))
        .await
        .map_err(ResolveError::language_model)?;
      let explanation = reply
        .content
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(ResolveError::no_explanation)?;
      debug!(len = explanation.len(), "explanation received");

      self.persist(chat_id, question, &explanation).await?;
      Ok(Resolution { sql, results, explanation })
    }
    .instrument(span)
    .await
    .inspect_err(|e| warn!(chat_id, error = %e, "resolution failed"))
  }

  // ─── Phases ──────────────────────────────────────────────────────────────

  /// Fetch the schema and history, make the forced tool call, and extract
  /// the SQL from it.
  pub(crate) async fn plan(&self, question: &str, chat_id: i64) -> Result<Plan, ResolveError> {
    let schema = self.database.schema().await.map_err(ResolveError::infrastructure)?;
    debug!(tables = schema.tables.len(), "schema fetched");

    let history = self
      .history
      .list_messages(chat_id)
      .await
      .map_err(ResolveError::infrastructure)?;
    debug!(turns = history.len(), "history loaded");

    let context = assemble_context(&self.config.system_prompt, &schema, history, question);
    let request = CompletionRequest {
      messages:    context.clone(),
      tools:       vec![build_tool(&schema)],
      tool_choice: ToolChoice::Forced(ASK_DATABASE.to_owned()),
      temperature: Some(self.config.temperature),
    };
    let reply = self.model.complete(request).await.map_err(ResolveError::language_model)?;

    let call = single_call(&reply.tool_calls)?.clone();
    let sql = ToolInvocation::decode(&call)?.into_sql();
    debug!(%sql, "sql generated");

    Ok(Plan { context, reply, call, sql })
  }

  pub(crate) async fn run_query(&self, sql: &str) -> Result<String, ResolveError> {
    let rows = self
      .database
      .execute(sql)
      .await
      .map_err(|e| ResolveError::QueryExecution(Box::new(e)))?;
    debug!(rows = rows.rows.len(), truncated = rows.truncated, "query executed");
    Ok(rows.serialize())
  }

  pub(crate) async fn persist(
    &self,
    chat_id: i64,
    question: &str,
    explanation: &str,
  ) -> Result<(), ResolveError> {
    self
      .history
      .append_exchange(chat_id, question.to_owned(), explanation.to_owned())
      .await
      .map_err(ResolveError::infrastructure)?;
    debug!("exchange persisted");
    Ok(())
  }
}
