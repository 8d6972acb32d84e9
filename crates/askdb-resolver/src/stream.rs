//! The streamed variant of resolution.
//!
//! Events go out over an `mpsc` channel in the order
//! `sql, results, token*, end`, or are cut short by a single `error`. A
//! closed receiver means the client went away: the request is abandoned and
//! nothing is persisted.

use askdb_core::{
  database::{QueryExecutor, SchemaInspector},
  event::QueryEvent,
  model::LanguageModel,
  store::ChatStore,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{error::ResolveError, resolver::Resolver};

/// Capacity of the channel returned by [`Resolver::spawn_stream`].
const EVENT_BUFFER: usize = 32;

enum Abort {
  Failed(ResolveError),
  Disconnected,
}

impl From<ResolveError> for Abort {
  fn from(e: ResolveError) -> Self { Self::Failed(e) }
}

struct EventSink {
  tx: mpsc::Sender<QueryEvent>,
}

impl EventSink {
  async fn send(&self, event: QueryEvent) -> Result<(), Abort> {
    self.tx.send(event).await.map_err(|_| Abort::Disconnected)
  }
}

impl<H, D, M> Resolver<H, D, M>
where
  H: ChatStore + 'static,
  D: SchemaInspector + QueryExecutor + 'static,
  M: LanguageModel + 'static,
{
  /// Run [`stream`](Self::stream) on a new task and hand back its events.
  pub fn spawn_stream(&self, question: String, chat_id: i64) -> mpsc::Receiver<QueryEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let resolver = self.clone();
    tokio::spawn(async move { resolver.stream(question, chat_id, tx).await });
    rx
  }
}

impl<H, D, M> Resolver<H, D, M>
where
  H: ChatStore,
  D: SchemaInspector + QueryExecutor,
  M: LanguageModel,
{
  /// Resolve `question` in `chat_id`, emitting progress on `events`.
  ///
  /// Exactly one terminal event (`end` or `error`) is sent unless the
  /// receiver is dropped first. The exchange is persisted only after the
  /// last token and before `end`.
  pub async fn stream(&self, question: String, chat_id: i64, events: mpsc::Sender<QueryEvent>) {
    let span = info_span!("resolve_stream", request_id = %Uuid::new_v4(), chat_id);
    async move {
      let sink = EventSink { tx: events };
      let outcome = tokio::select! {
        outcome = self.stream_events(&question, chat_id, &sink) => outcome,
        () = sink.tx.closed() => Err(Abort::Disconnected),
      };

      let terminal = match outcome {
        Ok(()) => QueryEvent::End,
        Err(Abort::Failed(e)) => {
          warn!(error = %e, "resolution failed");
          QueryEvent::Error(e.to_string())
        }
        Err(Abort::Disconnected) => {
          info!("client disconnected; request abandoned");
          return;
        }
      };
      if sink.send(terminal).await.is_err() {
        info!("client disconnected before terminal event");
      }
    }
    .instrument(span)
    .await
  }

  async fn stream_events(
    &self,
    question: &str,
    chat_id: i64,
    sink: &EventSink,
  ) -> Result<(), Abort> {
    let plan = self.plan(question, chat_id).await?;
    sink.send(QueryEvent::Sql(plan.sql.clone())).await?;
    self.pause().await;

    let results = self.run_query(&plan.sql).await?;
    sink.send(QueryEvent::Results(results.clone())).await?;
    self.pause().await;

    let mut tokens = self
      .model
      .complete_stream(plan.follow_up(&results))
      .await
      .map_err(ResolveError::language_model)?;

    let mut explanation = String::new();
    while let Some(fragment) = tokens.next().await {
      let fragment = fragment.map_err(ResolveError::language_model)?;
      if fragment.is_empty() {
        continue;
      }
      explanation.push_str(&fragment);
      sink.send(QueryEvent::Token(fragment)).await?;
    }
    if explanation.trim().is_empty() {
      return Err(ResolveError::no_explanation().into());
    }
    debug!(len = explanation.len(), "explanation streamed");

    self.persist(chat_id, question, &explanation).await?;
    Ok(())
  }

  async fn pause(&self) {
    if !self.config.event_pause.is_zero() {
      tokio::time::sleep(self.config.event_pause).await;
    }
  }
}
