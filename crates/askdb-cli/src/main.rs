//! `askdb`: command-line client for the askdb server.
//!
//! # Usage
//!
//! ```sh
//! askdb signup alice alice@example.com
//! export ASKDB_TOKEN=$(askdb login alice)
//! askdb chats new --title Films
//! askdb ask 1 "how many films are there?"
//! askdb --config ~/.config/askdb/config.toml chats list
//! ```

mod client;
mod render;

use std::{io, path::PathBuf};

use anyhow::{Context, Result, bail};
use askdb_core::event::QueryEvent;
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "askdb", about = "Ask questions about a database in plain language")]
struct Args {
  /// Path to a TOML config file (url, token).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the askdb server (default: http://localhost:8000).
  #[arg(long, env = "ASKDB_URL")]
  url: Option<String>,

  /// Bearer token printed by `askdb login`.
  #[arg(long, env = "ASKDB_TOKEN", hide_env_values = true)]
  token: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Register a new account.
  Signup {
    username: String,
    email:    String,
    /// Read from stdin when omitted.
    #[arg(long)]
    password: Option<String>,
  },
  /// Log in and print a bearer token.
  Login {
    username: String,
    #[arg(long)]
    password: Option<String>,
  },
  /// Show the logged-in user.
  Me,
  /// Print the target database's tables and columns.
  Schema,
  /// Manage chats.
  #[command(subcommand)]
  Chats(ChatsCommand),
  /// Print a chat's messages, oldest first.
  History { chat_id: i64 },
  /// Ask a question within a chat.
  Ask {
    chat_id:  i64,
    question: Vec<String>,
    /// Wait for the whole answer instead of streaming it.
    #[arg(long)]
    no_stream: bool,
  },
}

#[derive(Subcommand, Debug)]
enum ChatsCommand {
  /// List chats, newest first.
  List,
  /// Start a new chat and print its id.
  New {
    #[arg(long)]
    title: Option<String>,
  },
  /// Delete one chat.
  Delete { chat_id: i64 },
  /// Delete every chat.
  Clear,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:   String,
  #[serde(default)]
  token: String,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override the config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8000".to_string()),
    token:    args
      .token
      .or_else(|| (!file_cfg.token.is_empty()).then(|| file_cfg.token.clone())),
  };

  let client = ApiClient::new(api_config)?;
  run(&client, args.command).await
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
  match command {
    Command::Signup { username, email, password } => {
      let password = password_or_stdin(password)?;
      let user = client.signup(&username, &email, &password).await?;
      println!("registered {} <{}> (id {})", user.username, user.email, user.id);
    }
    Command::Login { username, password } => {
      let password = password_or_stdin(password)?;
      println!("{}", client.login(&username, &password).await?);
    }
    Command::Me => {
      let user = client.me().await?;
      println!("{} <{}> (id {})", user.username, user.email, user.id);
    }
    Command::Schema => println!("{}", render::schema(&client.schema().await?)),
    Command::Chats(ChatsCommand::List) => {
      for chat in client.list_chats().await? {
        println!("{}", render::chat_line(&chat));
      }
    }
    Command::Chats(ChatsCommand::New { title }) => {
      let chat = client.create_chat(title.as_deref()).await?;
      println!("{}", chat.id);
    }
    Command::Chats(ChatsCommand::Delete { chat_id }) => {
      client.delete_chat(chat_id).await?;
      println!("deleted chat {chat_id}");
    }
    Command::Chats(ChatsCommand::Clear) => {
      client.delete_all_chats().await?;
      println!("deleted all chats");
    }
    Command::History { chat_id } => {
      for message in client.messages(chat_id).await? {
        println!("{}", render::message_block(&message));
      }
    }
    Command::Ask { chat_id, question, no_stream } => {
      let question = question.join(" ");
      if question.trim().is_empty() {
        bail!("no question given");
      }
      if no_stream {
        let answer = client.ask_complete(chat_id, &question).await?;
        println!("SQL:\n  {}\n", answer.sql_query);
        println!("Results:\n{}\n", render::results(&answer.query_results));
        println!("{}", answer.explanation);
      } else {
        stream_answer(client, chat_id, &question).await?;
      }
    }
  }
  Ok(())
}

async fn stream_answer(client: &ApiClient, chat_id: i64, question: &str) -> Result<()> {
  let mut events = client.ask(chat_id, question).await?;
  let mut stdout = io::stdout();
  while let Some(event) = events.next().await? {
    if let QueryEvent::Error(message) = &event {
      println!();
      bail!("{message}");
    }
    render::event(&event, &mut stdout)?;
  }
  Ok(())
}

fn password_or_stdin(password: Option<String>) -> Result<String> {
  if let Some(password) = password {
    return Ok(password);
  }
  use std::io::{BufRead, Write};
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
