//! LlamaTamer terminal chat client.
//! Run with: cargo run --bin llama-tamer
//!
//! Plain lines are sent to the model of the active conversation and the
//! reply is printed as it streams. Lines starting with `/` are commands;
//! `/help` lists them.

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use llama_tamer::chat::{ChatOrchestrator, NoticeLevel, TurnEvent, TurnPhase};
use llama_tamer::config::AppConfig;
use llama_tamer::conversations::{ConversationId, SqliteStateStore, Transcript};
use llama_tamer::llm::OllamaClient;
use llama_tamer::search::{ProxySearchClient, SearchAugmenter, SearchBackend, SearchConfig};
use llama_tamer::start_llama_tamer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const HELP: &str = "\
Commands:
  /new                 start a new conversation
  /list                list conversations
  /switch <id>         switch to a conversation
  /delete [id]         delete a conversation (default: active)
  /rename <title>      rename the active conversation
  /history             show the active conversation again
  /models              list models on the server
  /model <name>        use a model for the active conversation
  /default <model>     set the default model
  /search on|off       toggle web search for the active conversation
  /system <prompt>     set the system prompt (empty clears it)
  /options             show sampling options
  /options on|off      enable or disable sampling overrides
  /options <field> <v> set temperature, top_k, top_p or seed
  /apikey <key>        set the Brave Search API key
  /url <url>           set the Ollama server URL (tested first)
  /theme <name>        set the theme
  /help                show this help
  /quit                exit";

/// A parsed slash command.
#[derive(Debug, PartialEq)]
enum Command {
    New,
    List,
    Switch(ConversationId),
    Delete(Option<ConversationId>),
    Rename(String),
    History,
    Models,
    Model(String),
    Default(String),
    Search(bool),
    System(String),
    ShowOptions,
    Override(bool),
    SetOption(OptionField),
    ApiKey(String),
    Url(String),
    Theme(String),
    Help,
    Quit,
}

/// One sampling field assignment.
#[derive(Debug, PartialEq)]
enum OptionField {
    Temperature(f32),
    TopK(i32),
    TopP(f32),
    Seed(Option<i64>),
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    let id = |value: &str| {
        value
            .parse::<ConversationId>()
            .map_err(|_| format!("not a conversation id: {value}"))
    };
    let required = |value: &str, what: &str| {
        if value.is_empty() {
            Err(format!("{name} needs {what}"))
        } else {
            Ok(value.to_string())
        }
    };

    match name {
        "/new" => Ok(Command::New),
        "/list" => Ok(Command::List),
        "/switch" => id(rest).map(Command::Switch),
        "/delete" if rest.is_empty() => Ok(Command::Delete(None)),
        "/delete" => id(rest).map(|id| Command::Delete(Some(id))),
        "/rename" => required(rest, "a title").map(Command::Rename),
        "/history" => Ok(Command::History),
        "/models" => Ok(Command::Models),
        "/model" => required(rest, "a model name").map(Command::Model),
        "/default" => required(rest, "a model name").map(Command::Default),
        "/search" => match rest {
            "on" => Ok(Command::Search(true)),
            "off" => Ok(Command::Search(false)),
            _ => Err("usage: /search on|off".to_string()),
        },
        "/system" => Ok(Command::System(rest.to_string())),
        "/options" => parse_options(rest),
        "/apikey" => Ok(Command::ApiKey(rest.to_string())),
        "/url" => required(rest, "a URL").map(Command::Url),
        "/theme" => required(rest, "a theme name").map(Command::Theme),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("unknown command {other}, try /help")),
    }
}

fn parse_options(rest: &str) -> Result<Command, String> {
    let (field, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let value = value.trim();
    let invalid = |e: &dyn std::fmt::Display| format!("invalid value for {field}: {e}");

    let parsed = match field {
        "" => return Ok(Command::ShowOptions),
        "on" => return Ok(Command::Override(true)),
        "off" => return Ok(Command::Override(false)),
        "temperature" => OptionField::Temperature(value.parse().map_err(|e| invalid(&e))?),
        "top_k" => OptionField::TopK(value.parse().map_err(|e| invalid(&e))?),
        "top_p" => OptionField::TopP(value.parse().map_err(|e| invalid(&e))?),
        "seed" if value.is_empty() || value == "none" => OptionField::Seed(None),
        "seed" => OptionField::Seed(Some(value.parse().map_err(|e| invalid(&e))?)),
        other => return Err(format!("unknown option {other}")),
    };
    Ok(Command::SetOption(parsed))
}

#[tokio::main]
async fn main() -> ExitCode {
    start_llama_tamer::init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("reading configuration")?;
    let store = SqliteStateStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let models = OllamaClient::new_default().context("creating model client")?;

    let search: Arc<dyn SearchBackend> = match &config.search_proxy_url {
        Some(proxy) => {
            tracing::info!("Searching through proxy at {proxy}");
            Arc::new(ProxySearchClient::new(reqwest::Client::new(), proxy))
        }
        None => {
            let search_config = SearchConfig::new().with_api_url(config.brave_api_url.clone());
            Arc::new(SearchAugmenter::new(search_config).context("creating search client")?)
        }
    };

    let orchestrator = ChatOrchestrator::new(Arc::new(store), Arc::new(models), search);
    let transcript = orchestrator.bootstrap().await.context("loading conversations")?;
    if let Err(e) = orchestrator.refresh_models().await {
        println!("Error: {e}");
    }
    print_transcript(&transcript);
    println!("Type a message, or /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('/') {
            match parse_command(line) {
                Ok(Command::Quit) => break,
                Ok(command) => {
                    if let Err(e) = execute(&orchestrator, command).await {
                        println!("Error: {e}");
                    }
                }
                Err(message) => println!("{message}"),
            }
        } else {
            send(&orchestrator, line).await;
        }
    }

    Ok(())
}

fn prompt() {
    print!("you> ");
    let _ = std::io::stdout().flush();
}

/// Run one turn while a printer task renders its events.
async fn send(orchestrator: &ChatOrchestrator, text: &str) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            render(event);
        }
    });

    let outcome = orchestrator.submit_active(text, &tx).await;
    drop(tx);
    if let Err(e) = printer.await {
        tracing::warn!("Printer task failed: {e}");
    }
    if let Err(e) = outcome {
        tracing::debug!("Turn failed: {e}");
    }
}

fn render(event: TurnEvent) {
    match event {
        TurnEvent::Phase(TurnPhase::Streaming) => {
            print!("assistant> ");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::Delta(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        TurnEvent::Committed(message) => {
            println!();
            if let Some(at) = message.content.find("<hr>") {
                println!("{}", &message.content[at..]);
            }
        }
        TurnEvent::Notice(notice) => match notice.level {
            NoticeLevel::Info | NoticeLevel::Warning => println!("{}", notice.text),
            NoticeLevel::Error => println!("\n{}", notice.text),
        },
        TurnEvent::TitleChanged(title) => println!("[title: {title}]"),
        TurnEvent::Phase(_) | TurnEvent::UserMessage(_) => {}
    }
}

fn print_transcript(transcript: &Transcript) {
    let model = if transcript.model.is_empty() {
        "no model selected"
    } else {
        transcript.model.as_str()
    };
    let search = if transcript.web_search_enabled { ", web search on" } else { "" };
    println!("== {} [{}] ({model}{search}) ==", transcript.title, transcript.id);
    if !transcript.system_prompt.is_empty() {
        println!("system: {}", transcript.system_prompt);
    }
    for message in &transcript.messages {
        println!("{}> {}", message.role.as_str(), message.content);
    }
}

async fn active(orchestrator: &ChatOrchestrator) -> anyhow::Result<ConversationId> {
    orchestrator
        .active_id()
        .await
        .context("no active conversation")
}

async fn execute(orchestrator: &ChatOrchestrator, command: Command) -> anyhow::Result<()> {
    match command {
        Command::New => {
            let id = orchestrator.new_chat().await?;
            print_transcript(&orchestrator.transcript(id).await?);
        }
        Command::List => {
            for meta in orchestrator.list_conversations().await {
                let marker = if meta.active { '*' } else { ' ' };
                println!("{marker} {}  {} ({} messages)", meta.id, meta.title, meta.message_count);
            }
        }
        Command::Switch(id) => print_transcript(&orchestrator.switch_chat(id).await?),
        Command::Delete(id) => {
            let id = match id {
                Some(id) => id,
                None => active(orchestrator).await?,
            };
            let now_active = orchestrator.delete_chat(id).await?;
            print_transcript(&orchestrator.transcript(now_active).await?);
        }
        Command::Rename(title) => {
            let id = active(orchestrator).await?;
            if !orchestrator.rename_chat(id, &title).await? {
                println!("Title unchanged.");
            }
        }
        Command::History => {
            let id = active(orchestrator).await?;
            print_transcript(&orchestrator.transcript(id).await?);
        }
        Command::Models => {
            let default_model = orchestrator.settings().await.default_model;
            for model in orchestrator.refresh_models().await? {
                let marker = if model.name == default_model { '*' } else { ' ' };
                println!("{marker} {}", model.name);
            }
        }
        Command::Model(name) => {
            let id = active(orchestrator).await?;
            orchestrator.set_model(id, &name).await?;
        }
        Command::Default(name) => {
            let mut settings = orchestrator.settings().await;
            settings.default_model = name;
            orchestrator.update_settings(settings).await?;
        }
        Command::Search(enabled) => {
            let id = active(orchestrator).await?;
            orchestrator.set_web_search(id, enabled).await?;
            if enabled && !orchestrator.settings().await.has_search_key() {
                println!("Web search needs a Brave Search API key: /apikey <key>");
            }
        }
        Command::System(prompt) => {
            let id = active(orchestrator).await?;
            orchestrator.set_system_prompt(id, &prompt).await?;
        }
        Command::ShowOptions => {
            let id = active(orchestrator).await?;
            let state = orchestrator.state().read().await;
            if let Some(conversation) = state.book.get(id) {
                let o = &conversation.options;
                println!(
                    "override={} temperature={} top_k={} top_p={} seed={}",
                    o.override_defaults,
                    o.temperature,
                    o.top_k,
                    o.top_p,
                    o.seed.map_or_else(|| "none".to_string(), |s| s.to_string())
                );
            }
        }
        Command::Override(enabled) => {
            update_options(orchestrator, |o| o.override_defaults = enabled).await?;
        }
        Command::SetOption(field) => {
            update_options(orchestrator, move |o| match field {
                OptionField::Temperature(v) => o.temperature = v,
                OptionField::TopK(v) => o.top_k = v,
                OptionField::TopP(v) => o.top_p = v,
                OptionField::Seed(v) => o.seed = v,
            })
            .await?;
        }
        Command::ApiKey(key) => {
            let mut settings = orchestrator.settings().await;
            settings.brave_api_key = key;
            orchestrator.update_settings(settings).await?;
        }
        Command::Url(url) => {
            if !orchestrator.test_connection(&url).await {
                anyhow::bail!("could not connect to Ollama at {url}");
            }
            let mut settings = orchestrator.settings().await;
            settings.ollama_url = url;
            orchestrator.update_settings(settings).await?;
            println!("Connection successful.");
            orchestrator.refresh_models().await?;
        }
        Command::Theme(theme) => {
            let mut settings = orchestrator.settings().await;
            settings.theme = theme;
            let saved = orchestrator.update_settings(settings).await?;
            println!("Theme {} ({}).", saved.theme, if saved.is_dark_theme() { "dark" } else { "light" });
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    Ok(())
}

async fn update_options<F>(orchestrator: &ChatOrchestrator, apply: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut llama_tamer::conversations::GenerationOptions),
{
    let id = active(orchestrator).await?;
    let mut options = {
        let state = orchestrator.state().read().await;
        state
            .book
            .get(id)
            .map(|c| c.options.clone())
            .context("active conversation disappeared")?
    };
    apply(&mut options);
    orchestrator.set_options(id, options).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_command("/new"), Ok(Command::New));
        assert_eq!(parse_command("  /quit "), Ok(Command::Quit));
        assert_eq!(parse_command("/delete"), Ok(Command::Delete(None)));
        assert_eq!(
            parse_command("/switch 1700000000000"),
            Ok(Command::Switch(ConversationId::from_millis(1_700_000_000_000)))
        );
        assert_eq!(parse_command("/search on"), Ok(Command::Search(true)));
        assert_eq!(parse_command("/system"), Ok(Command::System(String::new())));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("/switch abc").is_err());
        assert!(parse_command("/rename   ").is_err());
        assert!(parse_command("/search maybe").is_err());
        assert!(parse_command("/bogus").is_err());
    }

    #[test]
    fn test_parse_options() {
        assert_eq!(parse_command("/options"), Ok(Command::ShowOptions));
        assert_eq!(parse_command("/options off"), Ok(Command::Override(false)));
        assert_eq!(
            parse_command("/options top_k 20"),
            Ok(Command::SetOption(OptionField::TopK(20)))
        );
        assert_eq!(
            parse_command("/options seed none"),
            Ok(Command::SetOption(OptionField::Seed(None)))
        );
        assert!(parse_command("/options temperature hot").is_err());
        assert!(parse_command("/options mirostat 1").is_err());
    }
}
