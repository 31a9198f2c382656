#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;
use std::sync::Arc;

use anyhow::bail;
use anyhow::Result;
use chrono::TimeZone;
use chrono::Utc;
use clap::builder::TypedValueParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use yansi::Paint;

use super::repl;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ConnectionState;
use crate::domain::models::Conversation;
use crate::domain::models::Event;
use crate::domain::services::AppState;
use crate::domain::services::ConnectionMonitor;
use crate::domain::services::Preferences;
use crate::infrastructure::backends::ollama::Ollama;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

pub fn format_conversation(conversation: &Conversation) -> String {
    let last_activity = Utc
        .timestamp_millis_opt(conversation.last_activity())
        .single()
        .map(|time| return time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    let mut res = format!(
        "- (ID: {}) {last_activity}, Model: {}",
        conversation.id, conversation.model,
    );

    if let Some(name) = &conversation.name {
        res = format!("{res}, Name: {name}");
    }

    if let Some(first) = conversation.chat_history.first() {
        let content = first.content();
        let mut line = content.split('\n').next().unwrap_or_default().to_string();

        if line.chars().count() >= 70 {
            line = format!("{}...", line.chars().take(67).collect::<String>());
        }
        res = format!("{res}, {line}");
    }

    return res;
}

fn print_conversations_list(app_state: &AppState) {
    if app_state.conversations.is_empty() {
        println!("There are no conversations yet. You should start your first one!");
        return;
    }

    let conversations = app_state
        .conversations
        .list()
        .iter()
        .map(format_conversation)
        .collect::<Vec<String>>();

    println!("{}", conversations.join("\n"));
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

async fn print_status() -> Result<()> {
    let (tx, _rx) = mpsc::unbounded_channel::<Event>();
    let mut app_state = repl::app_state(tx);
    let url = repl::api_url(&app_state.preferences);

    let status = app_state.monitor().poll_once().await;
    println!("Server: {url} ({})", repl::format_status(status));

    if status.is_connected() {
        app_state.load_models().await;
    }
    println!(
        "Default model: {}",
        app_state.preferences.model().unwrap_or_else(|| return "-".to_string())
    );
    println!(
        "Vision model: {}",
        repl::vision_model(&app_state.preferences).unwrap_or_else(|| return "-".to_string())
    );
    println!("Conversations: {}", app_state.conversations.len());

    if let Some(hint) = app_state.tutorial().hint() {
        println!("\n{}", Paint::yellow(hint));
    }

    return Ok(());
}

async fn connect(url: Option<&String>) -> Result<()> {
    let preferences = Preferences::new(Arc::new(repl::storage()));
    let url = match url {
        Some(url) => url.trim_end_matches('/').to_string(),
        None => repl::api_url(&preferences),
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let connection = ConnectionState::default();
    let backend = Arc::new(Ollama::new(&url, connection.clone()));
    let monitor = ConnectionMonitor::new(backend, connection, tx);

    if let Err(err) = monitor.connect().await {
        while let Ok(Event::Notify(notification)) = rx.try_recv() {
            eprintln!("{}", repl::format_notification(&notification));
        }
        return Err(err);
    }

    preferences.set_api_url(&url)?;
    println!("Connected to {url}");
    return Ok(());
}

async fn models(matches: &ArgMatches) -> Result<()> {
    let (tx, _rx) = mpsc::unbounded_channel::<Event>();
    let mut app_state = repl::app_state(tx);
    app_state.load_models().await;

    match matches.subcommand() {
        Some(("use", use_matches)) => {
            let name = use_matches
                .get_one::<String>("name")
                .map(|name| return name.to_string())
                .unwrap_or_default();
            let model = app_state.resolve_model(&name)?;

            if use_matches.get_flag("vision") {
                app_state.preferences.set_vision_model(&model)?;
                println!("Vision model set to {model}");
            } else {
                app_state.preferences.set_model(&model)?;
                println!("Default model set to {model}");
            }
        }
        _ => {
            println!("{}", repl::format_models(&app_state));
        }
    }

    return Ok(());
}

/// Handles `conversations`. Returns true when a chat should start.
fn conversations(matches: &ArgMatches) -> Result<bool> {
    let (tx, _rx) = mpsc::unbounded_channel::<Event>();
    let app_state = repl::app_state(tx);

    match matches.subcommand() {
        Some(("dir", _)) => {
            println!("{}", repl::storage().dir.to_string_lossy());
        }
        Some(("list", _)) => {
            print_conversations_list(&app_state);
        }
        Some(("new", _)) => {
            let id = app_state.new_conversation()?;
            println!("Created conversation {id}");
        }
        Some(("show", show_matches)) => {
            let id = match show_matches.get_one::<String>("id") {
                Some(id) => id.to_string(),
                None => match app_state.preferences.current_id() {
                    Some(id) => id,
                    None => bail!("There is no current conversation. Pass one with --id."),
                },
            };
            let conversation = match app_state.conversations.get(&id) {
                Some(conversation) => conversation,
                None => bail!(format!("No conversation found with ID {id}")),
            };
            println!("{}", repl::format_history(&conversation));
        }
        Some(("open", open_matches)) => {
            if let Some(id) = open_matches.get_one::<String>("id") {
                app_state.open_conversation(Some(id))?;
                Config::set(ConfigKey::ConversationID, id);
            }
            return Ok(true);
        }
        Some(("rename", rename_matches)) => {
            let id = match rename_matches.get_one::<String>("id") {
                Some(id) => id.to_string(),
                None => bail!("A conversation ID is required"),
            };
            if !app_state.conversations.contains(&id) {
                bail!(format!("No conversation found with ID {id}"));
            }
            let name = rename_matches
                .get_many::<String>("name")
                .map(|parts| return parts.cloned().collect::<Vec<String>>().join(" "))
                .unwrap_or_default();
            app_state.conversations.rename(&id, &name)?;
            println!("Renamed conversation {id}");
        }
        _ => {
            subcommand_conversations().print_long_help()?;
        }
    }

    return Ok(false);
}

async fn speak(matches: &ArgMatches) -> Result<()> {
    let text = matches
        .get_many::<String>("text")
        .map(|parts| return parts.cloned().collect::<Vec<String>>().join(" "))
        .unwrap_or_default();

    let controller = repl::voice(&text)?;
    let run = controller.run();
    tokio::pin!(run);

    tokio::select! {
        res = &mut run => {
            return res;
        }
        _ = tokio::signal::ctrl_c() => {
            controller.stop();
        }
    }

    // Lets the fetch in flight finish so the server can clean up after it.
    return run.await;
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn arg_conversation_id(required: bool) -> Arg {
    return Arg::new("id")
        .short('i')
        .long("id")
        .help("Conversation ID")
        .num_args(1)
        .required(required);
}

fn arg_model() -> Arg {
    return Arg::new(ConfigKey::Model.to_string())
        .short('m')
        .long(ConfigKey::Model.to_string())
        .env("OCHAT_MODEL")
        .num_args(1)
        .help("Default model for new conversations. Saved as your default once a chat starts.");
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Chat in the current conversation, or a new one.")
        .arg(
            Arg::new(ConfigKey::ConversationID.to_string())
                .short('i')
                .long("id")
                .help("Conversation ID to chat in.")
                .num_args(1),
        )
        .arg(arg_model());
}

fn subcommand_connect() -> Command {
    return Command::new("connect")
        .about("Checks the server is reachable and remembers its URL.")
        .arg(
            Arg::new("url")
                .long("url")
                .help("Server URL to connect to. Defaults to the configured or last used URL.")
                .num_args(1),
        );
}

fn subcommand_models() -> Command {
    return Command::new("models")
        .about("Browse and pick models installed on the server.")
        .subcommand(Command::new("list").about("List all models with their sizes."))
        .subcommand(
            Command::new("use")
                .about("Sets the default model, or the vision model with --vision. Takes a model name or its index from `models list`.")
                .arg(Arg::new("name").help("Model name or index").required(true))
                .arg(
                    Arg::new("vision")
                        .long("vision")
                        .help("Use this model for prompts with an image attached.")
                        .action(ArgAction::SetTrue),
                ),
        );
}

fn subcommand_conversations() -> Command {
    return Command::new("conversations")
        .about("Manage saved conversations.")
        .arg_required_else_help(true)
        .subcommand(Command::new("dir").about("Print the data directory path."))
        .subcommand(Command::new("list").about("List all conversations, most recently active first."))
        .subcommand(Command::new("new").about("Start a new conversation on the default model."))
        .subcommand(
            Command::new("show")
                .about("Print a conversation. Defaults to the current one.")
                .arg(arg_conversation_id(false)),
        )
        .subcommand(
            Command::new("open")
                .about("Open a conversation by ID and start chatting.")
                .arg(arg_conversation_id(true)),
        )
        .subcommand(
            Command::new("rename")
                .about("Rename a conversation. Leave NAME empty to clear the name.")
                .arg(arg_conversation_id(true))
                .arg(Arg::new("name").num_args(0..).help("New name")),
        );
}

fn subcommand_speak() -> Command {
    return Command::new("speak")
        .about("Reads text aloud through the speech server.")
        .arg(
            Arg::new("text")
                .num_args(1..)
                .required(true)
                .help("Text to read"),
        );
}

pub fn build() -> Command {
    let commands_text = help_text_for_cli();

    return Command::new("ochat")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_connect())
        .subcommand(subcommand_conversations())
        .subcommand(subcommand_models())
        .subcommand(subcommand_speak())
        .subcommand(Command::new("status").about("Shows the server status, selected models and conversation count."))
        .arg(arg_model())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("OCHAT_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::DataDir.to_string())
                .long(ConfigKey::DataDir.to_string())
                .env("OCHAT_DATA_DIR")
                .num_args(1)
                .help(format!("Directory conversations and preferences are stored in. [default: {}]", Config::default(ConfigKey::DataDir)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::VisionModel.to_string())
                .long(ConfigKey::VisionModel.to_string())
                .env("OCHAT_VISION_MODEL")
                .num_args(1)
                .help("Model used for prompts with an image attached. Defaults to the conversation's model.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::OllamaURL.to_string())
                .long(ConfigKey::OllamaURL.to_string())
                .env("OCHAT_OLLAMA_URL")
                .num_args(1)
                .help("Ollama API URL. Falls back to the last URL used with `connect`, then http://127.0.0.1:11435.")
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::SpeechURL.to_string())
                .long(ConfigKey::SpeechURL.to_string())
                .env("OCHAT_SPEECH_URL")
                .num_args(1)
                .help(format!("Speech synthesis server URL. [default: {}]", Config::default(ConfigKey::SpeechURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::AudioPlayer.to_string())
                .long(ConfigKey::AudioPlayer.to_string())
                .env("OCHAT_AUDIO_PLAYER")
                .num_args(1)
                .help(format!("Program used to play synthesized speech. The audio file path is appended as the last argument. [default: {}]", Config::default(ConfigKey::AudioPlayer)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::PollInterval.to_string())
                .long(ConfigKey::PollInterval.to_string())
                .env("OCHAT_POLL_INTERVAL")
                .num_args(1)
                .value_parser(value_parser!(u64).map(|val| return val.to_string()))
                .help(format!("Milliseconds between liveness probes while chatting. [default: {}]", Config::default(ConfigKey::PollInterval)))
                .global(true),
        );
}

fn help_text_for_cli() -> String {
    return repl::help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return Paint::new(format!("CHAT {line}"))
                    .underline()
                    .bold()
                    .to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");
}

/// Parses arguments and runs one-shot subcommands. Returns true when the
/// chat should start.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("chat", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(false);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("connect", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            connect(subcmd_matches.get_one::<String>("url")).await?;
            return Ok(false);
        }
        Some(("conversations", subcmd_matches)) => {
            let mut all_matches = vec![&matches, subcmd_matches];
            if let Some((_, nested)) = subcmd_matches.subcommand() {
                all_matches.push(nested);
            }
            Config::load(all_matches).await?;
            return conversations(subcmd_matches);
        }
        Some(("models", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            models(subcmd_matches).await?;
            return Ok(false);
        }
        Some(("speak", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            speak(subcmd_matches).await?;
            return Ok(false);
        }
        Some(("status", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            print_status().await?;
            return Ok(false);
        }
        _ => {
            Config::load(vec![&matches]).await?;
        }
    }

    return Ok(true);
}
