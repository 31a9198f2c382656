#[cfg(test)]
#[path = "repl_test.rs"]
mod tests;

use std::io::Write;
use std::path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Attachment;
use crate::domain::models::ChatError;
use crate::domain::models::ConnectionState;
use crate::domain::models::ConnectionStatus;
use crate::domain::models::Conversation;
use crate::domain::models::Event;
use crate::domain::models::Message;
use crate::domain::models::Notification;
use crate::domain::models::NotificationLevel;
use crate::domain::models::SlashCommand;
use crate::domain::models::Who;
use crate::domain::services::AppState;
use crate::domain::services::Generates;
use crate::domain::services::Preferences;
use crate::domain::services::VoiceController;
use crate::infrastructure::backends::ollama::Ollama;
use crate::infrastructure::players::command::CommandPlayer;
use crate::infrastructure::speech::bark::Bark;
use crate::infrastructure::storage::file::FileStorage;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /help (/h) - Provides this help menu.
- /new (/n) - Starts a new conversation on your default model.
- /models (/ml) - Lists all available models from the server.
- /model (/m) [MODEL_NAME,MODEL_INDEX] - Switches this conversation and your default to the given model. You can pass either the model name, or the index from /models.
- /rename [NAME] - Renames this conversation. Leave NAME empty to clear it.
- /image (/i) [PATH] - Attaches an image (jpg, jpeg, png, gif, svg, webp) to your next prompt.
- /speak (/s) - Reads the last reply aloud.
- /stop - Stops reading aloud.
- /history (/hist) - Prints this conversation.
- /quit /exit (/q) - Exit.
        "#;

    return text.trim().to_string();
}

pub fn intro_text() -> String {
    return [
        "Welcome! This is a chat client for models running on your own Ollama server.",
        "Type a prompt and press enter to send it. Replies stream in as they are generated.",
        "Conversations are saved automatically. Type /help to see everything else you can do.",
    ]
    .join("\n");
}

pub fn storage() -> FileStorage {
    let dir = Config::get(ConfigKey::DataDir);
    if dir.is_empty() {
        return FileStorage::default();
    }

    return FileStorage::new(path::PathBuf::from(dir));
}

/// The server URL to talk to: the configured one, else the one saved by
/// `connect`, else the default.
pub fn api_url(preferences: &Preferences) -> String {
    let url = Config::get(ConfigKey::OllamaURL);
    if !url.is_empty() {
        return url;
    }

    return preferences.api_url();
}

pub fn app_state(tx: mpsc::UnboundedSender<Event>) -> AppState {
    let storage = Arc::new(storage());
    let url = api_url(&Preferences::new(storage.clone()));
    let connection = ConnectionState::default();
    let backend = Arc::new(Ollama::new(&url, connection.clone()));

    return AppState::new(backend, storage, connection, tx);
}

pub fn voice(text: &str) -> Result<VoiceController> {
    let speech = Arc::new(Bark::new(&Config::get(ConfigKey::SpeechURL)));
    let player = Arc::new(CommandPlayer::parse(&Config::get(ConfigKey::AudioPlayer))?);

    return Ok(VoiceController::new(text, speech, player));
}

pub fn vision_model(preferences: &Preferences) -> Option<String> {
    let model = Config::get(ConfigKey::VisionModel);
    if !model.is_empty() {
        return Some(model);
    }

    return preferences.vision_model();
}

pub fn format_message(message: &Message) -> String {
    let author = match message.who {
        Who::Me => Paint::cyan("you").bold().to_string(),
        Who::Ollama => Paint::green("ollama").bold().to_string(),
    };

    let mut content = message.content();
    if message.has_image() {
        content = format!("{} {content}", Paint::new("[image]").dimmed());
    }

    return format!("{author}: {content}");
}

pub fn format_history(conversation: &Conversation) -> String {
    if conversation.chat_history.is_empty() {
        return Paint::new("No messages yet.").dimmed().to_string();
    }

    return conversation
        .chat_history
        .iter()
        .map(format_message)
        .collect::<Vec<String>>()
        .join("\n\n");
}

pub fn format_notification(notification: &Notification) -> String {
    let title = match notification.level {
        NotificationLevel::Info => Paint::blue(&notification.title).bold().to_string(),
        NotificationLevel::Error => Paint::red(&notification.title).bold().to_string(),
    };

    return format!("{title}: {}", notification.description);
}

/// The reply still streaming in for `id`, if there is one.
pub fn format_pending_reply(generates: &Generates, id: &str) -> Option<String> {
    let text = generates.text(id)?;

    return Some(format!(
        "{}: {text}{}",
        Paint::green("ollama").bold(),
        Paint::new("...").dimmed()
    ));
}

pub fn format_status(status: ConnectionStatus) -> String {
    return match status {
        ConnectionStatus::Connected => Paint::green(status).to_string(),
        ConnectionStatus::Connecting => Paint::yellow(status).to_string(),
        ConnectionStatus::Disconnected => Paint::red(status).to_string(),
    };
}

/// Writes an event out. Progress goes to stdout unbroken, everything else on
/// its own line on stderr.
fn render_event(event: Event) {
    match event {
        Event::GenerationProgress { delta, .. } => {
            print!("{delta}");
            let _ = std::io::stdout().flush();
        }
        Event::GenerationFinished { elapsed, .. } => {
            println!();
            eprintln!(
                "{}",
                Paint::new(format!("({:.1}s)", elapsed.as_secs_f64())).dimmed()
            );
        }
        Event::Notify(notification) => {
            eprintln!("{}", format_notification(&notification));
        }
        Event::ConnectionChanged(status) => {
            eprintln!("{} {}", Paint::new("server").dimmed(), format_status(status));
        }
        Event::ModelsLoaded(_) => (),
    }
}

fn print_prompt(attachment: &Option<Attachment>) {
    if attachment.is_some() {
        print!("{} ", Paint::new("[image] >").bold());
    } else {
        print!("{} ", Paint::new(">").bold());
    }
    let _ = std::io::stdout().flush();
}

struct Repl {
    app_state: AppState,
    rx: mpsc::UnboundedReceiver<Event>,
    id: String,
    attachment: Option<Attachment>,
    speaking: Option<Arc<VoiceController>>,
    streaming: Option<String>,
}

impl Repl {
    /// Stops reading aloud. A speech fetch already in flight runs to the end
    /// and its audio is thrown away.
    fn stop_speaking(&mut self) {
        if let Some(controller) = self.speaking.take() {
            if controller.is_active() {
                controller.stop();
            }
        }
    }

    fn speak(&mut self) -> Result<()> {
        self.stop_speaking();

        let reply = self
            .app_state
            .conversations
            .get(&self.id)
            .and_then(|conversation| return conversation.last_reply().map(Message::content));
        let reply = match reply {
            Some(reply) => reply,
            None => {
                println!("Nothing to read yet.");
                return Ok(());
            }
        };

        let controller = Arc::new(voice(&reply)?);
        tracing::debug!(segments = controller.sentences().len(), "Speaking last reply");
        let tx = self.app_state.tx.clone();
        tokio::spawn({
            let controller = controller.clone();
            async move {
                if let Err(err) = controller.run().await {
                    tracing::error!(error = ?err, "Voice playback failed");
                    let _ = tx.send(Event::Notify(Notification::error("Voice", &err.to_string())));
                }
            }
        });

        self.speaking = Some(controller);
        return Ok(());
    }

    /// Sends `prompt` in the background. Returns false when this
    /// conversation is still receiving a reply.
    fn submit(&mut self, prompt: &str) -> bool {
        if self.app_state.generates.is_generating(&self.id) {
            eprintln!(
                "{}",
                format_notification(&Notification::info(
                    "Busy",
                    "Still working on the last reply. Type /history to see it so far."
                ))
            );
            return false;
        }

        let generation = self.app_state.generation();
        let vision_model = vision_model(&self.app_state.preferences);
        let attachment = self.attachment.take();
        let id = self.id.clone();
        let prompt = prompt.to_string();

        self.streaming = Some(id.clone());
        tokio::spawn(async move {
            if let Err(err) = generation.submit(&id, &prompt, attachment, vision_model).await {
                tracing::error!(id = %id, error = ?err, "Prompt failed");
            }
        });

        return true;
    }

    /// Returns false once the user asked to quit.
    async fn handle_command(&mut self, command: SlashCommand) -> Result<bool> {
        if command.is_quit() {
            return Ok(false);
        }

        if command.is_help() {
            println!("{}", help_text());
        } else if command.is_new() {
            self.id = self.app_state.new_conversation()?;
            println!("Started conversation {}", self.id);
        } else if command.is_model_list() {
            if self.app_state.models.is_empty() {
                self.app_state.load_models().await;
            }
            println!("{}", format_models(&self.app_state));
        } else if command.is_model_set() {
            let model = self.app_state.resolve_model(&command.rest())?;
            self.app_state.switch_model(&self.id, &model)?;
            self.app_state.preferences.set_model(&model)?;
            println!("Switched to {model}");
        } else if command.is_rename() {
            self.app_state
                .conversations
                .rename(&self.id, &command.rest())?;
            println!("Renamed conversation {}", self.id);
        } else if command.is_image() {
            let attachment = Attachment::from_path(path::Path::new(&command.rest())).await?;
            self.attachment = Some(attachment);
            println!("Image attached to your next prompt.");
        } else if command.is_speak() {
            self.speak()?;
        } else if command.is_stop() {
            self.stop_speaking();
        } else if command.is_history() {
            if let Some(conversation) = self.app_state.conversations.get(&self.id) {
                println!("{}", format_history(&conversation));
            }
            if let Some(pending) = format_pending_reply(&self.app_state.generates, &self.id) {
                println!("\n{pending}");
            }
        }

        return Ok(true);
    }

    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }

        if let Some(command) = SlashCommand::parse(line) {
            return self.handle_command(command).await;
        }

        self.submit(line);
        return Ok(true);
    }

    async fn start_loop(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        print_prompt(&self.attachment);
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line? {
                        Some(line) => line,
                        None => break,
                    };

                    match self.handle_line(&line).await {
                        Ok(true) => (),
                        Ok(false) => break,
                        Err(err) => {
                            if let Some(ChatError::TooManyRetries(_)) = err.downcast_ref::<ChatError>() {
                                return Err(err);
                            }
                            eprintln!("{}", format_notification(&Notification::error("Error", &err.to_string())));
                        }
                    }
                    if self.streaming.is_none() {
                        print_prompt(&self.attachment);
                    }
                }
                Some(event) = self.rx.recv() => {
                    let finished = match &event {
                        Event::GenerationFinished { id, .. } => self.streaming.as_ref() == Some(id),
                        _ => false,
                    };
                    render_event(event);
                    if finished {
                        self.streaming = None;
                        print_prompt(&self.attachment);
                    }
                }
            }
        }

        self.stop_speaking();
        return Ok(());
    }
}

pub fn format_models(app_state: &AppState) -> String {
    if app_state.models.is_empty() {
        return "No models found. Pull one with `ollama pull <NAME>` first.".to_string();
    }

    let default = app_state.preferences.model().unwrap_or_default();
    let vision = vision_model(&app_state.preferences).unwrap_or_default();

    return app_state
        .models
        .iter()
        .enumerate()
        .map(|(idx, model)| {
            let mut line = format!("- ({}) {}", idx + 1, model.summary());
            if model.name == default {
                line = format!("{line} {}", Paint::green("[default]"));
            }
            if model.name == vision {
                line = format!("{line} {}", Paint::magenta("[vision]"));
            }
            return line;
        })
        .collect::<Vec<String>>()
        .join("\n");
}

pub async fn start() -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let mut app_state = app_state(tx);

    if !app_state.preferences.visited() {
        println!("{}\n", intro_text());
        app_state.preferences.set_visited(true)?;
    }

    let model = Config::get(ConfigKey::Model);
    if !model.is_empty() {
        app_state.preferences.set_model(&model)?;
    }

    let monitor = app_state.monitor();
    let stop_monitor = CancellationToken::new();
    let monitor_handle = tokio::spawn({
        let stop_monitor = stop_monitor.clone();
        async move {
            monitor.run(Config::poll_interval(), stop_monitor).await;
        }
    });

    app_state.load_models().await;
    if let Some(hint) = app_state.tutorial().hint() {
        eprintln!("{}", Paint::yellow(hint));
    }

    let requested = Config::get(ConfigKey::ConversationID);
    let requested = if requested.is_empty() {
        None
    } else {
        Some(requested.as_str())
    };
    let id = app_state.open_conversation(requested)?;

    if let Some(conversation) = app_state.conversations.get(&id) {
        println!(
            "{} {} ({})\n",
            Paint::new("Conversation").bold(),
            conversation.display_name(),
            conversation.model
        );
        if !conversation.chat_history.is_empty() {
            println!("{}\n", format_history(&conversation));
        }
    }

    let mut repl = Repl {
        app_state,
        rx,
        id,
        attachment: None,
        speaking: None,
        streaming: None,
    };
    let res = repl.start_loop().await;

    stop_monitor.cancel();
    let _ = monitor_handle.await;

    return res;
}
