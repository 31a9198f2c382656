#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::env;
use std::path;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

use crate::domain::services::DEFAULT_POLL_INTERVAL;
use crate::infrastructure::storage::file::FileStorage;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    AudioPlayer,
    ConfigFile,
    ConversationID,
    DataDir,
    Model,
    OllamaURL,
    PollInterval,
    SpeechURL,
    VisionModel,
}

impl ConfigKey {
    fn is_numeric(&self) -> bool {
        return *self == ConfigKey::PollInterval;
    }

    /// Keys that only make sense per invocation and never go in the file.
    fn is_runtime_only(&self) -> bool {
        return *self == ConfigKey::ConfigFile || *self == ConfigKey::ConversationID;
    }
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        #[cfg(not(target_os = "macos"))]
        let config_path = dirs::config_dir()
            .unwrap_or_else(env::temp_dir)
            .join("ochat/config.toml");
        #[cfg(target_os = "macos")]
        let config_path = path::PathBuf::from(env::var("HOME").unwrap_or_default())
            .join(".config/ochat/config.toml");

        #[cfg(target_os = "macos")]
        let audio_player = "afplay";
        #[cfg(not(target_os = "macos"))]
        let audio_player = "ffplay -nodisp -autoexit -loglevel quiet";

        let res = match key {
            ConfigKey::AudioPlayer => audio_player.to_string(),
            ConfigKey::DataDir => FileStorage::default().dir.to_string_lossy().to_string(),
            ConfigKey::Model => "".to_string(),
            ConfigKey::OllamaURL => "".to_string(),
            ConfigKey::PollInterval => DEFAULT_POLL_INTERVAL.as_millis().to_string(),
            ConfigKey::SpeechURL => "http://localhost:55000".to_string(),
            ConfigKey::VisionModel => "".to_string(),

            // Special
            ConfigKey::ConfigFile => config_path.to_string_lossy().to_string(),
            ConfigKey::ConversationID => "".to_string(),
        };

        return res;
    }

    pub fn poll_interval() -> Duration {
        return Config::get(ConfigKey::PollInterval)
            .parse::<u64>()
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);
    }

    /// Reads the values a config file sets. Empty strings are skipped.
    pub fn parse_document(toml_str: &str) -> Result<Vec<(ConfigKey, String)>> {
        let doc = toml_str.parse::<toml_edit::Document>()?;
        let mut values = vec![];

        for key in ConfigKey::iter() {
            let val = match doc.get(&key.to_string()) {
                Some(val) => val,
                None => continue,
            };

            if let Some(val_int) = val.as_integer() {
                if key.is_numeric() && val_int < 0 {
                    bail!(format!(
                        "config.toml has an invalid value for key '{key}': {val_int}"
                    ));
                }
                values.push((key, val_int.to_string()));
            } else if let Some(val_str) = val.as_str() {
                if val_str.is_empty() {
                    continue;
                }
                if key.is_numeric() && val_str.parse::<u64>().is_err() {
                    bail!(format!(
                        "config.toml has an invalid value for key '{key}': {val_str}\nExpected a number of milliseconds"
                    ));
                }
                values.push((key, val_str.to_string()));
            }
        }

        return Ok(values);
    }

    pub async fn load(clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            for (key, val) in Config::parse_document(&toml_str)? {
                Config::set(key, &val);
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            model = Config::get(ConfigKey::Model),
            vision_model = Config::get(ConfigKey::VisionModel),
            ollama_url = Config::get(ConfigKey::OllamaURL),
            speech_url = Config::get(ConfigKey::SpeechURL),
            data_dir = Config::get(ConfigKey::DataDir),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key.is_runtime_only() {
                    return None;
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))?;

                let description = arg
                    .get_help()?
                    .to_string()
                    .split("[default:")
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if key.is_numeric() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = \"{}\"", val.replace('\\', "\\\\"));
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
