use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    error::SettingsError,
    settings::{
        Settings, MEMO_KEY, RECEIVER_ADDRESS_KEY, TELEGRAM_CHAT_ID_KEY, TELEGRAM_TOKEN_KEY,
    },
};

/// Key/value settings file (dotenv syntax) plus the phrases file
#[derive(Debug, Clone)]
pub struct SettingsStore {
    env_path: PathBuf,
    phrases_path: PathBuf,
}

impl SettingsStore {
    pub fn new(env_path: impl Into<PathBuf>, phrases_path: impl Into<PathBuf>) -> Self {
        Self {
            env_path: env_path.into(),
            phrases_path: phrases_path.into(),
        }
    }

    /// Reads both files. Keys missing from the settings file fall back to the
    /// process environment; a missing file reads as empty.
    pub async fn load(&self) -> Result<Settings, SettingsError> {
        let values = parse_env_file(&self.env_path)?;
        let lookup = |key: &str| {
            values
                .get(key)
                .cloned()
                .or_else(|| std::env::var(key).ok())
                .unwrap_or_default()
        };

        Ok(Settings {
            receiver_address: lookup(RECEIVER_ADDRESS_KEY),
            memo: lookup(MEMO_KEY),
            telegram_token: lookup(TELEGRAM_TOKEN_KEY),
            telegram_chat_id: lookup(TELEGRAM_CHAT_ID_KEY),
            phrases: read_optional(&self.phrases_path).await?,
        })
    }

    /// Rewrites the phrases file and updates the four keys in place,
    /// leaving every other line of the settings file untouched.
    pub async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        tokio::fs::write(&self.phrases_path, &settings.phrases).await?;

        let mut content = read_optional(&self.env_path).await?;
        for (key, value) in [
            (RECEIVER_ADDRESS_KEY, &settings.receiver_address),
            (MEMO_KEY, &settings.memo),
            (TELEGRAM_TOKEN_KEY, &settings.telegram_token),
            (TELEGRAM_CHAT_ID_KEY, &settings.telegram_chat_id),
        ] {
            content = upsert_line(&content, key, value);
        }
        tokio::fs::write(&self.env_path, content.trim()).await?;

        info!(
            "💾 Settings saved ({} phrase(s))",
            settings.phrase_list().len()
        );
        Ok(())
    }
}

async fn read_optional(path: &PathBuf) -> Result<String, SettingsError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not found, treating as empty", path.display());
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn parse_env_file(path: &Path) -> Result<HashMap<String, String>, SettingsError> {
    let entries = match dotenv::from_path_iter(path) {
        Ok(entries) => entries,
        Err(dotenv::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            debug!("{} not found, treating as empty", path.display());
            return Ok(HashMap::new());
        }
        Err(dotenv::Error::Io(e)) => return Err(e.into()),
        Err(e) => return Err(SettingsError::Parse(e.to_string())),
    };

    entries
        .map(|entry| entry.map_err(|e| SettingsError::Parse(e.to_string())))
        .collect()
}

/// Replaces every `KEY=` line, or appends one when the key is absent
fn upsert_line(content: &str, key: &str, value: &str) -> String {
    let prefix = format!("{}=", key);
    let line = format!("{}{}", prefix, encode_value(value));

    let mut found = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|existing| {
            if existing.trim_start().starts_with(&prefix) {
                found = true;
                line.clone()
            } else {
                existing.to_string()
            }
        })
        .collect();

    if !found {
        lines.push(line);
    }
    lines.join("\n")
}

/// Single-line dotenv value, double-quoted when it holds anything the parser treats specially
fn encode_value(value: &str) -> String {
    let value: String = value.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'));

    if !needs_quotes {
        return value;
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
