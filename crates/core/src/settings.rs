//! Saved AI provider settings, kept in a flat JSON key-value file.

use crate::config::Settings;
use crate::llm::Provider;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

pub const AI_SETTINGS_KEY: &str = "ai_settings";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-lite-preview-02-05:free";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSettings {
    pub provider: Provider,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

impl AiSettings {
    /// Environment defaults, used until settings are saved.
    pub fn from_env_defaults(settings: &Settings) -> anyhow::Result<Self> {
        let provider = match settings.ai_provider.as_deref() {
            Some(p) => p.parse::<Provider>()?,
            None => Provider::OpenRouter,
        };
        Ok(Self {
            provider,
            model: settings
                .ai_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: settings.ai_api_key.clone().unwrap_or_default(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn public_view(&self) -> AiSettingsView {
        AiSettingsView {
            provider: self.provider,
            model: self.model.clone(),
            api_key_set: self.has_api_key(),
        }
    }
}

/// What the API and CLI show: the credential is never echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiSettingsView {
    pub provider: Provider,
    pub model: String,
    pub api_key_set: bool,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_map(&self) -> anyhow::Result<Map<String, Value>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str::<Map<String, Value>>(&text)
            .with_context(|| format!("settings file {} is not a JSON object", self.path.display()))
    }

    pub async fn load(&self) -> anyhow::Result<Option<AiSettings>> {
        let mut map = self.read_map().await?;
        match map.remove(AI_SETTINGS_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value::<AiSettings>(v)
                .map(Some)
                .context("saved ai_settings has an unexpected shape"),
        }
    }

    pub async fn save(&self, ai: &AiSettings) -> anyhow::Result<()> {
        let mut map = self.read_map().await?;
        map.insert(
            AI_SETTINGS_KEY.to_string(),
            serde_json::to_value(ai).context("failed to encode ai_settings")?,
        );
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let body = serde_json::to_string_pretty(&Value::Object(map))?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        tracing::info!(
            path = %self.path.display(),
            provider = %ai.provider,
            model = %ai.model,
            "saved AI settings"
        );
        Ok(())
    }

    /// Saved settings if present, otherwise environment defaults.
    pub async fn load_or_default(&self, settings: &Settings) -> anyhow::Result<AiSettings> {
        match self.load().await? {
            Some(saved) => Ok(saved),
            None => AiSettings::from_env_defaults(settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AiSettings {
        AiSettings {
            provider: Provider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_key: "sk-secret".to_string(),
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, r#"{"theme": "dark"}"#).await.unwrap();

        let store = SettingsStore::new(&path);
        store.save(&sample()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(sample()));

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw[AI_SETTINGS_KEY]["provider"], "openai");
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_env_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().await.unwrap(), None);

        let env = Settings {
            ai_api_key: Some("from-env".to_string()),
            ..Settings::default()
        };
        let ai = store.load_or_default(&env).await.unwrap();
        assert_eq!(ai.provider, Provider::OpenRouter);
        assert_eq!(ai.model, DEFAULT_MODEL);
        assert_eq!(ai.api_key, "from-env");
    }

    #[test]
    fn debug_redacts_credential() {
        let shown = format!("{:?}", sample());
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("<redacted>"));
        assert!(sample().public_view().api_key_set);
    }
}
