use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use snafu::{ResultExt, Snafu, ensure};

use scribe_api::{BoxFuture, ServiceError, ServiceResult};

use crate::setting::AiModelSetting;

pub const SETTINGS_DIRECTORY_NAME: &str = "scribe";
pub const SETTINGS_FILE_NAME: &str = "ai_settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "SCRIBE_AI_";

/// Backend contract for the workspace AI model setting.
pub trait WorkspaceSettingService: Send + Sync {
    /// Returns the workspace setting, or `None` when it was never configured.
    fn fetch_ai_setting<'a>(&'a self) -> BoxFuture<'a, ServiceResult<Option<AiModelSetting>>>;

    fn upsert_ai_setting<'a>(
        &'a self,
        setting: AiModelSetting,
    ) -> BoxFuture<'a, ServiceResult<AiModelSetting>>;
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("AI model setting is incomplete; model, API key, and base URL are required"))]
    IncompleteSetting { stage: &'static str },
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("workspace setting rpc failed on `{stage}`: {source}"))]
    Rpc {
        stage: &'static str,
        source: ServiceError,
    },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Hot-readable setting cache with a local file/env fallback.
///
/// The workspace value fetched from the backend is authoritative; the local
/// overlay only seeds the cache before the first fetch answers.
pub struct SettingsStore {
    setting: Arc<ArcSwap<AiModelSetting>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".scribe"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let setting = Self::load_from_disk(&config_path);
        Self {
            setting: Arc::new(ArcSwap::from_pointee(setting)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    /// Current snapshot; cheap enough to call per render.
    pub fn setting(&self) -> Arc<AiModelSetting> {
        self.setting.load_full()
    }

    /// Replaces the cached value without touching the local file, for values
    /// the workspace backend just answered with.
    pub fn apply_remote(&self, setting: AiModelSetting) {
        self.setting.store(Arc::new(setting.normalized()));
    }

    /// Persists and caches a locally-edited value.
    pub fn update(&self, setting: AiModelSetting) -> SettingsResult<()> {
        let normalized = setting.normalized();
        self.persist(&normalized)?;
        self.setting.store(Arc::new(normalized));
        Ok(())
    }

    fn load_from_disk(path: &PathBuf) -> AiModelSetting {
        let figment = Figment::from(Serialized::defaults(AiModelSetting::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(SETTINGS_ENV_PREFIX));

        match figment.extract::<AiModelSetting>() {
            Ok(setting) => setting.normalized(),
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                AiModelSetting::default()
            }
        }
    }

    fn persist(&self, setting: &AiModelSetting) -> SettingsResult<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(setting).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

/// Ties the cached store to the workspace backend.
pub struct WorkspaceSettings {
    service: Arc<dyn WorkspaceSettingService>,
    store: SettingsStore,
}

impl WorkspaceSettings {
    pub fn new(service: Arc<dyn WorkspaceSettingService>, store: SettingsStore) -> Self {
        Self { service, store }
    }

    pub fn setting(&self) -> Arc<AiModelSetting> {
        self.store.setting()
    }

    /// Fetches the workspace value into the cache. A workspace that never
    /// configured AI leaves the local fallback in place.
    pub async fn refresh(&self) -> SettingsResult<()> {
        let fetched = self
            .service
            .fetch_ai_setting()
            .await
            .context(RpcSnafu {
                stage: "fetch-ai-setting",
            })?;

        if let Some(setting) = fetched {
            self.store.apply_remote(setting);
        }
        Ok(())
    }

    /// Validates and upserts an edited setting, then caches and persists the
    /// accepted value. Incomplete settings fail before any backend call.
    pub async fn save(&self, setting: AiModelSetting) -> SettingsResult<()> {
        let setting = setting.normalized();
        ensure!(setting.is_complete(), IncompleteSettingSnafu { stage: "save-ai-setting" });

        let accepted = self
            .service
            .upsert_ai_setting(setting)
            .await
            .context(RpcSnafu {
                stage: "upsert-ai-setting",
            })?;

        self.store.update(accepted)
    }
}
