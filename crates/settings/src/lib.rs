/// Workspace AI model setting and validation.
pub mod setting;
/// Cached store, local fallback, and the workspace service contract.
pub mod store;

pub use setting::AiModelSetting;
pub use store::{SettingsError, SettingsResult, SettingsStore, WorkspaceSettingService, WorkspaceSettings};
