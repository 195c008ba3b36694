use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::fs;

/// Default VK ID endpoint base
pub const DEFAULT_PROVIDER_BASE: &str = "https://id.vk.ru";

/// Scope requested when the host configures none
///
/// `email` in the granted scope doubles as an implicit email-verification
/// signal downstream, so dropping it from an override changes more than the
/// data returned by the user-info endpoint.
pub const DEFAULT_SCOPE: &str = "vkid.personal_info email phone";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VkidSettings {
    /// Master switch; disabled means every flow fails with a configuration error
    pub enabled: bool,

    /// Provider endpoint base; `/authorize`, `/oauth2/auth` and
    /// `/oauth2/user_info` are appended to it
    pub provider_base: String,

    /// Base URL the provider redirects back to; the callback path is appended
    pub redirect_base_url: String,

    /// Path under `redirect_base_url` that receives the provider callback
    pub callback_path: String,

    /// Scope override; `None` requests [`DEFAULT_SCOPE`]
    pub scope: Option<String>,

    // Direct values (can be overridden by environment variables)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    // Environment variable names for overrides
    pub client_id_env: Option<String>,
    pub client_secret_env: Option<String>,
}

impl Default for VkidSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider_base: DEFAULT_PROVIDER_BASE.to_string(),
            redirect_base_url: "http://localhost:8080".to_string(),
            callback_path: "/auth/vkid/callback".to_string(),
            scope: None,
            client_id: None,
            client_secret: None,
            client_id_env: None,
            client_secret_env: None,
        }
    }
}

impl VkidSettings {
    /// Load settings from `Settings.toml` (when present) and apply
    /// environment variable overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file exists but cannot be read or
    /// parsed as TOML.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        Ok(settings)
    }

    fn load_base_settings() -> Result<Self, Box<dyn std::error::Error>> {
        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            let toml_content = fs::read_to_string(&default_config_path)?;
            let settings = basic_toml::from_str(&toml_content)?;
            log::info!("loaded settings from {}", default_config_path.display());
            return Ok(settings);
        }
        Ok(Self::default())
    }

    fn apply_env_overrides(settings: &mut Self) {
        if let Ok(enabled_str) = std::env::var("VKID_ENABLED") {
            if let Ok(enabled) = enabled_str.parse::<bool>() {
                settings.enabled = enabled;
            }
        }
        if let Ok(provider_base) = std::env::var("VKID_PROVIDER_BASE") {
            settings.provider_base = provider_base;
        }
        if let Ok(redirect_base_url) = std::env::var("REDIRECT_BASE_URL") {
            settings.redirect_base_url = redirect_base_url;
        }
        if let Ok(scope) = std::env::var("VKID_SCOPE") {
            settings.scope = Some(scope);
        }
    }

    /// Resolve the client ID, preferring the configured environment variable
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        if let Some(ref env_var) = self.client_id_env {
            if let Ok(value) = std::env::var(env_var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        self.client_id.clone()
    }

    /// Resolve the client secret, preferring the configured environment variable
    #[must_use]
    pub fn get_client_secret(&self) -> Option<String> {
        if let Some(ref env_var) = self.client_secret_env {
            if let Ok(value) = std::env::var(env_var) {
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
        self.client_secret.clone()
    }

    /// Effective scope string for authorization requests
    #[must_use]
    pub fn scope(&self) -> &str {
        self.scope.as_deref().unwrap_or(DEFAULT_SCOPE)
    }

    /// Redirect URI registered with the provider
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}{}", self.redirect_base_url, self.callback_path)
    }

    /// Validate that the provider is enabled and fully configured
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` when the provider is disabled or
    /// either credential is missing. The host surfaces this as "provider
    /// disabled".
    pub fn validated_credentials(&self) -> Result<(String, String), AuthError> {
        if !self.enabled {
            return Err(AuthError::Configuration(
                "VK ID provider is disabled".to_string(),
            ));
        }
        let client_id = self
            .get_client_id()
            .ok_or_else(|| AuthError::Configuration("client_id not configured".to_string()))?;
        let client_secret = self
            .get_client_secret()
            .ok_or_else(|| AuthError::Configuration("client_secret not configured".to_string()))?;
        Ok((client_id, client_secret))
    }
}
