use std::path::PathBuf;

use crate::{credentials::Credentials, error::Error, system_info};

/// Runtime configuration for one session, covering both the connection
/// itself and the ambient caching/credential-persistence behavior around it.
/// Defaults mirror `librespot-python`'s `Configuration.Builder`.
#[derive(Clone)]
pub struct SessionConfig {
    pub login_credentials: Credentials,
    pub proxy_url: Option<String>,

    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    pub do_cache_clean_up: bool,

    pub store_credentials: bool,
    pub stored_credentials_file: PathBuf,

    pub retry_on_chunk_error: bool,
    pub preferred_locale: String,
    pub device_name: String,
    pub device_id: String,

    /// Opt-in: install `SIGINT`/`SIGTERM` handlers that call `close()` on the
    /// running session. Never enabled implicitly, so embedding this crate
    /// into a larger process never steals its signal handling.
    pub install_signal_handlers: bool,
}

impl SessionConfig {
    /// Start a builder with the given login credentials and the rest of the
    /// fields defaulted.
    pub fn new(login_credentials: Credentials) -> Result<Self, Error> {
        Ok(Self {
            login_credentials,
            proxy_url: None,
            cache_enabled: true,
            cache_dir: PathBuf::from("./cache"),
            do_cache_clean_up: true,
            store_credentials: true,
            stored_credentials_file: PathBuf::from("./credentials.json"),
            retry_on_chunk_error: true,
            preferred_locale: "en".to_string(),
            device_name: "apsess".to_string(),
            device_id: system_info::device_id(None)?,
            install_signal_handlers: false,
        })
    }

    /// Install `SIGINT`/`SIGTERM` handlers that call `close()` on the running
    /// session. Off by default so embedding this crate into a larger process
    /// never steals its signal handling.
    pub fn with_signal_handlers(mut self, install: bool) -> Self {
        self.install_signal_handlers = install;
        self
    }

    /// Override the device id. Validated unconditionally: either a caller
    /// supplies exactly 40 hex characters, or the call fails. There is no
    /// "accept anything if unset" escape hatch.
    pub fn with_device_id(mut self, device_id: &str) -> Result<Self, Error> {
        self.device_id = system_info::device_id(Some(device_id))?;
        Ok(self)
    }

    pub fn with_proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::authentication::AuthenticationType;

    fn creds() -> Credentials {
        Credentials::from_username_and_password("alice".into(), "hunter2".into())
    }

    #[test]
    fn defaults_generate_a_valid_device_id() {
        let config = SessionConfig::new(creds()).unwrap();
        assert_eq!(config.device_id.len(), 40);
    }

    #[test]
    fn rejects_bad_explicit_device_id() {
        let config = SessionConfig::new(creds()).unwrap();
        assert!(config.with_device_id("not-hex").is_err());
    }

    #[test]
    fn credentials_carry_the_requested_auth_type() {
        let config = SessionConfig::new(creds()).unwrap();
        let (_, _, auth_type) = config.login_credentials.into_parts();
        assert_eq!(auth_type, AuthenticationType::AUTHENTICATION_USER_PASS);
    }
}
