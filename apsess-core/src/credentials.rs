use std::{fs, io::Write, path::Path};

use base64::Engine;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{error::Error, protocol::authentication::AuthenticationType};

/// Credentials presented at login, either a fresh username/password pair or
/// an opaque reusable token handed back by an earlier `APWelcome`.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    auth_data: Vec<u8>,
    auth_type: AuthenticationType,
}

impl Credentials {
    pub fn from_username_and_password(username: String, password: String) -> Self {
        Self {
            username,
            auth_type: AuthenticationType::AUTHENTICATION_USER_PASS,
            auth_data: password.into_bytes(),
        }
    }

    pub fn from_reusable_auth(username: String, auth_data: Vec<u8>, auth_type: AuthenticationType) -> Self {
        Self {
            username,
            auth_data,
            auth_type,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn into_parts(self) -> (String, Vec<u8>, AuthenticationType) {
        (self.username, self.auth_data, self.auth_type)
    }
}

/// On-disk representation: `{username, credentials: base64, type}`.
#[derive(Serialize, Deserialize)]
struct StoredCredentials {
    username: String,
    credentials: String,
    #[serde(rename = "type")]
    auth_type: String,
}

fn auth_type_name(auth_type: AuthenticationType) -> &'static str {
    match auth_type {
        AuthenticationType::AUTHENTICATION_USER_PASS => "AUTHENTICATION_USER_PASS",
        AuthenticationType::AUTHENTICATION_STORED_SPOTIFY_CREDENTIALS => {
            "AUTHENTICATION_STORED_SPOTIFY_CREDENTIALS"
        }
        AuthenticationType::AUTHENTICATION_STORED_FACEBOOK_CREDENTIALS => {
            "AUTHENTICATION_STORED_FACEBOOK_CREDENTIALS"
        }
        AuthenticationType::AUTHENTICATION_SPOTIFY_TOKEN => "AUTHENTICATION_SPOTIFY_TOKEN",
        AuthenticationType::AUTHENTICATION_FACEBOOK_TOKEN => "AUTHENTICATION_FACEBOOK_TOKEN",
    }
}

fn auth_type_from_name(name: &str) -> AuthenticationType {
    match name {
        "AUTHENTICATION_STORED_SPOTIFY_CREDENTIALS" => {
            AuthenticationType::AUTHENTICATION_STORED_SPOTIFY_CREDENTIALS
        }
        "AUTHENTICATION_STORED_FACEBOOK_CREDENTIALS" => {
            AuthenticationType::AUTHENTICATION_STORED_FACEBOOK_CREDENTIALS
        }
        "AUTHENTICATION_SPOTIFY_TOKEN" => AuthenticationType::AUTHENTICATION_SPOTIFY_TOKEN,
        "AUTHENTICATION_FACEBOOK_TOKEN" => AuthenticationType::AUTHENTICATION_FACEBOOK_TOKEN,
        _ => AuthenticationType::AUTHENTICATION_USER_PASS,
    }
}

/// Atomically overwrite `path` with the reusable credentials, so a reader
/// never observes a half-written file.
pub fn store(path: &Path, credentials: &Credentials) -> Result<(), Error> {
    let stored = StoredCredentials {
        username: credentials.username.clone(),
        credentials: base64::engine::general_purpose::STANDARD.encode(&credentials.auth_data),
        auth_type: auth_type_name(credentials.auth_type).to_string(),
    };
    let json = serde_json::to_vec_pretty(&stored)?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match parent {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new()?,
    };
    tmp.write_all(&json)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|err| Error::ConfigError(format!("failed to persist credentials: {err}")))?;
    Ok(())
}

pub fn load(path: &Path) -> Result<Credentials, Error> {
    let data = fs::read(path)?;
    let stored: StoredCredentials = serde_json::from_slice(&data)?;
    let auth_data = base64::engine::general_purpose::STANDARD
        .decode(stored.credentials)
        .map_err(|_| Error::ConfigError("corrupt credentials file".into()))?;
    Ok(Credentials::from_reusable_auth(
        stored.username,
        auth_data,
        auth_type_from_name(&stored.auth_type),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let original = Credentials::from_reusable_auth(
            "alice".into(),
            vec![1, 2, 3, 4],
            AuthenticationType::AUTHENTICATION_STORED_SPOTIFY_CREDENTIALS,
        );

        store(&path, &original).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.username, "alice");
        assert_eq!(loaded.auth_data, vec![1, 2, 3, 4]);
        assert_eq!(
            loaded.auth_type,
            AuthenticationType::AUTHENTICATION_STORED_SPOTIFY_CREDENTIALS
        );
    }
}
