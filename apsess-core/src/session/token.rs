use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::error::Error;

const EXPIRY_THRESHOLD: Duration = Duration::from_secs(10);

/// A cached access token covering one *set* of scopes. A superset of scopes
/// already covers a subset request, so the cache is scanned rather than
/// keyed by an exact scope string.
#[derive(Clone, Debug)]
pub struct StoredToken {
    pub access_token: String,
    pub scopes: BTreeSet<String>,
    pub expires_in: Duration,
    pub acquired_at: Instant,
}

impl StoredToken {
    pub fn is_expired(&self) -> bool {
        self.acquired_at + self.expires_in.saturating_sub(EXPIRY_THRESHOLD) < Instant::now()
    }

    fn covers(&self, scopes: &BTreeSet<String>) -> bool {
        scopes.is_subset(&self.scopes)
    }
}

/// Fetches and caches bearer tokens scoped for the Mercury `keymaster`
/// endpoint. `fetch` is injected so the provider itself stays free of the
/// Mercury request/response plumbing it's driven by.
pub struct TokenProvider {
    client_id: String,
    device_id: String,
    cached: Mutex<Vec<StoredToken>>,
}

impl TokenProvider {
    pub fn new(client_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            device_id: device_id.into(),
            cached: Mutex::new(Vec::new()),
        }
    }

    /// Look up a cached token covering all of `scopes`. Evicts it first if
    /// expired. On a cache miss, calls `fetch` with the keymaster URI and
    /// inserts whatever it returns.
    pub fn get<F>(&self, scopes: &[&str], fetch: F) -> Result<String, Error>
    where
        F: FnOnce(&str) -> Result<Vec<u8>, Error>,
    {
        let wanted: BTreeSet<String> = scopes.iter().map(|s| s.to_string()).collect();

        {
            let mut cached = self.cached.lock();
            cached.retain(|token| !token.is_expired());
            if let Some(token) = cached.iter().find(|token| token.covers(&wanted)) {
                return Ok(token.access_token.clone());
            }
        }

        let uri = format!(
            "hm://keymaster/token/authenticated?scope={}&client_id={}&device_id={}",
            scopes.join(","),
            self.client_id,
            self.device_id,
        );
        let body = fetch(&uri)?;
        let response: KeymasterResponse = serde_json::from_slice(&body)
            .map_err(|_| Error::TokenFetchError("malformed keymaster response".into()))?;

        let granted: BTreeSet<String> = if response.scope.is_empty() {
            wanted
        } else {
            response.scope.iter().cloned().collect()
        };

        let token = StoredToken {
            access_token: response.access_token.clone(),
            scopes: granted,
            expires_in: Duration::from_secs(response.expires_in),
            acquired_at: Instant::now(),
        };
        self.cached.lock().push(token);
        Ok(response.access_token)
    }
}

#[derive(serde::Deserialize)]
struct KeymasterResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "expiresIn")]
    expires_in: u64,
    #[serde(default)]
    scope: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn superset_token_satisfies_subset_request() {
        let provider = TokenProvider::new("client", "device");
        let mut calls = 0;
        let token = provider
            .get(&["playlist-read", "user-read-email"], |_| {
                calls += 1;
                Ok(br#"{"accessToken":"tok","expiresIn":3600,"scope":["playlist-read","user-read-email"]}"#.to_vec())
            })
            .unwrap();
        assert_eq!(token, "tok");

        let token = provider
            .get(&["playlist-read"], |_| {
                calls += 1;
                Ok(br#"{"accessToken":"should-not-be-used","expiresIn":3600,"scope":["playlist-read"]}"#.to_vec())
            })
            .unwrap();
        assert_eq!(token, "tok");
        assert_eq!(calls, 1);
    }

    #[test]
    fn disjoint_scope_sets_each_fetch_and_cache_independently() {
        let provider = TokenProvider::new("client", "device");
        let mut calls = 0;

        provider
            .get(&["a"], |_| {
                calls += 1;
                Ok(br#"{"accessToken":"tok-a","expiresIn":3600,"scope":["a"]}"#.to_vec())
            })
            .unwrap();
        provider
            .get(&["b"], |_| {
                calls += 1;
                Ok(br#"{"accessToken":"tok-b","expiresIn":3600,"scope":["b"]}"#.to_vec())
            })
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(provider.cached.lock().len(), 2);
    }

    #[test]
    fn expired_token_is_evicted_and_refetched() {
        let provider = TokenProvider::new("client", "device");
        provider.cached.lock().push(StoredToken {
            access_token: "stale".into(),
            scopes: ["a".to_string()].into_iter().collect(),
            expires_in: Duration::from_secs(0),
            acquired_at: Instant::now() - Duration::from_secs(100),
        });

        let mut calls = 0;
        let token = provider
            .get(&["a"], |_| {
                calls += 1;
                Ok(br#"{"accessToken":"fresh","expiresIn":3600,"scope":["a"]}"#.to_vec())
            })
            .unwrap();

        assert_eq!(token, "fresh");
        assert_eq!(calls, 1);
    }
}
