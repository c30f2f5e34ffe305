use crate::{error::Error, resolver::Resolver, util::default_ureq_agent_builder};

/// A minimal bearer-token HTTPS surface, stripped down from what a full
/// client-state/metadata client would carry: connect-state heartbeats and
/// flat metadata lookups, nothing else.
pub struct ApiClient {
    agent: ureq::Agent,
    proxy_url: Option<String>,
}

impl ApiClient {
    pub fn new(proxy_url: Option<&str>) -> Self {
        Self {
            // Non-2xx responses are handled explicitly below rather than
            // surfaced as `ureq::Error`, since a caller may want the status.
            agent: default_ureq_agent_builder(proxy_url)
                .http_status_as_error(false)
                .build()
                .into(),
            proxy_url: proxy_url.map(str::to_string),
        }
    }

    fn spclient_base(&self) -> Result<String, Error> {
        Resolver::random_of("spclient", self.proxy_url.as_deref())
            .map(|addr| format!("https://{addr}"))
    }

    /// `PUT /connect-state/v1/devices/<device_id>` — advertises presence.
    /// Non-200 responses are logged and the status is returned, not treated
    /// as fatal: callers decide whether to retry.
    pub fn put_connect_state(&self, device_id: &str, body: &[u8], token: &str) -> Result<u16, Error> {
        let url = format!("{}/connect-state/v1/devices/{device_id}", self.spclient_base()?);
        let response = self
            .agent
            .put(&url)
            .header("Authorization", &format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .send(body)?;

        let status = response.status().as_u16();
        if status != 200 {
            log::warn!("put_connect_state failed with status {status}");
        }
        Ok(status)
    }

    /// `GET /metadata/4/{kind}/<hex_id>` — fetches a flat metadata blob.
    pub fn get_metadata(&self, kind: &str, hex_id: &str, token: &str) -> Result<Vec<u8>, Error> {
        let url = format!("{}/metadata/4/{kind}/{hex_id}", self.spclient_base()?);
        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &format!("Bearer {token}"))
            .call()?;
        Ok(response.body_mut().read_to_vec()?)
    }
}
