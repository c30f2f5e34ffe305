use serde::Deserialize;

use crate::{
    error::Error,
    util::default_ureq_agent_builder,
};

const AP_RESOLVE_ENDPOINT: &str = "https://apresolve.spotify.com";

const AP_FALLBACK: &str = "ap.spotify.com:443";

/// Endpoint discovery for the named service classes used by the core:
/// `accesspoint`, `dealer`, `spclient`.
pub struct Resolver;

impl Resolver {
    /// Fetch the pool of addresses advertised for `service`.
    pub fn resolve(service: &str, proxy_url: Option<&str>) -> Result<Vec<String>, Error> {
        #[derive(Clone, Debug, Default, Deserialize)]
        struct ApResolveData {
            #[serde(flatten)]
            services: std::collections::HashMap<String, Vec<String>>,
        }

        let agent: ureq::Agent = default_ureq_agent_builder(proxy_url).build().into();
        let url = format!("{AP_RESOLVE_ENDPOINT}/?type={service}");
        let mut response = agent.get(&url).call()?;
        let body = response.body_mut().read_to_vec()?;
        let data: ApResolveData =
            serde_json::from_slice(&body).map_err(|_| Error::UnexpectedResponse)?;
        data.services.get(service).cloned().ok_or(Error::NoEndpoint)
    }

    /// Pick one address for `service` uniformly at random.
    pub fn random_of(service: &str, proxy_url: Option<&str>) -> Result<String, Error> {
        let addrs = Self::resolve(service, proxy_url)?;
        if addrs.is_empty() {
            return Err(Error::NoEndpoint);
        }
        let idx: usize = (rand::random::<u32>() as usize) % addrs.len();
        Ok(addrs[idx].clone())
    }

    /// `random_of("accesspoint")`, falling back to a well-known address if
    /// resolution fails for any reason.
    pub fn random_accesspoint_with_fallback(proxy_url: Option<&str>) -> String {
        match Self::random_of("accesspoint", proxy_url) {
            Ok(ap) => ap,
            Err(err) => {
                log::error!("using AP fallback, error while resolving: {:?}", err);
                AP_FALLBACK.into()
            }
        }
    }
}
