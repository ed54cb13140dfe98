use std::time::Instant;

use async_trait::async_trait;
use log::warn;
use rand::prelude::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{redirect, Client, ClientBuilder, Proxy};

use super::{HttpTransport, ProbeRequest, TransportError, TransportResponse};

// Randomized User-Agent pool, one picked per request.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.5735.198 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_0) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/16.0 Safari/605.1.15",
];

/// reqwest-backed transport. Keeps one pooled client per redirect policy
/// since reqwest fixes the policy at build time.
pub struct HttpClient {
    following: Client,
    direct: Client,
    default_headers: HeaderMap,
}

impl HttpClient {
    pub fn new(
        proxy_url: Option<&str>,
        custom_headers: &[(String, String)],
    ) -> Result<Self, reqwest::Error> {
        let following = Self::builder(proxy_url)
            .redirect(redirect::Policy::limited(10))
            .build()?;
        let direct = Self::builder(proxy_url)
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            following,
            direct,
            default_headers: to_header_map(custom_headers),
        })
    }

    fn builder(proxy_url: Option<&str>) -> ClientBuilder {
        let mut builder = ClientBuilder::new().danger_accept_invalid_certs(true);

        if let Some(proxy) = proxy_url {
            match Proxy::all(proxy) {
                Ok(p) => builder = builder.proxy(p),
                Err(e) => warn!("Ignoring invalid proxy {}: {}", proxy, e),
            }
        }
        builder
    }

    fn random_user_agent() -> &'static str {
        let mut rng = rand::rng();
        USER_AGENTS.choose(&mut rng).copied().unwrap_or("Mozilla/5.0")
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn get(&self, request: &ProbeRequest) -> Result<TransportResponse, TransportError> {
        let client = if request.follow_redirects {
            &self.following
        } else {
            &self.direct
        };

        let mut builder = client
            .get(request.url.as_str())
            .timeout(request.timeout)
            .headers(self.default_headers.clone())
            .headers(to_header_map(&request.headers));

        let has_agent = self.default_headers.contains_key(USER_AGENT)
            || request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("user-agent"));
        if !has_agent {
            builder = builder.header(USER_AGENT, Self::random_user_agent());
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(TransportError::from_reqwest)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
            elapsed: start.elapsed(),
        })
    }
}

fn to_header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, val) in pairs {
        match (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(val)) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!("Skipping invalid header {:?}", key),
        }
    }
    map
}
