//! reqwest-backed provider probe

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{ProbeReport, ProviderProbe};
use crate::config::ProbeSettings;
use crate::credential::Provider;
use crate::error::{Result, VaultError};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Probe that lists models on the provider API with the key under test
pub struct HttpProbe {
    client: Client,
    settings: ProbeSettings,
}

impl HttpProbe {
    pub fn new(settings: ProbeSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(concat!("credvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VaultError::ProbeError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    fn endpoint(&self, provider: Provider) -> Result<Url> {
        let (base, path) = match provider {
            Provider::Anthropic => (&self.settings.anthropic_base_url, "v1/models"),
            Provider::OpenAi => (&self.settings.openai_base_url, "v1/models"),
            Provider::Gemini => (&self.settings.gemini_base_url, "v1beta/models"),
            Provider::Custom => {
                return self.settings.custom_endpoint.clone().ok_or_else(|| {
                    VaultError::ProbeError(
                        "no probe endpoint configured for custom provider".to_string(),
                    )
                })
            }
        };
        base.join(path)
            .map_err(|e| VaultError::ConfigError(format!("bad {} base URL: {}", provider, e)))
    }

    fn request(&self, provider: Provider, url: Url, secret: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match provider {
            Provider::Anthropic => request
                .header("x-api-key", secret)
                .header("anthropic-version", ANTHROPIC_VERSION),
            Provider::Gemini => request.header("x-goog-api-key", secret),
            Provider::OpenAi | Provider::Custom => request.bearer_auth(secret),
        }
    }

    /// Send with retries on 429, 5xx and transport errors
    async fn send(&self, provider: Provider, secret: &str) -> Result<Response> {
        let url = self.endpoint(provider)?;
        let mut attempt = 0;

        loop {
            let outcome = self.request(provider, url.clone(), secret).send().await;
            let retryable = match &outcome {
                Ok(response) => is_retryable(response.status()),
                Err(_) => true,
            };

            if !retryable || attempt >= self.settings.max_retries {
                return outcome.map_err(|e| {
                    VaultError::ProbeError(format!("{} unreachable: {}", provider, e))
                });
            }

            let delay = self.settings.backoff(attempt);
            match &outcome {
                Ok(response) => warn!(
                    "{} probe returned {}, retrying in {:?}",
                    provider,
                    response.status(),
                    delay
                ),
                Err(e) => warn!("{} probe failed ({}), retrying in {:?}", provider, e, delay),
            }
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl ProviderProbe for HttpProbe {
    async fn verify(&self, provider: Provider, secret: &str) -> Result<ProbeReport> {
        let response = self.send(provider, secret).await?;
        let status = response.status();
        debug!("{} verify -> {}", provider, status);

        let report = if status.is_success() {
            ProbeReport::accepted(vec!["models:read".to_string()])
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ProbeReport::rejected(format!("rejected by provider ({})", status))
        } else {
            ProbeReport::rejected(format!("unexpected provider response ({})", status))
        };
        Ok(report)
    }

    async fn ping(&self, provider: Provider, secret: &str) -> Result<bool> {
        let response = self.send(provider, secret).await?;
        debug!("{} ping -> {}", provider, response.status());
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP server answering with the given statuses in order (the
    /// last one repeats). Returns its base URL, a hit counter and the raw
    /// request heads it saw.
    async fn serve(statuses: Vec<u16>) -> (Url, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let heads = Arc::new(Mutex::new(Vec::new()));

        let (hits_task, heads_task) = (hits.clone(), heads.clone());
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { break };
                let n = hits_task.fetch_add(1, Ordering::SeqCst);
                let status = statuses[n.min(statuses.len() - 1)];

                let mut buf = vec![0u8; 4096];
                let mut read = 0;
                while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) | Err(_) => break,
                        Ok(m) => read += m,
                    }
                }
                heads_task
                    .lock()
                    .unwrap()
                    .push(String::from_utf8_lossy(&buf[..read]).to_lowercase());

                let body = "{}";
                let reply = format!(
                    "HTTP/1.1 {} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (Url::parse(&format!("http://{}/", addr)).unwrap(), hits, heads)
    }

    fn settings_for(base: &Url) -> ProbeSettings {
        ProbeSettings {
            anthropic_base_url: base.clone(),
            openai_base_url: base.clone(),
            gemini_base_url: base.clone(),
            custom_endpoint: Some(base.join("ping").unwrap()),
            timeout_secs: 5,
            max_retries: 2,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_accepted_key() {
        let (base, hits, heads) = serve(vec![200]).await;
        let probe = HttpProbe::new(settings_for(&base)).unwrap();

        let report = probe.verify(Provider::Anthropic, "sk-ant-test").await.unwrap();
        assert!(report.valid);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let head = heads.lock().unwrap()[0].clone();
        assert!(head.starts_with("get /v1/models"));
        assert!(head.contains("x-api-key: sk-ant-test"));
        assert!(head.contains("anthropic-version: 2023-06-01"));
    }

    #[tokio::test]
    async fn test_rejected_key_is_not_retried() {
        let (base, hits, _) = serve(vec![401]).await;
        let probe = HttpProbe::new(settings_for(&base)).unwrap();

        let report = probe.verify(Provider::OpenAi, "sk-bad").await.unwrap();
        assert!(!report.valid);
        assert!(report.error.unwrap().contains("401"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let (base, hits, heads) = serve(vec![503, 429, 200]).await;
        let probe = HttpProbe::new(settings_for(&base)).unwrap();

        assert!(probe.ping(Provider::Gemini, "AIza-key").await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(heads.lock().unwrap()[0].contains("x-goog-api-key: aiza-key"));
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let (base, hits, _) = serve(vec![500]).await;
        let probe = HttpProbe::new(settings_for(&base)).unwrap();

        assert!(!probe.ping(Provider::OpenAi, "sk-x").await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_custom_without_endpoint() {
        let probe = HttpProbe::new(ProbeSettings::default()).unwrap();
        let result = probe.verify(Provider::Custom, "whatever-key-value").await;
        assert!(matches!(result, Err(VaultError::ProbeError(_))));
    }

    #[tokio::test]
    async fn test_custom_uses_bearer_on_endpoint() {
        let (base, _, heads) = serve(vec![200]).await;
        let probe = HttpProbe::new(settings_for(&base)).unwrap();

        assert!(probe.ping(Provider::Custom, "custom-key-123").await.unwrap());
        let head = heads.lock().unwrap()[0].clone();
        assert!(head.starts_with("get /ping"));
        assert!(head.contains("authorization: bearer custom-key-123"));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let mut settings = settings_for(&base);
        settings.max_retries = 0;
        let probe = HttpProbe::new(settings).unwrap();

        let result = probe.verify(Provider::OpenAi, "sk-x").await;
        assert!(matches!(result, Err(VaultError::ProbeError(_))));
    }
}
