//! Reachability check for the application under test

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

/// HTTP probe of the application root, run before a browser is launched
pub struct TargetCheck {
    client: reqwest::Client,
    url: String,
}

impl TargetCheck {
    /// Build a check for `<base_url>/`. Redirects are not followed: a
    /// redirect to the login page already proves the app is up.
    pub fn new(base_url: &str, ignore_https_errors: bool) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(ignore_https_errors)
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Any HTTP response counts as reachable; connection and TLS failures
    /// do not.
    pub async fn check(&self) -> E2eResult<()> {
        match self.client.get(&self.url).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_server_error() {
                    warn!("{} answered {}", self.url, status);
                } else {
                    debug!("{} answered {}", self.url, status);
                }
                Ok(())
            }
            Err(e) => Err(E2eError::Unreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Poll until the target answers or `timeout` elapses
    pub async fn wait_until_reachable(&self, timeout: Duration) -> E2eResult<()> {
        let start = std::time::Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.check().await {
                Ok(()) => return Ok(()),
                Err(e) if start.elapsed() >= timeout => {
                    warn!("Giving up on {} after {} attempt(s)", self.url, attempts);
                    return Err(e);
                }
                Err(_) => {
                    if attempts == 1 {
                        info!("Waiting for {} to answer...", self.url);
                    }
                    tokio::time::sleep(Duration::from_millis(250)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned HTTP response
    async fn one_shot_server(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_redirect_counts_as_reachable() {
        let base = one_shot_server(
            "HTTP/1.1 302 Found\r\nLocation: /login\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let check = TargetCheck::new(&base, true).unwrap();
        assert_eq!(check.url(), format!("{}/", base));
        check.check().await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let check = TargetCheck::new(&format!("http://127.0.0.1:{}", port), true).unwrap();
        let err = check
            .wait_until_reachable(Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::Unreachable { .. }));
    }
}
