use crate::config::HttpConfig;
use crate::error::{BoardError, IsRetryable};
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;
use url::Url;

pub(crate) fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Shared outbound client for every platform call.
pub fn build_http_client(cfg: &HttpConfig) -> Result<reqwest::Client, BoardError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("creatorboard/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .timeout(Duration::from_secs(cfg.timeout_secs))
        // oauth2 token exchanges must not follow redirects
        .redirect(reqwest::redirect::Policy::none());
    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}

/// Turn a non-2xx response into `UpstreamStatus`, keeping the body for diagnosis.
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BoardError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BoardError::UpstreamStatus { status, body })
}

/// `base` extended by the segments of `path`, with `query` pairs appended.
/// Segments and pairs are percent-encoded.
pub(crate) fn endpoint(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, BoardError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| BoardError::Internal(format!("API base cannot take a path: {base}")))?
        .pop_if_empty()
        .extend(path.split('/').filter(|s| !s.is_empty()));
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// GET `url` with bearer auth and decode JSON, retrying transient failures.
pub(crate) async fn get_json<T>(
    client: &reqwest::Client,
    url: &str,
    token: &str,
    headers: &[(&'static str, &str)],
) -> Result<T, BoardError>
where
    T: DeserializeOwned,
{
    (|| async {
        let mut req = client.get(url).bearer_auth(token);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = check_status(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    })
    .retry(default_retry_policy())
    .when(|e: &BoardError| e.is_retryable())
    .notify(|err, dur: Duration| {
        warn!(error = %err, "platform request retrying after {:?}", dur);
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_cursors_and_ids() {
        let url = endpoint(
            "https://api.twitch.tv/helix/",
            "videos",
            &[("user_id", "42"), ("after", "eyJi Ijp7&fi=2")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.twitch.tv/helix/videos?user_id=42&after=eyJi+Ijp7%26fi%3D2"
        );

        let url = endpoint("https://graph.facebook.com/v19.0", "fb-1/posts", &[]).unwrap();
        assert_eq!(url.as_str(), "https://graph.facebook.com/v19.0/fb-1/posts");
    }
}
