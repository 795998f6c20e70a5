//! Provider Client — issues a single Chat Completions call (unary or SSE
//! stream) to one upstream and surfaces the result or a typed error.
//!
//! Retries happen across providers in the router, never within this client
//! (one `invoke` == one HTTP attempt).

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::providers::registry::ProviderDescriptor;
use crate::types::chat::{ChatChunk, ChatResponse};

/// Byte stream of one upstream's raw SSE body.
pub type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .build()
                .expect("reqwest client configuration is static and always valid"),
        }
    }

    fn build_request(
        &self,
        provider: &ProviderDescriptor,
        body: &serde_json::Value,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}/chat/completions", provider.base_url.trim_end_matches('/'));
        let mut req = self
            .http
            .post(url)
            .bearer_auth(&provider.api_key)
            .timeout(Duration::from_millis(provider.timeout_ms))
            .json(body);
        for (k, v) in &provider.extra_headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req
    }

    /// Unary invocation: parse the body as a `ChatResponse` and stamp
    /// `provider`. On non-200, returns `GatewayError::Upstream`.
    pub async fn invoke_unary(
        &self,
        provider: &ProviderDescriptor,
        mut request: serde_json::Value,
    ) -> Result<ChatResponse> {
        request["stream"] = serde_json::Value::Bool(false);
        let resp = self
            .build_request(provider, &request)
            .send()
            .await
            .map_err(|e| upstream_network_error(provider, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                provider: provider.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let mut parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| upstream_network_error(provider, e))?;
        parsed.provider = provider.name.clone();
        Ok(parsed)
    }

    /// Streaming invocation: commits as soon as the upstream returns a
    /// successful header phase and hands back the raw byte stream. The
    /// caller is responsible for SSE framing (see
    /// [`crate::providers::client::sse_chunks`]).
    pub async fn invoke_streaming(
        &self,
        provider: &ProviderDescriptor,
        mut request: serde_json::Value,
    ) -> Result<ByteStream> {
        request["stream"] = serde_json::Value::Bool(true);
        let resp = self
            .build_request(provider, &request)
            .send()
            .await
            .map_err(|e| upstream_network_error(provider, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                provider: provider.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(resp.bytes_stream()))
    }
}

fn upstream_network_error(provider: &ProviderDescriptor, e: reqwest::Error) -> GatewayError {
    GatewayError::Upstream {
        provider: provider.name.clone(),
        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
        body: e.to_string(),
    }
}

/// Decode a raw upstream byte stream into `ChatChunk`s, applying the SSE
/// framing rules: blank lines and `:`-comment lines are skipped,
/// `data: [DONE]` ends the stream, and a malformed `data:` line is logged
/// and skipped rather than terminating the stream.
pub fn sse_chunks(bytes: ByteStream) -> Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>> {
    let lines = SseLineSplitter::new(bytes);
    Box::pin(lines.filter_map(|line_result| async move {
        let line = match line_result {
            Ok(l) => l,
            Err(e) => return Some(Err(e)),
        };
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            return None;
        }
        let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
        let data = data.trim();
        if data == "[DONE]" {
            return None;
        }
        match serde_json::from_str::<ChatChunk>(data) {
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) => {
                warn!("skipping malformed SSE chunk: {e}");
                None
            }
        }
    }))
}

/// Splits an arbitrarily-chunked byte stream on `\n`, buffering partial
/// lines across reads. SSE frames are newline-delimited but TCP segments
/// rarely line up with them.
struct SseLineSplitter {
    inner: ByteStream,
    buf: String,
    done: bool,
}

impl SseLineSplitter {
    fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            buf: String::new(),
            done: false,
        }
    }
}

impl Stream for SseLineSplitter {
    type Item = Result<String>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;
        loop {
            if let Some(idx) = self.buf.find('\n') {
                let line = self.buf[..idx].to_string();
                self.buf.drain(..=idx);
                return Poll::Ready(Some(Ok(line)));
            }
            if self.done {
                if self.buf.is_empty() {
                    return Poll::Ready(None);
                }
                let rest = std::mem::take(&mut self.buf);
                return Poll::Ready(Some(Ok(rest)));
            }
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buf.push_str(&String::from_utf8_lossy(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(GatewayError::Internal(format!(
                        "stream error: {e}"
                    )))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn descriptor() -> ProviderDescriptor {
        ProviderDescriptor {
            name: "groq".into(),
            base_url: "https://api.groq.test/v1".into(),
            api_key: "k".into(),
            supported_models: vec!["m".into()],
            timeout_ms: 1000,
            extra_headers: Default::default(),
        }
    }

    fn byte_stream(chunks: Vec<&'static str>) -> ByteStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|s| Ok(Bytes::from_static(s.as_bytes()))),
        ))
    }

    #[tokio::test]
    async fn skips_comments_blank_lines_and_stops_at_done() {
        let body = concat!(
            ": keepalive\n\n",
            "data: {\"id\":\"1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",\"choices\":[]}\n\n",
            "data: [DONE]\n\n",
        );
        let stream = byte_stream(vec![body]);
        let chunks: Vec<_> = sse_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_ok());
    }

    #[tokio::test]
    async fn malformed_chunk_is_skipped_not_fatal() {
        let body = concat!(
            "data: {not json}\n\n",
            "data: {\"id\":\"1\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",\"choices\":[]}\n\n",
            "data: [DONE]\n\n",
        );
        let stream = byte_stream(vec![body]);
        let chunks: Vec<_> = sse_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 1);
    }

    #[tokio::test]
    async fn frames_split_across_reads_are_reassembled() {
        let stream = byte_stream(vec![
            "data: {\"id\":\"1\",\"object\":\"chat.completion.chunk\",\"crea",
            "ted\":1,\"model\":\"m\",\"choices\":[]}\n\n",
            "data: [DONE]\n\n",
        ]);
        let chunks: Vec<_> = sse_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_ok());
    }

    #[test]
    fn descriptor_is_used_in_error_stamping() {
        let d = descriptor();
        assert_eq!(d.name, "groq");
    }
}
