// Streaming Engine Module
// Emits a resolved body as a few Server-Sent Event frames with simulated
// delays between them.

use crate::latency::{self, LatencyRange};
use crate::value::Value;
use async_stream::stream;
use futures::Stream;
use std::pin::Pin;

/// Number of data frames a payload is split into
pub const CHUNK_COUNT: usize = 3;

/// Terminal frame closing a successful stream
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// How a frame stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Every frame including the terminal sentinel was handed to the sink
    Completed,
    /// The stream was dropped early, usually because the client went away
    Disconnected,
}

type OnEnd = Box<dyn FnOnce(StreamEnd) + Send + 'static>;

/// A serialized payload waiting to be streamed
pub struct ChunkStream {
    payload: Vec<u8>,
    latency: LatencyRange,
    on_end: Option<OnEnd>,
}

impl ChunkStream {
    /// Serialize `value` once. Fails before any frame exists, so a
    /// serialization error never leaves a partial stream behind.
    pub fn new(value: &Value, latency: LatencyRange) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::from_payload(payload, latency))
    }

    pub fn from_payload(payload: Vec<u8>, latency: LatencyRange) -> Self {
        Self {
            payload,
            latency,
            on_end: None,
        }
    }

    /// Run `f` once the stream has finished or been dropped
    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: FnOnce(StreamEnd) + Send + 'static,
    {
        self.on_end = Some(Box::new(f));
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Frames as Server-Sent Events: up to three data frames, each followed
    /// by a fresh latency sample, then the `[DONE]` sentinel.
    pub fn into_stream(self) -> Pin<Box<dyn Stream<Item = Vec<u8>> + Send>> {
        let Self {
            payload,
            latency,
            on_end,
        } = self;

        // Built outside the generator so an unpolled stream still reports.
        let mut guard = EndGuard { on_end };

        Box::pin(stream! {
            for chunk in split_chunks(&payload) {
                yield format_frame(chunk);

                // The consumer has written and flushed the frame by the time
                // it polls again, so the delay lands between frames.
                latency::simulate(&latency).await;
            }

            yield DONE_FRAME.to_vec();
            guard.finish(StreamEnd::Completed);
        })
    }
}

/// Split a payload into [`CHUNK_COUNT`] contiguous chunks. The last chunk
/// absorbs the remainder; payloads shorter than `CHUNK_COUNT` bytes stay whole.
pub fn split_chunks(payload: &[u8]) -> Vec<&[u8]> {
    if payload.is_empty() {
        return Vec::new();
    }

    let size = payload.len() / CHUNK_COUNT;
    if size == 0 {
        return vec![payload];
    }

    let mut chunks = Vec::with_capacity(CHUNK_COUNT);
    for i in 0..CHUNK_COUNT {
        let start = i * size;
        let end = if i + 1 == CHUNK_COUNT {
            payload.len()
        } else {
            start + size
        };
        chunks.push(&payload[start..end]);
    }
    chunks
}

/// Format bytes as a Server-Sent Event data frame
pub fn format_frame(data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(data.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(data);
    frame.extend_from_slice(b"\n\n");
    frame
}

struct EndGuard {
    on_end: Option<OnEnd>,
}

impl EndGuard {
    fn finish(&mut self, end: StreamEnd) {
        if let Some(f) = self.on_end.take() {
            f(end);
        }
    }
}

impl Drop for EndGuard {
    fn drop(&mut self) {
        if self.on_end.is_some() {
            tracing::warn!("Stream dropped before completion, client likely disconnected");
            self.finish(StreamEnd::Disconnected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn frames_to_strings(frames: Vec<Vec<u8>>) -> Vec<String> {
        frames
            .into_iter()
            .map(|f| String::from_utf8(f).unwrap())
            .collect()
    }

    #[test]
    fn test_split_even() {
        let chunks = split_chunks(b"abcdef");
        assert_eq!(chunks, vec![&b"ab"[..], &b"cd"[..], &b"ef"[..]]);
    }

    #[test]
    fn test_split_remainder_goes_last() {
        let chunks = split_chunks(b"abcdefghij");
        assert_eq!(chunks, vec![&b"abc"[..], &b"def"[..], &b"ghij"[..]]);
    }

    #[test]
    fn test_split_short_payload_single_chunk() {
        assert_eq!(split_chunks(b"{}"), vec![&b"{}"[..]]);
        assert_eq!(split_chunks(b"1"), vec![&b"1"[..]]);
        assert!(split_chunks(b"").is_empty());
    }

    #[test]
    fn test_format_frame() {
        assert_eq!(format_frame(b"{\"a\":1}"), b"data: {\"a\":1}\n\n".to_vec());
    }

    #[tokio::test]
    async fn test_stream_frames() {
        let value = json!({"message": "Response for /v1/test"});
        let stream = ChunkStream::new(&value, LatencyRange::instant()).unwrap();
        let payload = String::from_utf8(stream.payload().to_vec()).unwrap();

        let frames = frames_to_strings(stream.into_stream().collect().await);

        assert_eq!(frames.len(), CHUNK_COUNT + 1);
        assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");

        let rebuilt: String = frames[..CHUNK_COUNT]
            .iter()
            .map(|f| {
                assert!(f.starts_with("data: "));
                assert!(f.ends_with("\n\n"));
                &f["data: ".len()..f.len() - 2]
            })
            .collect();
        assert_eq!(rebuilt, payload);
    }

    #[tokio::test]
    async fn test_small_payload_single_data_frame() {
        let stream = ChunkStream::new(&json!({}), LatencyRange::instant()).unwrap();
        let frames = frames_to_strings(stream.into_stream().collect().await);
        assert_eq!(frames, vec!["data: {}\n\n", "data: [DONE]\n\n"]);
    }

    #[tokio::test]
    async fn test_sentinel_is_last_and_unique() {
        for value in [json!(1), json!("x"), json!([1, 2, 3]), json!({"k": "v".repeat(100)})] {
            let stream = ChunkStream::new(&value, LatencyRange::instant()).unwrap();
            let frames = frames_to_strings(stream.into_stream().collect().await);

            let data_frames = frames.len() - 1;
            assert!((1..=CHUNK_COUNT).contains(&data_frames));
            assert_eq!(frames.iter().filter(|f| f.as_str() == "data: [DONE]\n\n").count(), 1);
            assert_eq!(frames.last().unwrap(), "data: [DONE]\n\n");
        }
    }

    #[tokio::test]
    async fn test_on_end_completed() {
        let ended = Arc::new(Mutex::new(None));
        let ended_clone = ended.clone();

        let stream = ChunkStream::new(&json!({"a": "b"}), LatencyRange::instant())
            .unwrap()
            .on_end(move |end| {
                *ended_clone.lock().unwrap() = Some(end);
            });

        let _frames: Vec<Vec<u8>> = stream.into_stream().collect().await;
        assert_eq!(*ended.lock().unwrap(), Some(StreamEnd::Completed));
    }

    #[tokio::test]
    async fn test_on_end_disconnected() {
        let ended = Arc::new(Mutex::new(None));
        let ended_clone = ended.clone();

        let stream = ChunkStream::new(&json!({"a": "b"}), LatencyRange::instant())
            .unwrap()
            .on_end(move |end| {
                *ended_clone.lock().unwrap() = Some(end);
            });

        let mut frames = stream.into_stream();
        assert!(frames.next().await.is_some());
        drop(frames);

        assert_eq!(*ended.lock().unwrap(), Some(StreamEnd::Disconnected));
    }

    #[test]
    fn test_unpolled_stream_reports_disconnect() {
        let ended = Arc::new(Mutex::new(None));
        let ended_clone = ended.clone();

        let frames = ChunkStream::from_payload(b"{}".to_vec(), LatencyRange::instant())
            .on_end(move |end| {
                *ended_clone.lock().unwrap() = Some(end);
            })
            .into_stream();
        drop(frames);

        assert_eq!(*ended.lock().unwrap(), Some(StreamEnd::Disconnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_after_every_data_frame() {
        let stream = ChunkStream::new(&json!({"key": "value"}), LatencyRange::fixed(100.0)).unwrap();
        let start = tokio::time::Instant::now();

        let _frames: Vec<Vec<u8>> = stream.into_stream().collect().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= std::time::Duration::from_millis(300));
        assert!(elapsed < std::time::Duration::from_millis(400));
    }
}
