//! Decoding of the `POST /query/stream` response.
//!
//! The backend sends records of the form
//!
//! ```text
//! event: metadata
//! data: {"retrieval": [...], "contexts": [...], "use_rerank": true, "prompt": "..."}
//!
//! event: delta
//! data: {"content": "partial answer"}
//!
//! event: done
//! data: {}
//! ```
//!
//! Each `data:` line carries the payload and closes the record opened by the
//! preceding `event:` line. Network chunks may split lines (and UTF-8
//! sequences) anywhere, so the decoder keeps the trailing partial line as raw
//! bytes until its newline arrives.

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{ClientError, Result};
use crate::state::RetrievalHit;

/// Retrieval provenance sent once, before the first delta.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamMetadata {
    #[serde(default)]
    pub retrieval: Vec<RetrievalHit>,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub use_rerank: bool,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Metadata(StreamMetadata),
    /// Text to append to the answer as-is.
    Delta(String),
    Done,
}

#[derive(Deserialize)]
struct DeltaPayload {
    #[serde(default)]
    content: String,
}

/// Incremental decoder for one streaming response.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    event: String,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a `done` record has been decoded. Further input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one network chunk, passing every event it completes to `emit`.
    ///
    /// Events decoded before a malformed record are emitted before the error
    /// is returned.
    pub fn push(&mut self, chunk: &[u8], mut emit: impl FnMut(StreamEvent)) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.buffer.extend_from_slice(chunk);

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.dispatch_line(&line[..newline], &mut emit)?;
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        Ok(())
    }

    /// Flush whatever is left after end of stream. The remainder is treated as
    /// a final complete line; whitespace-only leftovers are dropped.
    pub fn finish(&mut self, mut emit: impl FnMut(StreamEvent)) -> Result<()> {
        let rest = std::mem::take(&mut self.buffer);
        if self.done || rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        for line in rest.split(|&b| b == b'\n') {
            self.dispatch_line(line, &mut emit)?;
            if self.done {
                break;
            }
        }
        Ok(())
    }

    /// Collecting form of [`push`](Self::push).
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>> {
        let mut events = Vec::new();
        self.push(chunk, |event| events.push(event))?;
        Ok(events)
    }

    /// Collecting form of [`finish`](Self::finish).
    pub fn flush(&mut self) -> Result<Vec<StreamEvent>> {
        let mut events = Vec::new();
        self.finish(|event| events.push(event))?;
        Ok(events)
    }

    fn dispatch_line(&mut self, raw: &[u8], emit: &mut impl FnMut(StreamEvent)) -> Result<()> {
        let line = String::from_utf8_lossy(raw);
        let line: &str = &line;
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(name) = field_value(line, "event") {
            self.event = name.to_string();
        } else if let Some(payload) = field_value(line, "data") {
            let event = std::mem::take(&mut self.event);
            if let Some(decoded) = decode_record(&event, payload)? {
                if decoded == StreamEvent::Done {
                    self.done = true;
                }
                emit(decoded);
            }
        }
        Ok(())
    }
}

/// `field: value` with at most one space after the colon.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn decode_record(event: &str, payload: &str) -> Result<Option<StreamEvent>> {
    let decode_err = |source| ClientError::Decode {
        payload: payload.to_string(),
        source,
    };
    let value: Value = serde_json::from_str(payload).map_err(decode_err)?;

    let decoded = match event {
        "metadata" => StreamEvent::Metadata(serde_json::from_value(value).map_err(decode_err)?),
        "delta" => {
            let delta: DeltaPayload = serde_json::from_value(value).map_err(decode_err)?;
            StreamEvent::Delta(delta.content)
        }
        "done" => StreamEvent::Done,
        "" => {
            trace!("data line without event name");
            return Ok(None);
        }
        other => {
            debug!(event = other, "ignoring unknown stream event");
            return Ok(None);
        }
    };
    Ok(Some(decoded))
}

/// Receiver of decoded stream events.
pub trait StreamHandler {
    fn on_metadata(&mut self, metadata: StreamMetadata);
    fn on_delta(&mut self, content: String);
    fn on_done(&mut self);
    /// Transport or decode failure. Not called when the caller aborted.
    fn on_error(&mut self, error: &ClientError);
}

/// How a streaming call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A `done` record arrived.
    Done,
    /// The body ended without a `done` record.
    EndOfStream,
    /// The cancellation token fired. `on_error` was not called.
    Aborted,
    /// `on_error` was called.
    Failed,
}

/// Drive a decoder over `bytes` until `done`, end of stream, failure or
/// cancellation, forwarding events to `handler` in arrival order.
pub async fn pump_events<S, B, E, H>(
    bytes: S,
    cancel: &CancellationToken,
    handler: &mut H,
) -> StreamOutcome
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
    H: StreamHandler + ?Sized,
{
    let bytes = std::pin::pin!(bytes);
    match drive(bytes, cancel, handler).await {
        Ok(outcome) => outcome,
        Err(err) if err.is_aborted() => {
            debug!("stream aborted by caller");
            StreamOutcome::Aborted
        }
        Err(err) => {
            warn!(error = %err, "stream failed");
            handler.on_error(&err);
            StreamOutcome::Failed
        }
    }
}

async fn drive<S, B, E, H>(
    mut bytes: std::pin::Pin<&mut S>,
    cancel: &CancellationToken,
    handler: &mut H,
) -> Result<StreamOutcome>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
    H: StreamHandler + ?Sized,
{
    let mut decoder = StreamDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Aborted),
            next = bytes.next() => next,
        };

        match next {
            Some(chunk) => {
                let chunk = chunk.map_err(Into::into)?;
                decoder.push(chunk.as_ref(), |event| deliver(event, handler))?;
                if decoder.is_done() {
                    return Ok(StreamOutcome::Done);
                }
            }
            None => {
                decoder.finish(|event| deliver(event, handler))?;
                return Ok(if decoder.is_done() {
                    StreamOutcome::Done
                } else {
                    StreamOutcome::EndOfStream
                });
            }
        }
    }
}

fn deliver<H: StreamHandler + ?Sized>(event: StreamEvent, handler: &mut H) {
    match event {
        StreamEvent::Metadata(metadata) => handler.on_metadata(metadata),
        StreamEvent::Delta(content) => handler.on_delta(content),
        StreamEvent::Done => handler.on_done(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    const SCENARIO: &str = "event: metadata\ndata: {\"retrieval\":[],\"contexts\":[],\"use_rerank\":false,\"prompt\":\"p\"}\nevent: delta\ndata: {\"content\":\"Hi\"}\nevent: done\ndata: {}\n";

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<StreamEvent> {
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.feed(chunk).unwrap());
        }
        events.extend(decoder.flush().unwrap());
        events
    }

    fn scenario_events() -> Vec<StreamEvent> {
        vec![
            StreamEvent::Metadata(StreamMetadata {
                retrieval: vec![],
                contexts: vec![],
                use_rerank: false,
                prompt: "p".to_string(),
            }),
            StreamEvent::Delta("Hi".to_string()),
            StreamEvent::Done,
        ]
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<StreamEvent>,
        errors: Vec<String>,
    }

    impl StreamHandler for Recorder {
        fn on_metadata(&mut self, metadata: StreamMetadata) {
            self.events.push(StreamEvent::Metadata(metadata));
        }
        fn on_delta(&mut self, content: String) {
            self.events.push(StreamEvent::Delta(content));
        }
        fn on_done(&mut self) {
            self.events.push(StreamEvent::Done);
        }
        fn on_error(&mut self, error: &ClientError) {
            self.errors.push(error.to_string());
        }
    }

    #[test]
    fn test_scenario_single_chunk() {
        assert_eq!(decode_chunks(&[SCENARIO.as_bytes()]), scenario_events());
    }

    #[test]
    fn test_scenario_one_byte_chunks() {
        let bytes = SCENARIO.as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_chunks(&chunks), scenario_events());
    }

    #[test]
    fn test_every_split_offset_decodes_identically() {
        let body = "event: metadata\r\ndata: {\"retrieval\":[{\"content\":\"文档片段\",\"score\":0.82,\"rerank_score\":7.0}],\"contexts\":[\"文档片段\"],\"use_rerank\":true,\"prompt\":\"问题\"}\r\n\r\nevent: delta\ndata: {\"content\":\"你好\"}\n\nevent: delta\ndata: {\"content\":\", world\"}\n\nevent: done\ndata: {}\n\n";
        let bytes = body.as_bytes();
        let expected = decode_chunks(&[bytes]);
        assert_eq!(expected.len(), 4);

        for offset in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(offset);
            assert_eq!(decode_chunks(&[head, tail]), expected, "split at {offset}");
        }
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let body = "event: delta\ndata: {\"content\":\"é\"}\n".as_bytes();
        let split = body.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let events = decode_chunks(&[&body[..split], &body[split..]]);
        assert_eq!(events, vec![StreamEvent::Delta("é".to_string())]);
    }

    #[test]
    fn test_unknown_event_is_ignored_and_name_resets() {
        let body = "event: ping\ndata: {}\ndata: {\"content\":\"orphan\"}\nevent: delta\ndata: {\"content\":\"ok\"}\n";
        assert_eq!(
            decode_chunks(&[body.as_bytes()]),
            vec![StreamEvent::Delta("ok".to_string())]
        );
    }

    #[test]
    fn test_data_without_event_is_ignored() {
        let body = "data: {\"content\":\"x\"}\n\n";
        assert!(decode_chunks(&[body.as_bytes()]).is_empty());
    }

    #[test]
    fn test_event_name_survives_chunk_boundary() {
        let events = decode_chunks(&[b"event: delta\n", b"data: {\"content\":\"a\"}\n"]);
        assert_eq!(events, vec![StreamEvent::Delta("a".to_string())]);
    }

    #[test]
    fn test_remainder_without_newline_is_flushed() {
        let mut decoder = StreamDecoder::new();
        let events = decoder
            .feed(b"event: delta\ndata: {\"content\":\"tail\"}")
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(
            decoder.flush().unwrap(),
            vec![StreamEvent::Delta("tail".to_string())]
        );
    }

    #[test]
    fn test_flush_handles_metadata_too() {
        let mut decoder = StreamDecoder::new();
        decoder
            .feed(b"event: metadata\ndata: {\"prompt\":\"p\"}")
            .unwrap();
        let events = decoder.flush().unwrap();
        assert!(matches!(&events[..], [StreamEvent::Metadata(m)] if m.prompt == "p"));
    }

    #[test]
    fn test_whitespace_remainder_is_discarded() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"event: delta\ndata: {\"content\":\"a\"}\n  \t").unwrap();
        assert!(decoder.flush().unwrap().is_empty());
    }

    #[test]
    fn test_incomplete_record_at_end_emits_nothing() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"event: delta").unwrap();
        assert!(decoder.flush().unwrap().is_empty());
    }

    #[test]
    fn test_done_stops_decoding() {
        let body = "event: done\ndata: {}\nevent: delta\ndata: {\"content\":\"late\"}\n";
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(body.as_bytes()).unwrap();
        assert_eq!(events, vec![StreamEvent::Done]);
        assert!(decoder.is_done());
        assert!(decoder.feed(b"event: delta\ndata: {\"content\":\"x\"}\n").unwrap().is_empty());
        assert!(decoder.flush().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_json_is_a_decode_error() {
        let mut decoder = StreamDecoder::new();
        let err = decoder
            .feed(b"event: delta\ndata: {\"content\":\n")
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn test_events_before_malformed_record_are_emitted() {
        let mut decoder = StreamDecoder::new();
        let mut seen = Vec::new();
        let result = decoder.push(
            b"event: delta\ndata: {\"content\":\"ok\"}\nevent: delta\ndata: nope\n",
            |event| seen.push(event),
        );
        assert!(result.is_err());
        assert_eq!(seen, vec![StreamEvent::Delta("ok".to_string())]);
    }

    #[tokio::test]
    async fn test_pump_delivers_in_order() {
        let chunks: Vec<std::result::Result<Vec<u8>, ClientError>> = SCENARIO
            .as_bytes()
            .chunks(7)
            .map(|c| Ok(c.to_vec()))
            .collect();
        let mut recorder = Recorder::default();
        let outcome = pump_events(stream::iter(chunks), &CancellationToken::new(), &mut recorder).await;

        assert_eq!(outcome, StreamOutcome::Done);
        assert_eq!(recorder.events, scenario_events());
        assert!(recorder.errors.is_empty());
    }

    #[tokio::test]
    async fn test_pump_reports_end_of_stream_without_done() {
        let chunks: Vec<std::result::Result<Vec<u8>, ClientError>> =
            vec![Ok(b"event: delta\ndata: {\"content\":\"a\"}\n".to_vec())];
        let mut recorder = Recorder::default();
        let outcome = pump_events(stream::iter(chunks), &CancellationToken::new(), &mut recorder).await;

        assert_eq!(outcome, StreamOutcome::EndOfStream);
        assert_eq!(recorder.events, vec![StreamEvent::Delta("a".to_string())]);
    }

    #[tokio::test]
    async fn test_pump_routes_decode_failure_to_on_error() {
        let chunks: Vec<std::result::Result<Vec<u8>, ClientError>> =
            vec![Ok(b"event: delta\ndata: {broken\n".to_vec())];
        let mut recorder = Recorder::default();
        let outcome = pump_events(stream::iter(chunks), &CancellationToken::new(), &mut recorder).await;

        assert_eq!(outcome, StreamOutcome::Failed);
        assert_eq!(recorder.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_pump_routes_transport_failure_to_on_error() {
        let chunks: Vec<std::result::Result<Vec<u8>, ClientError>> = vec![
            Ok(b"event: delta\ndata: {\"content\":\"a\"}\n".to_vec()),
            Err(ClientError::Server("connection reset".to_string())),
        ];
        let mut recorder = Recorder::default();
        let outcome = pump_events(stream::iter(chunks), &CancellationToken::new(), &mut recorder).await;

        assert_eq!(outcome, StreamOutcome::Failed);
        assert_eq!(recorder.events, vec![StreamEvent::Delta("a".to_string())]);
        assert_eq!(recorder.errors, vec!["connection reset".to_string()]);
    }

    #[tokio::test]
    async fn test_abort_mid_stream_never_calls_on_error() {
        let cancel = CancellationToken::new();
        let first = stream::iter(vec![Ok::<_, ClientError>(
            b"event: delta\ndata: {\"content\":\"a\"}\n".to_vec(),
        )]);
        // Never yields again, so only the token can end the pump.
        let bytes = first.chain(stream::pending());

        let trigger = cancel.clone();
        let mut recorder = Recorder::default();
        let pump = pump_events(bytes, &cancel, &mut recorder);
        let cancel_later = async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        };
        let (outcome, ()) = tokio::join!(pump, cancel_later);

        assert_eq!(outcome, StreamOutcome::Aborted);
        assert_eq!(recorder.events, vec![StreamEvent::Delta("a".to_string())]);
        assert!(recorder.errors.is_empty());
    }
}
