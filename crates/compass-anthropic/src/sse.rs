// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic streaming responses.
//!
//! Converts a reqwest response body into typed [`StreamEvent`]s using
//! `eventsource-stream` for the SSE framing.

use std::pin::Pin;

use compass_core::CompassError;
use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::types::{SseContentBlockDelta, SseError, SseMessageDelta, SseMessageStart};

/// Typed SSE events of the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart(SseMessageStart),
    ContentBlockDelta(SseContentBlockDelta),
    MessageDelta(SseMessageDelta),
    MessageStop,
    Ping,
    Error(SseError),
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, CompassError>> + Send>>;

fn parse<T: DeserializeOwned>(event: &str, data: &str) -> Result<T, CompassError> {
    serde_json::from_str(data).map_err(|e| CompassError::Provider {
        message: format!("failed to parse {event}: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Maps one raw SSE event to a [`StreamEvent`].
///
/// Returns `None` for events the proxy does not relay: content block
/// boundaries and event types added by future API versions.
pub fn decode_event(event: &str, data: &str) -> Option<Result<StreamEvent, CompassError>> {
    let parsed = match event {
        "message_start" => parse(event, data).map(StreamEvent::MessageStart),
        "content_block_delta" => parse(event, data).map(StreamEvent::ContentBlockDelta),
        "message_delta" => parse(event, data).map(StreamEvent::MessageDelta),
        "message_stop" => Ok(StreamEvent::MessageStop),
        "ping" => Ok(StreamEvent::Ping),
        "error" => parse(event, data).map(StreamEvent::Error),
        _ => return None,
    };
    Some(parsed)
}

/// Parses a streaming response body into [`StreamEvent`]s.
pub fn parse_sse_stream(response: reqwest::Response) -> EventStream {
    let events = response.bytes_stream().eventsource();

    let mapped = events.filter_map(|result| async move {
        match result {
            Ok(event) => decode_event(&event.event, &event.data),
            Err(e) => Some(Err(CompassError::Provider {
                message: format!("SSE stream error: {e}"),
                source: None,
            })),
        }
    });

    Box::pin(mapped)
}
