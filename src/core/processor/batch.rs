// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch execution: every message runs as its own unit of work, up to
//! `max_in_flight` at a time, and results come back in input order.

use super::dispatch::Outcome;
use super::marshal::MarshalMode;
use super::message::Message;
use super::DocumentProcessor;
use crate::core::error::ProcessError;
use crate::core::util::CancellationSignal;
use futures::stream::{self, StreamExt};
use log::debug;

pub(crate) async fn execute(
    processor: &DocumentProcessor,
    messages: Vec<Message>,
    signal: Option<&CancellationSignal>,
) -> Vec<Message> {
    if messages.is_empty() {
        return messages;
    }

    stream::iter(
        messages
            .into_iter()
            .enumerate()
            .map(|(index, message)| run_one(processor, index, message, signal)),
    )
    .buffered(processor.max_in_flight())
    .collect()
    .await
}

async fn run_one(
    processor: &DocumentProcessor,
    index: usize,
    mut message: Message,
    signal: Option<&CancellationSignal>,
) -> Message {
    let result = match signal {
        Some(signal) => match signal.fired() {
            Some(reason) => Err(ProcessError::Cancelled(reason)),
            None => {
                tokio::select! {
                    biased;
                    reason = signal.cancelled() => Err(ProcessError::Cancelled(reason)),
                    result = processor.process_message(&message) => result,
                }
            }
        },
        None => processor.process_message(&message).await,
    };

    if let Err(e) = apply(processor.marshal_mode(), &mut message, result) {
        debug!("[DocumentProcessor] Message {} failed: {}", index, e);
        message.set_error(e);
    }
    message
}

fn apply(
    mode: MarshalMode,
    message: &mut Message,
    result: Result<Outcome, ProcessError>,
) -> Result<(), ProcessError> {
    match result? {
        Outcome::PassThrough => Ok(()),
        Outcome::Document(document) => {
            message.set_payload(mode.marshal(document)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_apply_replaces_payload_for_documents_only() {
        let mut message = Message::new("original");
        apply(MarshalMode::Relaxed, &mut message, Ok(Outcome::PassThrough)).unwrap();
        assert_eq!(message.payload(), b"original");

        apply(
            MarshalMode::Relaxed,
            &mut message,
            Ok(Outcome::Document(doc! {"a": 1})),
        )
        .unwrap();
        assert_eq!(message.payload(), br#"{"a":1}"#);
    }

    #[test]
    fn test_apply_keeps_payload_on_error() {
        let mut message = Message::new("original");
        let err = apply(
            MarshalMode::Canonical,
            &mut message,
            Err(ProcessError::NoDocuments),
        )
        .unwrap_err();
        assert_eq!(err, ProcessError::NoDocuments);
        assert_eq!(message.payload(), b"original");
    }
}
