//! Progress events emitted while a spread is being generated.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Observable step of reading generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A section call was issued
    SectionStarted {
        /// Section label, e.g. `card:Outcome`
        section: String,
    },
    /// A section parsed and validated
    SectionCompleted {
        /// Section label
        section: String,
    },
    /// A section exhausted its retries
    SectionFailed {
        /// Section label
        section: String,
        /// Final error of the section
        error: String,
    },
    /// All sections were merged and the reading validated
    ReadingMerged {
        /// Number of merged sections
        sections: usize,
    },
}

/// Channel for progress events.
#[derive(Clone)]
pub struct ProgressChannel {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressChannel {
    /// Creates a channel and its receiving end.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Sends an event; dropped if the receiver is gone.
    pub fn send(&self, event: ProgressEvent) {
        if let Err(error) = self.sender.send(event) {
            debug!("Progress receiver closed, dropping {:?}", error.0);
        }
    }
}

impl Default for ProgressChannel {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (channel, mut receiver) = ProgressChannel::new();
        channel.send(ProgressEvent::SectionStarted {
            section: "advice".to_owned(),
        });
        channel.send(ProgressEvent::ReadingMerged { sections: 13 });
        drop(channel);

        assert_eq!(
            receiver.recv().await,
            Some(ProgressEvent::SectionStarted {
                section: "advice".to_owned()
            })
        );
        assert_eq!(receiver.recv().await, Some(ProgressEvent::ReadingMerged { sections: 13 }));
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn test_send_without_receiver_is_silent() {
        ProgressChannel::default().send(ProgressEvent::ReadingMerged { sections: 1 });
    }

    #[test]
    fn test_event_json_is_tagged() {
        let json = serde_json::to_value(ProgressEvent::SectionFailed {
            section: "card:Outcome".to_owned(),
            error: "budget".to_owned(),
        })
        .unwrap();
        assert_eq!(json["event"], "section_failed");
    }
}
