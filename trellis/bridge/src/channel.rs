//! Text-frame channels between contexts.
//!
//! Each direction is one unbounded tokio channel carrying JSON text, so
//! delivery is order-preserving and the two contexts share no memory.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::envelope::encode;
use crate::error::{BridgeError, Result};

/// One end of a context-to-context channel.
///
/// An end may be send-only, receive-only or both.
#[derive(Debug)]
pub struct ChannelEnd {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: Option<mpsc::UnboundedReceiver<String>>,
    log_frames: bool,
}

impl ChannelEnd {
    /// Create two connected ends. Each end's sends arrive at the other.
    pub fn bidirectional() -> (Self, Self) {
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        (
            Self::from_parts(Some(tx1), Some(rx2)),
            Self::from_parts(Some(tx2), Some(rx1)),
        )
    }

    pub(crate) fn from_parts(
        tx: Option<mpsc::UnboundedSender<String>>,
        rx: Option<mpsc::UnboundedReceiver<String>>,
    ) -> Self {
        Self {
            tx,
            rx,
            log_frames: false,
        }
    }

    /// Log every frame at debug level.
    pub fn log_frames(mut self, enabled: bool) -> Self {
        self.log_frames = enabled;
        self
    }

    pub fn can_send(&self) -> bool {
        self.tx.is_some()
    }

    pub fn can_receive(&self) -> bool {
        self.rx.is_some()
    }

    /// Encode and send a frame.
    pub fn send<T: Serialize>(&self, frame: &T) -> Result<()> {
        self.send_text(encode(frame)?)
    }

    /// Send an already encoded frame.
    pub fn send_text(&self, text: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(BridgeError::ChannelClosed)?;
        if self.log_frames {
            debug!(frame = %text, "send frame");
        }
        tx.send(text).map_err(|_| BridgeError::ChannelClosed)
    }

    /// Wait for the next frame. `None` once the other side is gone.
    pub async fn recv_text(&mut self) -> Option<String> {
        let text = self.rx.as_mut()?.recv().await?;
        if self.log_frames {
            debug!(frame = %text, "received frame");
        }
        Some(text)
    }

    /// Take the next frame if one is waiting.
    pub fn try_recv_text(&mut self) -> Option<String> {
        self.rx.as_mut()?.try_recv().ok()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Option<mpsc::UnboundedSender<String>>,
        Option<mpsc::UnboundedReceiver<String>>,
    ) {
        (self.tx, self.rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::Value;

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (left, mut right) = ChannelEnd::bidirectional();
        left.send(&Value::from(1)).unwrap();
        left.send(&Value::from(2)).unwrap();

        assert_eq!(right.recv_text().await.as_deref(), Some("1"));
        assert_eq!(right.try_recv_text().as_deref(), Some("2"));
        assert!(right.try_recv_text().is_none());
    }

    #[test]
    fn send_after_drop_is_channel_closed() {
        let (left, right) = ChannelEnd::bidirectional();
        drop(right);
        assert!(matches!(
            left.send_text("x".to_string()),
            Err(BridgeError::ChannelClosed)
        ));
    }

    #[test]
    fn one_way_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = ChannelEnd::from_parts(Some(tx), None);
        let mut receiver = ChannelEnd::from_parts(None, Some(rx));

        assert!(sender.can_send() && !sender.can_receive());
        assert!(receiver.can_receive() && !receiver.can_send());
        assert!(matches!(
            receiver.send_text("x".to_string()),
            Err(BridgeError::ChannelClosed)
        ));
        sender.send_text("hello".to_string()).unwrap();
        assert_eq!(receiver.try_recv_text().as_deref(), Some("hello"));
    }
}
