//! The dual-channel result of a streaming completion.
//!
//! Text deltas arrive on one channel; a terminal error, if any, on another.
//! The producer sends the error before closing the text channel, so a
//! consumer that drains the text and then checks the error channel always
//! sees the outcome.

use tokio::sync::{mpsc, oneshot};

use crate::error::CompletionError;

/// Default text channel capacity.
pub const TEXT_CHANNEL_CAPACITY: usize = 64;

/// Consumer handle of a streaming completion.
#[derive(Debug)]
pub struct TextStreamResult {
    /// Incremental text. Closes when the operation ends, by any path.
    pub stream: mpsc::Receiver<String>,

    /// Receives at most one value. Closed without a value on success.
    pub err: oneshot::Receiver<CompletionError>,
}

/// Producer handle of a streaming completion.
///
/// Dropped without [`StreamSender::finish`] (the producing task panicked or
/// was aborted), it reports [`CompletionError::Aborted`].
#[derive(Debug)]
pub struct StreamSender {
    text: Option<mpsc::Sender<String>>,
    err: Option<oneshot::Sender<CompletionError>>,
}

impl TextStreamResult {
    /// Create a connected producer/consumer pair.
    pub fn channel() -> (StreamSender, TextStreamResult) {
        Self::with_capacity(TEXT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (StreamSender, TextStreamResult) {
        let (text_tx, text_rx) = mpsc::channel(capacity);
        let (err_tx, err_rx) = oneshot::channel();
        (
            StreamSender { text: Some(text_tx), err: Some(err_tx) },
            TextStreamResult { stream: text_rx, err: err_rx },
        )
    }

    /// Next text delta, or `None` once the operation has ended.
    pub async fn next_delta(&mut self) -> Option<String> {
        self.stream.recv().await
    }

    /// Wait for the outcome. Call after the text channel has closed.
    pub async fn outcome(self) -> Result<(), CompletionError> {
        match self.err.await {
            Ok(err) => Err(err),
            Err(_) => Ok(()),
        }
    }

    /// Drain all text and return it, or the terminal error.
    pub async fn read_all(mut self) -> Result<String, CompletionError> {
        let mut out = String::new();
        while let Some(delta) = self.stream.recv().await {
            out.push_str(&delta);
        }
        self.outcome().await.map(|()| out)
    }
}

impl StreamSender {
    /// Deliver one delta. Returns false if the consumer is gone.
    pub async fn send_text(&self, text: String) -> bool {
        match &self.text {
            Some(tx) => tx.send(text).await.is_ok(),
            None => false,
        }
    }

    /// Resolves once the consumer has dropped its text receiver.
    pub async fn consumer_gone(&self) {
        match &self.text {
            Some(tx) => tx.closed().await,
            None => std::future::pending().await,
        }
    }

    /// End the operation: the error (if any) is sent first, then the text
    /// channel closes.
    pub fn finish(mut self, result: Result<(), CompletionError>) {
        let err_tx = self.err.take();
        if let (Err(err), Some(tx)) = (result, err_tx) {
            let _ = tx.send(err);
        }
        self.text = None;
    }
}

impl Drop for StreamSender {
    fn drop(&mut self) {
        if let Some(tx) = self.err.take() {
            let _ = tx.send(CompletionError::Aborted);
        }
        self.text = None;
    }
}
