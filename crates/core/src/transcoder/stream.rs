//! Consumer handle for a running transcode.

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};

use super::error::TranscodeError;
use super::supervise::Halt;

/// Progress of a running ffmpeg job.
///
/// Yields `Ok(item)` for each progress step and at most one `Err` as the final
/// element; the stream ends after the process has exited. Dropping the stream
/// (or calling [`ProgressStream::cancel`]) kills the underlying process.
/// [`ProgressStream::stop`] instead asks ffmpeg to quit, so the output it
/// has written so far is finalized.
#[derive(Debug)]
pub struct ProgressStream<T> {
    rx: mpsc::Receiver<Result<T, TranscodeError>>,
    stop: watch::Sender<bool>,
}

impl<T> ProgressStream<T> {
    pub(crate) fn channel(capacity: usize) -> (ProgressSink<T>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            ProgressSink { tx, stop: stop_rx },
            Self { rx, stop: stop_tx },
        )
    }

    /// Stops the job. The child process is killed promptly.
    pub fn cancel(self) {
        drop(self);
    }

    /// Asks the running ffmpeg to quit by sending `q` on its stdin.
    ///
    /// ffmpeg closes the output file properly before exiting. Keep polling the
    /// stream: it ends once the process has exited, and no further phase is
    /// started. Falls back to a kill when the process cannot be reached.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Drains the stream and returns its last item, or the error that ended it.
    pub async fn finish(mut self) -> Result<Option<T>, TranscodeError> {
        let mut last = None;
        while let Some(item) = self.rx.recv().await {
            last = Some(item?);
        }
        Ok(last)
    }
}

impl<T> Stream for ProgressStream<T> {
    type Item = Result<T, TranscodeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Producer side of a [`ProgressStream`], owned by the driver task.
#[derive(Debug)]
pub(crate) struct ProgressSink<T> {
    tx: mpsc::Sender<Result<T, TranscodeError>>,
    stop: watch::Receiver<bool>,
}

impl<T> ProgressSink<T> {
    /// Publishes an item, waiting for buffer space. Fails once the consumer is
    /// gone.
    pub(crate) async fn emit(&self, item: T) -> Result<(), Halt> {
        self.tx.send(Ok(item)).await.map_err(|_| Halt::Cancelled)
    }

    /// Resolves when the consumer has dropped the stream.
    pub(crate) async fn closed(&self) {
        self.tx.closed().await
    }

    /// Whether the consumer asked for a graceful stop.
    pub(crate) fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolves once a graceful stop is requested. Yields `false` if the
    /// consumer went away without asking.
    pub(crate) async fn stop_requested(&self) -> bool {
        let mut stop = self.stop.clone();
        let requested = stop.wait_for(|stopped| *stopped).await.is_ok();
        requested
    }

    /// Runs `fut` unless the consumer goes away first; `fut` is dropped in
    /// that case.
    pub(crate) async fn or_cancelled<R, E>(
        &self,
        fut: impl Future<Output = Result<R, E>>,
    ) -> Result<R, Halt>
    where
        Halt: From<E>,
    {
        tokio::select! {
            _ = self.tx.closed() => Err(Halt::Cancelled),
            result = fut => result.map_err(Halt::from),
        }
    }

    /// Terminates the stream. A failure is delivered as the last element.
    pub(crate) async fn conclude(self, outcome: Result<(), Halt>) {
        match outcome {
            Ok(()) => tracing::debug!("Stream completed"),
            Err(Halt::Cancelled) => tracing::info!("Stream cancelled by consumer"),
            Err(Halt::Failed(e)) => {
                tracing::warn!(error = %e, "Stream failed");
                // Nobody to tell if the consumer already left.
                let _ = self.tx.send(Err(e)).await;
            }
        }
    }
}
