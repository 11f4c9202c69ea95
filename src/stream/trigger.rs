use super::{
    client::WorkflowClient,
    metrics::MetricsSink,
    processor::BatchProcessor,
    types::{BatchResponse, RawRecord},
};

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error};

type MetricsFactory<Sink> = Arc<dyn Fn() -> Sink + Send + Sync>;

/// The processing half of [`TriggerStream`].
struct TriggerStreamProducer<Client, Sink, Source>
where
    Client: WorkflowClient + 'static,
{
    processor: BatchProcessor<Client>,
    metrics: MetricsFactory<Sink>,
    source: Source,
    sender: mpsc::Sender<BatchResponse>,
}

impl<Client, Sink, Source, R> TriggerStreamProducer<Client, Sink, Source>
where
    Client: WorkflowClient + 'static,
    Sink: MetricsSink + 'static,
    Source: Stream<Item = Vec<R>> + Send + Unpin + 'static,
    R: RawRecord + Send + 'static,
{
    /// Process every batch of the source until it ends or the consumer goes away.
    async fn streaming(&mut self) {
        while let Some(records) = self.source.next().await {
            if self.sender.is_closed() {
                debug!("Trigger stream closed. Stop processing batches.");
                return;
            }

            let metrics = (self.metrics)();
            let response = self.processor.handle_raw_batch(records, &metrics).await;

            if let Err(err) = self.sender.send(response).await {
                error!("Unexpected error during sending batch response: {err}");
                return;
            }
        }
    }
}

/// Stream of [`BatchResponse`], one per batch taken from the source.
///
/// Each response lists the records of its batch whose workflow could not be started.
#[derive(Debug)]
pub struct TriggerStream {
    receiver: mpsc::Receiver<BatchResponse>,
}

impl TriggerStream {
    /// Stop processing. Responses already produced can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

impl Stream for TriggerStream {
    type Item = BatchResponse;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for TriggerStream {
    fn drop(&mut self) {
        self.receiver.close();
    }
}

/// A builder for [`TriggerStream`].
pub struct TriggerStreamBuilder<Client, Sink>
where
    Client: WorkflowClient + 'static,
{
    processor: Option<BatchProcessor<Client>>,
    metrics: Option<MetricsFactory<Sink>>,
    buffer: usize,
}

impl<Client, Sink> TriggerStreamBuilder<Client, Sink>
where
    Client: WorkflowClient + 'static,
    Sink: MetricsSink + 'static,
{
    /// Create a new `TriggerStreamBuilder`.
    pub fn new() -> Self {
        Self {
            processor: None,
            metrics: None,
            buffer: 100,
        }
    }

    /// Set the processor every batch is handed to.
    ///
    /// **Setting any processor is required** before the build method is called.
    pub fn processor(self, processor: BatchProcessor<Client>) -> Self {
        Self {
            processor: Some(processor),
            ..self
        }
    }

    /// Set the function creating a fresh metrics sink for every batch.
    ///
    /// **Setting any metrics factory is required** before the build method is called.
    pub fn metrics(self, metrics: impl Fn() -> Sink + Send + Sync + 'static) -> Self {
        Self {
            metrics: Some(Arc::new(metrics)),
            ..self
        }
    }

    /// Set the buffer for [`tokio::sync::mpsc::channel`](tokio::sync::mpsc::channel).
    ///
    /// Once the buffer is full, processing waits until responses are consumed.
    ///
    /// This method will panic when given zero as buffer size. If you omit calling this
    /// method, `100` is used as default value.
    pub fn buffer(self, buffer: usize) -> Self {
        if buffer == 0 {
            panic!("buffer must be positive.");
        }

        Self { buffer, ..self }
    }

    /// Consumes the builder and starts processing `source` in the background.
    ///
    /// This method will panic if no processor is set or no metrics factory is set.
    pub fn build<Source, R>(self, source: Source) -> TriggerStream
    where
        Source: Stream<Item = Vec<R>> + Send + Unpin + 'static,
        R: RawRecord + Send + 'static,
    {
        let processor = self.processor.expect("`processor` is required");
        let metrics = self.metrics.expect("`metrics` is required");

        let (tx, rx) = mpsc::channel::<BatchResponse>(self.buffer);

        let mut producer = TriggerStreamProducer {
            processor,
            metrics,
            source,
            sender: tx,
        };

        tokio::spawn(async move {
            producer.streaming().await;
        });

        TriggerStream { receiver: rx }
    }
}

impl<Client, Sink> Default for TriggerStreamBuilder<Client, Sink>
where
    Client: WorkflowClient + 'static,
    Sink: MetricsSink + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
