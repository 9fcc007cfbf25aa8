use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::auth;
use crate::codec::MessageDecoder;
use crate::config::ConsumerConfig;
use crate::error::Error;
use crate::http::entity::{PubsubMessage, PullRequest};
use crate::http::subscriber_client::SubscriberClient;
use crate::http::Authorizer;
use crate::model::{ProjectId, SubscriptionName};

/// A delivery handed to the caller.
///
/// `ack` and `nack` enqueue the ack id onto unbounded queues consumed by the
/// background batchers and never block. The client does not deduplicate
/// between the two queues: invoking both for the same delivery produces
/// undefined broker behavior.
pub struct ReceivedMessage {
    pub message: PubsubMessage,
    ack_id: String,
    ack_queue: async_channel::Sender<String>,
    nack_queue: async_channel::Sender<String>,
    client: SubscriberClient,
}

impl ReceivedMessage {
    pub fn ack_id(&self) -> &str {
        self.ack_id.as_str()
    }

    /// Queues the delivery for acknowledgement. After the subscriber is
    /// stopped the id is dropped and the broker's ack deadline applies.
    pub fn ack(&self) {
        let _ = self.ack_queue.try_send(self.ack_id.clone());
    }

    /// Queues the delivery for immediate redelivery.
    pub fn nack(&self) {
        let _ = self.nack_queue.try_send(self.ack_id.clone());
    }

    /// Extends the ack deadline of this delivery. Unlike `ack`/`nack` this
    /// calls the broker directly, not through a batcher.
    pub async fn extend_deadline(&self, deadline: Duration) -> Result<(), Error> {
        self.client
            .modify_ack_deadline(vec![self.ack_id.clone()], deadline)
            .await
    }

    /// Runs the caller-supplied decoder over the message payload.
    pub fn decode<A>(&self, decoder: &impl MessageDecoder<A>) -> Result<A, Error> {
        decoder.decode(&self.message.data).map_err(Error::Decode)
    }
}

/// Streaming subscriber: `read_concurrency` pull loops feeding a message
/// channel, plus one ack batcher and one nack batcher.
///
/// Dropping (or stopping) the subscriber cancels all of them; ack ids still
/// queued at that point are dropped and the messages redeliver once their
/// deadline lapses.
pub struct Subscriber {
    receiver: async_channel::Receiver<ReceivedMessage>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Subscriber {
    /// Acquires the token provider (none against the emulator) and starts
    /// the pull and batcher tasks.
    pub async fn open(
        project: &ProjectId,
        subscription: &SubscriptionName,
        config: ConsumerConfig,
    ) -> Result<Subscriber, Error> {
        let authorizer = if config.is_emulator {
            Authorizer::NoAuth
        } else {
            Authorizer::Bearer(auth::default_token_provider(&config.token).await?)
        };
        let client = SubscriberClient::new(
            reqwest::Client::new(),
            config.host.as_str(),
            config.port,
            project,
            subscription,
            authorizer,
        );
        Ok(Self::start(client, &config))
    }

    pub(crate) fn start(client: SubscriberClient, config: &ConsumerConfig) -> Subscriber {
        let cancel = CancellationToken::new();
        let (message_sender, message_receiver) = async_channel::unbounded::<ReceivedMessage>();
        let (ack_sender, ack_receiver) = async_channel::unbounded::<String>();
        let (nack_sender, nack_receiver) = async_channel::unbounded::<String>();

        let mut tasks = Vec::with_capacity(config.read_concurrency.max(1) + 2);
        for _ in 0..config.read_concurrency.max(1) {
            let worker = PullWorker {
                client: client.clone(),
                request: PullRequest {
                    return_immediately: config.read_return_immediately,
                    max_messages: config.read_max_messages,
                },
                message_sender: message_sender.clone(),
                ack_sender: ack_sender.clone(),
                nack_sender: nack_sender.clone(),
                cancel: cancel.clone(),
                on_failed_terminate: config.on_failed_terminate.clone(),
            };
            tasks.push(tokio::spawn(worker.run()));
        }
        drop(message_sender);

        tasks.push(tokio::spawn(run_batcher(
            client.clone(),
            ack_receiver,
            cancel.clone(),
            config.acknowledge_batch_size,
            config.acknowledge_batch_latency,
            AckKind::Ack,
        )));
        tasks.push(tokio::spawn(run_batcher(
            client,
            nack_receiver,
            cancel.clone(),
            config.acknowledge_batch_size,
            config.acknowledge_batch_latency,
            AckKind::Nack,
        )));

        Subscriber {
            receiver: message_receiver,
            cancel,
            tasks,
        }
    }

    /// Next message, in broker order within each pull response. `None` once
    /// every pull loop has terminated.
    pub async fn recv(&self) -> Option<ReceivedMessage> {
        self.receiver.recv().await.ok()
    }

    /// Cancels the pull loops and batchers without waiting for them.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Cancels everything and waits for the tasks to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct PullWorker {
    client: SubscriberClient,
    request: PullRequest,
    message_sender: async_channel::Sender<ReceivedMessage>,
    ack_sender: async_channel::Sender<String>,
    nack_sender: async_channel::Sender<String>,
    cancel: CancellationToken,
    on_failed_terminate: Option<Arc<dyn Fn(&Error) + Send + Sync>>,
}

impl PullWorker {
    async fn run(self) {
        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.client.pull(&self.request) => result,
            };
            match result {
                Ok(response) => {
                    for received in response.received_messages {
                        let message = ReceivedMessage {
                            message: received.message,
                            ack_id: received.ack_id,
                            ack_queue: self.ack_sender.clone(),
                            nack_queue: self.nack_sender.clone(),
                            client: self.client.clone(),
                        };
                        if self.message_sender.send(message).await.is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "pull failed; terminating stream");
                    if let Some(hook) = &self.on_failed_terminate {
                        hook(&err);
                    }
                    return;
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum AckKind {
    Ack,
    Nack,
}

/// Drains one queue into batches of up to `batch_size` ids, closing each
/// batch at most `latency` after its first id arrived.
async fn run_batcher(
    client: SubscriberClient,
    queue: async_channel::Receiver<String>,
    cancel: CancellationToken,
    batch_size: usize,
    latency: Duration,
    kind: AckKind,
) {
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => return,
            received = queue.recv() => match received {
                Ok(id) => id,
                Err(_) => return,
            },
        };

        let mut batch = Vec::with_capacity(batch_size);
        batch.push(first);
        let deadline = Instant::now() + latency;
        let mut queue_closed = false;
        while batch.len() < batch_size && !queue_closed {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => break,
                received = queue.recv() => match received {
                    Ok(id) => batch.push(id),
                    Err(_) => queue_closed = true,
                },
            }
        }

        let result = match kind {
            AckKind::Ack => client.acknowledge(batch).await,
            AckKind::Nack => client.nack(batch).await,
        };
        if let Err(err) = result {
            handle_batch_error(kind, &err);
        }
        if queue_closed {
            return;
        }
    }
}

/// Batcher failures are logged and never reach the message stream.
fn handle_batch_error(kind: AckKind, err: &Error) {
    match err {
        Error::NoAckIds => {
            tracing::warn!(kind = ?kind, "broker rejected an empty batch");
        }
        Error::Unknown(response) => {
            tracing::error!(
                kind = ?kind,
                code = response.error.code,
                status = response.error.status.as_str(),
                message = response.error.message.as_str(),
                "batch rejected by the broker"
            );
        }
        Error::UnparseableBody(body) => {
            tracing::error!(kind = ?kind, body = body.as_str(), "batch failed with an unrecognized body");
        }
        other => {
            tracing::error!(kind = ?kind, error = ?other, "batch dispatch failed");
        }
    }
}
