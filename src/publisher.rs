use std::collections::HashMap;
use std::marker::PhantomData;

use crate::auth;
use crate::codec::MessageEncoder;
use crate::config::ProducerConfig;
use crate::error::Error;
use crate::http::entity::PubsubMessage;
use crate::http::publisher_client::PublisherClient;
use crate::http::Authorizer;
use crate::model::{ProjectId, TopicName};

/// Outbound record. `unique_id` is a client-chosen correlator carried as the
/// wire `messageId`; the broker assigns its own id on the response side.
#[derive(Debug, Clone)]
pub struct Record<A> {
    pub data: A,
    pub attributes: HashMap<String, String>,
    pub unique_id: String,
}

/// Publisher for one topic, parameterized over the payload encoder.
///
/// Publishing happens on the caller's task; the only background work is the
/// token refresh owned by the authorizer.
pub struct Publisher<A, E> {
    client: PublisherClient,
    encoder: E,
    _marker: PhantomData<fn(A)>,
}

impl<A, E> Publisher<A, E>
where
    E: MessageEncoder<A>,
{
    /// Acquires the token provider (none against the emulator) and builds
    /// the publisher.
    pub async fn open(
        project: &ProjectId,
        topic: &TopicName,
        encoder: E,
        config: ProducerConfig,
    ) -> Result<Publisher<A, E>, Error> {
        let authorizer = if config.is_emulator {
            Authorizer::NoAuth
        } else {
            Authorizer::Bearer(auth::default_token_provider(&config.token).await?)
        };
        let client = PublisherClient::new(
            reqwest::Client::new(),
            config.host.as_str(),
            config.port,
            project,
            topic,
            authorizer,
        );
        Ok(Self::with_client(client, encoder))
    }

    pub(crate) fn with_client(client: PublisherClient, encoder: E) -> Publisher<A, E> {
        Publisher {
            client,
            encoder,
            _marker: PhantomData,
        }
    }

    /// Publishes one record and returns the server-assigned message id.
    pub async fn produce(
        &self,
        data: A,
        attributes: HashMap<String, String>,
        unique_id: impl Into<String>,
    ) -> Result<String, Error> {
        let record = Record {
            data,
            attributes,
            unique_id: unique_id.into(),
        };
        self.produce_many(vec![record])
            .await?
            .into_iter()
            .next()
            .ok_or(Error::MissingMessageId)
    }

    /// Publishes a bundle in one request and returns the server-assigned
    /// message ids in record order. An encoder failure aborts the whole
    /// bundle before anything is sent.
    pub async fn produce_many(&self, records: Vec<Record<A>>) -> Result<Vec<String>, Error> {
        let mut messages = Vec::with_capacity(records.len());
        for record in records {
            let data = self.encoder.encode(&record.data).map_err(Error::Encode)?;
            messages.push(PubsubMessage {
                data,
                attributes: record.attributes,
                message_id: record.unique_id,
                publish_time: None,
                ordering_key: None,
            });
        }
        self.client.publish(messages).await
    }
}
