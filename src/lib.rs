//! # google-cloud-pubsub-http
//!
//! Google Cloud Platform pub/sub library over the REST API (v1).
//!
//! * [About Cloud Pub/Sub](https://cloud.google.com/pubsub/)
//! * [Pub/Sub REST Reference](https://cloud.google.com/pubsub/docs/reference/rest)
//!
//! Authentication uses a service account key (OAuth2 JWT bearer exchange)
//! or the GCE instance metadata endpoint, cached behind a self-refreshing
//! token provider. Against a local emulator (`is_emulator`) requests carry
//! no credentials at all.
//!
//! ## Quick Start
//!
//! ### Publish Message
//!
//! ```no_run
//! use std::collections::HashMap;
//! use google_cloud_pubsub_http::codec::RawCodec;
//! use google_cloud_pubsub_http::config::ProducerConfig;
//! use google_cloud_pubsub_http::error::Error;
//! use google_cloud_pubsub_http::model::{ProjectId, TopicName};
//! use google_cloud_pubsub_http::publisher::Publisher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = ProducerConfig::emulator("localhost", 8085);
//!     let publisher = Publisher::open(
//!         &ProjectId::from("local-project"),
//!         &TopicName::from("test-topic"),
//!         RawCodec,
//!         config,
//!     )
//!     .await?;
//!
//!     let message_id = publisher
//!         .produce(b"abc".to_vec(), HashMap::new(), "unique-1")
//!         .await?;
//!     println!("published: {message_id}");
//!     Ok(())
//! }
//! ```
//!
//! ### Subscribe Message
//!
//! ```no_run
//! use google_cloud_pubsub_http::config::ConsumerConfig;
//! use google_cloud_pubsub_http::error::Error;
//! use google_cloud_pubsub_http::model::{ProjectId, SubscriptionName};
//! use google_cloud_pubsub_http::subscriber::Subscriber;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = ConsumerConfig::emulator("localhost", 8085);
//!     let subscriber = Subscriber::open(
//!         &ProjectId::from("local-project"),
//!         &SubscriptionName::from("test-subscription"),
//!         config,
//!     )
//!     .await?;
//!
//!     while let Some(message) = subscriber.recv().await {
//!         println!("{:?}", message.message.data);
//!         message.ack();
//!     }
//!
//!     // Dropping the subscriber cancels the pull loops and batchers.
//!     Ok(())
//! }
//! ```
pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod publisher;
pub mod refresh;
pub mod subscriber;
