use crate::error::Error;
use crate::http::entity::{PublishRequest, PublishResponse, PubsubMessage};
use crate::http::{base_url, Authorizer};
use crate::model::{ProjectId, TopicName};

/// REST client for the topic-scoped publish endpoint.
#[derive(Clone)]
pub struct PublisherClient {
    http: reqwest::Client,
    /// `{scheme}://{host}:{port}/v1/projects/{project}/topics/{topic}`
    topic_url: String,
    authorizer: Authorizer,
}

impl PublisherClient {
    pub fn new(
        http: reqwest::Client,
        host: &str,
        port: u16,
        project: &ProjectId,
        topic: &TopicName,
        authorizer: Authorizer,
    ) -> PublisherClient {
        PublisherClient {
            http,
            topic_url: format!("{}/v1/projects/{}/topics/{}", base_url(host, port), project, topic),
            authorizer,
        }
    }

    /// Publishes one bundle and returns the server-assigned message ids,
    /// in request order.
    pub async fn publish(&self, messages: Vec<PubsubMessage>) -> Result<Vec<String>, Error> {
        let request = PublishRequest { messages };
        let builder = self.http.post(format!("{}:publish", self.topic_url)).json(&request);
        let response = self.authorizer.authorize(builder).await?.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::FailedRequest(status, body));
        }
        Ok(response.json::<PublishResponse>().await?.message_ids)
    }
}
