use std::time::Duration;

use crate::error::Error;
use crate::http::entity::{AcknowledgeRequest, ModifyAckDeadlineRequest, PullRequest, PullResponse};
use crate::http::{base_url, classify_error, Authorizer};
use crate::model::{ProjectId, SubscriptionName};

/// REST client for the subscription-scoped endpoints.
#[derive(Clone)]
pub struct SubscriberClient {
    http: reqwest::Client,
    /// `{scheme}://{host}:{port}/v1/projects/{project}/subscriptions/{subscription}`
    subscription_url: String,
    authorizer: Authorizer,
}

impl SubscriberClient {
    pub fn new(
        http: reqwest::Client,
        host: &str,
        port: u16,
        project: &ProjectId,
        subscription: &SubscriptionName,
        authorizer: Authorizer,
    ) -> SubscriberClient {
        SubscriberClient {
            http,
            subscription_url: format!(
                "{}/v1/projects/{}/subscriptions/{}",
                base_url(host, port),
                project,
                subscription
            ),
            authorizer,
        }
    }

    /// One unary pull. The returned messages keep the broker's order.
    pub async fn pull(&self, request: &PullRequest) -> Result<PullResponse, Error> {
        let builder = self.http.post(format!("{}:pull", self.subscription_url)).json(request);
        let response = self.authorizer.authorize(builder).await?.send().await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        let body = response.text().await?;
        match serde_json::from_str::<PullResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(err) => {
                tracing::error!(body = body.as_str(), "malformed pull response");
                Err(err.into())
            }
        }
    }

    /// Acknowledges the given deliveries.
    pub async fn acknowledge(&self, ack_ids: Vec<String>) -> Result<(), Error> {
        let request = AcknowledgeRequest { ack_ids };
        let builder = self
            .http
            .post(format!("{}:acknowledge", self.subscription_url))
            .json(&request);
        let response = self.authorizer.authorize(builder).await?.send().await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        Ok(())
    }

    /// Makes the deliveries immediately re-deliverable
    /// (`modifyAckDeadline` with 0 seconds).
    pub async fn nack(&self, ack_ids: Vec<String>) -> Result<(), Error> {
        self.modify_ack_deadline(ack_ids, Duration::ZERO).await
    }

    /// Extends (or shortens) the ack deadline of the given deliveries.
    pub async fn modify_ack_deadline(&self, ack_ids: Vec<String>, deadline: Duration) -> Result<(), Error> {
        let request = ModifyAckDeadlineRequest {
            ack_ids,
            ack_deadline_seconds: deadline.as_secs() as i32,
        };
        let builder = self
            .http
            .post(format!("{}:modifyAckDeadline", self.subscription_url))
            .json(&request);
        let response = self.authorizer.authorize(builder).await?.send().await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        Ok(())
    }
}
