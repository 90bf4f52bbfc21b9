//! SQS client speaking the JSON protocol (`x-amz-json-1.0`) over signed
//! HTTPS requests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::errors::QueueError;
use crate::queue::{MessageQueue, QueueMessage};

use super::sigv4::{sign_request, AwsCredentials};

pub struct SqsQueue {
    client: reqwest::Client,
    queue_url: String,
    host: String,
    region: String,
    creds: AwsCredentials,
}

#[derive(Deserialize)]
struct ReceiveMessageResponse {
    #[serde(rename = "Messages", default)]
    messages: Vec<SqsMessage>,
}

#[derive(Deserialize)]
struct SqsMessage {
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: String,
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "Attributes", default)]
    attributes: HashMap<String, String>,
}

impl SqsQueue {
    pub fn new(queue_url: String, region: String, creds: AwsCredentials) -> Self {
        let host = queue_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();

        Self {
            client: reqwest::Client::new(),
            queue_url,
            host,
            region,
            creds,
        }
    }

    async fn call(&self, target: &str, body: serde_json::Value) -> Result<String, QueueError> {
        let payload = body.to_string();
        let extra_headers = vec![(
            "x-amz-target".to_string(),
            format!("AmazonSQS.{}", target),
        )];

        let signed = sign_request(
            "POST",
            &self.host,
            "/",
            "",
            &extra_headers,
            payload.as_bytes(),
            "sqs",
            &self.region,
            &self.creds,
            Utc::now(),
        );

        let mut req = self
            .client
            .post(format!("https://{}/", self.host))
            .header("Authorization", &signed.authorization)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header("x-amz-target", format!("AmazonSQS.{}", target))
            .header("Content-Type", "application/x-amz-json-1.0")
            .body(payload);

        if let Some(ref token) = signed.security_token {
            req = req.header("x-amz-security-token", token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(QueueError::Transport(format!(
                "SQS {} failed (HTTP {}): {}",
                target,
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        Ok(text)
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: &str) -> Result<(), QueueError> {
        self.call(
            "SendMessage",
            json!({
                "QueueUrl": self.queue_url,
                "MessageBody": body,
            }),
        )
        .await?;
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: u32,
        wait: Duration,
        visibility: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let text = self
            .call(
                "ReceiveMessage",
                json!({
                    "QueueUrl": self.queue_url,
                    "MaxNumberOfMessages": max_messages,
                    "WaitTimeSeconds": wait.as_secs(),
                    "VisibilityTimeout": visibility.as_secs(),
                    "MessageSystemAttributeNames": ["ApproximateReceiveCount"],
                }),
            )
            .await?;

        let parsed: ReceiveMessageResponse = serde_json::from_str(&text)
            .map_err(|e| QueueError::Transport(format!("unexpected SQS response: {}", e)))?;

        Ok(parsed
            .messages
            .into_iter()
            .map(|m| {
                let receive_count = m
                    .attributes
                    .get("ApproximateReceiveCount")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1);
                QueueMessage {
                    body: m.body,
                    receipt_handle: m.receipt_handle,
                    receive_count,
                }
            })
            .collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.call(
            "DeleteMessage",
            json!({
                "QueueUrl": self.queue_url,
                "ReceiptHandle": receipt_handle,
            }),
        )
        .await?;
        Ok(())
    }
}
