use crate::application::notify::{Credential, DeliveryError, NotificationProvider};
use crate::domain::identity::{IdentityKey, IdentityKind};
use crate::domain::otp::{OTP_TTL_SECS, OtpCode};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn transport(e: reqwest::Error) -> DeliveryError {
    DeliveryError::Transport(e.without_url().to_string())
}

/// Bulk-SMS gateway speaking the common `route=otp` JSON API.
///
/// The credential goes in the `authorization` header. Delivery counts as successful
/// only when the response body carries `"return": true`.
pub struct SmsGatewayProvider {
    name: String,
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct SmsRequest<'a> {
    route: &'a str,
    variables_values: &'a str,
    numbers: &'a str,
}

#[derive(Deserialize)]
struct SmsResponse {
    #[serde(rename = "return", default)]
    accepted: bool,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

/// Body-level status the gateway uses for a bad or revoked key.
const SMS_INVALID_KEY_STATUS: u16 = 412;

impl SmsGatewayProvider {
    pub fn new(name: impl Into<String>, client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl NotificationProvider for SmsGatewayProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: IdentityKind) -> bool {
        kind == IdentityKind::Phone
    }

    async fn deliver(
        &self,
        credential: &Credential,
        recipient: &IdentityKey,
        code: &OtpCode,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("authorization", credential.expose())
            .json(&SmsRequest {
                route: "otp",
                variables_values: code.as_str(),
                numbers: recipient.as_str(),
            })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DeliveryError::Unauthorized);
        }

        let body: SmsResponse = response.json().await.map_err(transport)?;
        if body.status_code == Some(SMS_INVALID_KEY_STATUS) {
            return Err(DeliveryError::Unauthorized);
        }
        if body.accepted {
            Ok(())
        } else {
            Err(DeliveryError::Rejected(format!(
                "http {}, message {}",
                status.as_u16(),
                body.message.unwrap_or_default()
            )))
        }
    }
}

/// Transactional e-mail API that answers `201 Created` with a `messageId`.
///
/// The credential goes in the `api-key` header.
pub struct EmailApiProvider {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    sender: String,
    validity: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailRequest<'a> {
    sender: Mailbox<'a>,
    to: [Mailbox<'a>; 1],
    subject: &'a str,
    text_content: String,
}

#[derive(Serialize)]
struct Mailbox<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailResponse {
    #[serde(default)]
    message_id: Option<String>,
}

impl EmailApiProvider {
    pub fn new(
        name: impl Into<String>,
        client: reqwest::Client,
        endpoint: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            endpoint: endpoint.into(),
            sender: sender.into(),
            validity: Duration::from_secs(OTP_TTL_SECS),
        }
    }

    /// Sets how long the delivered code stays valid, as stated in the message body.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }
}

fn describe_validity(validity: Duration) -> String {
    let secs = validity.as_secs();
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 0 => format!("{} minutes", minutes),
        _ if secs == 1 => "1 second".to_string(),
        _ => format!("{} seconds", secs),
    }
}

#[async_trait]
impl NotificationProvider for EmailApiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, kind: IdentityKind) -> bool {
        kind == IdentityKind::Email
    }

    async fn deliver(
        &self,
        credential: &Credential,
        recipient: &IdentityKey,
        code: &OtpCode,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", credential.expose())
            .json(&EmailRequest {
                sender: Mailbox {
                    email: &self.sender,
                },
                to: [Mailbox {
                    email: recipient.as_str(),
                }],
                subject: "Your login code",
                text_content: format!(
                    "Your one-time login code is {}. It expires in {}.",
                    code.as_str(),
                    describe_validity(self.validity)
                ),
            })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DeliveryError::Unauthorized),
            StatusCode::CREATED => {
                let body: EmailResponse = response.json().await.map_err(transport)?;
                match body.message_id {
                    Some(id) if !id.is_empty() => Ok(()),
                    _ => Err(DeliveryError::Rejected(
                        "response carried no message id".to_string(),
                    )),
                }
            }
            other => Err(DeliveryError::Rejected(format!("http {}", other.as_u16()))),
        }
    }
}

/// Writes codes to the log instead of sending them. Only wired in mock mode.
pub struct LogProvider;

#[async_trait]
impl NotificationProvider for LogProvider {
    fn name(&self) -> &str {
        "log"
    }

    fn supports(&self, _kind: IdentityKind) -> bool {
        true
    }

    async fn deliver(
        &self,
        _credential: &Credential,
        recipient: &IdentityKey,
        code: &OtpCode,
    ) -> Result<(), DeliveryError> {
        tracing::info!(recipient = %recipient, code = code.as_str(), "mock otp delivery");
        Ok(())
    }
}
