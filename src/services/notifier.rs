//! Agent notifications.
//!
//! Recipients are pulled from stored listing attribution (agent, broker and
//! co-agent phone numbers), normalized to E.164 and deduplicated by number.
//! Each gets one rendered message. Delivery outcomes are reported back; the
//! core never retries a send.

use std::collections::HashSet;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{MessageTemplate, Property, TemplateContext};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("notifier not configured: missing {0}")]
    NotConfigured(&'static str),
}

/// Provider acknowledgement for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub to: String,
    pub message_id: Option<String>,
}

/// Outbound SMS delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<DeliveryReport, NotifyError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl TwilioOptions {
    /// Every field must be non-empty.
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.account_sid.is_empty() {
            return Err(NotifyError::NotConfigured("account SID"));
        }
        if self.auth_token.is_empty() {
            return Err(NotifyError::NotConfigured("auth token"));
        }
        if self.from_number.is_empty() {
            return Err(NotifyError::NotConfigured("sender phone number"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

/// Twilio Messages API notifier.
#[derive(Debug, Clone)]
pub struct TwilioNotifier {
    client: Client,
    options: TwilioOptions,
    api_base: String,
}

impl TwilioNotifier {
    pub fn new(options: TwilioOptions) -> Result<Self, NotifyError> {
        options.validate()?;
        Ok(Self {
            client: Client::new(),
            options,
            api_base: TWILIO_API_BASE.to_string(),
        })
    }

    /// Point at a different API root.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, self.options.account_sid
        )
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, to: &str, body: &str) -> Result<DeliveryReport, NotifyError> {
        let form = [
            ("To", to),
            ("From", self.options.from_number.as_str()),
            ("Body", body),
        ];
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let resource: MessageResource = response.json().await?;
        Ok(DeliveryReport {
            to: to.to_string(),
            message_id: resource.sid,
        })
    }
}

/// Normalize a US phone number to E.164.
///
/// Ten digits get a `+1` prefix, eleven digits get `+`; anything else is
/// rejected.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if matches!(trimmed, "" | "None" | "null") {
        return None;
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => Some(format!("+1{}", digits)),
        11 => Some(format!("+{}", digits)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientRole {
    Agent,
    Broker,
    CoAgent,
}

impl RecipientRole {
    fn fallback_name(self) -> &'static str {
        match self {
            RecipientRole::Agent => "Unknown Agent",
            RecipientRole::Broker => "Unknown Broker",
            RecipientRole::CoAgent => "Unknown Co-Agent",
        }
    }
}

/// A person to message, with the listing that surfaced them.
#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    pub name: String,
    pub role: RecipientRole,
    pub phone: String,
    pub property_address: String,
    pub property_price: Option<String>,
    pub search_area: String,
}

impl Recipient {
    pub fn context(&self) -> TemplateContext {
        TemplateContext {
            agent_name: self.name.clone(),
            property_address: self.property_address.clone(),
            property_price: self.property_price.clone().unwrap_or_default(),
            search_area: self.search_area.clone(),
        }
    }
}

/// Unique recipients across `properties`, first listing wins per number.
pub fn collect_recipients(properties: &[Property]) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    let mut recipients = Vec::new();

    for property in properties {
        let attr = &property.attribution;
        let candidates = [
            (RecipientRole::Agent, &attr.agent_name, &attr.agent_phone_number),
            (RecipientRole::Broker, &attr.broker_name, &attr.broker_phone_number),
            (RecipientRole::CoAgent, &attr.co_agent_name, &attr.co_agent_number),
        ];
        for (role, name, phone) in candidates {
            let Some(phone) = phone.as_deref().and_then(normalize_phone) else {
                continue;
            };
            if !seen.insert(phone.clone()) {
                continue;
            }
            recipients.push(Recipient {
                name: name
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| role.fallback_name().to_string()),
                role,
                phone,
                property_address: property.address.clone(),
                property_price: property.price.clone(),
                search_area: property.search_term.clone(),
            });
        }
    }
    recipients
}

/// Per-recipient delivery result.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub recipient: Recipient,
    pub message: String,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NotifySummary {
    pub total_recipients: usize,
    pub sent: usize,
    pub failed: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

/// Render and send one message per recipient.
pub async fn notify_agents(
    notifier: &dyn Notifier,
    template: &MessageTemplate,
    recipients: Vec<Recipient>,
) -> NotifySummary {
    let mut summary = NotifySummary {
        total_recipients: recipients.len(),
        ..Default::default()
    };

    for recipient in recipients {
        let message = template.render(&recipient.context());
        let mut outcome = DeliveryOutcome {
            recipient,
            message,
            message_id: None,
            error: None,
        };

        match notifier.send(&outcome.recipient.phone, &outcome.message).await {
            Ok(report) => {
                info!("Message sent to {}", outcome.recipient.phone);
                outcome.message_id = report.message_id;
            }
            Err(e) => {
                warn!("Failed to message {}: {}", outcome.recipient.phone, e);
                outcome.error = Some(e.to_string());
            }
        }

        if outcome.is_sent() {
            summary.sent += 1;
        } else {
            summary.failed += 1;
        }
        summary.outcomes.push(outcome);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, to: &str, body: &str) -> Result<DeliveryReport, NotifyError> {
            if self.reject.as_deref() == Some(to) {
                return Err(NotifyError::Rejected {
                    status: 400,
                    body: "invalid number".to_string(),
                });
            }
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok(DeliveryReport {
                to: to.to_string(),
                message_id: Some("SM1".to_string()),
            })
        }
    }

    fn listing(address: &str, agent: &str, phone: &str) -> Property {
        let mut p = Property::new("San Diego", address);
        p.price = Some("$500,000".to_string());
        p.attribution.agent_name = Some(agent.to_string());
        p.attribution.agent_phone_number = Some(phone.to_string());
        p
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("(619) 555-0100").as_deref(), Some("+16195550100"));
        assert_eq!(normalize_phone("1-619-555-0100").as_deref(), Some("+16195550100"));
        assert_eq!(normalize_phone("555-0100"), None);
        assert_eq!(normalize_phone("None"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn test_collect_recipients_dedupes_by_number() {
        let mut first = listing("1 Main St", "Jane Doe", "619-555-0100");
        first.attribution.broker_name = Some("Acme Realty".to_string());
        first.attribution.broker_phone_number = Some("619.555.0199".to_string());
        let second = listing("2 Main St", "Jane D.", "+1 619 555 0100");
        let mut third = Property::new("San Diego", "3 Main St");
        third.attribution.co_agent_number = Some("8585550111".to_string());

        let recipients = collect_recipients(&[first, second, third]);
        assert_eq!(recipients.len(), 3);
        assert_eq!(recipients[0].name, "Jane Doe");
        assert_eq!(recipients[0].property_address, "1 Main St");
        assert_eq!(recipients[1].role, RecipientRole::Broker);
        assert_eq!(recipients[2].name, "Unknown Co-Agent");
    }

    #[tokio::test]
    async fn test_notify_reports_each_outcome() {
        let notifier = RecordingNotifier {
            reject: Some("+18585550111".to_string()),
            ..Default::default()
        };
        let recipients = collect_recipients(&[
            listing("1 Main St", "Jane Doe", "6195550100"),
            listing("2 Main St", "Bob Roe", "8585550111"),
        ]);
        let template = MessageTemplate::new("t", "Hi {agent_name}, about {property_address}");

        let summary = notify_agents(&notifier, &template, recipients).await;
        assert_eq!(summary.total_recipients, 2);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.outcomes[0].message_id.as_deref(), Some("SM1"));

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "Hi Jane Doe, about 1 Main St");
    }

    #[test]
    fn test_recipient_context_renders_fallback() {
        let recipients = collect_recipients(&[listing("1 Main St", "Jane Doe", "6195550100")]);
        let message = MessageTemplate::fallback().render(&recipients[0].context());
        assert!(message.contains("Jane Doe"));
        assert!(message.contains("1 Main St"));
        assert!(message.contains("$500,000"));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let result = TwilioNotifier::new(TwilioOptions {
            account_sid: "AC1".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(NotifyError::NotConfigured("auth token"))));
    }

    #[tokio::test]
    async fn test_twilio_form_post() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let mut request = String::from_utf8_lossy(&buf[..n]).to_string();
            if !request.contains("Body=") {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                request.push_str(&String::from_utf8_lossy(&buf[..n]));
            }
            let body = r#"{"sid":"SM123"}"#;
            let reply = format!(
                "HTTP/1.1 201 Created\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            request
        });

        let notifier = TwilioNotifier::new(TwilioOptions {
            account_sid: "AC1".to_string(),
            auth_token: "secret".to_string(),
            from_number: "+15550001111".to_string(),
        })
        .unwrap()
        .with_api_base(format!("http://{}/", addr));

        let report = notifier.send("+16195550100", "hello").await.unwrap();
        assert_eq!(report.message_id.as_deref(), Some("SM123"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /Accounts/AC1/Messages.json"));
        assert!(request.to_lowercase().contains("authorization: basic"));
        assert!(request.contains("Body=hello"));
    }
}
