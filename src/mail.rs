//! Mail delivery via the Resend HTTP API.
//!
//! A bounce/invalid-address signal is a delivery *outcome*, not an error —
//! the sender marks the message bounced and moves on. Anything else non-2xx
//! is a transient fault and the message stays queued for the next cycle.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::error::MailError;

const API_URL: &str = "https://api.resend.com/emails";

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Accepted by the provider.
    Delivered,
    /// Hard failure on the destination address. Terminal for the message.
    Bounced { reason: String },
}

/// Mail delivery service.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<SendOutcome, MailError>;
}

/// Resend API client.
pub struct ResendMailer {
    http: reqwest::Client,
    api_key: SecretString,
}

impl ResendMailer {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<SendOutcome, MailError> {
        let resp = self
            .http
            .post(API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({
                "from": from,
                "to": [to],
                "subject": subject,
                "html": html_body,
            }))
            .send()
            .await
            .map_err(|e| MailError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(SendOutcome::Delivered);
        }

        let body = resp.text().await.unwrap_or_default();
        if is_bounce_signal(&body) {
            return Ok(SendOutcome::Bounced { reason: body });
        }

        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Whether a provider error body indicates a hard address failure.
pub fn is_bounce_signal(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("bounce") || lower.contains("invalid")
}

/// Convert a plain-text email body to simple HTML with the sender signature.
pub fn to_html(body: &str) -> String {
    let paragraphs = body.replace("\n\n", "</p><p>").replace('\n', "<br>");

    let signature = r#"
    <div style="margin-top: 28px; padding-top: 16px; border-top: 1px solid #d4d4d4; font-family: Arial, Helvetica, sans-serif;">
        <p style="margin: 0 0 2px 0; font-size: 14px; font-weight: 600; color: #1a1a1a;">Justin Mendelson</p>
        <p style="margin: 0 0 10px 0; font-size: 12px; color: #666;">Founder</p>
        <table cellpadding="0" cellspacing="0" style="font-size: 12px; color: #555;">
            <tr>
                <td style="padding-right: 12px; border-right: 1px solid #d4d4d4;">
                    <a href="https://leaseflex.io" style="color: #1a1a1a; text-decoration: none; font-weight: 600;">LeaseFlex</a>
                </td>
                <td style="padding: 0 12px; border-right: 1px solid #d4d4d4;">
                    <a href="mailto:justin@leaseflex.io" style="color: #555; text-decoration: none;">justin@leaseflex.io</a>
                </td>
                <td style="padding: 0 12px; border-right: 1px solid #d4d4d4;">
                    <a href="tel:+12125551234" style="color: #555; text-decoration: none;">(212) 555-1234</a>
                </td>
                <td style="padding-left: 12px;">
                    <span style="color: #555;">200 West 67th St, New York, NY</span>
                </td>
            </tr>
        </table>
    </div>
    "#;

    format!(
        "<div style=\"font-family: sans-serif; font-size: 14px; color: #333; line-height: 1.6;\"><p>{paragraphs}</p>{signature}</div>"
    )
}
