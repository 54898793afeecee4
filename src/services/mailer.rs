use anyhow::{anyhow, Result};
use serde_json::json;

const SEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// Outbound email over the provider's JSON API. Without an API key the
/// mailer runs disabled and logs the message body instead of sending,
/// which keeps local development working without credentials.
pub struct Mailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
}

impl Mailer {
    pub fn new(api_key: Option<String>, from: String) -> Self {
        if api_key.is_none() {
            tracing::warn!("EMAIL_API_KEY not set, email sending disabled");
        }
        Self {
            client: reqwest::Client::new(),
            api_key,
            from,
        }
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let Some(api_key) = &self.api_key else {
            tracing::info!("email disabled; would send to {to}: {subject}\n{html}");
            return Ok(());
        };

        let resp = self
            .client
            .post(SEND_ENDPOINT)
            .bearer_auth(api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = resp.json().await?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("mail API returned no message id"))?;
        tracing::debug!("email sent to {to}, provider id {id}");
        Ok(())
    }

    pub async fn send_verification_code(&self, to: &str, code: &str) -> Result<()> {
        let subject = "Your TeamPulse Check-in Verification Code";
        let html = format!(
            r#"<h1>TeamPulse Check-in Verification</h1>
<p>Enter the following code on the check-in page to verify your email address.</p>
<p style="font-size: 24px; font-weight: bold; letter-spacing: 2px;">{code}</p>
<p>This code will expire in 10 minutes.</p>
<p>If you did not request this code, please ignore this email.</p>"#
        );
        self.send(to, subject, &html).await
    }

    pub async fn send_manager_invite(&self, to: &str, invite_link: &str) -> Result<()> {
        let subject = "You're Invited to Manage on TeamPulse";
        let html = format!(
            r#"<h1>TeamPulse Manager Invitation</h1>
<p>You have been invited to become a manager on the TeamPulse platform.</p>
<p>Click the link below to create your account. This link will expire in 24 hours.</p>
<p><a href="{invite_link}">Create Your Manager Account</a></p>
<p>If you did not expect this invitation, please ignore this email.</p>"#
        );
        self.send(to, subject, &html).await
    }

    pub async fn send_regional_message(&self, to: &str, message: &str) -> Result<()> {
        let subject = "Message from Your Manager";
        let html = format!(
            r#"<h1>Message from Your Manager</h1>
<p>Hello,</p>
<div style="padding: 15px; border-left: 4px solid #4f46e5;">{message}</div>
<p>This message was sent to all team members in your region.</p>"#
        );
        self.send(to, subject, &html).await
    }
}
