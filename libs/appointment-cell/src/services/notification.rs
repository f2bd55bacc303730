use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::Appointment;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Mail API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Outbound appointment notices. Callers log and drop failures; nothing is retried.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_appointment_booked(&self, appointment: &Appointment) -> Result<(), NotificationError>;

    async fn send_appointment_cancelled(&self, appointment: &Appointment) -> Result<(), NotificationError>;

    async fn send_appointment_completed(&self, appointment: &Appointment) -> Result<(), NotificationError>;
}

struct Message {
    subject: String,
    text: String,
}

fn booked_message(appointment: &Appointment) -> Message {
    Message {
        subject: format!("Appointment {} confirmed", appointment.appointment_id),
        text: format!(
            "Hi {}, your consultation with {} is booked for {}. Fee: {}.",
            appointment.user_data.name,
            appointment.doc_data.name,
            appointment.slot_time.format("%Y-%m-%d %H:%M"),
            appointment.amount
        ),
    }
}

fn cancelled_message(appointment: &Appointment) -> Message {
    Message {
        subject: format!("Appointment {} cancelled", appointment.appointment_id),
        text: format!(
            "Hi {}, your consultation with {} on {} has been cancelled.",
            appointment.user_data.name,
            appointment.doc_data.name,
            appointment.slot_time.format("%Y-%m-%d %H:%M")
        ),
    }
}

fn completed_message(appointment: &Appointment) -> Message {
    Message {
        subject: format!("Appointment {} completed", appointment.appointment_id),
        text: format!(
            "Hi {}, thank you for consulting {}.",
            appointment.user_data.name, appointment.doc_data.name
        ),
    }
}

/// Sends plain-text mail through an HTTP mail API (`POST {url}` with a bearer key).
pub struct EmailNotificationSender {
    client: Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl EmailNotificationSender {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_endpoint(&config.mail_api_url, &config.mail_api_key, &config.mail_from)
    }

    pub fn with_endpoint(api_url: &str, api_key: &str, from: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        }
    }

    async fn send(&self, to: &str, message: Message) -> Result<(), NotificationError> {
        debug!("Sending '{}' to {}", message.subject, to);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": message.subject,
                "text": message.text
            }))
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Mail API error ({}): {}", status, body);
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSender for EmailNotificationSender {
    async fn send_appointment_booked(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        self.send(&appointment.user_data.email, booked_message(appointment)).await
    }

    async fn send_appointment_cancelled(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        self.send(&appointment.user_data.email, cancelled_message(appointment)).await
    }

    async fn send_appointment_completed(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        self.send(&appointment.user_data.email, completed_message(appointment)).await
    }
}

/// Writes notices to the log. Used when no mail API is configured.
#[derive(Debug, Default)]
pub struct LogNotificationSender;

#[async_trait]
impl NotificationSender for LogNotificationSender {
    async fn send_appointment_booked(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        info!("[mail disabled] {}", booked_message(appointment).subject);
        Ok(())
    }

    async fn send_appointment_cancelled(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        info!("[mail disabled] {}", cancelled_message(appointment).subject);
        Ok(())
    }

    async fn send_appointment_completed(&self, appointment: &Appointment) -> Result<(), NotificationError> {
        info!("[mail disabled] {}", completed_message(appointment).subject);
        Ok(())
    }
}
