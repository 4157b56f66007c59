//! Contact form submission.
//!
//! Posts the site's "get in touch" form to a hosted form service.

use serde::Serialize;
use thiserror::Error;

use crate::config::ContactSettings;

/// Shown after a successful submission
pub const CONTACT_SUCCESS_MESSAGE: &str = "Thank you for your message! We'll get back to you soon.";

/// Shown when submission fails for any reason
pub const CONTACT_FAILURE_MESSAGE: &str =
    "Sorry, there was an error sending your message. Please try again.";

/// What the visitor filled in
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContactForm {
    /// Visitor name
    pub name: String,
    /// Reply address
    pub email: String,
    /// Optional company
    pub company: Option<String>,
    /// Free-form message
    pub message: String,
}

impl ContactForm {
    /// Check required fields
    ///
    /// # Errors
    ///
    /// [`ContactError::Invalid`] naming the first problem found.
    pub fn validate(&self) -> Result<(), ContactError> {
        if self.name.trim().is_empty() {
            return Err(ContactError::Invalid("name is required"));
        }
        if self.email.trim().is_empty() {
            return Err(ContactError::Invalid("email is required"));
        }
        if !self.email.contains('@') {
            return Err(ContactError::Invalid("email address is not valid"));
        }
        if self.message.trim().is_empty() {
            return Err(ContactError::Invalid("message is required"));
        }
        Ok(())
    }

    /// Body sent to the form service
    #[must_use]
    pub fn payload(&self, recipient: Option<&str>) -> ContactPayload {
        ContactPayload {
            name: self.name.clone(),
            email: self.email.clone(),
            company: self
                .company
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "Not provided".to_string()),
            message: self.message.clone(),
            reply_to: self.email.clone(),
            subject: format!("NavianAI Inquiry from {}", self.name),
            to: recipient.map(str::to_string),
        }
    }
}

/// JSON body accepted by the form service
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContactPayload {
    name: String,
    email: String,
    company: String,
    message: String,
    #[serde(rename = "_replyto")]
    reply_to: String,
    #[serde(rename = "_subject")]
    subject: String,
    #[serde(rename = "_to", skip_serializing_if = "Option::is_none")]
    to: Option<String>,
}

/// Errors submitting the form
#[derive(Debug, Error)]
pub enum ContactError {
    /// A field failed validation
    #[error("invalid contact form: {0}")]
    Invalid(&'static str),

    /// No form endpoint configured
    #[error("contact form endpoint is not configured")]
    NotConfigured,

    /// Request could not be sent
    #[error("contact request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Form service rejected the submission
    #[error("contact form service returned HTTP {0}")]
    Status(u16),
}

/// Submits [`ContactForm`]s
#[derive(Clone, Debug)]
pub struct ContactClient {
    settings: ContactSettings,
    http_client: reqwest::Client,
}

impl ContactClient {
    /// Client for the configured endpoint
    pub fn new(settings: ContactSettings) -> Self {
        Self {
            settings,
            http_client: reqwest::Client::new(),
        }
    }

    /// Validate and post the form
    ///
    /// # Errors
    ///
    /// Validation failures, a missing endpoint, send failures and non-2xx
    /// responses all surface as [`ContactError`].
    pub async fn submit(&self, form: &ContactForm) -> Result<(), ContactError> {
        form.validate()?;
        let endpoint = self
            .settings
            .endpoint
            .as_deref()
            .ok_or(ContactError::NotConfigured)?;

        let payload = form.payload(self.settings.recipient.as_deref());
        let response = self
            .http_client
            .post(endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!(endpoint, "Contact form submitted");
            Ok(())
        } else {
            tracing::warn!(endpoint, status = status.as_u16(), "Contact form rejected");
            Err(ContactError::Status(status.as_u16()))
        }
    }
}
