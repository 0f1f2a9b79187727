//! Outbound notification hooks fired after successful workflow transitions.
//!
//! Dispatch is best effort: the service logs failures and never lets them
//! change the outcome of the operation that triggered them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::NotificationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    ListingCreated,
    TourRequested,
    OfferSubmitted,
}

impl NotificationEvent {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ListingCreated => "listing_created",
            Self::TourRequested => "tour_requested",
            Self::OfferSubmitted => "offer_submitted",
        }
    }
}

/// Denormalized, human-readable fields so templates never hit storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub property_address: String,
    pub property_city: Option<String>,
    pub property_state: Option<String>,
    pub user_name: String,
    pub user_email: String,
    pub details: BTreeMap<String, String>,
}

impl NotificationPayload {
    pub fn with_detail(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value {
            self.details.insert(key.to_string(), value);
        }
        self
    }

    fn detail(&self, key: &str) -> &str {
        self.details.get(key).map(String::as_str).unwrap_or("")
    }

    fn location(&self) -> String {
        match (self.property_city.as_deref(), self.property_state.as_deref()) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            (Some(single), None) | (None, Some(single)) => single.to_string(),
            (None, None) => String::new(),
        }
    }
}

pub trait NotificationDispatcher: Send + Sync {
    fn notify(
        &self,
        event: NotificationEvent,
        payload: NotificationPayload,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("{failed} of {attempted} notification emails failed")]
    Partial { failed: usize, attempted: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery seam. Providers plug in here.
pub trait MailTransport: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Transport that only records the message in the service log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl MailTransport for LogTransport {
    fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "notification email queued");
        Ok(())
    }
}

/// Captures messages in memory; handy for demos and assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MailTransport for RecordingTransport {
    fn send(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}

/// Sends a buyer copy and an admin copy of every event.
#[derive(Debug, Clone)]
pub struct EmailNotifier<T> {
    transport: T,
    from_email: String,
    admin_email: String,
}

impl<T: MailTransport> EmailNotifier<T> {
    pub fn new(transport: T, config: &NotificationConfig) -> Self {
        Self {
            transport,
            from_email: config.from_email.clone(),
            admin_email: config.admin_email.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn compose(
        &self,
        event: NotificationEvent,
        payload: &NotificationPayload,
    ) -> Vec<EmailMessage> {
        let mut messages = Vec::with_capacity(2);

        if payload.user_email.trim().is_empty() {
            debug!(event = event.label(), "no buyer email on payload; skipping buyer copy");
        } else {
            let (subject, body) = buyer_copy(event, payload);
            messages.push(EmailMessage {
                from: self.from_email.clone(),
                to: payload.user_email.clone(),
                subject,
                body,
            });
        }

        let (subject, body) = admin_copy(event, payload);
        messages.push(EmailMessage {
            from: self.from_email.clone(),
            to: self.admin_email.clone(),
            subject,
            body,
        });

        messages
    }
}

impl<T: MailTransport> NotificationDispatcher for EmailNotifier<T> {
    fn notify(
        &self,
        event: NotificationEvent,
        payload: NotificationPayload,
    ) -> Result<(), NotificationError> {
        let messages = self.compose(event, &payload);
        let attempted = messages.len();
        let failed = messages
            .iter()
            .filter(|message| self.transport.send(message).is_err())
            .count();

        if failed == 0 {
            Ok(())
        } else {
            Err(NotificationError::Partial { failed, attempted })
        }
    }
}

fn greeting(payload: &NotificationPayload) -> String {
    let name = payload.user_name.trim();
    if name.is_empty() {
        "Hi there,".to_string()
    } else {
        format!("Hi {name},")
    }
}

fn property_lines(payload: &NotificationPayload) -> String {
    let mut lines = format!("Address: {}", payload.property_address);
    let location = payload.location();
    if !location.is_empty() {
        lines.push_str(&format!("\nLocation: {location}"));
    }
    lines
}

fn submitter_lines(payload: &NotificationPayload) -> String {
    let name = payload.user_name.trim();
    format!(
        "Name: {}\nEmail: {}",
        if name.is_empty() { "N/A" } else { name },
        payload.user_email
    )
}

fn optional_line(label: &str, value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!("\n{label}: {value}")
    }
}

fn buyer_copy(event: NotificationEvent, payload: &NotificationPayload) -> (String, String) {
    let property = property_lines(payload);
    match event {
        NotificationEvent::ListingCreated => (
            format!(
                "Your listing \"{}\" has been created",
                payload.detail("listing_title")
            ),
            format!(
                "{}\n\nYour listing has been created and is currently in draft status.\n\n{property}{}\n\nYou can manage it from your dashboard.",
                greeting(payload),
                optional_line("Price", payload.detail("listing_price")),
            ),
        ),
        NotificationEvent::TourRequested => (
            format!("Tour requested for {}", payload.property_address),
            format!(
                "{}\n\nWe received your tour request and will confirm a time shortly.\n\n{property}{}{}{}",
                greeting(payload),
                optional_line("Requested date", payload.detail("requested_date")),
                optional_line("Availability", payload.detail("availability")),
                optional_line("Notes", payload.detail("notes")),
            ),
        ),
        NotificationEvent::OfferSubmitted => (
            format!("Your offer on {} was submitted", payload.property_address),
            format!(
                "{}\n\nYour offer has been submitted.\n\n{property}{}{}",
                greeting(payload),
                optional_line("Offer amount", payload.detail("offer_amount")),
                optional_line("Notes", payload.detail("notes")),
            ),
        ),
    }
}

fn admin_copy(event: NotificationEvent, payload: &NotificationPayload) -> (String, String) {
    let property = property_lines(payload);
    let submitter = submitter_lines(payload);
    match event {
        NotificationEvent::ListingCreated => (
            format!(
                "New Listing Created: \"{}\"",
                payload.detail("listing_title")
            ),
            format!(
                "A new listing has been created on the platform.\n\n{property}{}\n\nSubmitted by:\n{submitter}\n\nPlease review this listing in the admin dashboard.",
                optional_line("Price", payload.detail("listing_price")),
            ),
        ),
        NotificationEvent::TourRequested => (
            format!("New Tour Request: {}", payload.property_address),
            format!(
                "A buyer requested a tour.\n\n{property}{}{}{}\n\nRequested by:\n{submitter}",
                optional_line("Requested date", payload.detail("requested_date")),
                optional_line("Availability", payload.detail("availability")),
                optional_line("Notes", payload.detail("notes")),
            ),
        ),
        NotificationEvent::OfferSubmitted => (
            format!("New Offer Submitted: {}", payload.property_address),
            format!(
                "A buyer submitted an offer.\n\n{property}{}{}\n\nSubmitted by:\n{submitter}",
                optional_line("Offer amount", payload.detail("offer_amount")),
                optional_line("Notes", payload.detail("notes")),
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingTransport;

    impl MailTransport for FailingTransport {
        fn send(&self, _message: &EmailMessage) -> Result<(), NotificationError> {
            Err(NotificationError::Transport("smtp down".to_string()))
        }
    }

    fn config() -> NotificationConfig {
        NotificationConfig {
            from_email: "noreply@homes.test".to_string(),
            admin_email: "admin@homes.test".to_string(),
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload {
            property_address: "123 Main St".to_string(),
            property_city: Some("Austin".to_string()),
            property_state: Some("TX".to_string()),
            user_name: "Jordan Buyer".to_string(),
            user_email: "jordan@homes.test".to_string(),
            details: BTreeMap::new(),
        }
        .with_detail("offer_amount", Some("$450,000".to_string()))
    }

    #[test]
    fn offer_emails_go_to_buyer_and_admin() {
        let notifier = EmailNotifier::new(RecordingTransport::default(), &config());
        notifier
            .notify(NotificationEvent::OfferSubmitted, payload())
            .expect("delivery succeeds");

        let sent = notifier.transport().sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "jordan@homes.test");
        assert_eq!(sent[1].to, "admin@homes.test");
        assert!(sent.iter().all(|message| message.from == "noreply@homes.test"));
        assert!(sent[1].subject.contains("123 Main St"));
        assert!(sent[1].body.contains("Offer amount: $450,000"));
        assert!(sent[1].body.contains("Location: Austin, TX"));
    }

    #[test]
    fn missing_buyer_email_only_notifies_admin() {
        let notifier = EmailNotifier::new(RecordingTransport::default(), &config());
        let mut payload = payload();
        payload.user_email.clear();
        payload.user_name.clear();

        notifier
            .notify(NotificationEvent::TourRequested, payload)
            .expect("admin copy delivered");

        let sent = notifier.transport().sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("Name: N/A"));
    }

    #[test]
    fn listing_created_uses_listing_title() {
        let notifier = EmailNotifier::new(RecordingTransport::default(), &config());
        let payload = payload().with_detail("listing_title", Some("Sunny bungalow".to_string()));

        let messages = notifier.compose(NotificationEvent::ListingCreated, &payload);
        assert_eq!(
            messages[0].subject,
            "Your listing \"Sunny bungalow\" has been created"
        );
        assert_eq!(
            messages[1].subject,
            "New Listing Created: \"Sunny bungalow\""
        );
    }

    #[test]
    fn transport_failures_are_reported() {
        let notifier = EmailNotifier::new(FailingTransport, &config());
        let result = notifier.notify(NotificationEvent::OfferSubmitted, payload());
        assert_eq!(
            result,
            Err(NotificationError::Partial {
                failed: 2,
                attempted: 2
            })
        );
    }
}
