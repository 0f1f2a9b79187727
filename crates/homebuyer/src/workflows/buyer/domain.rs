use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a marketplace account.
    UserId
);
string_id!(
    /// Identifier of a home a buyer is tracking.
    SavedHomeId
);
string_id!(TourId);
string_id!(OfferId);

/// Account role. Everyone signs up as a buyer; admins are provisioned out of band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Buyer,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Self::Admin,
            _ => Self::Buyer,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Buyer => "BUYER",
            Self::Admin => "ADMIN",
        }
    }
}

/// Resolved identity of whoever invoked a workflow operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Caller {
    pub fn buyer(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role: Role::Buyer,
            name: None,
            email: None,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            role: Role::Admin,
            ..Self::buyer(user_id)
        }
    }

    pub fn with_contact(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.email = Some(email.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// The three workflow entities, used for error reporting and access checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    SavedHome,
    Tour,
    Offer,
}

impl EntityKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SavedHome => "Saved home",
            Self::Tour => "Tour",
            Self::Offer => "Offer",
        }
    }

    pub const fn noun(self) -> &'static str {
        match self {
            Self::SavedHome => "saved home",
            Self::Tour => "tour",
            Self::Offer => "offer",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// Progress of a saved home. Always mirrors the most advanced child workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SavedHomeStatus {
    #[default]
    Saved,
    Touring,
    OfferSubmitted,
}

impl SavedHomeStatus {
    pub const fn ordered() -> [Self; 3] {
        [Self::Saved, Self::Touring, Self::OfferSubmitted]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Saved => "SAVED",
            Self::Touring => "TOURING",
            Self::OfferSubmitted => "OFFER_SUBMITTED",
        }
    }

    /// Status after a tour is requested. Never regresses a home with an offer.
    pub const fn after_tour_request(self) -> Self {
        match self {
            Self::Saved | Self::Touring => Self::Touring,
            Self::OfferSubmitted => Self::OfferSubmitted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TourStatus {
    Requested,
    Scheduled,
    Completed,
    Cancelled,
}

const TOUR_TRANSITIONS: &[(TourStatus, TourStatus)] = &[
    (TourStatus::Requested, TourStatus::Scheduled),
    (TourStatus::Requested, TourStatus::Cancelled),
    (TourStatus::Scheduled, TourStatus::Scheduled),
    (TourStatus::Scheduled, TourStatus::Completed),
    (TourStatus::Scheduled, TourStatus::Cancelled),
];

impl TourStatus {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Requested,
            Self::Scheduled,
            Self::Completed,
            Self::Cancelled,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Scheduled => "SCHEDULED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|status| status.label() == raw.trim())
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Requested | Self::Scheduled)
    }

    /// `SCHEDULED -> SCHEDULED` is a reschedule and is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        TOUR_TRANSITIONS.contains(&(self, next))
    }

    /// Ordering used on the tours page: upcoming first, history last.
    pub const fn list_priority(self) -> u8 {
        match self {
            Self::Scheduled => 0,
            Self::Requested => 1,
            Self::Completed => 2,
            Self::Cancelled => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Draft,
    Submitted,
    Countered,
    Accepted,
    Rejected,
    Withdrawn,
}

const OFFER_TRANSITIONS: &[(OfferStatus, OfferStatus)] = &[
    (OfferStatus::Draft, OfferStatus::Submitted),
    (OfferStatus::Draft, OfferStatus::Withdrawn),
    (OfferStatus::Submitted, OfferStatus::Countered),
    (OfferStatus::Submitted, OfferStatus::Accepted),
    (OfferStatus::Submitted, OfferStatus::Rejected),
    (OfferStatus::Submitted, OfferStatus::Withdrawn),
    (OfferStatus::Countered, OfferStatus::Accepted),
    (OfferStatus::Countered, OfferStatus::Rejected),
    (OfferStatus::Countered, OfferStatus::Withdrawn),
];

impl OfferStatus {
    pub const fn ordered() -> [Self; 6] {
        [
            Self::Draft,
            Self::Submitted,
            Self::Countered,
            Self::Accepted,
            Self::Rejected,
            Self::Withdrawn,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Countered => "COUNTERED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Withdrawn => "WITHDRAWN",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ordered()
            .into_iter()
            .find(|status| status.label() == raw.trim())
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Withdrawn)
    }

    pub const fn is_active(self) -> bool {
        matches!(self, Self::Submitted | Self::Countered)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        OFFER_TRANSITIONS.contains(&(self, next))
    }

    pub const fn list_priority(self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Countered => 1,
            Self::Accepted => 2,
            Self::Draft => 3,
            Self::Rejected => 4,
            Self::Withdrawn => 5,
        }
    }
}

/// A property a buyer is tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedHome {
    pub id: SavedHomeId,
    pub user_id: UserId,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub price: Option<Decimal>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<Decimal>,
    pub square_feet: Option<u32>,
    pub listing_url: Option<String>,
    pub notes: Option<String>,
    pub status: SavedHomeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tour {
    pub id: TourId,
    pub saved_home_id: SavedHomeId,
    pub requested_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub availability: Option<String>,
    pub notes: Option<String>,
    pub status: TourStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Purchase offer. The amount is fixed once submitted; only status and notes change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub saved_home_id: SavedHomeId,
    pub amount: Decimal,
    pub notes: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
