//! Buyer workflow: saved homes, tour requests, and offers.
//!
//! A saved home moves `SAVED -> TOURING -> OFFER_SUBMITTED` as its buyer
//! requests tours and submits the single offer a home may carry; withdrawing
//! that offer puts the home back to `SAVED`. Tours and offers follow their
//! own transition tables (see [`TourStatus`] and [`OfferStatus`]).
//!
//! Every operation is scoped to the signed-in caller. Entities owned by
//! someone else are reported as missing unless the caller is an admin.

pub mod access;
pub mod cache;
pub mod domain;
pub mod money;
pub mod notifications;
pub mod overview;
pub mod repository;
pub mod router;
pub mod service;
pub mod store;
pub mod validation;

#[cfg(test)]
mod tests;

pub use access::{AccessDenied, AccessPolicy, Grant};
pub use cache::{ViewCache, ViewCacheRegistry, ViewKey};
pub use domain::{
    Caller, EntityKind, Offer, OfferId, OfferStatus, Role, SavedHome, SavedHomeId,
    SavedHomeStatus, Tour, TourId, TourStatus, UserId,
};
pub use notifications::{
    EmailMessage, EmailNotifier, LogTransport, MailTransport, NotificationDispatcher,
    NotificationError, NotificationEvent, NotificationPayload, RecordingTransport,
};
pub use overview::{BuyerOverview, OfferListing, SavedHomeView, TourListing};
pub use repository::{BuyerRepository, Changeset, OfferRecord, RepositoryError, TourRecord};
pub use router::{buyer_router, caller_from_headers};
pub use service::{BuyerWorkflowService, WorkflowError};
pub use store::InMemoryBuyerStore;
pub use validation::{
    FormNumber, OfferForm, OfferStatusForm, SavedHomeForm, TourRequestForm, TourStatusForm,
    ValidationError,
};
