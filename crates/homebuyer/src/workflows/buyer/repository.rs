use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Offer, OfferId, OfferStatus, SavedHome, SavedHomeId, SavedHomeStatus, Tour, TourId,
    TourStatus, UserId,
};

/// A tour loaded together with the saved home that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourRecord {
    pub tour: Tour,
    pub home: SavedHome,
}

impl TourRecord {
    pub fn owner(&self) -> &UserId {
        &self.home.user_id
    }
}

/// An offer loaded together with the saved home that owns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferRecord {
    pub offer: Offer,
    pub home: SavedHome,
}

impl OfferRecord {
    pub fn owner(&self) -> &UserId {
        &self.home.user_id
    }
}

/// Single write inside a [`Changeset`].
///
/// Updates name the status they were decided against; the repository rejects
/// them with [`RepositoryError::StatusChanged`] if the stored record has moved on.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    InsertTour(Tour),
    UpdateTour {
        tour: Tour,
        expected: TourStatus,
    },
    InsertOffer(Offer),
    UpdateOffer {
        offer: Offer,
        expected: OfferStatus,
    },
    SetHomeStatus {
        id: SavedHomeId,
        status: SavedHomeStatus,
        at: DateTime<Utc>,
    },
    /// Applies [`SavedHomeStatus::after_tour_request`] to the stored status.
    PromoteHomeForTour {
        id: SavedHomeId,
        at: DateTime<Utc>,
    },
}

/// Writes that must land together or not at all, e.g. a child entity and
/// its parent's derived status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    changes: Vec<Change>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_tour(mut self, tour: Tour) -> Self {
        self.changes.push(Change::InsertTour(tour));
        self
    }

    pub fn update_tour(mut self, tour: Tour, expected: TourStatus) -> Self {
        self.changes.push(Change::UpdateTour { tour, expected });
        self
    }

    pub fn insert_offer(mut self, offer: Offer) -> Self {
        self.changes.push(Change::InsertOffer(offer));
        self
    }

    pub fn update_offer(mut self, offer: Offer, expected: OfferStatus) -> Self {
        self.changes.push(Change::UpdateOffer { offer, expected });
        self
    }

    pub fn set_home_status(
        mut self,
        id: SavedHomeId,
        status: SavedHomeStatus,
        at: DateTime<Utc>,
    ) -> Self {
        self.changes.push(Change::SetHomeStatus { id, status, at });
        self
    }

    pub fn promote_home_for_tour(mut self, id: SavedHomeId, at: DateTime<Utc>) -> Self {
        self.changes.push(Change::PromoteHomeForTour { id, at });
        self
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

/// Storage abstraction over saved homes, tours, and offers.
///
/// Implementations must enforce at most one offer per saved home, cascade
/// tour and offer deletion with their saved home, and apply a [`Changeset`]
/// atomically.
pub trait BuyerRepository: Send + Sync {
    fn insert_saved_home(&self, home: SavedHome) -> Result<SavedHome, RepositoryError>;
    fn update_saved_home(&self, home: SavedHome) -> Result<(), RepositoryError>;
    fn delete_saved_home(&self, id: &SavedHomeId) -> Result<(), RepositoryError>;
    fn fetch_saved_home(&self, id: &SavedHomeId) -> Result<Option<SavedHome>, RepositoryError>;
    fn saved_homes_for(&self, owner: &UserId) -> Result<Vec<SavedHome>, RepositoryError>;

    fn fetch_tour(&self, id: &TourId) -> Result<Option<TourRecord>, RepositoryError>;
    fn tours_for(&self, home: &SavedHomeId) -> Result<Vec<Tour>, RepositoryError>;

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<OfferRecord>, RepositoryError>;
    fn offer_for(&self, home: &SavedHomeId) -> Result<Option<Offer>, RepositoryError>;

    fn apply(&self, changes: Changeset) -> Result<(), RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record status is now {current}")]
    StatusChanged { current: &'static str },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
