use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::access::{self, AccessDenied, AccessPolicy};
use super::cache::{ViewCache, ViewKey};
use super::domain::{
    Caller, EntityKind, Offer, OfferId, OfferStatus, SavedHome, SavedHomeId, SavedHomeStatus,
    Tour, TourId, TourStatus,
};
use super::money::format_usd;
use super::notifications::{NotificationDispatcher, NotificationEvent, NotificationPayload};
use super::overview::{self, BuyerOverview, OfferListing, SavedHomeView, TourListing};
use super::repository::{BuyerRepository, Changeset, OfferRecord, RepositoryError, TourRecord};
use super::validation::{
    self, OfferForm, OfferStatusForm, SavedHomeDetails, SavedHomeForm, TourRequestForm,
    TourStatusForm, ValidationError,
};

static HOME_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static TOUR_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static OFFER_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(sequence: &AtomicU64, prefix: &str) -> String {
    let id = sequence.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Saved-home, tour, and offer lifecycle for buyers.
///
/// Every mutation runs the same pipeline: authenticate, validate, load the
/// entity with its owner, authorize, check the status transition, persist,
/// then notify and invalidate dependent views.
pub struct BuyerWorkflowService<R, N, C> {
    repository: Arc<R>,
    notifier: Arc<N>,
    views: Arc<C>,
}

impl<R, N, C> BuyerWorkflowService<R, N, C>
where
    R: BuyerRepository + 'static,
    N: NotificationDispatcher + 'static,
    C: ViewCache + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, views: Arc<C>) -> Self {
        Self {
            repository,
            notifier,
            views,
        }
    }

    pub fn create_saved_home(
        &self,
        caller: Option<&Caller>,
        form: SavedHomeForm,
    ) -> Result<SavedHome, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let details = validation::saved_home(form)?;

        let now = Utc::now();
        let home = apply_details(
            SavedHome {
                id: SavedHomeId(next_id(&HOME_SEQUENCE, "home")),
                user_id: caller.user_id.clone(),
                address: String::new(),
                city: None,
                state: None,
                zip_code: None,
                price: None,
                bedrooms: None,
                bathrooms: None,
                square_feet: None,
                listing_url: None,
                notes: None,
                status: SavedHomeStatus::Saved,
                created_at: now,
                updated_at: now,
            },
            details,
            now,
        );

        let stored = self
            .repository
            .insert_saved_home(home)
            .map_err(|err| persist_failure(EntityKind::SavedHome, err))?;

        info!(saved_home_id = %stored.id, user_id = %caller.user_id, "saved home created");
        self.invalidate(&[ViewKey::BuyerDashboard, ViewKey::SavedHomes]);
        Ok(stored)
    }

    pub fn update_saved_home(
        &self,
        caller: Option<&Caller>,
        id: &SavedHomeId,
        form: SavedHomeForm,
    ) -> Result<SavedHome, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let details = validation::saved_home(form)?;
        let home = self.load_home(id)?;
        access::authorize(
            caller,
            &home.user_id,
            EntityKind::SavedHome,
            AccessPolicy::OwnerOrAdmin,
        )?;

        let updated = apply_details(home, details, Utc::now());
        self.repository
            .update_saved_home(updated.clone())
            .map_err(|err| persist_failure(EntityKind::SavedHome, err))?;

        info!(saved_home_id = %id, user_id = %caller.user_id, "saved home updated");
        self.invalidate(&[
            ViewKey::BuyerDashboard,
            ViewKey::SavedHomes,
            ViewKey::SavedHomeDetail(id.clone()),
        ]);
        Ok(updated)
    }

    /// Removes the home along with its tours and offer.
    pub fn delete_saved_home(
        &self,
        caller: Option<&Caller>,
        id: &SavedHomeId,
    ) -> Result<(), WorkflowError> {
        let caller = access::authenticated(caller)?;
        let home = self.load_home(id)?;
        access::authorize(
            caller,
            &home.user_id,
            EntityKind::SavedHome,
            AccessPolicy::OwnerOrAdmin,
        )?;

        self.repository
            .delete_saved_home(id)
            .map_err(|err| persist_failure(EntityKind::SavedHome, err))?;

        info!(saved_home_id = %id, user_id = %caller.user_id, "saved home deleted");
        self.invalidate(&[
            ViewKey::BuyerDashboard,
            ViewKey::SavedHomes,
            ViewKey::SavedHomeDetail(id.clone()),
        ]);
        Ok(())
    }

    pub fn get_saved_home(
        &self,
        caller: Option<&Caller>,
        id: &SavedHomeId,
    ) -> Result<SavedHomeView, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let home = self.load_home(id)?;
        access::authorize(
            caller,
            &home.user_id,
            EntityKind::SavedHome,
            AccessPolicy::OwnerOrAdmin,
        )?;
        self.view_of(home)
    }

    /// The caller's saved homes, newest first.
    pub fn list_saved_homes(&self, caller: Option<&Caller>) -> Result<Vec<SavedHome>, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let mut homes = self.repository.saved_homes_for(&caller.user_id)?;
        homes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(homes)
    }

    pub fn list_tours(&self, caller: Option<&Caller>) -> Result<Vec<TourListing>, WorkflowError> {
        let views = self.views_for(caller)?;
        Ok(overview::tour_listings(&views))
    }

    pub fn list_offers(&self, caller: Option<&Caller>) -> Result<Vec<OfferListing>, WorkflowError> {
        let views = self.views_for(caller)?;
        Ok(overview::offer_listings(&views))
    }

    pub fn overview(&self, caller: Option<&Caller>) -> Result<BuyerOverview, WorkflowError> {
        let views = self.views_for(caller)?;
        Ok(overview::summarize(&views))
    }

    /// Records a tour request and moves the home to `TOURING` unless it already has an offer.
    pub fn request_tour(
        &self,
        caller: Option<&Caller>,
        form: TourRequestForm,
    ) -> Result<Tour, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let request = validation::tour_request(form)?;
        let home = self.load_home(&request.saved_home_id)?;
        access::authorize(
            caller,
            &home.user_id,
            EntityKind::SavedHome,
            AccessPolicy::OwnerOrAdmin,
        )?;

        let now = Utc::now();
        let tour = Tour {
            id: TourId(next_id(&TOUR_SEQUENCE, "tour")),
            saved_home_id: home.id.clone(),
            requested_date: request.requested_date,
            scheduled_date: None,
            availability: request.availability.clone(),
            notes: request.notes.clone(),
            status: TourStatus::Requested,
            created_at: now,
            updated_at: now,
        };

        // The parent status is derived from the stored home when the write lands.
        let changes = Changeset::new()
            .insert_tour(tour.clone())
            .promote_home_for_tour(home.id.clone(), now);
        self.repository
            .apply(changes)
            .map_err(|err| persist_failure(EntityKind::SavedHome, err))?;

        info!(tour_id = %tour.id, saved_home_id = %home.id, "tour requested");

        self.dispatch(
            NotificationEvent::TourRequested,
            payload_for(caller, &home)
                .with_detail("requested_date", request.requested_date.map(display_date))
                .with_detail("availability", request.availability)
                .with_detail("notes", request.notes),
        );
        self.invalidate(&[
            ViewKey::BuyerDashboard,
            ViewKey::Tours,
            ViewKey::SavedHomeDetail(home.id.clone()),
        ]);
        Ok(tour)
    }

    pub fn update_tour_status(
        &self,
        caller: Option<&Caller>,
        tour_id: &str,
        form: TourStatusForm,
    ) -> Result<Tour, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let update = validation::tour_status(tour_id, form)?;
        let record = self.load_tour(&update.tour_id)?;
        access::authorize(
            caller,
            record.owner(),
            EntityKind::Tour,
            AccessPolicy::OwnerOrAdmin,
        )?;
        ensure_tour_transition(record.tour.status, update.status)?;

        let prior = record.tour.status;
        let mut tour = record.tour;
        tour.status = update.status;
        if update.scheduled_date.is_some() {
            tour.scheduled_date = update.scheduled_date;
        }
        if update.notes.is_some() {
            tour.notes = update.notes;
        }
        tour.updated_at = Utc::now();

        self.repository
            .apply(Changeset::new().update_tour(tour.clone(), prior))
            .map_err(|err| persist_failure(EntityKind::Tour, err))?;

        info!(tour_id = %tour.id, status = tour.status.label(), "tour status updated");
        self.invalidate(&[ViewKey::BuyerDashboard, ViewKey::Tours]);
        Ok(tour)
    }

    pub fn cancel_tour(
        &self,
        caller: Option<&Caller>,
        tour_id: &TourId,
    ) -> Result<Tour, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let record = self.load_tour(tour_id)?;
        access::authorize(caller, record.owner(), EntityKind::Tour, AccessPolicy::OwnerOnly)?;
        ensure_tour_transition(record.tour.status, TourStatus::Cancelled)?;

        let prior = record.tour.status;
        let mut tour = record.tour;
        tour.status = TourStatus::Cancelled;
        tour.updated_at = Utc::now();

        self.repository
            .apply(Changeset::new().update_tour(tour.clone(), prior))
            .map_err(|err| persist_failure(EntityKind::Tour, err))?;

        info!(tour_id = %tour.id, "tour cancelled");
        self.invalidate(&[ViewKey::BuyerDashboard, ViewKey::Tours]);
        Ok(tour)
    }

    /// Submits the one offer a saved home may carry and moves the home to `OFFER_SUBMITTED`.
    pub fn create_offer(
        &self,
        caller: Option<&Caller>,
        form: OfferForm,
    ) -> Result<Offer, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let submission = validation::offer(form)?;
        let home = self.load_home(&submission.saved_home_id)?;
        access::authorize(
            caller,
            &home.user_id,
            EntityKind::SavedHome,
            AccessPolicy::OwnerOrAdmin,
        )?;

        if self.repository.offer_for(&home.id)?.is_some() {
            return Err(offer_exists());
        }

        let now = Utc::now();
        let offer = Offer {
            id: OfferId(next_id(&OFFER_SEQUENCE, "offer")),
            saved_home_id: home.id.clone(),
            amount: submission.amount,
            notes: submission.notes.clone(),
            status: OfferStatus::Submitted,
            created_at: now,
            updated_at: now,
        };

        let changes = Changeset::new().insert_offer(offer.clone()).set_home_status(
            home.id.clone(),
            SavedHomeStatus::OfferSubmitted,
            now,
        );
        self.repository.apply(changes).map_err(|err| match err {
            // Lost a race with a concurrent submission for the same home.
            RepositoryError::Conflict => offer_exists(),
            other => persist_failure(EntityKind::SavedHome, other),
        })?;

        info!(offer_id = %offer.id, saved_home_id = %home.id, amount = %offer.amount, "offer submitted");

        self.dispatch(
            NotificationEvent::OfferSubmitted,
            payload_for(caller, &home)
                .with_detail("offer_amount", Some(format_usd(offer.amount)))
                .with_detail("notes", submission.notes),
        );
        self.invalidate(&[
            ViewKey::BuyerDashboard,
            ViewKey::Offers,
            ViewKey::SavedHomeDetail(home.id.clone()),
        ]);
        Ok(offer)
    }

    /// Moving an offer to `WITHDRAWN` follows the same rules as [`Self::withdraw_offer`].
    pub fn update_offer_status(
        &self,
        caller: Option<&Caller>,
        offer_id: &str,
        form: OfferStatusForm,
    ) -> Result<Offer, WorkflowError> {
        let caller = access::authenticated(caller)?;
        let update = validation::offer_status(offer_id, form)?;

        if update.status == OfferStatus::Withdrawn {
            return self.withdraw(caller, &update.offer_id, update.notes);
        }

        let record = self.load_offer(&update.offer_id)?;
        access::authorize(
            caller,
            record.owner(),
            EntityKind::Offer,
            AccessPolicy::OwnerOrAdmin,
        )?;
        ensure_offer_transition(record.offer.status, update.status)?;

        let prior = record.offer.status;
        let mut offer = record.offer;
        offer.status = update.status;
        if update.notes.is_some() {
            offer.notes = update.notes;
        }
        offer.updated_at = Utc::now();

        self.repository
            .apply(Changeset::new().update_offer(offer.clone(), prior))
            .map_err(|err| persist_failure(EntityKind::Offer, err))?;

        info!(offer_id = %offer.id, status = offer.status.label(), "offer status updated");
        self.invalidate(&[ViewKey::BuyerDashboard, ViewKey::Offers]);
        Ok(offer)
    }

    /// Withdraws the offer and reverts its home to `SAVED`.
    pub fn withdraw_offer(
        &self,
        caller: Option<&Caller>,
        offer_id: &OfferId,
    ) -> Result<Offer, WorkflowError> {
        let caller = access::authenticated(caller)?;
        self.withdraw(caller, offer_id, None)
    }

    fn withdraw(
        &self,
        caller: &Caller,
        offer_id: &OfferId,
        notes: Option<String>,
    ) -> Result<Offer, WorkflowError> {
        let record = self.load_offer(offer_id)?;
        access::authorize(caller, record.owner(), EntityKind::Offer, AccessPolicy::OwnerOnly)?;
        ensure_offer_transition(record.offer.status, OfferStatus::Withdrawn)?;

        let now = Utc::now();
        let home_id = record.home.id;
        let prior = record.offer.status;
        let mut offer = record.offer;
        offer.status = OfferStatus::Withdrawn;
        if notes.is_some() {
            offer.notes = notes;
        }
        offer.updated_at = now;

        // A concurrent withdraw fails the status check, so the home reverts once.
        let changes = Changeset::new().update_offer(offer.clone(), prior).set_home_status(
            home_id.clone(),
            SavedHomeStatus::Saved,
            now,
        );
        self.repository
            .apply(changes)
            .map_err(|err| persist_failure(EntityKind::Offer, err))?;

        info!(offer_id = %offer.id, saved_home_id = %home_id, "offer withdrawn");
        self.invalidate(&[
            ViewKey::BuyerDashboard,
            ViewKey::SavedHomes,
            ViewKey::Offers,
            ViewKey::SavedHomeDetail(home_id),
        ]);
        Ok(offer)
    }

    fn load_home(&self, id: &SavedHomeId) -> Result<SavedHome, WorkflowError> {
        self.repository
            .fetch_saved_home(id)?
            .ok_or(WorkflowError::NotFound(EntityKind::SavedHome))
    }

    fn load_tour(&self, id: &TourId) -> Result<TourRecord, WorkflowError> {
        self.repository
            .fetch_tour(id)?
            .ok_or(WorkflowError::NotFound(EntityKind::Tour))
    }

    fn load_offer(&self, id: &OfferId) -> Result<OfferRecord, WorkflowError> {
        self.repository
            .fetch_offer(id)?
            .ok_or(WorkflowError::NotFound(EntityKind::Offer))
    }

    fn view_of(&self, home: SavedHome) -> Result<SavedHomeView, WorkflowError> {
        let tours = self.repository.tours_for(&home.id)?;
        let offer = self.repository.offer_for(&home.id)?;
        Ok(SavedHomeView { home, tours, offer })
    }

    fn views_for(&self, caller: Option<&Caller>) -> Result<Vec<SavedHomeView>, WorkflowError> {
        self.list_saved_homes(caller)?
            .into_iter()
            .map(|home| self.view_of(home))
            .collect()
    }

    fn dispatch(&self, event: NotificationEvent, payload: NotificationPayload) {
        if let Err(err) = self.notifier.notify(event, payload) {
            warn!(event = event.label(), error = %err, "notification dispatch failed");
        }
    }

    fn invalidate(&self, views: &[ViewKey]) {
        for view in views {
            self.views.invalidate(view);
        }
    }
}

fn apply_details(mut home: SavedHome, details: SavedHomeDetails, now: DateTime<Utc>) -> SavedHome {
    home.address = details.address;
    home.city = details.city;
    home.state = details.state;
    home.zip_code = details.zip_code;
    home.price = details.price;
    home.bedrooms = details.bedrooms;
    home.bathrooms = details.bathrooms;
    home.square_feet = details.square_feet;
    home.listing_url = details.listing_url;
    home.notes = details.notes;
    home.updated_at = now;
    home
}

fn payload_for(caller: &Caller, home: &SavedHome) -> NotificationPayload {
    NotificationPayload {
        property_address: home.address.clone(),
        property_city: home.city.clone(),
        property_state: home.state.clone(),
        user_name: caller.name.clone().unwrap_or_default(),
        user_email: caller.email.clone().unwrap_or_default(),
        details: Default::default(),
    }
}

fn display_date(date: DateTime<Utc>) -> String {
    date.format("%b %-d, %Y %H:%M UTC").to_string()
}

fn ensure_tour_transition(from: TourStatus, to: TourStatus) -> Result<(), WorkflowError> {
    if !from.is_terminal() && from.can_transition_to(to) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            entity: EntityKind::Tour,
            from: from.label(),
            to: to.label(),
        })
    }
}

fn ensure_offer_transition(from: OfferStatus, to: OfferStatus) -> Result<(), WorkflowError> {
    if !from.is_terminal() && from.can_transition_to(to) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            entity: EntityKind::Offer,
            from: from.label(),
            to: to.label(),
        })
    }
}

fn offer_exists() -> WorkflowError {
    WorkflowError::Conflict("An offer already exists for this property".to_string())
}

fn persist_failure(entity: EntityKind, err: RepositoryError) -> WorkflowError {
    match err {
        RepositoryError::NotFound => WorkflowError::NotFound(entity),
        RepositoryError::Conflict => {
            WorkflowError::Conflict(format!("{} already exists", entity.label()))
        }
        RepositoryError::StatusChanged { current } => WorkflowError::Conflict(format!(
            "{} changed to {current} by another request",
            entity.label()
        )),
        unavailable @ RepositoryError::Unavailable(_) => WorkflowError::Storage(unavailable),
    }
}

/// Error raised by the buyer workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AccessDenied),
    #[error("{} not found", .0.label())]
    NotFound(EntityKind),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Conflict(String),
    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        entity: EntityKind,
        from: &'static str,
        to: &'static str,
    },
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl WorkflowError {
    /// Message safe to show the caller. Someone else's entity reads as missing.
    pub fn public_message(&self) -> String {
        match self {
            WorkflowError::Unauthorized(AccessDenied::Anonymous) => "Unauthorized".to_string(),
            WorkflowError::Unauthorized(AccessDenied::NotOwner { entity })
            | WorkflowError::NotFound(entity) => format!("{} not found", entity.label()),
            WorkflowError::Unauthorized(AccessDenied::OwnerOnly { entity }) => {
                format!("Only the owner can change this {}", entity.noun())
            }
            WorkflowError::Storage(_) => "Something went wrong. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}
