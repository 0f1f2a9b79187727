use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::buyer::cache::{ViewCache, ViewKey};
use crate::workflows::buyer::domain::{
    Caller, Offer, OfferId, SavedHome, SavedHomeId, Tour, TourId, UserId,
};
use crate::workflows::buyer::notifications::{
    NotificationDispatcher, NotificationError, NotificationEvent, NotificationPayload,
};
use crate::workflows::buyer::repository::{
    BuyerRepository, Changeset, OfferRecord, RepositoryError, TourRecord,
};
use crate::workflows::buyer::store::InMemoryBuyerStore;
use crate::workflows::buyer::validation::{FormNumber, OfferForm, SavedHomeForm, TourRequestForm};
use crate::workflows::buyer::BuyerWorkflowService;

pub(super) type TestService =
    BuyerWorkflowService<InMemoryBuyerStore, RecordingDispatcher, RecordingCache>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) store: Arc<InMemoryBuyerStore>,
    pub(super) dispatcher: Arc<RecordingDispatcher>,
    pub(super) cache: Arc<RecordingCache>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(InMemoryBuyerStore::default());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let cache = Arc::new(RecordingCache::default());
    let service = Arc::new(BuyerWorkflowService::new(
        store.clone(),
        dispatcher.clone(),
        cache.clone(),
    ));
    Harness {
        service,
        store,
        dispatcher,
        cache,
    }
}

pub(super) fn buyer() -> Caller {
    Caller::buyer("user-buyer").with_contact("Jordan Buyer", "jordan@example.com")
}

pub(super) fn other_buyer() -> Caller {
    Caller::buyer("user-other").with_contact("Sam Other", "sam@example.com")
}

pub(super) fn admin() -> Caller {
    Caller::admin("user-admin")
}

pub(super) fn home_form(address: &str) -> SavedHomeForm {
    SavedHomeForm {
        address: address.to_string(),
        city: Some("Portland".to_string()),
        state: Some("OR".to_string()),
        zip_code: Some("97201".to_string()),
        price: Some(FormNumber::from(500_000_u32)),
        bedrooms: Some(FormNumber::from(3_u32)),
        bathrooms: Some(FormNumber::from("2")),
        square_feet: None,
        listing_url: None,
        notes: None,
    }
}

pub(super) fn tour_form(home: &SavedHome) -> TourRequestForm {
    TourRequestForm {
        saved_home_id: home.id.0.clone(),
        requested_date: Some("2026-11-02T15:00".to_string()),
        availability: Some("Weekends".to_string()),
        notes: None,
    }
}

pub(super) fn offer_form(home: &SavedHome, amount: u32) -> OfferForm {
    OfferForm {
        saved_home_id: home.id.0.clone(),
        amount: Some(FormNumber::from(amount)),
        notes: None,
    }
}

/// Creates a home owned by [`buyer`].
pub(super) fn saved_home(harness: &Harness) -> SavedHome {
    harness
        .service
        .create_saved_home(Some(&buyer()), home_form("123 Main St"))
        .expect("home saved")
}

pub(super) fn stored_home(harness: &Harness, id: &SavedHomeId) -> SavedHome {
    harness
        .store
        .fetch_saved_home(id)
        .expect("store readable")
        .expect("home present")
}

#[derive(Default)]
pub(super) struct RecordingDispatcher {
    events: Mutex<Vec<(NotificationEvent, NotificationPayload)>>,
}

impl RecordingDispatcher {
    pub(super) fn events(&self) -> Vec<(NotificationEvent, NotificationPayload)> {
        self.events.lock().expect("dispatcher mutex poisoned").clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(
        &self,
        event: NotificationEvent,
        payload: NotificationPayload,
    ) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("dispatcher mutex poisoned")
            .push((event, payload));
        Ok(())
    }
}

pub(super) struct FailingDispatcher;

impl NotificationDispatcher for FailingDispatcher {
    fn notify(
        &self,
        _event: NotificationEvent,
        _payload: NotificationPayload,
    ) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct RecordingCache {
    invalidated: Mutex<Vec<ViewKey>>,
}

impl RecordingCache {
    pub(super) fn invalidated(&self) -> Vec<ViewKey> {
        self.invalidated.lock().expect("cache mutex poisoned").clone()
    }

    pub(super) fn reset(&self) {
        self.invalidated.lock().expect("cache mutex poisoned").clear();
    }
}

impl ViewCache for RecordingCache {
    fn invalidate(&self, view: &ViewKey) {
        self.invalidated
            .lock()
            .expect("cache mutex poisoned")
            .push(view.clone());
    }
}

/// Serves reads from a real store but refuses every write.
pub(super) struct ReadOnlyRepository {
    pub(super) inner: InMemoryBuyerStore,
}

impl BuyerRepository for ReadOnlyRepository {
    fn insert_saved_home(&self, _home: SavedHome) -> Result<SavedHome, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn update_saved_home(&self, _home: SavedHome) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn delete_saved_home(&self, _id: &SavedHomeId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch_saved_home(&self, id: &SavedHomeId) -> Result<Option<SavedHome>, RepositoryError> {
        self.inner.fetch_saved_home(id)
    }

    fn saved_homes_for(&self, owner: &UserId) -> Result<Vec<SavedHome>, RepositoryError> {
        self.inner.saved_homes_for(owner)
    }

    fn fetch_tour(&self, id: &TourId) -> Result<Option<TourRecord>, RepositoryError> {
        self.inner.fetch_tour(id)
    }

    fn tours_for(&self, home: &SavedHomeId) -> Result<Vec<Tour>, RepositoryError> {
        self.inner.tours_for(home)
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<OfferRecord>, RepositoryError> {
        self.inner.fetch_offer(id)
    }

    fn offer_for(&self, home: &SavedHomeId) -> Result<Option<Offer>, RepositoryError> {
        self.inner.offer_for(home)
    }

    fn apply(&self, _changes: Changeset) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }
}

pub(super) type RacingService =
    BuyerWorkflowService<InterleavingRepository, RecordingDispatcher, RecordingCache>;

type CompetingWrite = Box<dyn FnOnce(&TestService) + Send>;

/// Read after which [`InterleavingRepository`] lets the competing write in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReadPoint {
    SavedHome,
    Tour,
    Offer,
    OfferForHome,
}

/// Shares the harness store, and runs one competing write through the
/// harness service as soon as the chosen read returns.
pub(super) struct InterleavingRepository {
    inner: InMemoryBuyerStore,
    competitor: Arc<TestService>,
    after: ReadPoint,
    competing: Mutex<Option<CompetingWrite>>,
}

impl InterleavingRepository {
    fn interleave(&self, point: ReadPoint) {
        if point != self.after {
            return;
        }
        let competing = self.competing.lock().expect("competing mutex poisoned").take();
        if let Some(competing) = competing {
            competing(&self.competitor);
        }
    }
}

/// A service over the harness store whose reads race against `competing`.
pub(super) fn racing_service(
    harness: &Harness,
    after: ReadPoint,
    competing: impl FnOnce(&TestService) + Send + 'static,
) -> RacingService {
    let repository = InterleavingRepository {
        inner: (*harness.store).clone(),
        competitor: harness.service.clone(),
        after,
        competing: Mutex::new(Some(Box::new(competing))),
    };
    BuyerWorkflowService::new(
        Arc::new(repository),
        harness.dispatcher.clone(),
        harness.cache.clone(),
    )
}

impl BuyerRepository for InterleavingRepository {
    fn insert_saved_home(&self, home: SavedHome) -> Result<SavedHome, RepositoryError> {
        self.inner.insert_saved_home(home)
    }

    fn update_saved_home(&self, home: SavedHome) -> Result<(), RepositoryError> {
        self.inner.update_saved_home(home)
    }

    fn delete_saved_home(&self, id: &SavedHomeId) -> Result<(), RepositoryError> {
        self.inner.delete_saved_home(id)
    }

    fn fetch_saved_home(&self, id: &SavedHomeId) -> Result<Option<SavedHome>, RepositoryError> {
        let home = self.inner.fetch_saved_home(id)?;
        self.interleave(ReadPoint::SavedHome);
        Ok(home)
    }

    fn saved_homes_for(&self, owner: &UserId) -> Result<Vec<SavedHome>, RepositoryError> {
        self.inner.saved_homes_for(owner)
    }

    fn fetch_tour(&self, id: &TourId) -> Result<Option<TourRecord>, RepositoryError> {
        let record = self.inner.fetch_tour(id)?;
        self.interleave(ReadPoint::Tour);
        Ok(record)
    }

    fn tours_for(&self, home: &SavedHomeId) -> Result<Vec<Tour>, RepositoryError> {
        self.inner.tours_for(home)
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<OfferRecord>, RepositoryError> {
        let record = self.inner.fetch_offer(id)?;
        self.interleave(ReadPoint::Offer);
        Ok(record)
    }

    fn offer_for(&self, home: &SavedHomeId) -> Result<Option<Offer>, RepositoryError> {
        let offer = self.inner.offer_for(home)?;
        self.interleave(ReadPoint::OfferForHome);
        Ok(offer)
    }

    fn apply(&self, changes: Changeset) -> Result<(), RepositoryError> {
        self.inner.apply(changes)
    }
}

pub(super) struct UnavailableRepository;

impl BuyerRepository for UnavailableRepository {
    fn insert_saved_home(&self, _home: SavedHome) -> Result<SavedHome, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_saved_home(&self, _home: SavedHome) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_saved_home(&self, _id: &SavedHomeId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_saved_home(&self, _id: &SavedHomeId) -> Result<Option<SavedHome>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn saved_homes_for(&self, _owner: &UserId) -> Result<Vec<SavedHome>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_tour(&self, _id: &TourId) -> Result<Option<TourRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn tours_for(&self, _home: &SavedHomeId) -> Result<Vec<Tour>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_offer(&self, _id: &OfferId) -> Result<Option<OfferRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn offer_for(&self, _home: &SavedHomeId) -> Result<Option<Offer>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn apply(&self, _changes: Changeset) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
