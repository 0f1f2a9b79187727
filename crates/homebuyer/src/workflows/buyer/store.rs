use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{Offer, OfferId, SavedHome, SavedHomeId, Tour, TourId, UserId};
use super::repository::{
    BuyerRepository, Change, Changeset, OfferRecord, RepositoryError, TourRecord,
};

#[derive(Debug, Default)]
struct StoreState {
    homes: HashMap<SavedHomeId, SavedHome>,
    tours: HashMap<TourId, Tour>,
    offers: HashMap<OfferId, Offer>,
}

/// Prior value of one entry touched by a change, restored if a later change
/// in the same changeset fails.
#[derive(Debug)]
enum Undo {
    RemoveTour(TourId),
    RestoreTour(Tour),
    RemoveOffer(OfferId),
    RestoreOffer(Offer),
    RestoreHome(SavedHome),
}

impl StoreState {
    fn offer_for(&self, home: &SavedHomeId) -> Option<&Offer> {
        self.offers
            .values()
            .find(|offer| &offer.saved_home_id == home)
    }

    fn apply(&mut self, change: Change) -> Result<Undo, RepositoryError> {
        match change {
            Change::InsertTour(tour) => {
                if !self.homes.contains_key(&tour.saved_home_id) {
                    return Err(RepositoryError::NotFound);
                }
                if self.tours.contains_key(&tour.id) {
                    return Err(RepositoryError::Conflict);
                }
                let id = tour.id.clone();
                self.tours.insert(id.clone(), tour);
                Ok(Undo::RemoveTour(id))
            }
            Change::UpdateTour { tour, expected } => {
                let slot = self.tours.get_mut(&tour.id).ok_or(RepositoryError::NotFound)?;
                if slot.status != expected {
                    return Err(RepositoryError::StatusChanged {
                        current: slot.status.label(),
                    });
                }
                Ok(Undo::RestoreTour(std::mem::replace(slot, tour)))
            }
            Change::InsertOffer(offer) => {
                if !self.homes.contains_key(&offer.saved_home_id) {
                    return Err(RepositoryError::NotFound);
                }
                if self.offers.contains_key(&offer.id)
                    || self.offer_for(&offer.saved_home_id).is_some()
                {
                    return Err(RepositoryError::Conflict);
                }
                let id = offer.id.clone();
                self.offers.insert(id.clone(), offer);
                Ok(Undo::RemoveOffer(id))
            }
            Change::UpdateOffer { offer, expected } => {
                let slot = self
                    .offers
                    .get_mut(&offer.id)
                    .ok_or(RepositoryError::NotFound)?;
                if slot.status != expected {
                    return Err(RepositoryError::StatusChanged {
                        current: slot.status.label(),
                    });
                }
                Ok(Undo::RestoreOffer(std::mem::replace(slot, offer)))
            }
            Change::SetHomeStatus { id, status, at } => {
                let home = self.homes.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                let prior = home.clone();
                home.status = status;
                home.updated_at = at;
                Ok(Undo::RestoreHome(prior))
            }
            Change::PromoteHomeForTour { id, at } => {
                let home = self.homes.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                let prior = home.clone();
                let next = home.status.after_tour_request();
                if next != home.status {
                    home.status = next;
                    home.updated_at = at;
                }
                Ok(Undo::RestoreHome(prior))
            }
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveTour(id) => {
                self.tours.remove(&id);
            }
            Undo::RestoreTour(tour) => {
                self.tours.insert(tour.id.clone(), tour);
            }
            Undo::RemoveOffer(id) => {
                self.offers.remove(&id);
            }
            Undo::RestoreOffer(offer) => {
                self.offers.insert(offer.id.clone(), offer);
            }
            Undo::RestoreHome(home) => {
                self.homes.insert(home.id.clone(), home);
            }
        }
    }
}

/// Process-local repository used by the API service, the demo, and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBuyerStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryBuyerStore {
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn tour_count(&self) -> usize {
        self.lock().map(|state| state.tours.len()).unwrap_or_default()
    }

    pub fn offer_count(&self) -> usize {
        self.lock().map(|state| state.offers.len()).unwrap_or_default()
    }
}

impl BuyerRepository for InMemoryBuyerStore {
    fn insert_saved_home(&self, home: SavedHome) -> Result<SavedHome, RepositoryError> {
        let mut state = self.lock()?;
        if state.homes.contains_key(&home.id) {
            return Err(RepositoryError::Conflict);
        }
        state.homes.insert(home.id.clone(), home.clone());
        Ok(home)
    }

    fn update_saved_home(&self, home: SavedHome) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let slot = state.homes.get_mut(&home.id).ok_or(RepositoryError::NotFound)?;
        *slot = home;
        Ok(())
    }

    fn delete_saved_home(&self, id: &SavedHomeId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.homes.remove(id).ok_or(RepositoryError::NotFound)?;
        state.tours.retain(|_, tour| &tour.saved_home_id != id);
        state.offers.retain(|_, offer| &offer.saved_home_id != id);
        Ok(())
    }

    fn fetch_saved_home(&self, id: &SavedHomeId) -> Result<Option<SavedHome>, RepositoryError> {
        Ok(self.lock()?.homes.get(id).cloned())
    }

    fn saved_homes_for(&self, owner: &UserId) -> Result<Vec<SavedHome>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .homes
            .values()
            .filter(|home| &home.user_id == owner)
            .cloned()
            .collect())
    }

    fn fetch_tour(&self, id: &TourId) -> Result<Option<TourRecord>, RepositoryError> {
        let state = self.lock()?;
        let Some(tour) = state.tours.get(id) else {
            return Ok(None);
        };
        let home = state
            .homes
            .get(&tour.saved_home_id)
            .ok_or_else(|| RepositoryError::Unavailable(format!("tour {id} has no saved home")))?;
        Ok(Some(TourRecord {
            tour: tour.clone(),
            home: home.clone(),
        }))
    }

    fn tours_for(&self, home: &SavedHomeId) -> Result<Vec<Tour>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .tours
            .values()
            .filter(|tour| &tour.saved_home_id == home)
            .cloned()
            .collect())
    }

    fn fetch_offer(&self, id: &OfferId) -> Result<Option<OfferRecord>, RepositoryError> {
        let state = self.lock()?;
        let Some(offer) = state.offers.get(id) else {
            return Ok(None);
        };
        let home = state
            .homes
            .get(&offer.saved_home_id)
            .ok_or_else(|| RepositoryError::Unavailable(format!("offer {id} has no saved home")))?;
        Ok(Some(OfferRecord {
            offer: offer.clone(),
            home: home.clone(),
        }))
    }

    fn offer_for(&self, home: &SavedHomeId) -> Result<Option<Offer>, RepositoryError> {
        Ok(self.lock()?.offer_for(home).cloned())
    }

    fn apply(&self, changes: Changeset) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let mut applied = Vec::new();
        for change in changes.into_changes() {
            match state.apply(change) {
                Ok(undo) => applied.push(undo),
                Err(err) => {
                    while let Some(undo) = applied.pop() {
                        state.revert(undo);
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::buyer::domain::{OfferStatus, SavedHomeStatus, TourStatus};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn home(id: &str) -> SavedHome {
        let now = Utc::now();
        SavedHome {
            id: SavedHomeId(id.to_string()),
            user_id: UserId("user-1".to_string()),
            address: "123 Main St".to_string(),
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
        }
    }

    fn offer(id: &str, home: &str) -> Offer {
        let now = Utc::now();
        Offer {
            id: OfferId(id.to_string()),
            saved_home_id: SavedHomeId(home.to_string()),
            amount: Decimal::new(450_000, 0),
            notes: None,
            status: OfferStatus::Submitted,
            created_at: now,
            updated_at: now,
        }
    }

    fn tour(id: &str, home: &str) -> Tour {
        let now = Utc::now();
        Tour {
            id: TourId(id.to_string()),
            saved_home_id: SavedHomeId(home.to_string()),
            requested_date: None,
            scheduled_date: None,
            availability: None,
            notes: None,
            status: TourStatus::Requested,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn failed_changeset_leaves_state_untouched() {
        let store = InMemoryBuyerStore::default();
        store.insert_saved_home(home("home-a")).expect("insert home");

        let result = store.apply(
            Changeset::new()
                .insert_offer(offer("offer-1", "home-a"))
                .set_home_status(
                    SavedHomeId("home-missing".to_string()),
                    SavedHomeStatus::OfferSubmitted,
                    Utc::now(),
                ),
        );

        assert_eq!(result, Err(RepositoryError::NotFound));
        assert_eq!(store.offer_count(), 0);
    }

    #[test]
    fn rollback_restores_every_entry_touched_before_the_failure() {
        let store = InMemoryBuyerStore::default();
        let home_id = SavedHomeId("home-d".to_string());
        store.insert_saved_home(home("home-d")).expect("insert home");
        store
            .apply(Changeset::new().insert_tour(tour("tour-1", "home-d")))
            .expect("tour inserted");

        let mut scheduled = tour("tour-1", "home-d");
        scheduled.status = TourStatus::Scheduled;
        let result = store.apply(
            Changeset::new()
                .update_tour(scheduled, TourStatus::Requested)
                .insert_tour(tour("tour-2", "home-d"))
                .promote_home_for_tour(home_id.clone(), Utc::now())
                .insert_offer(offer("offer-1", "home-missing")),
        );

        assert_eq!(result, Err(RepositoryError::NotFound));
        assert_eq!(store.tour_count(), 1);
        let stored = store
            .fetch_tour(&TourId("tour-1".to_string()))
            .expect("fetch")
            .expect("tour kept");
        assert_eq!(stored.tour.status, TourStatus::Requested);
        assert_eq!(stored.home.status, SavedHomeStatus::Saved);
    }

    #[test]
    fn updates_against_a_moved_status_are_rejected() {
        let store = InMemoryBuyerStore::default();
        store.insert_saved_home(home("home-e")).expect("insert home");
        let mut cancelled = tour("tour-1", "home-e");
        cancelled.status = TourStatus::Cancelled;
        store
            .apply(Changeset::new().insert_tour(cancelled))
            .expect("tour inserted");

        let mut scheduled = tour("tour-1", "home-e");
        scheduled.status = TourStatus::Scheduled;
        let result = store.apply(Changeset::new().update_tour(scheduled, TourStatus::Requested));

        assert_eq!(
            result,
            Err(RepositoryError::StatusChanged {
                current: "CANCELLED"
            })
        );
        let stored = store
            .fetch_tour(&TourId("tour-1".to_string()))
            .expect("fetch")
            .expect("tour kept");
        assert_eq!(stored.tour.status, TourStatus::Cancelled);
    }

    #[test]
    fn tour_promotion_reads_the_stored_home_status() {
        let store = InMemoryBuyerStore::default();
        let home_id = SavedHomeId("home-f".to_string());
        store.insert_saved_home(home("home-f")).expect("insert home");
        store
            .apply(
                Changeset::new()
                    .insert_offer(offer("offer-1", "home-f"))
                    .set_home_status(home_id.clone(), SavedHomeStatus::OfferSubmitted, Utc::now()),
            )
            .expect("offer inserted");

        store
            .apply(
                Changeset::new()
                    .insert_tour(tour("tour-1", "home-f"))
                    .promote_home_for_tour(home_id.clone(), Utc::now()),
            )
            .expect("tour inserted");

        let stored = store.fetch_saved_home(&home_id).expect("fetch").expect("home");
        assert_eq!(stored.status, SavedHomeStatus::OfferSubmitted);
    }

    #[test]
    fn second_offer_for_same_home_conflicts() {
        let store = InMemoryBuyerStore::default();
        store.insert_saved_home(home("home-b")).expect("insert home");
        store
            .apply(Changeset::new().insert_offer(offer("offer-1", "home-b")))
            .expect("first offer");

        let result = store.apply(Changeset::new().insert_offer(offer("offer-2", "home-b")));
        assert_eq!(result, Err(RepositoryError::Conflict));
        assert_eq!(store.offer_count(), 1);
    }

    #[test]
    fn deleting_a_home_cascades_to_children() {
        let store = InMemoryBuyerStore::default();
        store.insert_saved_home(home("home-c")).expect("insert home");
        store
            .apply(
                Changeset::new()
                    .insert_tour(tour("tour-1", "home-c"))
                    .insert_tour(tour("tour-2", "home-c"))
                    .insert_offer(offer("offer-1", "home-c")),
            )
            .expect("children inserted");

        store
            .delete_saved_home(&SavedHomeId("home-c".to_string()))
            .expect("delete");

        assert_eq!(store.tour_count(), 0);
        assert_eq!(store.offer_count(), 0);
        assert!(store
            .fetch_tour(&TourId("tour-1".to_string()))
            .expect("fetch")
            .is_none());
    }
}
