use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::domain::SavedHomeId;

/// Page-level views whose data depends on buyer workflow entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKey {
    BuyerDashboard,
    SavedHomes,
    SavedHomeDetail(SavedHomeId),
    Tours,
    Offers,
}

impl ViewKey {
    pub fn path(&self) -> String {
        match self {
            Self::BuyerDashboard => "/buyer".to_string(),
            Self::SavedHomes => "/buyer/saved-homes".to_string(),
            Self::SavedHomeDetail(id) => format!("/buyer/saved-homes/{id}"),
            Self::Tours => "/buyer/tours".to_string(),
            Self::Offers => "/buyer/offers".to_string(),
        }
    }
}

pub trait ViewCache: Send + Sync {
    fn invalidate(&self, view: &ViewKey);
}

/// Generation counter per view path. Renderers compare generations to
/// detect stale pages.
#[derive(Debug, Default, Clone)]
pub struct ViewCacheRegistry {
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl ViewCacheRegistry {
    pub fn generation(&self, view: &ViewKey) -> u64 {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&view.path())
            .copied()
            .unwrap_or_default()
    }
}

impl ViewCache for ViewCacheRegistry {
    fn invalidate(&self, view: &ViewKey) {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generations.entry(view.path()).or_default() += 1;
    }
}
