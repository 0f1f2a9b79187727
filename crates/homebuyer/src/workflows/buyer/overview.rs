use std::cmp::{Ordering, Reverse};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::domain::{
    Offer, OfferStatus, SavedHome, SavedHomeId, SavedHomeStatus, Tour, TourStatus,
};
use super::money::{estimated_rebate, format_usd};

/// Slim saved-home fields shown next to tours and offers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeSummary {
    pub id: SavedHomeId,
    pub address: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub price: Option<Decimal>,
}

impl From<&SavedHome> for HomeSummary {
    fn from(home: &SavedHome) -> Self {
        Self {
            id: home.id.clone(),
            address: home.address.clone(),
            city: home.city.clone(),
            state: home.state.clone(),
            price: home.price,
        }
    }
}

/// A saved home with its tour history and offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedHomeView {
    pub home: SavedHome,
    pub tours: Vec<Tour>,
    pub offer: Option<Offer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TourListing {
    pub tour: Tour,
    pub home: HomeSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferListing {
    pub offer: Offer,
    pub home: HomeSummary,
    pub estimated_rebate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuyerOverview {
    pub saved_homes: Vec<StatusCount>,
    pub tours: Vec<StatusCount>,
    pub offers: Vec<StatusCount>,
    pub active_tours: usize,
    pub past_tours: usize,
    pub active_offers: usize,
    pub closed_offers: usize,
    /// 1% of every offer on a home still in `OFFER_SUBMITTED`, in whole dollars.
    pub estimated_rebate: Decimal,
    pub estimated_rebate_display: String,
    /// 1% of accepted offers.
    pub accepted_rebate: Decimal,
}

pub fn tour_listings(views: &[SavedHomeView]) -> Vec<TourListing> {
    let mut listings: Vec<TourListing> = views
        .iter()
        .flat_map(|view| {
            let home = HomeSummary::from(&view.home);
            view.tours.iter().map(move |tour| TourListing {
                tour: tour.clone(),
                home: home.clone(),
            })
        })
        .collect();
    listings.sort_by(|a, b| compare_tours(&a.tour, &b.tour));
    listings
}

/// Upcoming first; within a status, scheduled tours by date, then unscheduled newest first.
fn compare_tours(a: &Tour, b: &Tour) -> Ordering {
    a.status
        .list_priority()
        .cmp(&b.status.list_priority())
        .then_with(|| match (a.scheduled_date, b.scheduled_date) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        })
        .then_with(|| a.id.cmp(&b.id))
}

pub fn offer_listings(views: &[SavedHomeView]) -> Vec<OfferListing> {
    let mut listings: Vec<OfferListing> = views
        .iter()
        .filter_map(|view| {
            view.offer.as_ref().map(|offer| OfferListing {
                offer: offer.clone(),
                home: HomeSummary::from(&view.home),
                estimated_rebate: estimated_rebate(offer.amount),
            })
        })
        .collect();
    listings.sort_by_key(|listing| {
        (
            listing.offer.status.list_priority(),
            Reverse(listing.offer.updated_at),
        )
    });
    listings
}

pub fn summarize(views: &[SavedHomeView]) -> BuyerOverview {
    let tours: Vec<&Tour> = views.iter().flat_map(|view| view.tours.iter()).collect();
    let offers: Vec<&Offer> = views.iter().filter_map(|view| view.offer.as_ref()).collect();

    let saved_homes = SavedHomeStatus::ordered()
        .into_iter()
        .map(|status| StatusCount {
            status: status.label(),
            count: views.iter().filter(|view| view.home.status == status).count(),
        })
        .collect();

    let tour_counts = TourStatus::ordered()
        .into_iter()
        .map(|status| StatusCount {
            status: status.label(),
            count: tours.iter().filter(|tour| tour.status == status).count(),
        })
        .collect();

    let offer_counts = OfferStatus::ordered()
        .into_iter()
        .map(|status| StatusCount {
            status: status.label(),
            count: offers.iter().filter(|offer| offer.status == status).count(),
        })
        .collect();

    let estimated: Decimal = views
        .iter()
        .filter(|view| view.home.status == SavedHomeStatus::OfferSubmitted)
        .filter_map(|view| view.offer.as_ref())
        .map(|offer| estimated_rebate(offer.amount))
        .sum();
    let estimated = estimated.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let accepted_rebate = offers
        .iter()
        .filter(|offer| offer.status == OfferStatus::Accepted)
        .map(|offer| estimated_rebate(offer.amount))
        .sum();

    let active_tours = tours.iter().filter(|tour| tour.status.is_active()).count();
    let active_offers = offers.iter().filter(|offer| offer.status.is_active()).count();

    BuyerOverview {
        saved_homes,
        tours: tour_counts,
        offers: offer_counts,
        active_tours,
        past_tours: tours.len() - active_tours,
        active_offers,
        closed_offers: offers.len() - active_offers,
        estimated_rebate: estimated,
        estimated_rebate_display: format_usd(estimated),
        accepted_rebate,
    }
}
