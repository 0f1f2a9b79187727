use crate::infra::buyer_stack;
use chrono::{Duration, Utc};
use clap::Args;
use homebuyer::config::NotificationConfig;
use homebuyer::error::AppError;
use homebuyer::workflows::buyer::money::format_usd;
use homebuyer::workflows::buyer::{
    Caller, FormNumber, OfferForm, OfferStatusForm, RecordingTransport, SavedHomeForm,
    TourRequestForm, TourStatusForm, ViewKey,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Display name used for the demo buyer.
    #[arg(long, default_value = "Jordan Buyer")]
    pub(crate) buyer_name: String,
    /// Email address the buyer copy of each notification is sent to.
    #[arg(long, default_value = "jordan@example.com")]
    pub(crate) buyer_email: String,
    /// Offer amount in whole dollars.
    #[arg(long, default_value_t = 650_000)]
    pub(crate) offer_amount: u32,
    /// Withdraw the offer at the end of the scenario.
    #[arg(long)]
    pub(crate) withdraw: bool,
    /// Print the body of every notification email.
    #[arg(long)]
    pub(crate) show_emails: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            buyer_name: "Jordan Buyer".to_string(),
            buyer_email: "jordan@example.com".to_string(),
            offer_amount: 650_000,
            withdraw: false,
            show_emails: false,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        buyer_name,
        buyer_email,
        offer_amount,
        withdraw,
        show_emails,
    } = args;

    let stack = buyer_stack(RecordingTransport::default(), &NotificationConfig::default());
    let service = stack.service.clone();
    let buyer = Caller::buyer("user-demo").with_contact(buyer_name, buyer_email);
    let caller = Some(&buyer);

    println!("Buyer workflow demo");

    let home = service.create_saved_home(
        caller,
        SavedHomeForm {
            address: "742 Evergreen Terrace".to_string(),
            city: Some("Springfield".to_string()),
            state: Some("OR".to_string()),
            zip_code: Some("97403".to_string()),
            price: Some(FormNumber::from(675_000_u32)),
            bedrooms: Some(FormNumber::from(4_u32)),
            bathrooms: Some(FormNumber::from("2.5")),
            square_feet: Some(FormNumber::from(2_150_u32)),
            listing_url: Some("https://listings.example.com/742-evergreen".to_string()),
            notes: Some("Big backyard, close to the school".to_string()),
        },
    )?;
    println!(
        "- Saved {} ({}) -> {}",
        home.address,
        home.price.map(format_usd).unwrap_or_default(),
        home.status.label()
    );

    let requested = (Utc::now() + Duration::days(3)).to_rfc3339();
    let tour = service.request_tour(
        caller,
        TourRequestForm {
            saved_home_id: home.id.0.clone(),
            requested_date: Some(requested),
            availability: Some("Weekday evenings".to_string()),
            notes: None,
        },
    )?;
    let home_view = service.get_saved_home(caller, &home.id)?;
    println!(
        "- Requested tour {} -> tour {} | home {}",
        tour.id,
        tour.status.label(),
        home_view.home.status.label()
    );

    let scheduled = (Utc::now() + Duration::days(4)).to_rfc3339();
    let tour = service.update_tour_status(
        caller,
        &tour.id.0,
        TourStatusForm {
            status: "SCHEDULED".to_string(),
            scheduled_date: Some(scheduled),
            notes: None,
        },
    )?;
    println!("- Agent scheduled tour {} -> {}", tour.id, tour.status.label());

    let offer = service.create_offer(
        caller,
        OfferForm {
            saved_home_id: home.id.0.clone(),
            amount: Some(FormNumber::from(offer_amount)),
            notes: Some("Pre-approved, flexible closing".to_string()),
        },
    )?;
    let home_view = service.get_saved_home(caller, &home.id)?;
    println!(
        "- Submitted offer {} for {} -> home {}",
        offer.id,
        format_usd(offer.amount),
        home_view.home.status.label()
    );

    if withdraw {
        let offer = service.update_offer_status(
            caller,
            &offer.id.0,
            OfferStatusForm {
                status: "WITHDRAWN".to_string(),
                notes: Some("Found another home".to_string()),
            },
        )?;
        let home_view = service.get_saved_home(caller, &home.id)?;
        println!(
            "- Withdrew offer {} -> home {}",
            offer.id,
            home_view.home.status.label()
        );
    }

    let overview = service.overview(caller)?;
    println!("\nDashboard");
    for (heading, counts) in [
        ("Saved homes", &overview.saved_homes),
        ("Tours", &overview.tours),
        ("Offers", &overview.offers),
    ] {
        let line = counts
            .iter()
            .filter(|entry| entry.count > 0)
            .map(|entry| format!("{} {}", entry.count, entry.status))
            .collect::<Vec<_>>()
            .join(", ");
        println!("- {heading}: {}", if line.is_empty() { "none" } else { line.as_str() });
    }
    println!("- Estimated rebate: {}", overview.estimated_rebate_display);

    println!(
        "\nStore: {} tour(s), {} offer(s)",
        stack.store.tour_count(),
        stack.store.offer_count()
    );
    println!("View generations:");
    for view in [
        ViewKey::BuyerDashboard,
        ViewKey::SavedHomes,
        ViewKey::SavedHomeDetail(home.id.clone()),
        ViewKey::Tours,
        ViewKey::Offers,
    ] {
        println!("  - {}: {}", view.path(), stack.views.generation(&view));
    }

    let sent = stack.notifier.transport().sent();
    println!("\nNotifications sent: {}", sent.len());
    for email in &sent {
        println!("  - to {} | {}", email.to, email.subject);
        if show_emails {
            for line in email.body.lines() {
                println!("      {line}");
            }
        }
    }

    Ok(())
}
