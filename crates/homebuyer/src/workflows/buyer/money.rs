use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{iso, Money};

/// Share of an offer amount returned to the buyer at closing.
pub const REBATE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// US dollars rounded to whole dollars, e.g. `$450,000`.
pub fn format_usd(amount: Decimal) -> String {
    let whole = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let rendered = Money::from_decimal(whole, iso::USD).to_string();
    rendered
        .strip_suffix(".00")
        .map(str::to_string)
        .unwrap_or(rendered)
}

pub fn estimated_rebate(amount: Decimal) -> Decimal {
    amount * REBATE_RATE
}
