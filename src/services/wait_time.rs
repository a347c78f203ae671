//! Wait time estimation
//!
//! Pure conversion from "parties ahead" to a minute estimate and the phrase
//! shown to customers.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitEstimate {
    pub minutes: u32,
    pub friendly: String,
}

/// Estimate the wait for a party with `positions_ahead` parties in front of it
///
/// Short waits collapse to "about 5 minutes" / "about 10 minutes"; longer
/// waits are rounded to the nearest 5 minutes and shown as a range.
pub fn estimate_wait(positions_ahead: u32, average_minutes_per_party: u32) -> WaitEstimate {
    let total_minutes = positions_ahead.saturating_mul(average_minutes_per_party);

    if total_minutes == 0 {
        return WaitEstimate {
            minutes: 0,
            friendly: "Ready now".to_string(),
        };
    }

    if total_minutes <= 5 {
        return WaitEstimate {
            minutes: total_minutes,
            friendly: "about 5 minutes".to_string(),
        };
    }

    if total_minutes <= 10 {
        return WaitEstimate {
            minutes: total_minutes,
            friendly: "about 10 minutes".to_string(),
        };
    }

    let rounded = round_to_nearest_five(total_minutes);
    let lower = rounded.saturating_sub(5).max(5);
    let upper = rounded.saturating_add(5);

    let friendly = if lower == upper - 5 {
        format!("about {} minutes", lower)
    } else {
        format!("about {}-{} minutes", lower, upper)
    };

    WaitEstimate {
        minutes: total_minutes,
        friendly,
    }
}

/// Halves round up; integer minutes never land on .5 of a five-minute step
fn round_to_nearest_five(minutes: u32) -> u32 {
    minutes.saturating_add(2) / 5 * 5
}
