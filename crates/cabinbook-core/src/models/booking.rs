use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Available,
    Booked,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Available => "available",
            BookingStatus::Booked => "booked",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(BookingStatus::Available),
            "booked" => Some(BookingStatus::Booked),
            "cancelled" | "canceled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A cabin time slot. Unbooked slots have no therapist and status `available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub therapist: Option<i64>,
    #[serde(default)]
    pub therapist_username: Option<String>,
    pub cabin: i64,
    #[serde(default)]
    pub cabin_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    /// Decimal amount as sent by the backend, e.g. "45.00"
    #[serde(default)]
    pub price: Option<String>,
}

impl Booking {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Only booked reservations that have not started yet can be cancelled
    pub fn is_cancellable(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Booked && self.start_time > now
    }

    pub fn display_price(&self) -> String {
        match self.price {
            Some(ref p) => format!("${}", p),
            None => "-".to_string(),
        }
    }
}

/// Body for an administrator opening a new available slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotInput {
    pub cabin: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub price: String,
}

impl SlotInput {
    /// Local check mirroring the backend rule, so an obviously bad slot
    /// never leaves the client. Errors name the offending field.
    pub fn validate(&self) -> Result<(), (&'static str, &'static str)> {
        if self.start_time >= self.end_time {
            return Err(("end_time", "End time must be after start time."));
        }
        if self.price.trim().is_empty() {
            return Err(("price", "Price is required."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingPeriod {
    Upcoming,
    Past,
}

impl BookingPeriod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upcoming" => Some(BookingPeriod::Upcoming),
            "past" => Some(BookingPeriod::Past),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TherapistSlotFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabin_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminSlotFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabin_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MyBookingsFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<BookingPeriod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdminBookingFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cabin_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
}
