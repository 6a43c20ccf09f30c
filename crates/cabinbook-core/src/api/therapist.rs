//! Therapist-facing calls: profile, slot browsing, booking and cancellation.

use tracing::{debug, warn};

use crate::models::{Booking, Cabin, MyBookingsFilter, ProfileUpdate, TherapistSlotFilter, User};

use super::{ApiClient, ApiError};

impl From<&User> for ProfileUpdate {
    fn from(user: &User) -> Self {
        Self {
            email: Some(user.email.clone()),
            first_name: Some(user.first_name.clone()),
            last_name: Some(user.last_name.clone()),
            phone_number: Some(user.phone_number.clone()),
        }
    }
}

impl ApiClient {
    pub async fn therapist_profile(&self) -> Result<User, ApiError> {
        self.get("therapist/profile/").await
    }

    /// Update the profile and fold the result into the stored identity
    pub async fn update_therapist_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let updated: User = self.put("therapist/profile/", update).await?;

        let merged = match self.session().user() {
            Some(mut current) => {
                current.apply_profile(&ProfileUpdate::from(&updated));
                current
            }
            None => updated.clone(),
        };
        if let Err(e) = self.session().set_identity(Some(merged)) {
            warn!(error = %e, "Failed to save updated identity");
        }
        Ok(updated)
    }

    /// Cabin list, used to filter slots by cabin
    pub async fn cabins(&self) -> Result<Vec<Cabin>, ApiError> {
        self.get("admin/cabins/").await
    }

    pub async fn available_slots(&self, filter: &TherapistSlotFilter) -> Result<Vec<Booking>, ApiError> {
        self.get_with_query("therapist/slots/available/", filter).await
    }

    pub async fn book_slot(&self, slot_id: i64) -> Result<Booking, ApiError> {
        let booking: Booking = self
            .post_empty(&format!("therapist/slots/{}/book/", slot_id))
            .await?;
        debug!(booking_id = booking.id, "Slot booked");
        Ok(booking)
    }

    pub async fn my_bookings(&self, filter: &MyBookingsFilter) -> Result<Vec<Booking>, ApiError> {
        self.get_with_query("therapist/bookings/mine/", filter).await
    }

    pub async fn cancel_booking(&self, booking_id: i64) -> Result<Booking, ApiError> {
        self.post_empty(&format!("therapist/bookings/{}/cancel/", booking_id))
            .await
    }
}
