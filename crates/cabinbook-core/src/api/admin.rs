//! Administrator calls: cabin CRUD, slot management and booking oversight.

use crate::models::{
    AdminBookingFilter, AdminSlotFilter, Booking, Cabin, CabinInput, SlotInput, User,
};

use super::{ApiClient, ApiError, FieldErrors};

impl ApiClient {
    // ===== Cabins =====

    pub async fn list_cabins(&self) -> Result<Vec<Cabin>, ApiError> {
        self.get("admin/cabins/").await
    }

    pub async fn create_cabin(&self, cabin: &CabinInput) -> Result<Cabin, ApiError> {
        self.post("admin/cabins/", cabin).await
    }

    pub async fn update_cabin(&self, cabin_id: i64, cabin: &CabinInput) -> Result<Cabin, ApiError> {
        self.put(&format!("admin/cabins/{}/", cabin_id), cabin).await
    }

    pub async fn delete_cabin(&self, cabin_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("admin/cabins/{}/", cabin_id)).await
    }

    // ===== Available slots =====

    pub async fn admin_available_slots(&self, filter: &AdminSlotFilter) -> Result<Vec<Booking>, ApiError> {
        self.get_with_query("admin/slots/available/", filter).await
    }

    /// Open a new slot. Inverted or empty time ranges are rejected before
    /// any request is sent.
    pub async fn create_available_slot(&self, slot: &SlotInput) -> Result<Booking, ApiError> {
        slot.validate()
            .map_err(|(field, msg)| ApiError::Validation(FieldErrors::single(field, msg)))?;
        self.post("admin/slots/create/", slot).await
    }

    pub async fn delete_available_slot(&self, slot_id: i64) -> Result<(), ApiError> {
        self.delete(&format!("admin/slots/{}/delete/", slot_id)).await
    }

    // ===== Bookings =====

    pub async fn all_bookings(&self, filter: &AdminBookingFilter) -> Result<Vec<Booking>, ApiError> {
        self.get_with_query("admin/bookings/all/", filter).await
    }

    pub async fn admin_cancel_booking(&self, booking_id: i64) -> Result<Booking, ApiError> {
        self.post_empty(&format!("admin/bookings/{}/cancel/", booking_id))
            .await
    }

    pub async fn all_therapists(&self) -> Result<Vec<User>, ApiError> {
        self.get("admin/users/therapists/").await
    }
}
