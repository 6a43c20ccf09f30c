//! Data models for the booking backend.
//!
//! - `User`, `Role`: authenticated identity and its role flags
//! - `Cabin`, `CabinInput`: therapy cabins managed by administrators
//! - `Booking`, `BookingStatus`, `SlotInput`: slots and reservations
//! - Filters for the slot and booking list endpoints
//! - `TherapistRegistration`, `ProfileUpdate`: account forms

pub mod booking;
pub mod cabin;
pub mod profile;
pub mod user;

pub use booking::{
    AdminBookingFilter, AdminSlotFilter, Booking, BookingPeriod, BookingStatus, MyBookingsFilter,
    SlotInput, TherapistSlotFilter,
};
pub use cabin::{Cabin, CabinInput};
pub use profile::{ProfileUpdate, TherapistRegistration};
pub use user::{Role, User};
