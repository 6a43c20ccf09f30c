//! Plain-text rendering of backend records and errors.

use cabinbook_core::models::{Booking, Cabin, User};
use cabinbook_core::{ApiError, ErrorKind};
use chrono::{DateTime, Local, Utc};

/// Format a phone number for display
/// Handles various input formats and normalizes to (XXX) XXX-XXXX
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => format!("({}) {}-{}", &digits[0..3], &digits[3..6], &digits[6..10]),
        11 if digits.starts_with('1') => {
            format!("({}) {}-{}", &digits[1..4], &digits[4..7], &digits[7..11])
        }
        _ => phone.to_string(),
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Local wall-clock rendering of a slot boundary
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%a %b %d %H:%M").to_string()
}

pub fn cabin_line(cabin: &Cabin) -> String {
    let mut line = format!("#{:<4} {:<20} {}", cabin.id, cabin.name, cabin.display_capacity());
    if !cabin.description.is_empty() {
        line.push_str(&format!("  {}", truncate_string(&cabin.description, 40)));
    }
    line
}

pub fn booking_line(booking: &Booking) -> String {
    let cabin = booking
        .cabin_name
        .clone()
        .unwrap_or_else(|| format!("cabin {}", booking.cabin));
    let mut line = format!(
        "#{:<5} {:<16} {} - {} ({} min)  {:<9} {}",
        booking.id,
        truncate_string(&cabin, 16),
        format_time(&booking.start_time),
        booking.end_time.with_timezone(&Local).format("%H:%M"),
        booking.duration_minutes(),
        booking.status,
        booking.display_price(),
    );
    if let Some(ref therapist) = booking.therapist_username {
        line.push_str(&format!("  {}", therapist));
    }
    line
}

/// A therapist's own booking, flagged when it can still be cancelled
pub fn own_booking_line(booking: &Booking, now: DateTime<Utc>) -> String {
    let line = booking_line(booking);
    if booking.is_cancellable(now) {
        format!("{}  [cancellable]", line)
    } else {
        line
    }
}

pub fn user_summary(user: &User) -> String {
    let mut roles = Vec::new();
    if user.is_admin {
        roles.push("admin");
    }
    if user.is_therapist {
        roles.push("therapist");
    }
    let roles = if roles.is_empty() {
        "no role".to_string()
    } else {
        roles.join(", ")
    };
    format!("{} (#{}, {})", user.display_name(), user.id, roles)
}

pub fn profile_lines(user: &User) -> Vec<String> {
    vec![
        format!("Username: {}", user.username),
        format!("Name:     {}", user.display_name()),
        format!("Email:    {}", user.email),
        format!("Phone:    {}", format_phone(&user.phone_number)),
    ]
}

/// User-facing description of a failed call
pub fn error_message(err: &ApiError) -> String {
    match err.kind() {
        ErrorKind::Validation => match err.field_errors() {
            Some(fields) if fields.len() == 1 && fields.general_message().is_some() => {
                fields.general_message().unwrap_or_default().to_string()
            }
            Some(fields) if !fields.is_empty() => fields
                .iter()
                .map(|(field, msg)| format!("  {}: {}", field, msg))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => "The request was rejected.".to_string(),
        },
        ErrorKind::Auth => {
            "Your session has ended. Run `cabinbook login` to sign in again.".to_string()
        }
        ErrorKind::Transport => {
            format!("Unable to reach the booking server ({}).", err)
        }
        ErrorKind::Status => err.to_string(),
    }
}
