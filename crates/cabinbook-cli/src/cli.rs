//! Command-line arguments.

use cabinbook_core::models::{BookingPeriod, BookingStatus};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cabinbook", version, about = "Reserve and manage therapy cabin slots")]
pub struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, env = "CABINBOOK_API_BASE_URL", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Keep the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Clear the stored session
    Logout {
        /// Also forget the keychain password
        #[arg(long)]
        forget: bool,
    },
    /// Show the signed-in identity
    Whoami,
    /// Create a therapist account
    Register(RegisterArgs),
    /// View or edit the therapist profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Manage cabins (admin)
    Cabins {
        #[command(subcommand)]
        action: CabinAction,
    },
    /// Browse and manage slots
    Slots {
        #[command(subcommand)]
        action: SlotAction,
    },
    /// Book an available slot
    Book { slot_id: i64 },
    /// List therapist accounts (admin)
    Therapists,
    /// List bookings
    Bookings {
        #[command(subcommand)]
        action: BookingAction,
    },
    /// Cancel a booking
    Cancel {
        booking_id: i64,
        /// Cancel any therapist's booking (admin)
        #[arg(long)]
        admin: bool,
    },
    /// Reset a forgotten password
    PasswordReset {
        #[command(subcommand)]
        action: PasswordResetAction,
    },
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(long)]
    pub phone: String,
}

#[derive(Debug, Subcommand)]
pub enum ProfileAction {
    Show,
    Update {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CabinAction {
    List,
    Create(CabinArgs),
    Update {
        id: i64,
        #[command(flatten)]
        cabin: CabinArgs,
    },
    Delete { id: i64 },
}

#[derive(Debug, Args)]
pub struct CabinArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long, default_value_t = 1)]
    pub capacity: i32,
}

#[derive(Debug, Subcommand)]
pub enum SlotAction {
    /// Slots open for booking
    Available {
        #[arg(long)]
        cabin: Option<i64>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Open slots as seen by an administrator
    List {
        #[arg(long)]
        cabin: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Open a new slot (admin)
    Create {
        #[arg(long)]
        cabin: i64,
        /// RFC 3339 start, e.g. 2026-11-02T09:00:00Z
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        #[arg(long)]
        price: String,
    },
    /// Remove an open slot (admin)
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum BookingAction {
    /// Your own bookings
    Mine {
        #[arg(long, value_parser = parse_status)]
        status: Option<BookingStatus>,
        #[arg(long, value_parser = parse_period)]
        period: Option<BookingPeriod>,
    },
    /// Every booking (admin)
    All {
        #[arg(long)]
        cabin: Option<i64>,
        #[arg(long)]
        therapist: Option<i64>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_status)]
        status: Option<BookingStatus>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PasswordResetAction {
    /// Email a reset token
    Request { email: String },
    /// Set a new password using the emailed token
    Confirm { token: String },
}

fn parse_status(s: &str) -> Result<BookingStatus, String> {
    BookingStatus::from_str(s)
        .ok_or_else(|| format!("unknown status '{}' (available, booked, cancelled)", s))
}

fn parse_period(s: &str) -> Result<BookingPeriod, String> {
    BookingPeriod::from_str(s).ok_or_else(|| format!("unknown period '{}' (upcoming, past)", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bookings_filters() {
        let cli = Cli::try_parse_from([
            "cabinbook", "bookings", "mine", "--status", "booked", "--period", "past",
        ])
        .expect("parse");
        match cli.command {
            Command::Bookings {
                action: BookingAction::Mine { status, period },
            } => {
                assert_eq!(status, Some(BookingStatus::Booked));
                assert_eq!(period, Some(BookingPeriod::Past));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["cabinbook", "bookings", "mine", "--status", "pending"]).is_err());
    }

    #[test]
    fn test_parse_slot_create() {
        let cli = Cli::try_parse_from([
            "cabinbook",
            "slots",
            "create",
            "--cabin",
            "3",
            "--start",
            "2026-11-02T09:00:00Z",
            "--end",
            "2026-11-02T10:00:00Z",
            "--price",
            "45.00",
        ])
        .expect("parse");
        assert!(matches!(
            cli.command,
            Command::Slots {
                action: SlotAction::Create { cabin: 3, .. }
            }
        ));
    }
}
