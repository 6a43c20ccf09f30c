//! Command handlers on top of the core gateway.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cabinbook_core::models::{
    AdminBookingFilter, AdminSlotFilter, CabinInput, MyBookingsFilter, ProfileUpdate, Role,
    SlotInput, TherapistRegistration, TherapistSlotFilter, User,
};
use cabinbook_core::{ApiClient, Config, CredentialStore, SessionStore};
use chrono::Utc;
use tracing::{debug, warn};

use crate::cli::{
    BookingAction, CabinAction, Command, PasswordResetAction, ProfileAction, RegisterArgs,
    SlotAction,
};
use crate::display;

pub struct App {
    config: Config,
    api: ApiClient,
}

impl App {
    pub fn new(api_url: Option<String>) -> Result<Self> {
        let config = Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "Using default configuration");
            Config::default()
        });

        let data_dir = config.data_dir()?;
        let session = Arc::new(SessionStore::open(&data_dir));
        // --api-url applies to this run only and is never written back
        let api = match api_url {
            Some(url) => {
                ApiClient::new(url, session)?.with_refresh_timeout(config.refresh_timeout())
            }
            None => ApiClient::from_config(&config, session)?,
        };
        debug!(base_url = api.base_url(), "Gateway ready");

        Ok(Self { config, api })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Login { username, remember } => self.login(username, remember).await,
            Command::Logout { forget } => self.logout(forget),
            Command::Whoami => self.whoami(),
            Command::Register(args) => self.register(args).await,
            Command::Profile { action } => self.profile(action).await,
            Command::Cabins { action } => self.cabins(action).await,
            Command::Slots { action } => self.slots(action).await,
            Command::Book { slot_id } => {
                self.require_role(Role::Therapist)?;
                let booking = self.api.book_slot(slot_id).await?;
                println!("Booked:");
                println!("{}", display::booking_line(&booking));
                Ok(())
            }
            Command::Therapists => {
                self.require_role(Role::Admin)?;
                let therapists = self.api.all_therapists().await?;
                if therapists.is_empty() {
                    println!("No therapists");
                }
                for user in &therapists {
                    println!("{}", display::user_summary(user));
                }
                Ok(())
            }
            Command::Bookings { action } => self.bookings(action).await,
            Command::Cancel { booking_id, admin } => {
                let booking = if admin {
                    self.require_role(Role::Admin)?;
                    self.api.admin_cancel_booking(booking_id).await?
                } else {
                    self.require_role(Role::Therapist)?;
                    self.api.cancel_booking(booking_id).await?
                };
                println!("Cancelled:");
                println!("{}", display::booking_line(&booking));
                Ok(())
            }
            Command::PasswordReset { action } => self.password_reset(action).await,
        }
    }

    /// Refuse locally when the stored identity lacks `role`; the backend
    /// enforces the same rule.
    fn require_role(&self, role: Role) -> Result<()> {
        match self.api.session().user() {
            Some(user) if user.has_role(role) => Ok(()),
            Some(_) => bail!("This command requires the {} role", role),
            None => bail!("Not signed in. Run `cabinbook login` first."),
        }
    }

    fn require_any_role(&self, roles: &[Role]) -> Result<()> {
        match self.api.session().user() {
            Some(user) if user.has_any_role(roles) => Ok(()),
            Some(_) => bail!("Your account has no role that allows this command"),
            None => bail!("Not signed in. Run `cabinbook login` first."),
        }
    }

    // ===== Session =====

    async fn login(&mut self, username: Option<String>, remember: bool) -> Result<()> {
        let username = match username.or_else(|| self.config.last_username.clone()) {
            Some(name) => name,
            None => prompt_line("Username: ")?,
        };
        if username.is_empty() {
            bail!("Username required");
        }

        let use_stored = CredentialStore::has_credentials(&username)
            && wants_stored_password(&prompt_line("Use stored password? [Y/n]: ")?);
        let password = if use_stored {
            CredentialStore::get_password(&username)?
        } else {
            prompt_password("Password: ")?
        };

        let (user, password) = match self.api.login(&username, &password).await {
            Ok(user) => (user, password),
            Err(e) if use_stored && e.is_auth_failure() => {
                // A stale keychain entry would otherwise fail every login
                println!("Stored password was rejected, forgetting it.");
                if let Err(err) = CredentialStore::delete(&username) {
                    warn!(error = %err, "Failed to delete stale keychain password");
                }
                let password = prompt_password("Password: ")?;
                (self.api.login(&username, &password).await?, password)
            }
            Err(e) => return Err(e.into()),
        };

        if remember {
            if let Err(e) = CredentialStore::store(&username, &password) {
                warn!(error = %e, "Failed to store password in keychain");
            }
        }
        self.config.last_username = Some(username);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        println!("Signed in as {}", display::user_summary(&user));
        Ok(())
    }

    fn logout(&mut self, forget: bool) -> Result<()> {
        if forget {
            let user = self.api.session().user();
            match forget_target(user.as_ref(), self.config.last_username.as_deref()) {
                Some(username) => {
                    CredentialStore::delete(&username)?;
                    println!("Forgot the stored password for {}", username);
                }
                None => println!("No known username, nothing to forget"),
            }
        }
        self.api.logout();
        println!("Signed out");
        Ok(())
    }

    fn whoami(&self) -> Result<()> {
        let state = self.api.session().state();
        match state.user {
            Some(ref user) if state.is_authenticated => {
                println!("{}", display::user_summary(user));
                if state.refresh_token.is_none() {
                    println!("(session cannot be refreshed; it ends when the access token expires)");
                }
            }
            _ => println!("Not signed in"),
        }
        Ok(())
    }

    async fn register(&self, args: RegisterArgs) -> Result<()> {
        let password = prompt_password("Password: ")?;
        let password2 = prompt_password("Confirm password: ")?;
        let registration = TherapistRegistration {
            username: args.username,
            email: args.email,
            password,
            password2,
            first_name: args.first_name,
            last_name: args.last_name,
            phone_number: args.phone,
        };
        let user = self.api.register_therapist(&registration).await?;
        println!("Account created for {}. You can now sign in.", user.username);
        Ok(())
    }

    async fn profile(&self, action: ProfileAction) -> Result<()> {
        self.require_role(Role::Therapist)?;
        let user = match action {
            ProfileAction::Show => self.api.therapist_profile().await?,
            ProfileAction::Update {
                email,
                first_name,
                last_name,
                phone,
            } => {
                let update = ProfileUpdate {
                    email,
                    first_name,
                    last_name,
                    phone_number: phone,
                };
                if update.is_empty() {
                    bail!("Nothing to update");
                }
                self.api.update_therapist_profile(&update).await?
            }
        };
        for line in display::profile_lines(&user) {
            println!("{}", line);
        }
        Ok(())
    }

    // ===== Cabins & slots =====

    async fn cabins(&self, action: CabinAction) -> Result<()> {
        match action {
            CabinAction::List => {
                self.require_any_role(&[Role::Admin, Role::Therapist])?;
                let is_admin = self
                    .api
                    .session()
                    .user()
                    .is_some_and(|user| user.has_role(Role::Admin));
                let cabins = if is_admin {
                    self.api.list_cabins().await?
                } else {
                    self.api.cabins().await?
                };
                if cabins.is_empty() {
                    println!("No cabins");
                }
                for cabin in &cabins {
                    println!("{}", display::cabin_line(cabin));
                }
            }
            CabinAction::Create(args) => {
                self.require_role(Role::Admin)?;
                let cabin = self
                    .api
                    .create_cabin(&CabinInput {
                        name: args.name,
                        description: args.description,
                        capacity: args.capacity,
                    })
                    .await?;
                println!("Created {}", display::cabin_line(&cabin));
            }
            CabinAction::Update { id, cabin } => {
                self.require_role(Role::Admin)?;
                let cabin = self
                    .api
                    .update_cabin(
                        id,
                        &CabinInput {
                            name: cabin.name,
                            description: cabin.description,
                            capacity: cabin.capacity,
                        },
                    )
                    .await?;
                println!("Updated {}", display::cabin_line(&cabin));
            }
            CabinAction::Delete { id } => {
                self.require_role(Role::Admin)?;
                self.api.delete_cabin(id).await?;
                println!("Deleted cabin #{}", id);
            }
        }
        Ok(())
    }

    async fn slots(&self, action: SlotAction) -> Result<()> {
        let slots = match action {
            SlotAction::Available { cabin, from, to } => {
                let filter = TherapistSlotFilter {
                    cabin_id: cabin,
                    start_date: from,
                    end_date: to,
                };
                self.api.available_slots(&filter).await?
            }
            SlotAction::List { cabin, date } => {
                self.require_role(Role::Admin)?;
                let filter = AdminSlotFilter {
                    cabin_id: cabin,
                    date,
                };
                self.api.admin_available_slots(&filter).await?
            }
            SlotAction::Create {
                cabin,
                start,
                end,
                price,
            } => {
                self.require_role(Role::Admin)?;
                let slot = SlotInput {
                    cabin,
                    start_time: start,
                    end_time: end,
                    price,
                };
                let created = self.api.create_available_slot(&slot).await?;
                println!("Created slot {}", display::booking_line(&created));
                return Ok(());
            }
            SlotAction::Delete { id } => {
                self.require_role(Role::Admin)?;
                self.api.delete_available_slot(id).await?;
                println!("Deleted slot #{}", id);
                return Ok(());
            }
        };

        if slots.is_empty() {
            println!("No open slots");
        }
        for slot in &slots {
            println!("{}", display::booking_line(slot));
        }
        Ok(())
    }

    async fn bookings(&self, action: BookingAction) -> Result<()> {
        let bookings = match action {
            BookingAction::Mine { status, period } => {
                self.require_role(Role::Therapist)?;
                let bookings = self
                    .api
                    .my_bookings(&MyBookingsFilter { status, period })
                    .await?;
                if bookings.is_empty() {
                    println!("No bookings");
                }
                let now = Utc::now();
                for booking in &bookings {
                    println!("{}", display::own_booking_line(booking, now));
                }
                return Ok(());
            }
            BookingAction::All {
                cabin,
                therapist,
                date,
                status,
            } => {
                self.require_role(Role::Admin)?;
                let filter = AdminBookingFilter {
                    cabin_id: cabin,
                    therapist_id: therapist,
                    date,
                    status,
                };
                self.api.all_bookings(&filter).await?
            }
        };

        if bookings.is_empty() {
            println!("No bookings");
        }
        for booking in &bookings {
            println!("{}", display::booking_line(booking));
        }
        Ok(())
    }

    async fn password_reset(&self, action: PasswordResetAction) -> Result<()> {
        let message = match action {
            PasswordResetAction::Request { email } => {
                self.api.request_password_reset(&email).await?
            }
            PasswordResetAction::Confirm { token } => {
                let new_password = prompt_password("New password: ")?;
                let confirm = prompt_password("Confirm new password: ")?;
                self.api
                    .confirm_password_reset(&token, &new_password, &confirm)
                    .await?
            }
        };
        if !message.is_empty() {
            println!("{}", message);
        }
        Ok(())
    }
}

/// Anything but an explicit "n" keeps the stored password
fn wants_stored_password(answer: &str) -> bool {
    !matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
}

/// Whose keychain entry `logout --forget` removes: the signed-in user,
/// or the last username when no session survives.
fn forget_target(user: Option<&User>, last_username: Option<&str>) -> Option<String> {
    user.map(|u| u.username.clone())
        .or_else(|| last_username.map(str::to_string))
        .filter(|name| !name.is_empty())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;
    Ok(input.trim().to_string())
}

fn prompt_password(prompt: &str) -> Result<String> {
    let password = rpassword::prompt_password(prompt)?;
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bob() -> User {
        User {
            id: 8,
            username: "bob".to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            phone_number: String::new(),
            is_therapist: true,
            is_admin: false,
        }
    }

    #[test]
    fn test_wants_stored_password() {
        assert!(wants_stored_password(""));
        assert!(wants_stored_password("y"));
        assert!(wants_stored_password("Yes"));
        assert!(!wants_stored_password("n"));
        assert!(!wants_stored_password(" N "));
        assert!(!wants_stored_password("no"));
    }

    #[test]
    fn test_forget_target_prefers_session_user() {
        assert_eq!(forget_target(Some(&bob()), Some("alice")), Some("bob".to_string()));
    }

    #[test]
    fn test_forget_target_falls_back_to_last_username() {
        assert_eq!(forget_target(None, Some("alice")), Some("alice".to_string()));
        assert_eq!(forget_target(None, Some("")), None);
        assert_eq!(forget_target(None, None), None);
    }
}
