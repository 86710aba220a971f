//! The reservation manager: one per lot, subscribed to the chat and timer events.
//!
//! ```text
//! SlashCommand ──► register caller, open booking / admin modal
//! BlockAction  ──► reserve, release, draft a temporary release, pick dates,
//!                  cancel a release, admin toggles; refresh the open modal
//! ViewOpened   ──► bind the release modal to the draft created from its parent
//! ViewSubmission ► submit the draft (or add a space from the admin modal)
//! ViewClosed   ──► discard the draft bound to the closed view
//! TimerDone    ──► daily tick on the reset label
//! ```
//!
//! Every handler answers through a [`Response`] published back on the bus.
//! Storage failures are returned wrapped in [`Fatal`]; everything else the user
//! can act on is shown to them.

use crate::profile::Profile;
use crate::views::{self, ids, Listing};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use spacebot_core::{
    form_value, Action, ActionItem, BlockAction, Clock, Consumer, Event, EventBus, EventKind, Fatal,
    FormValue, Modal, Response, SlashCommand, TimerDone, ViewClosed, ViewOpened, ViewSubmission,
};
use spacebot_lot::{
    parse_date, DateField, LotError, Rights, RosterError, Space, SpacesLot, User, UserRoster,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors that are either shown to the user or, for storage failures, end the process.
trait UserFacing: std::error::Error + Send + Sync + Sized + 'static {
    fn fatal(&self) -> bool;

    fn into_message(self) -> Result<String> {
        if self.fatal() {
            return Err(Fatal::new(self).into());
        }
        Ok(self.to_string())
    }
}

impl UserFacing for LotError {
    fn fatal(&self) -> bool {
        self.is_fatal()
    }
}

impl UserFacing for RosterError {
    fn fatal(&self) -> bool {
        self.is_fatal()
    }
}

pub struct ReservationManager {
    profile: Profile,
    lot: Arc<Mutex<SpacesLot>>,
    roster: Arc<Mutex<UserRoster>>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    testing: bool,
    selected_floor: DashMap<String, String>,
    selected_show_taken: DashMap<String, bool>,
}

impl ReservationManager {
    pub const SUBSCRIPTIONS: &'static [EventKind] = &[
        EventKind::SlashCommand,
        EventKind::BlockAction,
        EventKind::ViewSubmission,
        EventKind::ViewOpened,
        EventKind::ViewClosed,
        EventKind::TimerDone,
    ];

    pub fn new(
        profile: Profile,
        lot: Arc<Mutex<SpacesLot>>,
        roster: Arc<Mutex<UserRoster>>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            profile,
            lot,
            roster,
            bus,
            clock,
            testing: false,
            selected_floor: DashMap::new(),
            selected_show_taken: DashMap::new(),
        }
    }

    /// Answer the `/test-*` aliases instead of the normal commands.
    pub fn testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn lot(&self) -> Arc<Mutex<SpacesLot>> {
        Arc::clone(&self.lot)
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    async fn respond(&self, response: Response) -> Result<()> {
        if response.is_empty() {
            return Ok(());
        }
        self.bus.publish(Event::Response(response)).await?;
        Ok(())
    }

    async fn is_admin(&self, user_id: &str) -> bool {
        self.roster.lock().await.is_admin_id(user_id)
    }

    fn listing(&self, user_id: &str) -> Listing {
        Listing {
            floor: self.selected_floor.get(user_id).map(|f| f.value().clone()),
            show_taken: self
                .selected_show_taken
                .get(user_id)
                .is_some_and(|taken| *taken),
        }
    }

    async fn booking_view(&self, user_id: &str, is_admin: bool) -> Modal {
        let listing = self.listing(user_id);
        let lot = self.lot.lock().await;
        views::booking_modal(&self.profile, &lot, user_id, is_admin, &listing)
    }

    /// Re-render the booking modal the action came from, with an inline error.
    async fn refresh_booking(
        &self,
        action: &BlockAction,
        err_txt: Option<String>,
        mut response: Response,
    ) -> Result<()> {
        let is_admin = self.is_admin(&action.user_id).await;
        let modal = self.booking_view(&action.user_id, is_admin).await;
        response.push(Action::update(
            &action.trigger_id,
            &action.view_id,
            modal,
            err_txt,
        ));
        self.respond(response).await
    }

    fn denied(&self, user: &str, user_id: &str, what: &str) -> Response {
        warn!(manager = self.profile.name, user_id, what, "admin-only action refused");
        Response::new(user).with(Action::ephemeral(
            user_id,
            format!("Sorry, {what} is only available to admins."),
        ))
    }

    /// Insert a first-time caller into the roster as a standard user.
    async fn register(&self, user: &str, user_id: &str) -> Result<()> {
        let mut roster = self.roster.lock().await;
        if roster.exists(user_id) {
            return Ok(());
        }
        match roster.insert_user(user, User::new(user_id, Rights::Standard)) {
            Ok(()) => info!(user, user_id, "new user registered"),
            Err(err) if err.is_fatal() => return Err(Fatal::new(err).into()),
            Err(err) => warn!(user, user_id, error = %err, "could not register user"),
        }
        Ok(())
    }

    // =========================================================================
    // Slash commands
    // =========================================================================

    async fn on_slash_command(&self, cmd: SlashCommand) -> Result<()> {
        if !self.profile.handles_command(&cmd.command, self.testing) {
            return Ok(());
        }
        debug!(manager = self.profile.name, command = %cmd.command, user_id = %cmd.user_id, "slash command");
        self.register(&cmd.user, &cmd.user_id).await?;
        let is_admin = self.is_admin(&cmd.user_id).await;

        let modal = if self.profile.booking.matches(&cmd.command, self.testing) {
            self.booking_view(&cmd.user_id, is_admin).await
        } else if !is_admin {
            let denied = self.denied(&cmd.user, &cmd.user_id, cmd.command.trim());
            return self.respond(denied).await;
        } else if self.profile.admin.matches(&cmd.command, self.testing) {
            let lot = self.lot.lock().await;
            views::spaces_admin_modal(&self.profile, &lot)
        } else {
            let roster = self.roster.lock().await;
            views::users_modal(self.profile.users_title, &roster)
        };

        let response = Response::new(&cmd.user).with(Action::OpenView {
            trigger_id: cmd.trigger_id.clone(),
            modal,
        });
        self.respond(response).await
    }

    // =========================================================================
    // Block actions
    // =========================================================================

    async fn on_block_action(&self, action: BlockAction) -> Result<()> {
        if !self.profile.owns_view(&action.title) {
            return Ok(());
        }
        for item in &action.actions {
            debug!(
                manager = self.profile.name,
                action_id = %item.action_id,
                value = %item.value,
                user_id = %action.user_id,
                "block action"
            );
            match item.action_id.as_str() {
                ids::FLOOR_OPTION => {
                    if let Some(floor) = &item.selected_option {
                        self.selected_floor
                            .insert(action.user_id.clone(), floor.clone());
                    }
                    self.refresh_booking(&action, None, Response::new(&action.user))
                        .await?;
                }
                ids::SHOW_OPTION => {
                    let taken = item.selected_option.as_deref() == Some(ids::SHOW_TAKEN);
                    self.selected_show_taken
                        .insert(action.user_id.clone(), taken);
                    self.refresh_booking(&action, None, Response::new(&action.user))
                        .await?;
                }
                ids::RESERVE_SPACE => self.reserve(&action, item).await?,
                ids::RELEASE_SPACE => self.release(&action, item).await?,
                ids::TEMP_RELEASE_SPACE => self.start_temp_release(&action, item).await?,
                ids::CANCEL_TEMP_RELEASE => self.cancel_temp_release(&action, item).await?,
                ids::RELEASE_START_DATE => self.pick_date(&action, item, DateField::Start).await?,
                ids::RELEASE_END_DATE => self.pick_date(&action, item, DateField::End).await?,
                ids::REMOVE_SPACE => self.remove_space(&action, item).await?,
                ids::TOGGLE_PARKING | ids::TOGGLE_ADMIN => self.toggle_user(&action, item).await?,
                other => debug!(action_id = other, "unhandled action"),
            }
        }
        Ok(())
    }

    async fn reserve(&self, action: &BlockAction, item: &ActionItem) -> Result<()> {
        let auto_release = !self.roster.lock().await.has_parking_by_id(&action.user_id);
        let now = self.clock.now();
        let result = self.lot.lock().await.reserve(
            &item.value,
            &action.user,
            &action.user_id,
            auto_release,
            now,
        );
        let err_txt = match result {
            Ok(()) => None,
            Err(err) => Some(err.into_message()?),
        };
        self.refresh_booking(action, err_txt, Response::new(&action.user))
            .await
    }

    async fn release(&self, action: &BlockAction, item: &ActionItem) -> Result<()> {
        let is_admin = self.is_admin(&action.user_id).await;
        let mut response = Response::new(&action.user);
        let err_txt = {
            let mut lot = self.lot.lock().await;
            match lot.release(&item.value, &action.user, &action.user_id) {
                Ok(displaced) => {
                    if let Some(displaced) = displaced {
                        info!(space = %item.value, victim = %displaced.victim_id, "reservation cleared by another user");
                        response.push(Action::ephemeral(&displaced.victim_id, displaced.message));
                    }
                    let purged = if is_admin {
                        lot.purge_releases(&item.value).err()
                    } else {
                        None
                    };
                    purged.map(UserFacing::into_message).transpose()?
                }
                Err(err) => Some(err.into_message()?),
            }
        };
        self.refresh_booking(action, err_txt, response).await
    }

    async fn start_temp_release(&self, action: &BlockAction, item: &ActionItem) -> Result<()> {
        let is_admin = self.is_admin(&action.user_id).await;
        let owner = self.lot.lock().await.owner_of(&item.value);
        if let Some((owner_id, owner_name)) = &owner {
            if !self.roster.lock().await.has_parking_by_id(owner_id) {
                let msg = format!("{owner_name} has no permanent {} to release", self.profile.noun);
                return self
                    .refresh_booking(action, Some(msg), Response::new(&action.user))
                    .await;
            }
        }

        let rendered = {
            let mut lot = self.lot.lock().await;
            match lot.start_draft(
                &action.view_id,
                &action.user,
                &action.user_id,
                &item.value,
                is_admin,
            ) {
                Ok(at) => {
                    let info = lot.to_be_released.release(&at)?;
                    Ok(views::release_modal(&self.profile, info))
                }
                Err(err) => Err(err.into_message()?),
            }
        };

        match rendered {
            Ok(modal) => {
                let response = Response::new(&action.user).with(Action::PushView {
                    trigger_id: action.trigger_id.clone(),
                    modal,
                });
                self.respond(response).await
            }
            Err(msg) => {
                self.refresh_booking(action, Some(msg), Response::new(&action.user))
                    .await
            }
        }
    }

    async fn cancel_temp_release(&self, action: &BlockAction, item: &ActionItem) -> Result<()> {
        let Some(at) = views::parse_release_value(&item.value) else {
            warn!(value = %item.value, "malformed release reference");
            let msg = "That release no longer exists".to_string();
            return self
                .refresh_booking(action, Some(msg), Response::new(&action.user))
                .await;
        };
        let is_admin = self.is_admin(&action.user_id).await;
        let now = self.clock.now();
        let result = self.lot.lock().await.cancel_release(
            &at,
            &action.user_id,
            is_admin,
            now,
            self.profile.cutoff,
        );

        let mut response = Response::new(&action.user);
        let err_txt = match result {
            Ok(outcome) => {
                response.push(Action::ephemeral(&action.user_id, outcome.message()));
                None
            }
            Err(err) => Some(err.into_message()?),
        };
        self.refresh_booking(action, err_txt, response).await
    }

    /// A date picker changed inside the release modal.
    async fn pick_date(&self, action: &BlockAction, item: &ActionItem, field: DateField) -> Result<()> {
        let date = item.selected_date.as_deref().and_then(parse_date);
        let today = self.clock.now().date();
        let result = self
            .lot
            .lock()
            .await
            .set_draft_date(&action.view_id, field, date);

        let response = match result {
            Ok(info) => {
                let err_txt = info.check(today).err().map(|err| err.to_string());
                Response::new(&action.user).with(Action::update(
                    &action.trigger_id,
                    &action.view_id,
                    views::release_modal(&self.profile, &info),
                    err_txt,
                ))
            }
            Err(err) => {
                Response::new(&action.user).with(Action::ephemeral(&action.user_id, err.into_message()?))
            }
        };
        self.respond(response).await
    }

    async fn remove_space(&self, action: &BlockAction, item: &ActionItem) -> Result<()> {
        if !self.is_admin(&action.user_id).await {
            let denied = self.denied(&action.user, &action.user_id, "removing spaces");
            return self.respond(denied).await;
        }
        let (modal, err_txt) = {
            let mut lot = self.lot.lock().await;
            let err_txt = match lot.remove_space(&item.value) {
                Ok(space) => {
                    info!(space = %space.key(), user_id = %action.user_id, "space removed by admin");
                    None
                }
                Err(err) => Some(err.into_message()?),
            };
            (views::spaces_admin_modal(&self.profile, &lot), err_txt)
        };
        let response = Response::new(&action.user).with(Action::update(
            &action.trigger_id,
            &action.view_id,
            modal,
            err_txt,
        ));
        self.respond(response).await
    }

    async fn toggle_user(&self, action: &BlockAction, item: &ActionItem) -> Result<()> {
        let (modal, err_txt) = {
            let mut roster = self.roster.lock().await;
            if !roster.is_admin_id(&action.user_id) {
                drop(roster);
                let denied = self.denied(&action.user, &action.user_id, "managing users");
                return self.respond(denied).await;
            }
            let target = item.value.as_str();
            let result = match roster.by_id(target).map(|(_, user)| user.clone()) {
                None => Err(RosterError::UnknownUser(target.to_string())),
                Some(user) if item.action_id == ids::TOGGLE_PARKING => {
                    roster.set_parking_permission(target, !user.has_permanent_parking)
                }
                Some(user) => {
                    let rights = if user.is_admin() {
                        Rights::Standard
                    } else {
                        Rights::Admin
                    };
                    roster.set_access_rights(target, rights)
                }
            };
            let err_txt = match result {
                Ok(()) => None,
                Err(err) => Some(err.into_message()?),
            };
            (views::users_modal(self.profile.users_title, &roster), err_txt)
        };
        let response = Response::new(&action.user).with(Action::update(
            &action.trigger_id,
            &action.view_id,
            modal,
            err_txt,
        ));
        self.respond(response).await
    }

    // =========================================================================
    // View lifecycle
    // =========================================================================

    async fn on_view_submission(&self, sub: ViewSubmission) -> Result<()> {
        if sub.title == self.profile.release_title {
            self.submit_release(sub).await
        } else if sub.title == self.profile.admin_title {
            self.add_space(sub).await
        } else {
            Ok(())
        }
    }

    async fn submit_release(&self, sub: ViewSubmission) -> Result<()> {
        let text = |action_id: &str| {
            form_value(&sub.values, action_id)
                .and_then(FormValue::text)
                .map(str::to_string)
        };
        let start = text(ids::RELEASE_START_DATE);
        let end = text(ids::RELEASE_END_DATE);
        let now = self.clock.now();

        let (root_view_id, message) = {
            let mut lot = self.lot.lock().await;
            let root_view_id = lot
                .to_be_released
                .find_by_view_id(&sub.view_id)
                .and_then(|at| lot.to_be_released.release(&at).ok())
                .map(|info| info.root_view_id.clone());

            let message = match lot.submit_release(
                &sub.view_id,
                start.as_deref(),
                end.as_deref(),
                now,
                self.profile.cutoff,
            ) {
                Ok(submitted) => {
                    let range = lot
                        .to_be_released
                        .release(&submitted.at)
                        .map(|info| info.date_range())
                        .unwrap_or_default();
                    if submitted.released_now {
                        format!("{} is released for {range} and is free from now on.", submitted.at.key)
                    } else {
                        format!(
                            "{} is released for {range}. It becomes free at {} the day before.",
                            submitted.at.key, self.profile.cutoff
                        )
                    }
                }
                Err(err) => err.into_message()?,
            };
            (root_view_id, message)
        };

        let mut response =
            Response::new(&sub.user).with(Action::ephemeral(&sub.user_id, message));
        if let Some(root_view_id) = root_view_id.filter(|id| !id.is_empty()) {
            let is_admin = self.is_admin(&sub.user_id).await;
            let modal = self.booking_view(&sub.user_id, is_admin).await;
            response.push(Action::update("", &root_view_id, modal, None));
        }
        self.respond(response).await
    }

    async fn add_space(&self, sub: ViewSubmission) -> Result<()> {
        if !self.is_admin(&sub.user_id).await {
            let denied = self.denied(&sub.user, &sub.user_id, "adding spaces");
            return self.respond(denied).await;
        }
        let text = |action_id: &str| {
            form_value(&sub.values, action_id)
                .and_then(FormValue::text)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        let floor = text(ids::SPACE_FLOOR).parse::<i32>();
        let number = text(ids::SPACE_NUMBER).parse::<i32>();

        let message = match (floor, number) {
            (Ok(floor), Ok(number)) => {
                let space = Space::new(floor, number).with_description(text(ids::SPACE_DESCRIPTION));
                let key = space.key();
                match self.lot.lock().await.add_space(space) {
                    Ok(()) => format!("{key} added."),
                    Err(err) => err.into_message()?,
                }
            }
            _ => "Floor and number must be whole numbers.".to_string(),
        };
        let response = Response::new(&sub.user).with(Action::ephemeral(&sub.user_id, message));
        self.respond(response).await
    }

    async fn on_view_opened(&self, opened: ViewOpened) -> Result<()> {
        if !self.profile.owns_view(&opened.title) || opened.root_view_id.is_empty() {
            return Ok(());
        }
        let bound = self
            .lot
            .lock()
            .await
            .bind_draft_view(&opened.root_view_id, &opened.view_id);
        match bound {
            Ok(Some(at)) => debug!(space = %at.key, id = at.id, view_id = %opened.view_id, "release modal bound"),
            Ok(None) => {}
            Err(err) => {
                let msg = err.into_message()?;
                warn!(view_id = %opened.view_id, error = %msg, "could not bind release modal");
            }
        }
        Ok(())
    }

    async fn on_view_closed(&self, closed: ViewClosed) -> Result<()> {
        if !self.profile.owns_view(&closed.title) {
            return Ok(());
        }
        let discarded = self.lot.lock().await.discard_draft(&closed.view_id);
        match discarded {
            Ok(Some(key)) => debug!(space = %key, view_id = %closed.view_id, "release draft dropped with its view"),
            Ok(None) => {}
            Err(err) => {
                let msg = err.into_message()?;
                warn!(view_id = %closed.view_id, error = %msg, "could not discard release draft");
            }
        }
        Ok(())
    }

    // =========================================================================
    // Timers
    // =========================================================================

    async fn on_timer(&self, timer: TimerDone) -> Result<()> {
        if timer.label != self.profile.reset_label {
            return Ok(());
        }
        info!(manager = self.profile.name, time = %timer.time, "daily reset");
        let result = self.lot.lock().await.release_spaces(timer.time);
        if let Err(err) = result {
            if err.is_fatal() {
                return Err(Fatal::new(err).into());
            }
            warn!(manager = self.profile.name, error = %err, "daily reset finished with errors");
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer for ReservationManager {
    fn name(&self) -> &str {
        self.profile.name
    }

    async fn handle(&self, event: Event) -> Result<()> {
        match event {
            Event::SlashCommand(cmd) => self.on_slash_command(cmd).await,
            Event::BlockAction(action) => self.on_block_action(action).await,
            Event::ViewSubmission(sub) => self.on_view_submission(sub).await,
            Event::ViewOpened(opened) => self.on_view_opened(opened).await,
            Event::ViewClosed(closed) => self.on_view_closed(closed).await,
            Event::TimerDone(timer) => self.on_timer(timer).await,
            Event::Response(_) => Ok(()),
        }
    }
}
