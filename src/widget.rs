//! The mounted widget: owns the store, the rendered leaderboard, the timers and
//! the session, and wires pushes, refresh cycles and clicks into them.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::auth::TokenIssuer;
use crate::config::{Credentials, WidgetConfig};
use crate::constants::{
    ACHIEVEMENT_RELOAD_DELAY_MS, AWARD_CELEBRATION_DELAY_MS, DEFAULT_SHOWN_RANKS,
    OPT_IN_REVALIDATE_ATTEMPTS, OPT_IN_REVALIDATE_DELAY_MS, PRELOADER_STALE_MS,
    PRELOADER_WATCHDOG_MS,
};
use crate::dispatch::{
    dispatch, Action, ActionHandler, ActionNode, ActionTag, Dispatched, ListKind, OptInSurface,
    Region, View,
};
use crate::error::{Result, WidgetError};
use crate::fetch::{
    award_details, award_page, competition_products, contest_rewards, list_achievements,
    list_awards, list_contests, list_tournament_page, list_tournaments, opt_in_state,
    single_wheels, AchievementPages, AwardCategory, AwardPages, TournamentPages,
};
use crate::gateway::{Gateway, LeaderboardSubscription, OptInAction, OptInRequest};
use crate::models::{Award, Competition, InstantWin, InstantWinPlay};
use crate::preloader::{Preloader, Recovery};
use crate::reconcile::{placeholder_rows, LeaderboardView, ReconcileReport, RenderOptions};
use crate::scheduler::{Scheduler, TimerKind};
use crate::session::{route, Connector, PushRoute, Session, SessionEvent, StatusChange};
use crate::status::OptInState;
use crate::store::{
    select_competition, select_contest, Achievements, Awards, CompetitionChange, LeaderboardTarget,
    PreparedCompetition, Store, TournamentCategory, Tournaments,
};
use crate::surface::RowSurface;

const COMPETITION: &str = "Competition";
const ACHIEVEMENT: &str = "Achievement";

/// Host-side hooks. Every method defaults to a no-op.
pub trait WidgetObserver: Send + Sync {
    fn leaderboard_painted(&self, _report: &ReconcileReport) {}
    fn error_state(&self, _active: bool) {}
    fn competitions_loaded(&self, _tournaments: &Tournaments) {}
    fn achievements_loaded(&self, _achievements: &Achievements) {}
    fn awards_loaded(&self, _awards: &Awards) {}
    fn award_details(&self, _award: &Award) {}
    fn award_celebration(&self, _award: &Award) {}
    fn status_changed(&self, _change: &StatusChange) {}
    fn achievement_progress(&self, _achievement_id: &str, _percentage: f64) {}
    fn instant_wins_loaded(&self, _instant_wins: &[InstantWin]) {}
    fn instant_win_played(&self, _play: &InstantWinPlay) {}
    /// Presentation-only actions (navigation, toggles) the host renders itself.
    fn view_action(&self, _action: &Action) {}
    fn drawer_closed(&self, _drawer: Region) {}
    fn preloader_recovered(&self) {}
    fn disconnected(&self) {}
}

pub struct NoopObserver;

impl WidgetObserver for NoopObserver {}

pub struct Widget<S: RowSurface> {
    me: Weak<Widget<S>>,
    config: WidgetConfig,
    session: Arc<Session>,
    store: RwLock<Store>,
    view: Mutex<LeaderboardView<S>>,
    scheduler: Arc<Scheduler>,
    preloader: Preloader,
    observer: Arc<dyn WidgetObserver>,
    events: StdMutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
    router: StdMutex<Option<AbortHandle>>,
    drawer: StdMutex<Option<Region>>,
    running: AtomicBool,
    halted: AtomicBool,
    closed: AtomicBool,
}

impl<S> Widget<S>
where
    S: RowSurface + Send + 'static,
    S::Row: Send + 'static,
{
    pub fn new(
        config: WidgetConfig,
        issuer: Arc<dyn TokenIssuer>,
        connector: Arc<dyn Connector>,
        surface: S,
        observer: Arc<dyn WidgetObserver>,
    ) -> Arc<Self> {
        let (session, events) = Session::new(issuer, connector);
        let options = RenderOptions {
            member_ref_id: None,
            member_label: config.member_label.clone(),
            name_length: config.member_name_length,
            always_shown: DEFAULT_SHOWN_RANKS,
        };
        let store = Store::new(config.leaderboard_size_floor);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            session,
            store: RwLock::new(store),
            view: Mutex::new(LeaderboardView::new(surface, options)),
            scheduler: Scheduler::new(),
            preloader: Preloader::default(),
            observer,
            events: StdMutex::new(Some(events)),
            router: StdMutex::new(None),
            drawer: StdMutex::new(None),
            running: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub async fn store(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().await
    }

    pub async fn view(&self) -> MutexGuard<'_, LeaderboardView<S>> {
        self.view.lock().await
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn preloader(&self) -> &Preloader {
        &self.preloader
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Connects, loads the member and runs the first competition refresh.
    pub async fn start(self: &Arc<Self>, credentials: Credentials) -> Result<()> {
        self.spawn_router();
        if let Err(err) = self.session.connect(credentials).await {
            self.fail(&err).await;
            return Err(err);
        }
        info!("widget connected");
        self.load_member().await;
        self.restart_activity().await;
        Ok(())
    }

    pub async fn handle(self: &Arc<Self>, node: &ActionNode) -> Dispatched {
        dispatch(node, self.as_ref()).await
    }

    /// Cancels every timer. Pending responses still land in the store but no
    /// cycle re-arms until `restart_activity`.
    pub fn stop_activity(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.scheduler.stop_all();
        self.preloader.hide();
        info!("widget activity stopped");
    }

    /// Starts the refresh cycles over from scratch.
    pub async fn restart_activity(self: &Arc<Self>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        self.start_watchdog();
        self.competition_refresh().await;
    }

    /// Rebuilds the channel for another member or token and restarts activity.
    pub async fn refresh_credentials(self: &Arc<Self>, credentials: Credentials) -> Result<()> {
        self.stop_activity();
        {
            let mut store = self.store.write().await;
            store.switch_subscription(None);
            store.reset_member();
        }
        self.view.lock().await.set_member(None);
        self.halted.store(false, Ordering::SeqCst);
        if let Err(err) = self.session.refresh_credentials(credentials).await {
            self.fail(&err).await;
            return Err(err);
        }
        self.set_error(false).await;
        self.load_member().await;
        self.restart_activity().await;
        Ok(())
    }

    /// Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_activity();
        let previous = {
            let mut store = self.store.write().await;
            let previous = store.switch_subscription(None);
            store.deactivate();
            previous
        };
        if let (Some(previous), Some(gateway)) = (previous, self.session.gateway()) {
            if let Err(err) = gateway
                .leaderboard(&LeaderboardSubscription::unsubscribe(previous.as_str()))
                .await
            {
                debug!(?err, "unsubscribe on close failed");
            }
        }
        self.session.disconnect().await;
        if let Some(router) = self.router.lock().ok().and_then(|mut router| router.take()) {
            router.abort();
        }
        info!("widget closed");
    }

    fn spawn_router(&self) {
        let Some(mut events) = self.events.lock().ok().and_then(|mut events| events.take()) else {
            return;
        };
        let widget = self.me.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(widget) = widget.upgrade() else {
                    break;
                };
                widget.on_event(event).await;
            }
        });
        if let Ok(mut router) = self.router.lock() {
            *router = Some(task.abort_handle());
        }
    }

    async fn on_event(self: &Arc<Self>, event: SessionEvent) {
        match event {
            SessionEvent::Push(push) => self.on_push(route(&push)).await,
            SessionEvent::Connected => {
                if self.halted.swap(false, Ordering::SeqCst) {
                    info!("reconnected after authentication failure; resuming");
                    self.set_error(false).await;
                    self.restart_activity().await;
                }
            }
            SessionEvent::AuthFailed(reason) => {
                self.fail(&WidgetError::Auth(reason)).await;
            }
            SessionEvent::Disconnected => {
                warn!("gateway disconnected");
                self.store.write().await.switch_subscription(None);
                self.set_error(true).await;
                self.observer.disconnected();
            }
        }
    }

    async fn on_push(self: &Arc<Self>, route: PushRoute) {
        match route {
            PushRoute::LeaderboardUpdate { contest_id, entries } => {
                let applied = self
                    .store
                    .write()
                    .await
                    .apply_leaderboard_push(&contest_id, entries);
                if applied {
                    self.paint().await;
                } else {
                    debug!(%contest_id, "ignoring leaderboard push for inactive contest");
                }
            }
            PushRoute::AwardIssued { award_id } => self.schedule_award_celebration(award_id),
            PushRoute::CompetitionsChanged { status } => {
                if let Some(change) = status {
                    info!(entity = %change.entity_id, from = %change.previous, to = %change.current, "status changed");
                    self.observer.status_changed(&change);
                }
                self.competition_refresh().await;
            }
            PushRoute::AchievementProgress {
                achievement_id,
                percentage,
            } => self.observer.achievement_progress(&achievement_id, percentage),
            PushRoute::AchievementsChanged => self.load_achievements().await,
            PushRoute::Ignored => {}
        }
    }

    fn gateway(&self) -> Result<Arc<dyn Gateway>> {
        self.session.gateway().ok_or(WidgetError::Disconnected)
    }

    /// Converts a failure into widget state. Authentication failures halt all
    /// activity until the next successful connect.
    async fn fail(&self, err: &WidgetError) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(?err, "ignoring failure after close");
            return;
        }
        if err.is_auth() {
            if !self.halted.swap(true, Ordering::SeqCst) {
                error!(?err, "authentication failed; refresh halted");
                self.stop_activity();
            }
        } else {
            warn!(?err, "widget request failed");
        }
        self.set_error(true).await;
    }

    async fn set_error(&self, active: bool) {
        let changed = {
            let mut store = self.store.write().await;
            let changed = store.has_error() != active;
            store.set_error(active);
            changed
        };
        if changed {
            self.observer.error_state(active);
        }
    }

    async fn load_member(&self) {
        let result = async { self.gateway()?.member().await }.await;
        match result {
            Ok(member) => {
                debug!(member_ref_id = %member.member_ref_id, "member loaded");
                self.store.write().await.set_member(member);
            }
            Err(err) => self.fail(&err).await,
        }
    }

    fn competition_job(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move { self.competition_refresh().await })
    }

    fn leaderboard_job(self: Arc<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async move { self.leaderboard_refresh().await })
    }

    /// Re-lists competitions, re-derives the active contest, refreshes the
    /// leaderboard, then schedules the next run.
    pub async fn competition_refresh(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        self.scheduler.cancel(TimerKind::CompetitionRefresh);
        let epoch = self.scheduler.epoch();

        match self.refresh_competitions().await {
            Ok(()) => {
                self.scheduler.cancel(TimerKind::LeaderboardRefresh);
                self.leaderboard_refresh().await;
            }
            Err(err) => self.fail(&err).await,
        }

        self.scheduler.schedule_if_current(
            epoch,
            TimerKind::CompetitionRefresh,
            self.config.competition_refresh,
            Arc::clone(self).competition_job(),
        );
    }

    /// Polls opt-in when still unconfirmed, re-subscribes and repaints, then
    /// schedules the next run.
    pub async fn leaderboard_refresh(self: &Arc<Self>) {
        if !self.is_running() {
            return;
        }
        self.scheduler.cancel(TimerKind::LeaderboardRefresh);
        let epoch = self.scheduler.epoch();

        if let Err(err) = self.refresh_leaderboard().await {
            self.fail(&err).await;
        }

        self.scheduler.schedule_if_current(
            epoch,
            TimerKind::LeaderboardRefresh,
            self.config.leaderboard_refresh,
            Arc::clone(self).leaderboard_job(),
        );
    }

    fn tournament_pages(store: &Store) -> TournamentPages {
        let tournaments = store.tournaments();
        TournamentPages {
            ready: tournaments.ready.page,
            active: tournaments.active.page,
            finished: tournaments.finished.page,
        }
    }

    /// Fetches the listings and everything the selected competition needs,
    /// then applies it all under one write lock. A failed fetch leaves the
    /// store untouched.
    async fn refresh_competitions(&self) -> Result<()> {
        let gateway = self.gateway()?;
        let (pages, pinned) = {
            let store = self.store.read().await;
            (
                Self::tournament_pages(&store),
                store.pinned_competition_id().map(str::to_string),
            )
        };
        let tournaments = list_tournaments(gateway.as_ref(), &self.config, pages).await?;
        let prepared = match select_competition(pinned.as_deref(), &tournaments) {
            Some(competition) => Some(prepare_competition(gateway.as_ref(), competition).await?),
            None => None,
        };

        let mut store = self.store.write().await;
        if store.pinned_competition_id() != pinned.as_deref() {
            debug!(?pinned, "competition pinned while refreshing; leaving it to the next cycle");
            return Ok(());
        }
        let previous = store.active_competition_id().map(str::to_string);
        let previous_contest = store.active_contest_id().map(str::to_string);
        let change = store.apply_listing(tournaments, prepared);
        self.observer.competitions_loaded(store.tournaments());
        match change {
            CompetitionChange::Deactivated => info!("no ready or active competitions"),
            CompetitionChange::Switched { .. } => {
                info!(?previous, current = ?store.active_competition_id(), "active competition switched");
            }
            CompetitionChange::Unchanged => {}
        }
        if store.active_contest_id() != previous_contest.as_deref() {
            info!(contest_id = ?store.active_contest_id(), "active contest changed");
        }
        Ok(())
    }

    async fn refresh_leaderboard(&self) -> Result<()> {
        let gateway = self.gateway()?;
        let poll = {
            let store = self.store.read().await;
            if store.needs_opt_in_poll() {
                store.active_competition_id().map(str::to_string)
            } else {
                None
            }
        };
        if let Some(competition_id) = poll {
            let state = opt_in_state(gateway.as_ref(), COMPETITION, &competition_id).await?;
            self.store.write().await.set_opt_in(&competition_id, state);
        }
        self.subscribe_and_paint(gateway.as_ref()).await
    }

    async fn subscribe_and_paint(&self, gateway: &dyn Gateway) -> Result<()> {
        let (target, previous, ticket, size) = {
            let mut store = self.store.write().await;
            let target = if store.may_subscribe() {
                store.leaderboard_target()
            } else {
                LeaderboardTarget::Empty
            };
            let previous = store.switch_subscription(target.entity_id());
            (target, previous, store.ticket(), store.leaderboard_size())
        };

        if let Some(previous) = previous {
            debug!(%previous, "releasing leaderboard subscription");
            if let Err(err) = gateway
                .leaderboard(&LeaderboardSubscription::unsubscribe(previous.as_str()))
                .await
            {
                warn!(?err, %previous, "unsubscribe failed");
            }
        }

        if let Some(entity_id) = target.entity_id() {
            let rows = gateway
                .leaderboard(&LeaderboardSubscription::subscribe(entity_id, size))
                .await?;
            if !self.store.write().await.apply_leaderboard(&ticket, rows) {
                debug!(entity_id, "dropping stale leaderboard response");
            }
        }
        self.paint().await;
        Ok(())
    }

    async fn paint(&self) {
        let (rows, rewards, size, member_ref_id) = {
            let store = self.store.read().await;
            (
                store.leaderboard().to_vec(),
                store.active_rewards().to_vec(),
                store.leaderboard_size(),
                store.member_ref_id().map(str::to_string),
            )
        };
        let rows = if rows.is_empty() {
            placeholder_rows(size + 1)
        } else {
            rows
        };
        let report = {
            let mut view = self.view.lock().await;
            view.set_member(member_ref_id);
            view.reconcile(&rows, &rewards)
        };
        debug!(?report, "leaderboard painted");
        self.observer.leaderboard_painted(&report);
    }

    fn start_watchdog(self: &Arc<Self>) {
        let widget = Arc::downgrade(self);
        self.scheduler.every(
            TimerKind::PreloaderWatchdog,
            Duration::from_millis(PRELOADER_WATCHDOG_MS),
            move || {
                let widget = widget.clone();
                async move {
                    if let Some(widget) = widget.upgrade() {
                        widget.check_preloader();
                    }
                }
            },
        );
    }

    fn check_preloader(&self) {
        let Some(recovery) = self
            .preloader
            .take_stale(Duration::from_millis(PRELOADER_STALE_MS))
        else {
            return;
        };
        warn!("loading spinner stuck; recovering");
        if let Some(recovery) = recovery {
            recovery();
        }
        self.observer.preloader_recovered();
    }

    /// Shows the spinner with a recovery that forces a leaderboard refresh.
    fn show_preloader(&self) {
        let widget = self.me.clone();
        let recovery: Recovery = Arc::new(move || {
            if let Some(widget) = widget.upgrade() {
                tokio::spawn(async move { widget.leaderboard_refresh().await });
            }
        });
        self.preloader.show(Some(recovery));
    }

    /// Runs `job` after `delay` unless activity was stopped or the widget
    /// closed in the meantime.
    fn spawn_delayed<F, Fut>(&self, delay: Duration, job: F)
    where
        F: FnOnce(Arc<Self>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let widget = self.me.clone();
        let epoch = self.scheduler.epoch();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(widget) = widget.upgrade() else {
                return;
            };
            if widget.closed.load(Ordering::SeqCst) || widget.scheduler.epoch() != epoch {
                debug!("dropping delayed job after stop");
                return;
            }
            job(widget).await;
        });
    }

    fn schedule_award_celebration(&self, award_id: String) {
        self.spawn_delayed(
            Duration::from_millis(AWARD_CELEBRATION_DELAY_MS),
            move |widget| async move { widget.celebrate(&award_id).await },
        );
    }

    async fn celebrate(&self, award_id: &str) {
        let result = async { award_details(self.gateway()?.as_ref(), award_id).await }.await;
        match result {
            Ok(Some(award)) if !award.claimed => {
                info!(award_id, "award issued");
                self.observer.award_celebration(&award);
            }
            Ok(_) => debug!(award_id, "no unclaimed award to celebrate"),
            Err(err) => self.fail(&err).await,
        }
        self.load_awards().await;
    }

    pub async fn load_achievements(&self) {
        let pages = {
            let store = self.store.read().await;
            AchievementPages {
                current: store.achievements().current.page,
                past: store.achievements().past.page,
            }
        };
        let result = async { list_achievements(self.gateway()?.as_ref(), &self.config, pages).await }.await;
        match result {
            Ok(achievements) => {
                let mut store = self.store.write().await;
                store.set_achievements(achievements);
                self.observer.achievements_loaded(store.achievements());
            }
            Err(err) => self.fail(&err).await,
        }
    }

    pub async fn load_awards(&self) {
        let pages = {
            let store = self.store.read().await;
            let awards = store.awards();
            AwardPages {
                available: awards.available.page,
                claimed: awards.claimed.page,
                expired: awards.expired.page,
            }
        };
        let result = async { list_awards(self.gateway()?.as_ref(), pages).await }.await;
        match result {
            Ok(awards) => {
                let mut store = self.store.write().await;
                store.set_awards(awards);
                self.observer.awards_loaded(store.awards());
            }
            Err(err) => self.fail(&err).await,
        }
    }

    async fn manage_opt_in(&self, entity_type: &str, entity_id: &str, action: OptInAction) -> Result<()> {
        info!(entity_type, entity_id, ?action, "managing opt-in");
        self.gateway()?
            .manage_opt_in(&OptInRequest {
                entity_id: entity_id.to_string(),
                entity_type: entity_type.to_string(),
                action,
            })
            .await
    }

    /// Re-reads the opt-in state until it is confirmed or attempts run out.
    async fn revalidate_opt_in(&self, competition_id: &str) -> Result<OptInState> {
        let gateway = self.gateway()?;
        let mut state = OptInState::NotOptedIn;
        for attempt in 1..=OPT_IN_REVALIDATE_ATTEMPTS {
            tokio::time::sleep(Duration::from_millis(OPT_IN_REVALIDATE_DELAY_MS)).await;
            state = opt_in_state(gateway.as_ref(), COMPETITION, competition_id).await?;
            if state.is_confirmed() {
                break;
            }
            debug!(attempt, ?state, competition_id, "opt-in not confirmed yet");
        }
        self.store.write().await.set_opt_in(competition_id, state);
        Ok(state)
    }

    pub async fn opt_in_active_competition(self: &Arc<Self>) -> Result<()> {
        let Some(competition_id) = self.store.read().await.active_competition_id().map(str::to_string) else {
            return Ok(());
        };
        self.manage_opt_in(COMPETITION, &competition_id, OptInAction::Join).await?;
        let state = self.revalidate_opt_in(&competition_id).await?;
        info!(%competition_id, ?state, "opted in");
        self.leaderboard_refresh().await;
        Ok(())
    }

    pub async fn opt_in_competition(self: &Arc<Self>, competition_id: &str) -> Result<()> {
        self.manage_opt_in(COMPETITION, competition_id, OptInAction::Join).await?;
        let active = self.store.read().await.active_competition_id() == Some(competition_id);
        if active {
            self.revalidate_opt_in(competition_id).await?;
            self.leaderboard_refresh().await;
        } else {
            self.competition_refresh().await;
        }
        Ok(())
    }

    pub async fn opt_out_active_competition(self: &Arc<Self>) -> Result<()> {
        let Some(competition_id) = self.store.read().await.active_competition_id().map(str::to_string) else {
            return Ok(());
        };
        self.manage_opt_in(COMPETITION, &competition_id, OptInAction::Leave).await?;
        self.store
            .write()
            .await
            .set_opt_in(&competition_id, OptInState::NotOptedIn);
        self.leaderboard_refresh().await;
        Ok(())
    }

    async fn achievement_opt_in(&self, achievement_id: &str, action: OptInAction) -> Result<()> {
        self.manage_opt_in(ACHIEVEMENT, achievement_id, action).await?;
        self.spawn_delayed(
            Duration::from_millis(ACHIEVEMENT_RELOAD_DELAY_MS),
            |widget| async move { widget.load_achievements().await },
        );
        Ok(())
    }

    /// Makes another contest of the active competition the leaderboard source.
    pub async fn select_contest(self: &Arc<Self>, contest_id: &str) -> Result<()> {
        if !self.store.write().await.choose_contest(contest_id) {
            debug!(contest_id, "unknown contest");
            return Ok(());
        }
        let rewards = contest_rewards(self.gateway()?.as_ref(), contest_id).await?;
        if !rewards.is_empty() {
            self.store.write().await.set_contest_rewards(contest_id, rewards);
        }
        self.leaderboard_refresh().await;
        Ok(())
    }

    /// Pins a competition and reloads around it.
    pub async fn open_tournament(self: &Arc<Self>, competition_id: &str) {
        self.store.write().await.pin_competition(competition_id);
        self.competition_refresh().await;
    }

    pub async fn claim_award(&self, award_id: &str) -> Result<()> {
        self.gateway()?.claim_awards(&[award_id.to_string()]).await?;
        info!(award_id, "award claimed");
        self.load_awards().await;
        Ok(())
    }

    pub async fn play_instant_win(&self, instant_win_id: &str) -> Result<()> {
        let play = self.gateway()?.play_instant_win(instant_win_id).await?;
        self.observer.instant_win_played(&play);
        self.load_awards().await;
        Ok(())
    }

    async fn paginate(&self, list: ListKind, page: u32) -> Result<()> {
        let gateway = self.gateway()?;
        let gateway = gateway.as_ref();
        let tournament = match list {
            ListKind::ReadyTournaments => Some(TournamentCategory::Ready),
            ListKind::ActiveTournaments => Some(TournamentCategory::Active),
            ListKind::FinishedTournaments => Some(TournamentCategory::Finished),
            _ => None,
        };
        if let Some(category) = tournament {
            let partition = list_tournament_page(gateway, &self.config, category, page).await?;
            let mut store = self.store.write().await;
            store.set_tournament_page(category, partition);
            self.observer.competitions_loaded(store.tournaments());
            return Ok(());
        }

        let award = match list {
            ListKind::AvailableAwards => Some(AwardCategory::Available),
            ListKind::ClaimedAwards => Some(AwardCategory::Claimed),
            ListKind::ExpiredAwards => Some(AwardCategory::Expired),
            _ => None,
        };
        if let Some(category) = award {
            let partition = award_page(gateway, category, page).await?;
            let mut store = self.store.write().await;
            let mut awards = store.awards().clone();
            match category {
                AwardCategory::Available => awards.available = partition,
                AwardCategory::Claimed => awards.claimed = partition,
                AwardCategory::Expired => awards.expired = partition,
            }
            store.set_awards(awards);
            self.observer.awards_loaded(store.awards());
            return Ok(());
        }

        let mut pages = {
            let store = self.store.read().await;
            AchievementPages {
                current: store.achievements().current.page,
                past: store.achievements().past.page,
            }
        };
        match list {
            ListKind::PastAchievements => pages.past = page,
            _ => pages.current = page,
        }
        let achievements = list_achievements(gateway, &self.config, pages).await?;
        let mut store = self.store.write().await;
        store.set_achievements(achievements);
        self.observer.achievements_loaded(store.achievements());
        Ok(())
    }

    async fn current_page(&self, list: ListKind) -> u32 {
        let store = self.store.read().await;
        match list {
            ListKind::ReadyTournaments => store.tournaments().ready.page,
            ListKind::ActiveTournaments => store.tournaments().active.page,
            ListKind::FinishedTournaments => store.tournaments().finished.page,
            ListKind::CurrentAchievements => store.achievements().current.page,
            ListKind::PastAchievements => store.achievements().past.page,
            ListKind::AvailableAwards => store.awards().available.page,
            ListKind::ClaimedAwards => store.awards().claimed.page,
            ListKind::ExpiredAwards => store.awards().expired.page,
        }
    }

    async fn navigate(self: &Arc<Self>, view: View) -> Result<()> {
        match view {
            View::Leaderboard | View::Dashboard if !self.is_running() => self.restart_activity().await,
            View::Achievements => self.load_achievements().await,
            View::Rewards | View::Inbox => self.load_awards().await,
            View::InstantWins => self.open_instant_wins().await?,
            _ => {}
        }
        Ok(())
    }

    async fn open_instant_wins(&self) -> Result<()> {
        let wheels = single_wheels(self.gateway()?.as_ref()).await?;
        self.observer.instant_wins_loaded(&wheels);
        Ok(())
    }

    async fn open_award(&self, award_id: &str) -> Result<()> {
        match award_details(self.gateway()?.as_ref(), award_id).await? {
            Some(award) => {
                if let Ok(mut drawer) = self.drawer.lock() {
                    *drawer = Some(Region::RewardDrawer);
                }
                self.observer.award_details(&award);
            }
            None => debug!(award_id, "award not found"),
        }
        Ok(())
    }

    fn close_award_drawer(&self) {
        let closed = self.drawer.lock().ok().and_then(|mut drawer| drawer.take());
        if let Some(drawer) = closed {
            self.observer.drawer_closed(drawer);
        }
    }

    async fn run_action(self: &Arc<Self>, action: &Action) -> Result<()> {
        match &action.tag {
            ActionTag::OptInActiveCompetition { surface } => {
                let spinner = *surface == OptInSurface::Leaderboard;
                if spinner {
                    self.show_preloader();
                }
                let result = self.opt_in_active_competition().await;
                if spinner {
                    self.preloader.hide();
                }
                result?;
            }
            ActionTag::OptInCompetition { competition_id } => {
                self.opt_in_competition(competition_id).await?;
            }
            ActionTag::OptOutActiveCompetition => {
                self.show_preloader();
                let result = self.opt_out_active_competition().await;
                self.preloader.hide();
                result?;
            }
            ActionTag::JoinAchievement { achievement_id } => {
                self.achievement_opt_in(achievement_id, OptInAction::Join).await?;
            }
            ActionTag::LeaveAchievement { achievement_id } => {
                self.achievement_opt_in(achievement_id, OptInAction::Leave).await?;
            }
            ActionTag::SelectContest { contest_id } => self.select_contest(contest_id).await?,
            ActionTag::OpenTournament { competition_id } => {
                self.open_tournament(competition_id).await;
                self.observer.view_action(action);
            }
            ActionTag::OpenAward { award_id } => self.open_award(award_id).await?,
            ActionTag::ClaimAward { award_id } => {
                self.close_award_drawer();
                self.claim_award(award_id).await?;
            }
            ActionTag::DeclineAward { .. } => {
                self.close_award_drawer();
                self.observer.view_action(action);
            }
            ActionTag::Paginate { list, page } => self.paginate(*list, *page).await?,
            ActionTag::ShowMore { list } => {
                let next = self.current_page(*list).await + 1;
                self.paginate(*list, next).await?;
            }
            ActionTag::OpenInstantWins => self.open_instant_wins().await?,
            ActionTag::PlayInstantWin { instant_win_id } => {
                self.play_instant_win(instant_win_id).await?;
            }
            ActionTag::Navigate { view } | ActionTag::Back { view } => {
                self.navigate(*view).await?;
                self.observer.view_action(action);
            }
            ActionTag::CloseWidget => {
                self.stop_activity();
                self.observer.view_action(action);
            }
            ActionTag::ErrorBack => {
                self.set_error(false).await;
                self.restart_activity().await;
            }
            ActionTag::ErrorClose => {
                self.set_error(false).await;
                self.stop_activity();
                self.observer.view_action(action);
            }
            ActionTag::OpenAchievement { .. }
            | ActionTag::CloseNotification
            | ActionTag::Toggle { .. } => self.observer.view_action(action),
            ActionTag::Region { .. } => {}
        }
        Ok(())
    }
}

async fn prepare_competition(
    gateway: &dyn Gateway,
    competition: Competition,
) -> Result<PreparedCompetition> {
    let contests = list_contests(gateway, &competition).await?;
    let active = select_contest(&competition, &contests);
    let rewards = match active.as_ref() {
        Some(contest) => contest_rewards(gateway, &contest.id).await?,
        None => Vec::new(),
    };
    let products = competition_products(gateway, &competition.id).await?;
    Ok(PreparedCompetition {
        competition,
        contests,
        active,
        rewards,
        products,
    })
}

#[async_trait]
impl<S> ActionHandler for Widget<S>
where
    S: RowSurface + Send + 'static,
    S::Row: Send + 'static,
{
    fn open_drawer(&self) -> Option<Region> {
        self.drawer.lock().ok().and_then(|drawer| *drawer)
    }

    async fn close_drawer(&self, drawer: Region) {
        if let Ok(mut open) = self.drawer.lock() {
            if *open == Some(drawer) {
                *open = None;
            }
        }
        self.observer.drawer_closed(drawer);
    }

    async fn perform(&self, action: &Action) {
        let Some(widget) = self.me.upgrade() else {
            return;
        };
        if let Err(err) = widget.run_action(action).await {
            widget.fail(&err).await;
        }
    }
}
