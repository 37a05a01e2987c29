use std::collections::HashSet;

use rand::{rngs::StdRng, SeedableRng};
use shared::{
    domain::{
        AppState, HeldModifiers, Keybinds, Mode, PlanetId, ShortcutAction, SystemId, Viewport,
        DEFAULT_PLANET_SIZE_PERCENT,
    },
    error::{ImportError, Notice, StorageError},
    migrate::{migrate, parse_document},
    store::DocumentStore,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub mod bootstrap;
pub mod error;
pub mod history;
pub mod interaction;
pub mod kinematics;
pub mod patch;
pub mod persistence;
pub mod placement;

pub use error::CommandError;
pub use interaction::{DragState, MoveOutcome, PointerTarget, PressOutcome, Selection};
pub use patch::{PlanetPatch, SettingsPatch, SystemPatch};

use history::{History, Snapshot};
use interaction::InteractionController;
use persistence::Gateway;

const NOTICE_CHANNEL_CAPACITY: usize = 256;

/// Owns the document and drives every user-facing operation on it.
///
/// Operations that change the document persist it before returning. Frame
/// ticks and pointer down/move only touch memory.
pub struct Organizer<S> {
    state: AppState,
    gateway: Gateway<S>,
    history: History,
    interaction: InteractionController,
    viewport: Viewport,
    rng: StdRng,
    notices: broadcast::Sender<Notice>,
}

impl<S: DocumentStore> Organizer<S> {
    pub async fn open(store: S, viewport: Viewport) -> Self {
        Self::open_with_rng(store, viewport, StdRng::from_entropy()).await
    }

    /// Loads and migrates the stored document, seeding the starter systems
    /// when nothing usable is there, and writes the result back.
    pub async fn open_with_rng(store: S, viewport: Viewport, rng: StdRng) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        let mut organizer = Self {
            state: AppState::default(),
            gateway: Gateway::new(store),
            history: History::new(),
            interaction: InteractionController::new(),
            viewport,
            rng,
            notices,
        };

        match organizer.gateway.load().await {
            Some(raw) => {
                organizer.state = migrate(&raw);
                info!(
                    "organizer: loaded document systems={}",
                    organizer.state.systems.len()
                );
            }
            None => info!("organizer: no stored document, starting fresh"),
        }
        if organizer.state.needs_bootstrap() {
            bootstrap::seed_default_systems(&mut organizer.state, &mut organizer.rng);
        }
        organizer.rebase_history();
        let _ = organizer.save().await;
        organizer
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Direct access for hosts that bind form fields to the document. Run
    /// [`Organizer::repair`] afterwards if invariants may have been broken.
    pub fn state_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn selection(&self) -> &Selection {
        self.interaction.selection()
    }

    pub fn drag(&self) -> &DragState {
        self.interaction.drag()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn store(&self) -> &S {
        self.gateway.store()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Writes the whole document and, on success, records it for undo.
    pub async fn save(&mut self) -> Result<(), StorageError> {
        if let Err(err) = self.gateway.save(&self.state).await {
            warn!("organizer: save failed: {err}");
            self.notify(Notice::error("Failed to save - storage may be full"));
            return Err(err);
        }
        match Snapshot::capture(&self.state) {
            Ok(snapshot) => {
                self.history.record(snapshot);
            }
            Err(err) => warn!("organizer: snapshot failed: {err}"),
        }
        Ok(())
    }

    pub fn on_frame(&mut self, elapsed: f64) -> usize {
        kinematics::tick_holding(&mut self.state, elapsed, self.interaction.dragged_planet())
    }

    pub fn pointer_down(&mut self, target: PointerTarget, pointer: (f64, f64)) -> PressOutcome {
        let outcome = self
            .interaction
            .press(&self.state, &self.viewport, target, pointer);
        if let PressOutcome::OpenLink(url) = &outcome {
            info!("organizer: opening link url={url}");
        }
        outcome
    }

    pub fn pointer_move(&mut self, pointer: (f64, f64)) -> MoveOutcome {
        let outcome = self
            .interaction
            .drag_to(&mut self.state, &self.viewport, pointer);
        if outcome == (MoveOutcome::Locked { first: true }) {
            self.notify(Notice::warning("Layout is locked"));
        }
        outcome
    }

    /// Ends a drag and persists where the planet landed. Returns whether a
    /// drag was in progress.
    pub async fn pointer_up(&mut self) -> bool {
        if !self.interaction.release() {
            return false;
        }
        let _ = self.save().await;
        true
    }

    pub async fn create_planet(&mut self) -> Result<PlanetId, CommandError> {
        if self.state.current_system().is_none() {
            self.notify(Notice::warning("No system selected - creating a new one first"));
            self.insert_new_system();
        }

        let size_px = self.viewport.planet_size_px(DEFAULT_PLANET_SIZE_PERCENT);
        let Some(system) = self
            .state
            .current
            .as_ref()
            .and_then(|id| self.state.systems.get_mut(id))
        else {
            return Err(CommandError::NoActiveSystem);
        };
        let placement = placement::place(system, size_px, &self.viewport, &mut self.rng);
        if placement.fallback {
            debug!("organizer: no free spot found, using fallback x={}", placement.x);
        }
        let planet = bootstrap::new_planet(
            &self.state.adv,
            "",
            (placement.x, placement.y),
            &mut self.rng,
        );
        let id = planet.id.clone();
        system.planets.push(planet);

        self.notify(Notice::info("Planet created"));
        let _ = self.save().await;
        Ok(id)
    }

    pub async fn delete_planet(&mut self, id: &PlanetId) -> Result<(), CommandError> {
        let system = self
            .state
            .current_system_mut()
            .ok_or(CommandError::NoActiveSystem)?;
        system
            .remove_planet(id)
            .ok_or_else(|| CommandError::UnknownPlanet(id.clone()))?;
        self.interaction.forget_missing(&self.state);

        self.notify(Notice::info("Planet deleted"));
        let _ = self.save().await;
        Ok(())
    }

    pub async fn new_system(&mut self) -> SystemId {
        let id = self.insert_new_system();
        self.interaction.forget_missing(&self.state);
        self.notify(Notice::info("New system created"));
        let _ = self.save().await;
        id
    }

    fn insert_new_system(&mut self) -> SystemId {
        let system = bootstrap::new_system(&self.state, &mut self.rng);
        let id = system.id.clone();
        self.state.systems.insert(system);
        self.state.current = Some(id.clone());
        info!("organizer: created system id={id}");
        id
    }

    pub async fn delete_system(&mut self, id: &SystemId) -> Result<(), CommandError> {
        if !self.state.systems.contains(id) {
            return Err(CommandError::UnknownSystem(id.clone()));
        }
        if self.state.systems.len() <= 1 {
            self.notify(Notice::warning("Must have at least one system"));
            return Err(CommandError::LastSystem);
        }

        self.state.systems.remove(id);
        if self.state.current.as_ref() == Some(id) {
            self.state.current = self.state.systems.first_id().cloned();
        }
        self.interaction.forget_missing(&self.state);
        info!("organizer: deleted system id={id}");

        self.notify(Notice::info("System deleted"));
        let _ = self.save().await;
        Ok(())
    }

    pub async fn duplicate_system(&mut self, id: &SystemId) -> Result<SystemId, CommandError> {
        let copy = self
            .state
            .systems
            .get(id)
            .map(|system| system.duplicate())
            .ok_or_else(|| CommandError::UnknownSystem(id.clone()))?;
        let copy_id = copy.id.clone();
        self.state.systems.insert(copy);
        self.state.current = Some(copy_id.clone());
        self.interaction.forget_missing(&self.state);

        self.notify(Notice::info("System duplicated"));
        let _ = self.save().await;
        Ok(copy_id)
    }

    /// Makes `id` the active system. An unknown id means the document and
    /// its view disagree, so the repair sweep runs.
    pub async fn select_system(&mut self, id: &SystemId) -> Result<(), CommandError> {
        if !self.state.systems.contains(id) {
            warn!("organizer: select of unknown system id={id}");
            self.notify(Notice::warning("System not found - repairing"));
            self.repair().await;
            return Err(CommandError::UnknownSystem(id.clone()));
        }
        self.state.current = Some(id.clone());
        self.interaction.release();
        self.interaction.forget_missing(&self.state);
        let _ = self.save().await;
        Ok(())
    }

    pub async fn reorder_systems(&mut self, order: &[SystemId]) {
        self.state.systems.reorder(order);
        let _ = self.save().await;
    }

    pub async fn auto_arrange(&mut self) -> Result<(), CommandError> {
        let system = self
            .state
            .current
            .as_ref()
            .and_then(|id| self.state.systems.get_mut(id))
            .ok_or(CommandError::NoActiveSystem)?;
        placement::arrange(system, &mut self.rng);

        self.notify(Notice::info("Auto-arranged"));
        let _ = self.save().await;
        Ok(())
    }

    pub async fn set_mode(&mut self, mode: Mode) {
        self.state.set_mode(mode);
        if mode == Mode::Link {
            self.interaction.release();
        }
        let _ = self.save().await;
    }

    pub async fn toggle_mode(&mut self) -> Mode {
        let mode = match self.state.mode() {
            Mode::Link => Mode::Edit,
            Mode::Edit => Mode::Link,
        };
        self.set_mode(mode).await;
        mode
    }

    pub async fn edit_planet(&mut self, id: &PlanetId, patch: PlanetPatch) -> Result<(), CommandError> {
        let planet = self
            .state
            .current_system_mut()
            .ok_or(CommandError::NoActiveSystem)?
            .planet_mut(id)
            .ok_or_else(|| CommandError::UnknownPlanet(id.clone()))?;
        patch.apply(planet);
        let _ = self.save().await;
        Ok(())
    }

    /// Starts or stops one planet's orbit. Returns whether it now rotates.
    pub async fn toggle_orbit(&mut self, id: &PlanetId) -> Result<bool, CommandError> {
        let planet = self
            .state
            .current_system_mut()
            .ok_or(CommandError::NoActiveSystem)?
            .planet_mut(id)
            .ok_or_else(|| CommandError::UnknownPlanet(id.clone()))?;
        planet.orbit.rotating = !planet.orbit.rotating;
        let rotating = planet.orbit.rotating;

        self.notify(Notice::info(if rotating {
            "Orbit started"
        } else {
            "Orbit stopped"
        }));
        let _ = self.save().await;
        Ok(rotating)
    }

    pub async fn edit_system(&mut self, id: &SystemId, patch: SystemPatch) -> Result<(), CommandError> {
        let system = self
            .state
            .systems
            .get_mut(id)
            .ok_or_else(|| CommandError::UnknownSystem(id.clone()))?;
        patch.apply(system);
        let _ = self.save().await;
        Ok(())
    }

    /// Applies global settings. Turning orbits off halts every planet of the
    /// active system.
    pub async fn edit_settings(&mut self, patch: SettingsPatch) {
        if patch.apply(&mut self.state.adv) {
            if let Some(system) = self.state.current_system_mut() {
                for planet in &mut system.planets {
                    planet.orbit.rotating = false;
                }
            }
        }
        let _ = self.save().await;
    }

    pub async fn reset_keybinds(&mut self) {
        self.state.adv.keybinds = Keybinds::default();
        self.notify(Notice::info("Keybinds reset"));
        let _ = self.save().await;
    }

    /// Runs undo or redo when the key press matches a configured shortcut.
    pub async fn handle_shortcut(
        &mut self,
        held: HeldModifiers,
        key: &str,
    ) -> Option<ShortcutAction> {
        let action = self.state.adv.keybinds.action_for(held, key)?;
        match action {
            ShortcutAction::Undo => self.undo().await,
            ShortcutAction::Redo => self.redo().await,
        };
        Some(action)
    }

    pub async fn undo(&mut self) -> bool {
        let current = match Snapshot::capture(&self.state) {
            Ok(current) => current,
            Err(err) => {
                warn!("organizer: cannot snapshot for undo: {err}");
                return false;
            }
        };
        let Some(previous) = self.history.step_back(current) else {
            self.notify(Notice::info("Nothing to undo"));
            return false;
        };
        if !self.restore(&previous).await {
            return false;
        }
        self.notify(Notice::info("Undone"));
        true
    }

    pub async fn redo(&mut self) -> bool {
        let Some(next) = self.history.step_forward() else {
            self.notify(Notice::info("Nothing to redo"));
            return false;
        };
        if !self.restore(&next).await {
            return false;
        }
        self.notify(Notice::info("Redone"));
        true
    }

    async fn restore(&mut self, raw: &str) -> bool {
        let snapshot = match Snapshot::parse(raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("organizer: discarding unreadable snapshot: {err}");
                return false;
            }
        };
        self.history.suppress();
        snapshot.apply_to(&mut self.state);
        self.interaction.forget_missing(&self.state);
        self.rebase_history();
        let _ = self.save().await;
        self.history.resume();
        true
    }

    /// Makes the live state the undo baseline so a failed write cannot leave
    /// the timeline pointing at a state the user has left.
    fn rebase_history(&mut self) {
        match Snapshot::capture(&self.state) {
            Ok(snapshot) => self.history.rebase(snapshot),
            Err(err) => warn!("organizer: snapshot failed: {err}"),
        }
    }

    /// Restores every structural invariant after outside edits. Returns
    /// whether anything needed fixing.
    pub async fn repair(&mut self) -> bool {
        let mut repaired = false;
        if self.state.needs_bootstrap() {
            bootstrap::seed_default_systems(&mut self.state, &mut self.rng);
            repaired = true;
        }
        repaired |= self.state.ensure_current();
        if self.state.edit_mode == self.state.link_mode {
            self.state.link_mode = !self.state.edit_mode;
            repaired = true;
        }
        for system in self.state.systems.iter_mut() {
            let mut seen = HashSet::new();
            for planet in &mut system.planets {
                if !seen.insert(planet.id.clone()) {
                    planet.id = PlanetId::generate();
                    seen.insert(planet.id.clone());
                    repaired = true;
                }
                if !planet.is_synchronized() {
                    planet.set_position(planet.x, planet.y);
                    repaired = true;
                }
            }
        }
        repaired |= self.interaction.forget_missing(&self.state);

        if repaired {
            info!("organizer: repaired document");
            self.notify(Notice::info("Systems repaired"));
        }
        let _ = self.save().await;
        repaired
    }

    pub fn export_blob(&self) -> Result<String, serde_json::Error> {
        persistence::export_document(&self.state)
    }

    /// Replaces the whole document with an exported one. On any error the
    /// current document is left untouched.
    pub async fn import_blob(&mut self, raw: &[u8]) -> Result<(), ImportError> {
        let imported = match read_import(raw) {
            Ok(imported) => imported,
            Err(err) => {
                warn!("organizer: import rejected: {err}");
                self.notify(Notice::error("Import failed - invalid file"));
                return Err(err);
            }
        };
        self.state = imported;
        self.interaction.release();
        self.interaction.clear_selection();
        info!("organizer: imported systems={}", self.state.systems.len());

        self.notify(Notice::info("Systems imported"));
        let _ = self.save().await;
        Ok(())
    }
}

fn read_import(raw: &[u8]) -> Result<AppState, ImportError> {
    let value = parse_document(raw)?;
    if value.get("systems").is_none() {
        return Err(ImportError::MissingSystems);
    }
    let state = migrate(&value);
    if state.systems.is_empty() {
        return Err(ImportError::NoUsableSystems);
    }
    Ok(state)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
