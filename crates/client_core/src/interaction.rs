use shared::domain::{AppState, PlanetId, SystemId, Viewport};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Sun(SystemId),
    Planet(PlanetId),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Active {
        planet: PlanetId,
        /// Pointer position relative to the element's top-left corner.
        offset: (f64, f64),
    },
}

/// What the pointer went down on, as hit-tested by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    Sun,
    Planet(PlanetId),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PressOutcome {
    OpenLink(Url),
    Selected(Selection),
    DragStarted(PlanetId),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Idle,
    Moved,
    /// The layout is locked; `first` is set once per drag.
    Locked { first: bool },
}

#[derive(Debug, Default)]
pub struct InteractionController {
    selection: Selection,
    drag: DragState,
    lock_reported: bool,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn drag(&self) -> &DragState {
        &self.drag
    }

    pub fn dragged_planet(&self) -> Option<&PlanetId> {
        match &self.drag {
            DragState::Active { planet, .. } => Some(planet),
            DragState::Idle => None,
        }
    }

    pub fn press(
        &mut self,
        state: &AppState,
        viewport: &Viewport,
        target: PointerTarget,
        pointer: (f64, f64),
    ) -> PressOutcome {
        let Some(system) = state.current_system() else {
            return PressOutcome::Ignored;
        };
        let planet_id = match target {
            PointerTarget::Empty => return PressOutcome::Ignored,
            PointerTarget::Sun => {
                self.selection = Selection::Sun(system.id.clone());
                return PressOutcome::Selected(self.selection.clone());
            }
            PointerTarget::Planet(id) => id,
        };
        let Some(planet) = system.planet(&planet_id) else {
            debug!("interaction: press on unknown planet={planet_id}");
            return PressOutcome::Ignored;
        };

        if state.link_mode {
            if let Some(url) = planet.link() {
                return PressOutcome::OpenLink(url);
            }
            self.selection = Selection::Planet(planet_id);
            return PressOutcome::Selected(self.selection.clone());
        }

        let size = viewport.planet_size_px(planet.size_percent);
        let (cx, cy) = viewport.center();
        let left = cx + planet.x - size / 2.0;
        let top = cy + planet.y - size / 2.0;
        self.selection = Selection::Planet(planet_id.clone());
        self.drag = DragState::Active {
            planet: planet_id.clone(),
            offset: (pointer.0 - left, pointer.1 - top),
        };
        self.lock_reported = false;
        PressOutcome::DragStarted(planet_id)
    }

    /// Follows the pointer with the dragged planet, keeping the element
    /// inside the canvas.
    pub fn drag_to(
        &mut self,
        state: &mut AppState,
        viewport: &Viewport,
        pointer: (f64, f64),
    ) -> MoveOutcome {
        let DragState::Active { planet, offset } = &self.drag else {
            return MoveOutcome::Idle;
        };
        if !state.edit_mode {
            return MoveOutcome::Idle;
        }
        if state.adv.lock_layout {
            let first = !self.lock_reported;
            self.lock_reported = true;
            return MoveOutcome::Locked { first };
        }

        let offset = *offset;
        let Some(target) = state
            .current_system_mut()
            .and_then(|system| system.planet_mut(planet))
        else {
            self.drag = DragState::Idle;
            return MoveOutcome::Idle;
        };

        let size = viewport.planet_size_px(target.size_percent);
        let (cx, cy) = viewport.center();
        let left = (pointer.0 - offset.0).clamp(0.0, (viewport.width - size).max(0.0));
        let top = (pointer.1 - offset.1).clamp(0.0, (viewport.height - size).max(0.0));
        target.set_position(left + size / 2.0 - cx, top + size / 2.0 - cy);
        MoveOutcome::Moved
    }

    /// Ends any drag. Returns whether one was in progress.
    pub fn release(&mut self) -> bool {
        let was_active = matches!(self.drag, DragState::Active { .. });
        self.drag = DragState::Idle;
        was_active
    }

    pub fn clear_selection(&mut self) {
        self.selection = Selection::None;
    }

    /// Drops selection and drag when they point at entities that are no
    /// longer in the active system. Returns whether anything was dropped.
    pub fn forget_missing(&mut self, state: &AppState) -> bool {
        let system = state.current_system();
        let planet_exists =
            |id: &PlanetId| system.is_some_and(|system| system.planet(id).is_some());

        let mut changed = false;
        let selection_valid = match &self.selection {
            Selection::None => true,
            Selection::Sun(id) => state.current.as_ref() == Some(id),
            Selection::Planet(id) => planet_exists(id),
        };
        if !selection_valid {
            self.selection = Selection::None;
            changed = true;
        }
        if let DragState::Active { planet, .. } = &self.drag {
            if !planet_exists(planet) {
                self.drag = DragState::Idle;
                changed = true;
            }
        }
        changed
    }
}
