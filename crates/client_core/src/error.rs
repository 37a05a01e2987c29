use shared::domain::{PlanetId, SystemId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("at least one system must remain")]
    LastSystem,
    #[error("system {0} does not exist")]
    UnknownSystem(SystemId),
    #[error("planet {0} does not exist in the active system")]
    UnknownPlanet(PlanetId),
    #[error("no active system")]
    NoActiveSystem,
}
