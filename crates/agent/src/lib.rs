pub mod analysis;
pub mod commands;
pub mod registry;
pub mod session_actor;
pub mod session_handle;
pub mod simulator;

pub use analysis::{run_cycle, CycleOutcome, ProviderSet};
pub use commands::{SessionCommand, SessionConfig, SessionStatus};
pub use registry::{Activation, Deactivation, SessionRegistry};
pub use session_actor::SessionActor;
pub use session_handle::SessionHandle;
pub use simulator::{PricePoint, PriceSimulator};
