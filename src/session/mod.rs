//! Setup sessions
//!
//! A session is a lobby being configured in one channel. It starts with the
//! `setup <game>` command and ends when the game starts, the host cancels,
//! everyone leaves or nobody issues a command before the inactivity timeout.

pub mod actor;
pub mod command;
pub mod manager;
pub mod registry;
pub mod state;

// Re-export commonly used types
pub use actor::{ConfirmationAnswer, SessionActor, SessionContext, SessionHandle};
pub use command::SetupCommand;
pub use manager::{SessionManager, SessionManagerStats};
pub use registry::{GameRegistry, RegistryEntry};
pub use state::{PreviousGame, Session, SessionSnapshot};
