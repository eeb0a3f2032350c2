//! Session flow: login handshake and chat exchange on top of the connection
//! and correlator.

pub mod flow;
pub mod login;
pub mod render;

pub use flow::SessionFlow;
pub use login::{Credentials, LoginState, SessionContext};
pub use render::{DisplayLine, LineKind};
