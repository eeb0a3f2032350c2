//! Events delivered to UI collaborators.

use crate::session::render::DisplayLine;
use crate::transport::ConnectionState;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    StateChanged(ConnectionState),
    LoginSuccess(String),
    LoginFailure(String),
    MessageDisplay(DisplayLine),
    ErrorOccurred(String),
}
