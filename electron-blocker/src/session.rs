use log::{debug, info};
use thiserror::Error;

use crate::{dispatcher::Dispatcher, events::EventKind};

/// Reasons why the event subsystem refused to create a session
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewSessionError {
    #[error("More than 50 Endpoint Security clients are connected!")]
    TooManyClients,
    #[error("Executable is missing com.apple.developer.endpoint-security.client entitlement!")]
    NotEntitled,
    #[error("Parent is missing Full Disk Access permission!")]
    NotPermitted,
    #[error("Parent is not running as root!")]
    NotPrivileged,
    #[error("Internal Endpoint Security error!")]
    Internal,
    #[error("Incorrect arguments to create Endpoint Security client!")]
    InvalidArgument,
    #[error("An unknown error occurred while creating a new Endpoint Security client!")]
    Unknown,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    NewSession(#[from] NewSessionError),
    #[error("Failed to subscribe to {0} event!")]
    Subscribe(EventKind),
}

/// Privileged event subsystem delivering exec authorization events
pub trait Subsystem: Sized {
    /// Creates a new session whose events are handed to `dispatcher`.
    /// No event must be delivered before this returns.
    fn connect(dispatcher: Dispatcher) -> Result<Self, NewSessionError>;

    fn subscribe(&mut self, events: &[EventKind]) -> Result<(), Error>;

    /// Releases the session, no event is delivered once this returns
    fn release(&mut self);
}

/// Events the monitor subscribes to
pub const SUBSCRIPTIONS: [EventKind; 1] = [EventKind::AuthExec];

/// Live session with the event subsystem. The session gets released on
/// [Session::stop] or when dropped, whatever comes first.
#[derive(Debug)]
pub struct Session<S: Subsystem> {
    inner: Option<S>,
}

impl<S: Subsystem> Session<S> {
    pub fn start(dispatcher: Dispatcher) -> Result<Self, Error> {
        let mut inner = S::connect(dispatcher)?;
        debug!("event subsystem session created");

        if let Err(e) = inner.subscribe(&SUBSCRIPTIONS) {
            inner.release();
            return Err(e);
        }

        info!(
            "subscribed to {}",
            SUBSCRIPTIONS
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );

        Ok(Self { inner: Some(inner) })
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.inner.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.release();
            info!("event subsystem session released");
        }
    }
}

impl<S: Subsystem> Drop for Session<S> {
    fn drop(&mut self) {
        self.stop()
    }
}
