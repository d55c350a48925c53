//! Apple Endpoint Security implementation of the event subsystem

use std::os::unix::ffi::OsStrExt;

use endpoint_sec::sys::{es_auth_result_t, es_event_type_t, NewClientError};
use endpoint_sec::{Client, Event, Message};
use log::debug;

use crate::{
    dispatcher::{Dispatcher, Responder},
    events::{AuthResult, EventKind, ExecView, Verdict},
    extract,
    session::{Error, NewSessionError, Subsystem},
};

impl From<NewClientError> for NewSessionError {
    fn from(value: NewClientError) -> Self {
        #[allow(unreachable_patterns)]
        match value {
            NewClientError::TooManyClients => Self::TooManyClients,
            NewClientError::NotEntitled => Self::NotEntitled,
            NewClientError::NotPermitted => Self::NotPermitted,
            NewClientError::NotPrivileged => Self::NotPrivileged,
            NewClientError::Internal => Self::Internal,
            NewClientError::InvalidArgument => Self::InvalidArgument,
            _ => Self::Unknown,
        }
    }
}

/// Borrowed view over an Endpoint Security message, valid for the
/// duration of the handler only.
struct EsExec<'m>(&'m Message);

impl ExecView for EsExec<'_> {
    fn kind(&self) -> EventKind {
        let ty = self.0.event_type();
        if ty == es_event_type_t::ES_EVENT_TYPE_AUTH_EXEC {
            return EventKind::AuthExec;
        }
        EventKind::Other(format!("{ty:?}"))
    }

    fn executable(&self) -> String {
        String::from_utf8_lossy(self.0.process().executable().path().as_bytes()).into_owned()
    }

    fn arguments(&self) -> Vec<String> {
        match self.0.event() {
            Some(Event::AuthExec(exec)) => extract::tokens(exec.args()),
            _ => vec![],
        }
    }

    fn environment(&self) -> Vec<String> {
        match self.0.event() {
            Some(Event::AuthExec(exec)) => extract::tokens(exec.envs()),
            _ => vec![],
        }
    }
}

struct EsResponder<'c, 'b>(&'c mut Client<'b>);

impl Responder for EsResponder<'_, '_> {
    type Message = Message;
    type Error = String;

    fn respond(&mut self, message: &Message, verdict: Verdict) -> Result<(), String> {
        let result = match verdict.result {
            AuthResult::Allow => es_auth_result_t::ES_AUTH_RESULT_ALLOW,
            AuthResult::Deny => es_auth_result_t::ES_AUTH_RESULT_DENY,
        };

        self.0
            .respond_auth_result(message, result, verdict.cache)
            .map_err(|e| format!("{e:?}"))
    }
}

/// Endpoint Security client. Dropping the client deletes it.
pub struct EndpointSecurity {
    client: Option<Client<'static>>,
}

impl Subsystem for EndpointSecurity {
    fn connect(dispatcher: Dispatcher) -> Result<Self, NewSessionError> {
        let client = Client::new(move |client, message| {
            dispatcher.dispatch(&mut EsResponder(client), &message, &EsExec(&message));
        })?;

        Ok(Self {
            client: Some(client),
        })
    }

    fn subscribe(&mut self, events: &[EventKind]) -> Result<(), Error> {
        let mut types = Vec::with_capacity(events.len());
        for e in events {
            match e {
                EventKind::AuthExec => types.push(es_event_type_t::ES_EVENT_TYPE_AUTH_EXEC),
                EventKind::Other(_) => return Err(Error::Subscribe(e.clone())),
            }
        }

        let Some(client) = self.client.as_mut() else {
            return Err(Error::Subscribe(EventKind::AuthExec));
        };

        client.subscribe(&types).map_err(|err| {
            debug!("es_subscribe failed: {err:?}");
            Error::Subscribe(events.first().cloned().unwrap_or_default())
        })
    }

    fn release(&mut self) {
        // es_delete_client is called when the client is dropped
        drop(self.client.take())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_client_error() {
        for (err, expected) in [
            (NewClientError::TooManyClients, NewSessionError::TooManyClients),
            (NewClientError::NotEntitled, NewSessionError::NotEntitled),
            (NewClientError::NotPermitted, NewSessionError::NotPermitted),
            (NewClientError::NotPrivileged, NewSessionError::NotPrivileged),
            (NewClientError::Internal, NewSessionError::Internal),
            (NewClientError::InvalidArgument, NewSessionError::InvalidArgument),
        ] {
            assert_eq!(NewSessionError::from(err), expected);
        }

        assert_eq!(
            Error::from(NewSessionError::from(NewClientError::TooManyClients)).to_string(),
            "More than 50 Endpoint Security clients are connected!"
        );
    }
}
