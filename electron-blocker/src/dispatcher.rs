use std::fmt::Display;
use std::io::{self, Write};

use log::{debug, error};

use crate::{
    classifier::{classify, ClassificationInput},
    config::Report,
    electron::{is_electron_app, Filesystem, HostFs},
    events::{Decision, Detection, EventKind, ExecView, Reason, Verdict},
};

/// Sends verdicts back to the event subsystem
pub trait Responder {
    type Message;
    type Error: Display;

    fn respond(&mut self, message: &Self::Message, verdict: Verdict) -> Result<(), Self::Error>;
}

/// Authorization callback logic. A dispatcher never changes after being
/// built so it can serve concurrent callbacks.
#[derive(Debug, Default, Clone)]
pub struct Dispatcher<F: Filesystem = HostFs> {
    fs: F,
    report: Report,
}

impl Dispatcher<HostFs> {
    pub fn new(report: Report) -> Self {
        Self::with_fs(HostFs, report)
    }
}

impl<F: Filesystem> Dispatcher<F> {
    pub fn with_fs(fs: F, report: Report) -> Self {
        Self { fs, report }
    }

    /// Takes the authorization decision for a single event. Apart from
    /// logging a detection this has no side effect.
    pub fn decide<V: ExecView>(&self, event: &V) -> Decision {
        if event.kind() != EventKind::AuthExec {
            return Decision::allow(Reason::NotExec);
        }

        let arguments = event.arguments();
        // nothing we can attribute to a launcher
        let Some(exe) = arguments.first() else {
            return Decision::allow(Reason::NoArguments);
        };

        if !is_electron_app(&self.fs, exe) {
            return Decision::allow(Reason::NotElectron);
        }

        let environment = event.environment();
        let classification = classify(ClassificationInput::new(&arguments, &environment));

        if !classification.is_malicious() {
            debug!("allowing electron application: {exe}");
            return Decision::allow(Reason::Benign);
        }

        self.report(&Detection::new(
            event.executable(),
            arguments,
            environment,
            classification,
        ));

        Decision::deny(classification.into())
    }

    /// Decides on `event` and sends the verdict for `message`. Exactly one
    /// response is attempted, a failure is only logged.
    pub fn dispatch<R, V>(&self, responder: &mut R, message: &R::Message, event: &V) -> Decision
    where
        R: Responder,
        V: ExecView,
    {
        let decision = self.decide(event);

        if let Err(e) = responder.respond(message, decision.verdict) {
            error!(
                "failed to respond {} to {} event: {e}",
                decision.verdict.result,
                event.kind()
            );
        }

        decision
    }

    /// Detections go to stdout whatever the log level is
    fn report(&self, detection: &Detection) {
        let record = render(detection, self.report);
        if let Err(e) = writeln!(io::stdout().lock(), "{record}") {
            error!("failed to write detection: {e}");
        }
    }
}

/// Renders a detection record in the configured format
pub fn render(detection: &Detection, report: Report) -> String {
    match report {
        Report::Text => detection.to_text(),
        Report::Json => match serde_json::to_string(detection) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to serialize detection: {e}");
                detection.to_text()
            }
        },
    }
}
