use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::classifier::Classification;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[default]
    AuthExec,
    Other(String),
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthExec => write!(f, "AUTH_EXEC"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Read access to an exec event as delivered by the event subsystem.
///
/// Arguments and environment are only extracted when asked for, so an
/// implementation backed by a native event does not pay for conversions
/// the pipeline never reaches.
pub trait ExecView {
    fn kind(&self) -> EventKind;
    fn executable(&self) -> String;
    fn arguments(&self) -> Vec<String>;
    fn environment(&self) -> Vec<String>;
}

/// Owned copy of an exec event
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEvent {
    #[serde(default)]
    pub kind: EventKind,
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub environment: Vec<String>,
}

impl ExecEvent {
    pub fn new<S: Into<String>>(executable: S) -> Self {
        Self {
            executable: executable.into(),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: EventKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_environment<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environment = env.into_iter().map(Into::into).collect();
        self
    }
}

impl ExecView for ExecEvent {
    fn kind(&self) -> EventKind {
        self.kind.clone()
    }

    fn executable(&self) -> String {
        self.executable.clone()
    }

    fn arguments(&self) -> Vec<String> {
        self.arguments.clone()
    }

    fn environment(&self) -> Vec<String> {
        self.environment.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthResult {
    Allow,
    Deny,
}

impl Display for AuthResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "ALLOW"),
            Self::Deny => write!(f, "DENY"),
        }
    }
}

/// Answer sent back to the event subsystem. `cache` tells the subsystem
/// it may reuse the answer for identical executions of the same binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub result: AuthResult,
    pub cache: bool,
}

impl Verdict {
    pub const fn allow() -> Self {
        Self {
            result: AuthResult::Allow,
            cache: true,
        }
    }

    pub const fn deny() -> Self {
        Self {
            result: AuthResult::Deny,
            cache: true,
        }
    }

    #[inline(always)]
    pub fn is_deny(&self) -> bool {
        self.result == AuthResult::Deny
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    NotExec,
    NoArguments,
    NotElectron,
    Benign,
    Malicious { arguments: bool, environment: bool },
}

impl From<Classification> for Reason {
    fn from(value: Classification) -> Self {
        if value.is_malicious() {
            Self::Malicious {
                arguments: value.arguments,
                environment: value.environment,
            }
        } else {
            Self::Benign
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: Reason,
}

impl Decision {
    pub const fn allow(reason: Reason) -> Self {
        Self {
            verdict: Verdict::allow(),
            reason,
        }
    }

    pub const fn deny(reason: Reason) -> Self {
        Self {
            verdict: Verdict::deny(),
            reason,
        }
    }
}

#[inline(always)]
fn serialize_utc_ts<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Record emitted when a launch gets denied
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    #[serde(serialize_with = "serialize_utc_ts")]
    pub utc_time: DateTime<Utc>,
    pub executable: String,
    pub arguments: Vec<String>,
    pub environment: Vec<String>,
    pub malicious_arguments: bool,
    pub malicious_environment: bool,
}

impl Detection {
    pub fn new(
        executable: String,
        arguments: Vec<String>,
        environment: Vec<String>,
        classification: Classification,
    ) -> Self {
        Self {
            utc_time: Utc::now(),
            executable,
            arguments,
            environment,
            malicious_arguments: classification.arguments,
            malicious_environment: classification.environment,
        }
    }

    /// Multi-line operator readable rendering
    pub fn to_text(&self) -> String {
        format!(
            "Malicious Electron application detected!\n  Executable Path: {}\n  Arguments: {:?}\n  Environment Variables: {:?}\nRejecting authorization...",
            self.executable, self.arguments, self.environment
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exec_event_deserialize_defaults() {
        let e: ExecEvent = serde_json::from_str(r#"{"executable":"/bin/ls"}"#).unwrap();
        assert_eq!(e.kind, EventKind::AuthExec);
        assert!(e.arguments.is_empty());
        assert!(e.environment.is_empty());

        let e: ExecEvent =
            serde_json::from_str(r#"{"kind":{"other":"NOTIFY_OPEN"},"executable":"/bin/ls"}"#)
                .unwrap();
        assert_eq!(e.kind, EventKind::Other("NOTIFY_OPEN".into()));
    }

    #[test]
    fn test_reason_from_classification() {
        let c = Classification {
            arguments: false,
            environment: true,
        };
        assert_eq!(
            Reason::from(c),
            Reason::Malicious {
                arguments: false,
                environment: true
            }
        );
        assert_eq!(Reason::from(Classification::default()), Reason::Benign);
    }

    #[test]
    fn test_detection_serialize() {
        let d = Detection::new(
            "/Apps/Foo.app/Contents/MacOS/Foo".into(),
            vec!["Foo".into(), "--inspect=9229".into()],
            vec![],
            Classification {
                arguments: true,
                environment: false,
            },
        );

        let v: serde_json::Value = serde_json::from_str(&serde_json::to_string(&d).unwrap()).unwrap();
        assert_eq!(v["executable"], "/Apps/Foo.app/Contents/MacOS/Foo");
        assert_eq!(v["malicious_arguments"], true);
        assert!(v["utc_time"].as_str().unwrap().ends_with('Z'));

        let text = d.to_text();
        assert!(text.contains("Executable Path: /Apps/Foo.app/Contents/MacOS/Foo"));
        assert!(text.ends_with("Rejecting authorization..."));
    }
}
