use serde::Serialize;

/// Node/V8 switches opening a debugging endpoint on an explicit address
pub const INSPECT_SWITCHES: [&str; 3] = ["--inspect=", "--inspect-brk=", "--inspect-wait="];

/// Node debugger subcommand
pub const INSPECT_COMMAND: &str = "inspect";

/// Environment variable turning an Electron binary into a plain Node runtime
pub const RUN_AS_NODE: &str = "ELECTRON_RUN_AS_NODE";

/// Arguments and environment of a single launch
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    pub arguments: &'a [String],
    pub environment: &'a [String],
}

impl<'a> ClassificationInput<'a> {
    pub fn new(arguments: &'a [String], environment: &'a [String]) -> Self {
        Self {
            arguments,
            environment,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub arguments: bool,
    pub environment: bool,
}

impl Classification {
    #[inline(always)]
    pub fn is_malicious(&self) -> bool {
        self.arguments || self.environment
    }
}

pub fn classify(input: ClassificationInput<'_>) -> Classification {
    Classification {
        arguments: has_malicious_arguments(input.arguments),
        environment: has_malicious_environment(input.environment),
    }
}

#[inline]
fn inspect_position<S: AsRef<str>>(args: &[S]) -> Option<usize> {
    args.iter().position(|a| a.as_ref() == INSPECT_COMMAND)
}

/// `inspect --port=<port>`
fn inspect_with_port<S: AsRef<str>>(args: &[S]) -> bool {
    inspect_position(args)
        .and_then(|i| args.get(i + 1))
        .is_some_and(|next| next.as_ref().starts_with("--port="))
}

/// `inspect` followed by anything, this covers [inspect_with_port]
fn inspect_with_operand<S: AsRef<str>>(args: &[S]) -> bool {
    inspect_position(args).is_some_and(|i| i + 1 < args.len())
}

pub fn has_malicious_arguments<S: AsRef<str>>(args: &[S]) -> bool {
    if args
        .iter()
        .any(|a| INSPECT_SWITCHES.iter().any(|p| a.as_ref().starts_with(*p)))
    {
        return true;
    }

    inspect_with_port(args) || inspect_with_operand(args)
}

pub fn has_malicious_environment<S: AsRef<str>>(env: &[S]) -> bool {
    env.iter()
        .filter_map(|e| e.as_ref().split_once('='))
        .filter(|(name, _)| name.starts_with(RUN_AS_NODE))
        // substring match on purpose, "21" or "untrue" match as well
        .any(|(_, value)| value.contains('1') || value.contains("true"))
}
