use anyhow::anyhow;
use clap::builder::styling;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use env_logger::Builder;
use electron_blocker::config::{Config, Report};
use electron_blocker::dispatcher::Dispatcher;
use electron_blocker::electron::Filesystem;
use electron_blocker::events::{Decision, ExecEvent};
use electron_blocker::session::NewSessionError;
use electron_blocker::util::is_root;
use log::{debug, LevelFilter};
use serde::Serialize;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

const ABOUT: &str = r#"
Electron blocker denies the launch of Electron applications started with a
remote debugging switch (--inspect=, --inspect-brk=, --inspect-wait=, inspect)
or with ELECTRON_RUN_AS_NODE enabled."#;

enum Input {
    Stdin(io::Stdin),
    File(File),
}

impl Input {
    fn from_file(f: File) -> Self {
        Self::File(f)
    }

    fn from_stdin() -> Self {
        Self::Stdin(io::stdin())
    }
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stdin(s) => s.read(buf),
            Self::File(f) => f.read(buf),
        }
    }
}

#[derive(Parser)]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    /// Enable debugging
    #[arg(short, long)]
    debug: bool,

    /// Silents out debug, info, error logging. Detections are still printed.
    #[arg(short, long)]
    silent: bool,

    /// Set verbosity level, repeat option for more verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Specify a command (if any)
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Specify a configuration file to use. Command line options supersede the ones specified in the configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Report detections as json lines. Supersedes configuration file.
    #[arg(long)]
    json: bool,
}

impl TryFrom<ConfigArgs> for Config {
    type Error = anyhow::Error;
    fn try_from(opt: ConfigArgs) -> Result<Self, Self::Error> {
        let mut conf = Self::default();

        if let Some(conf_file) = opt.config {
            conf = Config::from_file(conf_file)?;
        }

        // supersedes configuration if true
        if opt.json {
            conf = conf.report(Report::Json);
        }

        Ok(conf)
    }
}

#[derive(Debug, Parser)]
struct RunOpt {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Parser)]
struct ReplayOpt {
    #[command(flatten)]
    config: ConfigArgs,

    /// Files containing exec events (json line), use - to read stdin.
    #[arg(required = true)]
    log_files: Vec<String>,
}

#[derive(Debug, Args)]
struct ConfigOpt {
    /// Dump a default configuration on the terminal
    #[arg(long, exclusive = true)]
    dump: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the blocker (default)
    Run(RunOpt),
    /// Replay exec events into the decision pipeline (useful to test detections)
    Replay(ReplayOpt),
    /// Dump a default configuration
    Config(ConfigOpt),
}

#[derive(Serialize)]
struct Replayed<'e> {
    event: &'e ExecEvent,
    decision: Decision,
}

impl Command {
    /// Decides on every exec event read from `reader` and writes one json
    /// line per event to `out`. Blank lines are skipped.
    fn replay_reader<F, R, W>(
        dispatcher: &Dispatcher<F>,
        name: &str,
        reader: R,
        out: &mut W,
    ) -> anyhow::Result<()>
    where
        F: Filesystem,
        R: BufRead,
        W: Write,
    {
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| anyhow!("failed to read {name}: {e}"))?;
            if line.trim().is_empty() {
                continue;
            }

            let event: ExecEvent = serde_json::from_str(&line)
                .map_err(|e| anyhow!("{name}:{}: invalid exec event: {e}", i + 1))?;

            let decision = dispatcher.decide(&event);
            writeln!(
                out,
                "{}",
                serde_json::to_string(&Replayed {
                    event: &event,
                    decision
                })?
            )?;
        }

        Ok(())
    }

    fn replay(o: ReplayOpt) -> anyhow::Result<()> {
        let conf: Config = o.config.try_into()?;
        let dispatcher = Dispatcher::new(conf.report);
        let mut out = io::stdout().lock();

        for f in o.log_files {
            let reader = if f == "-" {
                BufReader::new(Input::from_stdin())
            } else {
                BufReader::new(Input::from_file(
                    File::open(&f).map_err(|e| anyhow!("failed to open {f}: {e}"))?,
                ))
            };

            Self::replay_reader(&dispatcher, &f, reader, &mut out)?;
        }

        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn inner_run(conf: Config) -> anyhow::Result<()> {
        use electron_blocker::es::EndpointSecurity;
        use electron_blocker::session::Session;
        use log::info;
        use tokio::signal::unix::{signal, SignalKind};

        let mut session = Session::<EndpointSecurity>::start(Dispatcher::new(conf.report))?;
        info!("electron blocker started");

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?
            .block_on(async {
                let mut term = signal(SignalKind::terminate())?;
                info!("Waiting for Ctrl-C...");
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
                Ok::<_, io::Error>(())
            })?;

        session.stop();
        info!("electron blocker stopped");
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    fn inner_run(_conf: Config) -> anyhow::Result<()> {
        Err(anyhow!(
            "Endpoint Security is not available on this platform, only replay is supported"
        ))
    }

    fn run(opt: Option<RunOpt>) -> anyhow::Result<()> {
        // checking that we are running as root
        if !is_root() {
            return Err(NewSessionError::NotPrivileged.into());
        }

        let conf = match opt {
            Some(o) => o.config.try_into()?,
            None => Config::default(),
        };
        debug!("running with configuration: {conf:?}");

        Self::inner_run(conf)
    }

    fn config(co: ConfigOpt) -> anyhow::Result<()> {
        if co.dump {
            println!("{}", serde_yaml::to_string(&Config::default())?);
        }

        Ok(())
    }
}

fn main() -> Result<(), anyhow::Error> {
    let c = {
        let c: clap::Command = Cli::command();
        let styles = styling::Styles::styled()
            .header(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
            .usage(styling::AnsiColor::Green.on_default() | styling::Effects::BOLD)
            .literal(styling::AnsiColor::Blue.on_default() | styling::Effects::BOLD)
            .placeholder(styling::AnsiColor::Cyan.on_default());

        c.styles(styles).help_template(
            r#"{about-with-newline}
{author-with-newline}
{usage-heading} {usage}

{all-args}"#,
        )
    };

    let cli: Cli = Cli::from_arg_matches(&c.get_matches())?;

    // setting log level according to the verbosity level
    let mut log_level = LevelFilter::Warn;
    match cli.verbose {
        1 => log_level = LevelFilter::Info,
        2 => log_level = LevelFilter::Debug,
        3..=u8::MAX => log_level = LevelFilter::Trace,
        _ => {}
    }

    // silent out logging if specified in CLI
    if cli.silent {
        log_level = LevelFilter::Off;
    }

    // handling debugging flag
    if cli.debug {
        log_level = LevelFilter::Debug;
    }

    // building the logger
    Builder::new().filter_level(log_level).init();

    match cli.command {
        Some(Command::Run(o)) => Command::run(Some(o)),
        Some(Command::Replay(o)) => Command::replay(o),
        Some(Command::Config(o)) => Command::config(o),
        None => Command::run(None),
    }
}
