//! Command-line client for the reservation tracker.
//!
//! # Responsibility
//! - Run one execution context over a shared SQLite storage file.
//! - Gate reservation commands on an authenticated session.
//!
//! Every invocation is a fresh context, so state written by one process is
//! visible to the next, and `watch` follows writes made by other processes.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info};
use reservation_core::{
    default_log_level, init_logging, ProfileUpdate, RecordChannel, ReservationStore,
    SessionStore, SqliteMedium, StoreKeys,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "reservation", version, about = "Reserve time slots on calendar dates")]
struct Cli {
    /// Storage file shared by every context.
    #[arg(long, env = "RESERVATION_DB", default_value = "reservations.sqlite3")]
    db: PathBuf,

    /// trace|debug|info|warn|error
    #[arg(long, env = "RESERVATION_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "RESERVATION_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with any non-empty email and password
    Login { email: String, password: String },
    /// Create an identity with a display name
    Signup {
        email: String,
        password: String,
        name: String,
    },
    /// Sign out and forget the stored identity
    Logout,
    /// Show the signed-in identity
    Whoami,
    /// Edit profile fields of the signed-in identity
    Profile(ProfileArgs),
    /// Replace the reserved slots of a date (no slots clears it)
    Set { date: String, slots: Vec<String> },
    /// Reserve additional slots on a date
    Add {
        date: String,
        #[arg(required = true)]
        slots: Vec<String>,
    },
    /// Release one slot on a date
    Remove { date: String, slot: String },
    /// Print reserved slots
    List {
        #[arg(long)]
        date: Option<String>,
    },
    /// Follow reservation changes made by other processes
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many polls; runs until interrupted when unset.
        #[arg(long)]
        iterations: Option<u64>,
    },
    /// Print core health-check output
    Ping,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Signup { .. } => "signup",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Profile(_) => "profile",
            Self::Set { .. } => "set",
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::List { .. } => "list",
            Self::Watch { .. } => "watch",
            Self::Ping => "ping",
        }
    }
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    timezone: Option<String>,
}

impl From<ProfileArgs> for ProfileUpdate {
    fn from(args: ProfileArgs) -> Self {
        Self {
            email: args.email,
            name: args.name,
            phone: args.phone,
            timezone: args.timezone,
        }
    }
}

struct Tab {
    medium: Arc<SqliteMedium>,
    session: SessionStore,
    reservations: ReservationStore,
}

impl Tab {
    fn open(db: &Path) -> Result<Self> {
        let medium = Arc::new(
            SqliteMedium::open(db)
                .with_context(|| format!("failed to open storage at {}", db.display()))?,
        );
        let channel = RecordChannel::new(medium.clone());
        let keys = StoreKeys::default();
        Ok(Self {
            session: SessionStore::with_config(channel.clone(), keys.session_config()),
            reservations: ReservationStore::with_config(channel, keys.reservation_config()),
            medium,
        })
    }

    fn require_session(&self) -> Result<()> {
        if !self.session.is_authenticated() {
            bail!("not signed in; run `reservation login <email> <password>` first");
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    // Health check must not create the storage file.
    if let Command::Ping = cli.command {
        print_ping();
        return Ok(());
    }

    let name = cli.command.name();
    info!("event=cli_command module=cli status=start command={name}");
    let tab = Tab::open(&cli.db)?;
    match run(&tab, cli.command) {
        Ok(()) => {
            info!("event=cli_command module=cli status=ok command={name}");
            Ok(())
        }
        Err(err) => {
            error!("event=cli_command module=cli status=error command={name} error={err}");
            Err(err)
        }
    }
}

fn run(tab: &Tab, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = tab.session.login(&email, &password)?;
            println!("signed in as {} <{}>", user.name, user.email);
        }
        Command::Signup {
            email,
            password,
            name,
        } => {
            let user = tab.session.signup(&email, &password, &name)?;
            println!("created {} <{}>", user.name, user.email);
        }
        Command::Logout => {
            tab.session.logout();
            println!("signed out");
        }
        Command::Whoami => match tab.session.current_user() {
            Some(user) => {
                println!("id:       {}", user.id);
                println!("email:    {}", user.email);
                println!("name:     {}", user.name);
                println!("phone:    {}", user.phone.as_deref().unwrap_or("-"));
                println!("timezone: {}", user.timezone.as_deref().unwrap_or("-"));
            }
            None => println!("not signed in"),
        },
        Command::Profile(args) => {
            tab.require_session()?;
            let update = ProfileUpdate::from(args);
            if update.is_empty() {
                bail!("nothing to update; pass --email, --name, --phone or --timezone");
            }
            if let Some(user) = tab.session.update_profile(update) {
                println!("updated {} <{}>", user.name, user.email);
            }
        }
        Command::Set { date, slots } => {
            tab.require_session()?;
            tab.reservations.set_slots(&date, slots);
            print_date(tab, &date);
        }
        Command::Add { date, slots } => {
            tab.require_session()?;
            tab.reservations.add_slots(&date, slots);
            print_date(tab, &date);
        }
        Command::Remove { date, slot } => {
            tab.require_session()?;
            tab.reservations.remove_slot(&date, &slot);
            print_date(tab, &date);
        }
        Command::List { date } => {
            tab.require_session()?;
            match date {
                Some(date) => print_date(tab, &date),
                None => print_calendar(tab),
            }
        }
        Command::Watch {
            interval_ms,
            iterations,
        } => {
            tab.require_session()?;
            watch(tab, Duration::from_millis(interval_ms), iterations)?;
        }
        Command::Ping => print_ping(),
    }
    Ok(())
}

fn print_ping() {
    println!("reservation_core ping={}", reservation_core::ping());
    println!("reservation_core version={}", reservation_core::core_version());
}

fn watch(tab: &Tab, interval: Duration, iterations: Option<u64>) -> Result<()> {
    print_calendar(tab);
    let mut polls = 0;
    loop {
        if iterations.is_some_and(|limit| polls >= limit) {
            return Ok(());
        }
        thread::sleep(interval);
        polls += 1;

        let before = tab.reservations.revision();
        let events = tab
            .medium
            .poll_external_changes()
            .context("failed to poll storage for changes")?;
        let changed = tab.reservations.revision() != before;
        debug!("event=cli_watch_poll module=cli status=ok poll={polls} events={events} changed={changed}");
        if changed {
            println!("--");
            print_calendar(tab);
        }
    }
}

fn print_date(tab: &Tab, date: &str) {
    let slots = tab.reservations.get_for_date(date);
    if slots.is_empty() {
        println!("{date}: -");
    } else {
        println!("{date}: {}", slots.join(", "));
    }
}

fn print_calendar(tab: &Tab) {
    let entries = tab.reservations.list();
    if entries.is_empty() {
        println!("no reservations");
        return;
    }
    for entry in entries {
        println!("{}: {}", entry.date, entry.slots.join(", "));
    }
}
