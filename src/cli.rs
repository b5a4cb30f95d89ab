use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use time::UtcOffset;
use time::macros::format_description;

#[allow(clippy::large_enum_variant)]
pub(crate) enum RunOutcome {
    Serve(remind::config::AppConfig),
    Agent(remind::config::AgentConfig),
    Exit(i32),
}

pub(crate) fn run() -> RunOutcome {
    let cli = Cli::parse();
    match cli.command {
        Command::Init(args) => RunOutcome::Exit(run_init(args)),
        Command::Serve(args) => RunOutcome::Serve(remind::config::AppConfig {
            addr: args.addr,
            app_name: args.app_name,
            vapid_private_key: args.vapid_private_key,
            vapid_public_key: args.vapid_public_key,
            vapid_subject: args.vapid_subject,
        }),
        Command::Agent(args) => match agent_config(args) {
            Ok(config) => RunOutcome::Agent(config),
            Err(err) => {
                eprintln!("error: {err}");
                RunOutcome::Exit(2)
            }
        },
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "remind",
    version,
    about = "Deferred reminder notifications: reference server and headless worker"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the reference reminder server.
    Serve(ServeArgs),
    /// Generate VAPID credentials for push delivery.
    Init(InitArgs),
    /// Run a headless worker against a reminder server until Ctrl-C.
    Agent(AgentArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, env = "REMIND_ADDR", default_value = "127.0.0.1:3000")]
    addr: SocketAddr,
    #[arg(long, env = "REMIND_APP_NAME", default_value = "Remind")]
    app_name: String,
    #[arg(long, env = "REMIND_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, env = "REMIND_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, env = "REMIND_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct AgentArgs {
    #[arg(long, env = "REMIND_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    server_url: String,
    #[arg(long, env = "REMIND_STORE", default_value = "reminders.json")]
    store: PathBuf,
    /// Offset in which reminder dates and times are read, e.g. +02:00.
    #[arg(long, env = "REMIND_UTC_OFFSET", default_value = "+00:00")]
    utc_offset: String,
}

fn run_init(args: InitArgs) -> i32 {
    let credentials = match remind::push::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject {
        Some(subject) => (subject, false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!("{credentials}");
    println!("REMIND_VAPID_SUBJECT={subject}");
    if show_subject_note {
        println!();
        println!("Note: replace REMIND_VAPID_SUBJECT with a contact URI you control.");
    }
    0
}

fn agent_config(args: AgentArgs) -> Result<remind::config::AgentConfig, String> {
    let offset = parse_utc_offset(&args.utc_offset)?;
    let mut config = remind::config::AgentConfig::new(args.server_url, args.store);
    config.worker = config.worker.with_utc_offset(offset);
    Ok(config)
}

fn parse_utc_offset(raw: &str) -> Result<UtcOffset, String> {
    let value = raw.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        value,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| format!("invalid utc offset '{value}'; expected +HH:MM"))
}
