//! CLI entry point for mailward.

use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailward::client::remote::RemoteClient;
use mailward::client::MailClient;
use mailward::compose::{self, DraftMode, DraftRequest};
use mailward::config::{self, Config};
use mailward::error::WardError;
use mailward::executor::{self, ActionOutcome, ActionRequest, TriageOp};
use mailward::filter::{FilterSpec, RawFilters};
use mailward::model::email::{EmailDetail, EmailSummary};
use mailward::model::mailbox::Mailbox;

#[derive(Parser)]
#[command(name = "mailward", version)]
#[command(about = "Safe, read-oriented CLI for JMAP email")]
#[command(long_about = "mailward reads, searches, and triages email over JMAP.\n\
Sending and permanently deleting email are structurally disallowed.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.config/mailward/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// Output format: json or text
    #[arg(long, global = true)]
    format: Option<String>,

    /// JMAP bearer token
    #[arg(long, global = true, env = "MAILWARD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JMAP session endpoint
    #[arg(long, global = true, value_name = "URL")]
    session_url: Option<String>,

    /// JMAP account id (auto-detected if blank)
    #[arg(long, global = true, value_name = "ID")]
    account_id: Option<String>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Filter flags shared by every command that selects messages.
#[derive(Args, Debug, Default)]
struct BaseFilterArgs {
    /// Restrict to a specific mailbox
    #[arg(short, long)]
    mailbox: Option<String>,

    /// Filter by sender address/name
    #[arg(long)]
    from: Option<String>,

    /// Filter by subject text
    #[arg(long)]
    subject: Option<String>,

    /// Emails received before this date (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    before: Option<String>,

    /// Emails received after this date (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    after: Option<String>,

    /// Only emails with attachments
    #[arg(long)]
    has_attachment: bool,

    /// Only unread messages
    #[arg(short, long)]
    unread: bool,

    /// Only flagged messages
    #[arg(short, long)]
    flagged: bool,

    /// Only unflagged messages
    #[arg(long)]
    unflagged: bool,
}

impl BaseFilterArgs {
    fn raw(&self, to: Option<String>) -> RawFilters {
        RawFilters {
            mailbox: self.mailbox.clone(),
            from: self.from.clone(),
            to,
            subject: self.subject.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            has_attachment: self.has_attachment,
            unread: self.unread,
            flagged: self.flagged,
            unflagged: self.unflagged,
        }
    }
}

/// Filter flags including the recipient filter.
///
/// `move` keeps `--to` for its destination, so it flattens
/// [`BaseFilterArgs`] instead.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[command(flatten)]
    base: BaseFilterArgs,

    /// Filter by recipient address/name
    #[arg(long)]
    to: Option<String>,
}

impl FilterArgs {
    fn raw(&self) -> RawFilters {
        self.base.raw(self.to.clone())
    }
}

/// Positional ids plus filter flags for a triage command.
#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// Email ids to act on (or use filter flags instead)
    #[arg(value_name = "ID")]
    ids: Vec<String>,

    #[command(flatten)]
    filter: FilterArgs,

    /// Preview the action without mutating anything
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List mailboxes in the account
    Mailboxes,
    /// List messages matching filters (defaults to the inbox)
    #[command(visible_alias = "search")]
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Maximum number of messages to show
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one message in full
    Show {
        id: String,
        /// Print the HTML body instead of plain text
        #[arg(long)]
        html: bool,
        /// Include raw headers
        #[arg(long = "raw-headers")]
        headers: bool,
    },
    /// Move messages to the archive
    Archive {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Move messages to the junk mailbox
    Spam {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Move messages to a named mailbox
    Move {
        /// Destination mailbox name or role
        #[arg(long, value_name = "MAILBOX")]
        to: String,
        /// Email ids to act on (or use filter flags instead)
        #[arg(value_name = "ID")]
        ids: Vec<String>,
        #[command(flatten)]
        filter: BaseFilterArgs,
        /// Preview the action without mutating anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Mark messages as read
    Read {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Mark messages as unread
    Unread {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Flag messages
    Flag {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Unflag messages
    Unflag {
        #[command(flatten)]
        targets: TargetArgs,
    },
    /// Compose a draft in the Drafts mailbox (never sent)
    Draft {
        #[command(subcommand)]
        mode: DraftCommands,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args, Debug)]
struct DraftArgs {
    /// Recipients (comma-separated)
    #[arg(long)]
    to: Option<String>,

    /// Cc recipients (comma-separated)
    #[arg(long)]
    cc: Option<String>,

    /// Bcc recipients (comma-separated)
    #[arg(long)]
    bcc: Option<String>,

    /// Subject (overrides Re:/Fwd: prefixing)
    #[arg(long)]
    subject: Option<String>,

    /// Body text
    #[arg(long)]
    body: Option<String>,

    /// Read the body from stdin instead of --body
    #[arg(long)]
    body_stdin: bool,

    /// Treat the body as HTML
    #[arg(long)]
    html: bool,
}

#[derive(Subcommand, Debug)]
enum DraftCommands {
    /// A fresh draft
    New {
        #[command(flatten)]
        args: DraftArgs,
    },
    /// Reply to the sender of a message
    Reply {
        id: String,
        #[command(flatten)]
        args: DraftArgs,
    },
    /// Reply to everyone on a message
    ReplyAll {
        id: String,
        #[command(flatten)]
        args: DraftArgs,
    },
    /// Forward a message
    Forward {
        id: String,
        #[command(flatten)]
        args: DraftArgs,
    },
}

#[derive(Clone, Copy, PartialEq)]
enum Format {
    Json,
    Text,
}

fn main() {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        // Config loading reads this env var; the flag just sets it.
        std::env::set_var("MAILWARD_CONFIG", path);
    }
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    let format = match cli
        .format
        .as_deref()
        .unwrap_or(config.output.format.as_str())
    {
        "text" => Format::Text,
        _ => Format::Json,
    };

    if let Err(e) = run(cli, &config, format) {
        match format {
            Format::Json => {
                let code = e
                    .downcast_ref::<WardError>()
                    .map(WardError::code)
                    .unwrap_or("general_error");
                eprintln!(
                    "{}",
                    serde_json::json!({ "error": code, "message": e.to_string() })
                );
            }
            Format::Text => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: &Config, format: Format) -> anyhow::Result<()> {
    match cli.command {
        Commands::Completions { shell } => return cmd_completions(shell),
        Commands::Manpage => return cmd_manpage(),
        _ => {}
    }

    let client = connect(&cli, config)?;
    let batch_size = config.network.batch_size;
    let self_email = config.account.email.clone().unwrap_or_default();

    match cli.command {
        Commands::Mailboxes => cmd_mailboxes(&client, format),
        Commands::List { filter, limit } => {
            cmd_list(&client, &filter.raw(), limit, batch_size, format)
        }
        Commands::Show { id, html, headers } => cmd_show(&client, &id, html, headers, format),
        Commands::Archive { targets } => {
            cmd_triage(&client, TriageOp::Archive, targets, batch_size, format)
        }
        Commands::Spam { targets } => {
            cmd_triage(&client, TriageOp::Spam, targets, batch_size, format)
        }
        Commands::Move {
            to,
            ids,
            filter,
            dry_run,
        } => {
            let targets = TargetArgs {
                ids,
                filter: FilterArgs {
                    base: filter,
                    to: None,
                },
                dry_run,
            };
            cmd_triage(
                &client,
                TriageOp::Move { destination: to },
                targets,
                batch_size,
                format,
            )
        }
        Commands::Read { targets } => {
            cmd_triage(&client, TriageOp::MarkRead, targets, batch_size, format)
        }
        Commands::Unread { targets } => {
            cmd_triage(&client, TriageOp::MarkUnread, targets, batch_size, format)
        }
        Commands::Flag { targets } => {
            cmd_triage(&client, TriageOp::Flag, targets, batch_size, format)
        }
        Commands::Unflag { targets } => {
            cmd_triage(&client, TriageOp::Unflag, targets, batch_size, format)
        }
        Commands::Draft { mode } => cmd_draft(&client, mode, &self_email, format),
        Commands::Completions { .. } | Commands::Manpage => unreachable!("handled above"),
    }
}

/// Connect to the JMAP server using flag > env > config precedence.
fn connect(cli: &Cli, config: &Config) -> anyhow::Result<RemoteClient> {
    let token = cli
        .token
        .clone()
        .or_else(|| config::token(config))
        .ok_or_else(|| {
            anyhow::anyhow!("no token configured; set MAILWARD_TOKEN, --token, or [account] token")
        })?;
    let session_url = cli
        .session_url
        .as_deref()
        .unwrap_or(config.account.session_url.as_str());
    let account_id = cli
        .account_id
        .as_deref()
        .or(config.account.account_id.as_deref());

    Ok(RemoteClient::connect(
        session_url,
        &token,
        account_id,
        Duration::from_secs(config.network.timeout_secs),
    )?)
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailward.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailward", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

fn cmd_mailboxes(client: &dyn MailClient, format: Format) -> anyhow::Result<()> {
    let mut mailboxes = client.list_mailboxes()?;
    mailboxes.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&mailboxes)?),
        Format::Text => print_mailboxes_table(&mailboxes),
    }
    Ok(())
}

fn cmd_list(
    client: &dyn MailClient,
    raw: &RawFilters,
    limit: usize,
    batch_size: usize,
    format: Format,
) -> anyhow::Result<()> {
    let mut spec = FilterSpec::from_raw(raw)?;
    if spec.is_empty() {
        spec.mailbox = Some("inbox".to_string());
    }
    let spec = spec.resolve(client)?;

    let mut ids = client.query_ids(&spec)?;
    ids.truncate(limit);

    let mut summaries: Vec<EmailSummary> = Vec::with_capacity(ids.len());
    for batch in ids.chunks(batch_size.max(1)) {
        summaries.extend(client.fetch_summaries(batch)?.found);
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        Format::Text => print_summaries_table(&summaries),
    }
    Ok(())
}

fn cmd_show(
    client: &dyn MailClient,
    id: &str,
    html: bool,
    headers: bool,
    format: Format,
) -> anyhow::Result<()> {
    let detail = client.fetch_detail(id)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&detail)?),
        Format::Text => print_detail(&detail, html, headers),
    }
    Ok(())
}

fn cmd_triage(
    client: &dyn MailClient,
    op: TriageOp,
    targets: TargetArgs,
    batch_size: usize,
    format: Format,
) -> anyhow::Result<()> {
    let request = ActionRequest {
        op,
        ids: targets.ids,
        filter: FilterSpec::from_raw(&targets.filter.raw())?,
        dry_run: targets.dry_run,
    };

    let pb = if format == Format::Text {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Applying [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let progress = pb.as_ref().map(|pb| {
        move |done: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }
    });
    let outcome = executor::execute(
        client,
        &request,
        batch_size,
        progress
            .as_ref()
            .map(|f| f as &dyn Fn(usize, usize)),
    )?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        Format::Text => print_outcome_table(&outcome),
    }
    Ok(())
}

fn cmd_draft(
    client: &dyn MailClient,
    mode: DraftCommands,
    self_email: &str,
    format: Format,
) -> anyhow::Result<()> {
    let (draft_mode, source_id, args) = match mode {
        DraftCommands::New { args } => (DraftMode::New, None, args),
        DraftCommands::Reply { id, args } => (DraftMode::Reply, Some(id), args),
        DraftCommands::ReplyAll { id, args } => (DraftMode::ReplyAll, Some(id), args),
        DraftCommands::Forward { id, args } => (DraftMode::Forward, Some(id), args),
    };

    let mut stdin = std::io::stdin();
    let request = DraftRequest::new(
        draft_mode,
        source_id,
        args.to.as_deref(),
        args.cc.as_deref(),
        args.bcc.as_deref(),
        args.subject,
        args.body,
        if args.body_stdin {
            Some(&mut stdin)
        } else {
            None
        },
        args.html,
    )?;

    let original = match &request.source_id {
        Some(id) => Some(client.fetch_detail(id)?),
        None => None,
    };

    let composed = compose::compose(&request, original.as_ref(), self_email)?;
    let draft_id = executor::create_draft(client, &composed)?;

    match format {
        Format::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "id": draft_id,
                    "draft": composed,
                }))?
            );
        }
        Format::Text => {
            println!();
            println!("  Draft created: {draft_id}");
            println!("  {:<10} {}", "To", join_addresses(&composed.to));
            if !composed.cc.is_empty() {
                println!("  {:<10} {}", "Cc", join_addresses(&composed.cc));
            }
            println!("  {:<10} {}", "Subject", composed.subject);
            println!();
        }
    }
    Ok(())
}

// ── Text rendering ──────────────────────────────────────────────

fn join_addresses(addresses: &[mailward::model::address::Address]) -> String {
    addresses
        .iter()
        .map(|a| a.display())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_mailboxes_table(mailboxes: &[Mailbox]) {
    println!();
    println!(
        "  {:<22} {:<10} {:>8} {:>8}  {}",
        "Name", "Role", "Total", "Unread", "Id"
    );
    println!("  {}", "-".repeat(70));
    for mb in mailboxes {
        println!(
            "  {:<22} {:<10} {:>8} {:>8}  {}",
            truncate(&mb.name, 21),
            mb.role.as_ref().map(|r| r.as_str()).unwrap_or(""),
            mb.total_emails,
            mb.unread_emails,
            mb.id
        );
    }
    println!();
}

fn print_summaries_table(summaries: &[EmailSummary]) {
    println!();
    println!("  {} message(s)", summaries.len());
    println!();
    if summaries.is_empty() {
        return;
    }

    println!(
        "  {:<2} {:<17} {:<25} {:<40} {}",
        "", "Date", "From", "Subject", "Id"
    );
    println!("  {}", "-".repeat(100));
    for s in summaries {
        let marks = format!(
            "{}{}",
            if s.is_unread { "*" } else { " " },
            if s.is_flagged { "!" } else { " " }
        );
        let from = s
            .from
            .first()
            .map(|a| a.name.clone().unwrap_or_else(|| a.email.clone()))
            .unwrap_or_default();
        println!(
            "  {:<2} {:<17} {:<25} {:<40} {}",
            marks,
            s.received_at.format("%Y-%m-%d %H:%M"),
            truncate(&from, 24),
            truncate(&s.subject, 39),
            s.id
        );
    }
    println!();
}

fn print_detail(detail: &EmailDetail, html: bool, headers: bool) {
    let s = &detail.summary;
    println!();
    println!("  {:<10} {}", "From", join_addresses(&s.from));
    println!("  {:<10} {}", "To", join_addresses(&s.to));
    if !detail.cc.is_empty() {
        println!("  {:<10} {}", "Cc", join_addresses(&detail.cc));
    }
    println!("  {:<10} {}", "Date", s.received_at.to_rfc3339());
    println!("  {:<10} {}", "Subject", s.subject);
    if !detail.attachments.is_empty() {
        let names: Vec<String> = detail
            .attachments
            .iter()
            .map(|a| {
                format!(
                    "{} ({}, {} bytes)",
                    a.name.as_deref().unwrap_or("unnamed"),
                    a.mime_type,
                    a.size
                )
            })
            .collect();
        println!("  {:<10} {}", "Attached", names.join("; "));
    }

    if headers {
        println!();
        for (name, value) in &detail.raw_headers {
            println!("  {name}: {value}");
        }
    }

    println!();
    let body = if html {
        detail.html_body.as_deref()
    } else {
        detail.text_body.as_deref()
    };
    match body {
        Some(text) => println!("{text}"),
        None => println!("  (no {} body)", if html { "HTML" } else { "text" }),
    }
}

fn print_outcome_table(outcome: &ActionOutcome) {
    println!();
    let verb = if outcome.dry_run {
        "Would affect"
    } else {
        "Applied to"
    };
    println!(
        "  {} ({}): {} {} message(s)",
        outcome.operation,
        if outcome.dry_run { "dry run" } else { "done" },
        verb,
        outcome.succeeded.len()
    );
    if let Some(dest) = &outcome.destination {
        println!("  {:<12} {} ({})", "Destination", dest.name, dest.id);
    }
    if !outcome.not_found.is_empty() {
        println!("  {:<12} {}", "Not found", outcome.not_found.join(", "));
    }
    for (id, message) in &outcome.errored {
        println!("  {:<12} {id}: {message}", "Error");
    }
    if outcome.dry_run && !outcome.previews.is_empty() {
        print_summaries_table(&outcome.previews);
    } else {
        println!();
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
