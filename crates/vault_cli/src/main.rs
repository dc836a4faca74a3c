//! Vault CLI: notes, lists, passwords and reminders from a terminal.
//!
//! # Responsibility
//! - Parse commands and map them onto `vault_core` use-cases.
//! - Load `vault.toml` (or `--config`) and initialize file logging.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::error;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vault_core::model::timestamp::parse_timestamp;
use vault_core::service::password_service::PasswordDraft;
use vault_core::sync::MemoryCloud;
use vault_core::{ExportOptions, ShareFormat, Vault, VaultConfig};

#[derive(Parser)]
#[command(name = "vault")]
#[command(version)]
#[command(about = "Personal vault for notes, shopping lists, passwords and reminders")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Directory holding the vault database and logs
        #[arg(short, long, default_value = ".vault")]
        data_dir: PathBuf,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    #[command(flatten)]
    Vault(VaultCommand),
}

/// Commands that run against an opened vault.
#[derive(Subcommand)]
enum VaultCommand {
    /// Work with notes
    #[command(subcommand)]
    Note(NoteCommand),

    /// Work with shopping lists
    #[command(subcommand)]
    List(ListCommand),

    /// Work with stored passwords
    #[command(subcommand)]
    Password(PasswordCommand),

    /// Work with reminders
    #[command(subcommand)]
    Reminder(ReminderCommand),

    /// Import a share string or full export from a file (`-` for stdin)
    Import { input: PathBuf },

    /// Export the vault
    Export {
        /// Plain text instead of JSON
        #[arg(long)]
        text: bool,

        /// Include stored passwords in the JSON export
        #[arg(long, conflicts_with = "text")]
        passwords: bool,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage the PIN lock
    #[command(subcommand)]
    Pin(PinCommand),

    /// Inspect or change cloud sync
    #[command(subcommand)]
    Sync(SyncCommand),
}

#[derive(Subcommand)]
enum NoteCommand {
    Add {
        title: String,
        #[arg(default_value = "")]
        content: String,
    },
    List,
    Search { query: String },
    Pin { id: String },
    Delete { id: String },
    /// Print a share string for one note
    Share {
        id: String,
        /// Versioned envelope instead of the `NOTE:` framing
        #[arg(long)]
        envelope: bool,
    },
}

#[derive(Subcommand)]
enum ListCommand {
    Add { title: String },
    Show,
    Item { list_id: String, text: String },
    Toggle { list_id: String, item_id: String },
    /// Remove every checked item
    Clear { list_id: String },
    Delete { list_id: String },
    Share {
        list_id: String,
        #[arg(long)]
        envelope: bool,
    },
}

#[derive(Subcommand)]
enum PasswordCommand {
    Add {
        title: String,
        password: String,
        #[arg(short, long)]
        username: Option<String>,
        #[arg(long)]
        url: Option<String>,
    },
    /// List titles and usernames; secrets are not printed
    List {
        #[arg(short, long)]
        query: Option<String>,
    },
    Show { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum ReminderCommand {
    Add {
        title: String,
        /// RFC 3339 due time, e.g. 2024-03-01T09:00:00Z
        due_at: String,
        #[arg(long)]
        record_id: Option<String>,
    },
    /// Open reminders due now
    Due,
    Done { id: String },
}

#[derive(Subcommand)]
enum PinCommand {
    Set { pin: String },
    Verify { pin: String },
    Clear { pin: String },
    Status,
}

#[derive(Subcommand)]
enum SyncCommand {
    /// Show registered providers and the remembered selection
    Status,
    /// Mirror notes and lists through a provider and remember it
    Attach { provider_id: String },
    /// Stop syncing and forget the provider; local data stays
    Detach,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init { data_dir, force } => {
            init_config(cli.config.as_deref(), &data_dir, force)
        }
        Commands::Vault(command) => {
            let config =
                VaultConfig::load(cli.config.as_deref()).context("failed to load config")?;
            vault_core::init_from_config(&config).context("failed to initialize logging")?;
            let vault = Vault::from_config(&config).context("failed to open vault")?;
            let result = run(&vault, command);
            if let Err(err) = &result {
                error!("event=cli_command module=cli status=error error={err}");
            }
            result
        }
    }
}

fn run(vault: &Vault, command: VaultCommand) -> Result<()> {
    match command {
        VaultCommand::Note(command) => run_note(vault, command),
        VaultCommand::List(command) => run_list(vault, command),
        VaultCommand::Password(command) => run_password(vault, command),
        VaultCommand::Reminder(command) => run_reminder(vault, command),
        VaultCommand::Import { input } => {
            let text = read_input(&input)?;
            let summary = vault.import(&text)?;
            println!(
                "imported notes={} lists={} reminders={} passwords={}",
                summary.notes, summary.lists, summary.reminders, summary.passwords
            );
            Ok(())
        }
        VaultCommand::Export {
            text,
            passwords,
            output,
        } => {
            let rendered = if text {
                vault.export_text()
            } else {
                vault.export_json(ExportOptions {
                    include_passwords: passwords,
                })?
            };
            match output {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{rendered}"),
            }
            Ok(())
        }
        VaultCommand::Pin(command) => run_pin(vault, command),
        VaultCommand::Sync(command) => run_sync(vault, command),
    }
}

fn init_config(path: Option<&Path>, data_dir: &Path, force: bool) -> Result<()> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(vault_core::config::DEFAULT_CONFIG_FILE));
    let config = VaultConfig {
        data_dir: data_dir.to_path_buf(),
        ..VaultConfig::default()
    };
    config.write(&path, force)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn run_note(vault: &Vault, command: NoteCommand) -> Result<()> {
    let notes = vault.notes();
    match command {
        NoteCommand::Add { title, content } => {
            let note = notes.create_note(title, content)?;
            println!("{}", note.id);
        }
        NoteCommand::List => {
            for note in notes.list_notes() {
                let pin = if note.pinned { "*" } else { " " };
                println!("{pin} {}  {}", note.id, note.title);
            }
        }
        NoteCommand::Search { query } => {
            for note in notes.search_notes(&query) {
                println!("{}  {}", note.id, note.title);
            }
        }
        NoteCommand::Pin { id } => {
            let note = notes.toggle_pin(&id)?;
            println!("pinned={}", note.pinned);
        }
        NoteCommand::Delete { id } => {
            notes.delete_note(&id)?;
        }
        NoteCommand::Share { id, envelope } => {
            println!("{}", notes.share_note(&id, share_format(envelope))?);
        }
    }
    Ok(())
}

fn run_list(vault: &Vault, command: ListCommand) -> Result<()> {
    let lists = vault.lists();
    match command {
        ListCommand::Add { title } => println!("{}", lists.create_list(&title)?.id),
        ListCommand::Show => {
            for list in lists.list_lists() {
                let (checked, total) = list.progress();
                println!("{}  {} ({checked}/{total})", list.id, list.title);
                for item in &list.items {
                    let mark = if item.checked { 'x' } else { ' ' };
                    println!("    [{mark}] {}  {}", item.id, item.text);
                }
            }
        }
        ListCommand::Item { list_id, text } => {
            println!("{}", lists.add_item(&list_id, &text)?.id)
        }
        ListCommand::Toggle { list_id, item_id } => {
            lists.toggle_item(&list_id, &item_id)?;
        }
        ListCommand::Clear { list_id } => {
            println!("removed={}", lists.clear_checked(&list_id)?);
        }
        ListCommand::Delete { list_id } => {
            lists.delete_list(&list_id)?;
        }
        ListCommand::Share { list_id, envelope } => {
            println!("{}", lists.share_list(&list_id, share_format(envelope))?);
        }
    }
    Ok(())
}

fn run_password(vault: &Vault, command: PasswordCommand) -> Result<()> {
    let passwords = vault.passwords();
    match command {
        PasswordCommand::Add {
            title,
            password,
            username,
            url,
        } => {
            let entry = passwords.add_password(PasswordDraft {
                title,
                password,
                username,
                url,
                notes: None,
            })?;
            println!("{}", entry.id);
        }
        PasswordCommand::List { query } => {
            let entries = match query {
                Some(query) => passwords.search_passwords(&query),
                None => passwords.list_passwords(),
            };
            for entry in entries {
                println!(
                    "{}  {}  {}",
                    entry.id,
                    entry.title,
                    entry.username.as_deref().unwrap_or("-")
                );
            }
        }
        PasswordCommand::Show { id } => match passwords.get_password(&id) {
            Some(entry) => println!("{}", entry.password),
            None => bail!("password not found: {id}"),
        },
        PasswordCommand::Delete { id } => {
            passwords.delete_password(&id)?;
        }
    }
    Ok(())
}

fn run_reminder(vault: &Vault, command: ReminderCommand) -> Result<()> {
    let reminders = vault.reminders();
    match command {
        ReminderCommand::Add {
            title,
            due_at,
            record_id,
        } => {
            let due_at = parse_timestamp(&due_at)?;
            println!("{}", reminders.schedule(&title, due_at, record_id)?.id);
        }
        ReminderCommand::Due => {
            for reminder in reminders.due(Utc::now()) {
                println!("{}  {}  {}", reminder.id, reminder.due_at, reminder.title);
            }
        }
        ReminderCommand::Done { id } => {
            reminders.complete(&id)?;
        }
    }
    Ok(())
}

fn run_pin(vault: &Vault, command: PinCommand) -> Result<()> {
    let lock = vault.lock();
    match command {
        PinCommand::Set { pin } => lock.set_pin(&pin)?,
        PinCommand::Verify { pin } => {
            lock.verify(&pin)?;
            println!("unlocked");
        }
        PinCommand::Clear { pin } => lock.clear(&pin)?,
        PinCommand::Status => println!(
            "pin={} biometric={}",
            lock.is_enabled(),
            lock.biometric_enabled()
        ),
    }
    Ok(())
}

fn run_sync(vault: &Vault, command: SyncCommand) -> Result<()> {
    vault.register_provider(Arc::new(MemoryCloud::new("memory")))?;
    match command {
        SyncCommand::Status => println!(
            "provider={} registered={}",
            vault.sync_provider()?.as_deref().unwrap_or("none"),
            vault.provider_ids().join(",")
        ),
        SyncCommand::Attach { provider_id } => {
            let sync = vault.attach_sync(&provider_id)?;
            println!(
                "attached provider={} pending={}",
                sync.provider_id(),
                sync.pending_count()
            );
        }
        SyncCommand::Detach => match vault.resume_sync()? {
            Some(sync) => {
                vault.detach_sync(sync)?;
                println!("detached");
            }
            None => bail!("sync is not attached"),
        },
    }
    Ok(())
}

fn share_format(envelope: bool) -> ShareFormat {
    if envelope {
        ShareFormat::Envelope
    } else {
        ShareFormat::Legacy
    }
}

fn read_input(input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
}
