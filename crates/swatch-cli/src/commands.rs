use std::process::ExitCode;
use std::sync::MutexGuard;

use chrono::Utc;
use serde::Serialize;

use swatch_core::config::AppConfig;
use swatch_core::models::{AuditRecord, SnapshotKind};
use swatch_core::qa::QaReport;
use swatch_core::surface::{self, SurfaceAnalysis, SurfacePolicy};
use swatch_core::tokens::{SetOutcome, SharedTokenStore, TokenStore};
use swatch_runtime::{BootState, Console};

use crate::cli::{
    token_name, Commands, ExportFormat, QaCommands, SnapshotCommands, SurfaceCommands,
    TokenCommands,
};
use crate::error::CliError;
use crate::format;

#[derive(Serialize)]
struct JsonOut<T: Serialize> {
    ok: bool,
    data: T,
}

fn print_one<T: Serialize>(json: bool, data: T, row: impl Fn(&T) -> String) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&JsonOut { ok: true, data })?);
    } else {
        println!("{}", row(&data).trim_end());
    }
    Ok(())
}

fn print_out<T: Serialize>(json: bool, data: &[T], row: impl Fn(&T) -> String) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&JsonOut { ok: true, data })?);
    } else {
        for d in data {
            println!("{}", row(d));
        }
    }
    Ok(())
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

pub async fn run(command: Commands, json: bool, config: AppConfig) -> Result<ExitCode, CliError> {
    match command {
        // Surface checks read source files only; no console needed.
        Commands::Surface { command } => surface(command, json),
        Commands::Tokens { command } => tokens(&Console::open(config)?, command, json),
        Commands::Qa { command } => qa(&Console::open(config)?, command, json).await,
        Commands::Snapshot { command } => snapshot(&Console::open(config)?, command, json).await,
        Commands::Boot { wait_recheck } => boot(&Console::open(config)?, wait_recheck, json).await,
        Commands::Status => status(&Console::open(config)?, json),
    }
}

/// Stderr notice whenever no remote store backs snapshots and audits.
fn note_local_mode(console: &Console, json: bool) {
    if let Some(note) = format::local_mode_note(console.remote_name(), json) {
        eprintln!("{note}");
    }
}

fn lock(store: &SharedTokenStore) -> Result<MutexGuard<'_, TokenStore>, CliError> {
    store
        .lock()
        .map_err(|_| CliError::Usage("token store lock poisoned".into()))
}

// ── tokens ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct TokenOut<'a> {
    name: &'a str,
    value: &'a str,
}

fn tokens(console: &Console, command: TokenCommands, json: bool) -> Result<ExitCode, CliError> {
    let mut store = lock(console.tokens())?;
    match command {
        TokenCommands::List => {
            print_one(json, store.stored(), |map| format::tokens(map))?;
        }
        TokenCommands::Get { name } => {
            let name = token_name(&name);
            let value = store
                .get(&name)
                .ok_or_else(|| CliError::Usage(format!("unknown token `{name}`")))?;
            print_one(json, TokenOut { name: &name, value }, |t| t.value.to_string())?;
        }
        TokenCommands::Set { name, value } => {
            let name = token_name(&name);
            match store.set(&name, &value) {
                SetOutcome::Applied(map) => {
                    let value = map.get(&name).map(String::as_str).unwrap_or_default();
                    print_one(json, TokenOut { name: &name, value }, |t| {
                        format!("{} = {}", t.name, t.value)
                    })?;
                }
                SetOutcome::Rejected { reason, .. } => {
                    eprintln!("rejected {name}: {reason}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        TokenCommands::Reset => {
            let map = store.reset();
            print_one(json, &map, |map| format::tokens(map))?;
        }
        TokenCommands::Export { format } => match format {
            ExportFormat::Css => println!("{}", store.export_css()),
            ExportFormat::Json => println!("{}", store.export_json()?),
        },
    }
    Ok(ExitCode::SUCCESS)
}

// ── surface ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct ScanOut {
    health: surface::SurfaceHealth,
    components: Vec<SurfaceAnalysis>,
}

fn surface(command: SurfaceCommands, json: bool) -> Result<ExitCode, CliError> {
    let policy = SurfacePolicy::builtin()?;
    match command {
        SurfaceCommands::Check { component, file } => {
            let source = std::fs::read_to_string(&file)?;
            let analysis = policy.analyze(&component, &source);
            print_one(json, analysis, format::analysis)?;
        }
        SurfaceCommands::Scan { dir } => {
            let components = surface::scan_dir(&policy, &dir)?;
            let out = ScanOut {
                health: surface::health(&components),
                components,
            };
            print_one(json, out, |out| {
                let mut text = String::new();
                for a in out.components.iter().filter(|a| !a.is_clean()) {
                    text.push_str(&format::analysis(a));
                }
                text.push_str(&format::health(&out.health));
                text
            })?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ── qa ──────────────────────────────────────────────────────────

async fn qa(console: &Console, command: QaCommands, json: bool) -> Result<ExitCode, CliError> {
    match command {
        QaCommands::Run => {
            let report = console.qa().run().await;
            let pass = report.pass;
            print_one(json, report, format::qa_report)?;
            console.qa().settle_audits().await;
            note_local_mode(console, json);
            Ok(exit_code(pass))
        }
        QaCommands::History { limit } => {
            let audits = console.recent_audits(limit).await?;
            let now = Utc::now();
            print_out(json, &audits, |a: &AuditRecord| {
                let report = QaReport::new(a.summary.clone());
                format!(
                    "{}  {}  {}",
                    format::relative_time(&a.created_at, now),
                    a.app_version,
                    report.summary()
                )
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ── snapshot ────────────────────────────────────────────────────

#[derive(Serialize)]
struct PublishOut<'a> {
    kind: SnapshotKind,
    id: &'a str,
    published: bool,
}

async fn snapshot(
    console: &Console,
    command: SnapshotCommands,
    json: bool,
) -> Result<ExitCode, CliError> {
    let snapshots = console.snapshots();
    let now = Utc::now();
    match command {
        SnapshotCommands::Save { kind, label } => {
            let data = console.capture(kind)?;
            let snap = snapshots.save_snapshot(kind, data, label).await;
            print_one(json, snap, |s| format::snapshot(s, now))?;
        }
        SnapshotCommands::Publish { kind, id } => {
            let published = snapshots.publish_snapshot(kind, &id).await;
            print_one(json, PublishOut { kind, id: &id, published }, |p| {
                if p.published {
                    format!("published {} as {}", p.id, p.kind)
                } else {
                    format!("{} was not published", p.id)
                }
            })?;
            note_local_mode(console, json);
            return Ok(exit_code(published));
        }
        SnapshotCommands::Published { kind } => {
            let id = snapshots.get_published(kind).await;
            print_one(json, id, |id| id.clone().unwrap_or_else(|| "none".into()))?;
        }
        SnapshotCommands::Latest { kind } => {
            let snap = snapshots.latest_snapshot(kind).await;
            print_one(json, snap, |s| {
                s.as_ref()
                    .map(|s| format::snapshot(s, now))
                    .unwrap_or_else(|| "none".into())
            })?;
        }
        SnapshotCommands::List { kind, limit } => {
            let list = snapshots.list(kind, limit).await;
            print_out(json, &list, |s| format::snapshot(s, now))?;
        }
    }
    note_local_mode(console, json);
    Ok(ExitCode::SUCCESS)
}

// ── boot ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct BootOut {
    state: String,
    restored: Vec<SnapshotKind>,
    report: QaReport,
    recheck: Option<QaReport>,
}

async fn boot(console: &Console, wait_recheck: bool, json: bool) -> Result<ExitCode, CliError> {
    let mut boot = console.safety_boot()?;
    let outcome = boot.run().await;

    let recheck = match outcome.recheck {
        Some(handle) if wait_recheck => Some(handle.await?),
        _ => None,
    };
    let degraded = outcome.state == BootState::Degraded;

    let out = BootOut {
        state: outcome.state.to_string(),
        restored: outcome.restored,
        report: outcome.report,
        recheck,
    };
    print_one(json, out, |out| {
        let mut text = format::qa_report(&out.report);
        text.push_str(&format!("boot: {}", out.state));
        if !out.restored.is_empty() {
            let kinds: Vec<String> = out.restored.iter().map(|k| k.to_string()).collect();
            text.push_str(&format!(" (restored {})", kinds.join(", ")));
        }
        text.push('\n');
        if let Some(recheck) = &out.recheck {
            text.push_str("re-check:\n");
            text.push_str(&format::qa_report(recheck));
        }
        text
    })?;
    console.qa().settle_audits().await;
    note_local_mode(console, json);
    Ok(exit_code(!degraded))
}

// ── status ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusOut {
    version: &'static str,
    config: String,
    database: String,
    manifest: String,
    remote: Option<&'static str>,
    tokens: usize,
    components: usize,
    catalog: usize,
}

fn status(console: &Console, json: bool) -> Result<ExitCode, CliError> {
    let poisoned = |what: &str| CliError::Usage(format!("{what} lock poisoned"));
    let out = StatusOut {
        version: env!("CARGO_PKG_VERSION"),
        config: AppConfig::config_path().display().to_string(),
        database: AppConfig::db_path().display().to_string(),
        manifest: console.config().project.manifest.display().to_string(),
        remote: console.remote_name(),
        tokens: lock(console.tokens())?.stored().len(),
        components: console.registry().read().map_err(|_| poisoned("registry"))?.len(),
        catalog: console.catalog().read().map_err(|_| poisoned("catalog"))?.len(),
    };
    print_one(json, out, |s| {
        let remote = match s.remote {
            Some(name) => format!("{name} store"),
            None => format::LOCAL_MODE.into(),
        };
        format!(
            "swatch {}\nconfig:     {}\ndatabase:   {}\nmanifest:   {}\nremote:     {}\ntokens:     {}\ncomponents: {} ({} in catalog)",
            s.version, s.config, s.database, s.manifest, remote, s.tokens, s.components, s.catalog
        )
    })?;
    Ok(ExitCode::SUCCESS)
}
