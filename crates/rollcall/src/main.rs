// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rollcall - ledger-backed QR attendance.
//!
//! This is the binary entry point: the HTTP service, the reconciliation
//! worker, and one-shot administrative commands.

mod app;
mod commands;
mod doctor;
mod serve;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rollcall_config::RollcallConfig;
use rollcall_core::RecordState;

use crate::commands::RecordsArgs;

/// Rollcall - ledger-backed QR attendance.
#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the standard search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP gateway and the reconciliation loop.
    Serve,
    /// Reconcile the local cache with the ledger.
    Reconcile {
        /// Keep running passes on the configured interval.
        #[arg(long)]
        watch: bool,
    },
    /// Manage attendance sessions.
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
    /// Submit a scanned token for a student.
    Mark { token: String, student_id: String },
    /// List cached attendance records.
    Records {
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        student: Option<String>,
        /// provisional, confirmed, or rejected.
        #[arg(long)]
        state: Option<RecordState>,
        #[arg(long)]
        limit: Option<i64>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Register a student's ledger address.
    RegisterStudent { student_id: String, address: String },
    /// Show the pinned evidence for one attendance record.
    Evidence { session: String, student_id: String },
    /// Check the cache, the ledger node, and the pending backlog.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    /// Issue a session and print its QR token.
    Create {
        class_id: String,
        /// Session length in seconds.
        #[arg(long)]
        duration: Option<i64>,
        /// Skip the terminal QR code.
        #[arg(long)]
        no_qr: bool,
    },
    /// Show one session and whether it is still valid.
    Show { code: String },
    /// List sessions, newest first.
    List {
        #[arg(long)]
        class: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Option<RollcallConfig> {
    let loaded = match path {
        Some(path) => rollcall_config::load_and_validate_path(path),
        None => rollcall_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => Some(config),
        Err(errors) => {
            rollcall_config::render_errors(&errors);
            None
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "rollcall={log_level},rollcall_engine={log_level},rollcall_ledger={log_level},\
             rollcall_storage={log_level},rollcall_gateway={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(config) = load_config(cli.config.as_ref()) else {
        return ExitCode::from(78);
    };
    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await.map(|()| ExitCode::SUCCESS),
        Commands::Reconcile { watch } => serve::run_reconcile(config, watch)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Session { action } => match action {
            SessionCommand::Create {
                class_id,
                duration,
                no_qr,
            } => commands::session_create(config, &class_id, duration, !no_qr).await,
            SessionCommand::Show { code } => commands::session_show(config, &code).await,
            SessionCommand::List { class } => commands::session_list(config, class.as_deref()).await,
        },
        Commands::Mark { token, student_id } => commands::mark(config, &token, &student_id).await,
        Commands::Records {
            session,
            class,
            student,
            state,
            limit,
            json,
        } => {
            commands::records(
                config,
                RecordsArgs {
                    session_code: session,
                    class_id: class,
                    student_id: student,
                    state,
                    limit,
                    json,
                },
            )
            .await
        }
        Commands::RegisterStudent {
            student_id,
            address,
        } => commands::register_student(config, &student_id, &address).await,
        Commands::Evidence {
            session,
            student_id,
        } => commands::evidence(config, &session, &student_id).await,
        Commands::Doctor { plain } => doctor::run_doctor(&config, plain)
            .await
            .map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("rollcall: {e}");
            if e.is_retryable() {
                ExitCode::from(75)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
