use std::path::Path;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::app::{self, MigrationError};
use crate::auth;
use crate::checkin::GeoPoint;
use crate::core;
use crate::store::{NewTenant, PlanType, SessionError};

const MIGRATIONS_DIR: &str = "migrations";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Migration creation failed")]
    MigrationCreateFailed { #[source] source: MigrationError },

    // NoMigrationsApplied is reported as status output, not as an error
    #[error("Checking migration status failed")]
    MigrationStatusCheckFailed { #[source] source: MigrationError },

    #[error("Running migrations failed")]
    MigrationRunFailed { #[source] source: MigrationError },

    #[error("Reading the password failed")]
    PasswordPromptFailed { #[source] source: std::io::Error },

    #[error("Password hashing failed: {0}")]
    PasswordHashingFailed(argon2::password_hash::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database operation failed")]
    DatabaseOperationFailed { #[from] source: core::DbError },

    #[error("Revoking sessions failed")]
    SessionRevocationFailed { #[from] source: SessionError },
}

#[derive(Debug, Parser)]
#[command(name = "geoattend")]
#[command(about = "Geo-verified attendance API server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Database migration utilities
    #[command(subcommand)]
    Migrate(MigrateCommand),

    /// Tenant administration
    #[command(subcommand)]
    Tenant(TenantCommand),
}

#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Create a new migration file
    Create {
        /// Name of the migration
        name: String,
    },
    /// List all embedded migrations
    List,
    /// Check if there are pending migrations
    Status,
    /// Run all pending migrations
    Run,
}

#[derive(Debug, Subcommand)]
pub enum TenantCommand {
    /// Create a tenant; the password is prompted for
    Create(CreateTenantArgs),
    /// Revoke every active refresh session of a tenant
    RevokeSessions {
        /// Tenant id
        tenant_id: i64,
    },
}

#[derive(Debug, Args)]
pub struct CreateTenantArgs {
    #[arg(short, long)]
    pub username: String,
    #[arg(short, long)]
    pub name: String,
    #[arg(long)]
    pub tax_id: String,
    #[arg(long, default_value = "")]
    pub address: String,
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: f64,
    #[arg(long, default_value = "FREE")]
    pub plan: PlanType,
}

/// Runs a CLI command against the database
pub async fn run_command(db: &core::Database, command: Command) -> Result<(), CliError> {
    match command {
        Command::Migrate(command) => run_migrate_command(db, command).await,
        Command::Tenant(TenantCommand::Create(args)) => {
            let password = rpassword::prompt_password(format!("Enter password for tenant '{}': ", args.username))
                .map_err(|e| CliError::PasswordPromptFailed { source: e })?;
            let tenant_id = create_tenant(db, args, &password).await?;
            println!("Tenant created with id {tenant_id}.");
            Ok(())
        }
        Command::Tenant(TenantCommand::RevokeSessions { tenant_id }) => {
            db.tenants.get_by_id(tenant_id).await?;
            let revoked = db.refresh_sessions.revoke_all_for_tenant(tenant_id).await?;
            println!("Revoked {revoked} active session(s) of tenant {tenant_id}.");
            Ok(())
        }
    }
}

async fn run_migrate_command(db: &core::Database, command: MigrateCommand) -> Result<(), CliError> {
    match command {
        MigrateCommand::Create { name } => {
            let filename = app::create_migration(Path::new(MIGRATIONS_DIR), &name)
                .map_err(|e| CliError::MigrationCreateFailed { source: e })?;
            println!("Created new migration file: {filename}");
        }
        MigrateCommand::List => {
            let migrations = app::list_migrations();
            if migrations.is_empty() {
                println!("No migrations found.");
            } else {
                println!("Available migrations:");
                for (i, migration) in migrations.iter().enumerate() {
                    println!("{}. {}", i + 1, migration);
                }
            }
        }
        MigrateCommand::Status => match app::check_pending_migrations(db.pool()).await {
            Ok(true) => println!("There are pending migrations that need to be applied."),
            Ok(false) => println!("Database is up to date. No pending migrations."),
            Err(MigrationError::NoMigrationsApplied) => println!("No migrations have been applied yet."),
            Err(e) => return Err(CliError::MigrationStatusCheckFailed { source: e }),
        },
        MigrateCommand::Run => {
            app::run_migrations(db.pool())
                .await
                .map_err(|e| CliError::MigrationRunFailed { source: e })?;
            println!("Migrations applied successfully.");
        }
    }
    Ok(())
}

/// Validates the arguments and inserts the tenant; returns its id
pub async fn create_tenant(db: &core::Database, args: CreateTenantArgs, password: &str) -> Result<i64, CliError> {
    auth::check_password_policy(password).map_err(|e| CliError::InvalidInput(e.to_string()))?;
    GeoPoint::new(args.latitude, args.longitude).map_err(|e| CliError::InvalidInput(e.to_string()))?;

    let new_tenant = NewTenant {
        name: args.name,
        tax_id: args.tax_id,
        address: args.address,
        latitude: args.latitude,
        longitude: args.longitude,
        username: args.username,
        password_hash: auth::hash_password(password).map_err(CliError::PasswordHashingFailed)?,
        plan_type: args.plan,
    };
    let tenant = db.tenants.create(&new_tenant).await?;
    tracing::info!(tenant_id = tenant.id, username = %tenant.username, "Tenant created from CLI");
    Ok(tenant.id)
}
