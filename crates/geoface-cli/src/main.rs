use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use geoface_core::attendance::parse_date;
use geoface_core::user::normalize_email;
use geoface_core::{credentials, OfficeLocation, RecordFilter, Role};
use geoface_store::{NewUser, Store};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "geoface", about = "geoface attendance administration CLI")]
struct Cli {
    /// Database file (defaults to $XDG_DATA_HOME/geoface/geoface.db)
    #[arg(long, global = true, env = "GEOFACE_DB_PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account (use this to bootstrap the first admin)
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// "employee" or "admin"
        #[arg(long, default_value = "employee")]
        role: Role,
        #[arg(long)]
        password: String,
    },
    /// Set the office location used by the check-in geofence
    SetOffice {
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Geofence radius in meters
        #[arg(long, default_value_t = 100.0)]
        radius: f64,
    },
    /// Show the office location
    Office,
    /// List accounts
    Users,
    /// List attendance records, newest first
    Records {
        /// Case-insensitive substring of the user's name
        #[arg(long)]
        user_name: Option<String>,
        /// Calendar date, YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long, default_value_t = 1000)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = cli.db.unwrap_or_else(geoface_store::default_db_path);
    tracing::debug!(path = %path.display(), "using database");
    let store = Store::open(&path)
        .await
        .with_context(|| format!("opening database {}", path.display()))?;

    match cli.command {
        Commands::CreateUser {
            email,
            name,
            role,
            password,
        } => {
            let email = normalize_email(&email)?;
            if name.trim().is_empty() || password.is_empty() {
                bail!("name and password must not be empty");
            }
            let password_hash = credentials::hash_password(&password)?;
            let new = NewUser {
                email: email.clone(),
                name: name.trim().to_string(),
                role,
                password_hash,
            };
            match store.create_user(new, Utc::now()).await? {
                Some(user) => {
                    tracing::info!(user_id = %user.id, role = %user.role, "account created");
                    println!("Created {} {} ({})", user.role, user.email, user.id);
                }
                None => bail!("email already registered: {email}"),
            }
        }
        Commands::SetOffice {
            name,
            lat,
            lon,
            radius,
        } => {
            let office = OfficeLocation {
                name: name.trim().to_string(),
                latitude: lat,
                longitude: lon,
                radius,
                updated_by: None,
                updated_at: Utc::now(),
            };
            office.validate()?;
            store.set_office_location(&office).await?;
            tracing::info!(
                name = %office.name,
                latitude = office.latitude,
                longitude = office.longitude,
                radius_m = office.radius,
                "office location updated"
            );
            println!(
                "Office \"{}\" set at ({}, {}) with radius {} m",
                office.name, office.latitude, office.longitude, office.radius
            );
        }
        Commands::Office => match store.office_location().await? {
            Some(office) => print_json(&office)?,
            None => println!("No office location configured"),
        },
        Commands::Users => print_json(&store.list_users().await?)?,
        Commands::Records {
            user_name,
            date,
            limit,
        } => {
            let filter = RecordFilter { user_name, date };
            print_json(&store.all_records(filter, limit).await?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
