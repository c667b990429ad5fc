//! Creates the initial admin account when it does not exist yet.

use std::env;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rentdesk_core::password::hash_password;
use rentdesk_core::payload::UserDraft;
use rentdesk_core::types::{UserRole, UserStatus};
use rentdesk_storage::Database;
use rentdesk_util::{database_url, load_env_file};

const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let database = Database::connect(&database_url()).await?;
    database.run_migrations().await?;

    let email = env::var("ADMIN_EMAIL")
        .unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string())
        .trim()
        .to_lowercase();
    let password =
        env::var("ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string());

    let users = database.users();
    if users.email_exists(&email).await? {
        info!(stage = "seed", %email, "admin user already exists");
        return Ok(());
    }

    let draft = UserDraft {
        first_name: "Admin".to_string(),
        last_name: "User".to_string(),
        email,
        phone_number: Some("+1234567890".to_string()),
        branch_id: None,
        status: UserStatus::Active,
    };
    draft.validate()?;
    let hash = hash_password(&password)?;
    let admin = users
        .insert(&draft, UserRole::Admin, &hash, Utc::now())
        .await?;

    info!(stage = "seed", admin_id = %admin.id, email = %admin.email, "admin user created");
    Ok(())
}
