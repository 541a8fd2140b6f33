use chrono::{DateTime, Utc};
use geoface_core::{Role, User};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::database::{parse_enum, parse_timestamp, parse_uuid, Store};
use crate::error::Result;

/// Fields needed to create an account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

/// Public view of a user, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub face_registered: bool,
    pub template_count: u32,
}

const USER_COLUMNS: &str = "id, email, name, role, created_at";

impl Store {
    /// Insert a new user. Returns `None` if the email is already registered.
    pub async fn create_user(&self, new: NewUser, now: DateTime<Utc>) -> Result<Option<User>> {
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            role: new.role,
            created_at: now,
        };
        let password_hash = new.password_hash;

        let created = self
            .conn()
            .call(move |conn| {
                let inserted = conn.execute(
                    "INSERT INTO users (id, email, name, role, password_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(email) DO NOTHING",
                    params![
                        user.id.to_string(),
                        user.email,
                        user.name,
                        user.role.as_str(),
                        password_hash,
                        user.created_at.to_rfc3339(),
                    ],
                )?;
                Ok((inserted == 1).then_some(user))
            })
            .await?;

        if let Some(user) = &created {
            tracing::info!(user_id = %user.id, role = %user.role, "user created");
        }
        Ok(created)
    }

    pub async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = self
            .conn()
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                        params![id.to_string()],
                        row_to_user,
                    )
                    .optional()?)
            })
            .await?;
        Ok(user)
    }

    /// Look up a user and their password hash by (normalized) email.
    pub async fn user_with_password(&self, email: &str) -> Result<Option<(User, String)>> {
        let email = email.to_string();
        let found = self
            .conn()
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                        params![email],
                        |row| Ok((row_to_user(row)?, row.get::<_, String>(5)?)),
                    )
                    .optional()?)
            })
            .await?;
        Ok(found)
    }

    pub async fn user_profile(&self, id: Uuid) -> Result<Option<UserProfile>> {
        let profile = self
            .conn()
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &format!(
                            "SELECT {USER_COLUMNS},
                                    (SELECT COUNT(*) FROM face_templates t WHERE t.user_id = users.id)
                             FROM users WHERE id = ?1"
                        ),
                        params![id.to_string()],
                        row_to_profile,
                    )
                    .optional()?)
            })
            .await?;
        Ok(profile)
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>> {
        let users = self
            .conn()
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS},
                            (SELECT COUNT(*) FROM face_templates t WHERE t.user_id = users.id)
                     FROM users
                     ORDER BY name COLLATE NOCASE ASC, created_at ASC"
                ))?;
                let rows = stmt.query_map([], row_to_profile)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(users)
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(3)?;
    let created_at: String = row.get(4)?;

    Ok(User {
        id: parse_uuid(0, &id)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: parse_enum(3, &role)?,
        created_at: parse_timestamp(4, &created_at)?,
    })
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserProfile> {
    let user = row_to_user(row)?;
    let template_count: u32 = row.get(5)?;
    Ok(UserProfile {
        user,
        face_registered: template_count > 0,
        template_count,
    })
}
