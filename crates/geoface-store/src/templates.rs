use chrono::{DateTime, Utc};
use geoface_core::{Descriptor, FaceTemplate};
use rusqlite::params;
use uuid::Uuid;

use crate::database::{parse_json, parse_timestamp, parse_uuid, Store};
use crate::error::Result;

impl Store {
    /// Replace a user's entire template set in one transaction.
    ///
    /// Old templates are deleted and the batch inserted in order; if any
    /// statement fails the previous set is left untouched. Returns the
    /// number of templates now stored.
    pub async fn replace_templates(
        &self,
        user_id: Uuid,
        descriptors: Vec<Descriptor>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let encoded = descriptors
            .iter()
            .map(|d| serde_json::to_string(&d.values))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        let count = self
            .conn()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let removed = tx.execute(
                    "DELETE FROM face_templates WHERE user_id = ?1",
                    params![user_id.to_string()],
                )?;
                {
                    let mut insert = tx.prepare(
                        "INSERT INTO face_templates (id, user_id, sequence, descriptor, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for (sequence, descriptor) in encoded.iter().enumerate() {
                        insert.execute(params![
                            Uuid::new_v4().to_string(),
                            user_id.to_string(),
                            sequence as i64,
                            descriptor,
                            now.to_rfc3339(),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok((removed, encoded.len()))
            })
            .await?;

        tracing::info!(
            user_id = %user_id,
            replaced = count.0,
            stored = count.1,
            "face templates replaced"
        );
        Ok(count.1)
    }

    /// All templates for a user, in capture order.
    pub async fn templates_for(&self, user_id: Uuid) -> Result<Vec<FaceTemplate>> {
        let templates = self
            .conn()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, sequence, descriptor, created_at
                     FROM face_templates
                     WHERE user_id = ?1
                     ORDER BY sequence ASC",
                )?;
                let rows = stmt.query_map(params![user_id.to_string()], row_to_template)?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(templates)
    }
}

fn row_to_template(row: &rusqlite::Row<'_>) -> rusqlite::Result<FaceTemplate> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let descriptor: String = row.get(3)?;
    let created_at: String = row.get(4)?;

    Ok(FaceTemplate {
        id: parse_uuid(0, &id)?,
        user_id: parse_uuid(1, &user_id)?,
        sequence: row.get(2)?,
        descriptor: Descriptor::new(parse_json(3, &descriptor)?),
        created_at: parse_timestamp(4, &created_at)?,
    })
}
