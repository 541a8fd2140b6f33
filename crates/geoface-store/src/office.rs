use geoface_core::OfficeLocation;
use rusqlite::{params, OptionalExtension};

use crate::database::{parse_timestamp, parse_uuid, Store};
use crate::error::Result;

impl Store {
    /// The configured office location, if any has ever been set.
    pub async fn office_location(&self) -> Result<Option<OfficeLocation>> {
        let office = self
            .conn()
            .call(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT name, latitude, longitude, radius, updated_by, updated_at
                         FROM office_location WHERE id = 1",
                        [],
                        row_to_office,
                    )
                    .optional()?)
            })
            .await?;
        Ok(office)
    }

    /// Replace the office location in place. Concurrent writers serialize on
    /// the connection; the last one to commit wins with all of its fields.
    pub async fn set_office_location(&self, office: &OfficeLocation) -> Result<()> {
        let office = office.clone();
        self.conn()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO office_location (id, name, latitude, longitude, radius, updated_by, updated_at)
                     VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        latitude = excluded.latitude,
                        longitude = excluded.longitude,
                        radius = excluded.radius,
                        updated_by = excluded.updated_by,
                        updated_at = excluded.updated_at",
                    params![
                        office.name,
                        office.latitude,
                        office.longitude,
                        office.radius,
                        office.updated_by.map(|id| id.to_string()),
                        office.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn row_to_office(row: &rusqlite::Row<'_>) -> rusqlite::Result<OfficeLocation> {
    let updated_by: Option<String> = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(OfficeLocation {
        name: row.get(0)?,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        radius: row.get(3)?,
        updated_by: updated_by.map(|s| parse_uuid(4, &s)).transpose()?,
        updated_at: parse_timestamp(5, &updated_at)?,
    })
}
