// SPDX-License-Identifier: MPL-2.0
//! Read-only access to the library's SQLite metadata database.
//!
//! Explicit-path libraries keep a Photos-schema database at
//! `<library>/database/Photos.sqlite`. The framework exposes no enumeration
//! API for libraries opened at a path, so asset and album enumeration in
//! that mode, plus the attributes the framework does not surface at all
//! (added date, capture timezone), are read from here directly. The
//! connection is strictly read-only; all writes go through the framework's
//! change transactions.
//!
//! Dates are stored as seconds since the Photos epoch, 2001-01-01 00:00 UTC.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OpenFlags};

use crate::domain::TimezoneInfo;
use crate::error::{Error, Result};

/// Offset of the Photos epoch from the Unix epoch, in seconds.
const PHOTOS_EPOCH_UNIX: i64 = 978_307_200;

/// Saved-asset-type value of cloud-shared assets, which are not part of the
/// local library proper and are excluded from enumeration.
const SAVED_ASSET_TYPE_SHARED: i64 = 8;

/// Converts a UTC timestamp to seconds since the Photos epoch.
pub fn to_photos_epoch(date: DateTime<Utc>) -> f64 {
    (date.timestamp() - PHOTOS_EPOCH_UNIX) as f64 + f64::from(date.timestamp_subsec_nanos()) / 1e9
}

/// Converts a Photos-epoch timestamp to UTC.
pub fn from_photos_epoch(seconds: f64) -> DateTime<Utc> {
    let unix = PHOTOS_EPOCH_UNIX as f64 + seconds;
    let secs = unix.floor() as i64;
    let nanos = ((unix - secs as f64) * 1e9) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(PHOTOS_EPOCH_UNIX, 0).unwrap())
}

/// One open metadata database.
pub struct MetadataStore {
    conn: Mutex<Connection>,
}

impl MetadataStore {
    /// Database path inside a library rooted at `library_path`.
    pub fn database_path(library_path: &Path) -> PathBuf {
        library_path.join("database").join("Photos.sqlite")
    }

    /// Opens the database of the library rooted at `library_path`,
    /// read-only.
    pub fn open(library_path: &Path) -> Result<Self> {
        let path = Self::database_path(library_path);
        let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        log::debug!("opened metadata store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// UUIDs of library assets. Hidden, trashed, and non-representative
    /// burst members are excluded unless the matching flag asks for them;
    /// cloud-shared assets are always excluded.
    pub fn asset_uuids(&self, hidden: bool, in_trash: bool, burst: bool) -> Result<Vec<String>> {
        let mut sql = String::from(
            "SELECT ZUUID FROM ZASSET WHERE ZSAVEDASSETTYPE != ?1",
        );
        if !hidden {
            sql.push_str(" AND ZHIDDEN = 0");
        }
        if !in_trash {
            sql.push_str(" AND ZTRASHEDSTATE = 0");
        }
        if !burst {
            sql.push_str(" AND (ZAVALANCHEUUID IS NULL OR ZAVALANCHEPICKTYPE != 0)");
        }
        sql.push_str(" ORDER BY ZUUID");
        log::debug!("metadata query: {}", sql);

        let conn = self.conn.lock().expect("metadata store poisoned");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([SAVED_ASSET_TYPE_SHARED], |row| row.get::<_, String>(0))?;
        let mut uuids = Vec::new();
        for row in rows {
            uuids.push(row?);
        }
        Ok(uuids)
    }

    /// UUIDs of regular user albums (album kind 2), excluding trashed ones.
    /// With `top_level`, only albums whose parent is the library's root
    /// folder (kind 3999) are returned.
    pub fn album_uuids(&self, top_level: bool) -> Result<Vec<String>> {
        let sql = if top_level {
            "SELECT album.ZUUID FROM ZGENERICALBUM album \
             JOIN ZGENERICALBUM parent ON album.ZPARENTFOLDER = parent.Z_PK \
             WHERE album.ZKIND = 2 AND album.ZTRASHEDSTATE = 0 \
             AND parent.ZKIND = 3999 ORDER BY album.ZUUID"
        } else {
            "SELECT ZUUID FROM ZGENERICALBUM \
             WHERE ZKIND = 2 AND ZTRASHEDSTATE = 0 ORDER BY ZUUID"
        };
        log::debug!("metadata query: {}", sql);

        let conn = self.conn.lock().expect("metadata store poisoned");
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut uuids = Vec::new();
        for row in rows {
            uuids.push(row?);
        }
        Ok(uuids)
    }

    /// Date the asset was added to the library.
    pub fn date_added(&self, uuid: &str) -> Result<DateTime<Utc>> {
        let conn = self.conn.lock().expect("metadata store poisoned");
        let seconds: Option<f64> = conn
            .query_row(
                "SELECT ZADDEDDATE FROM ZASSET WHERE ZUUID = ?1",
                [uuid],
                |row| row.get(0),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    Error::FetchFailed(format!("no asset with uuid {}", uuid))
                }
                other => other.into(),
            })?;
        let seconds = seconds
            .ok_or_else(|| Error::FetchFailed(format!("asset {} has no added date", uuid)))?;
        Ok(from_photos_epoch(seconds))
    }

    /// Timezone the asset was captured in.
    pub fn timezone(&self, uuid: &str) -> Result<TimezoneInfo> {
        let conn = self.conn.lock().expect("metadata store poisoned");
        conn.query_row(
            "SELECT attr.ZTIMEZONEOFFSET, attr.ZTIMEZONENAME \
             FROM ZADDITIONALASSETATTRIBUTES attr \
             JOIN ZASSET asset ON attr.ZASSET = asset.Z_PK \
             WHERE asset.ZUUID = ?1",
            [uuid],
            |row| {
                Ok(TimezoneInfo {
                    offset_secs: row.get(0)?,
                    name: row.get(1)?,
                })
            },
        )
        .map_err(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => {
                Error::FetchFailed(format!("no asset with uuid {}", uuid))
            }
            other => other.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Builds a minimal library database with the schema subset this store
    /// reads.
    fn fixture_library() -> TempDir {
        let dir = TempDir::new().unwrap();
        let db_dir = dir.path().join("database");
        std::fs::create_dir_all(&db_dir).unwrap();
        let conn = Connection::open(db_dir.join("Photos.sqlite")).unwrap();
        conn.execute_batch(
            "CREATE TABLE ZASSET (
                Z_PK INTEGER PRIMARY KEY,
                ZUUID TEXT NOT NULL,
                ZHIDDEN INTEGER NOT NULL DEFAULT 0,
                ZTRASHEDSTATE INTEGER NOT NULL DEFAULT 0,
                ZSAVEDASSETTYPE INTEGER NOT NULL DEFAULT 3,
                ZAVALANCHEUUID TEXT,
                ZAVALANCHEPICKTYPE INTEGER NOT NULL DEFAULT 0,
                ZADDEDDATE REAL
            );
            CREATE TABLE ZADDITIONALASSETATTRIBUTES (
                Z_PK INTEGER PRIMARY KEY,
                ZASSET INTEGER NOT NULL,
                ZTIMEZONEOFFSET INTEGER,
                ZTIMEZONENAME TEXT
            );
            CREATE TABLE ZGENERICALBUM (
                Z_PK INTEGER PRIMARY KEY,
                ZUUID TEXT NOT NULL,
                ZKIND INTEGER NOT NULL,
                ZTRASHEDSTATE INTEGER NOT NULL DEFAULT 0,
                ZPARENTFOLDER INTEGER
            );
            INSERT INTO ZASSET (Z_PK, ZUUID, ZADDEDDATE) VALUES (1, 'A-1', 700000000.5);
            INSERT INTO ZASSET (Z_PK, ZUUID, ZHIDDEN) VALUES (2, 'A-2', 1);
            INSERT INTO ZASSET (Z_PK, ZUUID, ZTRASHEDSTATE) VALUES (3, 'A-3', 1);
            INSERT INTO ZASSET (Z_PK, ZUUID, ZAVALANCHEUUID, ZAVALANCHEPICKTYPE)
                VALUES (4, 'A-4', 'B-1', 0);
            INSERT INTO ZASSET (Z_PK, ZUUID, ZSAVEDASSETTYPE) VALUES (5, 'A-5', 8);
            INSERT INTO ZADDITIONALASSETATTRIBUTES (ZASSET, ZTIMEZONEOFFSET, ZTIMEZONENAME)
                VALUES (1, -28800, 'America/Los_Angeles');
            INSERT INTO ZGENERICALBUM (Z_PK, ZUUID, ZKIND) VALUES (10, 'ROOT', 3999);
            INSERT INTO ZGENERICALBUM (Z_PK, ZUUID, ZKIND, ZPARENTFOLDER)
                VALUES (11, 'ALB-TOP', 2, 10);
            INSERT INTO ZGENERICALBUM (Z_PK, ZUUID, ZKIND, ZPARENTFOLDER)
                VALUES (12, 'FOLDER', 4000, 10);
            INSERT INTO ZGENERICALBUM (Z_PK, ZUUID, ZKIND, ZPARENTFOLDER)
                VALUES (13, 'ALB-NESTED', 2, 12);
            INSERT INTO ZGENERICALBUM (Z_PK, ZUUID, ZKIND, ZTRASHEDSTATE, ZPARENTFOLDER)
                VALUES (14, 'ALB-TRASHED', 2, 1, 10);",
        )
        .unwrap();
        dir
    }

    #[test]
    fn default_enumeration_excludes_hidden_trashed_burst_and_shared() {
        let library = fixture_library();
        let store = MetadataStore::open(library.path()).unwrap();
        assert_eq!(store.asset_uuids(false, false, false).unwrap(), ["A-1"]);
    }

    #[test]
    fn flags_opt_into_excluded_classes() {
        let library = fixture_library();
        let store = MetadataStore::open(library.path()).unwrap();
        assert_eq!(
            store.asset_uuids(true, true, true).unwrap(),
            ["A-1", "A-2", "A-3", "A-4"]
        );
    }

    #[test]
    fn album_enumeration_honors_top_level_and_trash() {
        let library = fixture_library();
        let store = MetadataStore::open(library.path()).unwrap();
        assert_eq!(store.album_uuids(true).unwrap(), ["ALB-TOP"]);
        assert_eq!(store.album_uuids(false).unwrap(), ["ALB-NESTED", "ALB-TOP"]);
    }

    #[test]
    fn date_added_converts_from_photos_epoch() {
        let library = fixture_library();
        let store = MetadataStore::open(library.path()).unwrap();
        let date = store.date_added("A-1").unwrap();
        assert_eq!(date.timestamp(), PHOTOS_EPOCH_UNIX + 700_000_000);
    }

    #[test]
    fn timezone_joins_through_attributes_table() {
        let library = fixture_library();
        let store = MetadataStore::open(library.path()).unwrap();
        let tz = store.timezone("A-1").unwrap();
        assert_eq!(tz.offset_secs, -28800);
        assert_eq!(tz.name, "America/Los_Angeles");
    }

    #[test]
    fn unknown_uuid_is_fetch_failed() {
        let library = fixture_library();
        let store = MetadataStore::open(library.path()).unwrap();
        assert!(matches!(
            store.date_added("NOPE"),
            Err(Error::FetchFailed(_))
        ));
        assert!(matches!(store.timezone("NOPE"), Err(Error::FetchFailed(_))));
    }
}
