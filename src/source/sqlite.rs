//! SQLite readers for MySword and TWM databases.
//!
//! | Source          | File                 | Table                                          |
//! |-----------------|----------------------|------------------------------------------------|
//! | Bible text      | `*.bbl.mybible`      | `Bible(Book, Chapter, Verse, Scripture)`       |
//! | Book names      | `*.lang.mybible`     | `biblebooks(id, name, abbreviation)`           |
//! | Language        | either of the above  | `Details(Language)` (optional)                 |
//! | Cross-references | `*.xrefs.twm`       | `xrefs_bcv(fbi, fci, fvi, tbi, tci, tvi[, tve])` |
//!
//! Databases are opened read-only. Rows are returned as plain records; no
//! interpretation happens here beyond decoding text.

use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row};
use tracing::{info, warn};

use super::{BookNameRecord, SourceData, VerseRecord};
use crate::error::{Error, Result};
use crate::model::Locator;
use crate::util::decode_text;
use crate::xref::{CrossReference, XrefSource, XrefTarget};

const BIBLE_SOURCE: &str = "Bible text";
const BOOKS_SOURCE: &str = "book name";
const XREFS_SOURCE: &str = "cross-reference";

/// Paths to the input databases.
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub bible: PathBuf,
    pub books: PathBuf,
    pub cross_references: Option<PathBuf>,
}

/// Read every source for one run.
///
/// The Bible text and book-name databases are required. The cross-reference
/// database is optional: if it cannot be read, a warning is logged and the
/// run continues without cross-references.
pub async fn load(paths: &SourcePaths) -> Result<SourceData> {
    let mut bible = open(&paths.bible, BIBLE_SOURCE).await?;
    let mut books = open(&paths.books, BOOKS_SOURCE).await?;

    let verses = read_verses(&mut bible).await?;
    let book_names = read_book_names(&mut books).await?;
    let language = match read_language(&mut books).await? {
        Some(language) => Some(language),
        None => read_language(&mut bible).await?,
    };
    bible.close().await?;
    books.close().await?;

    let cross_references = match &paths.cross_references {
        None => XrefSource::Absent,
        Some(path) => match load_cross_references(path).await {
            Ok(edges) => {
                info!(path = %path.display(), edges = edges.len(), "cross-reference database loaded");
                XrefSource::Present(edges)
            }
            Err(e) => {
                warn!("{e}; continuing without cross-references");
                XrefSource::Absent
            }
        },
    };

    Ok(SourceData {
        verses,
        book_names,
        language,
        cross_references,
    })
}

/// Read all cross-reference edges from a TWM database.
pub async fn load_cross_references(path: &Path) -> Result<Vec<CrossReference>> {
    let mut conn = open(path, XREFS_SOURCE).await?;
    let edges = read_cross_references(&mut conn).await?;
    conn.close().await?;
    Ok(edges)
}

/// Open a database read-only.
pub async fn open(path: &Path, source_name: &'static str) -> Result<SqliteConnection> {
    let unavailable = |message: String| Error::SourceUnavailable {
        source_name,
        path: path.to_path_buf(),
        message,
    };
    if !path.is_file() {
        return Err(unavailable("file not found".to_string()));
    }
    SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .connect()
        .await
        .map_err(|e| unavailable(e.to_string()))
}

/// Read `Bible(Book, Chapter, Verse, Scripture)` rows.
pub async fn read_verses(conn: &mut SqliteConnection) -> Result<Vec<VerseRecord>> {
    require_table(conn, BIBLE_SOURCE, "Bible").await?;

    // Scripture is read as a blob so non-UTF-8 modules can still be decoded.
    let rows = sqlx::query(
        "SELECT Book, Chapter, Verse, CAST(Scripture AS BLOB) FROM Bible \
         ORDER BY Book, Chapter, Verse",
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> Result<VerseRecord> {
            let text: Option<Vec<u8>> = row.try_get(3)?;
            Ok(VerseRecord {
                book: number(row, 0, BIBLE_SOURCE)?,
                chapter: number(row, 1, BIBLE_SOURCE)?,
                verse: number(row, 2, BIBLE_SOURCE)?,
                text: text.map(|bytes| decode_text(&bytes).into_owned()),
            })
        })
        .collect()
}

/// Read `biblebooks(id, name[, abbreviation])` rows.
pub async fn read_book_names(conn: &mut SqliteConnection) -> Result<Vec<BookNameRecord>> {
    require_table(conn, BOOKS_SOURCE, "biblebooks").await?;

    let abbreviation = if has_column(conn, "biblebooks", "abbreviation").await? {
        "abbreviation"
    } else {
        "NULL"
    };
    let sql = format!(
        "SELECT id, CAST(name AS BLOB), CAST({abbreviation} AS BLOB) FROM biblebooks ORDER BY id"
    );
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| -> Result<BookNameRecord> {
            let name: Option<Vec<u8>> = row.try_get(1)?;
            let abbreviation: Option<Vec<u8>> = row.try_get(2)?;
            Ok(BookNameRecord {
                ordinal: number(row, 0, BOOKS_SOURCE)?,
                name: name.map(|bytes| decode_text(&bytes).trim().to_string()),
                abbreviation: abbreviation.map(|bytes| decode_text(&bytes).trim().to_string()),
            })
        })
        .collect()
}

/// Read the module language from an optional `Details(Language)` table.
pub async fn read_language(conn: &mut SqliteConnection) -> Result<Option<String>> {
    if !has_table(conn, "Details").await? || !has_column(conn, "Details", "Language").await? {
        return Ok(None);
    }
    let language: Option<Option<String>> =
        sqlx::query_scalar("SELECT CAST(Language AS TEXT) FROM Details LIMIT 1")
            .fetch_optional(&mut *conn)
            .await?;
    Ok(language
        .flatten()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty()))
}

/// Read `xrefs_bcv` edges in source order.
pub async fn read_cross_references(conn: &mut SqliteConnection) -> Result<Vec<CrossReference>> {
    require_table(conn, XREFS_SOURCE, "xrefs_bcv").await?;

    let end_verse = if has_column(conn, "xrefs_bcv", "tve").await? {
        "tve"
    } else {
        "NULL"
    };
    let sql = format!("SELECT fbi, fci, fvi, tbi, tci, tvi, {end_verse} FROM xrefs_bcv");
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| -> Result<CrossReference> {
            let source = Locator::new(
                lenient_number(row, 0)?,
                lenient_number(row, 1)?,
                lenient_number(row, 2)?,
            );
            let start = Locator::new(
                lenient_number(row, 3)?,
                lenient_number(row, 4)?,
                lenient_number(row, 5)?,
            );
            let end: Option<i64> = row.try_get(6)?;
            let end = end.map(|v| u32::try_from(v).unwrap_or(0));
            Ok(CrossReference {
                source,
                target: XrefTarget::new(start, end),
                weight: None,
            })
        })
        .collect()
}

async fn require_table(
    conn: &mut SqliteConnection,
    source_name: &'static str,
    table: &'static str,
) -> Result<()> {
    if has_table(conn, table).await? {
        Ok(())
    } else {
        Err(Error::MissingTable { source_name, table })
    }
}

async fn has_table(conn: &mut SqliteConnection, table: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE (type = 'table' OR type = 'view') AND name = ?",
    )
    .bind(table)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

async fn has_column(conn: &mut SqliteConnection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ? COLLATE NOCASE",
    )
    .bind(table)
    .bind(column)
    .fetch_one(&mut *conn)
    .await?;
    Ok(count > 0)
}

/// Non-negative integer column; anything else is malformed input.
fn number(row: &SqliteRow, index: usize, source_name: &str) -> Result<u32> {
    let value: i64 = row.try_get(index)?;
    u32::try_from(value).map_err(|_| {
        Error::MalformedSource(format!(
            "{source_name} source has out-of-range number {value} in column {index}"
        ))
    })
}

/// Integer column where bad values become 0, a locator that never resolves.
fn lenient_number(row: &SqliteRow, index: usize) -> Result<u32> {
    let value: Option<i64> = row.try_get(index)?;
    Ok(value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0))
}
