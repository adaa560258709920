use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sections::{
    area::AreaRecord,
    config::AreaSlot,
    page::PageRef,
    section::SectionRecord,
    store::{SearchIndexer, SectionStore, SectionWrite},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{AreaId, PageId, PageSummary, SectionId};

const SECTION_COLUMNS: &str = "id, area_id, type_id, title, sort, mobile_sort, show_for_desktop, \
     show_for_mobile, title_hide, title_semantic, layout, color, style, extra, updated_at";

const AREA_COLUMNS: &str =
    "id, page_id, slug, title, allow_mobile_sort, search_index, updated_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_page(
        &self,
        page_type: &str,
        url_segment: &str,
        title: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<PageRef> {
        let encoded = serde_json::to_string(fields)?;
        let rec = sqlx::query(
            "INSERT INTO pages (page_type, url_segment, title, fields) VALUES (?, ?, ?, ?)
             RETURNING id",
        )
        .bind(page_type)
        .bind(url_segment)
        .bind(title)
        .bind(encoded)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create page '{url_segment}'"))?;

        Ok(PageRef {
            id: PageId(rec.get::<i64, _>(0)),
            page_type: page_type.to_string(),
            url_segment: url_segment.to_string(),
            title: title.to_string(),
            fields: fields.clone(),
        })
    }

    pub async fn find_page(&self, page_id: PageId) -> Result<Option<PageRef>> {
        let row = sqlx::query(
            "SELECT id, page_type, url_segment, title, fields FROM pages WHERE id = ?",
        )
        .bind(page_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(page_from_row).transpose()
    }

    pub async fn find_page_by_segment(&self, url_segment: &str) -> Result<Option<PageRef>> {
        let row = sqlx::query(
            "SELECT id, page_type, url_segment, title, fields FROM pages WHERE url_segment = ?",
        )
        .bind(url_segment)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(page_from_row).transpose()
    }

    pub async fn list_pages(&self) -> Result<Vec<PageSummary>> {
        let rows = sqlx::query("SELECT id, page_type, url_segment, title FROM pages ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| PageSummary {
                page_id: PageId(r.get::<i64, _>(0)),
                page_type: r.get::<String, _>(1),
                url_segment: r.get::<String, _>(2),
                title: r.get::<String, _>(3),
            })
            .collect())
    }

    /// Deletes a page together with its areas and their sections.
    pub async fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(page_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[async_trait]
impl SectionStore for Storage {
    async fn upsert_area(
        &self,
        page_id: PageId,
        slot: &AreaSlot,
        allow_mobile_sort: Option<bool>,
        indexer: &dyn SearchIndexer,
    ) -> Result<AreaRecord> {
        let mut tx = self.pool.begin().await?;

        let rec = sqlx::query(
            r#"
            INSERT INTO areas (page_id, slug, title, allow_mobile_sort, search_index, updated_at)
            VALUES (?1, ?2, ?3, COALESCE(?4, 0), '', ?5)
            ON CONFLICT(page_id, slug) DO UPDATE SET
                title = excluded.title,
                allow_mobile_sort = COALESCE(?4, areas.allow_mobile_sort),
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(page_id.0)
        .bind(&slot.slug)
        .bind(&slot.title)
        .bind(allow_mobile_sort)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .with_context(|| format!("failed to upsert area '{}' on page {page_id}", slot.slug))?;
        let area_id = AreaId(rec.get::<i64, _>(0));

        reindex_area(&mut tx, area_id, indexer).await?;
        let area = fetch_area(&mut tx, area_id)
            .await?
            .ok_or_else(|| anyhow!("area {area_id} vanished during upsert"))?;

        tx.commit().await?;
        Ok(area)
    }

    async fn find_area(&self, page_id: PageId, slug: &str) -> Result<Option<AreaRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {AREA_COLUMNS} FROM areas WHERE page_id = ? AND slug = ?"
        ))
        .bind(page_id.0)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(area_from_row).transpose()
    }

    async fn list_areas(&self, page_id: PageId) -> Result<Vec<AreaRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {AREA_COLUMNS} FROM areas WHERE page_id = ? ORDER BY id"
        ))
        .bind(page_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(area_from_row).collect()
    }

    async fn load_sections(&self, area_id: AreaId) -> Result<Vec<SectionRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sections(&mut conn, area_id).await
    }

    async fn find_section(&self, section_id: SectionId) -> Result<Option<SectionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SECTION_COLUMNS} FROM sections WHERE id = ?"
        ))
        .bind(section_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(section_from_row).transpose()
    }

    async fn write_section(
        &self,
        write: SectionWrite,
        indexer: &dyn SearchIndexer,
    ) -> Result<SectionId> {
        let mut tx = self.pool.begin().await?;

        let (section_id, touched) = match write {
            SectionWrite::Insert(record) => {
                let rec = sqlx::query(
                    r#"
                    INSERT INTO sections (
                        area_id, type_id, title, sort, mobile_sort, show_for_desktop,
                        show_for_mobile, title_hide, title_semantic, layout, color, style,
                        extra, updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING id
                    "#,
                )
                .bind(record.area_id.0)
                .bind(&record.type_id)
                .bind(&record.title)
                .bind(record.sort)
                .bind(record.mobile_sort)
                .bind(record.show_for_desktop)
                .bind(record.show_for_mobile)
                .bind(record.title_hide)
                .bind(record.title_semantic.to_string())
                .bind(&record.layout)
                .bind(&record.color)
                .bind(&record.style)
                .bind(serde_json::to_string(&record.extra)?)
                .bind(Utc::now())
                .fetch_one(&mut *tx)
                .await
                .with_context(|| format!("failed to insert section into area {}", record.area_id))?;
                (SectionId(rec.get::<i64, _>(0)), vec![record.area_id])
            }
            SectionWrite::Update(record) => {
                let previous = section_area(&mut tx, record.id)
                    .await?
                    .ok_or_else(|| anyhow!("section {} does not exist", record.id))?;
                sqlx::query(
                    r#"
                    UPDATE sections SET
                        area_id = ?, type_id = ?, title = ?, sort = ?, mobile_sort = ?,
                        show_for_desktop = ?, show_for_mobile = ?, title_hide = ?,
                        title_semantic = ?, layout = ?, color = ?, style = ?, extra = ?,
                        updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(record.area_id.0)
                .bind(&record.type_id)
                .bind(&record.title)
                .bind(record.sort)
                .bind(record.mobile_sort)
                .bind(record.show_for_desktop)
                .bind(record.show_for_mobile)
                .bind(record.title_hide)
                .bind(record.title_semantic.to_string())
                .bind(&record.layout)
                .bind(&record.color)
                .bind(&record.style)
                .bind(serde_json::to_string(&record.extra)?)
                .bind(Utc::now())
                .bind(record.id.0)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to update section {}", record.id))?;

                let mut touched = vec![record.area_id];
                if previous != record.area_id {
                    touched.push(previous);
                }
                (record.id, touched)
            }
            SectionWrite::Delete(section_id) => {
                let Some(area_id) = section_area(&mut tx, section_id).await? else {
                    bail!("section {section_id} does not exist");
                };
                sqlx::query("DELETE FROM sections WHERE id = ?")
                    .bind(section_id.0)
                    .execute(&mut *tx)
                    .await?;
                (section_id, vec![area_id])
            }
        };

        for area_id in touched {
            reindex_area(&mut tx, area_id, indexer).await?;
        }

        tx.commit().await?;
        Ok(section_id)
    }

    async fn delete_area(&self, area_id: AreaId) -> Result<()> {
        sqlx::query("DELETE FROM areas WHERE id = ?")
            .bind(area_id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete area {area_id}"))?;
        Ok(())
    }
}

async fn section_area(conn: &mut SqliteConnection, section_id: SectionId) -> Result<Option<AreaId>> {
    let row = sqlx::query("SELECT area_id FROM sections WHERE id = ?")
        .bind(section_id.0)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|r| AreaId(r.get::<i64, _>(0))))
}

async fn fetch_area(conn: &mut SqliteConnection, area_id: AreaId) -> Result<Option<AreaRecord>> {
    let row = sqlx::query(&format!("SELECT {AREA_COLUMNS} FROM areas WHERE id = ?"))
        .bind(area_id.0)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(area_from_row).transpose()
}

async fn fetch_sections(conn: &mut SqliteConnection, area_id: AreaId) -> Result<Vec<SectionRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {SECTION_COLUMNS} FROM sections WHERE area_id = ? ORDER BY id"
    ))
    .bind(area_id.0)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(section_from_row).collect()
}

/// Recomputes an area's search index from its current sections.
async fn reindex_area(
    conn: &mut SqliteConnection,
    area_id: AreaId,
    indexer: &dyn SearchIndexer,
) -> Result<()> {
    let sections = fetch_sections(conn, area_id).await?;
    let index = indexer.search_index(&sections);
    sqlx::query("UPDATE areas SET search_index = ?, updated_at = ? WHERE id = ?")
        .bind(index)
        .bind(Utc::now())
        .bind(area_id.0)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("failed to reindex area {area_id}"))?;
    Ok(())
}

fn page_from_row(row: &SqliteRow) -> Result<PageRef> {
    let fields: String = row.try_get("fields")?;
    Ok(PageRef {
        id: PageId(row.try_get("id")?),
        page_type: row.try_get("page_type")?,
        url_segment: row.try_get("url_segment")?,
        title: row.try_get("title")?,
        fields: serde_json::from_str(&fields).context("corrupt page fields")?,
    })
}

fn area_from_row(row: &SqliteRow) -> Result<AreaRecord> {
    Ok(AreaRecord {
        id: AreaId(row.try_get("id")?),
        page_id: PageId(row.try_get("page_id")?),
        slug: row.try_get("slug")?,
        title: row.try_get("title")?,
        allow_mobile_sort: row.try_get("allow_mobile_sort")?,
        search_index: row.try_get("search_index")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn section_from_row(row: &SqliteRow) -> Result<SectionRecord> {
    let id = SectionId(row.try_get("id")?);
    let semantic: String = row.try_get("title_semantic")?;
    let extra: String = row.try_get("extra")?;
    Ok(SectionRecord {
        id,
        area_id: AreaId(row.try_get("area_id")?),
        type_id: row.try_get("type_id")?,
        title: row.try_get("title")?,
        sort: row.try_get("sort")?,
        mobile_sort: row.try_get("mobile_sort")?,
        show_for_desktop: row.try_get("show_for_desktop")?,
        show_for_mobile: row.try_get("show_for_mobile")?,
        title_hide: row.try_get("title_hide")?,
        title_semantic: semantic
            .parse()
            .with_context(|| format!("corrupt title semantic on section {id}"))?,
        layout: row.try_get("layout")?,
        color: row.try_get("color")?,
        style: row.try_get("style")?,
        extra: serde_json::from_str(&extra)
            .with_context(|| format!("corrupt extra fields on section {id}"))?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
