//! SQLite database layer (embedded, no external services)

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;

use mflix_types::{GenreCount, Movie, Person, PersonInput, PersonPatch};

use super::{PersonStore, StoreError, StoreResult};

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        // Create parent directory if needed
        if let Some(parent) = std::path::Path::new(database_path).parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to connect to SQLite database at: {}", database_path)
            })?;

        tracing::info!("SQLite connection established, running migrations...");

        Self::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// A private in-memory database, used by the test suites.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::run_migrations(&pool).await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        // Persons table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS persons (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password TEXT NOT NULL,
                phone TEXT,
                address TEXT,
                birth_date TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Movies table; document-valued fields live in JSON text columns
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS movies (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                year INTEGER,
                runtime INTEGER,
                rated TEXT,
                plot TEXT,
                fullplot TEXT,
                kind TEXT,
                released DATETIME,
                lastupdated DATETIME,
                num_mflix_comments INTEGER,
                genres TEXT NOT NULL DEFAULT '[]',
                cast_members TEXT NOT NULL DEFAULT '[]',
                languages TEXT NOT NULL DEFAULT '[]',
                directors TEXT NOT NULL DEFAULT '[]',
                writers TEXT NOT NULL DEFAULT '[]',
                countries TEXT NOT NULL DEFAULT '[]',
                awards TEXT,
                imdb TEXT,
                tomatoes TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // Movie operations

    pub async fn insert_movie(&self, mut movie: Movie) -> StoreResult<Movie> {
        movie.id = Some(uuid::Uuid::new_v4().to_string());
        let docs = MovieDocs::encode(&movie)?;

        sqlx::query(
            r#"
            INSERT INTO movies (
                id, title, year, runtime, rated, plot, fullplot, kind,
                released, lastupdated, num_mflix_comments,
                genres, cast_members, languages, directors, writers, countries,
                awards, imdb, tomatoes
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
            "#,
        )
        .bind(&movie.id)
        .bind(&movie.title)
        .bind(movie.year)
        .bind(movie.runtime)
        .bind(&movie.rated)
        .bind(&movie.plot)
        .bind(&movie.fullplot)
        .bind(&movie.kind)
        .bind(movie.released)
        .bind(movie.lastupdated)
        .bind(movie.num_mflix_comments)
        .bind(&docs.genres)
        .bind(&docs.cast)
        .bind(&docs.languages)
        .bind(&docs.directors)
        .bind(&docs.writers)
        .bind(&docs.countries)
        .bind(&docs.awards)
        .bind(&docs.imdb)
        .bind(&docs.tomatoes)
        .execute(&*self.pool)
        .await?;

        Ok(movie)
    }

    pub async fn get_movie(&self, id: &str) -> StoreResult<Option<Movie>> {
        let row: Option<MovieRow> = sqlx::query_as(
            r#"
            SELECT id, title, year, runtime, rated, plot, fullplot, kind,
                   released, lastupdated, num_mflix_comments,
                   genres, cast_members, languages, directors, writers, countries,
                   awards, imdb, tomatoes
            FROM movies WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn list_movies(&self, page: i64, page_size: i64) -> StoreResult<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(
            r#"
            SELECT id, title, year, runtime, rated, plot, fullplot, kind,
                   released, lastupdated, num_mflix_comments,
                   genres, cast_members, languages, directors, writers, countries,
                   awards, imdb, tomatoes
            FROM movies
            ORDER BY rowid
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn all_movies(&self) -> StoreResult<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(
            r#"
            SELECT id, title, year, runtime, rated, plot, fullplot, kind,
                   released, lastupdated, num_mflix_comments,
                   genres, cast_members, languages, directors, writers, countries,
                   awards, imdb, tomatoes
            FROM movies
            ORDER BY rowid
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Merge the supplied top-level fields into the stored document.
    ///
    /// The stored movie is rewritten as a whole; the merged document must
    /// still deserialize as a valid movie. The `id` key is never writable.
    pub async fn update_movie(
        &self,
        id: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> StoreResult<Movie> {
        let existing = self.get_movie(id).await?.ok_or(StoreError::NotFound)?;

        let mut doc = match serde_json::to_value(&existing)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(StoreError::InvalidDocument("not an object".to_string())),
        };
        for (key, value) in fields {
            if key == "id" {
                continue;
            }
            doc.insert(key, value);
        }

        let mut merged: Movie = serde_json::from_value(serde_json::Value::Object(doc))
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))?;
        merged.id = Some(id.to_string());

        let docs = MovieDocs::encode(&merged)?;
        let result = sqlx::query(
            r#"
            UPDATE movies SET
                title = ?1, year = ?2, runtime = ?3, rated = ?4, plot = ?5,
                fullplot = ?6, kind = ?7, released = ?8, lastupdated = ?9,
                num_mflix_comments = ?10, genres = ?11, cast_members = ?12,
                languages = ?13, directors = ?14, writers = ?15, countries = ?16,
                awards = ?17, imdb = ?18, tomatoes = ?19
            WHERE id = ?20
            "#,
        )
        .bind(&merged.title)
        .bind(merged.year)
        .bind(merged.runtime)
        .bind(&merged.rated)
        .bind(&merged.plot)
        .bind(&merged.fullplot)
        .bind(&merged.kind)
        .bind(merged.released)
        .bind(merged.lastupdated)
        .bind(merged.num_mflix_comments)
        .bind(&docs.genres)
        .bind(&docs.cast)
        .bind(&docs.languages)
        .bind(&docs.directors)
        .bind(&docs.writers)
        .bind(&docs.countries)
        .bind(&docs.awards)
        .bind(&docs.imdb)
        .bind(&docs.tomatoes)
        .bind(id)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(merged)
    }

    pub async fn delete_movie(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM movies WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// AND of the supplied filters; none supplied returns the full set.
    pub async fn search_movies(
        &self,
        title: Option<&str>,
        genre: Option<&str>,
        year: Option<i32>,
    ) -> StoreResult<Vec<Movie>> {
        let rows: Vec<MovieRow> = sqlx::query_as(
            r#"
            SELECT id, title, year, runtime, rated, plot, fullplot, kind,
                   released, lastupdated, num_mflix_comments,
                   genres, cast_members, languages, directors, writers, countries,
                   awards, imdb, tomatoes
            FROM movies
            WHERE (?1 IS NULL OR title LIKE '%' || ?1 || '%')
              AND (?2 IS NULL OR EXISTS (
                    SELECT 1 FROM json_each(movies.genres) WHERE json_each.value = ?2))
              AND (?3 IS NULL OR year = ?3)
            ORDER BY rowid
            "#,
        )
        .bind(title)
        .bind(genre)
        .bind(year)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Unwind genres, group, count, sort descending.
    pub async fn genre_counts(&self) -> StoreResult<Vec<GenreCount>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT json_each.value AS genre, COUNT(*) AS count
            FROM movies, json_each(movies.genres)
            GROUP BY json_each.value
            ORDER BY count DESC, genre ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(genre, count)| GenreCount { genre, count })
            .collect())
    }

    pub async fn count_movies(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM movies")
            .fetch_one(&*self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl PersonStore for Database {
    async fn insert(&self, input: PersonInput) -> StoreResult<Person> {
        let person = Person {
            id: uuid::Uuid::new_v4().to_string(),
            name: input.name,
            email: input.email,
            password: input.password,
            phone: input.phone,
            address: input.address,
            birth_date: input.birth_date,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO persons (id, name, email, password, phone, address, birth_date, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&person.id)
        .bind(&person.name)
        .bind(&person.email)
        .bind(&person.password)
        .bind(&person.phone)
        .bind(&person.address)
        .bind(person.birth_date)
        .bind(person.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &person.email))?;

        Ok(person)
    }

    async fn insert_many(&self, inputs: Vec<PersonInput>) -> StoreResult<usize> {
        let mut tx = self.pool.begin().await?;
        let inserted = inputs.len();

        for input in inputs {
            let email = input.email.clone();
            sqlx::query(
                r#"
                INSERT INTO persons (id, name, email, password, phone, address, birth_date, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.password)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(input.birth_date)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, &email))?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Person>> {
        let row: Option<PersonRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, password, phone, address, birth_date, created_at
            FROM persons WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self) -> StoreResult<Vec<Person>> {
        let rows: Vec<PersonRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, password, phone, address, birth_date, created_at
            FROM persons
            ORDER BY created_at
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update(&self, id: &str, input: PersonInput) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE persons
            SET name = ?1, email = ?2, password = ?3, phone = ?4, address = ?5, birth_date = ?6
            WHERE id = ?7
            "#,
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.password)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(input.birth_date)
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &input.email))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn merge(&self, email: &str, patch: PersonPatch) -> StoreResult<Person> {
        let patch = patch.normalized();

        let result = sqlx::query(
            r#"
            UPDATE persons SET
                name = COALESCE(?1, name),
                password = COALESCE(?2, password),
                phone = COALESCE(?3, phone),
                address = COALESCE(?4, address),
                birth_date = COALESCE(?5, birth_date)
            WHERE email = ?6
            "#,
        )
        .bind(&patch.name)
        .bind(&patch.password)
        .bind(&patch.phone)
        .bind(&patch.address)
        .bind(patch.birth_date)
        .bind(email)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        let row: PersonRow = sqlx::query_as(
            r#"
            SELECT id, name, email, password, phone, address, birth_date, created_at
            FROM persons WHERE email = ?1
            "#,
        )
        .bind(email)
        .fetch_one(&*self.pool)
        .await?;

        Ok(row.into())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM persons WHERE id = ?1")
            .bind(id)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_email(&self, email: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM persons WHERE email = ?1")
            .bind(email)
            .execute(&*self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM persons")
            .execute(&*self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn search(&self, query: &str) -> StoreResult<Vec<Person>> {
        // LIKE is case-insensitive for ASCII; an empty query matches everything
        let rows: Vec<PersonRow> = sqlx::query_as(
            r#"
            SELECT id, name, email, password, phone, address, birth_date, created_at
            FROM persons
            WHERE name LIKE '%' || ?1 || '%' OR email LIKE '%' || ?1 || '%'
            ORDER BY created_at
            "#,
        )
        .bind(query)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM persons")
            .fetch_one(&*self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn map_unique_violation(e: sqlx::Error, email: &str) -> StoreError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::DuplicateEmail(email.to_string());
        }
    }
    StoreError::Database(e)
}

// Helper structs for sqlx query_as

#[derive(sqlx::FromRow)]
struct PersonRow {
    id: String,
    name: String,
    email: String,
    password: String,
    phone: Option<String>,
    address: Option<String>,
    birth_date: Option<chrono::NaiveDate>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PersonRow> for Person {
    fn from(r: PersonRow) -> Self {
        Person {
            id: r.id,
            name: r.name,
            email: r.email,
            password: r.password,
            phone: r.phone,
            address: r.address,
            birth_date: r.birth_date,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: String,
    title: String,
    year: Option<i32>,
    runtime: Option<i32>,
    rated: Option<String>,
    plot: Option<String>,
    fullplot: Option<String>,
    kind: Option<String>,
    released: Option<chrono::DateTime<chrono::Utc>>,
    lastupdated: Option<chrono::DateTime<chrono::Utc>>,
    num_mflix_comments: Option<i32>,
    genres: String,
    cast_members: String,
    languages: String,
    directors: String,
    writers: String,
    countries: String,
    awards: Option<String>,
    imdb: Option<String>,
    tomatoes: Option<String>,
}

impl From<MovieRow> for Movie {
    fn from(r: MovieRow) -> Self {
        Movie {
            id: Some(r.id),
            title: r.title,
            plot: r.plot,
            fullplot: r.fullplot,
            genres: serde_json::from_str(&r.genres).unwrap_or_default(),
            runtime: r.runtime,
            rated: r.rated,
            cast: serde_json::from_str(&r.cast_members).unwrap_or_default(),
            languages: serde_json::from_str(&r.languages).unwrap_or_default(),
            released: r.released,
            directors: serde_json::from_str(&r.directors).unwrap_or_default(),
            writers: serde_json::from_str(&r.writers).unwrap_or_default(),
            awards: r.awards.and_then(|s| serde_json::from_str(&s).ok()),
            lastupdated: r.lastupdated,
            year: r.year,
            imdb: r.imdb.and_then(|s| serde_json::from_str(&s).ok()),
            countries: serde_json::from_str(&r.countries).unwrap_or_default(),
            kind: r.kind,
            tomatoes: r.tomatoes.and_then(|s| serde_json::from_str(&s).ok()),
            num_mflix_comments: r.num_mflix_comments,
        }
    }
}

/// JSON-encoded document columns of a movie row
struct MovieDocs {
    genres: String,
    cast: String,
    languages: String,
    directors: String,
    writers: String,
    countries: String,
    awards: Option<String>,
    imdb: Option<String>,
    tomatoes: Option<String>,
}

impl MovieDocs {
    fn encode(movie: &Movie) -> Result<Self, serde_json::Error> {
        Ok(Self {
            genres: serde_json::to_string(&movie.genres)?,
            cast: serde_json::to_string(&movie.cast)?,
            languages: serde_json::to_string(&movie.languages)?,
            directors: serde_json::to_string(&movie.directors)?,
            writers: serde_json::to_string(&movie.writers)?,
            countries: serde_json::to_string(&movie.countries)?,
            awards: movie
                .awards
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            imdb: movie.imdb.as_ref().map(serde_json::to_string).transpose()?,
            tomatoes: movie
                .tomatoes
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        })
    }
}
