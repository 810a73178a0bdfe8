//! Movie handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::storage::StoreError;
use crate::AppState;
use mflix_types::{GenreCount, Movie};

const DEFAULT_PAGE_SIZE: i64 = 10;

fn not_found(id: &str) -> impl FnOnce(StoreError) -> ApiError + '_ {
    move |e| match e {
        StoreError::NotFound => ApiError::NotFound(format!("movie with id {id} not found")),
        other => other.into(),
    }
}

pub async fn insert(
    State(state): State<AppState>,
    Json(movie): Json<Movie>,
) -> Result<(StatusCode, Json<Movie>), ApiError> {
    if movie.title.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "title must not be empty".to_string(),
        ));
    }

    let created = state.db.insert_movie(movie).await?;
    info!("Movie inserted: {}", created.title);

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    page: Option<i64>,
    page_size: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    // Non-positive values fall back to the defaults
    let page = query.page.filter(|p| *p > 0).unwrap_or(1);
    let page_size = query
        .page_size
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let movies = state.db.list_movies(page, page_size).await?;
    Ok(Json(movies))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    let movie = state
        .db
        .get_movie(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("movie with id {id} not found")))?;

    Ok(Json(movie))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<serde_json::Map<String, Value>>,
) -> Result<Json<Movie>, ApiError> {
    if fields.is_empty() {
        return Err(ApiError::InvalidInput(
            "no fields provided for update".to_string(),
        ));
    }

    let movie = state
        .db
        .update_movie(&id, fields)
        .await
        .map_err(not_found(&id))?;
    info!("Movie updated: {}", id);

    Ok(Json(movie))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.db.delete_movie(&id).await.map_err(not_found(&id))?;
    info!("Movie deleted: {}", id);

    Ok(Json(json!({ "message": format!("movie {id} deleted") })))
}

#[derive(Debug, Deserialize)]
pub struct MovieSearchQuery {
    title: Option<String>,
    genre: Option<String>,
    year: Option<i32>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<MovieSearchQuery>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let movies = state
        .db
        .search_movies(query.title.as_deref(), query.genre.as_deref(), query.year)
        .await?;

    Ok(Json(movies))
}

pub async fn genres(State(state): State<AppState>) -> Result<Json<Vec<GenreCount>>, ApiError> {
    let counts = state.db.genre_counts().await?;
    Ok(Json(counts))
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, MemoryStore};
    use crate::{build_router, AppState, Config};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let db = Arc::new(Database::open_in_memory().await.expect("in-memory db"));
        let state = AppState {
            db,
            persons: Arc::new(MemoryStore::new()),
            config: Arc::new(Config::for_tests()),
        };
        build_router(state)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seed(app: &Router, title: &str, year: i32, genres: &[&str]) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/movies",
                json!({ "title": title, "year": year, "genres": genres }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response_json(response).await["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn insert_requires_title() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/movies", json!({ "title": " " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_defaults_and_pagination() {
        let app = test_app().await;
        for i in 0..12 {
            seed(&app, &format!("Movie {i:02}"), 2000 + i, &[]).await;
        }

        let response = app.clone().oneshot(get_request("/api/v1/movies")).await.unwrap();
        let page = response_json(response).await;
        assert_eq!(page.as_array().unwrap().len(), 10);

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/movies?page=2&page_size=10"))
            .await
            .unwrap();
        let page = response_json(response).await;
        assert_eq!(page.as_array().unwrap().len(), 2);

        // Nonsense paging falls back to defaults
        let response = app
            .clone()
            .oneshot(get_request("/api/v1/movies?page=0&page_size=-3"))
            .await
            .unwrap();
        let page = response_json(response).await;
        assert_eq!(page.as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn update_merges_and_rejects_empty_map() {
        let app = test_app().await;
        let id = seed(&app, "Alien", 1979, &["Horror"]).await;

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/movies/{id}"),
                json!({ "rated": "R" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = response_json(response).await;
        assert_eq!(updated["rated"], "R");
        assert_eq!(updated["title"], "Alien");

        let response = app
            .clone()
            .oneshot(json_request("PUT", &format!("/api/v1/movies/{id}"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/v1/movies/no-such-id",
                json!({ "rated": "R" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_and_genre_counts() {
        let app = test_app().await;
        seed(&app, "Alien", 1979, &["Horror", "Sci-Fi"]).await;
        seed(&app, "Aliens", 1986, &["Sci-Fi"]).await;

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/movies/search?title=alien&genre=Horror"))
            .await
            .unwrap();
        let hits = response_json(response).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["title"], "Alien");

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/movies/genres"))
            .await
            .unwrap();
        let counts = response_json(response).await;
        assert_eq!(counts[0]["genre"], "Sci-Fi");
        assert_eq!(counts[0]["count"], 2);
    }

    #[tokio::test]
    async fn delete_then_get_is_not_found() {
        let app = test_app().await;
        let id = seed(&app, "Heat", 1995, &["Crime"]).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/movies/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/v1/movies/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
