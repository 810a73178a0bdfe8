//! Person handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::storage::StoreError;
use crate::AppState;
use mflix_types::{age_on, Person, PersonInput, PersonPatch, PersonSummary};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));

/// Full record response, with the age derived from the birth date.
/// The password never leaves the store.
#[derive(Debug, Serialize)]
pub struct PersonResponse {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    birth_date: Option<NaiveDate>,
    age: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<Person> for PersonResponse {
    fn from(p: Person) -> Self {
        let age = p
            .birth_date
            .map(|birth| age_on(birth, Utc::now().date_naive()));
        Self {
            id: p.id,
            name: p.name,
            email: p.email,
            phone: p.phone,
            address: p.address,
            birth_date: p.birth_date,
            age,
            created_at: p.created_at,
        }
    }
}

fn validate_input(input: &PersonInput) -> Result<(), ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::InvalidInput("name must not be empty".to_string()));
    }
    if input.email.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "email must not be empty".to_string(),
        ));
    }
    if !EMAIL_RE.is_match(&input.email) {
        return Err(ApiError::InvalidInput(format!(
            "invalid email address: {}",
            input.email
        )));
    }
    if input.password.is_empty() {
        return Err(ApiError::InvalidInput(
            "password must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn not_found_by_id(id: &str) -> impl FnOnce(StoreError) -> ApiError + '_ {
    move |e| match e {
        StoreError::NotFound => ApiError::NotFound(format!("person with id {id} not found")),
        other => other.into(),
    }
}

fn not_found_by_email(email: &str) -> impl FnOnce(StoreError) -> ApiError + '_ {
    move |e| match e {
        StoreError::NotFound => {
            ApiError::NotFound(format!("person with email {email} not found"))
        }
        other => other.into(),
    }
}

pub async fn insert(
    State(state): State<AppState>,
    Json(input): Json<PersonInput>,
) -> Result<(StatusCode, Json<PersonResponse>), ApiError> {
    validate_input(&input)?;

    let person = state.persons.insert(input).await?;
    info!("Person inserted: {}", person.id);

    Ok((StatusCode::CREATED, Json(person.into())))
}

pub async fn batch_insert(
    State(state): State<AppState>,
    Json(inputs): Json<Vec<PersonInput>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if inputs.is_empty() {
        return Err(ApiError::InvalidInput("batch must not be empty".to_string()));
    }
    for (i, input) in inputs.iter().enumerate() {
        validate_input(input)
            .map_err(|e| ApiError::InvalidInput(format!("entry {i}: {e}")))?;
    }

    let inserted = state.persons.insert_many(inputs).await?;
    info!("Batch inserted {} persons", inserted);

    Ok((StatusCode::CREATED, Json(json!({ "inserted": inserted }))))
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<PersonSummary>>, ApiError> {
    let persons = state.persons.list().await?;
    Ok(Json(persons.into_iter().map(PersonSummary::from).collect()))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PersonResponse>, ApiError> {
    let person = state
        .persons
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("person with id {id} not found")))?;

    Ok(Json(person.into()))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<PersonInput>,
) -> Result<Json<Value>, ApiError> {
    validate_input(&input)?;

    state
        .persons
        .update(&id, input)
        .await
        .map_err(not_found_by_id(&id))?;
    info!("Person updated: {}", id);

    Ok(Json(json!({ "message": format!("person {id} updated") })))
}

#[derive(Debug, Deserialize)]
pub struct MergeQuery {
    email: String,
}

pub async fn merge(
    State(state): State<AppState>,
    Query(query): Query<MergeQuery>,
    Json(patch): Json<PersonPatch>,
) -> Result<Json<PersonResponse>, ApiError> {
    if patch.clone().normalized().is_empty() {
        return Err(ApiError::InvalidInput(
            "no fields provided for update".to_string(),
        ));
    }

    let person = state
        .persons
        .merge(&query.email, patch)
        .await
        .map_err(not_found_by_email(&query.email))?;
    info!("Person merged: {}", query.email);

    Ok(Json(person.into()))
}

pub async fn delete_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .persons
        .delete(&id)
        .await
        .map_err(not_found_by_id(&id))?;
    info!("Person deleted: {}", id);

    Ok(Json(json!({ "message": format!("person {id} deleted") })))
}

pub async fn delete_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .persons
        .delete_by_email(&email)
        .await
        .map_err(not_found_by_email(&email))?;
    info!("Person deleted by email: {}", email);

    Ok(Json(
        json!({ "message": format!("person with email {email} deleted") }),
    ))
}

pub async fn clear(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let deleted = state.persons.clear().await?;
    info!("Cleared {} persons", deleted);

    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PersonSummary>>, ApiError> {
    let q = query.q.unwrap_or_default();
    let persons = state.persons.search(&q).await?;

    Ok(Json(persons.into_iter().map(PersonSummary::from).collect()))
}

#[cfg(test)]
mod tests {
    use crate::storage::MemoryStore;
    use crate::{build_router, AppState, Config};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        test_app_with_config(Config::for_tests()).await
    }

    async fn test_app_with_config(config: Config) -> Router {
        let db = Arc::new(
            crate::storage::Database::open_in_memory()
                .await
                .expect("in-memory db"),
        );
        let state = AppState {
            db,
            persons: Arc::new(MemoryStore::new()),
            config: Arc::new(config),
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

    fn person(name: &str, email: &str) -> Value {
        json!({ "name": name, "email": email, "password": "p" })
    }

    #[tokio::test]
    async fn insert_then_list_then_delete_by_email() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/persons", person("A", "a@x.com")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.clone().oneshot(get_request("/api/v1/persons")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = response_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["email"], "a@x.com");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/persons/by-email/a@x.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get_request("/api/v1/persons")).await.unwrap();
        let listed = response_json(response).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_email_or_password_rejected() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/persons",
                json!({ "name": "A", "email": "", "password": "p" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/persons",
                json!({ "name": "A", "email": "a@x.com", "password": "" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/persons",
                json!({ "name": "A", "email": "not-an-email", "password": "p" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let app = test_app().await;

        app.clone()
            .oneshot(json_request("POST", "/api/v1/persons", person("A", "a@x.com")))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/persons", person("B", "a@x.com")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn get_and_update_missing_id_not_found() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/persons/no-such-id"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/v1/persons/no-such-id",
                person("A", "a@x.com"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn fetch_by_id_returns_inserted_values_with_age() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/persons",
                json!({
                    "name": "A", "email": "a@x.com", "password": "p",
                    "birth_date": "1990-06-15"
                }),
            ))
            .await
            .unwrap();
        let created = response_json(response).await;
        let id = created["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/v1/persons/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched = response_json(response).await;
        assert_eq!(fetched["email"], "a@x.com");
        assert_eq!(fetched["birth_date"], "1990-06-15");
        assert!(fetched["age"].as_i64().unwrap() >= 34);
        assert!(fetched.get("password").is_none());
    }

    #[tokio::test]
    async fn merge_updates_only_supplied_fields() {
        let app = test_app().await;
        app.clone()
            .oneshot(json_request("POST", "/api/v1/persons", person("A", "a@x.com")))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/v1/persons?email=a@x.com",
                json!({ "name": "Anna", "phone": "555-0100" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let merged = response_json(response).await;
        assert_eq!(merged["name"], "Anna");
        assert_eq!(merged["phone"], "555-0100");
        assert_eq!(merged["email"], "a@x.com");

        let response = app
            .clone()
            .oneshot(json_request(
                "PATCH",
                "/api/v1/persons?email=ghost@x.com",
                json!({ "name": "X" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_search_returns_full_set() {
        let app = test_app().await;
        app.clone()
            .oneshot(json_request("POST", "/api/v1/persons", person("Ada", "ada@x.com")))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request("POST", "/api/v1/persons", person("Bob", "bob@x.com")))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/persons/search"))
            .await
            .unwrap();
        let hits = response_json(response).await;
        assert_eq!(hits.as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/persons/search?q=ada"))
            .await
            .unwrap();
        let hits = response_json(response).await;
        assert_eq!(hits.as_array().unwrap().len(), 1);
        assert_eq!(hits[0]["name"], "Ada");
    }

    #[tokio::test]
    async fn empty_batch_rejected_and_clear_reports_count() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/v1/persons/batch", json!([])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/persons/batch",
                json!([person("A", "a@x.com"), person("B", "b@x.com")]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/v1/persons")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cleared = response_json(response).await;
        assert_eq!(cleared["deleted"], 2);
    }

    #[tokio::test]
    async fn configured_access_key_is_enforced() {
        let mut config = Config::for_tests();
        config.access_key = Some("sekrit".to_string());
        let app = test_app_with_config(config).await;

        let response = app.clone().oneshot(get_request("/api/v1/persons")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/persons")
                    .header("x-access-key", "sekrit")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(get_request("/api/v1/persons?code=sekrit"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Health stays open
        let response = app.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
