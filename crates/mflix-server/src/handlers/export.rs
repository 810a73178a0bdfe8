//! Export handlers
//!
//! Snapshots of the current record set, reformatted as downloadable CSV or
//! JSON. Regenerated on every request, never persisted.

use anyhow::Context;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::AppState;
use mflix_types::{Person, PersonSummary};

pub async fn persons_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let persons = state.persons.list().await?;
    let body = persons_to_csv(&persons);

    Ok(download(body, "text/csv", "persons.csv"))
}

pub async fn persons_json(State(state): State<AppState>) -> Result<Response, ApiError> {
    let persons = state.persons.list().await?;
    let summaries: Vec<PersonSummary> = persons.into_iter().map(PersonSummary::from).collect();
    let body = serde_json::to_string_pretty(&summaries).context("serializing person export")?;

    Ok(download(body, "application/json", "persons.json"))
}

pub async fn movies_json(State(state): State<AppState>) -> Result<Response, ApiError> {
    let movies = state.db.all_movies().await?;
    let body = serde_json::to_string_pretty(&movies).context("serializing movie export")?;

    Ok(download(body, "application/json", "movies.json"))
}

fn download(body: String, content_type: &str, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

fn persons_to_csv(persons: &[Person]) -> String {
    let mut out = String::from("id,name,email\n");
    for p in persons {
        out.push_str(&format!(
            "{},{},{}\n",
            csv_field(&p.id),
            csv_field(&p.name),
            csv_field(&p.email)
        ));
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn person(name: &str, email: &str) -> Person {
        Person {
            id: "id-1".to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password: "p".to_string(),
            phone: None,
            address: None,
            birth_date: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn csv_row_count_matches_record_count() {
        let persons = vec![person("A", "a@x.com"), person("B", "b@x.com")];
        let csv = persons_to_csv(&persons);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), persons.len() + 1);
        assert_eq!(lines[0], "id,name,email");
        assert!(lines[1].ends_with("a@x.com"));
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        let persons = vec![person("Lovelace, Ada", "ada@x.com")];
        let csv = persons_to_csv(&persons);

        assert!(csv.contains("\"Lovelace, Ada\""));
    }

    #[test]
    fn csv_quotes_are_doubled() {
        assert_eq!(csv_field(r#"say "hi""#), r#""say ""hi""""#);
    }
}
