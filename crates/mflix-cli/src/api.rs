//! API client for the mflix server

use anyhow::{Context, Result};
use mflix_types::{GenreCount, Movie, PersonInput, PersonSummary};
use reqwest::{Client as ReqwestClient, RequestBuilder};
use serde::de::DeserializeOwned;

pub struct Client {
    http: ReqwestClient,
    base_url: String,
    access_key: Option<String>,
}

impl Client {
    pub fn new(base_url: String, access_key: Option<String>) -> Self {
        Self {
            http: ReqwestClient::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            access_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_key {
            Some(key) => request.header("x-access-key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = self
            .with_key(request)
            .send()
            .await
            .context("Failed to reach server")?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
            anyhow::bail!(
                "{} ({})",
                err["error"].as_str().unwrap_or("request failed"),
                status
            );
        }
        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let body = self.send(self.http.get(self.url(path)).query(query)).await?;
        serde_json::from_str(&body).context("Failed to parse server response")
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        self.get_json("/health", &[]).await
    }

    // Persons

    pub async fn person_list(&self) -> Result<Vec<PersonSummary>> {
        self.get_json("/api/v1/persons", &[]).await
    }

    pub async fn person_insert(&self, input: &PersonInput) -> Result<serde_json::Value> {
        let body = self
            .send(self.http.post(self.url("/api/v1/persons")).json(input))
            .await?;
        serde_json::from_str(&body).context("Failed to parse server response")
    }

    pub async fn person_get(&self, id: &str) -> Result<serde_json::Value> {
        self.get_json(&format!("/api/v1/persons/{id}"), &[]).await
    }

    pub async fn person_delete(&self, id: &str) -> Result<()> {
        self.send(self.http.delete(self.url(&format!("/api/v1/persons/{id}"))))
            .await?;
        Ok(())
    }

    pub async fn person_delete_by_email(&self, email: &str) -> Result<()> {
        self.send(
            self.http
                .delete(self.url(&format!("/api/v1/persons/by-email/{email}"))),
        )
        .await?;
        Ok(())
    }

    pub async fn person_search(&self, query: &str) -> Result<Vec<PersonSummary>> {
        self.get_json("/api/v1/persons/search", &[("q", query.to_string())])
            .await
    }

    /// Raw export body, CSV or JSON, as served by the export endpoints.
    pub async fn person_export(&self, format: &str) -> Result<String> {
        self.send(
            self.http
                .get(self.url(&format!("/api/v1/persons/export/{format}"))),
        )
        .await
    }

    // Movies

    pub async fn movie_list(&self, page: i64, page_size: i64) -> Result<Vec<Movie>> {
        self.get_json(
            "/api/v1/movies",
            &[
                ("page", page.to_string()),
                ("page_size", page_size.to_string()),
            ],
        )
        .await
    }

    pub async fn movie_get(&self, id: &str) -> Result<Movie> {
        self.get_json(&format!("/api/v1/movies/{id}"), &[]).await
    }

    pub async fn movie_search(
        &self,
        title: Option<&str>,
        genre: Option<&str>,
        year: Option<i32>,
    ) -> Result<Vec<Movie>> {
        let mut query = Vec::new();
        if let Some(title) = title {
            query.push(("title", title.to_string()));
        }
        if let Some(genre) = genre {
            query.push(("genre", genre.to_string()));
        }
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }

        self.get_json("/api/v1/movies/search", &query).await
    }

    pub async fn movie_genres(&self) -> Result<Vec<GenreCount>> {
        self.get_json("/api/v1/movies/genres", &[]).await
    }
}
