use std::collections::HashSet;

use anyhow::{Result, bail};
use axum::{extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use arosa_types::api::{
    DEFAULT_SPECIES_PAGE_SIZE, Envelope, MAX_SPECIES_PAGE_SIZE, SpeciesPayload, SpeciesQuery,
};
use arosa_types::models::Species;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::{Json, Query};

/// Client for the Pl@ntNet species catalogue.
pub struct SpeciesClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// One catalogue entry as returned upstream; only the fields we keep.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamSpecies {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    common_names: Vec<String>,
    #[serde(default)]
    scientific_name_without_author: String,
    #[serde(default)]
    scientific_name_authorship: String,
    #[serde(default)]
    gbif_id: Option<i64>,
    #[serde(default)]
    powo_id: Option<String>,
}

impl SpeciesClient {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// French common names, one page of the catalogue.
    pub async fn fetch(&self, page: u32, page_size: u32) -> Result<Vec<Species>> {
        if self.api_key.is_empty() {
            bail!("Pl@ntNet API key is not configured");
        }

        let url = format!("{}/v2/species", self.base_url);
        let entries: Vec<UpstreamSpecies> = self
            .http
            .get(&url)
            .query(&[
                ("lang", "fr".to_string()),
                ("type", "kt".to_string()),
                ("pageSize", page_size.to_string()),
                ("page", page.to_string()),
                ("api-key", self.api_key.clone()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Pl@ntNet returned {} species for page {}", entries.len(), page);
        Ok(select_species(entries))
    }
}

/// Drops entries without a common name and keeps the first entry for each
/// common name.
fn select_species(entries: Vec<UpstreamSpecies>) -> Vec<Species> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter_map(|entry| {
            let common_name = entry.common_names.into_iter().next()?;
            if !seen.insert(common_name.clone()) {
                return None;
            }
            let id = match entry.id {
                Some(Value::String(s)) => s,
                Some(Value::Number(n)) => n.to_string(),
                _ => entry.scientific_name_without_author.clone(),
            };
            Some(Species {
                id,
                common_name,
                scientific_name: entry.scientific_name_without_author,
                scientific_author: entry.scientific_name_authorship,
                gbif_id: entry.gbif_id,
                powo_id: entry.powo_id,
            })
        })
        .collect()
}

/// GET /species
pub async fn search_species(
    State(state): State<AppState>,
    Query(query): Query<SpeciesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_SPECIES_PAGE_SIZE)
        .clamp(1, MAX_SPECIES_PAGE_SIZE);

    let species = state
        .species
        .fetch(page, page_size)
        .await
        .map_err(ApiError::internal("Recherche d'espèces échouée"))?;

    Ok(Json(Envelope::ok("Espèces trouvées", SpeciesPayload { species })))
}
