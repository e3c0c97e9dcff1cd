//! Wikimedia Commons harvester
//!
//! Searches the File namespace with every name variant, then looks up each
//! hit's image info and extended metadata to recover license, author and size.

use crate::config::PipelineConfig;
use crate::harvest::license::{license_url, normalize_license};
use crate::harvest::terms::search_terms;
use crate::harvest::{endpoint, CandidateFilter, Harvester};
use crate::http::{CachedHttpClient, Pacer};
use crate::model::{CandidateMetadata, MediaCandidate, ResolvedTaxon, Source, SpeciesTaxonomy};
use crate::HttpResult;
use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const LICENSE_FIELDS: [&str; 4] = ["License", "LicenseShortName", "UsageTerms", "Copyrighted"];
const AUTHOR_FIELDS: [&str; 4] = ["Artist", "Author", "Creator", "Photographer"];

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    query: Option<SearchQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchHit {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoResponse {
    query: Option<InfoQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoQuery {
    #[serde(default)]
    pages: BTreeMap<String, InfoPage>,
}

#[derive(Debug, Default, Deserialize)]
struct InfoPage {
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
    extmetadata: Option<ExtMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageInfo {
    url: Option<String>,
    descriptionurl: Option<String>,
    thumburl: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    extmetadata: Option<ExtMetadata>,
}

type ExtMetadata = HashMap<String, ExtValue>;

#[derive(Debug, Default, Deserialize)]
struct ExtValue {
    value: Option<serde_json::Value>,
}

/// File details recovered from one image-info lookup
#[derive(Debug, Clone, PartialEq)]
struct CommonsFile {
    title: String,
    url: String,
    page_url: Option<String>,
    thumb_url: Option<String>,
    author: String,
    license: String,
    license_url: String,
    width: Option<u32>,
    height: Option<u32>,
    description: String,
}

/// Harvester for Wikimedia Commons files
pub struct CommonsHarvester {
    client: Arc<CachedHttpClient>,
    api_url: String,
    filter: CandidateFilter,
    pacer: Pacer,
}

impl CommonsHarvester {
    pub fn new(
        client: Arc<CachedHttpClient>,
        api_url: impl Into<String>,
        filter: CandidateFilter,
        pacer: Pacer,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            filter,
            pacer,
        }
    }

    pub fn from_config(config: &PipelineConfig, client: Arc<CachedHttpClient>) -> Self {
        Self::new(
            client,
            config.providers.commons_api_url.clone(),
            CandidateFilter::from_config(config, Source::Commons),
            Pacer::new(config.courtesy_delay(Source::Commons)),
        )
    }

    async fn search_titles(&self, term: &str) -> HttpResult<Vec<String>> {
        let url = endpoint(
            &self.api_url,
            "",
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", term),
                ("format", "json"),
                ("srlimit", "50"),
                ("srnamespace", "6"),
            ],
        )?;

        let response: SearchResponse = self.client.get(&url, Source::Commons.as_str()).await?;

        Ok(response
            .query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hit| hit.title)
            .filter(|title| !title.is_empty())
            .collect())
    }

    async fn file_info(&self, title: &str) -> HttpResult<Option<CommonsFile>> {
        let url = endpoint(
            &self.api_url,
            "",
            &[
                ("action", "query"),
                ("titles", title),
                ("prop", "imageinfo"),
                ("iiprop", "url|size|extmetadata"),
                ("format", "json"),
            ],
        )?;

        let response: InfoResponse = self.client.get(&url, Source::Commons.as_str()).await?;

        let Some(page) = response
            .query
            .and_then(|q| q.pages.into_values().next())
        else {
            return Ok(None);
        };

        Ok(parse_file(title, page))
    }

    fn to_candidate(&self, species: &SpeciesTaxonomy, file: CommonsFile) -> MediaCandidate {
        let mut candidate = MediaCandidate::new(Source::Commons, file.url.clone());
        candidate.thumb_url = Some(file.thumb_url.unwrap_or_else(|| file.url.clone()));
        candidate.original_page = file.page_url.unwrap_or_else(|| page_url_for(&file.title));
        candidate.author = file.author;
        candidate.license = file.license;
        candidate.license_url = file.license_url;
        candidate.width = file.width;
        candidate.height = file.height;
        candidate.species_id = Some(species.species_id.clone());
        candidate.metadata = CandidateMetadata::Commons {
            title: file.title,
            description: file.description,
        };
        candidate
    }
}

#[async_trait]
impl Harvester for CommonsHarvester {
    fn source(&self) -> Source {
        Source::Commons
    }

    async fn harvest_for_species(
        &self,
        species: &SpeciesTaxonomy,
        _taxon: Option<&ResolvedTaxon>,
    ) -> Vec<MediaCandidate> {
        self.pacer.pause().await;

        let mut accepted = Vec::new();
        let mut seen_titles = HashSet::new();

        'terms: for term in search_terms(&species.canonical_name) {
            if self.filter.is_full(&accepted) {
                break;
            }

            let titles = match self.search_titles(&term).await {
                Ok(titles) => titles,
                Err(e) => {
                    tracing::warn!("Failed to search Commons for \"{}\": {}", term, e);
                    continue;
                }
            };

            for title in titles {
                if self.filter.is_full(&accepted) {
                    break 'terms;
                }
                if !seen_titles.insert(title.clone()) {
                    continue;
                }

                let file = match self.file_info(&title).await {
                    Ok(Some(file)) => file,
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::warn!("Failed to get file info for {}: {}", title, e);
                        continue;
                    }
                };

                if !self.filter.license_ok(&file.license)
                    || !self.filter.dimensions_ok(file.width, file.height)
                {
                    continue;
                }

                accepted.push(self.to_candidate(species, file));
            }
        }

        accepted
    }
}

fn parse_file(title: &str, page: InfoPage) -> Option<CommonsFile> {
    let InfoPage {
        imageinfo,
        extmetadata: page_meta,
    } = page;
    let info = imageinfo.into_iter().next()?;
    let url = info.url.filter(|u| !u.is_empty())?;
    let meta = info.extmetadata.or(page_meta)?;

    let raw_license = LICENSE_FIELDS
        .iter()
        .find_map(|field| ext_str(&meta, field))?;
    let license = normalize_license(&raw_license);
    let license_url = ext_str(&meta, "LicenseUrl").unwrap_or_else(|| license_url(&license));

    let author = AUTHOR_FIELDS
        .iter()
        .find_map(|field| ext_str(&meta, field))
        .unwrap_or_else(|| "Unknown".to_string());

    Some(CommonsFile {
        title: title.to_string(),
        url,
        page_url: info.descriptionurl,
        thumb_url: info.thumburl,
        author,
        license,
        license_url,
        width: info.width,
        height: info.height,
        description: ext_str(&meta, "ImageDescription").unwrap_or_default(),
    })
}

/// Plain-text value of an extmetadata field, if present and non-empty
fn ext_str(meta: &ExtMetadata, field: &str) -> Option<String> {
    let value = meta.get(field)?.value.as_ref()?;
    let text = match value {
        serde_json::Value::String(s) => strip_html(s),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Text content of an HTML fragment with whitespace collapsed
fn strip_html(s: &str) -> String {
    let fragment = Html::parse_fragment(s);
    let text: String = fragment.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn page_url_for(title: &str) -> String {
    let encoded: String =
        url::form_urlencoded::byte_serialize(title.replace(' ', "_").as_bytes()).collect();
    format!("https://commons.wikimedia.org/wiki/{}", encoded)
}
