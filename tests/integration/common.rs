//! Shared fixtures: a mock provider server, a scratch directory and a
//! config pointing the pipeline at both

use serde_json::json;
use species_image_seeder::config::{parse_config, PipelineConfig};
use species_image_seeder::pipeline::Orchestrator;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TAXONOMY_CSV: &str = "\
species_id,canonical_name,common_name,family,genus
vipera_berus,Vipera berus,Common European Adder,Viperidae,Vipera
crotalus_horridus,Crotalus horridus,Timber Rattlesnake,Viperidae,Crotalus
ghostus_nullus,Ghostus nullus,Phantom Snake,Colubridae,Ghostus
";

pub struct TestEnv {
    pub server: MockServer,
    pub dir: TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        let env = Self {
            server: MockServer::start().await,
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        };
        std::fs::write(env.path("taxonomy.csv"), TAXONOMY_CSV).expect("Failed to write taxonomy");
        env
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Config with fast pacing and every path inside the scratch dir
    pub fn config(&self, extra: &str) -> PipelineConfig {
        let uri = self.server.uri();
        let dir = self.dir.path().display();
        let toml = format!(
            r#"
allowed_licenses = ["CC0", "CC BY"]
disallowed_licenses = ["All Rights Reserved"]

[rate_limits.inaturalist]
requests_per_minute = 60000
delay_between_requests = 0

[rate_limits.commons]
requests_per_minute = 60000
delay_between_requests = 0

[rate_limits.gbif]
requests_per_minute = 60000
delay_between_requests = 0

[image_requirements]
min_dimension = 800
desired_per_species = 4

[image_requirements.max_per_source_per_species]
inaturalist = 2
commons = 2
gbif = 2

[scoring]
dimension_boost = 0.2
faves_boost = 0.1

[scoring.source_weights]
inaturalist = 0.9
commons = 0.7
gbif = 0.6

[cache]
enable_disk_caching = true
cache_ttl_hours = 24

[http]
timeout_secs = 5
max_retries = 2
retry_base_delay_ms = 10
retry_max_delay_ms = 40

[providers]
inaturalist_base_url = "{uri}/inat"
commons_api_url = "{uri}/w/api.php"
gbif_base_url = "{uri}/gbif"

[paths]
taxonomy = "{dir}/taxonomy.csv"
cache_dir = "{dir}/cache"
state_dir = "{dir}/state"
manifest = "{dir}/out/species_images.json"
media_index = "{dir}/stage/media_index.jsonl"
qa_report = "{dir}/reports/qa.json"
qa_summary = "{dir}/reports/qa.md"
image_dir = "{dir}/images"

{extra}
"#
        );
        parse_config(&toml).expect("Test config should parse")
    }

    pub fn orchestrator(&self, extra: &str) -> Orchestrator {
        Orchestrator::from_config(self.config(extra), "test-hash", false)
            .expect("Failed to build orchestrator")
    }

    pub fn read_json(&self, name: &str) -> serde_json::Value {
        read_json(&self.path(name))
    }

    /// Requests received so far whose query has `key=value`
    pub async fn requests_with(&self, key: &str, value: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| has_query(r, key, value))
            .count()
    }

    /// Mounts the provider responses used by the pipeline tests
    ///
    /// Vipera berus resolves and has two usable iNaturalist photos (plus one
    /// all-rights-reserved photo) and one Commons file. Crotalus horridus
    /// resolves and has one usable GBIF image (plus one that is too small).
    /// Ghostus nullus resolves nowhere.
    pub async fn mount_providers(&self) {
        let server = &self.server;

        // iNaturalist taxon autocomplete
        for (name, id) in [("Vipera berus", 30), ("Crotalus horridus", 31)] {
            Mock::given(method("GET"))
                .and(path("/inat/taxa/autocomplete"))
                .and(query_param("q", name))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "results": [
                        { "id": id + 1000, "name": format!("{} ssp", name), "rank": "subspecies" },
                        { "id": id, "name": name, "rank": "species" }
                    ]
                })))
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/inat/taxa/autocomplete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(server)
            .await;

        // iNaturalist observations
        Mock::given(method("GET"))
            .and(path("/inat/observations"))
            .and(query_param("taxon_id", "30"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "id": 9001,
                        "quality_grade": "research",
                        "faves_count": 12,
                        "photos": [
                            {
                                "id": 1,
                                "url": "https://static.inaturalist.org/photos/1/square.jpg",
                                "original_dimensions": { "width": 2048, "height": 1536 },
                                "attribution": "(c) Jane Doe, some rights reserved (CC BY)",
                                "license_code": "cc-by"
                            },
                            {
                                "id": 2,
                                "url": "https://static.inaturalist.org/photos/2/square.jpg",
                                "original_dimensions": { "width": 1200, "height": 900 },
                                "attribution": "(c) John Roe, all rights reserved",
                                "license_code": "all-rights-reserved"
                            }
                        ]
                    },
                    {
                        "id": 9002,
                        "faves_count": 3,
                        "photos": [
                            {
                                "id": 3,
                                "url": "https://static.inaturalist.org/photos/3/square.jpg",
                                "original_dimensions": { "width": 1000, "height": 1000 },
                                "license_code": "cc0"
                            }
                        ]
                    }
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/inat/observations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(server)
            .await;

        // Commons search and file info
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "search"))
            .and(query_param("srsearch", "Vipera berus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "search": [ { "title": "File:Vipera berus adult.jpg" } ] }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "search": [] }
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("titles", "File:Vipera berus adult.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "pages": { "42": { "imageinfo": [ {
                    "url": "https://upload.wikimedia.org/wikipedia/commons/a/ab/Vipera_berus_adult.jpg",
                    "descriptionurl": "https://commons.wikimedia.org/wiki/File:Vipera_berus_adult.jpg",
                    "width": 3000,
                    "height": 2000,
                    "extmetadata": {
                        "LicenseShortName": { "value": "CC BY-SA 4.0" },
                        "Artist": { "value": "<a href=\"//commons.wikimedia.org/wiki/User:Adder\">Adder Fan</a>" }
                    }
                } ] } } }
            })))
            .mount(server)
            .await;

        // GBIF occurrences
        Mock::given(method("GET"))
            .and(path("/gbif/occurrence/search"))
            .and(query_param("scientificName", "Crotalus horridus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "key": 777,
                        "scientificName": "Crotalus horridus Linnaeus, 1758",
                        "license": "http://creativecommons.org/publicdomain/zero/1.0/legalcode",
                        "media": [
                            {
                                "type": "StillImage",
                                "format": "image/jpeg",
                                "identifier": "https://inaturalist-open-data.s3.amazonaws.com/photos/77/original.jpg",
                                "creator": "Sam Field",
                                "width": 1600,
                                "height": 1200
                            },
                            {
                                "type": "StillImage",
                                "identifier": "https://example.org/tiny.jpg",
                                "width": 400,
                                "height": 300
                            }
                        ]
                    }
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gbif/occurrence/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(server)
            .await;
    }
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    serde_json::from_str(&raw).expect("File should hold valid JSON")
}

fn has_query(request: &Request, key: &str, value: &str) -> bool {
    request
        .url
        .query_pairs()
        .any(|(k, v)| k == key && v == value)
}
