//! Harvester term iteration against mock providers

use crate::common::TestEnv;
use serde_json::json;
use species_image_seeder::harvest::{CommonsHarvester, GbifHarvester, Harvester};
use species_image_seeder::http::CachedHttpClient;
use species_image_seeder::model::{Source, SpeciesTaxonomy};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn species(id: &str, canonical_name: &str) -> SpeciesTaxonomy {
    SpeciesTaxonomy {
        species_id: id.to_string(),
        canonical_name: canonical_name.to_string(),
        common_name: String::new(),
        family: "Viperidae".to_string(),
        genus: String::new(),
    }
}

#[tokio::test]
async fn test_commons_stops_searching_once_cap_is_met() {
    let env = TestEnv::new().await;
    let server = &env.server;

    let titles = ["File:Adder 1.jpg", "File:Adder 2.jpg", "File:Adder 3.jpg"];
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "search"))
        .and(query_param("srsearch", "Vipera berus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "search": titles.iter().map(|t| json!({ "title": t })).collect::<Vec<_>>() }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("list", "search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": { "search": [ { "title": "File:Other.jpg" } ] }
        })))
        .mount(server)
        .await;
    for (i, title) in titles.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("titles", *title))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "query": { "pages": { "1": { "imageinfo": [ {
                    "url": format!("https://upload.wikimedia.org/adder{}.jpg", i),
                    "width": 2000,
                    "height": 1500,
                    "extmetadata": { "LicenseShortName": { "value": "CC0" } }
                } ] } } }
            })))
            .mount(server)
            .await;
    }

    let config = env.config("");
    let client = Arc::new(CachedHttpClient::from_config(&config, false).unwrap());
    let harvester = CommonsHarvester::from_config(&config, client);

    let candidates = harvester
        .harvest_for_species(&species("vipera_berus", "Vipera berus"), None)
        .await;

    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.source == Source::Commons));
    let searches = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.query_pairs().any(|(k, _)| k == "srsearch"))
        .count();
    assert_eq!(searches, 1);
    assert_eq!(env.requests_with("titles", "File:Adder 3.jpg").await, 0);
}

#[tokio::test]
async fn test_gbif_skips_binomial_once_cap_is_met() {
    let env = TestEnv::new().await;

    let media: Vec<_> = (0..3)
        .map(|i| {
            json!({
                "type": "StillImage",
                "identifier": format!("https://example.org/adder{}.jpg", i),
                "width": 1600,
                "height": 1200
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/gbif/occurrence/search"))
        .and(query_param("scientificName", "Vipera berus berus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [ { "key": 1, "license": "CC0", "media": media } ]
        })))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gbif/occurrence/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&env.server)
        .await;

    let config = env.config("");
    let client = Arc::new(CachedHttpClient::from_config(&config, false).unwrap());
    let harvester = GbifHarvester::from_config(&config, client);

    let candidates = harvester
        .harvest_for_species(&species("vipera_berus_berus", "Vipera berus berus"), None)
        .await;

    assert_eq!(candidates.len(), 2);
    assert_eq!(env.requests_with("scientificName", "Vipera berus berus").await, 1);
    assert_eq!(env.requests_with("scientificName", "Vipera berus").await, 0);
}
