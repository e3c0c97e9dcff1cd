//! End-to-end runs of the orchestrator against mock providers

use crate::common::{read_json, TestEnv};
use species_image_seeder::model::SpeciesImages;
use species_image_seeder::output::image_destination;
use species_image_seeder::pipeline::{
    Orchestrator, PipelineProgress, ProgressStore, RunMode, RunOutcome, RunStage,
};
use species_image_seeder::SeedError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn manifest(env: &TestEnv) -> Vec<SpeciesImages> {
    serde_json::from_value(env.read_json("out/species_images.json"))
        .expect("Manifest should deserialize")
}

fn progress(env: &TestEnv, mode: &str) -> PipelineProgress {
    serde_json::from_value(env.read_json(&format!("state/{}-progress.json", mode)))
        .expect("Progress should deserialize")
}

#[tokio::test]
async fn test_full_run_writes_manifest_index_and_qa() {
    let env = TestEnv::new().await;
    env.mount_providers().await;

    let mut orchestrator = env.orchestrator("");
    let outcome = orchestrator
        .run(&RunMode::Full, false, false)
        .await
        .expect("Full run should succeed");
    assert_eq!(orchestrator.stage(), RunStage::Done);

    let RunOutcome::Completed { stats, report } = outcome else {
        panic!("Expected a completed run");
    };
    assert_eq!(stats.species_processed, 3);
    assert_eq!(stats.candidates_harvested, 4);
    assert_eq!(stats.images_selected, 4);

    // Manifest: sorted by id, absent species produce no entry
    let entries = manifest(&env);
    let ids: Vec<&str> = entries.iter().map(|e| e.species_id.as_str()).collect();
    assert_eq!(ids, vec!["crotalus_horridus", "vipera_berus"]);

    let viper = &entries[1];
    assert_eq!(viper.images.len(), 3);
    assert!(viper.images.len() <= 4);
    let hero = viper.hero().expect("Viper should have a hero");
    assert_eq!(
        hero.full_url,
        "https://static.inaturalist.org/photos/1/medium.jpg"
    );
    assert!(viper
        .images
        .iter()
        .all(|img| img.license != "all-rights-reserved"));
    assert!(viper.images.iter().all(|img| img.content_hash.is_some()));

    let rattler = &entries[0];
    assert_eq!(rattler.images.len(), 1);
    assert_eq!(rattler.images[0].license, "CC0");
    assert_eq!(rattler.images[0].author, "Sam Field");

    // Media index holds every accepted candidate before selection
    let index = std::fs::read_to_string(env.path("stage/media_index.jsonl")).unwrap();
    assert_eq!(index.lines().count(), 4);

    // QA report covers the whole species list
    assert_eq!(report.coverage.total_species, 3);
    assert_eq!(report.coverage.species_with_0_images, 1);
    assert_eq!(report.coverage.species_with_1_images, 1);
    assert_eq!(report.coverage.species_with_3_plus_images, 1);
    assert_eq!(report.license_compliance.cc0_count, 2);
    assert_eq!(report.license_compliance.cc_by_count, 1);
    assert_eq!(report.license_compliance.cc_by_sa_count, 1);
    assert_eq!(report.license_compliance.disallowed_count, 0);
    assert_eq!(report.errors.taxon_errors, 1);
    assert_eq!(report.errors.api_errors, 0);
    assert!(report.validation.schema_valid);

    let qa = env.read_json("reports/qa.json");
    assert_eq!(qa["coverage"]["species_with_0_images"], 1);
    let summary = std::fs::read_to_string(env.path("reports/qa.md")).unwrap();
    assert!(summary.contains("## Coverage"));

    // Side cache of resolved taxa
    let taxa = env.read_json("state/taxa.json");
    assert_eq!(taxa.as_array().map(Vec::len), Some(2));

    let full = progress(&env, "full");
    assert_eq!(full.completed.len(), 3);
}

#[tokio::test]
async fn test_second_run_is_served_from_cache() {
    let env = TestEnv::new().await;
    env.mount_providers().await;

    env.orchestrator("")
        .run(&RunMode::Full, false, false)
        .await
        .expect("First run should succeed");
    let after_first = env.server.received_requests().await.unwrap().len();

    env.orchestrator("")
        .run(&RunMode::Full, false, false)
        .await
        .expect("Second run should succeed");
    let after_second = env.server.received_requests().await.unwrap().len();

    assert_eq!(after_first, after_second);
    assert_eq!(manifest(&env).len(), 2);
}

#[tokio::test]
async fn test_resume_skips_completed_species() {
    let env = TestEnv::new().await;
    env.mount_providers().await;

    // A previous run finished the viper and died while on the rattlesnake
    let store = ProgressStore::new(env.path("state/incremental-progress.json"));
    let mut interrupted = PipelineProgress::new("test-hash", 3);
    interrupted.complete("vipera_berus");
    interrupted.start("crotalus_horridus");
    store.save(&interrupted).await.unwrap();

    let mut orchestrator = env.orchestrator("[harvesting]\nenable_commons = false");
    orchestrator
        .run(&RunMode::Resume, false, false)
        .await
        .expect("Resumed run should succeed");

    assert_eq!(env.requests_with("q", "Vipera berus").await, 0);
    assert_eq!(env.requests_with("q", "Crotalus horridus").await, 1);

    let resumed = progress(&env, "incremental");
    assert!(resumed.is_completed("vipera_berus"));
    assert!(resumed.is_completed("crotalus_horridus"));
    assert!(resumed.current.is_none());

    // The phantom species missed taxon resolution but still finished
    assert!(resumed.is_completed("ghostus_nullus"));
    assert_eq!(resumed.completed.len(), 3);
    assert_eq!(resumed.errors.len(), 1);
    assert!(resumed.errors[0].contains("ghostus_nullus"));
    assert_eq!(env.requests_with("scientificName", "Ghostus nullus").await, 1);

    let remaining = env
        .orchestrator("")
        .run(&RunMode::ListRemaining, false, false)
        .await
        .unwrap();
    match remaining {
        RunOutcome::Remaining(ids) => assert!(ids.is_empty()),
        other => panic!("Unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_unresolved_species_still_harvests_name_search_providers() {
    let env = TestEnv::new().await;

    // Mounted ahead of the generic GBIF fallback so it answers first
    Mock::given(method("GET"))
        .and(path("/gbif/occurrence/search"))
        .and(query_param("scientificName", "Ghostus nullus"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [ {
                "key": 4040,
                "license": "CC0",
                "media": [ {
                    "type": "StillImage",
                    "identifier": "https://example.org/ghost.jpg",
                    "width": 1600,
                    "height": 1200
                } ]
            } ]
        })))
        .mount(&env.server)
        .await;
    env.mount_providers().await;

    env.orchestrator("[harvesting]\nenable_commons = false")
        .run(&RunMode::Resume, false, false)
        .await
        .expect("Resumed run should succeed");

    let entries = manifest(&env);
    let ghost = entries
        .iter()
        .find(|e| e.species_id == "ghostus_nullus")
        .expect("Unresolved species should still reach the manifest");
    assert_eq!(ghost.images[0].full_url, "https://example.org/ghost.jpg");

    let resumed = progress(&env, "incremental");
    assert_eq!(resumed.completed.len(), 3);
    assert_eq!(resumed.errors.len(), 1);
}

#[tokio::test]
async fn test_corrupt_manifest_and_progress_do_not_abort() {
    let env = TestEnv::new().await;
    env.mount_providers().await;

    std::fs::create_dir_all(env.path("out")).unwrap();
    std::fs::write(env.path("out/species_images.json"), "[{").unwrap();
    std::fs::create_dir_all(env.path("state")).unwrap();
    std::fs::write(env.path("state/incremental-progress.json"), "{\"completed\": [").unwrap();

    env.orchestrator("")
        .run(&RunMode::Full, false, false)
        .await
        .expect("Full run should replace an unreadable manifest");
    assert_eq!(manifest(&env).len(), 2);

    std::fs::write(env.path("out/species_images.json"), "[{").unwrap();
    env.orchestrator("")
        .run(&RunMode::Resume, false, false)
        .await
        .expect("Resume should start over from an unreadable checkpoint");

    assert_eq!(progress(&env, "incremental").completed.len(), 3);
    assert_eq!(manifest(&env).len(), 2);
}

#[tokio::test]
async fn test_interrupted_and_resumed_run_completes_every_species_once() {
    let env = TestEnv::new().await;
    env.mount_providers().await;
    let extra = "[harvesting]\nenable_inaturalist = false";

    // First invocation handles a single batch, as if stopped afterwards
    env.orchestrator(extra)
        .run(&RunMode::Batch(1), false, false)
        .await
        .unwrap();
    let first = progress(&env, "batch");
    assert_eq!(first.completed.len(), 1);

    // Resuming in batch mode finishes the rest
    env.orchestrator(extra)
        .run(&RunMode::Batch(10), false, false)
        .await
        .unwrap();
    let done = progress(&env, "batch");
    assert_eq!(done.completed.len(), 3);
    assert!(done.errors.is_empty());

    // Each species harvested from GBIF exactly once across both runs
    assert_eq!(env.requests_with("scientificName", "Vipera berus").await, 1);
    assert_eq!(env.requests_with("scientificName", "Crotalus horridus").await, 1);
    assert_eq!(env.requests_with("scientificName", "Ghostus nullus").await, 1);

    // A third run finds nothing left
    env.orchestrator(extra)
        .run(&RunMode::Batch(10), false, false)
        .await
        .unwrap();
    assert_eq!(env.requests_with("scientificName", "Vipera berus").await, 1);

    // --fresh starts over
    env.orchestrator(extra)
        .run(&RunMode::Batch(1), true, false)
        .await
        .unwrap();
    assert_eq!(progress(&env, "batch").completed.len(), 1);
}

#[tokio::test]
async fn test_full_run_fails_when_nothing_resolves() {
    let env = TestEnv::new().await;
    env.mount_providers().await;
    std::fs::write(
        env.path("taxonomy.csv"),
        "species_id,canonical_name,common_name,family,genus\n\
         ghostus_nullus,Ghostus nullus,Phantom Snake,Colubridae,Ghostus\n",
    )
    .unwrap();

    let mut orchestrator = env.orchestrator("");
    let err = orchestrator
        .run(&RunMode::Full, false, false)
        .await
        .unwrap_err();

    assert!(matches!(err, SeedError::NoTaxaResolved { .. }));
    assert_eq!(orchestrator.stage(), RunStage::Failed);
    assert!(!env.path("out/species_images.json").exists());
}

#[tokio::test]
async fn test_single_species_merges_into_existing_manifest() {
    let env = TestEnv::new().await;
    env.mount_providers().await;

    let existing = serde_json::json!([
        {
            "species_id": "crotalus_horridus",
            "canonical_name": "Crotalus horridus",
            "images": [ {
                "source": "gbif",
                "full_url": "https://example.org/old.jpg",
                "original_page": "https://example.org/old",
                "author": "Old Author",
                "license": "CC0",
                "license_url": "https://creativecommons.org/publicdomain/zero/1.0/",
                "width": 1000,
                "height": 1000,
                "metadata": { "provider": "gbif" }
            } ],
            "hero_index": 0
        }
    ]);
    std::fs::create_dir_all(env.path("out")).unwrap();
    std::fs::write(
        env.path("out/species_images.json"),
        serde_json::to_vec_pretty(&existing).unwrap(),
    )
    .unwrap();

    env.orchestrator("")
        .run(&RunMode::Single("vipera_berus".to_string()), false, false)
        .await
        .expect("Single run should succeed");

    let entries = manifest(&env);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].species_id, "crotalus_horridus");
    assert_eq!(entries[0].images[0].full_url, "https://example.org/old.jpg");
    assert_eq!(entries[1].species_id, "vipera_berus");

    // QA still covers every species, not just the one processed
    let qa = read_json(&env.path("reports/qa.json"));
    assert_eq!(qa["coverage"]["total_species"], 3);
    assert_eq!(qa["coverage"]["species_with_0_images"], 1);
}

#[tokio::test]
async fn test_unknown_single_species_is_an_error() {
    let env = TestEnv::new().await;

    let err = env
        .orchestrator("")
        .run(&RunMode::Single("naja_naja".to_string()), false, false)
        .await
        .unwrap_err();

    assert!(matches!(err, SeedError::UnknownSpecies(id) if id == "naja_naja"));
    assert!(env.server.received_requests().await.unwrap().is_empty());
}

fn gbif_image(identifier: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "results": [ {
            "key": 1,
            "license": "CC0",
            "media": [ {
                "type": "StillImage",
                "identifier": identifier,
                "width": 1600,
                "height": 1200
            } ]
        } ]
    }))
}

fn saved_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

const GBIF_ONLY: &str = "[harvesting]\nenable_inaturalist = false\nenable_commons = false";

#[tokio::test]
async fn test_downloads_selected_images() {
    let env = TestEnv::new().await;
    let uri = env.server.uri();

    Mock::given(method("GET"))
        .and(path("/gbif/occurrence/search"))
        .respond_with(gbif_image(format!("{}/files/adder.jpg", uri)))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/adder.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
        .mount(&env.server)
        .await;

    let mut config = env.config(GBIF_ONLY);
    config.cache.download_images = true;
    let formats = config.cache.image_formats.clone();

    let mut orchestrator = Orchestrator::from_config(config, "test-hash", false).unwrap();
    let outcome = orchestrator
        .run(&RunMode::Single("vipera_berus".to_string()), false, false)
        .await
        .unwrap();

    let entries = manifest(&env);
    let saved = image_destination(
        &env.path("images"),
        "vipera_berus",
        &entries[0].images[0],
        &formats,
    )
    .expect("jpg should be an accepted format");
    assert_eq!(std::fs::read(&saved).unwrap(), vec![0xFF, 0xD8, 0xFF]);

    let RunOutcome::Completed { report, .. } = outcome else {
        panic!("Expected a completed run");
    };
    assert_eq!(report.errors.download_errors, 0);
}

#[tokio::test]
async fn test_rerun_replaces_downloaded_images() {
    let env = TestEnv::new().await;
    let uri = env.server.uri();

    // The first search finds one photo, every later one a different photo
    Mock::given(method("GET"))
        .and(path("/gbif/occurrence/search"))
        .respond_with(gbif_image(format!("{}/files/old.jpg", uri)))
        .up_to_n_times(1)
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gbif/occurrence/search"))
        .respond_with(gbif_image(format!("{}/files/new.jpg", uri)))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/old.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"old".to_vec()))
        .mount(&env.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/new.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .mount(&env.server)
        .await;

    let mut config = env.config(GBIF_ONLY);
    config.cache.download_images = true;
    let species_dir = env.path("images/vipera_berus");

    for refresh in [false, true] {
        Orchestrator::from_config(config.clone(), "test-hash", refresh)
            .unwrap()
            .run(&RunMode::Single("vipera_berus".to_string()), false, false)
            .await
            .unwrap();
    }

    let entries = manifest(&env);
    assert_eq!(entries[0].images[0].full_url, format!("{}/files/new.jpg", uri));

    let files = saved_files(&species_dir);
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read(&files[0]).unwrap(), b"new".to_vec());
}
