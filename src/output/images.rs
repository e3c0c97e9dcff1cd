//! Optional download of selected images to local storage

use crate::http::CachedHttpClient;
use crate::model::{MediaCandidate, SpeciesImages};
use crate::process::content_hash;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Lowercase file extension of a URL's last path segment
pub fn url_extension(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.last()?;
    let (_, ext) = last.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_lowercase())
}

/// Destination for a selected image, if its format is accepted
///
/// Files are named by the image's content fingerprint, so a replaced
/// manifest entry never reuses a stale file.
pub fn image_destination(
    image_dir: &Path,
    species_id: &str,
    image: &MediaCandidate,
    formats: &[String],
) -> Option<PathBuf> {
    let ext = url_extension(&image.full_url)?;
    if !formats
        .iter()
        .any(|f| f.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    {
        return None;
    }

    let hash = image
        .content_hash
        .clone()
        .unwrap_or_else(|| content_hash(image));
    Some(image_dir.join(species_id).join(format!("{}.{}", hash, ext)))
}

/// Downloads every selected image that is not on disk yet
///
/// Files in a species directory that no longer belong to its entry are
/// removed. Returns the number of failed downloads. Images with an
/// unaccepted format are skipped, not counted as failures.
pub async fn download_selected_images(
    client: &CachedHttpClient,
    entries: &[SpeciesImages],
    image_dir: &Path,
    formats: &[String],
) -> usize {
    let mut failures = 0;

    for entry in entries {
        let mut keep = HashSet::new();

        for image in &entry.images {
            let Some(destination) = image_destination(image_dir, &entry.species_id, image, formats)
            else {
                tracing::debug!("Skipping download of {}: unsupported format", image.full_url);
                continue;
            };
            keep.insert(destination.clone());

            if destination.exists() {
                continue;
            }

            match client
                .download_binary(&image.full_url, &destination, image.source.as_str())
                .await
            {
                Ok(()) => tracing::debug!("Saved {}", destination.display()),
                Err(e) => {
                    tracing::warn!("Failed to download {}: {}", image.full_url, e);
                    failures += 1;
                }
            }
        }

        remove_stale_files(&image_dir.join(&entry.species_id), &keep).await;
    }

    failures
}

async fn remove_stale_files(dir: &Path, keep: &HashSet<PathBuf>) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => return,
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
        if !is_file || keep.contains(&path) {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("Removed stale image {}", path.display()),
            Err(e) => tracing::warn!("Failed to remove stale image {}: {}", path.display(), e),
        }
    }
}
