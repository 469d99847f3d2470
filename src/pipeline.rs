//! Turns the sale-state file into resolved listings and writes the page and
//! the JSON snapshot read back by the notification stage.
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::archive::ArchiveResolver;
use crate::config::Config;
use crate::extract;
use crate::model::{Listing, SaleItem};
use crate::render;
use crate::sales;
use crate::texture::ImageNormalizer;

#[derive(Debug, Clone)]
pub struct Pipeline {
    resolver: ArchiveResolver,
    normalizer: ImageNormalizer,
}

impl Pipeline {
    pub fn new(
        content_root: impl Into<PathBuf>,
        mods_root: impl Into<PathBuf>,
        image_output_dir: impl Into<PathBuf>,
    ) -> Self {
        let image_output_dir = image_output_dir.into();
        Self {
            resolver: ArchiveResolver::new(content_root, mods_root, image_output_dir.clone()),
            normalizer: ImageNormalizer::new(image_output_dir),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.paths.content_root.clone(),
            cfg.paths.mods_root.clone(),
            cfg.paths.image_output_dir.clone(),
        )
    }

    /// Resolve one sale row. Never fails: unresolvable details degrade to
    /// placeholders and a failed image to no image.
    pub fn resolve_listing(&self, item: &SaleItem) -> Listing {
        let record = match self.resolver.resolve_record(&item.reference) {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, reference = %item.reference, "could not resolve vehicle record");
                return Listing::placeholder(item);
            }
        };

        let source_name = record.source.display_name();
        let details = match extract::extract_details(&source_name, &record.text) {
            Ok(details) => details,
            Err(err) => {
                warn!(%err, reference = %item.reference, "could not read vehicle record");
                return Listing::placeholder(item);
            }
        };

        let image = details.image_ref.as_deref().and_then(|raw| {
            match self.resolver.resolve_image(raw, &record.source) {
                Ok(path) => self.normalizer.normalize_or_skip(&path),
                Err(err) => {
                    warn!(%err, image = raw, record = %source_name, "could not resolve vehicle image");
                    None
                }
            }
        });

        Listing::from_parts(
            item,
            details,
            image.map(|p| p.to_string_lossy().into_owned()),
        )
    }

    /// Read the sale source and resolve every row in source order.
    #[instrument(skip_all, fields(source = %sale_source.display()))]
    pub fn run(&self, sale_source: &Path) -> Result<Vec<Listing>> {
        let items = sales::load(sale_source)?;
        let listings: Vec<Listing> = items.iter().map(|i| self.resolve_listing(i)).collect();
        info!(count = listings.len(), "resolved sale listings");
        Ok(listings)
    }
}

/// Write the HTML page and the JSON snapshot.
pub fn write_outputs(
    listings: &[Listing],
    page_path: &Path,
    snapshot_path: &Path,
    image_base_url: &str,
) -> Result<()> {
    let html = render::render_page(listings, image_base_url);
    fs::write(page_path, html)
        .with_context(|| format!("failed to write {}", page_path.display()))?;

    let json = serde_json::to_string_pretty(listings)?;
    fs::write(snapshot_path, json)
        .with_context(|| format!("failed to write {}", snapshot_path.display()))?;

    info!(page = %page_path.display(), snapshot = %snapshot_path.display(), "wrote listing outputs");
    Ok(())
}

/// Reload the listings written by [`write_outputs`].
pub fn load_snapshot(path: &Path) -> Result<Vec<Listing>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid snapshot {}", path.display()))
}

/// Full render pass driven by configuration.
pub fn render_from_config(cfg: &Config) -> Result<Vec<Listing>> {
    let listings = Pipeline::from_config(cfg).run(&cfg.paths.sale_source)?;
    write_outputs(
        &listings,
        &cfg.paths.page_output,
        &cfg.paths.snapshot_output,
        &cfg.chat.image_base_url,
    )?;
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(reference: &str) -> SaleItem {
        SaleItem {
            reference: reference.into(),
            price: 5000.0,
            age: 1,
            damage: 0.0,
            wear: 0.0,
            operating_time_minutes: 60.0,
            time_left: 4,
        }
    }

    #[test]
    fn unknown_reference_degrades_to_placeholder() {
        let td = tempdir().unwrap();
        let p = Pipeline::new(td.path(), td.path(), td.path().join("img"));
        let l = p.resolve_listing(&item("D:/somewhere/else.xml"));
        assert_eq!(l, Listing::placeholder(&item("D:/somewhere/else.xml")));
    }

    #[test]
    fn malformed_record_degrades_to_placeholder() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("bad.xml"), "<vehicle><storeData>").unwrap();
        let p = Pipeline::new(td.path(), td.path(), td.path().join("img"));
        let l = p.resolve_listing(&item("data/bad.xml"));
        assert_eq!(l.name, crate::model::UNKNOWN_VEHICLE);
    }

    #[test]
    fn missing_image_keeps_details() {
        let td = tempdir().unwrap();
        fs::write(
            td.path().join("a.xml"),
            "<vehicle><storeData><name>A</name><image>$data/store/none.png</image></storeData></vehicle>",
        )
        .unwrap();
        let p = Pipeline::new(td.path(), td.path(), td.path().join("img"));
        let l = p.resolve_listing(&item("data/a.xml"));
        assert_eq!(l.name, "A");
        assert!(l.image.is_none());
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let td = tempdir().unwrap();
        let listings = vec![Listing::placeholder(&item("data/a.xml"))];
        let page = td.path().join("page.html");
        let snap = td.path().join("page.json");
        write_outputs(&listings, &page, &snap, "https://x/").unwrap();
        assert!(fs::read_to_string(&page).unwrap().contains("Unknown Vehicle"));
        assert_eq!(load_snapshot(&snap).unwrap(), listings);
    }
}
