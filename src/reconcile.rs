use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::checksum::HashAlgorithm;
use crate::ebuild::{package_vars, Ebuild, ParseMode};
use crate::error::Result;
use crate::fetch::fetch_and_hash;
use crate::manifest::{upsert_manifest, Manifest};

/// Manifest type tag for downloadable source archives.
pub const DIST: &str = "DIST";

const MANIFEST_FILE: &str = "Manifest";
const EBUILD_EXT: &str = "ebuild";

/// Fetch `url`, hash it with `algorithms` and upsert a `DIST` entry for
/// `filename` into the manifest named by `target` (a `Manifest` file or the
/// directory containing one).
pub fn upsert_from_url(
    url: &str,
    filename: &str,
    target: &Path,
    algorithms: &[HashAlgorithm],
) -> Result<()> {
    let (manifest_path, _) = resolve_manifest_path(target);
    let checksums = fetch_and_hash(url, algorithms)?;
    info!(
        "fetched {url}: {} bytes, {} digests",
        checksums.size,
        checksums.digests.len()
    );
    upsert_manifest(&manifest_path, checksums.into_entry(DIST, filename))
}

/// Totals from one [`verify`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifySummary {
    /// Declared distfiles with no manifest entry at scan time.
    pub missing: usize,
    /// Missing entries that were fetched and upserted.
    pub fixed: usize,
    /// Missing entries whose fetch failed.
    pub failed: usize,
    /// Unreferenced `DIST` entries removed by the clean post-step.
    pub removed: usize,
}

/// Check that every download declared by the ebuilds around `target` has a
/// manifest entry.
///
/// Missing entries are reported via the log. With `fix`, each missing
/// distfile is fetched, hashed with `algorithms` and upserted; a fetch
/// failure is logged and leaves that one filename unresolved while the scan
/// continues. With `clean`, unreferenced `DIST` entries are removed
/// afterwards. The manifest file is rewritten only when something changed,
/// and the returned [`VerifySummary`] carries the run totals.
pub fn verify(
    target: &Path,
    algorithms: &[HashAlgorithm],
    fix: bool,
    clean: bool,
) -> Result<VerifySummary> {
    let (manifest_path, dir) = resolve_manifest_path(target);
    let mut manifest = Manifest::load(&manifest_path)?;
    let mut used = BTreeSet::new();
    let mut summary = VerifySummary::default();

    for path in ebuild_files(&dir)? {
        let ebuild = match scan_ebuild(&path) {
            Some(e) => e,
            None => continue,
        };
        for entry in &ebuild.src_uri {
            used.insert(entry.filename.clone());
            if manifest.get(&entry.filename).is_some() {
                continue;
            }
            summary.missing += 1;
            warn!(
                "{}: no manifest entry for {}",
                path.display(),
                entry.filename
            );
            if !fix {
                continue;
            }
            match fetch_and_hash(&entry.url, algorithms) {
                Ok(checksums) => {
                    info!(
                        "adding {} ({} bytes) from {}",
                        entry.filename, checksums.size, entry.url
                    );
                    manifest.add_or_replace(checksums.into_entry(DIST, &entry.filename));
                    summary.fixed += 1;
                }
                // Leave this filename unresolved and keep scanning.
                Err(e) => {
                    summary.failed += 1;
                    error!("fetching {}: {e}", entry.url);
                }
            }
        }
    }

    if clean {
        summary.removed = remove_unused(&mut manifest, &used);
    }

    if summary.fixed > 0 || summary.removed > 0 {
        manifest.sort();
        fs::write(&manifest_path, manifest.to_string())?;
    }
    info!(
        "verify: {} missing, {} fixed, {} failed, {} removed",
        summary.missing, summary.fixed, summary.failed, summary.removed
    );
    Ok(summary)
}

/// Remove manifest entries for distfiles no longer declared by any ebuild
/// around `target`, rewriting the manifest if anything was removed.
pub fn clean(target: &Path) -> Result<()> {
    let (manifest_path, dir) = resolve_manifest_path(target);
    let mut manifest = Manifest::load(&manifest_path)?;

    let mut used = BTreeSet::new();
    for path in ebuild_files(&dir)? {
        if let Some(ebuild) = scan_ebuild(&path) {
            for entry in &ebuild.src_uri {
                used.insert(entry.filename.clone());
            }
        }
    }

    if remove_unused(&mut manifest, &used) > 0 {
        manifest.sort();
        fs::write(&manifest_path, manifest.to_string())?;
    }
    Ok(())
}

/// Resolve a target path into `(manifest file, ebuild directory)`.
///
/// A path whose final component is `Manifest` names the manifest itself;
/// anything else is taken as the ebuild directory.
pub fn resolve_manifest_path(target: &Path) -> (PathBuf, PathBuf) {
    if target.file_name().is_some_and(|n| n == MANIFEST_FILE) {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        (target.to_path_buf(), dir)
    } else {
        (target.join(MANIFEST_FILE), target.to_path_buf())
    }
}

/// List the `*.ebuild` files in `dir`, sorted by name for deterministic
/// scan order.
fn ebuild_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == EBUILD_EXT) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse one ebuild for reconciliation, skipping (with a log entry) files
/// whose name is not a package definition or that cannot be read.
fn scan_ebuild(path: &Path) -> Option<Ebuild> {
    let name = path.file_name()?.to_str()?;
    if package_vars(name).is_none() {
        warn!("skipping {}: not a package-version filename", path.display());
        return None;
    }
    match Ebuild::parse(path, ParseMode::Full) {
        Ok(ebuild) => Some(ebuild),
        Err(e) => {
            warn!("skipping {}: {e}", path.display());
            None
        }
    }
}

/// Drop `DIST` entries whose filename is not in `used`. Returns how many
/// were removed; a no-op clean is reported distinctly.
fn remove_unused(manifest: &mut Manifest, used: &BTreeSet<String>) -> usize {
    let stale: Vec<String> = manifest
        .entries
        .iter()
        .filter(|e| e.kind == DIST && !used.contains(&e.filename))
        .map(|e| e.filename.clone())
        .collect();

    if stale.is_empty() {
        info!("nothing to clean");
        return 0;
    }
    for filename in &stale {
        info!("removing unreferenced distfile {filename}");
        manifest.remove(filename);
    }
    stale.len()
}
