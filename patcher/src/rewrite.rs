//! Produces a new archive from an original one.
//!
//! Entries that are kept are copied raw, so their compressed bytes and
//! compression method survive untouched. New or substituted payloads are
//! deflated.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use common::{EntryPath, PatternSet};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::index::{Overlay, Replacement};
use crate::jar::Jar;

/// What a rewrite did to each entry name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    pub removed: Vec<String>,
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub copied: Vec<String>,
}

/// Drops entries matched by `patterns`, then appends every overlay file.
///
/// Entries the overlay supplies itself are dropped as well, so the result
/// never carries two entries with the same name.
pub fn rewrite_with_overlay(
    source: &Path,
    destination: &Path,
    patterns: &PatternSet,
    overlay: &Overlay,
) -> Result<RewriteReport> {
    rewrite(source, destination, |archive, writer, report| {
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|err| Error::read(source, err))?;
            let name = entry.name().to_owned();

            if patterns.matches(&name) {
                info!("removed {name}");
                report.removed.push(name);
            } else if overlay.contains(&name) {
                debug!("{name} is superseded by the overlay");
                report.removed.push(name);
            } else {
                writer
                    .raw_copy_file(entry)
                    .map_err(|err| Error::write(destination, err))?;
                report.copied.push(name);
            }
        }

        for file in overlay.files() {
            let contents = fs::read(&file.source).map_err(|err| Error::io(&file.source, err))?;
            let name = file.archive_path();
            writer
                .start_file(name.as_str(), deflated())
                .map_err(|err| Error::write(destination, err))?;
            writer
                .write_all(&contents)
                .map_err(|err| Error::write(destination, err))?;
            info!("added {name}");
            report.added.push(name);
        }

        Ok(())
    })
}

/// Swaps the payload of every entry that has a replacement.
///
/// Entry count, order, names, timestamps and permissions stay as they are.
pub fn rewrite_with_replacements(
    source: &Path,
    destination: &Path,
    replacements: &[Replacement],
) -> Result<RewriteReport> {
    rewrite(source, destination, |archive, writer, report| {
        for i in 0..archive.len() {
            let entry = archive
                .by_index_raw(i)
                .map_err(|err| Error::read(source, err))?;
            let name = entry.name().to_owned();

            let replacement = EntryPath::parse(&name)
                .ok()
                .filter(|_| !entry.is_dir())
                .and_then(|path| replacements.iter().find(|r| r.entry == path));

            let Some(replacement) = replacement else {
                writer
                    .raw_copy_file(entry)
                    .map_err(|err| Error::write(destination, err))?;
                report.copied.push(name);
                continue;
            };

            let mut options = deflated();
            if let Some(modified) = entry.last_modified() {
                options = options.last_modified_time(modified);
            }
            if let Some(mode) = entry.unix_mode() {
                options = options.unix_permissions(mode);
            }
            drop(entry);

            let contents = fs::read(&replacement.source)
                .map_err(|err| Error::io(&replacement.source, err))?;
            writer
                .start_file(name.as_str(), options)
                .map_err(|err| Error::write(destination, err))?;
            writer
                .write_all(&contents)
                .map_err(|err| Error::write(destination, err))?;
            info!("replaced {name}");
            report.replaced.push(name);
        }

        for replacement in replacements {
            if !report.replaced.contains(&replacement.archive_path()) {
                warn!(
                    "{} has no entry {}",
                    source.display(),
                    replacement.archive_path()
                );
            }
        }

        Ok(())
    })
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Streams `source` into a fresh `destination`, deleting the destination
/// again when anything goes wrong.
fn rewrite<F>(source: &Path, destination: &Path, body: F) -> Result<RewriteReport>
where
    F: FnOnce(&mut ZipArchive<File>, &mut ZipWriter<File>, &mut RewriteReport) -> Result<()>,
{
    info!("rewriting {} from {}", destination.display(), source.display());

    let mut jar = Jar::open(source)?;
    let file = File::create(destination).map_err(|err| Error::write(destination, err))?;
    let mut writer = ZipWriter::new(file);
    let mut report = RewriteReport::default();

    let result = body(jar.archive_mut(), &mut writer, &mut report).and_then(|()| {
        writer
            .finish()
            .map(drop)
            .map_err(|err| Error::write(destination, err))
    });

    if let Err(err) = result {
        if let Err(cleanup) = fs::remove_file(destination) {
            warn!(
                "unable to remove incomplete {}: {cleanup}",
                destination.display()
            );
        }
        return Err(err);
    }

    Ok(report)
}
