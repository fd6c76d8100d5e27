use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use common::PatternSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::backup::{backed_up_archive, ensure_backup, pristine_source};
use crate::config::PatchConfig;
use crate::error::{Error, Result};
use crate::index::{Overlay, Replacement, ReplacementIndex};
use crate::jar::Jar;
use crate::resolve::ResolveArchive;
use crate::rewrite::{rewrite_with_overlay, rewrite_with_replacements};

#[derive(Debug)]
pub struct PatchFailure {
    pub archive: String,
    pub group: Option<String>,
    pub error: Error,
}

/// Outcome of patching many archives. Failures never undo what succeeded.
#[derive(Debug, Default)]
pub struct PatchReport {
    pub patched: Vec<PathBuf>,
    pub failures: Vec<PatchFailure>,
}

impl PatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, archive: String, group: Option<String>, error: Error) {
        match &group {
            Some(group) => error!("unable to patch {archive} ({group}): {error}"),
            None => error!("unable to patch {archive}: {error}"),
        }
        self.failures.push(PatchFailure {
            archive,
            group,
            error,
        });
    }
}

/// Backs up `archive` if needed and rebuilds it from the backup.
fn patch_archive<F>(archive: &Path, rewrite: F) -> Result<()>
where
    F: FnOnce(&Path, &Path) -> Result<()>,
{
    let backup = ensure_backup(archive)?;
    rewrite(&backup, archive)
}

/// Applies per-group overlays from `staging_root/<group>` to the archives
/// named in the configuration.
pub struct TreePatcher {
    config: PatchConfig,
    staging_root: PathBuf,
    resolver: Box<dyn ResolveArchive>,
}

impl TreePatcher {
    pub fn new(
        config: PatchConfig,
        staging_root: PathBuf,
        resolver: Box<dyn ResolveArchive>,
    ) -> Self {
        Self {
            config,
            staging_root,
            resolver,
        }
    }

    pub fn run<P: AsRef<Path>>(&self, roots: &[P]) -> Result<PatchReport> {
        // everything that can be rejected up front is, before the first rename
        let mut groups: Vec<(&str, &str, PatternSet, Overlay)> = Vec::new();
        for (name, group) in &self.config.groups {
            let overlay = Overlay::scan(&self.staging_root.join(name))?;
            if overlay.is_empty() {
                warn!("no staged classes for {name}, matched entries are only removed");
            }
            let patterns = group.patterns()?;
            debug!("{name} replaces {:?}", patterns.patterns());
            groups.push((name.as_str(), group.alias.as_str(), patterns, overlay));
        }

        let mut report = PatchReport::default();
        for (name, alias, patterns, overlay) in &groups {
            for root in roots {
                let root = root.as_ref();
                let archive = match self.resolver.resolve(root, name, alias) {
                    Ok(archive) => archive,
                    Err(err) => {
                        report.fail(root.display().to_string(), Some(name.to_string()), err);
                        continue;
                    }
                };

                info!("patching {} with {name}", archive.display());
                let result = patch_archive(&archive, |source, destination| {
                    rewrite_with_overlay(source, destination, patterns, overlay).map(drop)
                });
                match result {
                    Ok(()) => report.patched.push(archive),
                    Err(err) => {
                        report.fail(archive.display().to_string(), Some(name.to_string()), err)
                    }
                }
            }
        }

        Ok(report)
    }
}

/// Which staged files go into which archive, keyed by archive path.
#[derive(Debug, Default)]
pub struct PatchPlan {
    pub archives: BTreeMap<PathBuf, Vec<Replacement>>,
    pub unclaimed: Vec<Replacement>,
    pub failures: Vec<PatchFailure>,
}

impl PatchPlan {
    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    pub fn log(&self) {
        for (archive, replacements) in &self.archives {
            info!("{} ({} entries)", archive.display(), replacements.len());
            for replacement in replacements {
                info!("  {}", replacement.archive_path());
            }
        }

        for replacement in &self.unclaimed {
            info!("no archive contains {}", replacement.archive_path());
        }
    }
}

/// Swaps staged files into whichever archives contain an entry with the same
/// directory and base name.
pub struct IndexedPatcher {
    index: ReplacementIndex,
}

impl IndexedPatcher {
    pub fn new(staging_root: &Path) -> Result<Self> {
        let index = ReplacementIndex::build(staging_root)?;
        info!("indexed {} staged files", index.len());
        Ok(Self { index })
    }

    /// Every jar or zip below `roots`, sorted and without duplicates. A
    /// backup whose archive is gone stands for that archive.
    pub fn discover<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for root in roots {
            let root = root.as_ref();
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(|err| {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    Error::io(path, err.into())
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let archive = match backed_up_archive(entry.path()) {
                    Some(archive) => archive,
                    None => entry.into_path(),
                };
                if is_archive(&archive) {
                    let path =
                        std::path::absolute(&archive).map_err(|err| Error::io(&archive, err))?;
                    archives.push(path);
                }
            }
        }

        archives.sort();
        archives.dedup();
        Ok(archives)
    }

    /// Decides which archive receives which staged file. A staged file goes
    /// to the first archive that claims it and to no other.
    pub fn plan<P: AsRef<Path>>(&self, roots: &[P]) -> Result<PatchPlan> {
        let mut available = self.index.clone();
        let mut plan = PatchPlan::default();

        for archive in Self::discover(roots)? {
            let source = pristine_source(&archive);
            let jar = match Jar::open(&source) {
                Ok(jar) => jar,
                Err(err) => {
                    error!("unable to inspect {}: {err}", archive.display());
                    plan.failures.push(PatchFailure {
                        archive: archive.display().to_string(),
                        group: None,
                        error: err,
                    });
                    continue;
                }
            };

            debug!("inspecting {}", jar.path().display());
            let claimed: Vec<Replacement> = jar
                .entries()
                .iter()
                .filter_map(|entry| available.claim(entry))
                .collect();

            if claimed.is_empty() {
                debug!("nothing to patch in {}", archive.display());
            } else {
                plan.archives.insert(archive, claimed);
            }
        }

        plan.unclaimed = available.iter().cloned().collect();
        Ok(plan)
    }

    pub fn apply(&self, plan: PatchPlan) -> PatchReport {
        let mut report = PatchReport {
            patched: Vec::new(),
            failures: plan.failures,
        };

        for (archive, replacements) in plan.archives {
            info!("patching {}", archive.display());
            let result = patch_archive(&archive, |source, destination| {
                rewrite_with_replacements(source, destination, &replacements).map(drop)
            });
            match result {
                Ok(()) => report.patched.push(archive),
                Err(err) => report.fail(archive.display().to_string(), None, err),
            }
        }

        report
    }

    pub fn run<P: AsRef<Path>>(&self, roots: &[P]) -> Result<PatchReport> {
        let plan = self.plan(roots)?;
        plan.log();
        Ok(self.apply(plan))
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use zip::CompressionMethod::{Deflated, Stored};

    use super::*;
    use crate::backup::backup_path;
    use crate::resolve::Layout;
    use crate::testing::{names, raw_entries, read_entry, stage, write_jar};

    #[test]
    fn tree_patcher_patches_each_root() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        stage(&staging, &[("app.jar/x/Foo.class", b"new foo")]);

        let first = dir.path().join("ide1");
        let second = dir.path().join("ide2");
        for root in [&first, &second] {
            fs::create_dir_all(root).unwrap();
            write_jar(
                &root.join("app-client.jar"),
                &[
                    ("x/Foo.class", b"old foo", Deflated),
                    ("y/Baz.class", b"baz", Stored),
                ],
            );
        }

        let config = PatchConfig::from_toml(
            r#"
            ["app.jar"]
            alias = "app-client.jar"
            classes = ["x/Foo"]
            "#,
        )
        .unwrap();
        let patcher = TreePatcher::new(config, staging, Layout::Flat.resolver());
        let report = patcher.run(&[&first, &second]).unwrap();

        assert!(report.is_success());
        assert_eq!(report.patched.len(), 2);
        for root in [&first, &second] {
            let jar = root.join("app-client.jar");
            assert!(backup_path(&jar).exists());
            assert_eq!(names(&jar), vec!["y/Baz.class", "x/Foo.class"]);
            assert_eq!(read_entry(&jar, "x/Foo.class"), b"new foo");
        }
    }

    #[test]
    fn tree_patcher_missing_archive_does_not_stop_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        fs::create_dir_all(&staging).unwrap();

        let root = dir.path().join("ide");
        fs::create_dir_all(&root).unwrap();
        write_jar(&root.join("util.jar"), &[("u/A.class", b"a", Stored)]);

        let config = PatchConfig::from_toml(
            r#"
            ["app.jar"]
            alias = "app-client.jar"
            classes = ["x/*"]

            ["util.jar"]
            alias = "util-1.0.jar"
            classes = ["u/A"]
            "#,
        )
        .unwrap();
        let patcher = TreePatcher::new(config, staging, Layout::Flat.resolver());
        let report = patcher.run(&[&root]).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.is_archive_not_found());
        assert_eq!(report.failures[0].group.as_deref(), Some("app.jar"));
        assert_eq!(report.patched, vec![root.join("util.jar")]);
        assert!(names(&root.join("util.jar")).is_empty());
    }

    #[test]
    fn tree_patcher_corrupt_archive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ide");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("app.jar"), b"garbage").unwrap();

        let config = PatchConfig::from_toml(
            r#"
            ["app.jar"]
            alias = "app.jar"
            classes = ["x/*"]
            "#,
        )
        .unwrap();
        let staging = dir.path().join("staging");
        let patcher = TreePatcher::new(config, staging, Layout::Flat.resolver());
        let report = patcher.run(&[&root]).unwrap();

        assert!(matches!(
            report.failures[0].error,
            Error::ArchiveRead { .. }
        ));
        // the original is safe in the backup and nothing pretends to be a result
        assert_eq!(fs::read(backup_path(&root.join("app.jar"))).unwrap(), b"garbage");
        assert!(!root.join("app.jar").exists());

        // a second run still finds the archive through its backup
        let report = patcher.run(&[&root]).unwrap();
        assert!(matches!(
            report.failures[0].error,
            Error::ArchiveRead { .. }
        ));
        assert_eq!(fs::read(backup_path(&root.join("app.jar"))).unwrap(), b"garbage");
    }

    #[test]
    fn tree_patcher_resumes_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        stage(&staging, &[("app.jar/x/Foo.class", b"new foo")]);

        let root = dir.path().join("ide");
        fs::create_dir_all(&root).unwrap();
        let jar = root.join("app.jar");
        write_jar(
            &backup_path(&jar),
            &[
                ("x/Foo.class", b"old foo", Deflated),
                ("y/Baz.class", b"baz", Stored),
            ],
        );
        let original = fs::read(backup_path(&jar)).unwrap();

        let config = PatchConfig::from_toml(
            r#"
            ["app.jar"]
            alias = "app-client.jar"
            classes = ["x/Foo"]
            "#,
        )
        .unwrap();
        let patcher = TreePatcher::new(config, staging, Layout::Flat.resolver());
        let report = patcher.run(&[&root]).unwrap();

        assert!(report.is_success());
        assert_eq!(report.patched, vec![jar.clone()]);
        assert_eq!(names(&jar), vec!["y/Baz.class", "x/Foo.class"]);
        assert_eq!(read_entry(&jar, "x/Foo.class"), b"new foo");
        assert_eq!(fs::read(backup_path(&jar)).unwrap(), original);
    }

    #[test]
    fn indexed_patcher_resumes_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        stage(&staging, &[("x/Foo.class", b"new foo")]);

        let root = dir.path().join("ide");
        fs::create_dir_all(&root).unwrap();
        let jar = root.join("app.jar");
        write_jar(
            &backup_path(&jar),
            &[
                ("x/Foo.class", b"old foo", Deflated),
                ("y/Baz.class", b"baz", Stored),
            ],
        );
        let original = fs::read(backup_path(&jar)).unwrap();

        let patcher = IndexedPatcher::new(&staging).unwrap();
        let report = patcher.run(&[&root]).unwrap();

        assert!(report.is_success());
        assert_eq!(report.patched, vec![std::path::absolute(&jar).unwrap()]);
        assert_eq!(names(&jar), vec!["x/Foo.class", "y/Baz.class"]);
        assert_eq!(read_entry(&jar, "x/Foo.class"), b"new foo");
        assert_eq!(read_entry(&jar, "y/Baz.class"), b"baz");
        assert_eq!(fs::read(backup_path(&jar)).unwrap(), original);
    }

    #[test]
    fn plan_claims_once() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        stage(&staging, &[("x/Foo.class", b"new foo"), ("q/Nowhere.class", b"?")]);

        let root = dir.path().join("ide");
        fs::create_dir_all(root.join("lib")).unwrap();
        for name in ["a.jar", "b.jar"] {
            write_jar(
                &root.join("lib").join(name),
                &[
                    ("x/Foo.class", b"old foo", Deflated),
                    ("y/Baz.class", b"baz", Stored),
                ],
            );
        }
        write_jar(&root.join("c.jar"), &[("z/Foo.class", b"other foo", Stored)]);

        let patcher = IndexedPatcher::new(&staging).unwrap();
        let plan = patcher.plan(&[&root]).unwrap();

        let a = std::path::absolute(root.join("lib").join("a.jar")).unwrap();
        assert_eq!(plan.archives.len(), 1);
        assert_eq!(plan.archives[&a][0].archive_path(), "x/Foo.class");
        assert_eq!(plan.unclaimed.len(), 1);
        assert_eq!(plan.unclaimed[0].archive_path(), "q/Nowhere.class");

        let report = patcher.apply(plan);
        assert!(report.is_success());
        assert_eq!(report.patched, vec![a.clone()]);
        assert_eq!(read_entry(&a, "x/Foo.class"), b"new foo");

        // untouched archives get no backup at all
        let b = root.join("lib").join("b.jar");
        assert!(!backup_path(&b).exists());
        assert_eq!(read_entry(&b, "x/Foo.class"), b"old foo");
        assert!(!backup_path(&root.join("c.jar")).exists());
    }

    #[test]
    fn rerun_reads_backup() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");
        stage(&staging, &[("x/Foo.class", b"new foo")]);

        let root = dir.path().join("ide");
        fs::create_dir_all(&root).unwrap();
        let jar = root.join("app.jar");
        write_jar(
            &jar,
            &[
                ("x/Foo.class", b"old foo", Deflated),
                ("y/Baz.class", b"baz", Stored),
            ],
        );
        let original = fs::read(&jar).unwrap();

        let patcher = IndexedPatcher::new(&staging).unwrap();
        patcher.run(&[&root]).unwrap();
        let first = raw_entries(&jar);

        let report = patcher.run(&[&root]).unwrap();
        assert_eq!(report.patched.len(), 1);
        assert_eq!(raw_entries(&jar), first);
        assert_eq!(fs::read(backup_path(&jar)).unwrap(), original);
    }

    #[test]
    fn discover_only_archives() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("lib").join("a.jar"), b"").unwrap();
        fs::write(root.join("lib").join("a.jar.orig"), b"").unwrap();
        fs::write(root.join("lib").join("c.jar.orig"), b"").unwrap();
        fs::write(root.join("lib").join("notes.txt.orig"), b"").unwrap();
        fs::write(root.join("readme.txt"), b"").unwrap();
        fs::write(root.join("B.JAR"), b"").unwrap();
        fs::write(root.join("d.zip"), b"").unwrap();

        let archives = IndexedPatcher::discover(&[root, root]).unwrap();
        let names: Vec<_> = archives
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names.len(), 4);
        assert!(names.contains(&"a.jar"));
        assert!(names.contains(&"c.jar"));
        assert!(names.contains(&"B.JAR"));
        assert!(names.contains(&"d.zip"));
    }
}
