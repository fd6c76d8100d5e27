//! Swaps class files inside the jars of an installed application and puts
//! the original jars back on request.

pub mod backup;
pub mod config;
pub mod copy;
pub mod error;
pub mod index;
pub mod jar;
pub mod orchestrator;
pub mod resolve;
pub mod rewrite;
#[cfg(test)]
mod testing;

pub use backup::{BACKUP_SUFFIX, backup_path, ensure_backup, restore};
pub use config::{GroupSpec, PatchConfig};
pub use copy::{Extractor, copy_classes};
pub use error::{Error, Result};
pub use index::{Overlay, Replacement, ReplacementIndex};
pub use orchestrator::{IndexedPatcher, PatchFailure, PatchPlan, PatchReport, TreePatcher};
pub use resolve::{FlatLayout, Layout, ResolveArchive, SearchLayout};
pub use rewrite::{RewriteReport, rewrite_with_overlay, rewrite_with_replacements};
