//! Content snapshots and the resolver that builds them.
//!
//! A snapshot is a point-in-time view of the working tree: relative path to
//! full text. Snapshots are never patched in place by the pipeline; the batch
//! applier works on its own copy so "before" and "after" stay observable.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Relative path -> full text content.
pub type ContentSnapshot = BTreeMap<String, String>;

/// Build the snapshot a plan will be applied to.
///
/// Starts from files already read by the scanner. Each patch target missing
/// from that set is read from disk under `root`; `on_read` fires before each
/// such read. Missing targets are seeded with empty content and treated as
/// files to be created. Targets that exist but cannot be read as UTF-8 text
/// are left out, so patches against them fail as not in context.
pub fn resolve_content<'a, I, K, V, T>(
    scanned: I,
    targets: T,
    root: &Path,
    mut on_read: impl FnMut(&str),
) -> ContentSnapshot
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
    T: IntoIterator<Item = &'a str>,
{
    let mut snapshot: ContentSnapshot = scanned
        .into_iter()
        .map(|(path, content)| (path.into(), content.into()))
        .collect();

    for target in targets {
        if snapshot.contains_key(target) {
            continue;
        }

        on_read(target);
        let content = match fs::read_to_string(root.join(target)) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = target, "target does not exist, treating as new file");
                String::new()
            }
            Err(e) => {
                warn!(path = target, error = %e, "target not readable, leaving it out");
                continue;
            }
        };
        snapshot.insert(target.to_string(), content);
    }

    snapshot
}
