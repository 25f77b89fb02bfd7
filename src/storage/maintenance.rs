//! Store preparation and cleanup helpers.

use crate::error::{Error, Result};
use crate::storage::PropertyAccess;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Words used to build innocuous cover text.
const COVER_WORDS: &[&str] = &[
    "meeting", "notes", "draft", "budget", "review", "quarterly", "summary", "agenda", "project",
    "update", "client", "invoice", "schedule", "report", "follow", "up", "action", "items",
    "team", "lunch", "deadline", "estimate", "revision", "final", "copy", "the", "and", "for",
    "with", "from", "next", "week", "monday", "friday", "please", "thanks", "attached", "see",
    "\n",
];

/// Maximum words in one seeded file.
const MAX_WORDS_PER_FILE: usize = 256;

/// Strip every managed property from every object in the store.
///
/// Returns the number of objects that carried properties.
pub fn clear_all_properties<M: PropertyAccess + ?Sized>(medium: &M) -> Result<usize> {
    let mut cleared = 0;
    for object in medium.list_objects()? {
        if !medium.read_properties(&object)?.is_empty() {
            medium.clear_properties(&object)?;
            debug!(object = %object, "cleared properties");
            cleared += 1;
        }
    }
    info!(cleared, medium = medium.name(), "store properties cleared");
    Ok(cleared)
}

/// Fill a directory with `count` cover files named `a0.txt`, `b0.txt`, ...,
/// `z0.txt`, `a1.txt`, ...
///
/// Existing files with the same names are overwritten.
pub fn seed_directory<R: Rng + ?Sized>(
    dir: &Path,
    count: usize,
    rng: &mut R,
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InvalidRoot(dir.to_path_buf()));
    }

    let mut created = Vec::with_capacity(count);
    for k in 0..count {
        let letter = (b'a' + (k % 26) as u8) as char;
        let path = dir.join(format!("{}{}.txt", letter, k / 26));

        let words = rng.gen_range(1..=MAX_WORDS_PER_FILE);
        let text = (0..words)
            .filter_map(|_| COVER_WORDS.choose(&mut *rng).copied())
            .collect::<Vec<_>>()
            .join(" ");

        std::fs::write(&path, text)?;
        created.push(path);
    }

    info!(count, dir = %dir.display(), "seeded cover files");
    Ok(created)
}
