//! The Path Planner (C4): pure, deterministic mapping from a resolved
//! identity to a destination path under the target root. No I/O.

use std::path::{Path, PathBuf};

use crate::resolver::{FilenameGuess, MediaType, ResolvedRecord};

/// Compute the canonical destination for a resolved file.
///
/// Movies land at `TARGET/Movies/<clean_title> (YYYY)?<ext>`; TV episodes at
/// `TARGET/TV Shows/<clean_title> (YYYY)?/<clean_title> SssEee<ext>`, falling
/// back to `<folder_name><ext>` when the guess carries no episode number
/// (SPEC_FULL.md §4.4).
pub fn plan_destination(
    record: &ResolvedRecord,
    guess: &FilenameGuess,
    source_path: &Path,
    target_root: &Path,
) -> PathBuf {
    let ext = source_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    match record.media_type {
        MediaType::Movie => {
            let title = clean_title(&record.title);
            let year = record.year.map(|y| format!(" ({y})")).unwrap_or_default();
            target_root
                .join("Movies")
                .join(format!("{title}{year}{ext}"))
        }
        MediaType::Tv => {
            let title = clean_title(&record.title);
            let year = record.year.map(|y| format!(" ({y})")).unwrap_or_default();
            let show_dir = target_root
                .join("TV Shows")
                .join(format!("{title}{year}"));

            let season = guess.season.unwrap_or(1);
            match guess.episode {
                Some(episode) => {
                    let filename = format!("{title} S{season:02}E{episode:02}{ext}");
                    show_dir.join(filename)
                }
                None => {
                    let folder_name = source_path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or("episode");
                    show_dir.join(format!("{folder_name}{ext}"))
                }
            }
        }
    }
}

/// Keep only `[A-Za-z0-9 _-]`, matching SPEC_FULL.md §4.4's `clean_title`.
fn clean_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim()
        .to_string()
}
