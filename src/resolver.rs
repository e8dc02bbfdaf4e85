//! Marks source files that already have a converted counterpart.

use crate::media::{MediaFile, Stage};
use tracing::debug;

pub struct StageResolver;

impl StageResolver {
    /// Diff `source` against `destination` by exact name.
    ///
    /// A match flips the source entry to `AlreadyProcessed` and records the
    /// destination's size as its shrunk size. Catalogs are small, so the
    /// quadratic scan is fine.
    pub fn resolve(mut source: Vec<MediaFile>, destination: &[MediaFile]) -> Vec<MediaFile> {
        for file in source.iter_mut() {
            if let Some(done) = destination.iter().find(|d| d.name == file.name) {
                debug!("{} already processed ({} bytes)", file.name, done.size);
                file.stage = Stage::AlreadyProcessed;
                file.shrunk_size = done.size;
            }
        }
        source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;

    #[test]
    fn test_resolve_marks_exact_name_matches() {
        let source = vec![
            MediaFile::new("/src", "b.png", MediaType::Png, 1000),
            MediaFile::new("/src", "c.mp4", MediaType::Video, 5000),
            MediaFile::new("/src", "C.MP4", MediaType::Video, 5000),
        ];
        let destination = vec![
            MediaFile::new("/dst", "b.png", MediaType::Png, 400),
            MediaFile::new("/dst", "c.mp4.old", MediaType::Unknown, 10),
        ];

        let resolved = StageResolver::resolve(source, &destination);

        assert_eq!(resolved[0].stage, Stage::AlreadyProcessed);
        assert_eq!(resolved[0].shrunk_size, 400);
        assert_eq!(resolved[0].dir, std::path::Path::new("/src"));
        assert_eq!(resolved[1].stage, Stage::Waiting);
        assert_eq!(resolved[1].shrunk_size, 0);
        assert_eq!(resolved[2].stage, Stage::Waiting);
    }
}
