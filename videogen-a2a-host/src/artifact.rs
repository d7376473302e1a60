//! Video result extraction from artifact parts.

use tracing::warn;
use videogen_a2a_common::GcsUri;

use crate::protocol::Part;

/// Host prefix of Cloud Storage signed URLs.
pub const SIGNED_URL_PREFIX: &str = "https://storage.googleapis.com/";

/// Where a generated video lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultUri {
    /// Canonical `gs://bucket/object` reference, eligible for upload.
    Storage(GcsUri),
    /// Anything else, reported as-is.
    Other(String),
}

/// URI of the first `video/*` file part, if any.
pub fn first_video_uri(parts: &[Part]) -> Option<&str> {
    parts.iter().find_map(Part::video_uri)
}

/// Rewrite a signed Cloud Storage URL to its `gs://` form.
///
/// `https://storage.googleapis.com/<path>?<query>` becomes `gs://<path>`.
/// Any other string is returned unchanged.
pub fn rewrite_signed_url(uri: &str) -> String {
    match uri.strip_prefix(SIGNED_URL_PREFIX) {
        Some(rest) => {
            let path = rest.split_once('?').map_or(rest, |(path, _)| path);
            format!("gs://{}", path)
        }
        None => uri.to_string(),
    }
}

/// Classify a result URI, rewriting signed URLs first.
///
/// A rewritten URI that does not name a bucket and object falls back to the
/// original string.
pub fn classify(uri: &str) -> ResultUri {
    let rewritten = rewrite_signed_url(uri);
    if !rewritten.starts_with("gs://") {
        return ResultUri::Other(rewritten);
    }

    match GcsUri::parse(&rewritten) {
        Ok(gcs) if !gcs.object.is_empty() => ResultUri::Storage(gcs),
        Ok(_) => {
            warn!(uri = %uri, "Storage URI has no object path");
            ResultUri::Other(uri.to_string())
        }
        Err(e) => {
            warn!(uri = %uri, error = %e, "Failed to parse storage URI");
            ResultUri::Other(uri.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{FileContent, FileWithUri};
    use proptest::prelude::*;

    fn file(uri: &str, mime: Option<&str>) -> Part {
        Part::File {
            file: FileContent::Uri(FileWithUri {
                uri: uri.to_string(),
                mime_type: mime.map(str::to_string),
                name: None,
            }),
            metadata: None,
        }
    }

    proptest! {
        #[test]
        fn signed_urls_rewrite_to_gs(
            path in "[a-z0-9][a-z0-9._-]{2,20}(/[A-Za-z0-9._-]{1,20}){1,4}",
            query in "[A-Za-z0-9=&%._-]{0,60}",
        ) {
            let signed = format!("{}{}?{}", SIGNED_URL_PREFIX, path, query);
            prop_assert_eq!(rewrite_signed_url(&signed), format!("gs://{}", path));
        }

        #[test]
        fn other_uris_are_unchanged(uri in "[a-z]{3,8}://[A-Za-z0-9./?=&_-]{0,60}") {
            prop_assume!(!uri.starts_with(SIGNED_URL_PREFIX));
            prop_assert_eq!(rewrite_signed_url(&uri), uri);
        }
    }

    #[test]
    fn classify_signed_url() {
        let result = classify("https://storage.googleapis.com/bucket/vid.mp4?sig=abc");
        let ResultUri::Storage(gcs) = result else {
            panic!("expected storage uri");
        };
        assert_eq!(gcs.to_string(), "gs://bucket/vid.mp4");
    }

    #[test]
    fn classify_canonical_gs_uri() {
        assert!(matches!(classify("gs://bucket/a/b.mp4"), ResultUri::Storage(_)));
    }

    #[test]
    fn classify_unparseable_storage_path_falls_back() {
        let uri = "https://storage.googleapis.com/bucket-only?sig=1";
        assert_eq!(classify(uri), ResultUri::Other(uri.to_string()));
        assert_eq!(
            classify("https://storage.googleapis.com/bucket/"),
            ResultUri::Other("https://storage.googleapis.com/bucket/".to_string())
        );
    }

    #[test]
    fn classify_other_host() {
        let uri = "https://cdn.example.com/v.mp4?x=1";
        assert_eq!(classify(uri), ResultUri::Other(uri.to_string()));
    }

    #[test]
    fn first_video_uri_skips_non_video_parts() {
        let parts = vec![
            Part::text("caption"),
            file("gs://b/thumb.png", Some("image/png")),
            file("gs://b/first.mp4", Some("video/mp4")),
            file("gs://b/second.webm", Some("video/webm")),
        ];
        assert_eq!(first_video_uri(&parts), Some("gs://b/first.mp4"));
    }

    #[test]
    fn first_video_uri_of_empty_parts() {
        assert_eq!(first_video_uri(&[]), None);
        assert_eq!(first_video_uri(&[Part::text("no video")]), None);
    }
}
