//! Application-wide constants.

/// Namespace used for evidence objects when none is configured.
pub const DEFAULT_NAMESPACE: &str = "evidence";

/// Title given to reports minted by a commit that did not supply one.
pub const DEFAULT_REPORT_TITLE: &str = "Evidence submission";

/// Name of the marker object written to provision a key-prefix namespace.
pub const NAMESPACE_MARKER: &str = ".namespace";

/// MIME type of generated previews.
pub const PREVIEW_MIME: &str = "image/png";

/// Number of leading bytes inspected when sniffing the media type of a file.
pub const SNIFF_LEN: usize = 8192;
