//! Fixed endpoints, template keys and limits shared across the crate.

pub const BOX_API_URL: &str = "https://api.box.com";
pub const BOX_TOKEN_URL: &str = "https://api.box.com/oauth2/token";
pub const BOX_METADATA_SCOPE: &str = "global";

pub const GOOGLE_VISION_API_URL: &str = "https://vision.googleapis.com/v1/images:annotate";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";

pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

pub const KEYWORDS_TEMPLATE_KEY: &str = "box-skills-keywords-demo";
pub const TRANSCRIPTS_TEMPLATE_KEY: &str = "box-skills-transcripts-demo";

/// Upper bound for buffered file content, matching the Vision API image limit.
pub const DEFAULT_MAX_FILE_BYTES: usize = 20 * 1024 * 1024;
