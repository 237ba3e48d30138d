//! Configuration for the upload-to-render pipeline.
//!
//! All behaviour is controlled through [`ViewerConfig`], built via its
//! [`ViewerConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs between the controller, the renderer, and the
//! probe, and to log the exact settings a run used.

use crate::error::ViewerError;

/// Path of the upload endpoint, relative to `api_base`.
pub const UPLOAD_PATH: &str = "/api/upload/";

/// Path of the liveness endpoint, relative to `api_base`.
pub const HEALTH_PATH: &str = "/api/health/";

/// Configuration shared by the controller, renderer, and probe.
///
/// Built via [`ViewerConfig::builder()`] or [`ViewerConfig::default()`].
///
/// # Example
/// ```rust
/// use pdfview::ViewerConfig;
///
/// let config = ViewerConfig::builder()
///     .api_base("http://localhost:8000")
///     .render_concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Base URL of the backend, without a trailing slash.
    /// Default: `http://localhost:8000`.
    pub api_base: String,

    /// Upload request timeout in seconds. Default: 120.
    ///
    /// Uploads carry the full file body, so this is deliberately generous;
    /// a stuck request still fails eventually instead of leaving the
    /// controller in `Loading` forever.
    pub upload_timeout_secs: u64,

    /// Download timeout for URL sources in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Maximum rendered surface dimension (width or height) in pixels.
    /// Default: 2000.
    ///
    /// A safety cap independent of page size. An A0 poster page would
    /// otherwise produce a surface large enough to exhaust memory; this
    /// caps the longest edge and scales the other proportionally.
    pub max_render_pixels: u32,

    /// Number of page draws in flight at once. Default: 4.
    ///
    /// Page draws are independent, so they may overlap. pdfium work runs on
    /// the blocking pool; a small number keeps memory bounded without
    /// serialising the whole document.
    pub render_concurrency: usize,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            upload_timeout_secs: 120,
            download_timeout_secs: 120,
            max_render_pixels: 2000,
            render_concurrency: 4,
        }
    }
}

impl ViewerConfig {
    /// Create a new builder for `ViewerConfig`.
    pub fn builder() -> ViewerConfigBuilder {
        ViewerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Absolute URL of the upload endpoint.
    pub fn upload_url(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), UPLOAD_PATH)
    }

    /// Absolute URL of the liveness endpoint.
    pub fn health_url(&self) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), HEALTH_PATH)
    }
}

/// Builder for [`ViewerConfig`].
#[derive(Debug)]
pub struct ViewerConfigBuilder {
    config: ViewerConfig,
}

impl ViewerConfigBuilder {
    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_render_pixels(mut self, px: u32) -> Self {
        self.config.max_render_pixels = px.max(100);
        self
    }

    pub fn render_concurrency(mut self, n: usize) -> Self {
        self.config.render_concurrency = n.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ViewerConfig, ViewerError> {
        let c = &self.config;
        if c.api_base.is_empty() {
            return Err(ViewerError::InvalidConfig("api_base must not be empty".into()));
        }
        if !c.api_base.starts_with("http://") && !c.api_base.starts_with("https://") {
            return Err(ViewerError::InvalidConfig(format!(
                "api_base must be an http(s) URL, got '{}'",
                c.api_base
            )));
        }
        if c.render_concurrency == 0 {
            return Err(ViewerError::InvalidConfig("render_concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints() {
        let c = ViewerConfig::default();
        assert_eq!(c.upload_url(), "http://localhost:8000/api/upload/");
        assert_eq!(c.health_url(), "http://localhost:8000/api/health/");
    }

    #[test]
    fn trailing_slash_is_normalised() {
        let c = ViewerConfig::builder()
            .api_base("https://api.example.com/")
            .build()
            .unwrap();
        assert_eq!(c.upload_url(), "https://api.example.com/api/upload/");
    }

    #[test]
    fn rejects_non_http_base() {
        let err = ViewerConfig::builder().api_base("ftp://x").build();
        assert!(matches!(err, Err(ViewerError::InvalidConfig(_))));
    }

    #[test]
    fn builder_clamps_floors() {
        let c = ViewerConfig::builder()
            .render_concurrency(0)
            .max_render_pixels(1)
            .build()
            .unwrap();
        assert_eq!(c.render_concurrency, 1);
        assert_eq!(c.max_render_pixels, 100);
    }
}
