mod analysis;

pub use analysis::JsonHoleReport;

use arietta_ports::source::{SourceError, SourcePort, SourceVariant};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::debug;

/// Recording streams and analysis reports served over HTTP. The two variants
/// point at different hosts; the engine walks them in order.
pub struct HttpSource {
    client: Client,
    primary_base: String,
    secondary_base: String,
    analysis_base: String,
}

impl HttpSource {
    pub fn new(
        primary_base: impl Into<String>,
        secondary_base: impl Into<String>,
        analysis_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            primary_base: trim_base(primary_base.into()),
            secondary_base: trim_base(secondary_base.into()),
            analysis_base: trim_base(analysis_base.into()),
        }
    }

    fn get(&self, url: &str) -> Result<Option<Vec<u8>>, SourceError> {
        debug!(url, "fetching");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        let bytes = response
            .bytes()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

impl SourcePort for HttpSource {
    fn fetch(&self, slug: &str, variant: SourceVariant) -> Result<Vec<u8>, SourceError> {
        let base = match variant {
            SourceVariant::Primary => &self.primary_base,
            SourceVariant::Secondary => &self.secondary_base,
        };
        let url = format!("{base}/{slug}.mid");
        self.get(&url)?
            .ok_or_else(|| SourceError::NotFound(slug.to_string()))
    }

    /// Reports are optional per recording; a 404 here is a normal answer.
    /// The transfer is gzip-encoded and decompressed by the client.
    fn fetch_analysis(&self, slug: &str) -> Result<Option<Vec<u8>>, SourceError> {
        let url = format!("{}/{slug}.json", self.analysis_base);
        self.get(&url)
    }
}
