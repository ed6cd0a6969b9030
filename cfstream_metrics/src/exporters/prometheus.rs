use cfstream_core::{ExporterError, Result};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};

/// Immutable text-format snapshot of the registry.
///
/// `lines()` can be walked any number of times; each walk sees the same snapshot.
#[derive(Debug, Clone)]
pub struct RenderedMetrics {
    body: String,
    content_type: String,
}

impl RenderedMetrics {
    pub fn encode(families: &[MetricFamily]) -> Result<Self> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(families, &mut buffer)?;

        let body = String::from_utf8(buffer)
            .map_err(|e| ExporterError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        Ok(Self {
            body,
            content_type: encoder.format_type().to_string(),
        })
    }

    pub fn lines(&self) -> std::str::Lines<'_> {
        self.body.lines()
    }

    /// Lines carrying a value, skipping `# HELP` / `# TYPE` and blanks.
    pub fn sample_lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.lines()
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Gauge, Registry};

    #[test]
    fn test_encode_gauge() {
        let registry = Registry::new();
        let gauge = Gauge::new("cfstream_test_gauge", "Test gauge").unwrap();
        registry.register(Box::new(gauge.clone())).unwrap();
        gauge.set(4.0);

        let rendered = RenderedMetrics::encode(&registry.gather()).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(
            lines,
            vec![
                "# HELP cfstream_test_gauge Test gauge",
                "# TYPE cfstream_test_gauge gauge",
                "cfstream_test_gauge 4",
            ]
        );
        assert_eq!(rendered.sample_lines().count(), 1);
        assert!(rendered.content_type().starts_with("text/plain"));
    }

    #[test]
    fn test_lines_are_restartable() {
        let rendered = RenderedMetrics::encode(&[]).unwrap();
        assert_eq!(rendered.lines().count(), rendered.lines().count());
        assert!(rendered.body().is_empty());
    }
}
