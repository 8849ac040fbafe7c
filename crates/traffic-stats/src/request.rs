use crate::counter::Sample;

/// One served request, already extracted from the access log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub vhost: String,
    /// `None` when no handler could be attributed to the request.
    pub handler: Option<String>,
    pub sample: Sample,
}

impl Request {
    /// Build a request; an empty handler name is treated as unclassified.
    pub fn new(
        vhost: impl Into<String>,
        handler: Option<&str>,
        bytes_in: u64,
        bytes_out: u64,
        ttfb: u64,
    ) -> Self {
        Self {
            vhost: vhost.into(),
            handler: handler.filter(|h| !h.is_empty()).map(str::to_owned),
            sample: Sample {
                bytes_in,
                bytes_out,
                ttfb,
            },
        }
    }
}
