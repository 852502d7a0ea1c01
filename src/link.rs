use reqwest::Url;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("don't know how to open URI: {0}")]
    Unsupported(String),

    #[error("failed to launch handler for {url}: {source}")]
    Launch {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// Hands entry links to whatever handles them outside the map.
pub trait LinkOpener: Send + Sync {
    fn can_open(&self, url: &str) -> bool;
    fn open(&self, url: &str) -> Result<(), LinkError>;
}

/// Opens links with the platform's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLinkOpener;

const OPENABLE_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];

impl LinkOpener for SystemLinkOpener {
    fn can_open(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| OPENABLE_SCHEMES.contains(&u.scheme()))
            .unwrap_or(false)
    }

    fn open(&self, url: &str) -> Result<(), LinkError> {
        if !self.can_open(url) {
            return Err(LinkError::Unsupported(url.to_string()));
        }
        open::that_detached(url).map_err(|source| LinkError::Launch {
            url: url.to_string(),
            source,
        })
    }
}
