use std::path::{Component, Path, PathBuf};

use pmoconfig::Config;
use tracing::debug;

use crate::errors::CastError;

/// Maps a local track file to an URL the receiver can fetch.
pub trait UrlResolver: Send + Sync {
    fn resolve_url(&self, path: &Path) -> Result<String, CastError>;
}

/// Resolver for a media HTTP server publishing one library root.
///
/// `<root>/Artist/Album/01 Song.flac` becomes
/// `http://<address>:<port>/Artist/Album/01%20Song.flac`.
#[derive(Clone, Debug)]
pub struct MediaRootResolver {
    root: PathBuf,
    address: String,
    port: u16,
}

impl MediaRootResolver {
    pub fn new(root: impl Into<PathBuf>, address: impl Into<String>, port: u16) -> Self {
        Self {
            root: root.into(),
            address: address.into(),
            port,
        }
    }

    /// Builds the resolver from the `host.media_server` section.
    pub fn from_config(config: &Config) -> Result<Self, CastError> {
        let root = config
            .get_media_root()
            .map_err(|e| CastError::Config(e.to_string()))?;
        Ok(Self::new(
            root,
            config.get_media_server_address(),
            config.get_media_server_port(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}

impl UrlResolver for MediaRootResolver {
    fn resolve_url(&self, path: &Path) -> Result<String, CastError> {
        let unresolvable = || CastError::UnresolvableTrack(path.display().to_string());

        let relative = path.strip_prefix(&self.root).map_err(|_| unresolvable())?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    segments.push(urlencoding::encode(&part.to_string_lossy()).into_owned())
                }
                Component::CurDir => {}
                // no escaping the media root
                _ => return Err(unresolvable()),
            }
        }
        if segments.is_empty() {
            return Err(unresolvable());
        }

        let url = format!("{}/{}", self.base_url(), segments.join("/"));
        debug!(path = %path.display(), url = %url, "Resolved track URL");
        Ok(url)
    }
}
