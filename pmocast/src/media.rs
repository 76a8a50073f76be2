//! Media descriptors sent to the receiver, and the correlation tag carried
//! in their custom data.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::model::{CorrelationId, Track};

/// Key of the correlation tag inside the descriptor custom data.
pub const CORRELATION_KEY: &str = "correlation";

/// Music metadata displayed by the receiver.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MusicMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_name: Option<String>,
}

/// Description of one playable item, as accepted by the adapter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MediaDescriptor {
    pub content_id: String,
    pub content_type: String,
    pub metadata: Option<MusicMetadata>,
    pub custom_data: Option<Value>,
}

impl MediaDescriptor {
    /// Builds the descriptor for `track` served at `url`.
    pub fn new(url: &str, track: &Track, custom_data: Option<Value>) -> Self {
        Self {
            content_id: url.to_string(),
            content_type: content_type_for(url).to_string(),
            metadata: Some(MusicMetadata {
                title: Some(track.name.clone()),
                artist: Some(track.artist.clone()),
                album_name: Some(track.album.clone()),
            }),
            custom_data,
        }
    }

    /// Builds the descriptor and embeds `correlation` in its custom data.
    pub fn tagged(url: &str, track: &Track, correlation: &CorrelationId) -> Self {
        Self::new(url, track, Some(correlation_custom_data(correlation)))
    }

    /// Correlation tag echoed in this descriptor, if it survived the trip.
    pub fn correlation(&self) -> Option<CorrelationId> {
        correlation_tag(self.custom_data.as_ref())
    }
}

/// Custom data map carrying a correlation tag.
pub fn correlation_custom_data(correlation: &CorrelationId) -> Value {
    let mut map = Map::new();
    map.insert(
        CORRELATION_KEY.to_string(),
        Value::String(correlation.to_string()),
    );
    Value::Object(map)
}

/// Extracts the correlation tag from opaque custom data.
///
/// Returns `None` when the data is absent, is not an object, or holds no
/// parseable tag.
pub fn correlation_tag(custom_data: Option<&Value>) -> Option<CorrelationId> {
    custom_data?
        .as_object()?
        .get(CORRELATION_KEY)?
        .as_str()
        .and_then(CorrelationId::parse)
}

/// Guesses the MIME type from the URL extension.
fn content_type_for(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".flac") {
        "audio/flac"
    } else if path.ends_with(".mp3") {
        "audio/mpeg"
    } else if path.ends_with(".ogg") || path.ends_with(".oga") {
        "audio/ogg"
    } else if path.ends_with(".m4a") || path.ends_with(".aac") {
        "audio/mp4"
    } else if path.ends_with(".wav") {
        "audio/wav"
    } else {
        "audio/flac"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track() -> Track {
        Track::new("Nina Simone", "Pastel Blues", "Sinnerman", "/music/sinnerman.flac")
    }

    #[test]
    fn test_tagged_descriptor_round_trips_correlation() {
        let id = CorrelationId::mint();
        let media = MediaDescriptor::tagged("http://10.0.0.2:8090/a.mp3", &track(), &id);
        assert_eq!(media.correlation(), Some(id));
        assert_eq!(media.content_type, "audio/mpeg");
        let metadata = media.metadata.unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Sinnerman"));
        assert_eq!(metadata.album_name.as_deref(), Some("Pastel Blues"));
    }

    #[test]
    fn test_correlation_tag_rejects_foreign_data() {
        assert_eq!(correlation_tag(None), None);
        assert_eq!(correlation_tag(Some(&json!("plain string"))), None);
        assert_eq!(correlation_tag(Some(&json!({ "UUID": "x" }))), None);
        assert_eq!(correlation_tag(Some(&json!({ "correlation": 42 }))), None);
        assert_eq!(correlation_tag(Some(&json!({ "correlation": "nope" }))), None);
    }

    #[test]
    fn test_content_type_detection() {
        assert_eq!(content_type_for("http://h/x.FLAC"), "audio/flac");
        assert_eq!(content_type_for("http://h/x.oga?t=1"), "audio/ogg");
        assert_eq!(content_type_for("http://h/x.m4a"), "audio/mp4");
        assert_eq!(content_type_for("http://h/x.wav"), "audio/wav");
        assert_eq!(content_type_for("http://h/x"), "audio/flac");
    }
}
