/// Telemetry event types understood by `hm://event-service/v1/events`. Only
/// `Language` is ever built by this core; the rest exist because they are
/// part of the same wire enum and a caller may want to send one verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Language,
    FetchedFileId,
    NewSessionId,
    NewPlaybackId,
    TrackPlayed,
    TrackTransition,
    CdnRequest,
}

impl EventType {
    fn id(self) -> &'static str {
        match self {
            Self::Language => "812",
            Self::FetchedFileId => "274",
            Self::NewSessionId => "557",
            Self::NewPlaybackId => "558",
            Self::TrackPlayed => "372",
            Self::TrackTransition => "12",
            Self::CdnRequest => "10",
        }
    }

    fn unknown(self) -> u8 {
        match self {
            Self::Language => 1,
            Self::FetchedFileId => 3,
            Self::NewSessionId => 3,
            Self::NewPlaybackId => 1,
            Self::TrackPlayed => 1,
            Self::TrackTransition => 37,
            Self::CdnRequest => 20,
        }
    }
}

/// Builds the tab-separated event body the event-service endpoint expects:
/// an id, an "unknown" counter byte, then any number of appended fields.
pub struct EventBuilder {
    body: Vec<u8>,
}

impl EventBuilder {
    pub fn new(event_type: EventType) -> Self {
        let mut builder = Self { body: Vec::new() };
        builder.append_no_delimiter(event_type.id());
        builder.append_byte(event_type.unknown());
        builder
    }

    fn append_no_delimiter(&mut self, s: &str) {
        self.body.extend_from_slice(s.as_bytes());
    }

    pub fn append_byte(&mut self, c: u8) -> &mut Self {
        self.body.push(0x09);
        self.body.push(c);
        self
    }

    pub fn append_str(&mut self, s: &str) -> &mut Self {
        self.body.push(0x09);
        self.append_no_delimiter(s);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }
}

/// Build the `LANGUAGE` event body for `lang` (e.g. `"en"`). Sending it is
/// the caller's responsibility: `Session::set_language` posts it over
/// Mercury.
pub fn language_event(lang: &str) -> Vec<u8> {
    let mut builder = EventBuilder::new(EventType::Language);
    builder.append_str(lang);
    builder.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_event_carries_id_unknown_and_locale() {
        let body = language_event("en");
        assert_eq!(body, b"812\t\x01\ten");
    }
}
