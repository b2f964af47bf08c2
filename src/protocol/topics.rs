//! Topic templating and response topic matching
//!
//! Protocol topics have exactly four `/`-separated segments,
//! `@/<peer-identifier>/<CMD|RSP>/<FORMAT>`. Templates name the peer and
//! format positions with placeholder segments (`server_mac`, `client_mac`,
//! `format`); rendering is plain segment substitution.

use super::messages::Format;
use regex::Regex;
use thiserror::Error;

/// Placeholder for the slave address in command topic templates
pub const SERVER_PLACEHOLDER: &str = "server_mac";

/// Placeholder for the master address in response topic templates
pub const CLIENT_PLACEHOLDER: &str = "client_mac";

/// Placeholder for the format token, always the last segment
pub const FORMAT_PLACEHOLDER: &str = "format";

/// Number of segments every protocol topic resolves to
pub const TOPIC_SEGMENTS: usize = 4;

/// Single-level MQTT wildcard, used to subscribe to every response format
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// A parsed command or response topic template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTemplate {
    segments: Vec<String>,
    peer_index: usize,
}

impl TopicTemplate {
    /// Parse a template whose peer position is marked by `peer_placeholder`
    pub fn parse(template: &str, peer_placeholder: &str) -> Result<Self, TemplateError> {
        let segments: Vec<String> = template.split('/').map(str::to_string).collect();

        if segments.len() != TOPIC_SEGMENTS {
            return Err(TemplateError::SegmentCount {
                template: template.to_string(),
                found: segments.len(),
            });
        }

        if segments.last().map(String::as_str) != Some(FORMAT_PLACEHOLDER) {
            return Err(TemplateError::FormatNotLast(template.to_string()));
        }

        let peer_index = segments
            .iter()
            .position(|segment| segment == peer_placeholder)
            .ok_or_else(|| TemplateError::MissingPeer {
                template: template.to_string(),
                placeholder: peer_placeholder.to_string(),
            })?;

        Ok(Self {
            segments,
            peer_index,
        })
    }

    /// Parse a command topic template (`server_mac` placeholder)
    pub fn command(template: &str) -> Result<Self, TemplateError> {
        Self::parse(template, SERVER_PLACEHOLDER)
    }

    /// Parse a response topic template (`client_mac` placeholder)
    pub fn response(template: &str) -> Result<Self, TemplateError> {
        Self::parse(template, CLIENT_PLACEHOLDER)
    }

    /// Build a concrete topic for `peer` and `format`
    pub fn render(&self, peer: &str, format: Format) -> String {
        self.render_with(peer, format.as_str())
    }

    /// Topic filter matching the responses for `peer` in every format
    pub fn subscription_filter(&self, peer: &str) -> String {
        self.render_with(peer, SINGLE_LEVEL_WILDCARD)
    }

    fn render_with(&self, peer: &str, format_token: &str) -> String {
        let last = self.segments.len() - 1;
        self.segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                if index == self.peer_index {
                    peer
                } else if index == last {
                    format_token
                } else {
                    segment.as_str()
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Anchored pattern matching this template for `peer` and any format token
    ///
    /// Matching is exact and case-sensitive; literal segments and the peer
    /// identifier are escaped.
    pub fn matcher(&self, peer: &str) -> Result<Regex, TemplateError> {
        let formats = Format::ALL
            .iter()
            .map(|format| format.as_str())
            .collect::<Vec<_>>()
            .join("|");

        let last = self.segments.len() - 1;
        let body = self
            .segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                if index == self.peer_index {
                    regex::escape(peer)
                } else if index == last {
                    format!("({formats})")
                } else {
                    regex::escape(segment)
                }
            })
            .collect::<Vec<_>>()
            .join("/");

        Regex::new(&format!("^{body}$")).map_err(|e| TemplateError::Pattern(e.to_string()))
    }
}

/// Template parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("Topic template '{template}' must have 4 segments, found {found}")]
    SegmentCount { template: String, found: usize },
    #[error("Topic template '{0}' must end with the 'format' placeholder")]
    FormatNotLast(String),
    #[error("Topic template '{template}' has no '{placeholder}' segment")]
    MissingPeer {
        template: String,
        placeholder: String,
    },
    #[error("Invalid topic pattern: {0}")]
    Pattern(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn command_template() -> TopicTemplate {
        TopicTemplate::command("@/server_mac/CMD/format").unwrap()
    }

    fn response_template() -> TopicTemplate {
        TopicTemplate::response("@/client_mac/RSP/format").unwrap()
    }

    fn any_format() -> impl Strategy<Value = Format> {
        prop::sample::select(Format::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn rendered_topic_has_four_segments_and_format_last(
            peer in "[0-9A-Fa-f]{12}",
            format in any_format()
        ) {
            let topic = command_template().render(&peer, format);
            let segments: Vec<&str> = topic.split('/').collect();
            prop_assert_eq!(segments.len(), 4);
            prop_assert_eq!(segments[3], format.as_str());
            prop_assert_eq!(segments[1], peer.as_str());
        }

        #[test]
        fn matcher_accepts_rendered_response_topics(
            peer in "[0-9A-F]{12}",
            format in any_format()
        ) {
            let template = response_template();
            let matcher = template.matcher(&peer).unwrap();
            prop_assert!(matcher.is_match(&template.render(&peer, format)));
        }
    }

    #[test]
    fn test_protocol_examples() {
        assert_eq!(
            command_template().render("112233445566", Format::AsciiHex),
            "@/112233445566/CMD/ASCIIHEX"
        );
        assert_eq!(
            response_template().render("1234567890AB", Format::Json),
            "@/1234567890AB/RSP/JSON"
        );
    }

    #[test]
    fn test_subscription_filter_uses_wildcard() {
        assert_eq!(
            response_template().subscription_filter("1234567890AB"),
            "@/1234567890AB/RSP/+"
        );
    }

    #[test]
    fn test_substitution_is_segment_exact() {
        // A literal segment that merely contains the placeholder text is kept
        let template = TopicTemplate::parse("formats/server_mac/CMD/format", "server_mac").unwrap();
        assert_eq!(
            template.render("AABBCCDDEEFF", Format::Binary),
            "formats/AABBCCDDEEFF/CMD/BINARY"
        );
    }

    #[test]
    fn test_invalid_templates() {
        assert!(matches!(
            TopicTemplate::command("@/server_mac/format"),
            Err(TemplateError::SegmentCount { found: 3, .. })
        ));
        assert!(matches!(
            TopicTemplate::command("@/server_mac/CMD/format/extra"),
            Err(TemplateError::SegmentCount { found: 5, .. })
        ));
        assert!(matches!(
            TopicTemplate::command("@/server_mac/format/CMD"),
            Err(TemplateError::FormatNotLast(_))
        ));
        assert!(matches!(
            TopicTemplate::command("@/client_mac/CMD/format"),
            Err(TemplateError::MissingPeer { .. })
        ));
    }

    #[test]
    fn test_matcher_is_exact() {
        let matcher = response_template().matcher("1234567890AB").unwrap();

        assert!(matcher.is_match("@/1234567890AB/RSP/ASCII"));
        assert!(matcher.is_match("@/1234567890AB/RSP/ASCIIHEX"));
        assert!(matcher.is_match("@/1234567890AB/RSP/JSON"));
        assert!(matcher.is_match("@/1234567890AB/RSP/BINARY"));

        // Other peer, wrong case, wrong direction, extra segments
        assert!(!matcher.is_match("@/AABBCCDDEEFF/RSP/ASCII"));
        assert!(!matcher.is_match("@/1234567890ab/RSP/ASCII"));
        assert!(!matcher.is_match("@/1234567890AB/CMD/ASCII"));
        assert!(!matcher.is_match("@/1234567890AB/RSP/ASCII/x"));
        assert!(!matcher.is_match("@/1234567890AB/RSP/ascii"));
        assert!(!matcher.is_match("x@/1234567890AB/RSP/ASCII"));
    }
}
