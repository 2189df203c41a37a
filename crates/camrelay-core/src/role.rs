//! Connection roles and handshake classification.
//!
//! A connection is a producer when its `User-Agent` contains the producer
//! marker or its query string carries `source=rpi`; everything else is a
//! consumer. Missing or malformed metadata is never an error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role assigned to a connection at accept time. Never changes afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The camera device feeding frames.
    Producer,
    /// A viewer receiving frames.
    Consumer,
}

impl Role {
    /// Stable lowercase label, used for log fields and metric labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Producer => "producer",
            Self::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handshake metadata captured from the upgrade request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// `User-Agent` header value, if present. Non-UTF-8 bytes are replaced
    /// with U+FFFD rather than discarding the header.
    pub user_agent: Option<String>,
    /// Raw query string (without the leading `?`), if any.
    pub query: Option<String>,
}

impl HandshakeInfo {
    /// Build from optional header and query values.
    pub fn new(user_agent: Option<&str>, query: Option<&str>) -> Self {
        Self {
            user_agent: user_agent.map(str::to_owned),
            query: query.map(str::to_owned),
        }
    }
}

/// What a producer looks like on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProducerSignature {
    /// Substring searched for in the `User-Agent` header.
    pub user_agent_marker: String,
    /// Query parameter name.
    pub source_param: String,
    /// Query parameter value marking a producer.
    pub source_value: String,
}

impl Default for ProducerSignature {
    fn default() -> Self {
        Self {
            user_agent_marker: "Python".into(),
            source_param: "source".into(),
            source_value: "rpi".into(),
        }
    }
}

impl ProducerSignature {
    fn matches_user_agent(&self, user_agent: &str) -> bool {
        !self.user_agent_marker.is_empty() && user_agent.contains(&self.user_agent_marker)
    }

    fn matches_query(&self, query: &str) -> bool {
        query
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .any(|(key, value)| key == self.source_param && value == self.source_value)
    }
}

/// Classify a connection from its handshake metadata.
pub fn classify(info: &HandshakeInfo, signature: &ProducerSignature) -> Role {
    let by_agent = info
        .user_agent
        .as_deref()
        .is_some_and(|ua| signature.matches_user_agent(ua));
    let by_query = info
        .query
        .as_deref()
        .is_some_and(|q| signature.matches_query(q));

    if by_agent || by_query {
        Role::Producer
    } else {
        Role::Consumer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_default(user_agent: Option<&str>, query: Option<&str>) -> Role {
        classify(
            &HandshakeInfo::new(user_agent, query),
            &ProducerSignature::default(),
        )
    }

    #[test]
    fn python_user_agent_is_producer() {
        assert_eq!(
            classify_default(Some("Python/3.11 websockets/12.0"), None),
            Role::Producer
        );
    }

    #[test]
    fn browser_user_agent_is_consumer() {
        assert_eq!(
            classify_default(Some("Mozilla/5.0 (X11; Linux x86_64)"), None),
            Role::Consumer
        );
    }

    #[test]
    fn marker_match_is_case_sensitive() {
        assert_eq!(classify_default(Some("python-requests"), None), Role::Consumer);
    }

    #[test]
    fn source_query_is_producer() {
        assert_eq!(classify_default(None, Some("source=rpi")), Role::Producer);
    }

    #[test]
    fn source_query_not_first_is_producer() {
        assert_eq!(
            classify_default(None, Some("token=abc&source=rpi")),
            Role::Producer
        );
    }

    #[test]
    fn leading_question_mark_is_tolerated() {
        assert_eq!(classify_default(None, Some("?source=rpi")), Role::Producer);
    }

    #[test]
    fn other_source_value_is_consumer() {
        assert_eq!(classify_default(None, Some("source=rpi2")), Role::Consumer);
        assert_eq!(classify_default(None, Some("source=browser")), Role::Consumer);
    }

    #[test]
    fn missing_metadata_is_consumer() {
        assert_eq!(classify_default(None, None), Role::Consumer);
        assert_eq!(classify_default(Some(""), Some("")), Role::Consumer);
    }

    #[test]
    fn malformed_query_is_consumer() {
        assert_eq!(classify_default(None, Some("&&==&source")), Role::Consumer);
    }

    #[test]
    fn empty_marker_never_matches() {
        let signature = ProducerSignature {
            user_agent_marker: String::new(),
            ..ProducerSignature::default()
        };
        let info = HandshakeInfo::new(Some("anything"), None);
        assert_eq!(classify(&info, &signature), Role::Consumer);
    }

    #[test]
    fn custom_signature() {
        let signature = ProducerSignature {
            user_agent_marker: "PiCam".into(),
            source_param: "from".into(),
            source_value: "camera".into(),
        };
        assert_eq!(
            classify(&HandshakeInfo::new(Some("PiCam/2"), None), &signature),
            Role::Producer
        );
        assert_eq!(
            classify(&HandshakeInfo::new(None, Some("from=camera")), &signature),
            Role::Producer
        );
        assert_eq!(
            classify(&HandshakeInfo::new(Some("Python"), Some("source=rpi")), &signature),
            Role::Consumer
        );
    }

    #[test]
    fn role_labels() {
        assert_eq!(Role::Producer.as_str(), "producer");
        assert_eq!(Role::Consumer.to_string(), "consumer");
        assert_eq!(serde_json::to_string(&Role::Producer).unwrap(), "\"producer\"");
    }
}
