//! Runtime control messages sent by the application to the router.

use serde::Deserialize;

use crate::error::{Error, Result};

/// A control message, in the `{"type": ..., "payload": ...}` shape pages post.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
  /// Activate now instead of waiting for older instances to go away
  SkipWaiting,
  /// Fetch and store these URLs in the dynamic namespace
  CacheUrls(Vec<String>),
  /// Delete every namespace
  CleanCache,
}

impl ControlMessage {
  pub fn from_json(json: &str) -> Result<Self> {
    serde_json::from_str(json).map_err(|e| Error::InvalidMessage(e.to_string()))
  }
}

/// What handling a control message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
  /// Skip-waiting recorded; `activated` tells whether activation ran now
  SkipWaiting { activated: bool },
  /// Number of URLs stored
  Cached(usize),
  /// Names of the namespaces removed
  Cleaned(Vec<String>),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_messages() {
    assert_eq!(
      ControlMessage::from_json(r#"{"type":"SKIP_WAITING"}"#).unwrap(),
      ControlMessage::SkipWaiting
    );
    assert_eq!(
      ControlMessage::from_json(r#"{"type":"CLEAN_CACHE"}"#).unwrap(),
      ControlMessage::CleanCache
    );
    assert_eq!(
      ControlMessage::from_json(r#"{"type":"CACHE_URLS","payload":["/a","/b"]}"#).unwrap(),
      ControlMessage::CacheUrls(vec!["/a".to_string(), "/b".to_string()])
    );
  }

  #[test]
  fn test_reject_unknown_messages() {
    assert!(matches!(
      ControlMessage::from_json(r#"{"type":"SELF_DESTRUCT"}"#),
      Err(Error::InvalidMessage(_))
    ));
    assert!(ControlMessage::from_json(r#"{"type":"CACHE_URLS"}"#).is_err());
    assert!(ControlMessage::from_json("not json").is_err());
  }
}
