//! Request and response value types passed between callers, the router and the network.

use bytes::Bytes;
use reqwest::Method;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// What kind of resource the caller intends to use the response as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Destination {
  /// A top-level or nested document
  Document,
  Image,
  Font,
  Script,
  Style,
  /// fetch()/XHR and anything else without a specific destination
  #[default]
  Other,
}

impl FromStr for Destination {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "document" => Ok(Self::Document),
      "image" => Ok(Self::Image),
      "font" => Ok(Self::Font),
      "script" => Ok(Self::Script),
      "style" => Ok(Self::Style),
      "" | "other" => Ok(Self::Other),
      other => Err(format!("unknown destination: {}", other)),
    }
  }
}

impl fmt::Display for Destination {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Document => "document",
      Self::Image => "image",
      Self::Font => "font",
      Self::Script => "script",
      Self::Style => "style",
      Self::Other => "other",
    };
    f.write_str(name)
  }
}

/// An outbound request as seen by the router.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  /// Set for page navigations (address bar, link clicks, form GETs)
  pub navigate: bool,
  pub destination: Destination,
}

impl Request {
  /// A plain GET request with no particular destination.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      navigate: false,
      destination: Destination::Other,
    }
  }

  /// A GET page navigation.
  pub fn navigation(url: Url) -> Self {
    Self {
      navigate: true,
      destination: Destination::Document,
      ..Self::get(url)
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn is_get(&self) -> bool {
    self.method == Method::GET
  }
}

/// A response snapshot: status, headers and the full body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  /// Header pairs in the order they were received
  pub headers: Vec<(String, String)>,
  pub body: Bytes,
}

impl Response {
  pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
    Self {
      status,
      headers,
      body: body.into(),
    }
  }

  /// A 200 response with a single Content-Type header.
  pub fn ok_with_type(content_type: &str, body: impl Into<Bytes>) -> Self {
    Self::new(
      200,
      vec![("content-type".to_string(), content_type.to_string())],
      body,
    )
  }

  /// Whether the status is in the 2xx range.
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Case-insensitive header lookup, first match wins.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn content_type(&self) -> Option<&str> {
    self.header("content-type")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_destination_parse() {
    assert_eq!("image".parse::<Destination>(), Ok(Destination::Image));
    assert_eq!("IMAGE".parse::<Destination>(), Ok(Destination::Image));
    assert_eq!("".parse::<Destination>(), Ok(Destination::Other));
    assert!("video".parse::<Destination>().is_err());
  }

  #[test]
  fn test_navigation_request() {
    let req = Request::navigation(Url::parse("https://cards.test/create").unwrap());
    assert!(req.navigate);
    assert!(req.is_get());
    assert_eq!(req.destination, Destination::Document);
  }

  #[test]
  fn test_header_lookup_is_case_insensitive() {
    let resp = Response::new(
      200,
      vec![("Content-Type".to_string(), "text/css".to_string())],
      "body",
    );
    assert_eq!(resp.content_type(), Some("text/css"));
    assert_eq!(resp.header("x-missing"), None);
  }

  #[test]
  fn test_is_ok_range() {
    assert!(Response::new(204, vec![], "").is_ok());
    assert!(!Response::new(304, vec![], "").is_ok());
    assert!(!Response::new(500, vec![], "").is_ok());
  }
}
