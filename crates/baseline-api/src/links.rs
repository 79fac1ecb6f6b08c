//! Paged response envelope and offset-pagination links.

use serde::Serialize;

pub const DEFAULT_LIMIT: usize = 50;
/// Largest page a caller may request.
pub const MAX_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
  pub count:           usize,
  pub total_available: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
  pub first:    String,
  pub next:     Option<String>,
  pub previous: Option<String>,
  pub last:     String,
}

/// `{meta, links, data}` response body.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub meta:  Meta,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub links: Option<Links>,
  pub data:  Vec<T>,
}

impl<T> Page<T> {
  /// A complete, unpaged result set.
  pub fn all(data: Vec<T>) -> Self {
    Self {
      meta: Meta {
        count:           data.len(),
        total_available: data.len(),
      },
      links: None,
      data,
    }
  }
}

/// Build first/next/previous/last links for `path`.
///
/// `params` are the caller's other query parameters, repeated on every link;
/// `limit` and `offset` are appended last.
pub fn page_links(
  path: &str,
  params: &[(&str, String)],
  limit: usize,
  offset: usize,
  total: usize,
) -> Links {
  let limit = limit.max(1);
  let link = |offset: usize| {
    let query: String = params
      .iter()
      .map(|(k, v)| format!("{k}={}&", urlencoding::encode(v)))
      .collect();
    format!("{path}?{query}limit={limit}&offset={offset}")
  };

  let last_offset = total.saturating_sub(1) / limit * limit;
  let next = offset.saturating_add(limit);
  Links {
    first:    link(0),
    next:     (next < total).then(|| link(next)),
    previous: (offset > 0).then(|| link(offset.saturating_sub(limit))),
    last:     link(last_offset),
  }
}
