//! Paginated and Stream results for list methods.
//!
//! Management api list endpoints return one page of items plus a
//! continuation token; the next page is requested by repeating the request
//! with the token in the `x-continuation` header.
//!
//! `PagedResult<T>` holds the first page and the information needed to fetch
//! the rest, either as a stream with [`into_stream()`](PagedResult::into_stream)
//! or collected into a vector with [`collect_all()`](PagedResult::collect_all).
//!
use std::{fmt, ops::Deref, sync::Arc};

use futures::{
    StreamExt,
    stream::{BoxStream, unfold},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned, ser::Serializer};
use serde_json::Value;
use tracing::error;

use crate::{
    Result,
    error::KontentError,
    http_client::{HttpClient, HttpRequest},
};

/// One page of a list response.
#[derive(Debug, Deserialize, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page.
    #[serde(default)]
    pub continuation_token: Option<String>,
}

impl<T> Page<T> {
    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no items in this page.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the items in this page (may need to get next page for all).
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

/// A paginated result converted to a stream of all items.
///
/// `PagedResult<T>` implements `Deref` to `Page<T>`, so the first page is
/// available directly through `.items`, `.len()`, and `.iter()`.
///
/// # Example
///
/// ```rust,no_run
/// use kontent::prelude::*;
/// use futures::StreamExt;
///
/// # async fn example(client: &KontentClient) -> Result<(), KontentError> {
/// // Stream all items from all pages
/// let mut stream = client.entities(Collection::ContentItems).list().await?.into_stream();
/// while let Some(item) = stream.next().await {
///     let item = item?;
///     println!("{}", item["codename"]);
/// }
///
/// // Or collect all items
/// let all_assets = client.entities(Collection::Assets).list().await?.collect_all().await?;
/// # Ok(())
/// # }
/// ```
pub struct PagedResult<T> {
    page: Page<T>,
    refill: Option<Refill>,
}

// client and request object needed to get the next page
#[derive(Clone)]
struct Refill {
    client: Arc<HttpClient>,
    request: HttpRequest,
    items_key: &'static str,
}

impl<T: DeserializeOwned> PagedResult<T> {
    /// Wraps the first page response returned by `request`.
    pub(crate) fn from_first_page(
        response: Value,
        items_key: &'static str,
        client: Arc<HttpClient>,
        request: HttpRequest,
    ) -> Result<Self> {
        let page = parse_page(response, items_key)?;
        Ok(Self {
            page,
            refill: Some(Refill {
                client,
                request,
                items_key,
            }),
        })
    }
}

impl<T> PagedResult<T> {
    /// Creates a single-page result from a complete list of items.
    pub fn from_items(items: Vec<T>) -> Self {
        Self {
            page: Page {
                items,
                continuation_token: None,
            },
            refill: None,
        }
    }

    /// Consumes this result and returns the first page.
    pub fn into_page(self) -> Page<T> {
        self.page
    }
}

impl<T> Deref for PagedResult<T> {
    type Target = Page<T>;

    fn deref(&self) -> &Self::Target {
        &self.page
    }
}

impl<T: fmt::Debug> fmt::Debug for PagedResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagedResult")
            .field("page", &self.page)
            .finish()
    }
}

impl<T: Serialize> Serialize for PagedResult<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.page.serialize(serializer)
    }
}

/// Parse a list response. Paged endpoints return
/// `{ <items_key>: [...], pagination: { continuation_token } }`; a few endpoints
/// return a bare array, or an object with the items and no pagination.
pub(crate) fn parse_page<T: DeserializeOwned>(
    response: Value,
    items_key: &'static str,
) -> Result<Page<T>> {
    let (items, continuation_token) = match response {
        Value::Array(_) => (response, None),
        Value::Object(mut map) => {
            let token = map
                .get("pagination")
                .and_then(|p| p.get("continuation_token"))
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(ToString::to_string);
            let items = map
                .remove(items_key)
                .unwrap_or_else(|| Value::Array(Vec::new()));
            (items, token)
        }
        Value::Null => (Value::Array(Vec::new()), None),
        other => {
            return Err(KontentError::Other {
                message: format!("unexpected list response for '{items_key}': {other}"),
            });
        }
    };
    let items = serde_path_to_error::deserialize(items).map_err(|err| {
        error!("Deserialization failed at {items_key}.{}: {}", err.path(), err);
        KontentError::Deserialization {
            source: err.into_inner(),
        }
    })?;
    Ok(Page {
        items,
        continuation_token,
    })
}

type StreamState<T> = (std::vec::IntoIter<T>, Option<String>, Option<Refill>, bool);

impl<T: DeserializeOwned + Send + 'static> PagedResult<T> {
    /// Converts this paginated result into a stream of all items across all pages.
    ///
    /// The stream yields items from the first page immediately, then fetches
    /// subsequent pages while the server returns a continuation token.
    pub fn into_stream(self) -> BoxStream<'static, Result<T>> {
        let state: StreamState<T> = (
            self.page.items.into_iter(),
            self.page.continuation_token,
            self.refill,
            false,
        );

        unfold(
            state,
            move |(mut items, token, refill, errored)| async move {
                // If we've already errored, stop the stream
                if errored {
                    return None;
                }

                if let Some(item) = items.next() {
                    return Some((Ok(item), (items, token, refill, false)));
                }

                // Current page exhausted, fetch next page if available.
                // Empty pages that still carry a token are skipped.
                let mut token = token;
                while let Some(next_token) = token.take() {
                    let Some(refill) = refill.as_ref() else {
                        break;
                    };
                    let next_request = refill.request.with_continuation(&next_token);
                    let page = match refill.client.send::<Value>(next_request).await {
                        Ok(response) => parse_page::<T>(response, refill.items_key),
                        Err(e) => Err(e),
                    };
                    match page {
                        Ok(page) => {
                            let mut new_items = page.items.into_iter();
                            token = page.continuation_token;
                            if let Some(item) = new_items.next() {
                                return Some((Ok(item), (new_items, token, Some(refill.clone()), false)));
                            }
                        }
                        Err(e) => {
                            return Some((Err(e), (items, None, None, true)));
                        }
                    }
                }
                None
            },
        )
        .boxed()
    }

    /// Collects all items from all pages into a vector.
    /// Stops on the first error encountered.
    pub async fn collect_all(self) -> Result<Vec<T>> {
        let mut stream = self.into_stream();
        let mut items = Vec::new();

        while let Some(result) = stream.next().await {
            items.push(result?);
        }

        Ok(items)
    }
}

impl<'a, T> IntoIterator for &'a PagedResult<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.page.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_paged_object_response() {
        let page: Page<Value> = parse_page(
            json!({
                "types": [{"codename": "article"}],
                "pagination": {"continuation_token": "abc", "next_page": "https://next"}
            }),
            "types",
        )
        .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.continuation_token.as_deref(), Some("abc"));
    }

    #[test]
    fn parse_bare_array_response() {
        let page: Page<Value> = parse_page(json!([{"id": "1"}, {"id": "2"}]), "workflows").unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.continuation_token.is_none());
    }

    #[test]
    fn parse_unpaged_object_response() {
        let page: Page<Value> = parse_page(
            json!({"folders": [{"id": "f"}], "last_modified": "2024-01-01T00:00:00Z"}),
            "folders",
        )
        .unwrap();
        assert_eq!(page.len(), 1);
        assert!(page.continuation_token.is_none());
    }

    #[test]
    fn parse_missing_items_key_is_empty() {
        let page: Page<Value> = parse_page(
            json!({"pagination": {"continuation_token": null}}),
            "items",
        )
        .unwrap();
        assert!(page.is_empty());
    }

    #[test]
    fn parse_rejects_scalar_response() {
        assert!(parse_page::<Value>(json!("nope"), "items").is_err());
    }

    #[tokio::test]
    async fn single_page_collects_without_client() {
        let result = PagedResult::from_items(vec![1, 2, 3]);
        assert_eq!(result.len(), 3);
        assert_eq!(result.collect_all().await.unwrap(), vec![1, 2, 3]);
    }
}
