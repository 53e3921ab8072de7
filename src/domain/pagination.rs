//! Offset and cursor pagination models.
//!
//! Offset pages are addressed by page number against a total count. Cursor
//! pages are addressed by an opaque [`Cursor`] that encodes the position of the
//! last record seen, in the total order `(sort value, key)`.

use std::cmp::Ordering;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::domain::entities::{Entity, EntityId};

/// Upper bound on a single page, offset or cursor.
pub const MAX_PAGE_SIZE: u32 = 10_000;

/// Offset-pagination request. Pages are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PagingInfo {
    #[validate(range(min = 1))]
    pub page: u32,

    #[validate(range(min = 1, max = 10000))]
    pub page_size: u32,
}

impl PagingInfo {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Number of records to skip. Only meaningful for validated paging.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One window of an offset-paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<E> {
    pub items: Vec<E>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<E> Page<E> {
    /// Index of the last non-empty page; 1 for an empty listing.
    pub fn last_page(&self) -> u32 {
        if self.total == 0 || self.page_size == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn has_more(&self) -> bool {
        self.page < self.last_page()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordering for cursor pagination.
///
/// Without a field, records are ordered by key. With a field, ties are broken
/// by key in the same direction, so the order is always total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: Option<String>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn by_key() -> Self {
        Self::default()
    }

    pub fn by(field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            direction: SortDirection::Asc,
        }
    }

    pub fn descending(mut self) -> Self {
        self.direction = SortDirection::Desc;
        self
    }

    /// Sort value of a serialized entity. Missing fields sort as `null`.
    pub fn value_of(&self, document: &Value) -> Value {
        match &self.field {
            Some(field) => document.get(field).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        }
    }

    /// Compares two `(sort value, key)` positions under this spec.
    pub fn compare(&self, a: (&Value, EntityId), b: (&Value, EntityId)) -> Ordering {
        let ordering = compare_json(a.0, b.0).then(a.1.cmp(&b.1));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Total order over JSON values, matching PostgreSQL's `jsonb` ordering:
/// `null < string < number < boolean < array < object`.
pub fn compare_json(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::String(_) => 1,
            Value::Number(_) => 2,
            Value::Bool(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or_default()
                .total_cmp(&y.as_f64().unwrap_or_default()),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Opaque position token handed out by cursor pagination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded content of a [`Cursor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub field: Option<String>,
    pub value: Value,
    pub key: EntityId,
}

impl CursorPosition {
    /// Position of `entity` under `sort`. `None` for entities without a key.
    pub fn of<E: Entity>(entity: &E, sort: &SortSpec) -> Result<Option<Self>, serde_json::Error> {
        let Some(key) = entity.key() else {
            return Ok(None);
        };
        let document = serde_json::to_value(entity)?;

        Ok(Some(Self {
            field: sort.field.clone(),
            value: sort.value_of(&document),
            key,
        }))
    }

    pub fn encode(&self) -> Result<Cursor, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Cursor(URL_SAFE_NO_PAD.encode(bytes)))
    }

    pub fn decode(cursor: &Cursor) -> Result<Self, String> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor.as_str())
            .map_err(|e| format!("malformed cursor: {}", e))?;
        serde_json::from_slice(&bytes).map_err(|e| format!("malformed cursor: {}", e))
    }
}

/// Cursor-pagination request. `cursor: None` starts from the beginning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CursorRequest {
    pub cursor: Option<Cursor>,

    #[validate(range(min = 1, max = 10000))]
    pub page_size: u32,

    pub sort: SortSpec,
}

impl CursorRequest {
    pub fn first(page_size: u32, sort: SortSpec) -> Self {
        Self {
            cursor: None,
            page_size,
            sort,
        }
    }

    /// The request for the page after `result`, or `None` at the end.
    pub fn next<E>(&self, result: &CursorResult<E>) -> Option<Self> {
        result.next_cursor.as_ref().map(|cursor| Self {
            cursor: Some(cursor.clone()),
            page_size: self.page_size,
            sort: self.sort.clone(),
        })
    }
}

/// One window of a cursor-paginated listing.
///
/// `has_more` is derived from `next_cursor`, so a result without more pages
/// never carries a cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorResult<E> {
    pub items: Vec<E>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

impl<E> CursorResult<E> {
    pub fn new(items: Vec<E>, next_cursor: Option<Cursor>) -> Self {
        let has_more = next_cursor.is_some();
        Self {
            items,
            next_cursor,
            has_more,
        }
    }
}
