//! Matching pools: the global population and per-community scopes.

use crate::error::{CoffeeError, Result};
use crate::store::{Filter, Query, Record, RecordStore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::warn;

pub mod field {
    pub const SLUG: &str = "Slug";
    pub const NAME: &str = "Name";
    pub const MIN_ACTIVE: &str = "Min_Active";
    pub const STATUS: &str = "Status";
    pub const DELETED: &str = "Deleted";
}

/// Communities without an explicit threshold still need two people to pair.
pub const DEFAULT_MIN_ACTIVE: u32 = 2;

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static regex"))
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug_re().is_match(slug) {
        Ok(())
    } else {
        Err(CoffeeError::InvalidSlug(slug.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// An independent matching scope. Serialized as its matching-context string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Pool {
    Global,
    Community(String),
}

impl Pool {
    pub fn community(slug: &str) -> Result<Self> {
        validate_slug(slug)?;
        Ok(Pool::Community(slug.to_string()))
    }

    /// The `matching_context` value stored on participants and pairings.
    pub fn context(&self) -> String {
        match self {
            Pool::Global => "global".to_string(),
            Pool::Community(slug) => format!("community:{slug}"),
        }
    }

    /// Parse a matching context. Blank means global.
    pub fn parse(context: &str) -> Result<Self> {
        let context = context.trim();
        if context.is_empty() || context == "global" {
            return Ok(Pool::Global);
        }
        match context.strip_prefix("community:") {
            Some(slug) => Pool::community(slug)
                .map_err(|_| CoffeeError::InvalidPool(context.to_string())),
            None => Err(CoffeeError::InvalidPool(context.to_string())),
        }
    }

    /// Filter selecting records whose `field` places them in this pool.
    /// Global also claims records with no context at all.
    pub fn filter(&self, field: &str) -> Filter {
        match self {
            Pool::Global => Filter::Or(vec![
                Filter::eq(field, "global"),
                Filter::is_blank(field),
            ]),
            Pool::Community(_) => Filter::eq(field, self.context()),
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Pool::Global)
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.context())
    }
}

impl From<Pool> for String {
    fn from(pool: Pool) -> Self {
        pool.context()
    }
}

impl TryFrom<String> for Pool {
    type Error = CoffeeError;

    fn try_from(s: String) -> Result<Self> {
        Pool::parse(&s)
    }
}

// ---------------------------------------------------------------------------
// Community
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Community {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub min_active: u32,
}

impl Community {
    pub fn from_record(record: &Record, table: &str) -> Result<Self> {
        let slug = record
            .text(field::SLUG)
            .ok_or_else(|| record.invalid(table, "missing slug"))?
            .trim()
            .to_string();
        validate_slug(&slug).map_err(|e| record.invalid(table, e.to_string()))?;
        let min_active = record
            .number(field::MIN_ACTIVE)
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32)
            .unwrap_or(DEFAULT_MIN_ACTIVE);
        Ok(Self {
            id: record.id.clone(),
            name: record.text(field::NAME).unwrap_or(&slug).to_string(),
            slug,
            min_active,
        })
    }

    pub fn pool(&self) -> Pool {
        Pool::Community(self.slug.clone())
    }
}

/// Active, not soft-deleted communities in store order. Malformed rows are
/// skipped with a warning; a failed query is returned as an error.
pub fn fetch_active(store: &dyn RecordStore, table: &str) -> Result<Vec<Community>> {
    let query = Query::filter(Filter::And(vec![
        Filter::eq(field::STATUS, "Active"),
        Filter::is_false(field::DELETED),
    ]));
    let records = store.select(table, &query)?;
    Ok(records
        .iter()
        .filter_map(|r| match Community::from_record(r, table) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(error = %e, "skipping malformed community");
                None
            }
        })
        .collect())
}
