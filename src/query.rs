//! Query/filter engine
//!
//! Raw filter input (`FilterArgs`, as it arrives from a query string or the
//! CLI) is normalized into a `LogQuery` before it reaches a storage backend.
//! Normalization never fails: malformed values fall back to defaults.

use crate::error::Result;
use crate::registry::ActionTypeRegistry;
use crate::storage::Storage;
use crate::types::{Behaviour, Level, LogEntry};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default page size
pub const DEFAULT_PER_PAGE: usize = 50;

/// Upper bound for page size
pub const MAX_PER_PAGE: usize = 500;

/// Sort order by `created_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    /// Parse `ASC`/`DESC` case-insensitively; anything else is `Desc`
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("asc") {
            Order::Asc
        } else {
            Order::Desc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// Raw, unvalidated filter arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behaviour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

impl FilterArgs {
    /// Normalize into a backend-ready query
    pub fn normalize(&self) -> LogQuery {
        let (limit, offset) = match parse_int(self.limit.as_deref()) {
            Some(limit) => {
                let limit = clamp_per_page(limit);
                let offset = parse_int(self.offset.as_deref()).unwrap_or(0).max(0) as usize;
                (limit, offset)
            }
            None => {
                let per_page = parse_int(self.per_page.as_deref())
                    .map(clamp_per_page)
                    .unwrap_or(DEFAULT_PER_PAGE);
                let page = parse_int(self.page.as_deref()).unwrap_or(1).max(1) as usize;
                (per_page, (page - 1).saturating_mul(per_page))
            }
        };

        LogQuery {
            owners: split_multi(self.owner.as_deref()),
            action_types: split_multi(self.action_type.as_deref()),
            object_types: split_multi(self.object_type.as_deref()),
            behaviours: dedup(
                split_multi(self.behaviour.as_deref())
                    .iter()
                    .filter_map(|s| Behaviour::parse(s))
                    .collect(),
            ),
            levels: dedup(
                split_multi(self.level.as_deref())
                    .iter()
                    .filter_map(|s| Level::parse(s))
                    .collect(),
            ),
            user_id: self
                .user_id
                .as_deref()
                .and_then(|s| s.trim().parse::<u64>().ok()),
            request_id: self
                .request_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
            date_from: self.date_from.as_deref().and_then(|s| parse_date(s, false)),
            date_to: self.date_to.as_deref().and_then(|s| parse_date(s, true)),
            order: self.order.as_deref().map(Order::parse).unwrap_or_default(),
            limit: Some(limit),
            offset,
        }
    }
}

/// Normalized filter, ordering, and pagination
///
/// Empty sets mean "no constraint". Set members are OR-ed, fields AND-ed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogQuery {
    pub owners: Vec<String>,
    pub action_types: Vec<String>,
    pub object_types: Vec<String>,
    pub behaviours: Vec<Behaviour>,
    pub levels: Vec<Level>,
    pub user_id: Option<u64>,
    pub request_id: Option<String>,
    /// Inclusive lower bound
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub date_to: Option<DateTime<Utc>>,
    pub order: Order,
    /// `None` returns every match
    pub limit: Option<usize>,
    pub offset: usize,
}

impl LogQuery {
    /// Unfiltered, unpaginated, newest first
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owners.push(owner.into());
        self
    }

    pub fn owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owners.extend(owners.into_iter().map(Into::into));
        self
    }

    pub fn action_type(mut self, action_type: impl Into<String>) -> Self {
        self.action_types.push(action_type.into());
        self
    }

    pub fn behaviour(mut self, behaviour: Behaviour) -> Self {
        self.behaviours.push(behaviour);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.levels.push(level);
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// 1-based page of `per_page` entries (clamped to 1..=500)
    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        self.limit = Some(per_page);
        self.offset = page.max(1).saturating_sub(1).saturating_mul(per_page);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same filters, without ordering-dependent pagination
    pub fn unpaginated(&self) -> Self {
        Self {
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }

    /// Page size used for response metadata
    pub fn per_page(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PER_PAGE).max(1)
    }

    /// 1-based page number implied by offset and page size
    pub fn page_number(&self) -> usize {
        self.offset / self.per_page() + 1
    }

    /// Whether an entry satisfies every predicate
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if !self.owners.is_empty() && !self.owners.contains(&entry.owner) {
            return false;
        }
        if !self.action_types.is_empty() && !self.action_types.contains(&entry.action_type) {
            return false;
        }
        if !self.object_types.is_empty() && !self.object_types.contains(&entry.object_type) {
            return false;
        }
        if !self.behaviours.is_empty() && !self.behaviours.contains(&entry.behaviour) {
            return false;
        }
        if !self.levels.is_empty() && !self.levels.contains(&entry.level) {
            return false;
        }
        if let Some(user_id) = self.user_id {
            if entry.user_id != user_id {
                return false;
            }
        }
        if let Some(ref request_id) = self.request_id {
            if entry.request_id != *request_id {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if entry.created_at > to {
                return false;
            }
        }
        true
    }

    /// Filter, order, and slice an unordered candidate set
    ///
    /// Used by backends that cannot push the query down.
    pub fn apply(&self, entries: impl IntoIterator<Item = LogEntry>) -> Vec<LogEntry> {
        let mut matched: Vec<LogEntry> = entries.into_iter().filter(|e| self.matches(e)).collect();
        // Stable sort, so ties keep insertion order (reversed for DESC)
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if self.order == Order::Desc {
            matched.reverse();
        }

        let start = self.offset.min(matched.len());
        let mut page = matched.split_off(start);
        if let Some(limit) = self.limit {
            page.truncate(limit);
        }
        page
    }

    /// UTC day bounds implied by the date filters
    pub fn day_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (
            self.date_from.map(|d| d.date_naive()),
            self.date_to.map(|d| d.date_naive()),
        )
    }
}

/// One page of query results, as returned by the read API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPage {
    pub data: Vec<LogEntry>,
    pub total: u64,
    pub page: usize,
    pub per_page: usize,
}

/// Normalize `args`, then read one page and the total match count
pub fn execute(storage: &dyn Storage, args: &FilterArgs) -> Result<QueryPage> {
    let query = args.normalize();
    let data = storage.query(&query)?;
    let total = storage.count(&query)?;
    Ok(QueryPage {
        data,
        total,
        page: query.page_number(),
        per_page: query.per_page(),
    })
}

/// A run of adjacent entries sharing one request id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestGroup<'a> {
    pub request_id: &'a str,
    pub entries: &'a [LogEntry],
}

/// Group adjacent entries that share a non-empty request id
///
/// Never re-sorts: a request id interrupted by another starts a new group,
/// and every uncorrelated entry (empty id) is its own group.
pub fn group_by_request(entries: &[LogEntry]) -> Vec<RequestGroup<'_>> {
    let mut groups = Vec::new();
    let mut start = 0;

    for i in 1..=entries.len() {
        let boundary = i == entries.len()
            || entries[i].request_id.is_empty()
            || entries[i].request_id != entries[start].request_id;
        if boundary {
            groups.push(RequestGroup {
                request_id: &entries[start].request_id,
                entries: &entries[start..i],
            });
            start = i;
        }
    }
    groups
}

/// Aggregate counts for the stats surface
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total: u64,
    pub by_owner: BTreeMap<String, u64>,
    pub by_behaviour: BTreeMap<String, u64>,
    pub by_level: BTreeMap<String, u64>,
}

/// Count entries overall, per registered owner, per behaviour, and per level
pub fn stats(storage: &dyn Storage, registry: &ActionTypeRegistry) -> Result<ActivityStats> {
    let mut stats = ActivityStats {
        total: storage.count(&LogQuery::new())?,
        ..Default::default()
    };

    for owner in owners(storage, registry)? {
        let count = storage.count(&LogQuery::new().owner(owner.clone()))?;
        stats.by_owner.insert(owner, count);
    }
    for behaviour in [Behaviour::Error, Behaviour::Success, Behaviour::Warning] {
        let count = storage.count(&LogQuery::new().behaviour(behaviour))?;
        stats.by_behaviour.insert(behaviour.to_string(), count);
    }
    for level in [Level::Editor, Level::Developer] {
        let count = storage.count(&LogQuery::new().level(level))?;
        stats.by_level.insert(level.to_string(), count);
    }

    Ok(stats)
}

/// Registered owners plus every owner present in storage, sorted
pub fn owners(storage: &dyn Storage, registry: &ActionTypeRegistry) -> Result<Vec<String>> {
    let mut owners: BTreeSet<String> = registry.owners().into_iter().collect();
    owners.extend(storage.owners()?);
    Ok(owners.into_iter().collect())
}

fn split_multi(raw: Option<&str>) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for item in raw.unwrap_or_default().split(',') {
        let item = item.trim();
        if !item.is_empty() && !values.iter().any(|v| v == item) {
            values.push(item.to_string());
        }
    }
    values
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}

fn clamp_per_page(n: i64) -> usize {
    n.clamp(1, MAX_PER_PAGE as i64) as usize
}

/// Parse RFC 3339 or `YYYY-MM-DD`; a bare date bound covers its whole day
fn parse_date(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)?
    };
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}
