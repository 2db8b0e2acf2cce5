//! Matchmaker requests, the query language, and an in-process pool.
//!
//! A client asks the matchmaker for a party by sending a
//! [`MatchmakerRequest`]: a query describing who it wants to play with,
//! the acceptable party size, and properties describing itself. The server
//! answers with a ticket; later, a `MatchmakerMatched` push delivers the
//! party.
//!
//! # Query language
//!
//! ```text
//! *                                   anyone
//! +properties.region:eu               region MUST be "eu"
//! -properties.mode:ranked             mode MUST NOT be "ranked"
//! properties.mode:"capture the flag"  mode SHOULD be this (quoted value)
//! +properties.skill:>=10              numeric comparison (>=, >, <=, <)
//! ```
//!
//! Clauses are separated by whitespace. When a query has no `+` clause, at
//! least one of its plain (should) clauses must hold.
//!
//! [`MatchmakerPool`] evaluates these queries locally. It is what the tests
//! use in place of the server, and it works for offline play.

use std::collections::HashMap;

use rand::Rng;
use realmlink_protocol::{MatchmakerMatched, MatchmakerUser, RealtimeMessage, UserPresence};
use serde::{Deserialize, Serialize};

use crate::RealtimeError;

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// What a participant advertises about itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    pub strings: HashMap<String, String>,
    pub numerics: HashMap<String, f64>,
}

// ---------------------------------------------------------------------------
// MatchmakerRequest
// ---------------------------------------------------------------------------

/// A request to enter the matchmaker.
///
/// Defaults: query `*`, party of exactly two, no properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchmakerRequest {
    query: String,
    min_count: u32,
    max_count: u32,
    properties: Properties,
}

impl Default for MatchmakerRequest {
    fn default() -> Self {
        Self {
            query: "*".into(),
            min_count: 2,
            max_count: 2,
            properties: Properties::default(),
        }
    }
}

impl MatchmakerRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn min_count(mut self, min_count: u32) -> Self {
        self.min_count = min_count;
        self
    }

    pub fn max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn string_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.strings.insert(key.into(), value.into());
        self
    }

    pub fn numeric_property(mut self, key: impl Into<String>, value: f64) -> Self {
        self.properties.numerics.insert(key.into(), value);
        self
    }

    pub fn query_str(&self) -> &str {
        &self.query
    }

    pub fn min(&self) -> u32 {
        self.min_count
    }

    pub fn max(&self) -> u32 {
        self.max_count
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Checks the count rules and parses the query.
    ///
    /// # Errors
    /// Returns [`RealtimeError::InvalidMatchmaker`] if `min_count < 2`,
    /// `max_count < min_count`, or the query is empty or malformed.
    pub fn validate(&self) -> Result<MatchmakerQuery, RealtimeError> {
        if self.min_count < 2 {
            return Err(RealtimeError::InvalidMatchmaker(format!(
                "min_count must be at least 2, got {}",
                self.min_count
            )));
        }
        if self.max_count < self.min_count {
            return Err(RealtimeError::InvalidMatchmaker(format!(
                "max_count {} is below min_count {}",
                self.max_count, self.min_count
            )));
        }
        MatchmakerQuery::parse(&self.query)
    }

    /// The wire message that submits this request.
    pub fn to_message(&self) -> RealtimeMessage {
        RealtimeMessage::MatchmakerAdd {
            query: self.query.clone(),
            min_count: self.min_count,
            max_count: self.max_count,
            string_properties: self.properties.strings.clone(),
            numeric_properties: self.properties.numerics.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// MatchmakerQuery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occur {
    Must,
    MustNot,
    Should,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    /// Exact match against a string property, or a numeric one when the
    /// value parses as a number.
    Equals { key: String, value: String },
    Range {
        key: String,
        cmp: Comparison,
        bound: f64,
    },
}

impl Condition {
    fn holds(&self, props: &Properties) -> bool {
        match self {
            Self::Equals { key, value } => {
                if let Some(s) = props.strings.get(key) {
                    return s == value;
                }
                match (props.numerics.get(key), value.parse::<f64>()) {
                    (Some(n), Ok(v)) => *n == v,
                    _ => false,
                }
            }
            Self::Range { key, cmp, bound } => {
                let Some(n) = props.numerics.get(key) else {
                    return false;
                };
                match cmp {
                    Comparison::Gt => *n > *bound,
                    Comparison::Gte => *n >= *bound,
                    Comparison::Lt => *n < *bound,
                    Comparison::Lte => *n <= *bound,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    occur: Occur,
    condition: Condition,
}

/// A parsed matchmaker query.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchmakerQuery {
    /// Empty means `*`.
    clauses: Vec<Clause>,
}

impl MatchmakerQuery {
    /// The query that accepts anyone.
    pub fn any() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Parses a query string.
    ///
    /// # Errors
    /// Returns [`RealtimeError::InvalidMatchmaker`] for an empty query, an
    /// unterminated quote, or a clause that isn't `properties.<key>:<value>`.
    pub fn parse(query: &str) -> Result<Self, RealtimeError> {
        let tokens = tokenize(query)?;
        if tokens.is_empty() {
            return Err(RealtimeError::InvalidMatchmaker("query is empty".into()));
        }

        let mut clauses = Vec::new();
        for token in tokens {
            if token == "*" {
                continue;
            }
            clauses.push(parse_clause(&token)?);
        }
        Ok(Self { clauses })
    }

    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether a participant with `props` satisfies this query.
    pub fn matches(&self, props: &Properties) -> bool {
        let mut has_must = false;
        let mut any_should = false;
        let mut has_should = false;

        for clause in &self.clauses {
            let holds = clause.condition.holds(props);
            match clause.occur {
                Occur::Must => {
                    has_must = true;
                    if !holds {
                        return false;
                    }
                }
                Occur::MustNot => {
                    if holds {
                        return false;
                    }
                }
                Occur::Should => {
                    has_should = true;
                    any_should |= holds;
                }
            }
        }

        has_must || !has_should || any_should
    }
}

/// Splits on whitespace, keeping double-quoted runs together (quotes kept).
fn tokenize(query: &str) -> Result<Vec<String>, RealtimeError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in query.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(RealtimeError::InvalidMatchmaker(format!(
            "unterminated quote in query {query:?}"
        )));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_clause(token: &str) -> Result<Clause, RealtimeError> {
    let invalid = || RealtimeError::InvalidMatchmaker(format!("bad clause {token:?}"));

    let (occur, rest) = match token.as_bytes().first() {
        Some(b'+') => (Occur::Must, &token[1..]),
        Some(b'-') => (Occur::MustNot, &token[1..]),
        _ => (Occur::Should, token),
    };

    let field = rest.strip_prefix("properties.").ok_or_else(invalid)?;
    let (key, value) = field.split_once(':').ok_or_else(invalid)?;
    if key.is_empty() || value.is_empty() {
        return Err(invalid());
    }

    let range = [
        (">=", Comparison::Gte),
        ("<=", Comparison::Lte),
        (">", Comparison::Gt),
        ("<", Comparison::Lt),
    ]
    .into_iter()
    .find_map(|(prefix, cmp)| value.strip_prefix(prefix).map(|n| (cmp, n)));

    let condition = match range {
        Some((cmp, number)) => Condition::Range {
            key: key.to_string(),
            cmp,
            bound: number.parse().map_err(|_| invalid())?,
        },
        None => {
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            Condition::Equals {
                key: key.to_string(),
                value: value.to_string(),
            }
        }
    };

    Ok(Clause { occur, condition })
}

// ---------------------------------------------------------------------------
// MatchmakerPool
// ---------------------------------------------------------------------------

struct PoolEntry {
    ticket: String,
    presence: UserPresence,
    request: MatchmakerRequest,
    query: MatchmakerQuery,
}

impl PoolEntry {
    fn accepts(&self, other: &PoolEntry) -> bool {
        self.query.matches(&other.request.properties)
    }

    fn user(&self) -> MatchmakerUser {
        MatchmakerUser {
            presence: self.presence.clone(),
            string_properties: self.request.properties.strings.clone(),
            numeric_properties: self.request.properties.numerics.clone(),
        }
    }
}

/// A candidate party built by [`MatchmakerPool::grow`].
struct Party {
    members: Vec<usize>,
    /// Largest `min_count` among the members.
    need: u32,
    /// Members whose admission raised `need` or lowered the size cap.
    constraining: Vec<usize>,
}

/// An in-process matchmaker.
///
/// Tickets wait in arrival order. [`process`](Self::process) walks them
/// oldest first and greedily grows a party around each one, admitting a
/// later ticket only if it and every current member accept each other and
/// the party stays within every member's `max_count`. A party is formed
/// once it reaches every member's `min_count`. If it falls short, the
/// tickets that raised the minimum or lowered the maximum are left out and
/// the party is grown again.
#[derive(Default)]
pub struct MatchmakerPool {
    entries: Vec<PoolEntry>,
}

impl MatchmakerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant and returns its ticket.
    ///
    /// # Errors
    /// Returns [`RealtimeError::InvalidMatchmaker`] if the request doesn't
    /// validate.
    pub fn add(
        &mut self,
        presence: UserPresence,
        request: MatchmakerRequest,
    ) -> Result<String, RealtimeError> {
        let query = request.validate()?;
        let ticket = generate_token();
        tracing::debug!(%ticket, user_id = %presence.user_id, "pool ticket added");
        self.entries.push(PoolEntry {
            ticket: ticket.clone(),
            presence,
            request,
            query,
        });
        Ok(ticket)
    }

    /// Withdraws a ticket. Returns `false` if it wasn't waiting.
    pub fn remove(&mut self, ticket: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.ticket != ticket);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forms every party it can. Returns one result per matched member, each
    /// carrying that member's ticket and the party's shared join token.
    pub fn process(&mut self) -> Vec<MatchmakerMatched> {
        let mut taken = vec![false; self.entries.len()];
        let mut results = Vec::new();

        for anchor in 0..self.entries.len() {
            if taken[anchor] {
                continue;
            }

            // Each failed attempt leaves out the members that tightened the
            // party's bounds, so a smaller valid party still gets a chance.
            let mut excluded = Vec::new();
            let party = loop {
                let attempt = self.grow(anchor, &taken, &excluded);
                if attempt.members.len() as u32 >= attempt.need {
                    break Some(attempt.members);
                }
                if attempt.constraining.is_empty() {
                    break None;
                }
                excluded.extend(attempt.constraining);
            };
            let Some(party) = party else {
                continue;
            };

            for &m in &party {
                taken[m] = true;
            }
            results.extend(self.matched(&party));
        }

        let mut index = 0;
        self.entries.retain(|_| {
            let keep = !taken[index];
            index += 1;
            keep
        });
        results
    }

    /// Greedily grows a party around `anchor` from the later tickets that
    /// are neither taken nor excluded.
    fn grow(&self, anchor: usize, taken: &[bool], excluded: &[usize]) -> Party {
        let mut party = Party {
            members: vec![anchor],
            need: self.entries[anchor].request.min_count,
            constraining: Vec::new(),
        };
        let mut cap = self.entries[anchor].request.max_count;

        for candidate in (anchor + 1)..self.entries.len() {
            if party.members.len() as u32 >= cap {
                break;
            }
            if taken[candidate] || excluded.contains(&candidate) {
                continue;
            }
            let c = &self.entries[candidate];
            if party.members.len() as u32 >= c.request.max_count {
                continue;
            }
            let compatible = party.members.iter().all(|&m| {
                let member = &self.entries[m];
                member.presence.user_id != c.presence.user_id
                    && member.accepts(c)
                    && c.accepts(member)
            });
            if !compatible {
                continue;
            }

            party.members.push(candidate);
            if c.request.max_count < cap || c.request.min_count > party.need {
                party.constraining.push(candidate);
            }
            cap = cap.min(c.request.max_count);
            party.need = party.need.max(c.request.min_count);
        }
        party
    }

    fn matched(&self, party: &[usize]) -> Vec<MatchmakerMatched> {
        let token = generate_token();
        let users: Vec<MatchmakerUser> = party.iter().map(|&m| self.entries[m].user()).collect();
        tracing::info!(size = party.len(), "pool formed a party");

        party
            .iter()
            .map(|&m| {
                let entry = &self.entries[m];
                MatchmakerMatched {
                    ticket: entry.ticket.clone(),
                    match_id: None,
                    token: Some(token.clone()),
                    users: users.clone(),
                    self_user: entry.user(),
                }
            })
            .collect()
    }
}

/// 128 random bits as lowercase hex.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(user: &str) -> UserPresence {
        UserPresence {
            user_id: user.into(),
            session_id: format!("{user}-s"),
            username: user.into(),
        }
    }

    fn props(strings: &[(&str, &str)], numerics: &[(&str, f64)]) -> Properties {
        Properties {
            strings: strings
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            numerics: numerics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    // =====================================================================
    // MatchmakerRequest
    // =====================================================================

    #[test]
    fn test_request_defaults() {
        let req = MatchmakerRequest::default();
        assert_eq!(req.query_str(), "*");
        assert_eq!(req.min(), 2);
        assert_eq!(req.max(), 2);
        assert_eq!(req.properties(), &Properties::default());
    }

    #[test]
    fn test_validate_min_below_two_rejected() {
        let result = MatchmakerRequest::new().min_count(1).validate();
        assert!(matches!(result, Err(RealtimeError::InvalidMatchmaker(_))));
    }

    #[test]
    fn test_validate_max_below_min_rejected() {
        let result = MatchmakerRequest::new().min_count(4).max_count(3).validate();
        assert!(matches!(result, Err(RealtimeError::InvalidMatchmaker(_))));
    }

    #[test]
    fn test_validate_empty_query_rejected() {
        let result = MatchmakerRequest::new().query("   ").validate();
        assert!(matches!(result, Err(RealtimeError::InvalidMatchmaker(_))));
    }

    #[test]
    fn test_to_message_carries_properties() {
        let msg = MatchmakerRequest::new()
            .max_count(4)
            .string_property("region", "eu")
            .numeric_property("skill", 12.0)
            .to_message();

        match msg {
            RealtimeMessage::MatchmakerAdd {
                min_count,
                max_count,
                string_properties,
                numeric_properties,
                ..
            } => {
                assert_eq!((min_count, max_count), (2, 4));
                assert_eq!(string_properties.get("region").map(String::as_str), Some("eu"));
                assert_eq!(numeric_properties.get("skill"), Some(&12.0));
            }
            other => panic!("expected MatchmakerAdd, got {other:?}"),
        }
    }

    // =====================================================================
    // MatchmakerQuery
    // =====================================================================

    #[test]
    fn test_query_star_matches_anything() {
        let q = MatchmakerQuery::parse("*").unwrap();
        assert!(q.is_any());
        assert!(q.matches(&Properties::default()));
    }

    #[test]
    fn test_query_must_clause() {
        let q = MatchmakerQuery::parse("+properties.region:eu").unwrap();
        assert!(q.matches(&props(&[("region", "eu")], &[])));
        assert!(!q.matches(&props(&[("region", "us")], &[])));
        assert!(!q.matches(&Properties::default()));
    }

    #[test]
    fn test_query_must_not_clause() {
        let q = MatchmakerQuery::parse("-properties.mode:ranked").unwrap();
        assert!(q.matches(&props(&[("mode", "casual")], &[])));
        assert!(!q.matches(&props(&[("mode", "ranked")], &[])));
    }

    #[test]
    fn test_query_should_clauses_need_one_without_must() {
        let q = MatchmakerQuery::parse("properties.region:eu properties.region:us").unwrap();
        assert!(q.matches(&props(&[("region", "us")], &[])));
        assert!(!q.matches(&props(&[("region", "asia")], &[])));
    }

    #[test]
    fn test_query_should_clause_optional_with_must() {
        let q = MatchmakerQuery::parse("+properties.region:eu properties.mode:duel").unwrap();
        assert!(q.matches(&props(&[("region", "eu"), ("mode", "ffa")], &[])));
    }

    #[test]
    fn test_query_quoted_value_with_spaces() {
        let q = MatchmakerQuery::parse(r#"+properties.mode:"capture the flag""#).unwrap();
        assert!(q.matches(&props(&[("mode", "capture the flag")], &[])));
        assert!(!q.matches(&props(&[("mode", "capture")], &[])));
    }

    #[test]
    fn test_query_numeric_ranges() {
        let q = MatchmakerQuery::parse("+properties.skill:>=10 +properties.skill:<20").unwrap();
        assert!(q.matches(&props(&[], &[("skill", 10.0)])));
        assert!(q.matches(&props(&[], &[("skill", 19.5)])));
        assert!(!q.matches(&props(&[], &[("skill", 20.0)])));
        assert!(!q.matches(&props(&[], &[("skill", 9.0)])));
    }

    #[test]
    fn test_query_equals_numeric_property() {
        let q = MatchmakerQuery::parse("+properties.level:5").unwrap();
        assert!(q.matches(&props(&[], &[("level", 5.0)])));
    }

    #[test]
    fn test_query_bad_clause_rejected() {
        for bad in ["+region:eu", "properties.:eu", "properties.region:", "+properties.skill:>abc"] {
            assert!(
                matches!(MatchmakerQuery::parse(bad), Err(RealtimeError::InvalidMatchmaker(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_query_unterminated_quote_rejected() {
        let result = MatchmakerQuery::parse(r#"properties.mode:"open"#);
        assert!(matches!(result, Err(RealtimeError::InvalidMatchmaker(_))));
    }

    // =====================================================================
    // MatchmakerPool
    // =====================================================================

    #[test]
    fn test_pool_default_requests_pair_exactly_two() {
        let mut pool = MatchmakerPool::new();
        let t1 = pool.add(presence("a"), MatchmakerRequest::default()).unwrap();
        let t2 = pool.add(presence("b"), MatchmakerRequest::default()).unwrap();
        pool.add(presence("c"), MatchmakerRequest::default()).unwrap();

        let results = pool.process();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].ticket, t1);
        assert_eq!(results[1].ticket, t2);
        assert_eq!(results[0].users.len(), 2);
        assert_eq!(results[0].token, results[1].token);
        assert!(results[0].token.is_some());
        assert_eq!(results[0].self_user.presence.user_id, "a");
        assert_eq!(pool.len(), 1, "third ticket keeps waiting");
    }

    #[test]
    fn test_pool_single_ticket_stays_waiting() {
        let mut pool = MatchmakerPool::new();
        pool.add(presence("a"), MatchmakerRequest::default()).unwrap();

        assert!(pool.process().is_empty());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pool_requires_mutual_acceptance() {
        let mut pool = MatchmakerPool::new();
        pool.add(
            presence("a"),
            MatchmakerRequest::new()
                .query("+properties.region:eu")
                .string_property("region", "eu"),
        )
        .unwrap();
        pool.add(presence("b"), MatchmakerRequest::new().string_property("region", "us"))
            .unwrap();

        assert!(pool.process().is_empty());
    }

    #[test]
    fn test_pool_fills_up_to_smallest_max() {
        let mut pool = MatchmakerPool::new();
        let four = MatchmakerRequest::new().max_count(4);
        for user in ["a", "b", "c", "d", "e"] {
            pool.add(presence(user), four.clone()).unwrap();
        }

        let results = pool.process();

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].users.len(), 4);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pool_leaves_out_ticket_that_raises_minimum() {
        let mut pool = MatchmakerPool::new();
        let a = pool
            .add(presence("a"), MatchmakerRequest::new().min_count(2).max_count(4))
            .unwrap();
        let b = pool
            .add(presence("b"), MatchmakerRequest::new().min_count(3).max_count(4))
            .unwrap();
        let c = pool.add(presence("c"), MatchmakerRequest::default()).unwrap();

        let results = pool.process();

        let matched: Vec<&str> = results.iter().map(|r| r.ticket.as_str()).collect();
        assert_eq!(matched, vec![a.as_str(), c.as_str()]);
        assert_eq!(pool.len(), 1);
        assert!(!pool.remove(&a));
        assert!(pool.remove(&b), "b keeps waiting for a third player");
    }

    #[test]
    fn test_pool_leaves_out_ticket_that_lowers_maximum() {
        let mut pool = MatchmakerPool::new();
        let three = MatchmakerRequest::new().min_count(3).max_count(4);
        pool.add(presence("a"), three.clone()).unwrap();
        let pair = pool.add(presence("b"), MatchmakerRequest::default()).unwrap();
        pool.add(presence("c"), three.clone()).unwrap();
        pool.add(presence("d"), three).unwrap();

        let results = pool.process();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.ticket != pair));
        assert_eq!(results[0].users.len(), 3);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_pool_skips_same_user_twice() {
        let mut pool = MatchmakerPool::new();
        pool.add(presence("a"), MatchmakerRequest::default()).unwrap();
        pool.add(presence("a"), MatchmakerRequest::default()).unwrap();

        assert!(pool.process().is_empty());
    }

    #[test]
    fn test_pool_remove_withdraws_ticket() {
        let mut pool = MatchmakerPool::new();
        let ticket = pool.add(presence("a"), MatchmakerRequest::default()).unwrap();

        assert!(pool.remove(&ticket));
        assert!(!pool.remove(&ticket));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_pool_add_invalid_request_rejected() {
        let mut pool = MatchmakerPool::new();
        let result = pool.add(presence("a"), MatchmakerRequest::new().min_count(0));
        assert!(matches!(result, Err(RealtimeError::InvalidMatchmaker(_))));
        assert!(pool.is_empty());
    }
}
