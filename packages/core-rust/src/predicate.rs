//! Search filters and the predicate clauses derived from them.
//!
//! Each recognized filter maps to one audit-log column. Clauses are emitted in
//! the fixed order of [`FilterField::ALL`], independent of how the filters
//! were supplied, so a given filter combination always yields the same set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sql::quote_literal;

/// A recognized search filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    User,
    Service,
    Action,
    Date,
    SourceIp,
}

impl FilterField {
    /// Declaration order; predicate emission follows it.
    pub const ALL: [FilterField; 5] = [
        FilterField::User,
        FilterField::Service,
        FilterField::Action,
        FilterField::Date,
        FilterField::SourceIp,
    ];

    /// Filter name as accepted on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            FilterField::User => "user",
            FilterField::Service => "service",
            FilterField::Action => "action",
            FilterField::Date => "date",
            FilterField::SourceIp => "source_ip",
        }
    }

    /// Audit-log column the filter applies to.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            FilterField::User => "user_identity.email",
            FilterField::Service => "service_name",
            FilterField::Action => "action_name",
            FilterField::Date => "event_time",
            FilterField::SourceIp => "source_ip_address",
        }
    }

    /// Comparison operator. The date filter selects events after the value.
    #[must_use]
    pub fn operator(self) -> &'static str {
        match self {
            FilterField::Date => ">",
            _ => "=",
        }
    }

    /// Looks up a filter by its command-line name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw, optional filter values as supplied by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub user: Option<String>,
    pub service: Option<String>,
    pub action: Option<String>,
    pub date: Option<String>,
    pub source_ip: Option<String>,
}

impl SearchFilters {
    /// Builds filters from `(name, value)` pairs. Unknown names are ignored
    /// and a later pair for the same name replaces an earlier one.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<String>)>,
    {
        let mut filters = Self::default();
        for (name, value) in pairs {
            match FilterField::from_name(name) {
                Some(field) => *filters.slot_mut(field) = value,
                None => tracing::debug!(name, "ignoring unrecognized search filter"),
            }
        }
        filters
    }

    /// Value for `field`, if present and non-blank.
    #[must_use]
    pub fn get(&self, field: FilterField) -> Option<&str> {
        let slot = match field {
            FilterField::User => &self.user,
            FilterField::Service => &self.service,
            FilterField::Action => &self.action,
            FilterField::Date => &self.date,
            FilterField::SourceIp => &self.source_ip,
        };
        slot.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    fn slot_mut(&mut self, field: FilterField) -> &mut Option<String> {
        match field {
            FilterField::User => &mut self.user,
            FilterField::Service => &mut self.service,
            FilterField::Action => &mut self.action,
            FilterField::Date => &mut self.date,
            FilterField::SourceIp => &mut self.source_ip,
        }
    }
}

/// Ordered predicate clauses, combined with `AND`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredicateSet(Vec<String>);

impl PredicateSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn clauses(&self) -> &[String] {
        &self.0
    }

    /// Clauses joined into a single `WHERE` body.
    #[must_use]
    pub fn where_clause(&self) -> String {
        self.0.join(" AND ")
    }
}

impl FromIterator<String> for PredicateSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Turns the present filters into predicate clauses.
///
/// Returns an empty set when no filter has a value; callers decide whether
/// that is acceptable.
#[must_use]
pub fn build_predicates(filters: &SearchFilters) -> PredicateSet {
    FilterField::ALL
        .into_iter()
        .filter_map(|field| {
            filters.get(field).map(|value| {
                format!(
                    "{} {} {}",
                    field.column(),
                    field.operator(),
                    quote_literal(value)
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn no_filters_yield_empty_set() {
        let set = build_predicates(&SearchFilters::default());
        assert!(set.is_empty());
        assert_eq!(set.where_clause(), "");
    }

    #[test]
    fn blank_values_are_skipped() {
        let filters = SearchFilters {
            user: Some(String::new()),
            service: Some("   ".to_string()),
            ..SearchFilters::default()
        };
        assert!(build_predicates(&filters).is_empty());
    }

    #[test]
    fn every_filter_maps_to_its_column() {
        let filters = SearchFilters {
            user: Some("a@b.com".to_string()),
            service: Some("clusters".to_string()),
            action: Some("delete".to_string()),
            date: Some("2024-10-09".to_string()),
            source_ip: Some("10.0.0.1".to_string()),
        };
        let set = build_predicates(&filters);
        assert_eq!(
            set.clauses(),
            [
                "user_identity.email = 'a@b.com'",
                "service_name = 'clusters'",
                "action_name = 'delete'",
                "event_time > '2024-10-09'",
                "source_ip_address = '10.0.0.1'",
            ]
        );
    }

    #[test]
    fn where_clause_joins_with_and() {
        let filters = SearchFilters {
            user: Some("a@b.com".to_string()),
            action: Some("delete".to_string()),
            ..SearchFilters::default()
        };
        assert_eq!(
            build_predicates(&filters).where_clause(),
            "user_identity.email = 'a@b.com' AND action_name = 'delete'"
        );
    }

    #[test]
    fn quotes_in_values_are_doubled() {
        let filters = SearchFilters {
            user: Some("o'brien@x.com' OR '1'='1".to_string()),
            ..SearchFilters::default()
        };
        assert_eq!(
            build_predicates(&filters).clauses(),
            ["user_identity.email = 'o''brien@x.com'' OR ''1''=''1'"]
        );
    }

    #[test]
    fn from_pairs_ignores_unknown_names() {
        let filters = SearchFilters::from_pairs([
            ("action", Some("delete".to_string())),
            ("workspace", Some("123".to_string())),
        ]);
        assert_eq!(filters.get(FilterField::Action), Some("delete"));
        assert_eq!(build_predicates(&filters).len(), 1);
    }

    #[test]
    fn filter_names_round_trip() {
        for field in FilterField::ALL {
            assert_eq!(FilterField::from_name(field.name()), Some(field));
        }
        assert_eq!(FilterField::from_name("export"), None);
    }

    fn arb_value() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(String::new())),
            "[a-z0-9@.:-]{1,12}".prop_map(Some),
        ]
    }

    proptest! {
        #[test]
        fn count_and_order_follow_declaration(
            values in proptest::collection::vec(arb_value(), 5),
            order in Just((0..5usize).collect::<Vec<_>>()).prop_shuffle(),
        ) {
            let pairs: Vec<(&str, Option<String>)> = order
                .iter()
                .map(|&i| (FilterField::ALL[i].name(), values[i].clone()))
                .collect();
            let set = build_predicates(&SearchFilters::from_pairs(pairs));

            let expected: Vec<&str> = FilterField::ALL
                .iter()
                .zip(&values)
                .filter(|(_, v)| v.as_deref().is_some_and(|s| !s.is_empty()))
                .map(|(f, _)| f.column())
                .collect();

            prop_assert_eq!(set.len(), expected.len());
            for (clause, column) in set.clauses().iter().zip(expected) {
                prop_assert!(clause.starts_with(column));
            }
        }
    }
}
