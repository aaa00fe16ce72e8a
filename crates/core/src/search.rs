use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::content::ServiceType;
use crate::error::CoreError;
use crate::task::AnalysisType;
use crate::UserId;

/// Paging window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    pub start: usize,
    pub end: usize,
}

impl Limits {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Apply the window to an ordered result set.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        if self.is_empty() {
            return Vec::new();
        }
        items.into_iter().skip(self.start).take(self.len()).collect()
    }
}

/// Parses the wire form `start-end`.
impl FromStr for Limits {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidValue(format!("limits must look like 0-9, got '{s}'"));
        let (start, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let start = start.trim().parse().map_err(|_| invalid())?;
        let end = end.trim().parse().map_err(|_| invalid())?;
        Ok(Self::new(start, end))
    }
}

impl std::fmt::Display for Limits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Optional restrictions applied to a similarity search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub user_ids: Vec<UserId>,
    #[serde(default)]
    pub service_types: Vec<ServiceType>,
    #[serde(default)]
    pub limits: Option<Limits>,
    #[serde(default)]
    pub analysis_types: Vec<AnalysisType>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
            && self.service_types.is_empty()
            && self.limits.is_none()
            && self.analysis_types.is_empty()
    }

    /// Query parameters in back-end wire form, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.user_ids.is_empty() {
            pairs.push(("user_id", join(self.user_ids.iter().map(|u| u.to_string()))));
        }
        if !self.service_types.is_empty() {
            pairs.push(("service_id", join(self.service_types.iter().map(|s| s.id().to_string()))));
        }
        if let Some(limits) = self.limits {
            pairs.push(("limits", limits.to_string()));
        }
        if !self.analysis_types.is_empty() {
            pairs.push(("analysis_type", join(self.analysis_types.iter().map(|a| a.as_str().to_string()))));
        }
        pairs
    }

    /// Whether an item from `owner` via `service` passes the user and service filters.
    pub fn accepts(&self, owner: Option<UserId>, service: Option<ServiceType>) -> bool {
        let user_ok = self.user_ids.is_empty() || owner.is_some_and(|o| self.user_ids.contains(&o));
        let service_ok =
            self.service_types.is_empty() || service.is_some_and(|s| self.service_types.contains(&s));
        user_ok && service_ok
    }
}

fn join(values: impl Iterator<Item = String>) -> String {
    values.collect::<Vec<_>>().join(",")
}

/// Who is asking. Back-end access sees everything; users see public items and their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessContext {
    pub user: Option<UserId>,
    #[serde(default)]
    pub backend: bool,
}

impl AccessContext {
    pub fn user(user: UserId) -> Self {
        Self {
            user: Some(user),
            backend: false,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn backend() -> Self {
        Self {
            user: None,
            backend: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_parse_wire_form() {
        assert_eq!("0-9".parse::<Limits>().unwrap(), Limits::new(0, 9));
        assert_eq!(" 10 - 19 ".parse::<Limits>().unwrap(), Limits::new(10, 19));
        assert!("10".parse::<Limits>().is_err());
        assert!("a-b".parse::<Limits>().is_err());
    }

    #[test]
    fn query_pairs_follow_wire_names() {
        let filters = SearchFilters {
            user_ids: vec![1, 2],
            service_types: vec![ServiceType::Picasa, ServiceType::FacebookJazz],
            limits: Some(Limits::new(0, 9)),
            analysis_types: vec![AnalysisType::Visual],
        };
        assert_eq!(
            filters.query_pairs(),
            vec![
                ("user_id", "1,2".to_string()),
                ("service_id", "1,3".to_string()),
                ("limits", "0-9".to_string()),
                ("analysis_type", "VISUAL".to_string()),
            ]
        );
    }

    #[test]
    fn empty_filters_have_no_pairs() {
        assert!(SearchFilters::default().query_pairs().is_empty());
        assert!(SearchFilters::default().accepts(None, None));
    }

    #[test]
    fn limits_window() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(Limits::new(2, 4).apply(items.clone()), vec![2, 3, 4]);
        assert_eq!(Limits::new(8, 20).apply(items), vec![8, 9]);
    }

    #[test]
    fn filters_accept_matching_owner_and_service() {
        let filters = SearchFilters {
            user_ids: vec![5],
            service_types: vec![ServiceType::Picasa],
            ..SearchFilters::default()
        };
        assert!(filters.accepts(Some(5), Some(ServiceType::Picasa)));
        assert!(!filters.accepts(Some(6), Some(ServiceType::Picasa)));
        assert!(!filters.accepts(Some(5), None));
    }
}
