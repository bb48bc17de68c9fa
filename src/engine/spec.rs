//! Static timer configuration

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::SpecError;

/// How many times a timer may be restarted out of overflow per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum RestartQuota {
    Limited(u32),
    Unlimited,
}

impl RestartQuota {
    /// Check whether another restart fits after `used` restarts
    pub fn allows(&self, used: u32) -> bool {
        match self {
            RestartQuota::Limited(max) => used < *max,
            RestartQuota::Unlimited => true,
        }
    }
}

impl From<Option<u32>> for RestartQuota {
    fn from(value: Option<u32>) -> Self {
        value.map_or(RestartQuota::Unlimited, RestartQuota::Limited)
    }
}

impl From<RestartQuota> for Option<u32> {
    fn from(value: RestartQuota) -> Self {
        match value {
            RestartQuota::Limited(max) => Some(max),
            RestartQuota::Unlimited => None,
        }
    }
}

/// Immutable configuration of one timer kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSpec {
    pub id: String,
    /// Seconds allowed before the timer starts draining the pool
    pub limit: u64,
    /// `null` or absent means unlimited
    #[serde(default = "unlimited")]
    pub max_restarts: RestartQuota,
}

fn unlimited() -> RestartQuota {
    RestartQuota::Unlimited
}

impl TimerSpec {
    pub fn new(id: impl Into<String>, limit: u64, max_restarts: RestartQuota) -> Self {
        Self {
            id: id.into(),
            limit,
            max_restarts,
        }
    }

    /// Shorthand for a limit given in minutes
    pub fn minutes(id: impl Into<String>, minutes: u64, max_restarts: RestartQuota) -> Self {
        Self::new(id, minutes * 60, max_restarts)
    }
}

/// Validated, ordered set of timer specs keyed by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTable {
    specs: Vec<TimerSpec>,
}

impl TimerTable {
    /// Build a table, rejecting blank or duplicate ids and zero limits
    pub fn new(specs: Vec<TimerSpec>) -> Result<Self, SpecError> {
        if specs.is_empty() {
            return Err(SpecError::Empty);
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if spec.id.trim().is_empty() {
                return Err(SpecError::BlankId);
            }
            if spec.limit == 0 {
                return Err(SpecError::ZeroLimit(spec.id.clone()));
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(SpecError::DuplicateId(spec.id.clone()));
            }
        }

        Ok(Self { specs })
    }

    /// The stock set of daily break timers
    pub fn builtin() -> Self {
        use RestartQuota::*;
        Self {
            specs: vec![
                TimerSpec::minutes("bath", 30, Unlimited),
                TimerSpec::minutes("food", 15, Limited(3)),
                TimerSpec::minutes("washroom", 10, Unlimited),
                TimerSpec::minutes("sleep", 45, Limited(1)),
                TimerSpec::minutes("study-buffer", 20, Limited(2)),
                TimerSpec::minutes("weekly-fun", 60, Limited(0)),
            ],
        }
    }

    pub fn get(&self, id: &str) -> Option<&TimerSpec> {
        self.specs.iter().find(|spec| spec.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimerSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
