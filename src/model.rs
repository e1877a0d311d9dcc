use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExtractError;

/// Fetched HTML plus where and when it came from.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub html: String,
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
            fetched_at: Utc::now(),
        }
    }
}

/// How a roster entry was paired with its embedded-state counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactName,
    NormalizedName,
    /// Index-based pairing; only as good as the two sources' ordering.
    Position,
    Unmatched,
}

impl MatchMethod {
    pub fn is_name_match(self) -> bool {
        matches!(self, MatchMethod::ExactName | MatchMethod::NormalizedName)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchMethod::ExactName => "exact_name",
            MatchMethod::NormalizedName => "normalized_name",
            MatchMethod::Position => "position",
            MatchMethod::Unmatched => "unmatched",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearances: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality_flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_method: Option<MatchMethod>,
}

impl RosterEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }

    pub fn validate(self) -> Result<Self, ExtractError> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(ExtractError::ValidationFailure(
                "roster entry has empty name".to_string(),
            ))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    pub rank: Option<i64>,
    pub points: Option<i64>,
    pub played: Option<i64>,
    pub won: Option<i64>,
    pub drawn: Option<i64>,
    pub lost: Option<i64>,
    pub goals_for: Option<i64>,
    pub goals_against: Option<i64>,
}

impl Standings {
    pub fn is_empty(&self) -> bool {
        *self == Standings::default()
    }
}

/// One team; `(team_name, team_id)` is the natural key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub team_id: String,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub league: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standings: Option<Standings>,
}

impl TeamRecord {
    pub fn new(team_id: impl Into<String>, team_name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            team_name: team_name.into(),
            ..Self::default()
        }
    }

    pub fn validate(self) -> Result<Self, ExtractError> {
        if self.team_id.trim().is_empty() {
            return Err(ExtractError::ValidationFailure(format!(
                "team `{}` has no id",
                self.team_name
            )));
        }
        if self.team_name.trim().is_empty() {
            return Err(ExtractError::ValidationFailure(format!(
                "team {} has no name",
                self.team_id
            )));
        }
        Ok(self)
    }
}

/// Free-form team detail map (`base_info` in the page state).
pub type BaseInfo = Map<String, Value>;

/// Everything one team page yields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamPage {
    pub roster: Vec<RosterEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_info: Option<BaseInfo>,
}
