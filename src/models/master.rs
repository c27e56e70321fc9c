// src/models/master.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(StateId);
string_id!(InstitutionId);
string_id!(CourseId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterState {
    pub id: StateId,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagementKind {
    Government,
    Private,
    Deemed,
    Central,
    Society,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterInstitution {
    pub id: InstitutionId,
    pub name: String,
    pub state_id: StateId,
    /// Campus towns/addresses; one name can map to several campuses in a state.
    #[serde(default)]
    pub locations: BTreeSet<String>,
    #[serde(default)]
    pub management_kind: ManagementKind,
    /// Course domains the institution admits to. Empty means unrestricted.
    #[serde(default)]
    pub streams: BTreeSet<CourseDomain>,
}

/// A campus address imported separately from the institution list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionLocation {
    pub institution_id: InstitutionId,
    pub location: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseDomain {
    Medical,
    Dental,
    Dnb,
    Ayush,
    Nursing,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseLevel {
    Undergraduate,
    Postgraduate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterCourse {
    pub id: CourseId,
    pub name: String,
    pub code: String,
    pub domain: CourseDomain,
    pub level: CourseLevel,
    #[serde(default)]
    pub duration_years: Option<f32>,
}

/// Reservation category (GENERAL, OBC, SC, ...) with the spellings seen in source files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterQuota {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Reference sets loaded before institutions: everything that does not depend on campuses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundationData {
    pub states: Vec<MasterState>,
    pub courses: Vec<MasterCourse>,
    pub categories: Vec<MasterCategory>,
    pub quotas: Vec<MasterQuota>,
}

impl MasterInstitution {
    /// Merges separately imported campus rows into `locations`.
    pub fn attach_locations<'a, I>(&mut self, locations: I)
    where
        I: IntoIterator<Item = &'a InstitutionLocation>,
    {
        for loc in locations {
            if loc.institution_id == self.id && !loc.location.trim().is_empty() {
                self.locations.insert(loc.location.trim().to_string());
            }
        }
    }

    /// Whether a row in `stream` may land on this institution.
    pub fn offers(&self, stream: Option<CourseDomain>) -> bool {
        match stream {
            Some(domain) => self.streams.is_empty() || self.streams.contains(&domain),
            None => true,
        }
    }
}
