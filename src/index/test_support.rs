// src/index/test_support.rs - Shared master data fixtures for unit tests
use std::collections::BTreeSet;

use crate::index::MasterDataIndex;
use crate::models::{
    CourseDomain, CourseId, CourseLevel, FoundationData, InstitutionId, ManagementKind,
    MasterCategory, MasterCourse, MasterInstitution, MasterQuota, MasterState, StateId,
};
use crate::normalize::NameNormalizer;

pub(crate) fn state(id: &str, name: &str, code: &str) -> MasterState {
    MasterState {
        id: StateId::from(id),
        name: name.to_string(),
        code: code.to_string(),
    }
}

pub(crate) fn institution(id: &str, name: &str, state_id: &str, locations: &[&str]) -> MasterInstitution {
    MasterInstitution {
        id: InstitutionId::from(id),
        name: name.to_string(),
        state_id: StateId::from(state_id),
        locations: locations.iter().map(|l| l.to_string()).collect::<BTreeSet<_>>(),
        management_kind: ManagementKind::Unknown,
        streams: BTreeSet::new(),
    }
}

pub(crate) fn course(id: &str, name: &str, code: &str, domain: CourseDomain, level: CourseLevel) -> MasterCourse {
    MasterCourse {
        id: CourseId::from(id),
        name: name.to_string(),
        code: code.to_string(),
        domain,
        level,
        duration_years: None,
    }
}

fn labels(id: &str, name: &str, aliases: &[&str]) -> (String, String, Vec<String>) {
    (
        id.to_string(),
        name.to_string(),
        aliases.iter().map(|a| a.to_string()).collect(),
    )
}

pub(crate) fn sample_foundation() -> FoundationData {
    FoundationData {
        states: vec![
            state("AP", "Andhra Pradesh", "AP"),
            state("TS", "Telangana", "TS"),
            state("KA", "Karnataka", "KA"),
        ],
        courses: vec![
            course("MBBS", "MBBS", "MBBS", CourseDomain::Medical, CourseLevel::Undergraduate),
            course("BDS", "BDS", "BDS", CourseDomain::Dental, CourseLevel::Undergraduate),
            course("MD-GM", "MD General Medicine", "MD-GM", CourseDomain::Medical, CourseLevel::Postgraduate),
            course("MS-GS", "MS General Surgery", "MS-GS", CourseDomain::Medical, CourseLevel::Postgraduate),
            course("MDS-ORTHO", "MDS Orthodontics", "MDS-ORTHO", CourseDomain::Dental, CourseLevel::Postgraduate),
            course("DNB-GM", "DNB General Medicine", "DNB-GM", CourseDomain::Dnb, CourseLevel::Postgraduate),
        ],
        categories: [
            labels("GEN", "GENERAL", &["GEN", "UR", "OPEN"]),
            labels("OBC", "OBC", &["OBC NCL", "BC"]),
            labels("SC", "SC", &[]),
            labels("ST", "ST", &[]),
        ]
        .into_iter()
        .map(|(id, name, aliases)| MasterCategory { id, name, aliases })
        .collect(),
        quotas: [
            labels("AIQ", "ALL INDIA", &["AIQ", "ALL INDIA QUOTA"]),
            labels("SQ", "STATE", &["STATE QUOTA", "SQ"]),
        ]
        .into_iter()
        .map(|(id, name, aliases)| MasterQuota { id, name, aliases })
        .collect(),
    }
}

pub(crate) fn sample_institutions() -> Vec<MasterInstitution> {
    vec![
        institution("AP01", "Government Medical College", "AP", &["Nellore"]),
        institution("AP02", "Government Medical College", "AP", &["Anantapur"]),
        institution("AP03", "All India Institute of Medical Sciences", "AP", &["Mangalagiri"]),
        institution("AP04", "Government Dental College", "AP", &["Vijayawada"]),
        institution("AP05", "Narayana Medical College", "AP", &["Nellore"]),
        institution("TS01", "Osmania Medical College", "TS", &["Hyderabad"]),
        institution("TS02", "Government Medical College", "TS", &["Nizamabad"]),
    ]
}

pub(crate) fn sample_index() -> MasterDataIndex {
    MasterDataIndex::build(&sample_foundation(), &sample_institutions(), NameNormalizer::default())
        .expect("sample master data is valid")
}
