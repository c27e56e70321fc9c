// src/index/state_codes.rs
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Postal/vehicle codes and legacy spellings, keyed by normalized text, mapped to the
/// canonical state name. Entries only take effect when the canonical name exists in
/// the loaded master states.
static STATE_VARIANTS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let entries: [(&str, &str); 62] = [
        ("AN", "ANDAMAN AND NICOBAR ISLANDS"),
        ("ANDAMAN", "ANDAMAN AND NICOBAR ISLANDS"),
        ("ANDAMAN AND NICOBAR", "ANDAMAN AND NICOBAR ISLANDS"),
        ("AP", "ANDHRA PRADESH"),
        ("ANDHRA", "ANDHRA PRADESH"),
        ("AR", "ARUNACHAL PRADESH"),
        ("AS", "ASSAM"),
        ("BR", "BIHAR"),
        ("CH", "CHANDIGARH"),
        ("CG", "CHHATTISGARH"),
        ("CT", "CHHATTISGARH"),
        ("CHATTISGARH", "CHHATTISGARH"),
        ("CHHATISGARH", "CHHATTISGARH"),
        ("DN", "DADRA AND NAGAR HAVELI"),
        ("DD", "DAMAN AND DIU"),
        ("DL", "DELHI"),
        ("NEW DELHI", "DELHI"),
        ("NCT OF DELHI", "DELHI"),
        ("DELHI NCT", "DELHI"),
        ("DEL HI", "DELHI"),
        ("GA", "GOA"),
        ("GJ", "GUJARAT"),
        ("HR", "HARYANA"),
        ("HP", "HIMACHAL PRADESH"),
        ("JK", "JAMMU AND KASHMIR"),
        ("J AND K", "JAMMU AND KASHMIR"),
        ("JAMMU KASHMIR", "JAMMU AND KASHMIR"),
        ("JH", "JHARKHAND"),
        ("KA", "KARNATAKA"),
        ("KL", "KERALA"),
        ("LA", "LADAKH"),
        ("LD", "LAKSHADWEEP"),
        ("MP", "MADHYA PRADESH"),
        ("MH", "MAHARASHTRA"),
        ("MN", "MANIPUR"),
        ("ML", "MEGHALAYA"),
        ("MZ", "MIZORAM"),
        ("NL", "NAGALAND"),
        ("OD", "ODISHA"),
        ("OR", "ODISHA"),
        ("ORISSA", "ODISHA"),
        ("PY", "PUDUCHERRY"),
        ("PONDICHERRY", "PUDUCHERRY"),
        ("PONDY", "PUDUCHERRY"),
        ("PB", "PUNJAB"),
        ("RJ", "RAJASTHAN"),
        ("SK", "SIKKIM"),
        ("TN", "TAMIL NADU"),
        ("TAMILNADU", "TAMIL NADU"),
        ("TS", "TELANGANA"),
        ("TG", "TELANGANA"),
        ("TR", "TRIPURA"),
        ("UP", "UTTAR PRADESH"),
        ("UK", "UTTARAKHAND"),
        ("UA", "UTTARAKHAND"),
        ("UTTARANCHAL", "UTTARAKHAND"),
        ("WB", "WEST BENGAL"),
        ("BENGAL", "WEST BENGAL"),
        ("DADRA NAGAR HAVELI", "DADRA AND NAGAR HAVELI"),
        ("DAMAN", "DAMAN AND DIU"),
        ("KARNATKA", "KARNATAKA"),
        ("MAHARASTRA", "MAHARASHTRA"),
    ];
    entries.into_iter().collect()
});

pub fn canonical_state_name(normalized: &str) -> Option<&'static str> {
    STATE_VARIANTS.get(normalized).copied()
}
