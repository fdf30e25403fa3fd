// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! User interaction strings are stored here.

pub const FAIL_STR: &str = "FAIL";
pub const SUSPICIOUS_STR: &str = "SUSPICIOUS";
pub const PASS_STR: &str = "Ok";

pub const REPORT_RULE: &str =
    "----------------------------------------------------------------------------";

pub const GRADE_LABELS: [(f64, &str); 4] = [
    (3.999, "good"),
    (3.0, "some issues"),
    (2.0, "flawed"),
    (1.0, "bad"),
];
pub const GRADE_LOWEST: &str = "very bad";
