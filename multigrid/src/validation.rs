// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail bookkeeping for the validation binaries.
//!
//! Each binary records bounded checks against constants from
//! [`crate::tolerances`], prints a summary, optionally writes the report as
//! JSON, and exits 0 only if every check passed.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// How `observed` is compared with `bound`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    /// observed < bound
    Below,
    /// observed > bound
    Above,
    /// observed is 1 for pass, 0 for fail
    Flag,
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Below => write!(f, "<"),
            Self::Above => write!(f, ">"),
            Self::Flag => write!(f, "flag"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub label: String,
    pub passed: bool,
    pub observed: f64,
    pub bound: f64,
    pub kind: Bound,
}

/// Ordered list of checks for one validation run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[must_use]
pub struct ValidationReport {
    pub name: String,
    pub checks: Vec<Check>,
}

impl ValidationReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    /// observed < bound (NaN fails)
    pub fn check_below(&mut self, label: &str, observed: f64, bound: f64) {
        self.push(label, observed < bound, observed, bound, Bound::Below);
    }

    /// observed > bound (NaN fails)
    pub fn check_above(&mut self, label: &str, observed: f64, bound: f64) {
        self.push(label, observed > bound, observed, bound, Bound::Above);
    }

    pub fn check_flag(&mut self, label: &str, passed: bool) {
        self.push(label, passed, f64::from(u8::from(passed)), 1.0, Bound::Flag);
    }

    fn push(&mut self, label: &str, passed: bool, observed: f64, bound: f64, kind: Bound) {
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            bound,
            kind,
        });
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// 0 if every check passed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_passed())
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = format!(
            "═══ {}: {}/{} checks passed ═══\n",
            self.name,
            self.passed_count(),
            self.checks.len()
        );
        for c in &self.checks {
            let icon = if c.passed { "✓" } else { "✗" };
            let line = match c.kind {
                Bound::Flag => format!("  {icon} {}\n", c.label),
                _ => format!(
                    "  {icon} {}: {:.3e} {} {:.1e}\n",
                    c.label, c.observed, c.kind, c.bound
                ),
            };
            s.push_str(&line);
        }
        if self.all_passed() {
            s.push_str("ALL CHECKS PASSED\n");
        } else {
            let failed: Vec<&str> = self
                .checks
                .iter()
                .filter(|c| !c.passed)
                .map(|c| c.label.as_str())
                .collect();
            s.push_str(&format!("FAILED CHECKS: {}\n", failed.join(", ")));
        }
        s
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}
