// ABOUTME: Parsers for the line formats adapter scripts print on stdout.
// ABOUTME: KEY=VALUE maps, severity-tagged findings, PASS/FAIL results, rollout and approval states.

use std::collections::BTreeMap;

use crate::ports::{ApprovalDecision, Finding, FindingSeverity, PortError, ProbeResult, RolloutStatus};

fn lines(stdout: &str) -> impl Iterator<Item = &str> {
    stdout.lines().map(str::trim).filter(|l| !l.is_empty() && !l.starts_with('#'))
}

/// The first meaningful line, required to be present.
pub fn single_line(op: &str, stdout: &str) -> Result<String, PortError> {
    lines(stdout)
        .next()
        .map(str::to_string)
        .ok_or_else(|| PortError::protocol(op, "expected one line of output, got none"))
}

/// The first meaningful line, if there is one.
pub fn optional_line(stdout: &str) -> Option<String> {
    lines(stdout).next().map(str::to_string)
}

pub fn key_values(op: &str, stdout: &str) -> Result<BTreeMap<String, String>, PortError> {
    lines(stdout)
        .map(|line| {
            line.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| PortError::protocol(op, format!("expected KEY=VALUE, got '{line}'")))
        })
        .collect()
}

/// `SEVERITY ID MESSAGE` per line.
pub fn findings(op: &str, stdout: &str) -> Result<Vec<Finding>, PortError> {
    lines(stdout)
        .map(|line| {
            let mut parts = line.splitn(3, char::is_whitespace);
            let severity = parts.next().unwrap_or_default();
            let id = parts
                .next()
                .ok_or_else(|| PortError::protocol(op, format!("finding without id: '{line}'")))?;
            let severity: FindingSeverity = severity
                .parse()
                .map_err(|_| PortError::protocol(op, format!("unknown severity '{severity}'")))?;
            Ok(Finding {
                id: id.to_string(),
                severity,
                summary: parts.next().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// `PASS|FAIL NAME DETAIL` per line.
pub fn results(op: &str, stdout: &str) -> Result<Vec<ProbeResult>, PortError> {
    lines(stdout)
        .map(|line| {
            let mut parts = line.splitn(3, char::is_whitespace);
            let passed = match parts.next().map(str::to_ascii_uppercase).as_deref() {
                Some("PASS") => true,
                Some("FAIL") => false,
                _ => return Err(PortError::protocol(op, format!("expected PASS or FAIL, got '{line}'"))),
            };
            let name = parts
                .next()
                .ok_or_else(|| PortError::protocol(op, format!("result without name: '{line}'")))?;
            Ok(ProbeResult {
                name: name.to_string(),
                passed,
                detail: parts.next().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// `ready`, `progressing READY DESIRED`, or `failed DETAIL`.
pub fn rollout_status(op: &str, stdout: &str) -> Result<RolloutStatus, PortError> {
    let line = single_line(op, stdout)?;
    let mut parts = line.splitn(2, char::is_whitespace);
    let state = parts.next().unwrap_or_default().to_ascii_lowercase();
    let rest = parts.next().unwrap_or_default().trim();
    match state.as_str() {
        "ready" => Ok(RolloutStatus::Ready),
        "failed" => Ok(RolloutStatus::Failed(rest.to_string())),
        "progressing" => {
            let counts: Vec<u32> = rest
                .split_whitespace()
                .map(str::parse)
                .collect::<Result<_, _>>()
                .map_err(|_| PortError::protocol(op, format!("bad replica counts '{rest}'")))?;
            match counts.as_slice() {
                [ready, desired] => Ok(RolloutStatus::Progressing {
                    ready: *ready,
                    desired: *desired,
                }),
                _ => Err(PortError::protocol(op, format!("expected READY DESIRED, got '{rest}'"))),
            }
        }
        other => Err(PortError::protocol(op, format!("unknown rollout state '{other}'"))),
    }
}

/// `approved BY` or `denied BY [REASON]`.
pub fn approval(op: &str, stdout: &str) -> Result<ApprovalDecision, PortError> {
    let line = single_line(op, stdout)?;
    let mut parts = line.splitn(3, char::is_whitespace);
    let verdict = parts.next().unwrap_or_default().to_ascii_lowercase();
    let by = parts.next().unwrap_or("unknown").to_string();
    let reason = parts.next().map(str::trim).filter(|r| !r.is_empty()).map(str::to_string);
    match verdict.as_str() {
        "approved" => Ok(ApprovalDecision::Approved { by }),
        "denied" => Ok(ApprovalDecision::Denied { by, reason }),
        other => Err(PortError::protocol(op, format!("expected approved or denied, got '{other}'"))),
    }
}
