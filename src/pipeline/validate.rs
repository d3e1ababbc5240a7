// ABOUTME: Construction-time validation of a stage list.
// ABOUTME: Unique non-empty names and disjoint write keys among parallel siblings.

use std::collections::BTreeSet;

use super::error::PipelineError;
use super::stage::{StageBody, StageSpec};

pub(super) fn validate(stages: &[StageSpec]) -> Result<(), PipelineError> {
    if stages.is_empty() {
        return Err(PipelineError::Empty);
    }
    let mut names = BTreeSet::new();
    for stage in stages {
        validate_stage(stage, &mut names)?;
    }
    Ok(())
}

fn validate_stage<'a>(stage: &'a StageSpec, names: &mut BTreeSet<&'a str>) -> Result<(), PipelineError> {
    if stage.name.trim().is_empty() {
        return Err(PipelineError::EmptyName);
    }
    if !names.insert(stage.name.as_str()) {
        return Err(PipelineError::DuplicateStage(stage.name.clone()));
    }

    if let StageBody::Parallel(members) = &stage.body {
        let declared: Vec<_> = members
            .iter()
            .map(|member| (member.name.as_str(), member.declared_writes()))
            .collect();

        for (i, (first, first_keys)) in declared.iter().enumerate() {
            for (second, second_keys) in &declared[i + 1..] {
                for a in first_keys {
                    if let Some(b) = second_keys.iter().find(|b| a.overlaps(b)) {
                        return Err(PipelineError::OverlappingWrites {
                            first: first.to_string(),
                            second: second.to_string(),
                            first_key: a.to_string(),
                            second_key: b.to_string(),
                        });
                    }
                }
            }
        }

        for member in members.iter() {
            validate_stage(member, names)?;
        }
    }
    Ok(())
}
