// ABOUTME: Property tests for version identity, output publication, and pipeline status.
// ABOUTME: Uses proptest; async cases drive a current-thread runtime per case.

mod support;

use proptest::prelude::*;

use stagehand::context::{OutputError, Outputs};
use stagehand::pipeline::{OutputKey, Pipeline, PipelineStatus, StageSpec, StageStatus, execute};
use stagehand::types::{Environment, VersionToken};
use support::{Journal, Step};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn build_version_is_a_pure_function(revision in "[0-9a-f]{7,40}", counter in 0u64..1_000_000) {
        let first = VersionToken::derive(&revision, counter).unwrap();
        let second = VersionToken::derive(&revision, counter).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.as_str(), format!("{counter}-{}", &revision[..7]));
    }

    #[test]
    fn build_version_ignores_revision_case(revision in "[0-9a-f]{7,12}", counter in 0u64..1000) {
        let upper = VersionToken::derive(&revision.to_ascii_uppercase(), counter).unwrap();
        prop_assert_eq!(upper, VersionToken::derive(&revision, counter).unwrap());
    }

    #[test]
    fn outputs_keep_the_first_value(key in "[a-z]{1,8}", first in "[a-z0-9]{1,8}", second in "[a-z0-9]{1,8}") {
        let mut outputs = Outputs::new();
        outputs.insert(key.as_str(), first.as_str()).unwrap();
        prop_assert_eq!(outputs.insert(key.as_str(), second.as_str()), Err(OutputError::Duplicate(key.clone())));
        prop_assert_eq!(outputs.get(&key), Some(first.as_str()));
    }

    #[test]
    fn output_key_overlap_is_symmetric(a in "[a-c]{1,3}\\*?", b in "[a-c]{1,3}\\*?") {
        let (a, b) = (OutputKey::parse(&a), OutputKey::parse(&b));
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }

    #[test]
    fn pipeline_fails_iff_a_stage_failed(failures in proptest::collection::vec(any::<bool>(), 1..6)) {
        let journal = Journal::default();
        let mut builder = Pipeline::builder();
        for (i, fails) in failures.iter().enumerate() {
            let name = format!("stage-{i}");
            let step = Step::new(&name, &journal);
            let step = if *fails { step.fails("boom") } else { step };
            builder = builder.stage(StageSpec::action(name, step));
        }
        let pipeline = builder.build().unwrap();
        let mut ctx = support::context(Environment::Dev);

        let outcome = runtime().block_on(execute(&pipeline, &mut ctx));

        let first_failure = failures.iter().position(|f| *f);
        let expected = if first_failure.is_some() { PipelineStatus::Failure } else { PipelineStatus::Success };
        prop_assert_eq!(outcome.status(), expected);
        for (i, result) in outcome.results.iter().enumerate() {
            let status = match first_failure {
                Some(f) if i > f => StageStatus::Skipped,
                Some(f) if i == f => StageStatus::Failure,
                _ => StageStatus::Success,
            };
            prop_assert_eq!(result.status(), status);
        }
        let exit = outcome.exit_code();
        prop_assert_eq!(exit == 0, first_failure.is_none());
    }
}
