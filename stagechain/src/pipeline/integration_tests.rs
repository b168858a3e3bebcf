//! Cross-module tests for pipeline execution.

#[cfg(test)]
mod tests {
    use crate::config::StageConfig;
    use crate::core::{Outcome, Request};
    use crate::errors::StagechainError;
    use crate::pipeline::{ExecutionOptions, Pipeline, PipelineOutput};
    use crate::registry::{StageRegistry, StageSpec};
    use crate::stages::{
        AuthStage, LoggingStage, NoOpStage, RateLimiter, Stage, IDENTITY_ATTACHMENT,
        REMAINING_ATTACHMENT,
    };
    use crate::testing::{
        assert_continued, assert_failed_at, assert_short_circuited, authorized_request,
        CountingStage, FailingStage, ShortCircuitStage, SlowStage, TaggingStage, TRAIL_HEADER,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn gateway() -> Pipeline {
        Pipeline::new("gateway")
            .stage(LoggingStage::new())
            .unwrap()
            .stage(RateLimiter::new(3))
            .unwrap()
            .stage(AuthStage::with_token("secret123"))
            .unwrap()
            .freeze()
    }

    #[tokio::test]
    async fn test_gateway_admits_three_then_rate_limits() {
        let pipeline = gateway();

        for remaining in [2, 1, 0] {
            let result = pipeline.execute(authorized_request("secret123")).await;
            let request = assert_continued(&result);
            assert_eq!(request.attachment(REMAINING_ATTACHMENT), Some(&json!(remaining)));
            assert!(request.attachment(IDENTITY_ATTACHMENT).is_some());
        }

        let result = pipeline.execute(authorized_request("secret123")).await;
        assert_short_circuited(&result, 429);
    }

    #[tokio::test]
    async fn test_gateway_rejected_credentials_still_consume_quota() {
        let pipeline = gateway();

        let result = pipeline.execute(authorized_request("wrong")).await;
        assert_short_circuited(&result, 401);

        for _ in 0..2 {
            let result = pipeline.execute(authorized_request("secret123")).await;
            assert_continued(&result);
        }
        let result = pipeline.execute(authorized_request("secret123")).await;
        assert_short_circuited(&result, 429);
    }

    #[tokio::test]
    async fn test_short_circuit_at_each_position() {
        for k in 0..4 {
            let counters: Vec<Arc<CountingStage>> = (0..4)
                .map(|i| Arc::new(CountingStage::new(format!("count-{i}"))))
                .collect();

            let mut pipeline = Pipeline::new("positions");
            for (i, counter) in counters.iter().enumerate() {
                pipeline.add_stage(counter.clone()).unwrap();
                if i == k {
                    pipeline
                        .add_stage(Arc::new(ShortCircuitStage::new("stop", 204)))
                        .unwrap();
                }
            }
            let pipeline = pipeline.freeze();

            let result = pipeline.execute(Request::new("/")).await;
            assert_short_circuited(&result, 204);

            for (i, counter) in counters.iter().enumerate() {
                let expected = usize::from(i <= k);
                assert_eq!(counter.calls(), expected, "stage {i} with stop after {k}");
            }
        }
    }

    #[tokio::test]
    async fn test_failure_is_reported_exactly_once() {
        let failing = Arc::new(FailingStage::with_error(
            "validate",
            StagechainError::ValidationFailed("missing body".to_string()),
        ));
        let after = Arc::new(CountingStage::new("after"));
        let pipeline = Pipeline::new("failing")
            .stage(NoOpStage::new("first"))
            .unwrap()
            .stage(NoOpStage::new("second"))
            .unwrap()
            .append(failing.clone())
            .unwrap()
            .append(after.clone())
            .unwrap()
            .freeze();

        let result = pipeline.execute(Request::new("/")).await;
        let cause = assert_failed_at(&result, "validate", 2);

        assert_eq!(
            cause,
            &StagechainError::ValidationFailed("missing body".to_string())
        );
        assert_eq!(failing.calls(), 1);
        assert_eq!(after.calls(), 0);
        assert_eq!(result.unwrap_err().status_code(), 400);
    }

    fn tags(names: &[&str]) -> Pipeline {
        names
            .iter()
            .try_fold(Pipeline::new(names.join("+")), |p, name| {
                p.stage(TaggingStage::new(*name))
            })
            .unwrap()
            .freeze()
    }

    #[tokio::test]
    async fn test_nested_pipeline_matches_flattened() {
        let nested = Pipeline::new("outer")
            .stage(tags(&["a", "b"]))
            .unwrap()
            .stage(TaggingStage::new("c"))
            .unwrap()
            .freeze();
        let flat = tags(&["a", "b", "c"]);

        let request = Request::new("/");
        let nested_out = nested.execute(request.clone()).await.unwrap();
        let flat_out = flat.execute(request).await.unwrap();

        assert_eq!(nested_out, flat_out);
        assert_eq!(
            nested_out.request().and_then(|r| r.header(TRAIL_HEADER)),
            Some("a,b,c")
        );
    }

    #[tokio::test]
    async fn test_nested_short_circuit_matches_flattened() {
        let inner = Pipeline::new("inner")
            .stage(TaggingStage::new("a"))
            .unwrap()
            .stage(ShortCircuitStage::new("deny", 403))
            .unwrap()
            .freeze();
        let after = Arc::new(CountingStage::new("after"));
        let outer = Pipeline::new("outer")
            .stage(inner)
            .unwrap()
            .append(after.clone())
            .unwrap()
            .freeze();

        let result = outer.execute(Request::new("/")).await;
        assert_short_circuited(&result, 403);
        assert_eq!(after.calls(), 0);
    }

    #[tokio::test]
    async fn test_nested_failure_carries_full_path() {
        let inner = Pipeline::new("inner")
            .stage(NoOpStage::new("a"))
            .unwrap()
            .stage(FailingStage::new("b"))
            .unwrap()
            .freeze();
        let outer = Pipeline::new("outer")
            .stage(NoOpStage::new("first"))
            .unwrap()
            .stage(inner)
            .unwrap()
            .freeze();

        let err = outer.execute(Request::new("/")).await.unwrap_err();

        assert_eq!(err.failing_stage(), Some(("inner", 1)));
        assert_eq!(err.stage_path(), vec![("inner", 1), ("b", 1)]);
        assert!(matches!(err.root_cause(), StagechainError::Internal(_)));
    }

    #[tokio::test]
    async fn test_nested_failure_keeps_root_cause_of_flattened() {
        let nested = Pipeline::new("outer")
            .stage(
                Pipeline::new("p2")
                    .stage(NoOpStage::new("a"))
                    .unwrap()
                    .stage(FailingStage::new("b"))
                    .unwrap()
                    .freeze(),
            )
            .unwrap()
            .stage(NoOpStage::new("c"))
            .unwrap()
            .freeze();
        let flat = Pipeline::new("flat")
            .stage(NoOpStage::new("a"))
            .unwrap()
            .stage(FailingStage::new("b"))
            .unwrap()
            .stage(NoOpStage::new("c"))
            .unwrap()
            .freeze();

        let nested_err = nested.execute(Request::new("/")).await.unwrap_err();
        let flat_err = flat.execute(Request::new("/")).await.unwrap_err();

        assert_eq!(nested_err.root_cause(), flat_err.root_cause());
        assert_eq!(nested_err.stage_path().last(), Some(&("b", 1)));
        assert_eq!(flat_err.stage_path().last(), Some(&("b", 1)));

        // The outermost failing stage differs: the nested pipeline is one stage.
        assert_eq!(nested_err.failing_stage(), Some(("p2", 0)));
        assert_eq!(flat_err.failing_stage(), Some(("b", 1)));
        assert_eq!(nested_err.status_code(), flat_err.status_code());
    }

    #[tokio::test]
    async fn test_unfrozen_nested_pipeline_fails() {
        let draft = Pipeline::new("draft").stage(NoOpStage::new("a")).unwrap();
        let outer = Pipeline::new("outer").stage(draft).unwrap().freeze();

        let err = outer.execute(Request::new("/")).await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            StagechainError::PipelineNotFrozen { pipeline } if pipeline == "draft"
        ));
    }

    #[tokio::test]
    async fn test_inner_timeout_surfaces_as_stage_failure() {
        let inner = Pipeline::new("inner")
            .stage(SlowStage::new("slow", Duration::from_secs(10)))
            .unwrap()
            .with_options(ExecutionOptions::new().with_timeout(Duration::from_millis(20)))
            .freeze();
        let outer = Pipeline::new("outer").stage(inner).unwrap().freeze();

        let err = outer.execute(Request::new("/")).await.unwrap_err();
        assert_eq!(err.failing_stage(), Some(("inner", 0)));
        assert!(err.root_cause().is_timeout());
        assert_eq!(err.status_code(), 504);
    }

    #[tokio::test]
    async fn test_timeout_leaves_rate_counter_consistent() {
        let limiter = Arc::new(RateLimiter::new(10));
        let pipeline = Pipeline::new("bounded")
            .append(limiter.clone())
            .unwrap()
            .stage(SlowStage::new("slow", Duration::from_secs(10)))
            .unwrap()
            .freeze();

        for _ in 0..3 {
            let err = pipeline
                .execute_with_timeout(Request::new("/"), Duration::from_millis(10))
                .await
                .unwrap_err();
            assert!(err.is_timeout());
        }
        assert_eq!(limiter.count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_executions_share_limiter() {
        const MAX: u64 = 25;
        let pipeline = Arc::new(
            Pipeline::new("shared")
                .stage(LoggingStage::new())
                .unwrap()
                .stage(RateLimiter::new(MAX))
                .unwrap()
                .stage(AuthStage::with_token("secret123"))
                .unwrap()
                .freeze(),
        );

        let handles: Vec<_> = (0..MAX * 2)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                tokio::spawn(async move { pipeline.execute(authorized_request("secret123")).await })
            })
            .collect();

        let mut completed = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                PipelineOutput::Completed(_) => completed += 1,
                PipelineOutput::ShortCircuited(response) => {
                    assert_eq!(response.status(), 429);
                    limited += 1;
                }
            }
        }

        assert_eq!(completed, MAX);
        assert_eq!(limited, MAX);
    }

    #[tokio::test]
    async fn test_registry_assembled_gateway() {
        let registry = StageRegistry::with_builtin_stages();
        let specs = vec![
            StageSpec::new("logging"),
            StageSpec::new("validate").with_config(json!({"required_headers": ["authorization"]})),
            StageSpec::new("ratelimit").with_config(json!({"max": 1})),
            StageSpec::new("auth").with_config(json!({"tokens": ["secret123"]})),
        ];
        let pipeline = registry.assemble("assembled", &specs).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["logging", "validate", "ratelimit", "auth"]
        );

        let result = pipeline.execute(Request::new("/")).await;
        let cause = assert_failed_at(&result, "validate", 1);
        assert!(matches!(cause, StagechainError::ValidationFailed(_)));

        let result = pipeline.execute(authorized_request("secret123")).await;
        assert_continued(&result);

        let result = pipeline.execute(authorized_request("secret123")).await;
        assert_short_circuited(&result, 429);
    }

    #[tokio::test]
    async fn test_registry_unknown_stage_name() {
        let registry = StageRegistry::with_builtin_stages();
        let err = registry
            .assemble("broken", &[StageSpec::new("compress")])
            .unwrap_err();
        assert_eq!(err, StagechainError::UnknownStageName("compress".to_string()));
    }

    #[tokio::test]
    async fn test_registered_pipeline_as_stage() {
        let registry = StageRegistry::new();
        let inner = Arc::new(tags(&["x", "y"]));
        registry
            .register("tagged", move |_: &StageConfig| {
                let stage: Arc<dyn Stage> = inner.clone();
                Ok(stage)
            })
            .unwrap();

        let pipeline = registry
            .assemble("outer", &[StageSpec::new("tagged")])
            .unwrap();
        let result = pipeline.execute(Request::new("/")).await;
        let request = assert_continued(&result);
        assert_eq!(request.header(TRAIL_HEADER), Some("x,y"));
    }

    #[tokio::test]
    async fn test_outcome_of_pipeline_stage() {
        let pipeline = tags(&["only"]);
        let outcome = pipeline.process(Request::new("/")).await;
        assert!(matches!(outcome, Outcome::Continue(ref r) if r.header(TRAIL_HEADER) == Some("only")));
    }
}
