//! ArticlePlanner against a scripted completion service.

use std::sync::Arc;

use penman_core::plan::{ArticlePlanner, PlanGenerationError, PlanParseError, PlannerConfig};
use penman_core::provider::{
    ConfigurationError, ModelCatalog, ProviderError, ProviderKind, ResponseFormat,
};
use penman_test_utils::{
    SAMPLE_LANGUAGE, SAMPLE_TITLE, SAMPLE_TOPIC, ScriptedService, sample_heading_paths,
    sample_plan_json,
};

fn planner(service: Arc<ScriptedService>) -> ArticlePlanner {
    ArticlePlanner::new(
        service,
        ModelCatalog::defaults_for(ProviderKind::OpenRouter),
        PlannerConfig::default(),
    )
}

#[tokio::test]
async fn sample_outline_is_parsed_into_sections() {
    let service = Arc::new(ScriptedService::new(ProviderKind::OpenRouter).on_plan(sample_plan_json()));
    let plan = planner(service.clone())
        .generate_plan(SAMPLE_TITLE, SAMPLE_TOPIC, SAMPLE_LANGUAGE)
        .await
        .expect("plan parses");

    assert_eq!(plan.title, SAMPLE_TITLE);
    assert_eq!(plan.language, SAMPLE_LANGUAGE);
    let headings: Vec<_> = plan.sections.iter().map(|s| s.heading.as_str()).collect();
    assert_eq!(
        headings,
        vec![
            "Introduction",
            "Définir une fonction",
            "Les arguments",
            "Portée des variables",
            "Exercises",
            "Conclusion",
        ]
    );
    let paths: Vec<_> = plan
        .slots()
        .into_iter()
        .filter_map(|slot| plan.heading_path(slot))
        .collect();
    assert_eq!(paths, sample_heading_paths());
    assert!(plan.slots().iter().all(|&slot| plan.body(slot).is_none()));

    let exercise = &plan.sections[4].subsections[0];
    assert!(exercise
        .description
        .as_deref()
        .is_some_and(|d| d.contains("Solution: def average")));

    let calls = service.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model, "deepseek/deepseek-r1-0528:free");
    assert_eq!(calls[0].response_format, Some(ResponseFormat::JsonObject));
    assert!(calls[0].prompt.contains(SAMPLE_TITLE));
}

#[tokio::test]
async fn fenced_and_truncated_json_is_repaired() {
    let raw = "```json\n{\"sections\": [{\"title\": \"Bases\"}, {\"title\": \"Avancé\", \"subsections\": [{\"title\": \"Décorateurs\"";
    let service = Arc::new(ScriptedService::new(ProviderKind::Gemini).on_plan(raw));
    let plan = ArticlePlanner::new(
        service,
        ModelCatalog::defaults_for(ProviderKind::Gemini),
        PlannerConfig::default(),
    )
    .generate_plan("Python avancé", "python", "Python")
    .await
    .expect("repaired plan parses");

    assert_eq!(plan.sections.len(), 2);
    assert_eq!(plan.sections[1].subsections[0].heading, "Décorateurs");
}

#[tokio::test]
async fn unparseable_answer_is_retried_with_the_error_quoted() {
    let service = Arc::new(
        ScriptedService::new(ProviderKind::OpenRouter).on_plan_sequence(vec![
            Ok(r#"{"sections": []}"#.to_string()),
            Ok(sample_plan_json()),
        ]),
    );
    let plan = planner(service.clone())
        .generate_plan(SAMPLE_TITLE, SAMPLE_TOPIC, SAMPLE_LANGUAGE)
        .await
        .expect("second answer parses");

    assert_eq!(plan.sections.len(), 6);
    let calls = service.calls();
    assert_eq!(calls.len(), 2);
    assert!(!calls[0].prompt.contains("REJECTED"));
    assert!(
        calls[1]
            .prompt
            .contains("YOUR PREVIOUS ANSWER WAS REJECTED: plan must contain at least one section")
    );
}

#[tokio::test]
async fn gives_up_after_the_retry_budget() {
    let service = Arc::new(
        ScriptedService::new(ProviderKind::OpenRouter).on_plan("I cannot produce JSON, sorry."),
    );
    let err = planner(service.clone())
        .generate_plan(SAMPLE_TITLE, SAMPLE_TOPIC, SAMPLE_LANGUAGE)
        .await
        .unwrap_err();

    match err {
        PlanGenerationError::Unparseable {
            attempts,
            last_error,
        } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last_error, PlanParseError::Json(_)));
        }
        other => panic!("expected Unparseable, got {other:?}"),
    }
    assert_eq!(service.plan_calls(), 3);
}

#[tokio::test]
async fn plan_retries_are_configurable() {
    let service = Arc::new(ScriptedService::new(ProviderKind::OpenRouter).on_plan("[]"));
    let err = ArticlePlanner::new(
        service.clone(),
        ModelCatalog::defaults_for(ProviderKind::OpenRouter),
        PlannerConfig {
            plan_retries: 0,
            ..PlannerConfig::default()
        },
    )
    .generate_plan(SAMPLE_TITLE, SAMPLE_TOPIC, SAMPLE_LANGUAGE)
    .await
    .unwrap_err();

    assert!(matches!(err, PlanGenerationError::Unparseable { attempts: 1, .. }));
    assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn malformed_provider_response_counts_as_a_parse_failure() {
    let service = Arc::new(
        ScriptedService::new(ProviderKind::OpenRouter).on_plan_sequence(vec![
            Err(ProviderError::MalformedResponse("expected a JSON object".into())),
            Ok(sample_plan_json()),
        ]),
    );
    planner(service.clone())
        .generate_plan(SAMPLE_TITLE, SAMPLE_TOPIC, SAMPLE_LANGUAGE)
        .await
        .expect("retry succeeds");
    assert_eq!(service.plan_calls(), 2);
}

#[tokio::test]
async fn provider_error_is_surfaced_immediately() {
    let service = Arc::new(
        ScriptedService::new(ProviderKind::OpenRouter).on_plan_sequence(vec![Err(
            ProviderError::Authentication {
                provider: ProviderKind::OpenRouter,
                status: 401,
                message: "bad key".into(),
            },
        )]),
    );
    let err = planner(service.clone())
        .generate_plan(SAMPLE_TITLE, SAMPLE_TOPIC, SAMPLE_LANGUAGE)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlanGenerationError::Provider(ProviderError::Authentication { .. })
    ));
    assert_eq!(service.call_count(), 1);
}

#[tokio::test]
async fn empty_title_makes_no_request() {
    let service = Arc::new(ScriptedService::happy_path(ProviderKind::OpenRouter));
    let err = planner(service.clone())
        .generate_plan("   ", SAMPLE_TOPIC, SAMPLE_LANGUAGE)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlanGenerationError::Unparseable {
            attempts: 0,
            last_error: PlanParseError::EmptyTitle,
        }
    ));
    assert_eq!(service.call_count(), 0);
}

#[tokio::test]
async fn empty_model_list_is_a_configuration_error() {
    let service = Arc::new(ScriptedService::happy_path(ProviderKind::OpenRouter));
    let models = ModelCatalog {
        planner: Vec::new(),
        writer: vec!["w".into()],
    };
    let err = ArticlePlanner::new(service.clone(), models, PlannerConfig::default())
        .generate_plan(SAMPLE_TITLE, SAMPLE_TOPIC, SAMPLE_LANGUAGE)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PlanGenerationError::Provider(ProviderError::Configuration(
            ConfigurationError::NoModels { .. }
        ))
    ));
    assert_eq!(service.call_count(), 0);
}
