//! Integration tests for method invocation through the registry.

use loom_plugins::{ErrorKind, PluginError, PluginRequest, PluginTarget, Surface};
use loom_test::{Fixture, TestHost};
use serde_json::json;

#[tokio::test]
async fn test_add_returns_sum() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let sum = host.registry.invoke(id, "add", vec![json!(2), json!(2)]).await.unwrap();
    assert_eq!(sum, json!(4.0));
    let sum = host.registry.invoke(id, "add", vec![json!(1), json!(2)]).await.unwrap();
    assert_eq!(sum, json!(3.0));
}

#[tokio::test]
async fn test_string_arguments_are_coerced() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let sum = host
        .registry
        .invoke(id, "add", vec![json!("1.5"), json!(2)])
        .await
        .unwrap();
    assert_eq!(sum, json!(3.5));
}

#[tokio::test]
async fn test_uncoercible_argument_reports_position() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let err = host
        .registry
        .invoke(id, "add", vec![json!(1), json!("lots")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PluginError::ArgumentCoercion { ref method, position: 1, .. } if method == "add"
    ));
}

#[tokio::test]
async fn test_wrong_arity_is_method_not_found() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let err = host.registry.invoke(id, "add", vec![json!(1)]).await.unwrap_err();
    assert!(matches!(
        err,
        PluginError::MethodNotFound { arity: 1, surface: Surface::Unrestricted, .. }
    ));
    let err = host.registry.invoke(id, "subtract", vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotFound);
}

#[tokio::test]
async fn test_method_failure_is_execution_error() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let err = host
        .registry
        .invoke(id, "divide", vec![json!(1), json!(0)])
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::Execution { ref message, .. } if message == "division by zero"));

    let err = host.registry.invoke(id, "fail", vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);
}

#[tokio::test]
async fn test_panicking_method_does_not_take_down_the_host() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let err = host.registry.invoke(id, "panic", vec![]).await.unwrap_err();
    assert!(matches!(err, PluginError::Execution { ref message, .. } if message.contains("fixture panicked")));

    // Still usable afterwards.
    let sum = host.registry.invoke(id, "add", vec![json!(1), json!(1)]).await.unwrap();
    assert_eq!(sum, json!(2.0));
}

#[tokio::test]
async fn test_contract_methods_are_invocable() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    assert_eq!(host.registry.invoke(id, "name", vec![]).await.unwrap(), json!("Echo Plugin"));
    assert_eq!(
        host.registry.invoke(id, "execute", vec![json!("ping")]).await.unwrap(),
        json!("ping")
    );
    assert_eq!(host.registry.execute_simple(id, "pong").await.unwrap(), "pong");
}

#[tokio::test]
async fn test_safe_surface_hides_unsafe_methods() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    let out = host.registry.safe_invoke(id, "echo", vec![json!("hi")]).await.unwrap();
    assert_eq!(out, json!("hi"));

    let err = host.registry.safe_invoke(id, "shout", vec![json!("hi")]).await.unwrap_err();
    assert!(matches!(err, PluginError::MethodNotFound { surface: Surface::Safe, .. }));
    let err = host.registry.safe_invoke(id, "name", vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodNotFound);

    let safe = host.registry.list_safe_methods(id).await.unwrap();
    let names: Vec<_> = safe.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["echo"]);
    assert_eq!(safe[0].description, "Returns its input unchanged");
}

#[tokio::test]
async fn test_list_methods_puts_contract_first() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let methods = host.registry.list_methods(id).await.unwrap();
    let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["name", "description", "execute", "add", "divide", "fail", "panic"]);
    assert_eq!(methods[3].to_string(), "add(float, float) -> float");
}

#[tokio::test]
async fn test_list_methods_of_inactive_plugin_uses_throwaway_instance() {
    let host = TestHost::new().await;
    let record = host.upload(Fixture::Echo).await;

    let methods = host.registry.list_methods(record.id).await.unwrap();
    assert!(methods.iter().any(|m| m.name == "shout"));
    assert!(!host.registry.is_active(record.id));
    assert_eq!(host.loader().load_count(), 1);
    // No context, no activation.
    assert!(host.hooks().events().is_empty());

    let err = host.registry.list_safe_methods(record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_execute_request_variants() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    let text = host.registry.execute(id, PluginRequest::text("plain")).await.unwrap();
    assert_eq!(text, json!("plain"));

    let call = host
        .registry
        .execute(id, PluginRequest::call("shout", vec![json!("loud")]))
        .await
        .unwrap();
    assert_eq!(call, json!("LOUD"));

    let request: PluginRequest = serde_json::from_value(json!({"type": "args", "args": ["positional"]})).unwrap();
    assert_eq!(host.registry.execute(id, request).await.unwrap(), json!("positional"));
}

#[tokio::test]
async fn test_resolve_and_invoke_by_name() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    let target: PluginTarget = "echo plugin".parse().unwrap();
    let out = host
        .registry
        .resolve_and_invoke(&target, Some("shout"), vec![json!("x")])
        .await
        .unwrap();
    assert_eq!(out, json!("X"));

    let out = host
        .registry
        .resolve_and_invoke(&PluginTarget::from(id), None, vec![json!("default")])
        .await
        .unwrap();
    assert_eq!(out, json!("default"));

    let missing = PluginTarget::Name("Nope".to_owned());
    let err = host.registry.resolve_and_invoke(&missing, None, vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invocations() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Adder).await;

    let calls = (0..32).map(|i| {
        let registry = host.registry.clone();
        async move { registry.invoke(id, "add", vec![json!(i), json!(1)]).await }
    });
    let results = futures::future::join_all(calls).await;

    for (i, result) in results.into_iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let expected = i as f64 + 1.0;
        assert_eq!(result.unwrap(), json!(expected));
    }
}
