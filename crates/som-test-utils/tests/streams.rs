//! Stream asset lifecycle against the in-memory cluster and injected faults.

use pretty_assertions::assert_eq;
use serde_json::json;
use som_client::{
    DataStream, DataStreamLifecycle, DocumentStore, IngestPipeline, MemoryDocumentStore, MockDocumentStore, Processor,
    StoreError,
};
use som_streams::{
    get_data_stream_lifecycle, EffectiveLifecycle, RoutingRule, StreamAssetManager, StreamDefinition, StreamError,
};
use som_test_utils::FaultInjectingStore;
use std::sync::Arc;

fn pipeline(processors: Vec<Processor>) -> IngestPipeline {
    IngestPipeline::with_processors(processors)
}

/// Deleting a stream nobody created succeeds: every 404 is absorbed.
#[tokio::test]
async fn delete_of_absent_stream_completes() {
    let mut mock = MockDocumentStore::new();
    mock.expect_delete_data_stream()
        .times(1)
        .returning(|name| Err(StoreError::not_found(name)));
    mock.expect_delete_index_template()
        .times(1)
        .returning(|name| Err(StoreError::not_found(name)));
    mock.expect_delete_component_template()
        .times(1)
        .returning(|name| Err(StoreError::not_found(name)));
    mock.expect_delete_pipeline()
        .times(2)
        .returning(|id| Err(StoreError::not_found(id)));

    StreamAssetManager::new(Arc::new(mock))
        .delete_managed_stream_objects("logs-test")
        .await
        .unwrap();
}

/// Anything but a 404 aborts the delete sequence.
#[tokio::test]
async fn delete_stops_on_backend_error() {
    let memory = Arc::new(MemoryDocumentStore::new());
    let faulty = Arc::new(FaultInjectingStore::new(memory.clone()).fail_on(
        "delete_component_template",
        StoreError::status(500, "boom"),
    ));
    let manager = StreamAssetManager::new(faulty.clone());
    manager
        .upsert_managed_stream_objects(&StreamDefinition::new("logs"))
        .await
        .unwrap();

    let err = manager.delete_managed_stream_objects("logs").await.unwrap_err();
    assert_eq!(err, StreamError::Store(StoreError::status(500, "boom")));
    assert_eq!(faulty.injected(), vec!["delete_component_template logs@stream.layer"]);
    // Earlier steps ran; later ones did not
    assert!(memory.get_data_stream("logs").await.is_err());
    assert!(memory.get_pipeline("logs@stream.processing").await.is_ok());
}

/// A -> B -> C where C invokes the managed pipeline resolves to C.
#[tokio::test]
async fn chain_resolves_to_referencing_pipeline() {
    let store = Arc::new(MemoryDocumentStore::new());
    store
        .put_pipeline("logs-a@pipeline", pipeline(vec![Processor::pipeline("logs-b@custom")]))
        .await
        .unwrap();
    store
        .put_pipeline(
            "logs-b@custom",
            pipeline(vec![
                Processor::pipeline("logs-unrelated@custom"),
                Processor::pipeline("logs-c@custom"),
            ]),
        )
        .await
        .unwrap();
    store
        .put_pipeline("logs-c@custom", pipeline(vec![Processor::pipeline("logs-a@stream.processing")]))
        .await
        .unwrap();

    let reference = StreamAssetManager::new(store.clone())
        .find_stream_managed_pipeline_reference("logs-a@pipeline", "logs-a")
        .await
        .unwrap();
    assert!(reference.references_stream_managed_pipeline);
    assert_eq!(reference.target_pipeline_name, "logs-c@custom");
}

/// An empty access check makes no store call.
#[tokio::test]
async fn empty_access_check_is_local() {
    let mut mock = MockDocumentStore::new();
    mock.expect_has_privileges().never();
    let access = StreamAssetManager::new(Arc::new(mock)).check_access_bulk(&[]).await.unwrap();
    assert!(access.is_empty());
}

/// ILM, DSL and disabled lifecycles as the wire shape callers receive.
#[test]
fn lifecycle_shapes() {
    let mut ilm = DataStream::new("logs-a", "t");
    ilm.ilm_policy = Some("logs-default".into());
    assert_eq!(
        serde_json::to_value(get_data_stream_lifecycle(Some(&ilm))).unwrap(),
        json!({"ilm": {"policy": "logs-default"}})
    );

    let mut dsl = DataStream::new("logs-b", "t");
    dsl.lifecycle = Some(DataStreamLifecycle {
        enabled: Some(true),
        data_retention: Some("14d".into()),
    });
    assert_eq!(
        serde_json::to_value(get_data_stream_lifecycle(Some(&dsl))).unwrap(),
        json!({"dsl": {"data_retention": "14d"}})
    );

    assert_eq!(
        get_data_stream_lifecycle(Some(&DataStream::new("logs-c", "t"))),
        EffectiveLifecycle::Disabled {}
    );

    let mut opted_out = DataStream::new("logs-d", "t");
    opted_out.ilm_policy = Some("p".into());
    opted_out.prefer_ilm = Some(false);
    opted_out.lifecycle = Some(DataStreamLifecycle {
        enabled: Some(false),
        data_retention: None,
    });
    assert_eq!(
        serde_json::to_value(get_data_stream_lifecycle(Some(&opted_out))).unwrap(),
        json!({"disabled": {}})
    );

    let mut unflagged = DataStream::new("logs-e", "t");
    unflagged.lifecycle = Some(DataStreamLifecycle {
        enabled: None,
        data_retention: Some("7d".into()),
    });
    assert_eq!(get_data_stream_lifecycle(Some(&unflagged)), EffectiveLifecycle::Disabled {});
}

/// Upsert, route, tear down: a full managed stream round trip.
#[tokio::test]
async fn managed_stream_round_trip() {
    let store = Arc::new(MemoryDocumentStore::new());
    let manager = StreamAssetManager::new(store.clone());
    let definition = StreamDefinition::new("logs")
        .with_field("host.name", json!({"type": "keyword"}))
        .with_route(RoutingRule::new("logs.web", "ctx.host?.name == 'web'"))
        .with_retention("3d");

    manager.upsert_managed_stream_objects(&definition).await.unwrap();
    assert_eq!(
        manager.get_effective_lifecycle("logs").await.unwrap(),
        EffectiveLifecycle::Dsl {
            data_retention: Some("3d".into())
        }
    );
    assert!(manager.check_access("logs").await.is_ok());

    manager.delete_stream_objects("logs").await.unwrap();
    assert!(manager.get_data_stream("logs").await.unwrap_err().is_not_found());
    assert!(store.get_index_templates().await.unwrap().is_empty());
}
