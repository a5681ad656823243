//! Round trips through the vision RPC bridge over an in-process connection.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{empty_vision, Counters, FAKE_CLASSIFIER, FAKE_DETECTOR};
use robokit_core::components::camera::Image;
use robokit_core::registry::{ClientConn, RpcMux, SubtypeService};
use robokit_core::vision::builtin::COLOR_DETECTOR;
use robokit_core::vision::{self, ModelConfig, VisionService, VISION_SERVICE_DESCRIPTOR};
use robokit_core::{default_subtypes, Closer, ResourceError, ResourceHandle};

async fn connect(counters: &Counters) -> Arc<dyn VisionService> {
    let subtypes = default_subtypes().unwrap();
    let local: Arc<dyn VisionService> = Arc::new(empty_vision(counters).await);

    let served = Arc::new(SubtypeService::new(vision::subtype()));
    served.add("vis", ResourceHandle::new::<dyn VisionService>("builtin", local));

    let mux = Arc::new(RpcMux::new());
    subtypes
        .serve(&HashMap::from([(vision::subtype(), served)]), &mux)
        .unwrap();
    assert_eq!(mux.services(), vec!["rdk.service.vision.v1.VisionService"]);

    let conn: Arc<dyn ClientConn> = mux;
    subtypes
        .client(&vision::subtype(), conn, "vis")
        .unwrap()
        .downcast::<dyn VisionService>()
        .unwrap()
}

#[tokio::test]
async fn test_model_lifecycle_over_rpc() {
    let counters = Counters::default();
    let client = connect(&counters).await;

    client
        .add_detector(ModelConfig::new("d1", FAKE_DETECTOR))
        .await
        .unwrap();
    assert_eq!(client.detector_names().await.unwrap(), vec!["d1"]);
    assert_eq!(client.segmenter_names().await.unwrap(), vec!["d1_segmenter"]);

    client.remove_detector("d1").await.unwrap();
    assert!(client.detector_names().await.unwrap().is_empty());
    assert!(client.segmenter_names().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_results_cross_the_wire() {
    let counters = Counters::default();
    let client = connect(&counters).await;
    client
        .add_classifier(ModelConfig::new("c1", FAKE_CLASSIFIER))
        .await
        .unwrap();

    let top = client.classifications_from_camera("cam", "c1", 3).await.unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(counters.frames_released(), 1);

    let image = Image::filled(2, 2, [0, 0, 0]).unwrap();
    let top = client.classifications(&image, "c1", 1).await.unwrap();
    assert_eq!(top.0[0].label, "label7");

    let schema = client.model_parameter_schema("detector_segmenter").await.unwrap();
    assert_eq!(schema["type"], "object");
}

#[tokio::test]
async fn test_remote_errors_keep_their_category() {
    let counters = Counters::default();
    let client = connect(&counters).await;

    let err = client.detections_from_camera("cam", "missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "model not found: missing");

    client
        .add_classifier(ModelConfig::new("c1", FAKE_CLASSIFIER))
        .await
        .unwrap();
    let err = client
        .add_classifier(ModelConfig::new("c1", FAKE_CLASSIFIER))
        .await
        .unwrap_err();
    assert!(matches!(err, ResourceError::Conflict { .. }));

    let err = client.remove_detector("c1").await.unwrap_err();
    assert!(matches!(err, ResourceError::TypeMismatch { .. }));
}

#[tokio::test]
async fn test_image_with_wrong_dimensions_is_rejected() {
    let counters = Counters::default();
    let subtypes = default_subtypes().unwrap();
    let local: Arc<dyn VisionService> = Arc::new(empty_vision(&counters).await);
    local
        .add_detector(
            ModelConfig::new("red", COLOR_DETECTOR).with_parameter("detect_color", "#ff0000"),
        )
        .await
        .unwrap();
    let served = Arc::new(SubtypeService::new(vision::subtype()));
    served.add("vis", ResourceHandle::new::<dyn VisionService>("builtin", local));
    let mux = RpcMux::new();
    subtypes
        .serve(&HashMap::from([(vision::subtype(), served)]), &mux)
        .unwrap();

    for image in [
        r#"{"width":4294967295,"height":4294967295,"pixels":[]}"#,
        r#"{"width":3,"height":3,"pixels":[[255,0,0]]}"#,
    ] {
        let payload = format!(
            r#"{{"method":"Detections","name":"vis","detector":"red","image":{}}}"#,
            image
        );
        let err = mux
            .invoke(VISION_SERVICE_DESCRIPTOR.service, payload.into_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, ResourceError::Validation(_)), "got {}", err);
    }

    // A well-formed image still goes through.
    let payload = br#"{"method":"Detections","name":"vis","detector":"red",
        "image":{"width":1,"height":1,"pixels":[[255,0,0]]}}"#;
    let reply = mux
        .invoke(VISION_SERVICE_DESCRIPTOR.service, payload.to_vec())
        .await
        .unwrap();
    let reply: serde_json::Value = serde_json::from_slice(&reply).unwrap();
    assert_eq!(reply["result"], "detections");
    assert_eq!(reply["value"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_unknown_instance_is_not_found() {
    let subtypes = default_subtypes().unwrap();
    let mux = Arc::new(RpcMux::new());
    subtypes
        .serve(
            &HashMap::from([(vision::subtype(), Arc::new(SubtypeService::new(vision::subtype())))]),
            &mux,
        )
        .unwrap();
    let client = vision::VisionClient::new(mux, "ghost");

    let err = client.detector_names().await.unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().contains("ghost"));
}

#[tokio::test]
async fn test_unserved_subtype_is_not_found() {
    let client = vision::VisionClient::new(Arc::new(RpcMux::new()), "vis");
    assert!(client.detector_names().await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_client_close_is_local() {
    let counters = Counters::default();
    let client = connect(&counters).await;
    client
        .add_classifier(ModelConfig::new("c1", FAKE_CLASSIFIER))
        .await
        .unwrap();

    client.close().await.unwrap();
    assert_eq!(client.classifier_names().await.unwrap(), vec!["c1"]);
}
