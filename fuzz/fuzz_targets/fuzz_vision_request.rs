//! Fuzz target for vision RPC request decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use robokit_core::vision::rpc::{decode_request, VisionRequest};

fuzz_target!(|data: &[u8]| {
    let Ok(request) = decode_request(data) else {
        return;
    };
    let _ = request.method();
    let _ = request.instance();
    // Decoded images always agree with their dimensions.
    if let VisionRequest::Detections { image, .. } | VisionRequest::Classifications { image, .. } = &request {
        let area = u64::from(image.width()) * u64::from(image.height());
        assert_eq!(area == 0, image.is_empty());
        assert!(image.get(image.width().saturating_sub(1), image.height().saturating_sub(1)).is_some() || area == 0);
    }
});
