#![cfg(feature = "bin-server")]
//! Attach/feed/detach lifecycle: attaching should announce readiness quickly, feeding
//! silence should produce no image frames, and detaching should stop the background task cleanly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sstv_ext::framework::frame::TAG_STATUS;
use sstv_ext::framework::session::Session;

#[tokio::test]
async fn attach_feed_silence_then_detach() {
    let frames = Arc::new(std::sync::Mutex::new(Vec::<Vec<u8>>::new()));
    let collected = frames.clone();
    let image_frame_count = Arc::new(AtomicUsize::new(0));
    let image_counter = image_frame_count.clone();

    let session = Session::attach("sstv", 8000, move |frame| {
        let is_status = frame.first() == Some(&TAG_STATUS);
        if !is_status {
            image_counter.fetch_add(1, Ordering::Relaxed);
        }
        collected.lock().unwrap().push(frame);
    })
    .expect("sstv extension should be registered");

    session.feed(vec![0i16; 1600]); // 200ms of silence at 8kHz

    tokio::time::sleep(Duration::from_millis(500)).await;

    let status_seen = frames
        .lock()
        .unwrap()
        .iter()
        .any(|f| f.first() == Some(&TAG_STATUS));
    assert!(status_seen, "expected a status frame announcing readiness");
    assert_eq!(image_frame_count.load(Ordering::Relaxed), 0);

    let detach_started = tokio::time::Instant::now();
    session.detach().await;
    assert!(detach_started.elapsed() < Duration::from_millis(500));
}
