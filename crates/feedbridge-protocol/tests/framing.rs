// Framing behaviour over whole chunks as the transport delivers them.

use feedbridge_protocol::{EventFrame, StreamFramer};
use proptest::prelude::*;

fn frame(message: &str, host: &str) -> String {
    format!(">> 「 {message} 」(2024/05/01 12:00:00 君 {host}) <<")
}

#[test]
fn multi_record_chunk_keeps_document_order() {
    let chunk = format!(
        "{}\r\n{}\r\n{}\r\n",
        frame("first", "a.example"),
        frame("second", "b.example"),
        frame("third", "c.example"),
    );
    let frames = StreamFramer::new(20).extract(chunk.as_bytes());
    let messages: Vec<&str> = frames.iter().map(|f| f.fields.message.as_str()).collect();
    assert_eq!(messages, ["first", "second", "third"]);
}

#[test]
fn partial_trailing_frame_is_not_yielded() {
    let chunk = format!("{}>> 「 cut off", frame("whole", "h"));
    let frames = StreamFramer::new(0).extract(chunk.as_bytes());
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].fields.message, "whole");
}

#[test]
fn record_event_frame_shape() {
    let frames = StreamFramer::new(0).extract(frame("hi", "h").as_bytes());
    let record = feedbridge_core::EventRecord {
        id: "1700000000000-0".into(),
        raw_text: frames[0].raw.clone(),
        fields: frames[0].fields.clone(),
    };
    let json = serde_json::to_string(&EventFrame::record(&record).with_seq(7)).unwrap();

    assert!(json.contains(r#""type":"event""#));
    assert!(json.contains(r#""event":"chat.record""#));
    assert!(json.contains(r#""id":"1700000000000-0""#));
    assert!(json.contains(r#""seq":7"#));
}

proptest! {
    #[test]
    fn sub_threshold_chunks_never_yield(lens in prop::collection::vec(0usize..64, 1..16)) {
        let framer = StreamFramer::new(64);
        let full = frame("x", "h");
        for len in lens {
            // Every prefix shorter than the threshold is noise, even if it
            // happens to contain a complete frame.
            let bytes = full.as_bytes();
            let chunk = &bytes[..len.min(bytes.len())];
            prop_assert!(framer.extract(chunk).is_empty());
        }
    }
}
