// Pin the exact JSON wire shapes. Editor clients are built against these;
// a failure here means a breaking protocol change.

use syncroom_core::types::ChatMessage;
use syncroom_ot::Operation;
use syncroom_protocol::{ClientFrame, ServerFrame};

#[test]
fn join_room_parses() {
    let json = r#"{"event":"join-room","data":{"room_id":"r-1","token":"abc"}}"#;
    let frame = ClientFrame::parse(json).unwrap();
    assert_eq!(
        frame,
        ClientFrame::JoinRoom {
            room_id: "r-1".to_string(),
            token: Some("abc".to_string()),
        }
    );
}

#[test]
fn join_room_token_is_optional() {
    let json = r#"{"event":"join-room","data":{"room_id":"r-1"}}"#;
    let frame = ClientFrame::parse(json).unwrap();
    assert!(matches!(frame, ClientFrame::JoinRoom { token: None, .. }));
}

#[test]
fn leave_room_has_no_data() {
    let frame = ClientFrame::parse(r#"{"event":"leave-room"}"#).unwrap();
    assert_eq!(frame, ClientFrame::LeaveRoom);
}

#[test]
fn code_change_carries_tagged_operation() {
    let json = r#"{"event":"code-change","data":{
        "file_id":"f-1",
        "operation":{"type":"insert","position":0,"text":"hello","user_id":"u-1","timestamp":100}
    }}"#;
    let frame = ClientFrame::parse(json).unwrap();
    match frame {
        ClientFrame::CodeChange { file_id, operation } => {
            assert_eq!(file_id, "f-1");
            assert_eq!(
                operation,
                Operation::Insert {
                    position: 0,
                    text: "hello".to_string(),
                    user_id: "u-1".to_string(),
                    timestamp: 100,
                }
            );
        }
        other => panic!("expected code-change, got {other:?}"),
    }
}

#[test]
fn delete_operation_parses() {
    let json = r#"{"event":"code-change","data":{
        "file_id":"f-1",
        "operation":{"type":"delete","position":1,"length":3,"user_id":"u-1","timestamp":7}
    }}"#;
    assert!(ClientFrame::parse(json).is_ok());
}

#[test]
fn cursor_position_parses() {
    let json = r#"{"event":"cursor-position","data":{"file_id":"f-1","line":12,"column":3}}"#;
    let frame = ClientFrame::parse(json).unwrap();
    assert_eq!(
        frame,
        ClientFrame::CursorPosition {
            file_id: "f-1".to_string(),
            line: 12,
            column: 3,
        }
    );
}

#[test]
fn malformed_frame_is_an_error() {
    assert!(ClientFrame::parse(r#"{"event":"code-change","data":42}"#).is_err());
    assert!(ClientFrame::parse("not json").is_err());
    assert!(ClientFrame::parse(r#"{"event":"no-such-event"}"#).is_err());
}

#[test]
fn code_update_serialization() {
    let frame = ServerFrame::CodeUpdate {
        file_id: "f-1".to_string(),
        operation: Operation::Insert {
            position: 0,
            text: "hello".to_string(),
            user_id: "u-x".to_string(),
            timestamp: 100,
        },
        user_id: "u-x".to_string(),
    };
    let json = frame.to_json();
    assert!(json.contains(r#""event":"code-update""#));
    assert!(json.contains(r#""type":"insert""#));
    assert!(json.contains(r#""user_id":"u-x""#));
}

#[test]
fn user_left_serialization() {
    let json = ServerFrame::UserLeft {
        user_id: "u-1".to_string(),
    }
    .to_json();
    assert_eq!(json, r#"{"event":"user-left","data":{"user_id":"u-1"}}"#);
}

#[test]
fn chat_message_data_is_the_entry_itself() {
    let frame = ServerFrame::ChatMessage(ChatMessage {
        id: "m-1".to_string(),
        user_id: "u-1".to_string(),
        username: "ada".to_string(),
        message: "hi".to_string(),
        timestamp: 1234,
        code_snippet: None,
    });
    let json = frame.to_json();
    assert!(json.contains(r#""event":"chat-message""#));
    assert!(json.contains(r#""username":"ada""#));
    // absent snippet must not serialize
    assert!(!json.contains("code_snippet"));
}

#[test]
fn error_frame_shape() {
    let json = ServerFrame::error("FORBIDDEN", "not a member").to_json();
    assert_eq!(
        json,
        r#"{"event":"error","data":{"code":"FORBIDDEN","message":"not a member"}}"#
    );
}

#[test]
fn server_frames_round_trip() {
    let frames = [
        ServerFrame::UserLeft {
            user_id: "u".to_string(),
        },
        ServerFrame::FileDeleted {
            file_id: "f".to_string(),
        },
        ServerFrame::error("NOT_FOUND", "missing"),
    ];
    for frame in &frames {
        let back: ServerFrame = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(&back, frame);
    }
}
