// tests/websocket_protocol_test.rs
// The wire contract clients depend on (spec 4.9): tagged-union JSON shapes
// for both directions of the protocol.

use forge_orchestrator::broadcaster::{ClientMessage, ServerMessage};

#[test]
fn client_message_user_suggestion_round_trips() {
    let msg = ClientMessage::UserSuggestion { text: "add dark mode".to_string(), images: vec![] };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "user_suggestion");
    assert_eq!(json["text"], "add dark mode");

    let back: ClientMessage = serde_json::from_value(json).unwrap();
    match back {
        ClientMessage::UserSuggestion { text, images } => {
            assert_eq!(text, "add dark mode");
            assert!(images.is_empty());
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn client_message_generate_all_defaults_review_cycles() {
    let parsed: ClientMessage = serde_json::from_str(r#"{"type": "generate_all"}"#).unwrap();
    match parsed {
        ClientMessage::GenerateAll { review_cycles } => assert_eq!(review_cycles, None),
        other => panic!("unexpected variant: {other:?}"),
    }
}

#[test]
fn server_message_error_tags_by_type() {
    let msg = ServerMessage::Error { code: "not_found".to_string(), message: "no such file".to_string() };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["code"], "not_found");
    assert_eq!(json["message"], "no such file");
}

#[test]
fn server_message_rejects_unknown_variant() {
    let result: Result<ServerMessage, _> = serde_json::from_str(r#"{"type": "not_a_real_event"}"#);
    assert!(result.is_err());
}
