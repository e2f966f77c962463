#[cfg(test)]
mod tests {
    use turnstile_core::*;
    use uuid::Uuid;

    // ── ChatKey tests ──────────────────────────────────────────

    #[test]
    fn test_chat_key_channel_prefix() {
        let key = ChatKey::new("telegram:48213");
        assert_eq!(key.channel(), "telegram");
        assert_eq!(key.as_str(), "telegram:48213");
    }

    #[test]
    fn test_chat_key_without_prefix_uses_default_channel() {
        assert_eq!(ChatKey::new("u1").channel(), DEFAULT_CHANNEL);
        assert_eq!(ChatKey::new(":oops").channel(), DEFAULT_CHANNEL);
    }

    #[test]
    fn test_chat_key_for_channel() {
        let key = ChatKey::for_channel("discord", "guild/42");
        assert_eq!(key.to_string(), "discord:guild/42");
        assert_eq!(key.channel(), "discord");
    }

    #[test]
    fn test_chat_key_serializes_as_plain_string() {
        let key = ChatKey::from("slack:C01");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"slack:C01\"");
    }

    // ── JobPayload tests ───────────────────────────────────────

    #[test]
    fn test_payload_text_per_origin() {
        assert_eq!(JobPayload::chat("telegram", "hi").text(), "hi");
        assert_eq!(JobPayload::api("status?").text(), "status?");
        let task = JobPayload::scheduled(Uuid::new_v4(), Some("heartbeat".into()), "check goals");
        assert_eq!(task.text(), "check goals");
        assert_eq!(task.origin(), "scheduled");
    }

    #[test]
    fn test_payload_tagged_serde() {
        let payload = JobPayload::chat("webchat", "hello");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "chat");
        assert_eq!(json["channel"], "webchat");
        assert!(json.get("sender").is_none());

        let restored: JobPayload = serde_json::from_value(json).unwrap();
        assert_eq!(restored, payload);
    }

    // ── Error tests ────────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = TurnstileError::ShellNotFound { context_id: 7 };
        assert!(err.to_string().contains('7'));
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn test_error_spawn_failure() {
        let err = TurnstileError::ShellSpawn {
            command: "nope".into(),
            reason: "No such file or directory".into(),
        };
        let s = err.to_string();
        assert!(s.contains("nope"));
        assert!(s.contains("No such file"));
        assert_eq!(err.code(), "spawn_failure");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TurnstileError = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_execution_failure_kinds() {
        let failure = ExecutionFailure::timed_out(std::time::Duration::from_millis(1500));
        assert_eq!(failure.kind, FailureKind::TimedOut);
        assert!(failure.reason.contains("1500"));

        let failure: ExecutionFailure = TurnstileError::Config("bad".into()).into();
        assert_eq!(failure.kind, FailureKind::Error);
        assert!(failure.reason.contains("bad"));
    }

    // ── Tool tests ─────────────────────────────────────────────

    #[test]
    fn test_tool_serde() {
        let tool = Tool {
            name: "exec_command".into(),
            description: "Run a command".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "cmd": { "type": "string" }
                }
            }),
            is_mutating: true,
        };
        let json = serde_json::to_string(&tool).unwrap();
        let restored: Tool = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.name, "exec_command");
        assert!(restored.is_mutating);
    }

    #[test]
    fn test_tool_result_constructors() {
        let ok = ToolResult::success("call_1", serde_json::json!({"contextId": 1}));
        assert!(!ok.is_error);
        assert!(ok.content.contains("contextId"));

        let err = ToolResult::failure("call_2", serde_json::json!({"error": "not_found"}));
        assert!(err.is_error);
        assert_eq!(err.tool_call_id, "call_2");
    }

    // ── Event Bus tests ────────────────────────────────────────

    #[test]
    fn test_event_bus_pub_sub() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(Event::Shutdown);

        let event = rx.try_recv().unwrap();
        assert!(matches!(event, Event::Shutdown));
    }

    #[test]
    fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.publish(Event::ShellReclaimed { context_id: 3 });

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_event_bus_without_subscribers_does_not_fail() {
        let bus = EventBus::new(4);
        bus.publish(Event::Shutdown);
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let job_id = Uuid::new_v4();
        let event = Event::TurnSettled {
            chat_key: "u1".into(),
            job_ids: vec![job_id],
            rounds: 1,
            failure: Some(FailureKind::Panicked),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"turn_settled\""));
        let restored: Event = serde_json::from_str(&json).unwrap();
        if let Event::TurnSettled { job_ids, failure, .. } = restored {
            assert_eq!(job_ids, vec![job_id]);
            assert_eq!(failure, Some(FailureKind::Panicked));
        } else {
            panic!("wrong variant");
        }
    }
}
