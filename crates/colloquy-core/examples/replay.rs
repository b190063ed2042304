//! Replays a scripted session against the conversation core: seeds some
//! persisted history, streams a turn with a gated tool call, and prints
//! the composed timeline.
//!
//! Run with `cargo run --example replay` (set `RUST_LOG=debug` to watch
//! the core's tracing output).

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use colloquy_core::{
    ChannelDecisionSink, ContentBlock, ConversationModel, Decision, InMemoryHistorySource,
    Message, SessionConfig, StreamEvent, TimelineItem,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let source = InMemoryHistorySource::new();
    source.set_history(
        "demo",
        vec![
            Message::user("What does this repo do?"),
            Message::user("Now run the test suite."),
        ],
    );

    let (sink, mut decisions) = ChannelDecisionSink::new();
    let mut model = ConversationModel::new("demo", SessionConfig::default(), Arc::new(source), sink);

    model.load_older().await?;

    for event in [
        StreamEvent::Started,
        StreamEvent::TextDelta {
            text: "Let me run the tests.".to_string(),
        },
        StreamEvent::ToolCallStarted {
            id: "t1".to_string(),
            name: "run_command".to_string(),
            input: json!({"command": "cargo test"}),
        },
        StreamEvent::ApprovalRequired {
            id: "p1".to_string(),
            call_id: "t1".to_string(),
        },
    ] {
        model.handle_event(event)?;
    }

    if let Some(request) = model.pending_approval() {
        let request_id = request.id().to_string();
        println!("approval pending for call {}", request.call_id());
        model.respond(&request_id, Decision::ApproveOnce);
        let (id, decision) = decisions.recv().await.expect("decision forwarded");
        println!("decision {decision:?} submitted for {id}");
    }

    for event in [
        StreamEvent::ToolCallResult {
            id: "t1".to_string(),
            output: "test result: ok. 42 passed".to_string(),
            is_error: false,
        },
        StreamEvent::TextDelta {
            text: " All green.".to_string(),
        },
        StreamEvent::Completed { message_id: None },
    ] {
        model.handle_event(event)?;
    }

    println!("\ntimeline:");
    for item in model.current_timeline() {
        match item {
            TimelineItem::Message(message) => {
                println!("  [{:?}] {}", message.role, message.text());
                for block in &message.content {
                    if let ContentBlock::ToolUse { call, approval, result } = block {
                        println!(
                            "    tool {} ({:?}) -> {}",
                            call.name,
                            approval,
                            result.as_ref().map(|r| r.output.as_str()).unwrap_or("<no result>")
                        );
                    }
                }
            }
            TimelineItem::Live(live) => println!("  [streaming] {}", live.text),
        }
    }

    Ok(())
}
