//! A short scripted scene played frame by frame.
//!
//! Run with: cargo run --example scripted_scene

use anyhow::Result;
use patter::{
    ConversationListener, DialogueNode, DialogueRuntime, Fragment, ListenerResult, RecordingGraph,
    Sequencing, SpeechContent, SpeechEnded, SpeechStarted,
};

/// Prints each line the way a subtitle track would
struct ConsoleNarrator;

impl ConversationListener for ConsoleNarrator {
    fn on_speech_started(&mut self, event: &SpeechStarted) -> ListenerResult {
        match &event.speaker {
            Some(speaker) => println!("{speaker}: {}", event.dialogue_text),
            None => println!("{}", event.dialogue_text),
        }
        Ok(())
    }

    fn on_speech_ended(&mut self, event: &SpeechEnded) -> ListenerResult {
        if event.padding_time > 0.0 {
            println!("  ({}s pause)", event.padding_time);
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let graph = RecordingGraph::new();
    let mut runtime = DialogueRuntime::new().with_graph(Box::new(graph.clone()));
    runtime.register_listener(Box::new(ConsoleNarrator));
    runtime.open_conversation("east_gate")?;

    let node = DialogueNode::talk(Sequencing::RunAll)
        .with_auto_advance(true)
        .with_fragment(Fragment::new(
            SpeechContent::text("Halt. The east gate is closed after dark.")
                .with_speaker("guard")
                .with_mood("stern"),
        ))
        .with_fragment(
            Fragment::new(
                SpeechContent::text("Take the river road if you must travel tonight.")
                    .with_speaker("guard"),
            )
            .with_padding(0.5),
        )
        .with_fragment(Fragment::new(
            SpeechContent::text("We open again at first light.").with_speaker("guard"),
        ));
    let id = runtime.register_node(node);
    runtime.execute(id)?;

    // 60fps frame loop until the node has nothing left to play
    while runtime.node(id).is_some_and(|n| !n.is_idle()) {
        runtime.tick(1.0 / 60.0);
    }

    runtime.close_conversation()?;
    println!("-- scene complete at t={:.2}s --", runtime.now());
    for (_, pin) in graph.fired() {
        println!("pin fired: {pin}");
    }
    Ok(())
}
