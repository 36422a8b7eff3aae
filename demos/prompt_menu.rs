//! A player-prompt menu, with one option gated behind world state.
//!
//! Run with: cargo run --example prompt_menu

use anyhow::Result;
use patter::{
    DialogueEvent, DialogueNode, DialogueRuntime, FlagSet, Fragment, RecordingGraph,
    RecordingListener, SpeechContent,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let listener = RecordingListener::new();
    let graph = RecordingGraph::new();
    let mut runtime = DialogueRuntime::new().with_graph(Box::new(graph.clone()));
    runtime.register_listener(Box::new(listener.clone()));

    // The rumor option only appears once the player has heard it
    runtime.facts_mut().set_flag("heard_rumor", true);

    let node = DialogueNode::player_prompt()
        .with_auto_advance(true)
        .with_fragment(Fragment::new(
            SpeechContent::text("Ask about the weather.").with_speaker("player"),
        ))
        .with_fragment(
            Fragment::new(SpeechContent::text("Ask about the rumor.").with_speaker("player"))
                .with_condition(Box::new(FlagSet::new("heard_rumor"))),
        )
        .with_fragment(Fragment::new(
            SpeechContent::text("Leave.").with_speaker("player"),
        ))
        .with_fragment(
            Fragment::new(SpeechContent::text("Bribe the guard.").with_speaker("player"))
                .with_condition(Box::new(FlagSet::new("has_coin"))),
        );
    let id = runtime.register_node(node);
    runtime.execute(id)?;

    let options: Vec<_> = listener
        .events()
        .into_iter()
        .filter_map(|event| match event {
            DialogueEvent::PromptAdded(added) => Some(added),
            _ => None,
        })
        .collect();
    println!("choose:");
    for (index, option) in options.iter().enumerate() {
        println!("  {}. {}", index + 1, option.dialogue_text);
    }

    // A real host would read input here; pick the rumor option
    let choice = &options[1];
    println!("> {}", choice.dialogue_text);
    runtime.run_prompt(&choice.handle)?;

    while runtime.node(id).is_some_and(|n| !n.is_idle()) {
        runtime.tick(1.0 / 60.0);
    }

    println!("-- menu resolved at t={:.2}s --", runtime.now());
    for (_, pin) in graph.fired() {
        println!("pin fired: {pin}");
    }
    Ok(())
}
