//! Tests for prompt offering, broadcast delivery, and conversation scoping

use std::sync::{Arc, Mutex};

use patter::{
    ConversationListener, ConversationTag, DialogueEvent, DialogueNode, DialogueRuntime, FlagSet,
    Fragment, FragmentTag, ListenerResult, OutputPin, PlaybackError, PlaybackSettings,
    PromptAdded, PromptHandle, RecordingGraph, RecordingListener, Sequencing, SpeechContent,
    SpeechStarted,
};

fn probed_runtime() -> (DialogueRuntime, RecordingListener, RecordingGraph) {
    probed_runtime_with(PlaybackSettings::default())
}

fn probed_runtime_with(
    settings: PlaybackSettings,
) -> (DialogueRuntime, RecordingListener, RecordingGraph) {
    let listener = RecordingListener::new();
    let graph = RecordingGraph::new();
    let mut runtime = DialogueRuntime::new()
        .with_settings(settings)
        .with_graph(Box::new(graph.clone()));
    runtime.register_listener(Box::new(listener.clone()));
    (runtime, listener, graph)
}

fn line(text: &str, seconds: f32) -> Fragment {
    Fragment::new(SpeechContent::text(text).with_manual_time(seconds)).with_padding(0.0)
}

fn offered(listener: &RecordingListener) -> Vec<PromptAdded> {
    listener
        .events()
        .into_iter()
        .filter_map(|event| match event {
            DialogueEvent::PromptAdded(added) => Some(added),
            _ => None,
        })
        .collect()
}

#[test]
fn test_prompt_node_offers_only_eligible_fragments() {
    let (mut runtime, listener, graph) = probed_runtime();
    let node = DialogueNode::player_prompt()
        .with_auto_advance(true)
        .with_fragment(line("Ask about the weather.", 1.0))
        .with_fragment(line("Ask about the rumor.", 1.0).with_condition(Box::new(FlagSet::new("heard_rumor"))))
        .with_fragment(line("Say farewell.", 1.0));
    let id = runtime.register_node(node);

    runtime.execute(id).unwrap();

    let options = offered(&listener);
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].dialogue_text, "Ask about the weather.");
    assert_eq!(options[1].dialogue_text, "Say farewell.");
    assert_eq!(
        listener.event_types(),
        vec!["prompt.added", "prompt.added", "prompts.ready"]
    );

    // The node waits for a selection; nothing fired, nothing playing
    assert!(graph.fired_by(id).is_empty());
    assert!(runtime.node(id).unwrap().is_idle());
    assert_eq!(runtime.node(id).unwrap().offered_prompts().len(), 2);
    assert_eq!(runtime.node(id).unwrap().activation_count(), 0);
}

#[test]
fn test_prompt_selection_plays_and_exits_through_its_pin() {
    let (mut runtime, listener, graph) = probed_runtime();
    let node = DialogueNode::player_prompt()
        .with_auto_advance(true)
        .with_fragment(line("Ask about the weather.", 1.0))
        .with_fragment(line("Say farewell.", 1.0));
    let id = runtime.register_node(node);

    runtime.execute(id).unwrap();
    let choice = offered(&listener)[1].handle.clone();
    runtime.run_prompt(&choice).unwrap();

    assert_eq!(
        listener.event_types(),
        vec![
            "prompt.added",
            "prompt.added",
            "prompts.ready",
            "speech.started",
            "prompt.selected",
        ]
    );
    assert_eq!(runtime.node(id).unwrap().activation_count(), 1);
    assert!(runtime.node(id).unwrap().offered_prompts().is_empty());

    // Completion leaves through the per-fragment prompt pin, not Out
    runtime.tick(1.0);
    let guid = runtime.node(id).unwrap().fragments()[1].guid();
    assert_eq!(graph.fired_by(id), vec![OutputPin::Prompt(guid)]);
}

#[test]
fn test_sole_prompt_auto_selects_when_configured() {
    let mut settings = PlaybackSettings::default();
    settings.auto_select_sole_prompt = true;
    let (mut runtime, listener, _graph) = probed_runtime_with(settings);
    let node = DialogueNode::player_prompt()
        .with_auto_advance(true)
        .with_fragment(line("Only choice.", 1.0))
        .with_fragment(line("Hidden choice.", 1.0).with_condition(Box::new(FlagSet::new("secret"))));
    let id = runtime.register_node(node);

    runtime.execute(id).unwrap();

    assert_eq!(
        listener.event_types(),
        vec![
            "prompt.added",
            "prompts.ready",
            "speech.started",
            "prompt.selected",
        ]
    );
    assert_eq!(runtime.node(id).unwrap().running_fragment(), Some(0));
}

#[test]
fn test_prompt_node_bypasses_when_nothing_is_eligible() {
    let (mut runtime, listener, graph) = probed_runtime();
    let node = DialogueNode::player_prompt()
        .with_fragment(line("Gated.", 1.0).with_condition(Box::new(FlagSet::new("never_set"))));
    let id = runtime.register_node(node);

    runtime.execute(id).unwrap();

    assert_eq!(listener.event_types(), vec!["prompts.ready"]);
    assert_eq!(graph.fired_by(id), vec![OutputPin::Bypass]);
}

#[test]
fn test_reoffering_invalidates_old_prompt_handles() {
    let (mut runtime, listener, _graph) = probed_runtime();
    let node = DialogueNode::player_prompt()
        .with_auto_advance(true)
        .with_fragment(line("Ask.", 1.0))
        .with_fragment(line("Leave.", 1.0));
    let id = runtime.register_node(node);

    runtime.execute(id).unwrap();
    let old = offered(&listener)[0].handle.clone();

    // A second entry mints fresh handles for the same fragments
    runtime.execute(id).unwrap();
    let fresh = offered(&listener)[2].handle.clone();
    assert_ne!(old.id, fresh.id);

    assert_eq!(runtime.run_prompt(&old), Err(PlaybackError::StaleHandle));
    runtime.run_prompt(&fresh).unwrap();
}

#[test]
fn test_selecting_twice_is_refused() {
    let (mut runtime, listener, _graph) = probed_runtime();
    let node = DialogueNode::player_prompt()
        .with_auto_advance(true)
        .with_fragment(line("Ask.", 1.0))
        .with_fragment(line("Leave.", 1.0));
    let id = runtime.register_node(node);

    runtime.execute(id).unwrap();
    let choice = offered(&listener)[0].handle.clone();
    runtime.run_prompt(&choice).unwrap();
    assert_eq!(runtime.run_prompt(&choice), Err(PlaybackError::StaleHandle));
}

#[test]
fn test_prompt_selection_on_a_talk_node_is_refused() {
    let (mut runtime, _listener, _graph) = probed_runtime();
    let node = DialogueNode::talk(Sequencing::RunAll).with_fragment(line("talk", 1.0));
    let id = runtime.register_node(node);

    let forged = PromptHandle::new(id, 0);
    assert_eq!(
        runtime.run_prompt(&forged),
        Err(PlaybackError::NotAPromptNode(id))
    );
}

/// Listener that records its name into a shared log on every speech start
struct Named {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl ConversationListener for Named {
    fn on_speech_started(&mut self, _event: &SpeechStarted) -> ListenerResult {
        self.log.lock().unwrap().push(self.name);
        Ok(())
    }
}

/// Listener that always fails on speech start
struct Broken;

impl ConversationListener for Broken {
    fn on_speech_started(&mut self, _event: &SpeechStarted) -> ListenerResult {
        Err("speaker hardware offline".into())
    }
}

#[test]
fn test_listeners_run_in_registration_order_despite_failures() {
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let mut runtime = DialogueRuntime::new();
    runtime.register_listener(Box::new(Named {
        name: "ui",
        log: Arc::clone(&log),
    }));
    runtime.register_listener(Box::new(Broken));
    runtime.register_listener(Box::new(Named {
        name: "audio",
        log: Arc::clone(&log),
    }));

    let node = DialogueNode::talk(Sequencing::RunAll)
        .with_auto_advance(true)
        .with_fragment(line("first", 1.0))
        .with_fragment(line("second", 1.0));
    let id = runtime.register_node(node);
    runtime.execute(id).unwrap();
    runtime.tick(1.0);

    // The broken listener never blocks the ones after it
    assert_eq!(*log.lock().unwrap(), vec!["ui", "audio", "ui", "audio"]);
}

#[test]
fn test_every_event_carries_the_open_conversation() {
    let (mut runtime, listener, _graph) = probed_runtime();
    runtime.open_conversation("tavern").unwrap();

    let node = DialogueNode::talk(Sequencing::RunAll)
        .with_auto_advance(true)
        .with_fragment(line("evening", 1.0));
    let id = runtime.register_node(node);
    runtime.execute(id).unwrap();
    runtime.tick(1.0);
    runtime.close_conversation().unwrap();

    let events = listener.events();
    assert_eq!(events.len(), 5); // opened, started, ended, padding over, closed
    for event in &events {
        assert_eq!(event.conversation(), Some(&ConversationTag::new("tavern")));
    }
}

#[test]
fn test_tagged_fragment_is_findable_after_registration() {
    let (mut runtime, _listener, _graph) = probed_runtime();
    let node = DialogueNode::talk(Sequencing::RunAll)
        .with_fragment(line("hello there", 1.0).with_tag("greeting"))
        .with_fragment(line("bye now", 1.0));
    let id = runtime.register_node(node);

    let (found_node, found_guid) = runtime
        .find_tagged_fragment(&FragmentTag::new("greeting"))
        .unwrap();
    assert_eq!(found_node, id);
    let fragment = runtime.node(id).unwrap().fragment_by_guid(found_guid).unwrap();
    assert_eq!(fragment.content().dialogue_text, "hello there");
}
