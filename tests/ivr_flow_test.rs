//! Entry-point integration tests over the public surface.

use handyline::ivr::testing::{worker, Command, IvrStack, StaticLookup};

fn sequence_for(channel: &str, cmds: &[Command]) -> Vec<Command> {
    cmds.iter()
        .filter(|c| c.channel() == channel)
        .cloned()
        .collect()
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let lookup = StaticLookup::with_matches(vec![worker("Avi Cohen", "052-1234567")]);
    let mut stack = IvrStack::start(lookup.clone()).await;

    stack.call("chan-a");
    stack.call("chan-b");

    // Wait until both sessions are up (answered) before feeding digits.
    let mut cmds = Vec::new();
    while sequence_for("chan-a", &cmds).is_empty() || sequence_for("chan-b", &cmds).is_empty() {
        cmds.push(
            stack
                .next_cmd(1000)
                .await
                .expect("timed out waiting for both sessions to answer"),
        );
    }

    // chan-a gets a full set of answers; chan-b never presses a digit and
    // aborts on its 200ms window without disturbing chan-a.
    for digit in ["1", "2", "3", "1", "2"] {
        stack.dtmf("chan-a", digit);
    }
    cmds.extend(stack.drain_cmds(500).await);

    let a = sequence_for("chan-a", &cmds);
    assert_eq!(
        a,
        vec![
            Command::Answer("chan-a".into()),
            Command::Play("chan-a".into(), "custom/language".into()),
            Command::Play("chan-a".into(), "custom/he/district".into()),
            Command::Play("chan-a".into(), "custom/he/category".into()),
            Command::Play("chan-a".into(), "custom/he/gender".into()),
            Command::Play("chan-a".into(), "custom/he/ordering".into()),
            Command::Play("chan-a".into(), "custom/he/result".into()),
            Command::Play("chan-a".into(), "custom/he/worker1".into()),
            Command::Hangup("chan-a".into()),
        ]
    );

    let b = sequence_for("chan-b", &cmds);
    assert_eq!(
        b,
        vec![
            Command::Answer("chan-b".into()),
            Command::Play("chan-b".into(), "custom/language".into()),
            Command::Hangup("chan-b".into()),
        ]
    );

    // Exactly one lookup happened, for the session that completed.
    assert_eq!(lookup.seen_filters().len(), 1);
    assert_eq!(lookup.seen_filters()[0].district, "2");
}

#[tokio::test]
async fn test_entry_point_stops_on_cancel() {
    let stack = IvrStack::start(StaticLookup::with_matches(vec![])).await;
    stack.join().await.expect("dispatch should exit cleanly");
}
