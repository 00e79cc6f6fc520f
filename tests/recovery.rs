mod common;

use common::{Message, Network};
use lockstep::{
    Activity,
    DocumentChecksum,
    DocumentPath,
    Error,
    Jupiter,
    Operation,
    ParticipantId,
    Permission,
    Purpose,
    RecoveryId,
    SessionEvent,
    TextPosition,
};
use tokio::time::Duration;

fn checksum_error_id(message: &Message) -> RecoveryId {
    match &message.activity {
        Activity::ChecksumError(error) => error.recovery_id(),
        other => panic!("expected a checksum error, got {other:#?}"),
    }
}

fn recovery_id(message: &Message) -> Option<RecoveryId> {
    match &message.activity {
        Activity::File(file) if file.purpose() == Purpose::Recovery => {
            file.recovery_id()
        },
        other => panic!("expected a recovery file, got {other:#?}"),
    }
}

#[test]
fn checksum_mismatch_is_repaired() {
    let mut network = Network::new(1, "hello world");

    let expected = DocumentChecksum::of("hello world");

    network.client(1).corrupt("hello w0rld");

    network.host().state.checksum_pass();
    network.collect();

    match &network.in_flight()[0].activity {
        Activity::Checksum(checksum) => {
            assert_eq!(checksum.checksum(), expected)
        },
        other => panic!("expected a checksum, got {other:#?}"),
    }

    // The peer notices the mismatch and asks for the content.
    assert!(network.deliver_next());
    assert!(network.client(1).state.is_recovering());

    let id = checksum_error_id(&network.in_flight()[0]);

    assert!(network.client(1).take_events().iter().any(|event| matches!(
        event,
        SessionEvent::RecoveryStarted { id: started, .. } if *started == id
    )));

    // The host answers with the same recovery id.
    assert!(network.deliver_next());
    assert_eq!(recovery_id(&network.in_flight()[0]), Some(id));

    assert!(network.deliver_next());
    assert!(!network.client(1).state.is_recovering());

    assert_eq!(
        DocumentChecksum::of(&network.client(1).content()),
        expected
    );

    assert!(network.client(1).take_events().iter().any(|event| matches!(
        event,
        SessionEvent::RecoveryCompleted { id: Some(completed), .. }
            if *completed == id
    )));

    // The next pass finds nothing to repair.
    network.host().state.checksum_pass();
    network.collect();
    network.deliver_all();
    assert!(network.in_flight().is_empty());
    assert!(!network.client(1).state.is_recovering());

    // And editing picks up from the recovered content.
    network.client(1).insert(11, "!");
    network.host().insert(0, ">");
    network.settle();

    assert_convergence!(network.peers[0], network.peers[1], ">hello world!");
}

#[test]
fn edits_made_during_recovery_are_discarded() {
    let mut network = Network::new(1, "abc");

    network.client(1).corrupt("abd");

    network.host().state.checksum_pass();
    network.collect();
    network.deliver_next();

    // The checksum error is in flight.
    network.client(1).insert(0, "lost");
    network.flush();
    assert_eq!(network.in_flight().len(), 1);

    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], "abc");
}

#[test]
fn stale_checksums_are_ignored() {
    let mut network = Network::new(1, "abc");

    network.host().insert(3, "d");
    network.flush();
    network.host().state.checksum_pass();
    network.collect();

    // The checksum overtakes the operation it accounts for.
    let mut messages = network.intercept();
    assert_eq!(messages.len(), 2);
    let checksum = messages.pop().unwrap();
    let operation = messages.pop().unwrap();

    network.deliver(checksum);
    assert!(network.in_flight().is_empty());
    assert!(!network.client(1).state.is_recovering());

    network.deliver(operation);
    assert_convergence!(network.peers[0], network.peers[1], "abcd");
}

#[test]
fn host_pushes_unsolicited_recoveries() {
    let mut network = Network::new(2, "abc");

    network.client(1).corrupt("xyz");
    network.client(2).corrupt("");

    let now = network.now;
    network.host().state.request_recovery(now);
    network.collect();

    assert_eq!(network.in_flight().len(), 2);

    network.deliver_all();

    assert_convergence!(
        network.peers[0],
        network.peers[1],
        network.peers[2],
        "abc"
    );

    for idx in 1..=2 {
        assert!(network.client(idx).take_events().iter().any(|event| {
            matches!(event, SessionEvent::RecoveryCompleted { .. })
        }));
    }
}

#[test]
fn peers_can_ask_for_recovery() {
    let mut network = Network::new(1, "abc");

    network.client(1).corrupt("ab");

    let now = network.now;
    network.client(1).state.request_recovery(now);
    network.collect();

    let id = checksum_error_id(&network.in_flight()[0]);

    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], "abc");

    assert!(network.client(1).take_events().iter().any(|event| matches!(
        event,
        SessionEvent::RecoveryCompleted { id: Some(completed), .. }
            if *completed == id
    )));
}

#[test]
fn unanswered_recoveries_are_abandoned() {
    let mut network = Network::new(1, "abc");

    network.client(1).corrupt("abd");

    network.host().state.checksum_pass();
    network.collect();
    network.deliver_next();

    // The checksum error never makes it to the host.
    let lost = network.intercept();
    let id = checksum_error_id(&lost[0]);

    network.advance(Duration::from_secs(5));
    network.tick();
    assert!(network.client(1).state.is_recovering());

    network.advance(Duration::from_secs(6));
    network.tick();
    assert!(!network.client(1).state.is_recovering());

    assert!(network.client(1).take_events().iter().any(|event| matches!(
        event,
        SessionEvent::RecoveryAbandoned { id: abandoned } if *abandoned == id
    )));

    // The next checksum pass tries again.
    network.host().state.checksum_pass();
    network.collect();
    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], "abc");
}

#[test]
fn causality_violations_trigger_a_recovery() {
    let mut network = Network::new(1, "abc");

    let host = ParticipantId::from(0);
    let client = ParticipantId::from(1);
    let path = Network::path();

    // An activity acknowledging an operation the host never sent.
    let mut fake_host = Jupiter::new(path.clone(), client);
    let mut fake_client = Jupiter::new(path.clone(), host);
    let phantom = Operation::insert(TextPosition::new(0, 0), "?");
    fake_client
        .receive(&fake_host.generate(host, phantom))
        .unwrap();
    let forged = fake_client
        .generate(client, Operation::insert(TextPosition::new(0, 3), "d"));

    network.send(Message { from: client, to: host, activity: forged.into() });
    network.deliver_next();

    assert_eq!(network.host().content(), "abc");
    assert_eq!(network.in_flight().len(), 1);
    assert!(recovery_id(&network.in_flight()[0]).is_some());

    network.client(1).corrupt("garbage");
    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], "abc");
}

#[test]
fn edits_of_read_only_participants_are_dropped_by_the_host() {
    let mut network = Network::new(1, "abc");

    let client = ParticipantId::from(1);
    network.host().context.add_participant(client, Permission::ReadOnly);

    network.client(1).insert(3, "d");
    network.settle();

    assert!(network.host().take_events().iter().any(|event| matches!(
        event,
        SessionEvent::ActivityDropped { from, .. } if *from == client
    )));

    // The host undoes the edit right away.
    assert_convergence!(network.peers[0], network.peers[1], "abc");

    assert!(network.client(1).take_events().iter().any(|event| matches!(
        event,
        SessionEvent::RecoveryCompleted { .. }
    )));
}

#[test]
fn edits_racing_a_demotion_dont_stall_the_peer_pair() {
    let mut network = Network::new(1, "abc");

    let host = ParticipantId::from(0);
    let client = ParticipantId::from(1);

    network.client(1).insert(3, "X");
    network.flush();

    // The client is demoted while its edit is in flight, and doesn't know
    // it yet.
    network.host().context.add_participant(client, Permission::ReadOnly);
    network.host().insert(0, ">");

    network.settle();

    assert_convergence!(network.peers[0], network.peers[1], ">abc");

    let host_stamp = network.host().state.jupiter_timestamp(client).unwrap();
    let client_stamp = network.client(1).state.jupiter_timestamp(host);
    assert_eq!(client_stamp, Some(host_stamp.mirrored()));

    // Later divergences are still caught by the checksums.
    network.client(1).corrupt(">abd");

    network.host().state.checksum_pass();
    network.collect();
    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], ">abc");
}

#[test]
fn operations_from_before_a_recovery_are_dropped() {
    let mut network = Network::new(1, "abc");

    network.host().insert(3, "d");
    network.flush();

    // The operation is held up somewhere.
    let late = network.intercept();
    assert_eq!(late.len(), 1);

    let now = network.now;
    network.client(1).state.request_recovery(now);
    network.collect();
    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], "abcd");

    for message in late {
        network.deliver(message);
    }

    assert_convergence!(network.peers[0], network.peers[1], "abcd");

    network.host().state.checksum_pass();
    network.collect();
    network.deliver_all();

    assert!(network.in_flight().is_empty());
    assert!(!network.client(1).state.is_recovering());
}

#[test]
fn edits_crossing_a_pushed_recovery_are_dropped() {
    let mut network = Network::new(1, "abc");

    network.client(1).insert(0, "x");
    network.flush();
    let crossing = network.intercept();

    let now = network.now;
    network.host().state.request_recovery(now);
    network.collect();

    // The host gets the edit after pushing the recovery, the client gets
    // the recovery after sending the edit.
    for message in crossing {
        network.deliver(message);
    }
    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], "abc");

    network.client(1).insert(3, "!");
    network.host().insert(0, ">");
    network.settle();

    assert_convergence!(network.peers[0], network.peers[1], ">abc!");
}

#[test]
fn operations_overtaking_their_recovery_wait_for_it() {
    let mut network = Network::new(1, "abc");

    network.client(1).corrupt("zzz");

    let now = network.now;
    network.host().state.request_recovery(now);
    network.host().insert(3, "d");
    network.flush();

    let mut messages = network.intercept();
    assert_eq!(messages.len(), 2);
    let operation = messages.pop().unwrap();
    let file = messages.pop().unwrap();
    assert!(recovery_id(&file).is_some());

    network.deliver(operation);
    assert_eq!(network.client(1).content(), "zzz");

    network.deliver(file);
    assert_convergence!(network.peers[0], network.peers[1], "abcd");
}

#[test]
fn read_only_participants_discard_their_own_edits() {
    let mut network = Network::new(1, "abc");

    let client = ParticipantId::from(1);
    for peer in &network.peers {
        peer.context.add_participant(client, Permission::ReadOnly);
    }

    // The editor let the edit through, the session didn't.
    let op = Operation::insert(TextPosition::new(0, 3), "d");
    let peer = network.client(1);
    peer.buffers.edit(&Network::path(), &op).unwrap();

    assert!(matches!(
        peer.state.local_edit(op),
        Err(Error::ReadOnly { participant, .. }) if participant == client
    ));

    network.flush();
    assert!(network.in_flight().is_empty());

    let now = network.now;
    network.client(1).state.request_recovery(now);
    network.collect();
    network.deliver_all();

    assert_convergence!(network.peers[0], network.peers[1], "abc");
}

#[test]
fn renamed_documents_keep_their_recoveries() {
    let mut network = Network::new(1, "abc");

    network.client(1).corrupt("abd");

    network.host().state.checksum_pass();
    network.collect();
    network.deliver_next();
    assert!(network.client(1).state.is_recovering());

    network.client(1).state.rename(DocumentPath::from("moved.txt"));

    assert!(network.client(1).state.is_recovering());
}
