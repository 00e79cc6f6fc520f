mod common;

use common::{random_multiline_op, Network};
use lockstep::{transform, Operation, TextPosition};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn pos(offset: u32) -> TextPosition {
    TextPosition::new(0, offset)
}

fn apply(base: &str, ops: &[&Operation]) -> String {
    let mut doc = base.to_owned();
    for op in ops {
        op.apply_to(&mut doc).unwrap();
    }
    doc
}

fn random_op(rng: &mut impl Rng, base: &str) -> Operation {
    let len = base.chars().count() as u32;

    if len == 0 || rng.random::<bool>() {
        let offset = rng.random_range(0..=len);
        let text_len = rng.random_range(1..=4);
        let letter = rng.random_range('A'..='Z');
        let text = (0..text_len).map(|_| letter).collect::<String>();
        Operation::insert(pos(offset), text)
    } else {
        let start = rng.random_range(0..len);
        let end = (start + rng.random_range(1..=6)).min(len);
        let text = base
            .chars()
            .skip(start as usize)
            .take((end - start) as usize)
            .collect::<String>();
        Operation::delete(pos(start), text)
    }
}

/// One or two random operations on `base`, the second one applied after
/// the first.
fn random_multiline_edit(rng: &mut impl Rng, base: &str) -> Operation {
    let first = random_multiline_op(rng, base);

    if rng.random_ratio(1, 4) {
        let second = random_multiline_op(rng, &apply(base, &[&first]));
        Operation::split(first, second)
    } else {
        first
    }
}

/// Two participants insert "X" and "Y" at the same position: the lower id
/// goes first on both sides.
#[test]
fn concurrent_insertions_at_the_same_position() {
    let mut network = Network::new(2, "hello");

    network.client(1).insert(5, "X");
    network.client(2).insert(5, "Y");

    network.settle();

    assert_convergence!(
        network.peers[0],
        network.peers[1],
        network.peers[2],
        "helloXY"
    );
}

#[test]
fn insertion_inside_a_concurrent_deletion() {
    let mut network = Network::new(1, "abcdefgh");

    network.host().delete(2..6);
    network.client(1).insert(4, "XY");

    network.settle();

    assert_convergence!(network.peers[0], network.peers[1], "abXYgh");
}

#[test]
fn overlapping_deletions() {
    let mut network = Network::new(2, "0123456789");

    network.client(1).delete(2..6);
    network.client(2).delete(4..8);
    network.host().delete(5..9);

    network.settle();

    assert_convergence!(
        network.peers[0],
        network.peers[1],
        network.peers[2],
        "019"
    );
}

#[test]
fn random_pairs_converge() {
    let seed = rand::random::<u64>();
    println!("seed: {seed}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for _ in 0..5_000 {
        let len = rng.random_range(0..12);
        let base = (0..len)
            .map(|_| rng.random_range('a'..='z'))
            .collect::<String>();

        let a = random_op(&mut rng, &base);
        let b = random_op(&mut rng, &base);

        let a_first = rng.random::<bool>();

        let b_after_a = transform(&b, &a, !a_first).unwrap();
        let a_after_b = transform(&a, &b, a_first).unwrap();

        assert_eq!(
            apply(&base, &[&a, &b_after_a]),
            apply(&base, &[&b, &a_after_b]),
            "base: {base:?}, a: {a:?}, b: {b:?}"
        );
    }
}

#[test]
fn random_multiline_pairs_converge() {
    let seed = rand::random::<u64>();
    println!("seed: {seed}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    for _ in 0..5_000 {
        let len = rng.random_range(0..16);
        let base = (0..len)
            .map(|_| match rng.random_range(0..4) {
                0 => '\n',
                _ => rng.random_range('a'..='z'),
            })
            .collect::<String>();

        let a = random_multiline_edit(&mut rng, &base);
        let b = random_multiline_edit(&mut rng, &base);

        let a_first = rng.random::<bool>();

        let b_after_a = transform(&b, &a, !a_first).unwrap();
        let a_after_b = transform(&a, &b, a_first).unwrap();

        assert_eq!(
            apply(&base, &[&a, &b_after_a]),
            apply(&base, &[&b, &a_after_b]),
            "base: {base:?}, a: {a:?}, b: {b:?}"
        );
    }
}

#[test]
fn random_multiline_edits_converge() {
    let seed = rand::random::<u64>();
    println!("seed: {seed}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut network = Network::new(3, "fn main() {\n    todo!()\n}\n");

    for _ in 0..100 {
        for peer in &mut network.peers {
            for _ in 0..rng.random_range(0..=3) {
                peer.random_multiline_edit(&mut rng);
            }
        }

        network.flush();
        let in_flight = network.in_flight().len();
        for _ in 0..rng.random_range(0..=in_flight) {
            network.deliver_next();
        }
    }

    network.settle();

    assert_convergence!(network.peers);
}

#[test]
fn random_edits_converge() {
    let seed = rand::random::<u64>();
    println!("seed: {seed}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    test_random_edits(&mut rng, 4, 100, 3, 5, 5);
}

#[test]
fn random_edits_delivered_out_of_order_converge() {
    let seed = rand::random::<u64>();
    println!("seed: {seed}");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    test_random_edits_shuffled(&mut rng, 3, 100, 3, 5, 5);
}

fn test_random_edits(
    rng: &mut impl Rng,
    num_clients: u64,
    num_cycles: usize,
    edits_per_cycle: usize,
    max_insertion_len: u32,
    max_deletion_len: u32,
) {
    let mut network = Network::new(num_clients, "the quick brown fox");

    for _ in 0..num_cycles {
        for peer in &mut network.peers {
            for _ in 0..rng.random_range(0..=edits_per_cycle) {
                peer.random_edit(rng, max_insertion_len, max_deletion_len);
            }
        }

        // Deliver only part of what's in flight, so that edits keep
        // crossing each other.
        network.flush();
        let in_flight = network.in_flight().len();
        for _ in 0..rng.random_range(0..=in_flight) {
            network.deliver_next();
        }
    }

    network.settle();

    assert_convergence!(network.peers);
}

fn test_random_edits_shuffled(
    rng: &mut impl Rng,
    num_clients: u64,
    num_cycles: usize,
    edits_per_cycle: usize,
    max_insertion_len: u32,
    max_deletion_len: u32,
) {
    let mut network = Network::new(num_clients, "");

    for _ in 0..num_cycles {
        for peer in &mut network.peers {
            for _ in 0..rng.random_range(0..=edits_per_cycle) {
                peer.random_edit(rng, max_insertion_len, max_deletion_len);
            }
        }

        network.flush();
        network.deliver_all_shuffled(rng);
    }

    network.settle();

    assert_convergence!(network.peers);
}
