//! Integration tests for the seed scenarios enumerated in spec.md §8.

use std::sync::{Arc, Mutex};

use greensim::{advance, now, select, Resource, Scheduler, Signal, SimError};

fn shared_log() -> (Arc<Mutex<Vec<f64>>>, Arc<Mutex<Vec<f64>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (log.clone(), log)
}

#[test]
fn single_advance_records_expected_timestamps() {
    let sim = Scheduler::new();
    let (log, check) = shared_log();
    sim.add(move || {
        log.lock().unwrap().push(now().unwrap());
        advance(1.0).unwrap();
        log.lock().unwrap().push(now().unwrap());
        advance(5.0).unwrap();
        log.lock().unwrap().push(now().unwrap());
    })
    .unwrap();
    sim.run_to_completion();
    assert_eq!(*check.lock().unwrap(), vec![0.0, 1.0, 6.0]);
}

#[test]
fn equal_time_events_fire_in_insertion_order() {
    let sim = Scheduler::new();
    let (log, check) = shared_log();
    for (delay, marker) in [(1.0, 1.0), (0.7, 2.0), (10.0, 3.0)] {
        let log = log.clone();
        sim.schedule(delay, move |_s| log.lock().unwrap().push(marker))
            .unwrap();
    }
    sim.run_to_completion();
    assert_eq!(*check.lock().unwrap(), vec![2.0, 1.0, 3.0]);
    assert_eq!(sim.now(), 10.0);
}

#[test]
fn priority_queue_pops_even_classes_before_odd() {
    use greensim::Queue;

    let sim = Scheduler::new();
    let queue = Queue::with_order_token(|counter| {
        let idx = (counter - 1) as i64;
        idx + 1_000_000 * (idx % 2)
    });
    let (log, check) = shared_log();

    for i in 0..10 {
        let queue = queue.clone();
        let log = log.clone();
        sim.add_in(f64::from(i + 1), move || {
            queue.join(None).unwrap();
            log.lock().unwrap().push(f64::from(i));
        })
        .unwrap();
    }

    let puller_queue = queue.clone();
    sim.add_in(100.0, move || {
        while !puller_queue.is_empty() {
            puller_queue.pop();
        }
    })
    .unwrap();

    sim.run_to_completion();
    let got = check.lock().unwrap().clone();
    assert_eq!(
        got,
        vec![0.0, 2.0, 4.0, 6.0, 8.0, 1.0, 3.0, 5.0, 7.0, 9.0]
    );
}

#[test]
fn resource_contention_serializes_holders_fifo() {
    let sim = Scheduler::new();
    let resource = Resource::new(1).unwrap();
    let (log, check) = shared_log();

    for i in 0..8 {
        let resource = resource.clone();
        let log = log.clone();
        sim.add(move || {
            resource.take(1, None).unwrap();
            advance(f64::from(i + 1)).unwrap();
            log.lock().unwrap().push(now().unwrap());
            resource.release(1).unwrap();
        })
        .unwrap();
    }

    sim.run_to_completion();
    assert_eq!(
        *check.lock().unwrap(),
        vec![1.0, 3.0, 6.0, 10.0, 15.0, 21.0, 28.0, 36.0]
    );
    assert_eq!(resource.available(), resource.capacity());
}

#[test]
fn signal_toggling_wakes_waiters_at_expected_times() {
    let sim = Scheduler::new();
    let signal = Signal::new();
    let (log, check) = shared_log();

    for start in [1.0, 2.0, 3.0, 4.0] {
        let signal = signal.clone();
        let log = log.clone();
        sim.add_in(start, move || {
            signal.wait(None).unwrap();
            log.lock().unwrap().push(now().unwrap());
        })
        .unwrap();
    }

    let on_signal = signal.clone();
    sim.add_in(3.0, move || on_signal.turn_on()).unwrap();
    let off_signal = signal.clone();
    sim.add_in(4.5, move || off_signal.turn_off()).unwrap();

    sim.run_to_completion();
    let wakes = check.lock().unwrap().clone();
    assert_eq!(wakes.len(), 4);
    for t in &wakes[..3] {
        assert_eq!(*t, 3.0);
    }
    assert_eq!(wakes[3], 4.0);
}

#[test]
fn interrupt_during_advance_cancels_pending_continuation() {
    let sim = Scheduler::new();
    let (log, check) = shared_log();

    let body_log = log.clone();
    let target = sim
        .add(move || match advance(100.0) {
            Err(_) => {
                advance(5.0).unwrap();
                body_log.lock().unwrap().push(now().unwrap());
            }
            Ok(()) => unreachable!("expected the advance to be interrupted"),
        })
        .unwrap();

    sim.add_in(10.1, move || {
        target.interrupt(SimError::Interrupt);
    })
    .unwrap();

    sim.run_to_completion();
    assert_eq!(*check.lock().unwrap(), vec![15.1]);
    assert_eq!(sim.pending_count(), 0);
}

#[test]
fn select_with_timeout_takes_the_timeout_path() {
    let sim = Scheduler::new();
    let signals: Vec<Signal> = (0..5).map(|_| Signal::new()).collect();
    let (log, check) = shared_log();

    let wait_signals = signals.clone();
    sim.add(move || match select(&wait_signals, Some(10.0)) {
        Err(SimError::Timeout) => log.lock().unwrap().push(now().unwrap()),
        other => panic!("expected a timeout, got {other:?}"),
    })
    .unwrap();

    let late_signal = signals[0].clone();
    sim.add_in(25.0, move || late_signal.turn_on()).unwrap();

    sim.run_to_completion();
    assert_eq!(*check.lock().unwrap(), vec![10.0]);
}
