//! Property checks drawn from spec.md §8 beyond the seven seed scenarios.

use std::sync::{Arc, Mutex};

use greensim::{
    add, advance, current_process, happens, now, Process, Queue, Resource, Scheduler, Signal,
    SimError, TagSet,
};

#[test]
fn default_queue_discipline_is_fifo() {
    let sim = Scheduler::new();
    let queue = Queue::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    for i in 0..5 {
        let queue = queue.clone();
        let order = order.clone();
        sim.add(move || {
            queue.join(None).unwrap();
            order.lock().unwrap().push(i);
        })
        .unwrap();
    }
    let puller = queue.clone();
    sim.add(move || {
        while !puller.is_empty() {
            puller.pop();
        }
    })
    .unwrap();

    sim.run_to_completion();
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn resource_holdings_conserve_total_capacity() {
    let sim = Scheduler::new();
    let resource = Resource::new(3).unwrap();
    let snapshots = Arc::new(Mutex::new(Vec::new()));

    for i in 0..6 {
        let resource = resource.clone();
        let snapshots = snapshots.clone();
        sim.add(move || {
            resource.take(1, None).unwrap();
            snapshots.lock().unwrap().push(resource.available());
            advance(f64::from(i % 3 + 1)).unwrap();
            resource.release(1).unwrap();
        })
        .unwrap();
    }

    sim.run_to_completion();
    assert_eq!(resource.available(), resource.capacity());
    for free in snapshots.lock().unwrap().iter() {
        assert!(*free >= 0 && *free <= resource.capacity());
    }
}

#[test]
fn resource_release_without_holding_is_an_error() {
    let sim = Scheduler::new();
    let resource = Resource::new(1).unwrap();
    let result = Arc::new(Mutex::new(None));

    let check = result.clone();
    sim.add(move || {
        *check.lock().unwrap() = Some(resource.release(1));
    })
    .unwrap();
    sim.run_to_completion();

    assert!(matches!(
        result.lock().unwrap().take(),
        Some(Err(SimError::ReleaseWithoutHold))
    ));
}

#[test]
fn resource_release_exceeding_holding_is_an_error() {
    let sim = Scheduler::new();
    let resource = Resource::new(5).unwrap();
    let result = Arc::new(Mutex::new(None));

    let check = result.clone();
    sim.add(move || {
        resource.take(2, None).unwrap();
        *check.lock().unwrap() = Some(resource.release(3));
    })
    .unwrap();
    sim.run_to_completion();

    assert!(matches!(
        result.lock().unwrap().take(),
        Some(Err(SimError::ReleaseExceedsHolding))
    ));
}

#[test]
fn interrupting_a_queued_waiter_detaches_it_and_resumes_exactly_once() {
    let sim = Scheduler::new();
    let queue = Queue::new();
    let resumes = Arc::new(Mutex::new(0));
    let saw_error = Arc::new(Mutex::new(false));

    let waiter_queue = queue.clone();
    let waiter_resumes = resumes.clone();
    let waiter_saw_error = saw_error.clone();
    let waiter: Process = sim
        .add(move || {
            let res = waiter_queue.join(None);
            *waiter_resumes.lock().unwrap() += 1;
            *waiter_saw_error.lock().unwrap() = res.is_err();
        })
        .unwrap();

    sim.add_in(1.0, move || {
        waiter.interrupt(SimError::Interrupt);
    })
    .unwrap();

    sim.run_to_completion();

    assert_eq!(*resumes.lock().unwrap(), 1);
    assert!(*saw_error.lock().unwrap());
    assert!(queue.is_empty());
}

#[test]
fn new_on_signal_does_not_block_waiters() {
    let sim = Scheduler::new();
    let signal = Signal::new_on();
    let woke_at = Arc::new(Mutex::new(None));

    let check = woke_at.clone();
    sim.add(move || {
        signal.wait(None).unwrap();
        *check.lock().unwrap() = Some(now().unwrap());
    })
    .unwrap();

    sim.run_to_completion();
    assert_eq!(*woke_at.lock().unwrap(), Some(0.0));
}

#[test]
fn declared_tags_reach_the_spawned_process() {
    let sim = Scheduler::new();
    let seen = Arc::new(Mutex::new(None));

    let check = seen.clone();
    sim.add_tagged(TagSet::from_iter(["checkpoint".to_string()]), move || {
        let proc = current_process().unwrap();
        *check.lock().unwrap() = Some(proc.tags());
    })
    .unwrap();

    sim.run_to_completion();
    let tags = seen.lock().unwrap().clone().unwrap();
    assert!(tags.has_tag("checkpoint"));
}

#[test]
fn child_process_inherits_parent_tags_union_declared() {
    let sim = Scheduler::new();
    let child_tags = Arc::new(Mutex::new(None));

    let check = child_tags.clone();
    sim.add_tagged(TagSet::from_iter(["alice".to_string()]), move || {
        let _ = add(move || {
            let proc = current_process().unwrap();
            *check.lock().unwrap() = Some(proc.tags());
        });
    })
    .unwrap();

    sim.run_to_completion();
    let tags = child_tags.lock().unwrap().clone().unwrap();
    assert!(tags.has_tag("alice"));
}

#[test]
fn untagged_add_still_yields_an_empty_tag_set() {
    let sim = Scheduler::new();
    let seen = Arc::new(Mutex::new(None));

    let check = seen.clone();
    sim.add(move || {
        let proc = current_process().unwrap();
        *check.lock().unwrap() = Some(proc.tags());
    })
    .unwrap();

    sim.run_to_completion();
    let tags = seen.lock().unwrap().clone().unwrap();
    assert!(!tags.has_tag("anything"));
}

#[test]
fn a_panicking_body_escapes_run_instead_of_hanging() {
    // Suppress the default panic hook's stderr noise for this expected
    // panic; restore it immediately after so other tests are unaffected.
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));

    let sim = Scheduler::new();
    sim.add(|| panic!("deliberate body panic")).unwrap();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        sim.run_to_completion();
    }));

    std::panic::set_hook(previous_hook);
    assert!(result.is_err());
}

#[test]
fn happens_is_schedulable_from_top_level_setup_code() {
    // `happens` must be callable, and its result addable, from outside any
    // running process — it only builds a body, it does not spawn one.
    let sim = Scheduler::new();
    let arrivals = Arc::new(Mutex::new(Vec::new()));

    let log = arrivals.clone();
    let driver = happens([1.0, 2.0, 3.0], Some("arrivals".to_string()), move || {
        log.lock().unwrap().push(now().unwrap());
    });
    sim.add(driver).unwrap();

    sim.run_to_completion();
    assert_eq!(*arrivals.lock().unwrap(), vec![1.0, 3.0, 6.0]);
}
