// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Integration tests for condition variable wakeups and timeouts

use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread::{self, JoinHandle},
	time::{Duration, Instant},
};

use reifydb_sync::{CondVar, Instrumentation, Mutex, ScopedLock};
use reifydb_testing::{init_logging, wait_for};

const WAITERS: usize = 4;

struct Shared {
	condvar: CondVar<Arc<Mutex>>,
	waiting: AtomicUsize,
	woken: AtomicUsize,
}

impl Shared {
	fn new() -> Arc<Self> {
		let mutex = Arc::new(Mutex::with_instrumentation(&Instrumentation::disabled()));
		Arc::new(Self {
			condvar: CondVar::new(mutex),
			waiting: AtomicUsize::new(0),
			woken: AtomicUsize::new(0),
		})
	}

	fn mutex(&self) -> &Mutex {
		self.condvar.mutex()
	}

	/// Number of threads parked in `wait`, read under the lock.
	fn waiting(&self) -> usize {
		let _guard = ScopedLock::new(self.mutex());
		self.waiting.load(Ordering::SeqCst)
	}
}

fn spawn_waiters(shared: &Arc<Shared>, count: usize) -> Vec<JoinHandle<()>> {
	(0..count)
		.map(|_| {
			let shared = shared.clone();
			thread::spawn(move || {
				let mutex = shared.mutex();
				mutex.lock();
				shared.waiting.fetch_add(1, Ordering::SeqCst);
				shared.condvar.wait();
				mutex.assert_held();
				shared.waiting.fetch_sub(1, Ordering::SeqCst);
				shared.woken.fetch_add(1, Ordering::SeqCst);
				mutex.unlock();
			})
		})
		.collect()
}

#[test]
fn test_signal_wakes_exactly_one_waiter() {
	init_logging();
	let shared = Shared::new();
	let handles = spawn_waiters(&shared, WAITERS);

	// a waiter only releases the mutex inside `wait`, so once all of them
	// are counted under the lock they are all blocked
	wait_for(|| shared.waiting() == WAITERS, "all waiters should block");

	shared.mutex().lock();
	shared.condvar.signal();
	shared.mutex().unlock();

	wait_for(|| shared.woken.load(Ordering::SeqCst) == 1, "one waiter should wake");
	thread::sleep(Duration::from_millis(100));
	assert_eq!(shared.woken.load(Ordering::SeqCst), 1, "signal woke more than one waiter");

	shared.mutex().lock();
	shared.condvar.broadcast();
	shared.mutex().unlock();

	for handle in handles {
		handle.join().unwrap();
	}
	assert_eq!(shared.woken.load(Ordering::SeqCst), WAITERS);
}

#[test]
fn test_broadcast_wakes_all_waiters() {
	init_logging();
	let shared = Shared::new();
	let handles = spawn_waiters(&shared, WAITERS);

	wait_for(|| shared.waiting() == WAITERS, "all waiters should block");

	{
		let _guard = ScopedLock::new(shared.mutex());
		shared.condvar.broadcast();
	}

	for handle in handles {
		handle.join().unwrap();
	}
	assert_eq!(shared.woken.load(Ordering::SeqCst), WAITERS);
	assert_eq!(shared.waiting(), 0);
}

#[test]
fn test_timed_wait_without_signal_times_out() {
	let mutex = Mutex::with_instrumentation(&Instrumentation::disabled());
	let condvar = CondVar::new(&mutex);

	let _guard = ScopedLock::new(&mutex);
	let start = Instant::now();
	let mut signaled = condvar.timed_wait(Duration::from_millis(100));
	// spurious wakeups are allowed; keep waiting until the deadline is reported
	while signaled {
		signaled = condvar.timed_wait(Duration::from_millis(100));
	}
	let elapsed = start.elapsed();

	assert!(elapsed >= Duration::from_millis(95), "returned too early: {elapsed:?}");
	assert!(elapsed < Duration::from_secs(2), "returned too late: {elapsed:?}");
	assert!(mutex.is_held(), "mutex must be reacquired after a timeout");
}

#[test]
fn test_timed_wait_returns_true_when_signaled() {
	let shared = Shared::new();
	let ready = Arc::new(AtomicUsize::new(0));

	let waiter = {
		let shared = shared.clone();
		let ready = ready.clone();
		thread::spawn(move || {
			let mutex = shared.mutex();
			mutex.lock();
			shared.waiting.fetch_add(1, Ordering::SeqCst);
			let mut signaled = false;
			while ready.load(Ordering::SeqCst) == 0 {
				signaled = shared.condvar.timed_wait(Duration::from_secs(5));
			}
			mutex.assert_held();
			mutex.unlock();
			signaled
		})
	};

	wait_for(|| shared.waiting() == 1, "waiter should block");
	{
		let _guard = ScopedLock::new(shared.mutex());
		ready.store(1, Ordering::SeqCst);
		shared.condvar.signal();
	}

	assert!(waiter.join().unwrap(), "wait should report the signal");
}

#[test]
fn test_producer_consumer_handoff() {
	let shared = Shared::new();
	let queue = Arc::new(AtomicUsize::new(0));
	const ITEMS: usize = 100;

	let consumer = {
		let shared = shared.clone();
		let queue = queue.clone();
		thread::spawn(move || {
			let mut consumed = 0;
			let mutex = shared.mutex();
			while consumed < ITEMS {
				mutex.lock();
				while queue.load(Ordering::SeqCst) == 0 {
					shared.condvar.wait_labeled("consumer");
				}
				queue.fetch_sub(1, Ordering::SeqCst);
				consumed += 1;
				mutex.unlock();
			}
			consumed
		})
	};

	for _ in 0..ITEMS {
		let _guard = ScopedLock::labeled(shared.mutex(), "producer");
		queue.fetch_add(1, Ordering::SeqCst);
		shared.condvar.signal();
	}

	assert_eq!(consumer.join().unwrap(), ITEMS);
	assert_eq!(queue.load(Ordering::SeqCst), 0);
}
