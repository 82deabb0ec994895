// Cross-thread behavior of a single pipe: blocking, close, drain, and delivery guarantees.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ringpipe::api::{BoundedPipe, ErrorKind, channel};

fn shared(capacity: usize) -> Arc<BoundedPipe> {
    Arc::new(BoundedPipe::create(capacity).expect("pipe"))
}

fn wait_until(pred: impl Fn() -> bool) {
    for _ in 0..5000 {
        if pred() {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("condition not reached");
}

fn read_to_close(pipe: &BoundedPipe, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk];
    loop {
        let n = pipe.read(&mut buf);
        out.extend_from_slice(&buf[..n]);
        if n < buf.len() {
            let stats = pipe.stats();
            if !stats.open && stats.buffered == 0 {
                return out;
            }
        }
    }
}

#[test]
fn create_zero_capacity_fails() {
    let err = BoundedPipe::create(0).expect_err("zero");
    assert_eq!(err.kind(), ErrorKind::Allocation);
    assert!(channel(0).is_err());
}

#[test]
fn post_close_drain_returns_residual_bytes_in_order() {
    let pipe = BoundedPipe::create(4).expect("pipe");
    assert_eq!(pipe.write(b"ABCD"), 4);
    pipe.close();

    let mut out = [0u8; 3];
    assert_eq!(pipe.read(&mut out), 3);
    assert_eq!(&out, b"ABC");
    assert_eq!(pipe.read(&mut out), 1);
    assert_eq!(&out[..1], b"D");
}

#[test]
fn capacity_one_writer_waits_for_each_read() {
    let pipe = shared(1);
    let finished = Arc::new(AtomicBool::new(false));
    let writer = {
        let pipe = Arc::clone(&pipe);
        let finished = Arc::clone(&finished);
        thread::spawn(move || {
            let n = pipe.write(b"XY");
            finished.store(true, Ordering::SeqCst);
            n
        })
    };

    wait_until(|| pipe.is_full());
    thread::sleep(Duration::from_millis(20));
    assert!(!finished.load(Ordering::SeqCst));

    let mut out = [0u8; 1];
    assert_eq!(pipe.read(&mut out), 1);
    assert_eq!(out[0], b'X');

    assert_eq!(writer.join().expect("join"), 2);
    assert_eq!(pipe.read(&mut out), 1);
    assert_eq!(out[0], b'Y');
}

#[test]
fn close_releases_writer_blocked_on_full_pipe_without_storing() {
    let pipe = shared(1);
    let writer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || pipe.write(b"QZ"))
    };

    wait_until(|| pipe.stats().total_written == 1);
    assert!(!writer.is_finished());
    pipe.close();

    assert_eq!(writer.join().expect("join"), 1);
    assert_eq!(pipe.stats().total_written, 1);
    let mut out = [0u8; 2];
    assert_eq!(pipe.read(&mut out), 1);
    assert_eq!(out[0], b'Q');
}

#[test]
fn close_releases_every_blocked_thread() {
    let full = shared(2);
    assert_eq!(full.write(b"ff"), 2);
    let empty = shared(2);

    let writers: Vec<_> = (0..3)
        .map(|_| {
            let pipe = Arc::clone(&full);
            thread::spawn(move || pipe.write(b"more"))
        })
        .collect();
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let pipe = Arc::clone(&empty);
            thread::spawn(move || pipe.read(&mut [0u8; 4]))
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    full.close();
    empty.close();

    for writer in writers {
        assert_eq!(writer.join().expect("join"), 0);
    }
    for reader in readers {
        assert_eq!(reader.join().expect("join"), 0);
    }
}

#[test]
fn closing_one_pipe_leaves_another_blocked() {
    let a = shared(1);
    let b = shared(1);
    let reader = {
        let b = Arc::clone(&b);
        thread::spawn(move || {
            let mut out = [0u8; 1];
            let n = b.read(&mut out);
            (n, out[0])
        })
    };

    a.close();
    thread::sleep(Duration::from_millis(20));
    assert!(!reader.is_finished());
    assert!(b.is_open());

    assert_eq!(b.write(b"k"), 1);
    assert_eq!(reader.join().expect("join"), (1, b'k'));
}

#[test]
fn repeated_close_is_harmless() {
    let pipe = shared(3);
    assert_eq!(pipe.write(b"abc"), 3);
    for _ in 0..3 {
        pipe.close();
    }
    assert!(!pipe.is_open());
    assert_eq!(pipe.len(), 3);
    assert_eq!(read_to_close(&pipe, 2), b"abc");
}

#[test]
fn single_producer_single_consumer_is_fifo() {
    let pipe = shared(13);
    let payload: Vec<u8> = (0..50_000u32).map(|i| (i % 256) as u8).collect();
    let expected = payload.clone();

    let producer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || {
            let mut written = 0;
            for chunk in payload.chunks(17) {
                written += pipe.write(chunk);
            }
            pipe.close();
            written
        })
    };

    let received = read_to_close(&pipe, 9);
    assert_eq!(producer.join().expect("join"), 50_000);
    assert_eq!(received, expected);
}

#[test]
fn many_producers_many_consumers_conserve_bytes() {
    let pipe = shared(8);
    let producers: Vec<_> = (0..4u8)
        .map(|id| {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                let data = vec![id; 5000];
                let mut written = 0;
                for chunk in data.chunks(11) {
                    written += pipe.write(chunk);
                }
                written
            })
        })
        .collect();
    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || read_to_close(&pipe, 7))
        })
        .collect();

    let written: usize = producers
        .into_iter()
        .map(|handle| handle.join().expect("join"))
        .sum();
    pipe.close();

    let mut per_id = [0usize; 4];
    for consumer in consumers {
        for byte in consumer.join().expect("join") {
            per_id[usize::from(byte)] += 1;
        }
    }

    assert_eq!(written, 20_000);
    assert_eq!(per_id, [5000; 4]);
    let stats = pipe.stats();
    assert_eq!(stats.total_written, stats.total_read);
    assert_eq!(stats.buffered, 0);
}

#[test]
fn buffered_count_never_exceeds_capacity() {
    let pipe = shared(5);
    let producer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || {
            for _ in 0..2000 {
                pipe.write(b"abc");
            }
            pipe.close();
        })
    };

    let observer = {
        let pipe = Arc::clone(&pipe);
        thread::spawn(move || {
            while pipe.is_open() {
                let stats = pipe.stats();
                assert!(stats.buffered <= stats.capacity);
            }
        })
    };

    let received = read_to_close(&pipe, 4);
    producer.join().expect("join");
    observer.join().expect("join");
    assert_eq!(received.len(), 6000);
}

#[test]
fn destroy_after_all_users_joined() {
    let pipe = shared(4);
    let users: Vec<_> = (0..2)
        .map(|_| {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || pipe.write(b"hi"))
        })
        .collect();
    for user in users {
        assert_eq!(user.join().expect("join"), 2);
    }
    pipe.close();
    Arc::try_unwrap(pipe).expect("sole owner").destroy();
}
