//! Integration tests for producer/consumer use across threads

use ring_buffer::{RingBuffer, SpinSection};
use serde::{Deserialize, Serialize};
use std::hint::spin_loop;
use std::thread;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Frame {
    sequence: u32,
    rpm: u16,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Records cross threads in insertion order with none lost or duplicated
#[test]
fn test_threads_preserve_fifo_order() {
    init_logging();

    const TOTAL: u64 = 20_000;
    let mut buffer = RingBuffer::with_section(8, 16, SpinSection::new()).unwrap();
    let (mut producer, mut consumer) = buffer.split();

    let received = thread::scope(|s| {
        s.spawn(move || {
            for i in 0..TOTAL {
                while !producer.insert(&i.to_le_bytes()) {
                    spin_loop();
                }
            }
        });

        let mut received = Vec::with_capacity(TOTAL as usize);
        let mut dest = [0u8; 8];
        while received.len() < TOTAL as usize {
            if consumer.remove_oldest(&mut dest) {
                received.push(u64::from_le_bytes(dest));
            } else {
                spin_loop();
            }
        }
        received
    });

    assert!(received.iter().copied().eq(0..TOTAL));
    assert!(buffer.is_empty());
}

/// Peeking from the consumer thread while the producer keeps inserting
#[test]
fn test_peek_while_producing() {
    init_logging();

    const TOTAL: u32 = 5_000;
    let mut buffer = RingBuffer::with_section(4, 8, SpinSection::new()).unwrap();
    let (mut producer, mut consumer) = buffer.split();

    thread::scope(|s| {
        s.spawn(move || {
            for i in 0..TOTAL {
                while !producer.insert(&i.to_le_bytes()) {
                    spin_loop();
                }
            }
        });

        let mut expected = 0u32;
        let mut dest = [0u8; 4];
        while expected < TOTAL {
            if let Some(oldest) = consumer.peek(0) {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(oldest);
                assert_eq!(u32::from_le_bytes(bytes), expected);

                assert!(consumer.remove_oldest(&mut dest));
                assert_eq!(u32::from_le_bytes(dest), expected);
                expected += 1;
            } else {
                spin_loop();
            }
        }
    });
}

#[test]
fn test_typed_frames_across_threads() {
    init_logging();

    const TOTAL: u32 = 1_000;
    let mut buffer = RingBuffer::with_section(16, 4, SpinSection::new()).unwrap();
    let (mut producer, mut consumer) = buffer.split();

    thread::scope(|s| {
        s.spawn(move || {
            for sequence in 0..TOTAL {
                let frame = Frame {
                    sequence,
                    rpm: (sequence % 8000) as u16,
                };
                while !producer.insert_record(&frame).unwrap() {
                    spin_loop();
                }
            }
        });

        let mut next = 0u32;
        while next < TOTAL {
            match consumer.remove_record::<Frame>().unwrap() {
                Some(frame) => {
                    assert_eq!(frame.sequence, next);
                    assert_eq!(frame.rpm, (next % 8000) as u16);
                    next += 1;
                }
                None => spin_loop(),
            }
        }
    });
}

/// Caller-provided storage that outlives the buffer
#[test]
fn test_static_storage() {
    let region: &'static mut [u8] = Box::leak(vec![0xFFu8; 12].into_boxed_slice());
    let mut buffer = RingBuffer::from_storage(region, 4, 3, SpinSection::new()).unwrap();

    assert!(buffer.insert(&[1, 1, 1, 1]));
    assert!(buffer.insert(&[2, 2, 2, 2]));
    assert_eq!(buffer.peek(1), Some(&[2u8, 2, 2, 2][..]));
    assert_eq!(buffer.len(), 2);
}
