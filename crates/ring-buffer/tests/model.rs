//! Property tests comparing the ring buffer with a `VecDeque` model

use proptest::prelude::*;
use ring_buffer::RingBuffer;
use std::collections::VecDeque;

const ELEMENT_SIZE: usize = 2;

#[derive(Debug, Clone)]
enum Op {
    Insert(u8),
    Remove,
    Peek(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Insert),
        Just(Op::Remove),
        (0usize..8).prop_map(Op::Peek),
    ]
}

proptest! {
    #[test]
    fn test_matches_fifo_model(
        capacity in 1usize..6,
        ops in prop::collection::vec(op_strategy(), 0..128),
    ) {
        let mut buffer = RingBuffer::new(ELEMENT_SIZE, capacity).unwrap();
        let mut model: VecDeque<[u8; ELEMENT_SIZE]> = VecDeque::new();

        for op in ops {
            match op {
                Op::Insert(value) => {
                    let record = [value, value.wrapping_mul(3)];
                    let accepted = buffer.insert(&record);
                    prop_assert_eq!(accepted, model.len() < capacity);
                    if accepted {
                        model.push_back(record);
                    }
                }
                Op::Remove => {
                    let mut dest = [0xEEu8; ELEMENT_SIZE];
                    let removed = buffer.remove_oldest(&mut dest);
                    match model.pop_front() {
                        Some(expected) => {
                            prop_assert!(removed);
                            prop_assert_eq!(dest, expected);
                        }
                        None => {
                            prop_assert!(!removed);
                            prop_assert_eq!(dest, [0xEEu8; ELEMENT_SIZE]);
                        }
                    }
                }
                Op::Peek(index) => {
                    prop_assert_eq!(buffer.peek(index), model.get(index).map(|r| &r[..]));
                }
            }

            prop_assert_eq!(buffer.len(), model.len());
            prop_assert_eq!(buffer.is_empty(), model.is_empty());
            prop_assert_eq!(buffer.is_full(), model.len() == capacity);
        }
    }

    #[test]
    fn test_peek_beyond_len_is_none(
        capacity in 1usize..8,
        fill in 0usize..8,
        extra in 0usize..16,
    ) {
        let mut buffer = RingBuffer::new(1, capacity).unwrap();
        for i in 0..fill.min(capacity) {
            prop_assert!(buffer.insert(&[i as u8]));
        }
        prop_assert_eq!(buffer.peek(buffer.len() + extra), None);
    }
}
