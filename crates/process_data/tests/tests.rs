//! Whole-callback scenarios: a driver allocating, a chain of stages reshaping, and everything going back to the pool.
use std::num::NonZeroUsize;

use pretty_assertions::assert_eq;

use process_data::*;

const BLOCK: usize = 64;

fn pool() -> BufferPool {
    BufferPool::new(NonZeroUsize::new(BLOCK).unwrap())
}

#[test]
fn pool_of_64_cycles() {
    let pool = pool();
    let mut handles = pool.allocate_multi::<8>().to_vec();

    for (i, h) in handles.iter_mut().enumerate() {
        assert_eq!(h.len(), BLOCK);
        h.samples_mut().fill(i as f32);
    }
    for (i, h) in handles.iter().enumerate() {
        assert!(h.samples().iter().all(|&x| x == i as f32));
    }
    assert!(pool.try_allocate().is_err());

    for h in handles.iter_mut() {
        h.release();
    }
    assert_eq!(pool.slots_in_use(), 0);

    let again = pool.allocate();
    assert_eq!(again.len(), BLOCK);
}

#[test]
fn ninth_allocation_is_fatal() {
    let mut pool = pool();
    pool.set_exhaustion_handler(audio_buffers::panic_on_exhaustion);
    let _all = pool.allocate_multi::<8>();

    let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = pool.allocate();
    }));
    assert!(caught
        .unwrap_err()
        .downcast_ref::<audio_buffers::PoolExhausted>()
        .is_some());
}

#[test]
fn clone_then_drop_one_keeps_slot() {
    let pool = pool();
    let a = pool.allocate();
    let slot = a.slot_index().unwrap();
    let b = a.clone();
    std::mem::drop(a);

    assert_eq!(pool.reference_count(slot), Some(1));
    let others = pool.allocate_multi::<7>();
    assert!(others.iter().all(|h| h.slot_index() != Some(slot)));
    assert!(pool.try_allocate().is_err());

    std::mem::drop(b);
    assert_eq!(pool.allocate().slot_index(), Some(slot));
}

/// One full callback: mono in, gain, fan out to stereo, process the two halves of the block separately, read out.
#[test]
fn callback_through_a_chain() {
    let pool = pool();
    let mut events = SharedEvents::<(usize, f32)>::with_capacity(4);
    events.refill().unwrap().push((0, 0.5));

    let mut input = pool.allocate();
    for (i, s) in input.samples_mut().iter_mut().enumerate() {
        *s = i as f32;
    }

    let data = ProcessPayload::mono(input, events.clone(), BLOCK);

    let mut gain = |mut data: ProcessPayload<1, SharedEvents<(usize, f32)>>| {
        let g = data.events().and_then(|e| e.first()).map_or(1.0, |e| e.1);
        for s in data.mono_samples_mut().iter_mut() {
            *s *= g;
        }
        data
    };

    let mut fan_out = |data: ProcessPayload<1, SharedEvents<(usize, f32)>>| {
        let mut right = pool.allocate();
        right.copy_from_slice(&data.mono_handle().samples());
        let left = data.mono_handle().clone();
        data.redirect([left, right])
    };

    let data = gain.process(data);
    let stereo = fan_out.process(data);
    assert_eq!(pool.slots_in_use(), 2);

    {
        let mut first = stereo.slice(..BLOCK / 2);
        let mut second = stereo.slice(BLOCK / 2..);
        assert_eq!(second.nframes(), BLOCK / 2);
        // Zero the first half of the right channel and double the second half, both borrowed at once.  The
        // full-block payload must see both.
        let mut zeroing = first.channel_samples_mut(1);
        let mut doubling = second.channel_samples_mut(1);
        zeroing.fill(0.0);
        for s in doubling.iter_mut() {
            *s *= 2.0;
        }
    }

    let [left, right] = stereo.audio();
    assert_eq!(left.get(10), 5.0);
    assert_eq!(right.get(10), 0.0);
    assert_eq!(right.get(40), 40.0);

    std::mem::drop(stereo);
    assert_eq!(pool.slots_in_use(), 0);
    // And the events are free to be refilled for the next callback.
    assert!(events.refill().is_some());
}

#[test]
fn resize_between_callbacks() {
    let mut pool = pool();
    {
        let data = ProcessPayload::<2, ()>::from_audio(pool.allocate_multi::<2>());
        assert_eq!(data.nframes(), BLOCK);
        assert!(pool.set_buffer_size(NonZeroUsize::new(BLOCK * 2).unwrap()).is_err());
    }

    pool.set_buffer_size(NonZeroUsize::new(BLOCK * 2).unwrap()).unwrap();
    let data = ProcessPayload::<2, ()>::from_audio(pool.allocate_multi::<2>());
    assert_eq!(data.nframes(), BLOCK * 2);
}
