//! Output callback mixer
//!
//! Each render fills the device buffer with the linear sum (not the average)
//! of every playing stream, each scaled by its current gain, converted to the
//! device representation. Where nothing plays the output is the
//! representation's zero level.
//!
//! Buffers are sized for one device block when the mixer is built; larger
//! requests are rendered block by block. Nothing here allocates, blocks or
//! logs once rendering has started.

use crate::audio::types::DeviceSpec;
use crate::playback::callback_monitor::CallbackStats;
use crate::playback::events::{StreamEvent, StreamEventKind};
use crate::playback::registry::Registry;
use aumix_common::SampleConverter;
use ringbuf::{traits::*, HeapProd};
use std::sync::Arc;

pub struct Mixer {
    registry: Arc<Registry>,
    spec: DeviceSpec,
    converter: SampleConverter,
    block_bytes: usize,
    /// Canonical float sum for one block
    sum: Vec<f32>,
    /// Per-stream pull buffer for one block
    scratch: Vec<f32>,
    events: HeapProd<StreamEvent>,
    stats: Arc<CallbackStats>,
}

impl Mixer {
    pub fn new(
        registry: Arc<Registry>,
        spec: DeviceSpec,
        events: HeapProd<StreamEvent>,
        stats: Arc<CallbackStats>,
    ) -> Self {
        let block_frames = spec.block_frames.max(1);
        let samples = block_frames * spec.channels as usize;
        Self {
            registry,
            spec,
            converter: spec.format.converter(),
            block_bytes: block_frames * spec.bytes_per_frame(),
            sum: vec![0.0; samples],
            scratch: vec![0.0; samples],
            events,
            stats,
        }
    }

    pub fn spec(&self) -> &DeviceSpec {
        &self.spec
    }

    /// Fill `out` with exactly `out.len()` bytes of mixed audio
    pub fn render(&mut self, out: &mut [u8]) {
        let started = self.stats.begin_callback();

        let bytes_per_frame = self.spec.bytes_per_frame();
        let frames = self.spec.frames_in(out.len());
        let (body, tail) = out.split_at_mut(frames * bytes_per_frame);

        for block in body.chunks_mut(self.block_bytes) {
            self.render_block(block);
        }

        // A trailing partial frame gets silence
        tail.fill(0);
        self.converter.fill_silence(tail);

        self.stats.end_callback(started, frames as u64);
    }

    fn render_block(&mut self, out: &mut [u8]) {
        let channels = self.spec.channels as usize;
        let samples = self.spec.frames_in(out.len()) * channels;
        let sum = &mut self.sum[..samples];
        let scratch = &mut self.scratch[..samples];
        sum.fill(0.0);

        {
            let streams = self.registry.lock();
            for stream in streams.iter() {
                let report = stream.mix_into(sum, scratch, channels, self.spec.sample_rate);

                if report.contended {
                    self.stats.record_contention();
                }
                for _ in 0..report.looped {
                    let event = StreamEvent {
                        id: stream.id(),
                        kind: StreamEventKind::Looped,
                    };
                    push_event(&mut self.events, &self.stats, event);
                }
                if report.finished {
                    let event = StreamEvent {
                        id: stream.id(),
                        kind: StreamEventKind::Finished,
                    };
                    push_event(&mut self.events, &self.stats, event);
                }
            }
        }

        self.converter.convert_slice(sum, out);
    }
}

fn push_event(events: &mut HeapProd<StreamEvent>, stats: &CallbackStats, event: StreamEvent) {
    if events.try_push(event).is_err() {
        stats.record_dropped_event();
    }
}
