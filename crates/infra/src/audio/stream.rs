//! Live duplex equalizer stream
//!
//! The capture callback pushes interleaved frames into a lock-free queue,
//! remapped to the playback channel count. The playback callback drains the
//! queue into its buffer and runs the processor over it in place. Neither
//! callback allocates or locks; overruns and underruns are only counted.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use crossbeam::queue::ArrayQueue;
use eqchain_core::domain::audio::{AudioError, ChannelCount, ChannelLayout, DeviceType, Result};
use eqchain_core::domain::{AudioBlockProcessor, EngineConfig, ParameterStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::cpal_backend::find_device;

/// Blocks of latency the bridge queue can absorb
const QUEUE_BLOCKS: usize = 8;

/// Dropout counters shared with the audio callbacks
#[derive(Debug, Default)]
pub struct StreamStats {
    overruns: AtomicU64,
    underruns: AtomicU64,
    processed_blocks: AtomicU64,
}

impl StreamStats {
    /// Captured samples dropped because the queue was full
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Playback samples filled with silence because the queue was empty
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn processed_blocks(&self) -> u64 {
        self.processed_blocks.load(Ordering::Relaxed)
    }
}

/// Push captured frames, remapped from `in_channels` to `out_channels`
///
/// Missing channels repeat the last captured channel (mono feeds both
/// sides); extra captured channels are dropped. A frame is queued whole or
/// not at all, so the playback side never sees a shifted frame boundary.
pub fn push_frames(
    queue: &ArrayQueue<f32>,
    input: &[f32],
    in_channels: usize,
    out_channels: usize,
    stats: &StreamStats,
) {
    if in_channels == 0 || out_channels == 0 {
        return;
    }
    let mut dropped = 0u64;
    for frame in input.chunks_exact(in_channels) {
        if queue.capacity() - queue.len() < out_channels {
            dropped += out_channels as u64;
            continue;
        }
        for ch in 0..out_channels {
            // Single producer: free space only grows while the frame is pushed
            let _ = queue.push(frame[ch.min(in_channels - 1)]);
        }
    }
    if dropped > 0 {
        stats.overruns.fetch_add(dropped, Ordering::Relaxed);
    }
}

/// Fill `output` with whole frames from the queue
///
/// A frame that is not fully queued yet stays in the queue and its slot is
/// played as silence. A trailing partial frame in `output` is silenced.
pub fn pull_frames(
    queue: &ArrayQueue<f32>,
    output: &mut [f32],
    channels: usize,
    stats: &StreamStats,
) {
    if channels == 0 {
        output.fill(0.0);
        return;
    }
    let mut missing = 0u64;
    let mut frames = output.chunks_exact_mut(channels);
    for frame in &mut frames {
        if queue.len() >= channels {
            for sample in frame.iter_mut() {
                *sample = queue.pop().unwrap_or(0.0);
            }
        } else {
            frame.fill(0.0);
            missing += channels as u64;
        }
    }
    frames.into_remainder().fill(0.0);
    if missing > 0 {
        stats.underruns.fetch_add(missing, Ordering::Relaxed);
    }
}

/// Running input -> EQ -> output session
///
/// Dropping the value stops both CPAL streams.
pub struct EqStream {
    _input: Stream,
    _output: Stream,
    stats: Arc<StreamStats>,
    sample_rate: u32,
    input_channels: u16,
    output_channels: u16,
}

impl EqStream {
    /// Open the configured devices and start streaming through `processor`
    ///
    /// The processor is prepared for the session here and then moved into
    /// the playback callback.
    pub fn start<P>(engine: &EngineConfig, mut processor: AudioBlockProcessor<P>) -> Result<Self>
    where
        P: ParameterStore + 'static,
    {
        let host = cpal::default_host();
        let input_device = find_device(&host, engine.input_device.as_deref(), DeviceType::Input)?;
        let output_device =
            find_device(&host, engine.output_device.as_deref(), DeviceType::Output)?;

        let input_channels = input_device
            .default_input_config()
            .map_err(|e| AudioError::InvalidConfiguration(e.to_string()))?
            .channels();
        let output_channels = output_device
            .default_output_config()
            .map_err(|e| AudioError::InvalidConfiguration(e.to_string()))?
            .channels();

        let sample_rate = engine.sample_rate;
        let block_size = engine.block_size as usize;

        info!(
            "Creating EQ stream: {} Hz, block {}, {} in / {} out channels",
            sample_rate, block_size, input_channels, output_channels
        );

        let layout = ChannelLayout::symmetric(ChannelCount::from_count(output_channels));
        if let Err(e) = processor.set_channel_layout(layout) {
            // Channels past the first two pass through untouched
            warn!("{}; filtering the first two channels only", e);
        }
        processor.prepare(f64::from(sample_rate), block_size)?;

        let out_ch = usize::from(output_channels);
        let in_ch = usize::from(input_channels);
        let queue = Arc::new(ArrayQueue::new(block_size.max(64) * out_ch * QUEUE_BLOCKS));
        let stats = Arc::new(StreamStats::default());

        let input_config = StreamConfig {
            channels: input_channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Fixed(engine.block_size),
        };
        let output_config = StreamConfig {
            channels: output_channels,
            sample_rate,
            buffer_size: cpal::BufferSize::Fixed(engine.block_size),
        };

        let input_queue = Arc::clone(&queue);
        let input_stats = Arc::clone(&stats);
        let input = input_device
            .build_input_stream(
                &input_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    push_frames(&input_queue, data, in_ch, out_ch, &input_stats);
                },
                |err| error!("Input stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build input stream: {}", e)))?;

        let output_stats = Arc::clone(&stats);
        let output = output_device
            .build_output_stream(
                &output_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    pull_frames(&queue, data, out_ch, &output_stats);
                    match processor.process_interleaved(data, out_ch) {
                        Ok(()) => {
                            output_stats.processed_blocks.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => data.fill(0.0),
                    }
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))?;

        input
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start input stream: {}", e)))?;
        output
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start output stream: {}", e)))?;

        info!("EQ stream running");

        Ok(Self {
            _input: input,
            _output: output,
            stats,
            sample_rate,
            input_channels,
            output_channels,
        })
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn input_channels(&self) -> u16 {
        self.input_channels
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }
}
