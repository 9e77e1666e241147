use std::sync::Arc;
use std::time::Duration;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Sample, StreamConfig,
};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::state::AppState;

/// Starts the audio output task. Runs until the process exits.
pub async fn run_audio_output(state: Arc<AppState>) {
    let result = tokio::task::spawn_blocking(move || {
        let stream = match start_stream(state) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Audio output unavailable: {}", e);
                return;
            }
        };

        // The stream stops when dropped; keep this thread holding it.
        let _stream = stream;
        loop {
            std::thread::sleep(Duration::from_secs(1));
        }
    })
    .await;

    if let Err(e) = result {
        error!("Audio output task failed: {}", e);
    }
}

/// Opens the default output device and starts rendering the instrument into it.
fn start_stream(state: Arc<AppState>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(Error::NoOutputDevice)?;
    info!(
        "Default output device found: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported_config = device.default_output_config()?;
    let config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    info!("Audio stream configuration: {:?}", config);

    let sample_rate = config.sample_rate.0 as f32;
    state.instrument().pool.set_sample_rate(sample_rate);

    let channels = config.channels as usize;
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            process_audio_data(data, channels, &state);
        },
        |err| {
            error!("An error occurred on the audio stream: {}", err);
        },
        None,
    )?;

    info!("Starting audio stream...");
    stream.play()?;
    Ok(stream)
}

/// Fills one interleaved output buffer from the voice pool.
fn process_audio_data(data: &mut [f32], channels: usize, state: &AppState) {
    let mut instrument = state.instrument();
    let mut waveform_buffer = state.waveform();
    let mut buffer_index = 0;

    for frame in data.chunks_mut(channels.max(1)) {
        let sample_value = instrument.pool.next_sample().clamp(-1.0, 1.0);

        for sample in frame.iter_mut() {
            *sample = Sample::from_sample(sample_value);
        }

        if buffer_index < waveform_buffer.len() {
            waveform_buffer[buffer_index] = sample_value;
            buffer_index += 1;
        }
    }
}
