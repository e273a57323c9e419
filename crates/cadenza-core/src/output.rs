//! Audio output via cpal
//!
//! Handles sending decoded PCM samples to the system audio device.

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicBool, AtomicU32, Ordering };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use thiserror::Error;


/// Errors that can occur with audio output.
#[derive( Debug, Error )]
pub enum OutputError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Failed to get stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Output device cannot play {0} Hz audio" )]
    UnsupportedRate( u32 ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to play stream: {0}" )]
    PlayStream( String ),
}


/// Shared sample queue between the decode thread and the audio callback.
///
/// Maps the source channel layout onto the device layout and applies
/// volume on the way out.
pub struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: usize,
    paused: AtomicBool,
    /// Volume level stored as f32 bits
    volume: AtomicU32,
    source_channels: usize,
    output_channels: usize,
}


impl SampleBuffer {
    /// Creates a buffer holding at most `capacity` source samples.
    pub fn new( capacity: usize, source_channels: u16, output_channels: u16 ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::with_capacity( capacity ) ),
            capacity,
            paused: AtomicBool::new( false ),
            volume: AtomicU32::new( 1.0_f32.to_bits() ),
            source_channels: source_channels.max( 1 ) as usize,
            output_channels: output_channels.max( 1 ) as usize,
        }
    }


    /// Pushes samples. Returns how many were accepted.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.lock();
        let to_push = samples.len().min( self.capacity.saturating_sub( buf.len() ) );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Fills `output` with device-layout samples, padding with silence.
    /// Returns the number of output samples that carry audio.
    pub fn pop( &self, output: &mut [f32] ) -> usize {
        if self.paused.load( Ordering::Relaxed ) {
            output.fill( 0.0 );
            return 0;
        }

        let volume = self.volume();
        let src_ch = self.source_channels;
        let out_ch = self.output_channels;
        let mut buf = self.lock();

        let frames = ( output.len() / out_ch ).min( buf.len() / src_ch );
        let mut frame = vec![ 0.0_f32; src_ch ];

        for out_frame in output.chunks_exact_mut( out_ch ).take( frames ) {
            for ( slot, sample ) in frame.iter_mut().zip( buf.drain( ..src_ch ) ) {
                *slot = sample;
            }

            if src_ch == out_ch {
                out_frame.copy_from_slice( &frame );
            } else if out_ch == 1 {
                out_frame[ 0 ] = frame.iter().sum::<f32>() / src_ch as f32;
            } else {
                for ( ch, out ) in out_frame.iter_mut().enumerate() {
                    *out = frame[ ch.min( src_ch - 1 ) ];
                }
            }
        }

        let written = frames * out_ch;
        output[ written.. ].fill( 0.0 );

        if volume != 1.0 {
            for sample in output[ ..written ].iter_mut() {
                *sample *= volume;
            }
        }

        written
    }


    pub fn len( &self ) -> usize {
        self.lock().len()
    }


    pub fn is_empty( &self ) -> bool {
        self.lock().is_empty()
    }


    pub fn clear( &self ) {
        self.lock().clear();
    }


    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }


    pub fn is_paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    /// Sets the volume level (0.0 = mute, 1.0 = normal).
    pub fn set_volume( &self, volume: f32 ) {
        self.volume.store( volume.to_bits(), Ordering::Relaxed );
    }


    pub fn volume( &self ) -> f32 {
        f32::from_bits( self.volume.load( Ordering::Relaxed ) )
    }


    fn lock( &self ) -> MutexGuard<'_, VecDeque<f32>> {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner )
    }
}


/// Audio output handler.
/// Note: This struct is NOT Send/Sync due to cpal::Stream.
/// Keep it on the thread where it was created.
pub struct AudioOutput {
    stream: cpal::Stream,
    channels: u16,
}


impl AudioOutput {
    /// Opens the default device at the source sample rate.
    ///
    /// Returns the output together with the buffer the caller should fill.
    /// There is no resampling: a device that cannot run at
    /// `source_sample_rate` is an error.
    pub fn new(
        source_sample_rate: u32,
        source_channels: u16,
        on_error: impl FnMut( cpal::StreamError ) + Send + 'static,
    ) -> Result<( Self, Arc<SampleBuffer> ), OutputError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or( OutputError::NoDevice )?;

        tracing::debug!( "Using output device: {:?}", device.name() );

        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
            .filter( |c| {
                c.min_sample_rate().0 <= source_sample_rate && c.max_sample_rate().0 >= source_sample_rate
            } )
            .collect();

        // Prefer a matching channel count, otherwise map channels ourselves
        let config = supported
            .iter()
            .find( |c| c.channels() == source_channels )
            .or_else( || supported.first() )
            .ok_or( OutputError::UnsupportedRate( source_sample_rate ) )?
            .clone()
            .with_sample_rate( cpal::SampleRate( source_sample_rate ) )
            .config();

        tracing::debug!( "Audio output config: {} Hz, {} channels", config.sample_rate.0, config.channels );

        // About half a second of audio
        let capacity = ( source_sample_rate as usize ) * ( source_channels as usize ) / 2;
        let sample_buffer = Arc::new( SampleBuffer::new( capacity, source_channels, config.channels ) );
        let callback_buffer = Arc::clone( &sample_buffer );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_buffer.pop( data );
                },
                on_error,
                None,
            )
            .map_err( |e| OutputError::BuildStream( e.to_string() ) )?;

        Ok(( Self { stream, channels: config.channels }, sample_buffer ))
    }


    /// Starts audio output.
    pub fn play( &self ) -> Result<(), OutputError> {
        self.stream
            .play()
            .map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    /// Gets the device channel count.
    pub fn channels( &self ) -> u16 {
        self.channels
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_push_respects_capacity() {
        let buffer = SampleBuffer::new( 4, 2, 2 );
        assert_eq!( buffer.push( &[ 1.0, 2.0, 3.0 ] ), 3 );
        assert_eq!( buffer.push( &[ 4.0, 5.0 ] ), 1 );
        assert_eq!( buffer.len(), 4 );
    }


    #[test]
    fn test_pop_pads_with_silence() {
        let buffer = SampleBuffer::new( 16, 2, 2 );
        buffer.push( &[ 0.5, -0.5 ] );
        let mut out = [ 9.0; 4 ];
        assert_eq!( buffer.pop( &mut out ), 2 );
        assert_eq!( out, [ 0.5, -0.5, 0.0, 0.0 ] );
        assert!( buffer.is_empty() );
    }


    #[test]
    fn test_mono_to_stereo() {
        let buffer = SampleBuffer::new( 16, 1, 2 );
        buffer.push( &[ 0.1, 0.2 ] );
        let mut out = [ 0.0; 4 ];
        assert_eq!( buffer.pop( &mut out ), 4 );
        assert_eq!( out, [ 0.1, 0.1, 0.2, 0.2 ] );
    }


    #[test]
    fn test_stereo_to_mono() {
        let buffer = SampleBuffer::new( 16, 2, 1 );
        buffer.push( &[ 0.2, 0.4, 1.0, 0.0 ] );
        let mut out = [ 0.0; 2 ];
        assert_eq!( buffer.pop( &mut out ), 2 );
        assert!( ( out[ 0 ] - 0.3 ).abs() < 1e-6 );
        assert!( ( out[ 1 ] - 0.5 ).abs() < 1e-6 );
    }


    #[test]
    fn test_pause_and_volume() {
        let buffer = SampleBuffer::new( 16, 1, 1 );
        buffer.push( &[ 1.0, 1.0 ] );

        buffer.set_paused( true );
        let mut out = [ 5.0; 2 ];
        assert_eq!( buffer.pop( &mut out ), 0 );
        assert_eq!( out, [ 0.0, 0.0 ] );
        assert_eq!( buffer.len(), 2 );

        buffer.set_paused( false );
        buffer.set_volume( 0.5 );
        assert_eq!( buffer.pop( &mut out ), 2 );
        assert_eq!( out, [ 0.5, 0.5 ] );
    }
}
