//! Symphonia + cpal media backend
//!
//! Each session runs one decode thread that owns the cpal stream (which
//! must stay on the thread that built it). The engine talks to the thread
//! through a small block of atomics; the thread answers through the
//! session's event sink.

use std::sync::atomic::{ AtomicBool, AtomicU32, Ordering };
use std::sync::{ Arc, Mutex, PoisonError };
use std::thread::{ self, JoinHandle };
use std::time::Duration;

use crate::backend::{ BackendError, MediaBackend, MediaSession, SessionEvent, SessionEvents };
use crate::decoder::Decoder;
use crate::output::{ AudioOutput, SampleBuffer };
use crate::track::Track;


/// Minimum position change worth reporting.
const POSITION_STEP: Duration = Duration::from_millis( 250 );


/// Opens sessions that decode with Symphonia and play through cpal.
#[derive( Debug, Default, Clone, Copy )]
pub struct CpalBackend;


impl MediaBackend for CpalBackend {
    fn open( &mut self, track: &Track, events: SessionEvents ) -> Result<Box<dyn MediaSession>, BackendError> {
        let decoder = Decoder::open( track.id().path() )
            .map_err( |e| BackendError::FileOpen( e.to_string() ) )?;
        Ok( Box::new( CpalSession::start( decoder, events )? ) )
    }
}


/// Requests from the engine to the decode thread.
struct Control {
    stop: AtomicBool,
    playing: AtomicBool,
    volume: AtomicU32,
    seek: Mutex<Option<Duration>>,
}


impl Control {
    fn new() -> Self {
        Self {
            stop: AtomicBool::new( false ),
            playing: AtomicBool::new( false ),
            volume: AtomicU32::new( 1.0_f32.to_bits() ),
            seek: Mutex::new( None ),
        }
    }


    fn stopped( &self ) -> bool {
        self.stop.load( Ordering::Relaxed )
    }


    fn request_seek( &self, position: Duration ) {
        *self.seek.lock().unwrap_or_else( PoisonError::into_inner ) = Some( position );
    }


    fn take_seek( &self ) -> Option<Duration> {
        self.seek.lock().unwrap_or_else( PoisonError::into_inner ).take()
    }


    fn seek_pending( &self ) -> bool {
        self.seek.lock().unwrap_or_else( PoisonError::into_inner ).is_some()
    }
}


/// A live decode thread plus its output stream.
pub struct CpalSession {
    control: Arc<Control>,
    thread: Option<JoinHandle<()>>,
}


impl CpalSession {
    fn start( decoder: Decoder, events: SessionEvents ) -> Result<Self, BackendError> {
        let control = Arc::new( Control::new() );
        let thread_control = Arc::clone( &control );

        let thread = thread::Builder::new()
            .name( format!( "cadenza-session-{}", events.generation() ) )
            .spawn( move || run( decoder, thread_control, events ) )
            .map_err( |e| BackendError::Output( e.to_string() ) )?;

        Ok( Self {
            control,
            thread: Some( thread ),
        })
    }


    fn ensure_alive( &self ) -> Result<(), BackendError> {
        match &self.thread {
            Some( t ) if !t.is_finished() => Ok(()),
            _ => Err( BackendError::Closed ),
        }
    }
}


impl MediaSession for CpalSession {
    fn play( &mut self ) -> Result<(), BackendError> {
        self.ensure_alive()?;
        self.control.playing.store( true, Ordering::Relaxed );
        Ok(())
    }


    fn pause( &mut self ) -> Result<(), BackendError> {
        self.ensure_alive()?;
        self.control.playing.store( false, Ordering::Relaxed );
        Ok(())
    }


    fn stop( &mut self ) -> Result<(), BackendError> {
        self.ensure_alive()?;
        self.control.playing.store( false, Ordering::Relaxed );
        self.control.request_seek( Duration::ZERO );
        Ok(())
    }


    fn seek( &mut self, position: Duration ) -> Result<(), BackendError> {
        self.ensure_alive()?;
        self.control.request_seek( position );
        Ok(())
    }


    fn set_volume( &mut self, volume: f32 ) {
        self.control.volume.store( volume.to_bits(), Ordering::Relaxed );
    }
}


impl Drop for CpalSession {
    fn drop( &mut self ) {
        self.control.stop.store( true, Ordering::Relaxed );
        if let Some( thread ) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!( "Session thread panicked" );
            }
        }
    }
}


/// Decode loop. The cpal stream lives and dies on this thread.
fn run( mut decoder: Decoder, control: Arc<Control>, events: SessionEvents ) {
    events.emit( SessionEvent::Ready { duration: decoder.duration() } );

    let channels = decoder.channels().max( 1 );
    let rate = decoder.sample_rate();

    let error_events = events.clone();
    let ( output, buffer ) = match AudioOutput::new( rate, channels as u16, move |err| {
        tracing::error!( "Audio output error: {}", err );
        error_events.emit( SessionEvent::Error( err.to_string() ) );
    } ) {
        Ok( pair ) => pair,
        Err( e ) => {
            events.emit( SessionEvent::Error( e.to_string() ) );
            return;
        }
    };

    buffer.set_paused( true );
    if let Err( e ) = output.play() {
        events.emit( SessionEvent::Error( e.to_string() ) );
        return;
    }
    tracing::debug!( "Session {} output on {} channels", events.generation(), output.channels() );

    // Keep about 50ms decoded ahead of the device
    let target = rate as usize * channels / 20;
    let mut clock = Clock::new( rate, channels );
    let mut ended = false;

    loop {
        if control.stopped() {
            break;
        }

        if let Some( position ) = control.take_seek() {
            buffer.clear();
            if let Err( e ) = decoder.seek( position ) {
                events.emit( SessionEvent::Error( e.to_string() ) );
                break;
            }
            clock.reset( position );
            ended = false;
            events.emit( SessionEvent::Position( position ) );
        }

        let playing = control.playing.load( Ordering::Relaxed );
        buffer.set_paused( !playing );
        buffer.set_volume( f32::from_bits( control.volume.load( Ordering::Relaxed ) ) );

        if !playing || ended {
            thread::sleep( Duration::from_millis( 10 ) );
            continue;
        }

        if buffer.len() > target {
            clock.report( &buffer, &events );
            thread::sleep( Duration::from_millis( 5 ) );
            continue;
        }

        match decoder.decode_next() {
            Ok( Some( samples ) ) => {
                clock.advance( samples.len() );
                feed( &buffer, &samples, &control );
                clock.report( &buffer, &events );
            }
            Ok( None ) => {
                while !buffer.is_empty() && !control.stopped() && !control.seek_pending() {
                    thread::sleep( Duration::from_millis( 10 ) );
                    clock.report( &buffer, &events );
                }
                if control.stopped() || control.seek_pending() {
                    continue;
                }
                tracing::debug!( "Session {} reached end of track", events.generation() );
                ended = true;
                events.emit( SessionEvent::EndOfTrack );
            }
            Err( e ) => {
                tracing::error!( "Decode error: {}", e );
                events.emit( SessionEvent::Error( e.to_string() ) );
                break;
            }
        }
    }

    tracing::debug!( "Session {} closed", events.generation() );
}


/// Pushes all of `samples`, waiting for room, unless the session is
/// stopped or a seek makes them stale.
fn feed( buffer: &SampleBuffer, samples: &[f32], control: &Control ) {
    let mut offset = 0;
    while offset < samples.len() && !control.stopped() && !control.seek_pending() {
        let pushed = buffer.push( &samples[ offset.. ] );
        offset += pushed;
        if pushed == 0 {
            thread::sleep( Duration::from_millis( 5 ) );
        }
    }
}


/// Tracks the playback position from decoded frames minus what is still
/// queued for the device.
struct Clock {
    rate: u64,
    channels: usize,
    decoded_frames: u64,
    last_reported: Option<Duration>,
}


impl Clock {
    fn new( rate: u32, channels: usize ) -> Self {
        Self {
            rate: rate.max( 1 ) as u64,
            channels,
            decoded_frames: 0,
            last_reported: None,
        }
    }


    fn reset( &mut self, position: Duration ) {
        self.decoded_frames = ( position.as_secs_f64() * self.rate as f64 ) as u64;
        self.last_reported = Some( position );
    }


    fn advance( &mut self, samples: usize ) {
        self.decoded_frames += ( samples / self.channels ) as u64;
    }


    fn report( &mut self, buffer: &SampleBuffer, events: &SessionEvents ) {
        let queued = ( buffer.len() / self.channels ) as u64;
        let frames = self.decoded_frames.saturating_sub( queued );
        let position = Duration::from_nanos( frames * 1_000_000_000 / self.rate );

        let due = match self.last_reported {
            Some( last ) => position.max( last ) - position.min( last ) >= POSITION_STEP,
            None => true,
        };
        if due {
            self.last_reported = Some( position );
            events.emit( SessionEvent::Position( position ) );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::backend::TaggedEvent;
    use crate::track::TrackId;


    #[test]
    fn test_open_missing_file_fails() {
        let mut backend = CpalBackend;
        let track = Track::new( TrackId::from( "/no/such/file.mp3" ), "", "", "", "" );
        let events = SessionEvents::new( 1, Arc::new( |_: TaggedEvent| {} ) );
        assert!( matches!( backend.open( &track, events ), Err( BackendError::FileOpen( _ ) ) ) );
    }


    #[test]
    fn test_clock_reports_in_steps() {
        let seen = Arc::new( Mutex::new( Vec::new() ) );
        let sink = Arc::clone( &seen );
        let events = SessionEvents::new( 3, Arc::new( move |e: TaggedEvent| {
            sink.lock().unwrap().push( e );
        } ) );
        let buffer = SampleBuffer::new( 1024, 1, 1 );
        let mut clock = Clock::new( 1000, 1 );

        clock.report( &buffer, &events );
        clock.advance( 100 );
        clock.report( &buffer, &events );
        clock.advance( 200 );
        clock.report( &buffer, &events );

        let seen = seen.lock().unwrap();
        let positions: Vec<_> = seen.iter().map( |e| e.event.clone() ).collect();
        assert_eq!( positions, vec![
            SessionEvent::Position( Duration::ZERO ),
            SessionEvent::Position( Duration::from_millis( 300 ) ),
        ] );
        assert!( seen.iter().all( |e| e.generation == 3 ) );
    }
}
