//! Scripted media backend for engine tests.

use std::collections::HashSet;
use std::sync::{ Arc, Mutex };
use std::time::Duration;

use crate::backend::{ BackendError, MediaBackend, MediaSession, SessionEvents };
use crate::track::{ Track, TrackId };


/// Everything the mock backend saw.
#[derive( Debug, Default )]
pub struct MockLog {
    pub opened: Vec<TrackId>,
    pub disposed: usize,
    pub live: usize,
    pub max_live: usize,
    pub calls: Vec<String>,
    pub volume: Option<f32>,
}


#[derive( Clone, Default )]
pub struct MockBackend {
    pub log: Arc<Mutex<MockLog>>,
    /// Tracks that fail to open.
    pub broken: HashSet<TrackId>,
    /// Tracks whose sessions refuse to play.
    pub mute: HashSet<TrackId>,
    /// Sink of the most recent session, for pushing events by hand.
    pub last_events: Arc<Mutex<Option<SessionEvents>>>,
}


impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn breaking( paths: &[&str] ) -> Self {
        Self {
            broken: paths.iter().map( |p| TrackId::from( *p ) ).collect(),
            ..Self::default()
        }
    }


    pub fn opened( &self ) -> Vec<TrackId> {
        self.log.lock().unwrap().opened.clone()
    }


    pub fn calls( &self ) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }
}


impl MediaBackend for MockBackend {
    fn open( &mut self, track: &Track, events: SessionEvents ) -> Result<Box<dyn MediaSession>, BackendError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push( format!( "open {}", track.id() ) );
        if self.broken.contains( track.id() ) {
            return Err( BackendError::FileOpen( track.id().to_string() ) );
        }

        log.opened.push( track.id().clone() );
        log.live += 1;
        log.max_live = log.max_live.max( log.live );
        *self.last_events.lock().unwrap() = Some( events );

        Ok( Box::new( MockSession {
            log: Arc::clone( &self.log ),
            refuse_play: self.mute.contains( track.id() ),
        } ) )
    }
}


struct MockSession {
    log: Arc<Mutex<MockLog>>,
    refuse_play: bool,
}


impl MockSession {
    fn record( &self, call: String ) {
        self.log.lock().unwrap().calls.push( call );
    }
}


impl MediaSession for MockSession {
    fn play( &mut self ) -> Result<(), BackendError> {
        if self.refuse_play {
            return Err( BackendError::Output( "device gone".into() ) );
        }
        self.record( "play".into() );
        Ok(())
    }


    fn pause( &mut self ) -> Result<(), BackendError> {
        self.record( "pause".into() );
        Ok(())
    }


    fn stop( &mut self ) -> Result<(), BackendError> {
        self.record( "stop".into() );
        Ok(())
    }


    fn seek( &mut self, position: Duration ) -> Result<(), BackendError> {
        self.record( format!( "seek {}", position.as_secs() ) );
        Ok(())
    }


    fn set_volume( &mut self, volume: f32 ) {
        let mut log = self.log.lock().unwrap();
        log.volume = Some( volume );
        log.calls.push( format!( "volume {}", volume ) );
    }
}


impl Drop for MockSession {
    fn drop( &mut self ) {
        let mut log = self.log.lock().unwrap();
        log.live -= 1;
        log.disposed += 1;
        log.calls.push( "dispose".into() );
    }
}


/// Builds `n` tracks at `/t0.mp3`, `/t1.mp3`, ...
pub fn tracks( n: usize ) -> Vec<Arc<Track>> {
    ( 0..n )
        .map( |i| {
            Arc::new( Track::new( TrackId::from( format!( "/t{}.mp3", i ).as_str() ), format!( "T{}", i ), "", "", "" ) )
        } )
        .collect()
}
