//! Playback engine
//!
//! A single-writer state machine over a playlist snapshot. The engine owns
//! at most one [`MediaSession`] at a time and sequences tracks under the
//! shuffle and repeat flags. Every observable change is broadcast as a
//! [`PlayerEvent`].

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{ Rng, SeedableRng };
use tokio::sync::broadcast;

use crate::backend::{ BackendError, MediaBackend, MediaSession, SessionEvent, SessionEvents, TaggedEvent };
use crate::track::{ Track, TrackId };


const EVENT_CAPACITY: usize = 256;


/// Transport state of the engine.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum TransportState {
    Stopped,
    Paused,
    Playing,
}


/// Notifications for observers of the engine.
#[derive( Debug, Clone, PartialEq )]
pub enum PlayerEvent {
    TrackChanged( Option<Arc<Track>> ),
    TransportChanged( TransportState ),
    TimeChanged { elapsed: Duration, total: Option<Duration> },
    FlagsChanged { shuffle: bool, repeat: bool },
}


/// Point-in-time view of the engine.
#[derive( Debug, Clone, PartialEq )]
pub struct PlayerStatus {
    pub state: TransportState,
    pub track: Option<Arc<Track>>,
    pub index: Option<usize>,
    pub len: usize,
    pub elapsed: Duration,
    pub total: Option<Duration>,
    pub shuffle: bool,
    pub repeat: bool,
    pub volume: Option<f32>,
}


impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            track: None,
            index: None,
            len: 0,
            elapsed: Duration::ZERO,
            total: None,
            shuffle: false,
            repeat: false,
            volume: None,
        }
    }
}


/// The playback state machine.
pub struct Engine {
    backend: Box<dyn MediaBackend>,
    sink: Arc<dyn Fn( TaggedEvent ) + Send + Sync>,
    events: broadcast::Sender<PlayerEvent>,
    session: Option<Box<dyn MediaSession>>,
    generation: u64,
    snapshot: Vec<Arc<Track>>,
    index: usize,
    current: Option<Arc<Track>>,
    state: TransportState,
    shuffle: bool,
    repeat: bool,
    elapsed: Duration,
    total: Option<Duration>,
    /// Last volume applied to a live session.
    volume: Option<f32>,
    /// Consecutive tracks that failed to open or play.
    failures: usize,
    rng: StdRng,
}


impl Engine {
    /// Creates an idle engine. Sessions it opens report their events to
    /// `sink`, which must route them back into
    /// [`Engine::handle_session_event`].
    pub fn new( backend: Box<dyn MediaBackend>, sink: Arc<dyn Fn( TaggedEvent ) + Send + Sync> ) -> Self {
        let ( events, _ ) = broadcast::channel( EVENT_CAPACITY );
        Self {
            backend,
            sink,
            events,
            session: None,
            generation: 0,
            snapshot: Vec::new(),
            index: 0,
            current: None,
            state: TransportState::Stopped,
            shuffle: false,
            repeat: false,
            elapsed: Duration::ZERO,
            total: None,
            volume: None,
            failures: 0,
            rng: StdRng::from_entropy(),
        }
    }


    /// Replaces the shuffle random source.
    pub fn with_rng( mut self, rng: StdRng ) -> Self {
        self.rng = rng;
        self
    }


    pub fn subscribe( &self ) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }


    pub( crate ) fn event_sender( &self ) -> broadcast::Sender<PlayerEvent> {
        self.events.clone()
    }


    pub fn status( &self ) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            track: self.current.clone(),
            index: self.current.as_ref().map( |_| self.index ),
            len: self.snapshot.len(),
            elapsed: self.elapsed,
            total: self.total,
            shuffle: self.shuffle,
            repeat: self.repeat,
            volume: self.volume,
        }
    }


    pub fn state( &self ) -> TransportState {
        self.state
    }


    pub fn index( &self ) -> usize {
        self.index
    }


    pub fn current_track( &self ) -> Option<&Arc<Track>> {
        self.current.as_ref()
    }


    pub fn snapshot( &self ) -> &[Arc<Track>] {
        &self.snapshot
    }


    /// Generation of the live session. Events tagged otherwise are stale.
    pub fn generation( &self ) -> u64 {
        self.generation
    }


    pub fn has_session( &self ) -> bool {
        self.session.is_some()
    }


    /// Takes `tracks` as the new snapshot and pre-rolls its first track.
    pub fn load_playlist( &mut self, tracks: Vec<Arc<Track>> ) {
        self.release();
        self.snapshot = tracks;
        self.index = 0;
        self.failures = 0;
        tracing::info!( "Loaded playlist of {} tracks", self.snapshot.len() );

        if self.snapshot.is_empty() {
            self.current = None;
            self.elapsed = Duration::ZERO;
            self.total = None;
            self.set_state( TransportState::Stopped );
            self.emit( PlayerEvent::TrackChanged( None ) );
            self.emit_time();
            return;
        }

        self.load( 0, false );
    }


    pub fn play( &mut self ) {
        if self.state == TransportState::Playing || self.session.is_none() {
            return;
        }

        if let Err( e ) = self.start_output() {
            tracing::error!( "Cannot start playback: {}", e );
            self.skip_failed();
        }
    }


    pub fn pause( &mut self ) {
        if self.state != TransportState::Playing {
            return;
        }
        let Some( session ) = self.session.as_mut() else {
            return;
        };

        if let Err( e ) = session.pause() {
            tracing::warn!( "Pause failed: {}", e );
        }
        self.set_state( TransportState::Paused );
    }


    pub fn stop( &mut self ) {
        if self.state == TransportState::Stopped {
            return;
        }
        let Some( session ) = self.session.as_mut() else {
            return;
        };

        if let Err( e ) = session.stop() {
            tracing::warn!( "Stop failed: {}", e );
        }
        self.elapsed = Duration::ZERO;
        self.set_state( TransportState::Stopped );
        self.emit_time();
    }


    pub fn toggle_play_pause( &mut self ) {
        if self.state == TransportState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }


    pub fn next( &mut self ) {
        if self.snapshot.is_empty() {
            return;
        }
        self.failures = 0;
        self.advance();
    }


    /// Steps back one track. With shuffle on this is a fresh random pick.
    pub fn previous( &mut self ) {
        if self.snapshot.is_empty() {
            return;
        }
        if self.shuffle {
            self.next();
            return;
        }

        self.failures = 0;
        let len = self.snapshot.len();
        self.load( ( self.index + len - 1 ) % len, true );
    }


    pub fn seek( &mut self, position: Duration ) {
        let Some( session ) = self.session.as_mut() else {
            return;
        };

        let position = match self.total {
            Some( total ) => position.min( total ),
            None => position,
        };

        match session.seek( position ) {
            Ok(()) => {
                self.elapsed = position;
                self.emit_time();
            }
            Err( e ) => tracing::warn!( "Seek failed: {}", e ),
        }
    }


    /// Sets the output level, clamped to `0.0..=1.0`. Ignored without a
    /// live session.
    pub fn set_volume( &mut self, volume: f32 ) {
        let Some( session ) = self.session.as_mut() else {
            tracing::debug!( "Ignoring volume change with nothing loaded" );
            return;
        };

        let volume = volume.clamp( 0.0, 1.0 );
        session.set_volume( volume );
        self.volume = Some( volume );
    }


    pub fn toggle_shuffle( &mut self ) {
        self.set_shuffle( !self.shuffle );
    }


    pub fn toggle_repeat( &mut self ) {
        self.set_repeat( !self.repeat );
    }


    pub fn set_shuffle( &mut self, shuffle: bool ) {
        if self.shuffle != shuffle {
            self.shuffle = shuffle;
            self.emit_flags();
        }
    }


    pub fn set_repeat( &mut self, repeat: bool ) {
        if self.repeat != repeat {
            self.repeat = repeat;
            self.emit_flags();
        }
    }


    /// Jumps to the snapshot entry with this identity and plays it.
    pub fn play_track( &mut self, id: &TrackId ) {
        match self.snapshot.iter().position( |t| t.id() == id ) {
            Some( index ) => {
                self.failures = 0;
                self.load( index, true );
            }
            None => tracing::debug!( "{} is not in the loaded playlist", id ),
        }
    }


    /// Applies an event from a session. Events from disposed sessions are
    /// dropped.
    pub fn handle_session_event( &mut self, tagged: TaggedEvent ) {
        if tagged.generation != self.generation || self.session.is_none() {
            tracing::trace!( "Dropping stale event from session {}", tagged.generation );
            return;
        }

        match tagged.event {
            SessionEvent::Ready { duration } => {
                self.total = duration;
                self.emit_time();
            }
            SessionEvent::Position( position ) => {
                self.failures = 0;
                self.elapsed = position;
                self.emit_time();
            }
            SessionEvent::EndOfTrack => {
                self.failures = 0;
                self.end_of_track();
            }
            SessionEvent::Error( message ) => {
                tracing::error!( "Playback error: {}", message );
                self.skip_failed();
            }
        }
    }


    /// Stops and disposes the live session, if any.
    pub fn shutdown( &mut self ) {
        self.release();
        self.set_state( TransportState::Stopped );
    }


    fn end_of_track( &mut self ) {
        if !self.repeat {
            self.advance();
            return;
        }

        let Some( session ) = self.session.as_mut() else {
            return;
        };
        let restarted = session.seek( Duration::ZERO ).and_then( |()| session.play() );

        match restarted {
            Ok(()) => {
                self.elapsed = Duration::ZERO;
                self.emit_time();
                self.set_state( TransportState::Playing );
            }
            Err( e ) => {
                tracing::error!( "Cannot repeat track: {}", e );
                self.skip_failed();
            }
        }
    }


    fn advance( &mut self ) {
        let ( index, play ) = self.advance_target();
        self.load( index, play );
    }


    /// Where the advance algorithm goes next, and whether it plays there.
    fn advance_target( &mut self ) -> ( usize, bool ) {
        let len = self.snapshot.len();
        if self.shuffle {
            ( self.rng.gen_range( 0..len ), true )
        } else if self.index + 1 < len {
            ( self.index + 1, true )
        } else {
            ( 0, false )
        }
    }


    /// Records a failed track and advances, unless every track in the
    /// snapshot has failed in a row.
    fn skip_failed( &mut self ) {
        if self.note_failure() {
            self.advance();
        }
    }


    fn note_failure( &mut self ) -> bool {
        self.failures += 1;
        if self.failures < self.snapshot.len() {
            return true;
        }

        tracing::warn!( "No playable tracks in the loaded playlist" );
        self.release();
        self.current = None;
        self.elapsed = Duration::ZERO;
        self.total = None;
        self.set_state( TransportState::Stopped );
        self.emit( PlayerEvent::TrackChanged( None ) );
        false
    }


    /// Opens the track at `index`, then plays it if asked. Tracks that fail
    /// are skipped the way `next()` would.
    fn load( &mut self, mut index: usize, mut play: bool ) {
        loop {
            let result = self.open( index ).and_then( |()| {
                if play {
                    self.start_output()
                } else {
                    Ok(())
                }
            } );

            let Err( e ) = result else {
                return;
            };

            tracing::error!( "Skipping {}: {}", self.snapshot[ index ].id(), e );
            if !self.note_failure() {
                return;
            }
            ( index, play ) = self.advance_target();
        }
    }


    /// Replaces the live session with a fresh one for `index`, pre-rolled.
    fn open( &mut self, index: usize ) -> Result<(), BackendError> {
        self.release();

        let track = Arc::clone( &self.snapshot[ index ] );
        self.index = index;
        self.generation += 1;
        self.elapsed = Duration::ZERO;
        self.total = None;
        self.current = Some( Arc::clone( &track ) );
        self.set_state( TransportState::Stopped );
        self.emit( PlayerEvent::TrackChanged( Some( Arc::clone( &track ) ) ) );
        self.emit_time();

        tracing::info!( "Loading {}", track );
        let events = SessionEvents::new( self.generation, Arc::clone( &self.sink ) );
        let mut session = self.backend.open( &track, events )?;
        if let Some( volume ) = self.volume {
            session.set_volume( volume );
        }
        self.session = Some( session );
        Ok(())
    }


    fn start_output( &mut self ) -> Result<(), BackendError> {
        let session = self.session.as_mut().ok_or( BackendError::Closed )?;
        session.play()?;
        self.set_state( TransportState::Playing );
        Ok(())
    }


    /// Stops and drops the live session before anything else is opened.
    fn release( &mut self ) {
        if let Some( mut session ) = self.session.take() {
            if let Err( e ) = session.stop() {
                tracing::debug!( "Stopping released session: {}", e );
            }
        }
    }


    fn set_state( &mut self, state: TransportState ) {
        if self.state != state {
            self.state = state;
            self.emit( PlayerEvent::TransportChanged( state ) );
        }
    }


    fn emit_time( &self ) {
        self.emit( PlayerEvent::TimeChanged {
            elapsed: self.elapsed,
            total: self.total,
        } );
    }


    fn emit_flags( &self ) {
        self.emit( PlayerEvent::FlagsChanged {
            shuffle: self.shuffle,
            repeat: self.repeat,
        } );
    }


    fn emit( &self, event: PlayerEvent ) {
        // No subscribers is fine
        let _ = self.events.send( event );
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::library::Library;
    use crate::playlist::PlaylistId;
    use crate::testing::{ tracks, MockBackend };


    fn engine( backend: &MockBackend ) -> Engine {
        Engine::new( Box::new( backend.clone() ), Arc::new( |_: TaggedEvent| {} ) )
            .with_rng( StdRng::seed_from_u64( 7 ) )
    }


    fn event( engine: &Engine, event: SessionEvent ) -> TaggedEvent {
        TaggedEvent { generation: engine.generation(), event }
    }


    #[test]
    fn test_load_playlist_prerolls_first_track() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );

        assert_eq!( engine.state(), TransportState::Stopped );
        assert_eq!( engine.index(), 0 );
        assert!( engine.has_session() );
        assert_eq!( backend.opened(), vec![ TrackId::from( "/t0.mp3" ) ] );
        assert!( !backend.calls().contains( &"play".to_string() ) );
    }


    #[test]
    fn test_load_empty_playlist() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( Vec::new() );

        assert!( !engine.has_session() );
        engine.play();
        engine.next();
        engine.previous();
        assert_eq!( engine.state(), TransportState::Stopped );
        assert!( backend.opened().is_empty() );
    }


    #[test]
    fn test_play_pause_stop() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );

        engine.play();
        assert_eq!( engine.state(), TransportState::Stopped );

        engine.load_playlist( tracks( 2 ) );
        engine.pause();
        assert_eq!( engine.state(), TransportState::Stopped );

        engine.play();
        assert_eq!( engine.state(), TransportState::Playing );
        engine.toggle_play_pause();
        assert_eq!( engine.state(), TransportState::Paused );
        engine.toggle_play_pause();
        assert_eq!( engine.state(), TransportState::Playing );

        engine.stop();
        assert_eq!( engine.state(), TransportState::Stopped );
        assert_eq!( engine.index(), 0 );
        assert!( engine.has_session() );
    }


    #[test]
    fn test_next_walks_to_end_then_stops() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 4 ) );

        for expected in 1..4 {
            engine.next();
            assert_eq!( engine.index(), expected );
            assert_eq!( engine.state(), TransportState::Playing );
        }

        engine.next();
        assert_eq!( engine.index(), 0 );
        assert_eq!( engine.state(), TransportState::Stopped );
        assert!( engine.has_session() );
    }


    #[test]
    fn test_end_of_track_advances() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );
        engine.play();

        engine.handle_session_event( event( &engine, SessionEvent::EndOfTrack ) );
        assert_eq!( engine.index(), 1 );
        assert_eq!( engine.state(), TransportState::Playing );
    }


    #[test]
    fn test_repeat_restarts_same_track() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );
        engine.next();
        engine.toggle_repeat();

        engine.handle_session_event( event( &engine, SessionEvent::Position( Duration::from_secs( 40 ) ) ) );
        let generation = engine.generation();
        engine.handle_session_event( event( &engine, SessionEvent::EndOfTrack ) );

        assert_eq!( engine.index(), 1 );
        assert_eq!( engine.state(), TransportState::Playing );
        assert_eq!( engine.status().elapsed, Duration::ZERO );
        assert_eq!( engine.generation(), generation );
        assert!( backend.calls().contains( &"seek 0".to_string() ) );
    }


    #[test]
    fn test_repeat_at_last_track_does_not_stop() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 2 ) );
        engine.next();
        engine.toggle_repeat();

        engine.handle_session_event( event( &engine, SessionEvent::EndOfTrack ) );
        assert_eq!( engine.index(), 1 );
        assert_eq!( engine.state(), TransportState::Playing );
    }


    #[test]
    fn test_previous_wraps_from_first() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );

        engine.previous();
        assert_eq!( engine.index(), 2 );
        assert_eq!( engine.state(), TransportState::Playing );

        engine.previous();
        assert_eq!( engine.index(), 1 );
    }


    #[test]
    fn test_shuffle_picks_from_seeded_rng() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 5 ) );
        engine.toggle_shuffle();

        let mut expected = StdRng::seed_from_u64( 7 );
        for _ in 0..6 {
            engine.next();
            assert_eq!( engine.index(), expected.gen_range( 0..5 ) );
            assert_eq!( engine.state(), TransportState::Playing );
        }

        // Previous is another random pick, not a rewind
        engine.previous();
        assert_eq!( engine.index(), expected.gen_range( 0..5 ) );
    }


    #[test]
    fn test_one_session_at_a_time() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );
        engine.next();
        engine.previous();
        engine.play_track( &TrackId::from( "/t2.mp3" ) );
        engine.load_playlist( tracks( 2 ) );

        let log = backend.log.lock().unwrap();
        assert_eq!( log.max_live, 1 );
        assert_eq!( log.live, 1 );
        assert_eq!( log.disposed, log.opened.len() - 1 );

        // Each old session is stopped and disposed before the next opens
        let calls = &log.calls;
        for ( i, call ) in calls.iter().enumerate().skip( 1 ) {
            if call.starts_with( "open" ) {
                assert_eq!( calls[ i - 1 ], "dispose" );
                assert_eq!( calls[ i - 2 ], "stop" );
            }
        }
    }


    #[test]
    fn test_stale_events_are_ignored() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );
        let stale = engine.generation();
        engine.next();

        engine.handle_session_event( TaggedEvent { generation: stale, event: SessionEvent::EndOfTrack } );
        engine.handle_session_event( TaggedEvent {
            generation: stale,
            event: SessionEvent::Position( Duration::from_secs( 9 ) ),
        } );

        assert_eq!( engine.index(), 1 );
        assert_eq!( engine.status().elapsed, Duration::ZERO );
    }


    #[test]
    fn test_ready_reports_duration() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 1 ) );
        assert_eq!( engine.status().total, None );

        let total = Some( Duration::from_secs( 200 ) );
        engine.handle_session_event( event( &engine, SessionEvent::Ready { duration: total } ) );
        assert_eq!( engine.status().total, total );

        engine.seek( Duration::from_secs( 500 ) );
        assert_eq!( engine.status().elapsed, Duration::from_secs( 200 ) );
    }


    #[test]
    fn test_open_failure_skips_track() {
        let backend = MockBackend::breaking( &[ "/t1.mp3" ] );
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );

        engine.next();
        assert_eq!( engine.index(), 2 );
        assert_eq!( engine.state(), TransportState::Playing );
    }


    #[test]
    fn test_session_error_skips_track() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 3 ) );
        engine.play();

        engine.handle_session_event( event( &engine, SessionEvent::Error( "bad frame".into() ) ) );
        assert_eq!( engine.index(), 1 );
        assert_eq!( engine.state(), TransportState::Playing );
    }


    #[test]
    fn test_play_failure_skips_track() {
        let mut backend = MockBackend::new();
        backend.mute.insert( TrackId::from( "/t0.mp3" ) );
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 2 ) );

        engine.play();
        assert_eq!( engine.index(), 1 );
        assert_eq!( engine.state(), TransportState::Playing );
    }


    #[test]
    fn test_all_tracks_failing_stops() {
        let backend = MockBackend::breaking( &[ "/t0.mp3", "/t1.mp3", "/t2.mp3" ] );
        let mut engine = engine( &backend );
        engine.toggle_shuffle();
        engine.load_playlist( tracks( 3 ) );

        assert_eq!( engine.state(), TransportState::Stopped );
        assert!( !engine.has_session() );
        assert!( engine.current_track().is_none() );

        engine.next();
        assert_eq!( engine.state(), TransportState::Stopped );
        assert!( !engine.has_session() );
    }


    #[test]
    fn test_volume_needs_session() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );

        engine.set_volume( 0.3 );
        assert_eq!( engine.status().volume, None );

        engine.load_playlist( tracks( 2 ) );
        engine.set_volume( 1.7 );
        assert_eq!( engine.status().volume, Some( 1.0 ) );

        engine.set_volume( 0.25 );
        engine.next();
        assert_eq!( backend.log.lock().unwrap().volume, Some( 0.25 ) );
        assert_eq!( backend.calls().last().map( String::as_str ), Some( "play" ) );
    }


    #[test]
    fn test_seek_needs_session() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.seek( Duration::from_secs( 10 ) );
        assert_eq!( engine.status().elapsed, Duration::ZERO );

        engine.load_playlist( tracks( 1 ) );
        engine.play();
        engine.seek( Duration::from_secs( 10 ) );
        assert_eq!( engine.status().elapsed, Duration::from_secs( 10 ) );
        assert_eq!( engine.state(), TransportState::Playing );
    }


    #[test]
    fn test_play_track_by_identity() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( tracks( 4 ) );

        engine.play_track( &TrackId::from( "/t2.mp3" ) );
        assert_eq!( engine.index(), 2 );
        assert_eq!( engine.state(), TransportState::Playing );

        let opened = backend.opened().len();
        engine.play_track( &TrackId::from( "/elsewhere.mp3" ) );
        assert_eq!( engine.index(), 2 );
        assert_eq!( backend.opened().len(), opened );
    }


    #[test]
    fn test_snapshot_is_not_live() {
        let mut library = Library::new();
        for track in tracks( 2 ) {
            library.add_track( ( *track ).clone() );
        }

        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        engine.load_playlist( library.playlist_tracks( PlaylistId::ALL_TRACKS ).unwrap() );

        library.add_track( Track::new( TrackId::from( "/late.mp3" ), "Late", "", "", "" ) );
        assert_eq!( library.playlist_tracks( PlaylistId::ALL_TRACKS ).unwrap().len(), 3 );
        assert_eq!( engine.snapshot().len(), 2 );
    }


    #[test]
    fn test_notifications() {
        let backend = MockBackend::new();
        let mut engine = engine( &backend );
        let mut rx = engine.subscribe();

        engine.load_playlist( tracks( 1 ) );
        engine.play();
        engine.toggle_shuffle();

        let mut seen = Vec::new();
        while let Ok( event ) = rx.try_recv() {
            seen.push( event );
        }

        assert!( matches!( &seen[ 0 ], PlayerEvent::TrackChanged( Some( t ) ) if t.title() == "T0" ) );
        assert!( seen.contains( &PlayerEvent::TimeChanged { elapsed: Duration::ZERO, total: None } ) );
        assert!( seen.contains( &PlayerEvent::TransportChanged( TransportState::Playing ) ) );
        assert_eq!( seen.last(), Some( &PlayerEvent::FlagsChanged { shuffle: true, repeat: false } ) );
    }
}
