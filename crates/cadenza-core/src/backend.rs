//! Media backend seam
//!
//! The playback engine never decodes audio itself. It asks a
//! [`MediaBackend`] to open a [`MediaSession`] for one track, drives it
//! with transport calls, and listens for [`SessionEvent`]s the session
//! reports through its [`SessionEvents`] sink.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::track::Track;


/// Errors reported by a media backend.
#[derive( Debug, Error )]
pub enum BackendError {
    #[error( "Failed to open file: {0}" )]
    FileOpen( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Audio output error: {0}" )]
    Output( String ),

    #[error( "Session is closed" )]
    Closed,
}


/// Something a live session wants the engine to know.
#[derive( Debug, Clone, PartialEq )]
pub enum SessionEvent {
    /// The decoder is ready; `duration` is `None` if the container does
    /// not say.
    Ready { duration: Option<Duration> },

    /// Playback position moved.
    Position( Duration ),

    /// The track played to its end.
    EndOfTrack,

    /// The session failed and will produce no more audio.
    Error( String ),
}


/// A session event tagged with the session that produced it.
#[derive( Debug, Clone, PartialEq )]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: SessionEvent,
}


/// Where a session sends its events.
///
/// Cheap to clone; safe to call from any thread, including after the
/// engine has moved on to another session (stale events are dropped by
/// generation).
#[derive( Clone )]
pub struct SessionEvents {
    generation: u64,
    sink: Arc<dyn Fn( TaggedEvent ) + Send + Sync>,
}


impl SessionEvents {
    pub fn new( generation: u64, sink: Arc<dyn Fn( TaggedEvent ) + Send + Sync> ) -> Self {
        Self { generation, sink }
    }


    pub fn generation( &self ) -> u64 {
        self.generation
    }


    pub fn emit( &self, event: SessionEvent ) {
        ( self.sink )( TaggedEvent {
            generation: self.generation,
            event,
        } );
    }
}


impl fmt::Debug for SessionEvents {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "SessionEvents" )
            .field( "generation", &self.generation )
            .finish_non_exhaustive()
    }
}


/// One decoder plus output for one track.
///
/// A new session starts pre-rolled and silent. Dropping it must release
/// every resource it holds before returning.
pub trait MediaSession: Send {
    fn play( &mut self ) -> Result<(), BackendError>;

    fn pause( &mut self ) -> Result<(), BackendError>;

    /// Halts output and rewinds to the start.
    fn stop( &mut self ) -> Result<(), BackendError>;

    fn seek( &mut self, position: Duration ) -> Result<(), BackendError>;

    /// Sets the output level (0.0 = mute, 1.0 = normal).
    fn set_volume( &mut self, volume: f32 );
}


/// Opens sessions.
pub trait MediaBackend: Send {
    fn open( &mut self, track: &Track, events: SessionEvents ) -> Result<Box<dyn MediaSession>, BackendError>;
}
