//! Threaded engine handle
//!
//! [`spawn_engine`] moves an [`Engine`] onto its own thread. Caller
//! commands and session events share one queue, so the engine only ever
//! sees one request at a time.

use std::sync::mpsc::{ self, Receiver, Sender };
use std::sync::{ Arc, PoisonError, RwLock };
use std::thread::{ self, JoinHandle };
use std::time::Duration;

use rand::rngs::StdRng;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::backend::{ MediaBackend, TaggedEvent };
use crate::engine::{ Engine, PlayerEvent, PlayerStatus };
use crate::track::{ Track, TrackId };


/// Errors from talking to the engine thread.
#[derive( Debug, Error )]
pub enum HandleError {
    #[error( "Failed to start engine thread: {0}" )]
    Spawn( #[from] std::io::Error ),

    #[error( "Engine has shut down" )]
    Closed,
}


/// Requests the engine thread understands.
#[derive( Debug, Clone )]
pub enum EngineCommand {
    LoadPlaylist( Vec<Arc<Track>> ),
    PlayTrack( TrackId ),
    Play,
    Pause,
    Stop,
    TogglePlayPause,
    Next,
    Previous,
    Seek( Duration ),
    SetVolume( f32 ),
    ToggleShuffle,
    ToggleRepeat,
    SetShuffle( bool ),
    SetRepeat( bool ),
}


enum Input {
    Command( EngineCommand ),
    Session( TaggedEvent ),
    Shutdown,
}


/// Cloneable handle to an engine running on its own thread.
#[derive( Clone )]
pub struct EngineHandle {
    tx: Sender<Input>,
    events: broadcast::Sender<PlayerEvent>,
    status: Arc<RwLock<PlayerStatus>>,
}


/// Starts an engine over `backend` on a dedicated thread.
///
/// The thread exits after [`EngineHandle::shutdown`], disposing the live
/// session on the way out.
pub fn spawn_engine( backend: Box<dyn MediaBackend> ) -> Result<( EngineHandle, JoinHandle<()> ), HandleError> {
    spawn_with( backend, None )
}


pub( crate ) fn spawn_with(
    backend: Box<dyn MediaBackend>,
    rng: Option<StdRng>,
) -> Result<( EngineHandle, JoinHandle<()> ), HandleError> {
    let ( tx, rx ) = mpsc::channel();

    let session_tx = tx.clone();
    let sink = Arc::new( move |event: TaggedEvent| {
        // Fails only once the engine thread is gone
        let _ = session_tx.send( Input::Session( event ) );
    } );

    let mut engine = Engine::new( backend, sink );
    if let Some( rng ) = rng {
        engine = engine.with_rng( rng );
    }

    let status = Arc::new( RwLock::new( engine.status() ) );
    let handle = EngineHandle {
        tx,
        events: engine.event_sender(),
        status: Arc::clone( &status ),
    };

    let thread = thread::Builder::new()
        .name( "cadenza-engine".into() )
        .spawn( move || run( engine, rx, status ) )?;

    Ok(( handle, thread ))
}


fn run( mut engine: Engine, rx: Receiver<Input>, status: Arc<RwLock<PlayerStatus>> ) {
    tracing::debug!( "Engine thread started" );

    while let Ok( input ) = rx.recv() {
        match input {
            Input::Command( command ) => apply( &mut engine, command ),
            Input::Session( event ) => engine.handle_session_event( event ),
            Input::Shutdown => break,
        }
        *status.write().unwrap_or_else( PoisonError::into_inner ) = engine.status();
    }

    engine.shutdown();
    *status.write().unwrap_or_else( PoisonError::into_inner ) = engine.status();
    tracing::debug!( "Engine thread stopped" );
}


fn apply( engine: &mut Engine, command: EngineCommand ) {
    match command {
        EngineCommand::LoadPlaylist( tracks ) => engine.load_playlist( tracks ),
        EngineCommand::PlayTrack( id ) => engine.play_track( &id ),
        EngineCommand::Play => engine.play(),
        EngineCommand::Pause => engine.pause(),
        EngineCommand::Stop => engine.stop(),
        EngineCommand::TogglePlayPause => engine.toggle_play_pause(),
        EngineCommand::Next => engine.next(),
        EngineCommand::Previous => engine.previous(),
        EngineCommand::Seek( position ) => engine.seek( position ),
        EngineCommand::SetVolume( volume ) => engine.set_volume( volume ),
        EngineCommand::ToggleShuffle => engine.toggle_shuffle(),
        EngineCommand::ToggleRepeat => engine.toggle_repeat(),
        EngineCommand::SetShuffle( on ) => engine.set_shuffle( on ),
        EngineCommand::SetRepeat( on ) => engine.set_repeat( on ),
    }
}


impl EngineHandle {
    pub fn send( &self, command: EngineCommand ) -> Result<(), HandleError> {
        self.tx
            .send( Input::Command( command ) )
            .map_err( |_| HandleError::Closed )
    }


    pub fn load_playlist( &self, tracks: Vec<Arc<Track>> ) -> Result<(), HandleError> {
        self.send( EngineCommand::LoadPlaylist( tracks ) )
    }


    pub fn play_track( &self, id: TrackId ) -> Result<(), HandleError> {
        self.send( EngineCommand::PlayTrack( id ) )
    }


    pub fn play( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::Play )
    }


    pub fn pause( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::Pause )
    }


    pub fn stop( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::Stop )
    }


    pub fn toggle_play_pause( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::TogglePlayPause )
    }


    pub fn next( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::Next )
    }


    pub fn previous( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::Previous )
    }


    pub fn seek( &self, position: Duration ) -> Result<(), HandleError> {
        self.send( EngineCommand::Seek( position ) )
    }


    pub fn set_volume( &self, volume: f32 ) -> Result<(), HandleError> {
        self.send( EngineCommand::SetVolume( volume ) )
    }


    pub fn toggle_shuffle( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::ToggleShuffle )
    }


    pub fn toggle_repeat( &self ) -> Result<(), HandleError> {
        self.send( EngineCommand::ToggleRepeat )
    }


    pub fn set_shuffle( &self, on: bool ) -> Result<(), HandleError> {
        self.send( EngineCommand::SetShuffle( on ) )
    }


    pub fn set_repeat( &self, on: bool ) -> Result<(), HandleError> {
        self.send( EngineCommand::SetRepeat( on ) )
    }


    pub fn subscribe( &self ) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }


    /// Status as of the last request the engine finished.
    pub fn status( &self ) -> PlayerStatus {
        self.status.read().unwrap_or_else( PoisonError::into_inner ).clone()
    }


    /// Asks the engine thread to dispose its session and exit.
    pub fn shutdown( &self ) {
        let _ = self.tx.send( Input::Shutdown );
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::backend::SessionEvent;
    use crate::engine::TransportState;
    use crate::testing::{ tracks, MockBackend };
    use rand::SeedableRng;


    async fn wait_for( rx: &mut broadcast::Receiver<PlayerEvent>, wanted: PlayerEvent ) {
        let found = tokio::time::timeout( Duration::from_secs( 5 ), async {
            loop {
                match rx.recv().await {
                    Ok( event ) if event == wanted => return,
                    Ok( _ ) | Err( broadcast::error::RecvError::Lagged( _ ) ) => continue,
                    Err( broadcast::error::RecvError::Closed ) => panic!( "engine closed" ),
                }
            }
        } )
        .await;
        assert!( found.is_ok(), "never saw {:?}", wanted );
    }


    /// Status is published after each request completes, so poll for it.
    async fn wait_status( handle: &EngineHandle, done: impl Fn( &PlayerStatus ) -> bool ) -> PlayerStatus {
        for _ in 0..500 {
            let status = handle.status();
            if done( &status ) {
                return status;
            }
            tokio::time::sleep( Duration::from_millis( 10 ) ).await;
        }
        panic!( "status never settled: {:?}", handle.status() );
    }


    #[tokio::test]
    async fn test_commands_reach_engine() {
        let backend = MockBackend::new();
        let ( handle, thread ) = spawn_with( Box::new( backend.clone() ), Some( StdRng::seed_from_u64( 1 ) ) ).unwrap();
        let mut rx = handle.subscribe();

        handle.load_playlist( tracks( 3 ) ).unwrap();
        handle.next().unwrap();
        wait_for( &mut rx, PlayerEvent::TransportChanged( TransportState::Playing ) ).await;

        let status = wait_status( &handle, |s| s.state == TransportState::Playing ).await;
        assert_eq!( status.index, Some( 1 ) );
        assert_eq!( status.len, 3 );

        handle.shutdown();
        thread.join().unwrap();
        assert_eq!( backend.log.lock().unwrap().live, 0 );
        assert!( handle.play().is_err() );
    }


    #[tokio::test]
    async fn test_session_events_flow_back() {
        let backend = MockBackend::new();
        let ( handle, thread ) = spawn_engine( Box::new( backend.clone() ) ).unwrap();
        let mut rx = handle.subscribe();

        handle.load_playlist( tracks( 2 ) ).unwrap();
        handle.play().unwrap();
        wait_for( &mut rx, PlayerEvent::TransportChanged( TransportState::Playing ) ).await;

        let events = backend.last_events.lock().unwrap().clone().unwrap();
        events.emit( SessionEvent::Ready { duration: Some( Duration::from_secs( 90 ) ) } );
        events.emit( SessionEvent::Position( Duration::from_secs( 3 ) ) );
        wait_for( &mut rx, PlayerEvent::TimeChanged {
            elapsed: Duration::from_secs( 3 ),
            total: Some( Duration::from_secs( 90 ) ),
        } ).await;

        events.emit( SessionEvent::EndOfTrack );
        wait_for( &mut rx, PlayerEvent::TrackChanged( Some( Arc::clone( &tracks( 2 )[ 1 ] ) ) ) ).await;

        handle.shutdown();
        thread.join().unwrap();
    }
}
