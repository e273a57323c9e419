//! Cadenza CLI - Line-oriented music library and player

mod cli;
mod settings;
mod view;

use std::fmt::Display;
use std::path::{ Path, PathBuf };
use std::sync::Arc;

use anyhow::{ Context, Result };
use clap::Parser;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::broadcast::error::RecvError;

use cadenza_core::{
    command::help_text,
    spawn_engine, Command, CommandError, CpalBackend, EngineHandle, Library, LibraryEvent,
    MetadataResolver, PlaylistId, SharedLibrary, SymphoniaResolver, Track,
};

use cli::Args;
use settings::Settings;


/// Application state.
struct App {
    library: SharedLibrary,
    engine: EngineHandle,
    resolver: Arc<dyn MetadataResolver>,
    settings: Settings,
    save_path: PathBuf,
    /// False when the save file could not be read at startup, so quitting
    /// must not replace it with what little was loaded.
    save_on_exit: bool,
    /// Tracks from the last `tracks` listing, for `add`.
    listing: Vec<Arc<Track>>,
    /// Snapshot handed to the engine by the last `load`.
    loaded: Vec<Arc<Track>>,
}


fn failed( e: impl Display ) -> CommandError {
    CommandError::ExecutionFailed( e.to_string() )
}


fn no_playlist( id: PlaylistId ) -> CommandError {
    CommandError::InvalidArgument( format!( "No playlist with id {}", id ) )
}


/// Looks up a 1-based track number.
fn pick( tracks: &[Arc<Track>], number: usize ) -> Result<&Arc<Track>, CommandError> {
    number
        .checked_sub( 1 )
        .and_then( |i| tracks.get( i ) )
        .ok_or_else( || CommandError::InvalidArgument( format!( "No track {} in the listing", number ) ) )
}


impl App {
    fn execute( &mut self, command: Command ) -> Result<(), CommandError> {
        match command {
            // Library commands
            Command::Scan { path } => self.spawn_scan( path ),
            Command::Playlists => self.print_playlists(),
            Command::Tracks { playlist } => self.print_tracks( playlist )?,
            Command::New { name } => {
                let id = self.library.create_playlist( &name ).map_err( failed )?;
                println!( "Created playlist {}", id );
            }
            Command::Rename { playlist, name } => {
                self.library.rename_playlist( playlist, &name ).map_err( failed )?;
            }
            Command::Delete { playlist } => {
                self.library.delete_playlist( playlist ).map_err( failed )?;
            }
            Command::Add { playlist, track } => {
                let track = pick( &self.listing, track )?;
                if !self.library.add_track_to_playlist( playlist, track.id() ).map_err( failed )? {
                    println!( "Already in playlist {}", playlist );
                }
            }
            Command::Remove { playlist, track } => {
                let tracks = self.library.snapshot( playlist ).ok_or_else( || no_playlist( playlist ) )?;
                let track = pick( &tracks, track )?;
                self.library.remove_track_from_playlist( playlist, track.id() ).map_err( failed )?;
            }
            Command::Save => {
                self.save()?;
                self.save_on_exit = true;
                println!( "Saved to {}", self.save_path.display() );
            }

            // Playback commands
            Command::Load { playlist } => self.load( playlist )?,
            Command::Play { track: None } => self.engine.play().map_err( failed )?,
            Command::Play { track: Some( number ) } => {
                let id = pick( &self.loaded, number )?.id().clone();
                self.engine.play_track( id ).map_err( failed )?;
            }
            Command::Pause => self.engine.pause().map_err( failed )?,
            Command::Toggle => self.engine.toggle_play_pause().map_err( failed )?,
            Command::Stop => self.engine.stop().map_err( failed )?,
            Command::Next => self.engine.next().map_err( failed )?,
            Command::Prev => self.engine.previous().map_err( failed )?,
            Command::Seek { position } => self.engine.seek( position ).map_err( failed )?,
            Command::Volume { level } => {
                self.settings.volume = level;
                self.engine.set_volume( self.settings.volume_level() ).map_err( failed )?;
            }
            Command::Shuffle => self.engine.toggle_shuffle().map_err( failed )?,
            Command::Repeat => self.engine.toggle_repeat().map_err( failed )?,
            Command::Status => {
                println!( "{}", view::status_line( &self.engine.status(), self.settings.volume ) );
            }

            Command::Help => println!( "{}", help_text() ),
            Command::Quit => {}
        }
        Ok(())
    }


    /// Scans in the background so the prompt stays responsive.
    fn spawn_scan( &self, path: PathBuf ) {
        let library = self.library.clone();
        let resolver = Arc::clone( &self.resolver );
        println!( "Scanning {}...", path.display() );

        tokio::spawn( async move {
            match library.scan( &path, resolver ).await {
                Ok( summary ) => println!(
                    "Scan of {} done: {} added, {} already known, {} unreadable",
                    path.display(),
                    summary.added,
                    summary.known,
                    summary.failed
                ),
                Err( e ) => println!( "Scan of {} failed: {}", path.display(), e ),
            }
        } );
    }


    fn print_playlists( &self ) {
        let lines: Vec<String> = self.library.read( |library| {
            library
                .playlists()
                .iter()
                .map( |p| view::playlist_line( p, p.tracks( library.catalog() ).len() ) )
                .collect()
        } );
        for line in lines {
            println!( "{}", line );
        }
    }


    fn print_tracks( &mut self, playlist: Option<PlaylistId> ) -> Result<(), CommandError> {
        let tracks = match playlist {
            Some( id ) => self.library.snapshot( id ).ok_or_else( || no_playlist( id ) )?,
            None => self.loaded.clone(),
        };

        if tracks.is_empty() {
            println!( "(no tracks)" );
        }
        for line in view::track_lines( &tracks ) {
            println!( "{}", line );
        }
        self.listing = tracks;
        Ok(())
    }


    fn load( &mut self, playlist: PlaylistId ) -> Result<(), CommandError> {
        let tracks = self.library.snapshot( playlist ).ok_or_else( || no_playlist( playlist ) )?;
        self.loaded = tracks.clone();
        self.engine.load_playlist( tracks ).map_err( failed )?;
        // Queued behind the load, so a session exists to take it
        self.engine.set_volume( self.settings.volume_level() ).map_err( failed )
    }


    fn load_named( &mut self, name: &str ) {
        match self.library.read( |library| library.playlist_named( name ).map( |p| p.id() ) ) {
            Some( id ) => {
                if let Err( e ) = self.load( id ) {
                    tracing::warn!( "Cannot load playlist {:?}: {}", name, e );
                }
            }
            None => tracing::warn!( "No playlist named {:?}", name ),
        }
    }


    fn save( &self ) -> Result<(), CommandError> {
        self.library.save( &self.save_path ).map_err( failed )
    }


    /// Persists the library and preferences, then stops the engine.
    fn shutdown( &mut self ) {
        let status = self.engine.status();
        self.settings.shuffle = status.shuffle;
        self.settings.repeat = status.repeat;
        self.settings.save();

        if !self.save_on_exit {
            tracing::warn!( "Leaving {:?} untouched; use 'save' to overwrite it", self.save_path );
        } else if let Err( e ) = self.save() {
            tracing::error!( "Failed to save library: {}", e );
        }
        self.engine.shutdown();
    }
}


/// Reads the library at startup. The flag is false when the file exists
/// but could not be read, in which case the library starts empty.
fn open_library( path: &Path ) -> ( Library, bool ) {
    let mut library = Library::new();
    match library.load( path ) {
        Ok( _ ) => ( library, true ),
        Err( e ) => {
            tracing::error!( "Could not read library {:?}, starting empty: {}", path, e );
            library.clear();
            ( library, false )
        }
    }
}


/// A line read from stdin, or None once input has ended or failed.
fn input_line( read: std::io::Result<Option<String>> ) -> Option<String> {
    read.unwrap_or_else( |e| {
        tracing::error!( "Failed to read input: {}", e );
        None
    } )
}


fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else( |_| tracing_subscriber::EnvFilter::new( "cadenza=info,cadenza_core=info" ) );

    // Notifications go to stdout, so logs stay on stderr
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer( std::io::stderr )
        .with_target( false );

    tracing_subscriber::registry()
        .with( env_filter )
        .with( fmt_layer )
        .init();
}


#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let args = Args::parse();

    let save_path = args
        .library
        .clone()
        .or_else( Library::default_save_path )
        .context( "No data directory available; pass --library" )?;
    let settings = Settings::load();

    let ( library, save_on_exit ) = open_library( &save_path );
    let library = SharedLibrary::new( library );
    let ( engine, engine_thread ) = spawn_engine( Box::new( CpalBackend ) )?;
    engine.set_shuffle( settings.shuffle )?;
    engine.set_repeat( settings.repeat )?;

    let mut app = App {
        library,
        engine,
        resolver: Arc::new( SymphoniaResolver ),
        settings,
        save_path,
        save_on_exit,
        listing: Vec::new(),
        loaded: Vec::new(),
    };

    let mut library_events = app.library.subscribe();
    let mut player_events = app.engine.subscribe();

    for dir in &args.scan {
        match app.library.scan( dir, Arc::clone( &app.resolver ) ).await {
            Ok( summary ) => tracing::info!( "{:?}: {} tracks added", dir, summary.added ),
            Err( e ) => tracing::warn!( "Cannot scan {:?}: {}", dir, e ),
        }
    }
    if let Some( name ) = &args.playlist {
        app.load_named( name );
    }

    println!( "Cadenza {} - type 'help' for commands", env!( "CARGO_PKG_VERSION" ) );
    let mut lines = BufReader::new( tokio::io::stdin() ).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some( line ) = input_line( line ) else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse( &line ) {
                    Ok( Command::Quit ) => break,
                    Ok( command ) => {
                        if let Err( e ) = app.execute( command ) {
                            println!( "{}", e );
                        }
                    }
                    Err( e ) => println!( "{}", e ),
                }
            }
            event = player_events.recv() => match event {
                Ok( event ) => {
                    if let Some( line ) = view::event_line( &event ) {
                        println!( "{}", line );
                    }
                }
                Err( RecvError::Lagged( n ) ) => tracing::debug!( "Missed {} player events", n ),
                Err( RecvError::Closed ) => break,
            },
            event = library_events.recv() => match event {
                Ok( LibraryEvent::CatalogChanged ) => tracing::debug!( "Catalog changed" ),
                Ok( LibraryEvent::PlaylistsChanged ) => tracing::debug!( "Playlists changed" ),
                Err( RecvError::Lagged( n ) ) => tracing::debug!( "Missed {} library events", n ),
                Err( RecvError::Closed ) => break,
            },
        }
    }

    app.shutdown();
    if engine_thread.join().is_err() {
        tracing::error!( "Engine thread panicked" );
    }
    Ok(())
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;


    #[test]
    fn test_unreadable_library_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "library.txt" );
        let text = "SONG_START\nfilePath:/a.mp3\nSONG_START\n";
        fs::write( &path, text ).unwrap();

        let ( library, save_on_exit ) = open_library( &path );
        assert!( !save_on_exit );
        assert!( library.catalog().is_empty() );
        assert_eq!( fs::read_to_string( &path ).unwrap(), text );
    }


    #[test]
    fn test_input_error_ends_the_loop() {
        assert_eq!( input_line( Ok( Some( "play".into() ) ) ).as_deref(), Some( "play" ) );
        assert_eq!( input_line( Ok( None ) ), None );
        let err = std::io::Error::new( std::io::ErrorKind::InvalidData, "stream did not contain valid UTF-8" );
        assert_eq!( input_line( Err( err ) ), None );
    }


    #[test]
    fn test_missing_or_lenient_library_is_saved_on_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "library.txt" );
        assert!( open_library( &path ).1 );

        fs::write( &path, "some stray line\nPLAYLIST_START:Mix\nPLAYLIST_END\n" ).unwrap();
        let ( library, save_on_exit ) = open_library( &path );
        assert!( save_on_exit );
        assert!( library.playlist_named( "Mix" ).is_some() );
    }
}
