//! Thread-safe library handle
//!
//! Every catalog and playlist mutation goes through one mutex, and every
//! mutation that changes what a viewer would see is announced on a
//! broadcast channel. Scans resolve tags on the blocking pool and funnel
//! their results back through the same mutex.

use std::path::{ Path, PathBuf };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };

use tokio::sync::{ broadcast, mpsc };
use tokio::task::JoinSet;

use crate::catalog::AddOutcome;
use crate::library::{ Library, LibraryError, PlaylistError };
use crate::metadata::MetadataResolver;
use crate::persist::LoadSummary;
use crate::playlist::PlaylistId;
use crate::scanner;
use crate::track::{ Track, TrackId };


/// Capacity of the notification channel.
const EVENT_CAPACITY: usize = 256;


/// Library change notifications.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum LibraryEvent {
    CatalogChanged,
    PlaylistsChanged,
}


/// Counts from a finished scan.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub struct ScanSummary {
    /// MP3 files seen during traversal.
    pub found: usize,
    /// Files skipped because their identity was already known.
    pub known: usize,
    /// Tracks newly added to the catalog.
    pub added: usize,
    /// Files whose tags could not be read.
    pub failed: usize,
}


enum Resolution {
    Added,
    Duplicate,
    Failed,
}


/// Cloneable handle to a library shared between tasks.
#[derive( Clone )]
pub struct SharedLibrary {
    inner: Arc<Mutex<Library>>,
    events: broadcast::Sender<LibraryEvent>,
}


impl SharedLibrary {
    pub fn new( library: Library ) -> Self {
        let ( events, _ ) = broadcast::channel( EVENT_CAPACITY );
        Self {
            inner: Arc::new( Mutex::new( library ) ),
            events,
        }
    }


    /// Subscribes to change notifications.
    pub fn subscribe( &self ) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }


    /// Runs `f` with read access to the library.
    pub fn read<R>( &self, f: impl FnOnce( &Library ) -> R ) -> R {
        f( &self.lock() )
    }


    /// Current tracks of a playlist, for handing to the player.
    pub fn snapshot( &self, id: PlaylistId ) -> Option<Vec<Arc<Track>>> {
        self.lock().playlist_tracks( id )
    }


    /// Adds a single track.
    pub fn add_track( &self, track: Track ) -> AddOutcome {
        let outcome = self.lock().add_track( track );
        self.announce_add( &outcome );
        outcome
    }


    pub fn create_playlist( &self, name: &str ) -> Result<PlaylistId, PlaylistError> {
        let id = self.lock().create_user_playlist( name )?;
        self.notify( LibraryEvent::PlaylistsChanged );
        Ok( id )
    }


    pub fn rename_playlist( &self, id: PlaylistId, name: &str ) -> Result<(), PlaylistError> {
        self.lock().rename_playlist( id, name )?;
        self.notify( LibraryEvent::PlaylistsChanged );
        Ok(())
    }


    pub fn delete_playlist( &self, id: PlaylistId ) -> Result<(), PlaylistError> {
        self.lock().delete_playlist( id )?;
        self.notify( LibraryEvent::PlaylistsChanged );
        Ok(())
    }


    pub fn add_track_to_playlist( &self, id: PlaylistId, track: &TrackId ) -> Result<bool, PlaylistError> {
        let added = self.lock().add_track_to_playlist( id, track )?;
        if added {
            self.notify( LibraryEvent::PlaylistsChanged );
        }
        Ok( added )
    }


    pub fn remove_track_from_playlist( &self, id: PlaylistId, track: &TrackId ) -> Result<bool, PlaylistError> {
        let removed = self.lock().remove_track_from_playlist( id, track )?;
        if removed {
            self.notify( LibraryEvent::PlaylistsChanged );
        }
        Ok( removed )
    }


    /// Saves the library to `path`.
    pub fn save( &self, path: &Path ) -> Result<(), LibraryError> {
        self.lock().save( path )
    }


    /// Replaces the library with the contents of `path`.
    pub fn load( &self, path: &Path ) -> Result<LoadSummary, LibraryError> {
        let result = self.lock().load( path );
        self.notify( LibraryEvent::CatalogChanged );
        self.notify( LibraryEvent::PlaylistsChanged );
        result
    }


    /// Scans `root` for MP3 files and adds them to the catalog.
    ///
    /// Traversal runs on the blocking pool and streams paths back while
    /// tags for earlier files are already being read. Files whose identity
    /// is already known are skipped before their tags are read. Tag
    /// failures are logged and counted; they never end the scan.
    pub async fn scan(
        &self,
        root: &Path,
        resolver: Arc<dyn MetadataResolver>,
    ) -> Result<ScanSummary, LibraryError> {
        tracing::info!( "Scanning: {:?}", root );

        let ( tx, mut rx ) = mpsc::unbounded_channel::<( TrackId, PathBuf )>();
        let walk_root = root.to_path_buf();
        let walker = tokio::task::spawn_blocking( move || {
            scanner::walk( &walk_root, &mut |path: &Path| {
                match TrackId::from_path( path ) {
                    Ok( id ) => {
                        let _ = tx.send(( id, path.to_path_buf() ));
                    }
                    Err( e ) => tracing::warn!( "Cannot resolve {:?}: {}", path, e ),
                }
            } )
        } );

        let mut summary = ScanSummary::default();
        let mut pending = JoinSet::new();

        while let Some(( id, path )) = rx.recv().await {
            summary.found += 1;
            let known = self.lock().catalog().contains( &id );
            if known {
                summary.known += 1;
                continue;
            }

            let library = self.clone();
            let resolver = Arc::clone( &resolver );
            pending.spawn_blocking( move || library.resolve_and_add( id, &path, resolver.as_ref() ) );
        }

        walker.await??;

        while let Some( result ) = pending.join_next().await {
            match result? {
                Resolution::Added => summary.added += 1,
                Resolution::Duplicate => summary.known += 1,
                Resolution::Failed => summary.failed += 1,
            }
        }

        tracing::info!(
            "Scan of {:?} finished: {} found, {} added, {} already known, {} failed",
            root,
            summary.found,
            summary.added,
            summary.known,
            summary.failed
        );
        Ok( summary )
    }


    fn resolve_and_add( &self, id: TrackId, path: &Path, resolver: &dyn MetadataResolver ) -> Resolution {
        match resolver.resolve( path ) {
            Ok( meta ) => match self.add_track( meta.into_track( id, path ) ) {
                AddOutcome::Added { .. } => {
                    tracing::debug!( "Added {:?}", path );
                    Resolution::Added
                }
                AddOutcome::Duplicate => Resolution::Duplicate,
            },
            Err( e ) => {
                tracing::warn!( "Error reading metadata for {:?}: {}", path, e );
                Resolution::Failed
            }
        }
    }


    fn announce_add( &self, outcome: &AddOutcome ) {
        if let AddOutcome::Added { new_genre } = outcome {
            self.notify( LibraryEvent::CatalogChanged );
            if new_genre.is_some() {
                self.notify( LibraryEvent::PlaylistsChanged );
            }
        }
    }


    fn notify( &self, event: LibraryEvent ) {
        // No subscribers is fine
        let _ = self.events.send( event );
    }


    fn lock( &self ) -> MutexGuard<'_, Library> {
        self.inner.lock().unwrap_or_else( PoisonError::into_inner )
    }
}


impl Default for SharedLibrary {
    fn default() -> Self {
        Self::new( Library::new() )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::{ self, File };
    use std::time::Duration;

    use crate::metadata::{ MetadataError, TrackMetadata };


    /// Resolver answering from a file-name map; unknown names fail.
    struct MapResolver {
        tags: HashMap<String, TrackMetadata>,
        delay: Duration,
    }


    impl MapResolver {
        fn new( entries: &[( &str, &str )] ) -> Self {
            let tags = entries
                .iter()
                .map( |( file, genre )| {
                    ( file.to_string(), TrackMetadata {
                        genre: Some( genre.to_string() ),
                        ..Default::default()
                    } )
                } )
                .collect();
            Self { tags, delay: Duration::ZERO }
        }
    }


    impl MetadataResolver for MapResolver {
        fn resolve( &self, path: &Path ) -> Result<TrackMetadata, MetadataError> {
            std::thread::sleep( self.delay );
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.tags.get( &name ).cloned().ok_or( MetadataError::UnsupportedFormat )
        }
    }


    fn music_dir( files: &[&str] ) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            let path = dir.path().join( file );
            fs::create_dir_all( path.parent().unwrap() ).unwrap();
            File::create( path ).unwrap();
        }
        dir
    }


    #[tokio::test]
    async fn test_scan_adds_tracks_and_genres() {
        let dir = music_dir( &[ "a.mp3", "sub/b.MP3", "sub/deeper/c.mp3", "notes.txt" ] );
        let resolver = Arc::new( MapResolver::new( &[
            ( "a.mp3", "Rock" ),
            ( "b.MP3", "Jazz" ),
            ( "c.mp3", "rock" ),
        ] ) );

        let library = SharedLibrary::default();
        let summary = library.scan( dir.path(), resolver ).await.unwrap();

        assert_eq!( summary, ScanSummary { found: 3, known: 0, added: 3, failed: 0 } );
        library.read( |lib| {
            assert_eq!( lib.catalog().len(), 3 );
            assert_eq!( lib.catalog().len(), lib.catalog().identity_count() );
            assert_eq!( lib.playlists().len(), 3 );
            let rock = lib.playlists().iter().find( |p| p.name().to_lowercase() == "genre: rock" ).unwrap();
            assert_eq!( rock.tracks( lib.catalog() ).len(), 2 );
        } );
    }


    #[tokio::test]
    async fn test_scan_twice_is_idempotent() {
        let dir = music_dir( &[ "a.mp3", "b.mp3" ] );
        let resolver = Arc::new( MapResolver::new( &[ ( "a.mp3", "Rock" ), ( "b.mp3", "" ) ] ) );
        let library = SharedLibrary::default();

        library.scan( dir.path(), resolver.clone() ).await.unwrap();
        let second = library.scan( dir.path(), resolver ).await.unwrap();

        assert_eq!( second.known, 2 );
        assert_eq!( second.added, 0 );
        assert_eq!( library.read( |lib| lib.catalog().len() ), 2 );
    }


    #[tokio::test]
    async fn test_scan_skips_unreadable_files() {
        let dir = music_dir( &[ "good.mp3", "bad.mp3" ] );
        let resolver = Arc::new( MapResolver::new( &[ ( "good.mp3", "Pop" ) ] ) );
        let library = SharedLibrary::default();

        let summary = library.scan( dir.path(), resolver ).await.unwrap();
        assert_eq!( summary.added, 1 );
        assert_eq!( summary.failed, 1 );

        let title = library.read( |lib| lib.catalog().all()[ 0 ].title().to_string() );
        assert_eq!( title, "good" );
    }


    #[tokio::test]
    async fn test_scan_missing_root_fails() {
        let library = SharedLibrary::default();
        let result = library
            .scan( Path::new( "/definitely/not/here" ), Arc::new( MapResolver::new( &[] ) ) )
            .await;
        assert!( matches!( result, Err( LibraryError::NotFound( _ ) ) ) );
    }


    #[tokio::test( flavor = "multi_thread", worker_threads = 4 )]
    async fn test_concurrent_scans_keep_identity_set_consistent() {
        let names: Vec<String> = ( 0..40 ).map( |i| format!( "t{:02}.mp3", i ) ).collect();
        let refs: Vec<&str> = names.iter().map( String::as_str ).collect();
        let dir = music_dir( &refs );
        let entries: Vec<( &str, &str )> = refs.iter().map( |n| ( *n, "Ambient" ) ).collect();
        let mut resolver = MapResolver::new( &entries );
        resolver.delay = Duration::from_millis( 2 );
        let resolver: Arc<dyn MetadataResolver> = Arc::new( resolver );

        let library = SharedLibrary::default();
        let ( first, second ) = tokio::join!(
            library.scan( dir.path(), resolver.clone() ),
            library.scan( dir.path(), resolver.clone() ),
        );
        let ( first, second ) = ( first.unwrap(), second.unwrap() );

        assert_eq!( first.added + second.added, 40 );
        library.read( |lib| {
            assert_eq!( lib.catalog().len(), 40 );
            assert_eq!( lib.catalog().identity_count(), 40 );
            assert_eq!( lib.playlists().len(), 2 );
        } );
    }


    #[tokio::test]
    async fn test_mutations_are_announced() {
        let library = SharedLibrary::default();
        let mut events = library.subscribe();

        let id = library.create_playlist( "Faves" ).unwrap();
        assert_eq!( events.recv().await.unwrap(), LibraryEvent::PlaylistsChanged );

        assert!( library.create_playlist( "faves" ).is_err() );
        library.rename_playlist( id, "Loved" ).unwrap();
        assert_eq!( events.recv().await.unwrap(), LibraryEvent::PlaylistsChanged );

        library.add_track( Track::new( TrackId::from( "/x.mp3" ), "X", "", "", "Funk" ) );
        assert_eq!( events.recv().await.unwrap(), LibraryEvent::CatalogChanged );
        assert_eq!( events.recv().await.unwrap(), LibraryEvent::PlaylistsChanged );

        library.add_track( Track::new( TrackId::from( "/x.mp3" ), "X", "", "", "Funk" ) );
        library.delete_playlist( id ).unwrap();
        assert_eq!( events.recv().await.unwrap(), LibraryEvent::PlaylistsChanged );
    }
}
