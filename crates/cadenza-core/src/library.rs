//! Library store
//!
//! Owns the catalog and the playlist collection. "All Songs" is always
//! the first playlist; genre playlists appear as genres are discovered;
//! user playlists are created, renamed and deleted on request.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::catalog::{ AddOutcome, Catalog };
use crate::playlist::{ Playlist, PlaylistId, PlaylistKind, UserPlaylist };
use crate::track::{ Track, TrackId };


/// Errors that can occur during library operations.
#[derive( Debug, Error )]
pub enum LibraryError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Path not found: {0}" )]
    NotFound( PathBuf ),

    #[error( "Malformed library file at line {line}: {reason}" )]
    Malformed { line: usize, reason: String },

    #[error( "Background task failed: {0}" )]
    Task( #[from] tokio::task::JoinError ),
}


/// Rejected playlist operations. The library is left unchanged.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum PlaylistError {
    #[error( "Playlist name must not be blank" )]
    BlankName,

    #[error( "Playlist with name '{0}' already exists" )]
    DuplicateName( String ),

    #[error( "No playlist with id {0}" )]
    NotFound( PlaylistId ),

    #[error( "Playlist '{0}' cannot be modified" )]
    ReadOnly( String ),

    #[error( "Unknown track: {0}" )]
    UnknownTrack( TrackId ),
}


/// Catalog plus playlists.
#[derive( Debug )]
pub struct Library {
    catalog: Catalog,
    playlists: Vec<Playlist>,
    next_id: u64,
}


impl Library {
    /// Creates an empty library holding only "All Songs".
    pub fn new() -> Self {
        Self {
            catalog: Catalog::new(),
            playlists: vec![ Playlist::new( PlaylistId::ALL_TRACKS, PlaylistKind::AllTracks ) ],
            next_id: 1,
        }
    }


    pub fn catalog( &self ) -> &Catalog {
        &self.catalog
    }


    /// Playlists in display order.
    pub fn playlists( &self ) -> &[Playlist] {
        &self.playlists
    }


    pub fn playlist( &self, id: PlaylistId ) -> Option<&Playlist> {
        self.playlists.iter().find( |p| p.id() == id )
    }


    /// Finds a playlist by name, ignoring case.
    pub fn playlist_named( &self, name: &str ) -> Option<&Playlist> {
        self.playlists.iter().find( |p| p.has_name( name ) )
    }


    /// Current tracks of a playlist.
    pub fn playlist_tracks( &self, id: PlaylistId ) -> Option<Vec<Arc<Track>>> {
        self.playlist( id ).map( |p| p.tracks( &self.catalog ) )
    }


    /// Adds a track to the catalog, creating a genre playlist when the
    /// track introduces a new genre.
    pub fn add_track( &mut self, track: Track ) -> AddOutcome {
        let outcome = self.catalog.add( track );
        if let AddOutcome::Added { new_genre: Some( ref genre ) } = outcome {
            tracing::debug!( "Discovered genre: {}", genre );
            self.push_playlist( PlaylistKind::Genre( genre.clone() ) );
        }
        outcome
    }


    /// Creates an empty user playlist.
    pub fn create_user_playlist( &mut self, name: &str ) -> Result<PlaylistId, PlaylistError> {
        let result = self.check_name( name, None )
            .map( |()| self.push_playlist( PlaylistKind::User( UserPlaylist::new( name ) ) ) );

        match &result {
            Ok( id ) => tracing::info!( "Created playlist '{}' ({})", name, id ),
            Err( e ) => tracing::warn!( "Cannot create playlist: {}", e ),
        }
        result
    }


    /// Renames a user playlist.
    pub fn rename_playlist( &mut self, id: PlaylistId, new_name: &str ) -> Result<(), PlaylistError> {
        let result = self.try_rename( id, new_name );
        if let Err( e ) = &result {
            tracing::warn!( "Cannot rename playlist {}: {}", id, e );
        }
        result
    }


    fn try_rename( &mut self, id: PlaylistId, new_name: &str ) -> Result<(), PlaylistError> {
        self.user_playlist_mut( id )?;
        self.check_name( new_name, Some( id ) )?;
        self.user_playlist_mut( id )?.set_name( new_name.to_string() );
        Ok(())
    }


    /// Deletes a user playlist. Derived playlists cannot be deleted.
    pub fn delete_playlist( &mut self, id: PlaylistId ) -> Result<(), PlaylistError> {
        let result = self.user_playlist_mut( id ).map( |_| () );
        match result {
            Ok(()) => {
                self.playlists.retain( |p| p.id() != id );
                tracing::info!( "Deleted playlist {}", id );
                Ok(())
            }
            Err( e ) => {
                tracing::warn!( "Cannot delete playlist {}: {}", id, e );
                Err( e )
            }
        }
    }


    /// Appends a catalog track to a user playlist.
    ///
    /// Returns `Ok(false)` if the track was already in the playlist.
    pub fn add_track_to_playlist( &mut self, id: PlaylistId, track: &TrackId ) -> Result<bool, PlaylistError> {
        if !self.catalog.contains( track ) {
            tracing::warn!( "Cannot add unknown track {} to playlist {}", track, id );
            return Err( PlaylistError::UnknownTrack( track.clone() ) );
        }
        let playlist = self.user_playlist_mut( id ).inspect_err( |e| {
            tracing::warn!( "Cannot add to playlist {}: {}", id, e );
        } )?;
        Ok( playlist.add( track.clone() ) )
    }


    /// Removes a track from a user playlist.
    ///
    /// Returns `Ok(false)` if the track was not in the playlist.
    pub fn remove_track_from_playlist( &mut self, id: PlaylistId, track: &TrackId ) -> Result<bool, PlaylistError> {
        let playlist = self.user_playlist_mut( id ).inspect_err( |e| {
            tracing::warn!( "Cannot remove from playlist {}: {}", id, e );
        } )?;
        Ok( playlist.remove( track ) )
    }


    /// Drops every track and playlist except "All Songs".
    pub fn clear( &mut self ) {
        self.catalog.clear();
        // Ids keep counting up so stale handles never alias new playlists
        self.playlists.truncate( 1 );
    }


    /// Appends a user playlist restored from disk without name checks.
    pub( crate ) fn restore_user_playlist( &mut self, playlist: UserPlaylist ) -> PlaylistId {
        self.push_playlist( PlaylistKind::User( playlist ) )
    }


    /// Gets the default save file location.
    /// Uses ~/.local/share/cadenza/library.txt on Linux and the platform
    /// equivalent elsewhere.
    pub fn default_save_path() -> Option<PathBuf> {
        dirs::data_local_dir().map( |d| d.join( "cadenza" ).join( "library.txt" ) )
    }


    fn push_playlist( &mut self, kind: PlaylistKind ) -> PlaylistId {
        let id = PlaylistId( self.next_id );
        self.next_id += 1;
        self.playlists.push( Playlist::new( id, kind ) );
        id
    }


    fn check_name( &self, name: &str, exclude: Option<PlaylistId> ) -> Result<(), PlaylistError> {
        if name.trim().is_empty() {
            return Err( PlaylistError::BlankName );
        }
        let taken = self.playlists
            .iter()
            .any( |p| Some( p.id() ) != exclude && p.has_name( name ) );
        if taken {
            return Err( PlaylistError::DuplicateName( name.to_string() ) );
        }
        Ok(())
    }


    fn user_playlist_mut( &mut self, id: PlaylistId ) -> Result<&mut UserPlaylist, PlaylistError> {
        let playlist = self.playlists
            .iter_mut()
            .find( |p| p.id() == id )
            .ok_or( PlaylistError::NotFound( id ) )?;
        let name = playlist.name().into_owned();
        playlist.as_user_mut().ok_or( PlaylistError::ReadOnly( name ) )
    }
}


impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn track( path: &str, genre: &str ) -> Track {
        Track::new( TrackId::from( path ), path, "", "", genre )
    }


    fn names( library: &Library ) -> Vec<String> {
        library.playlists().iter().map( |p| p.name().into_owned() ).collect()
    }


    #[test]
    fn test_genre_playlists_follow_discovery() {
        let mut library = Library::new();
        library.add_track( track( "/a.mp3", "Rock" ) );
        library.add_track( track( "/b.mp3", "Jazz" ) );
        library.add_track( track( "/c.mp3", "Rock" ) );

        assert_eq!( names( &library ), vec![ "All Songs", "Genre: Rock", "Genre: Jazz" ] );

        let rock = library.playlist_named( "Genre: Rock" ).unwrap().id();
        let ids: Vec<_> = library.playlist_tracks( rock )
            .unwrap()
            .iter()
            .map( |t| t.id().clone() )
            .collect();
        assert_eq!( ids, vec![ TrackId::from( "/a.mp3" ), TrackId::from( "/c.mp3" ) ] );
    }


    #[test]
    fn test_genre_spellings_get_their_own_playlists() {
        let mut library = Library::new();
        library.add_track( track( "/a.mp3", "Rock" ) );
        library.add_track( track( "/b.mp3", "rock" ) );

        assert_eq!( names( &library ), vec![ "All Songs", "Genre: Rock", "Genre: rock" ] );

        // Both views filter ignoring case
        for playlist in &library.playlists()[ 1.. ] {
            assert_eq!( playlist.tracks( library.catalog() ).len(), 2 );
        }
    }


    #[test]
    fn test_unknown_genre_gets_no_playlist() {
        let mut library = Library::new();
        library.add_track( track( "/a.mp3", "" ) );
        assert_eq!( names( &library ), vec![ "All Songs" ] );
    }


    #[test]
    fn test_create_rejects_case_insensitive_duplicate() {
        let mut library = Library::new();
        assert!( library.create_user_playlist( "Faves" ).is_ok() );
        assert_eq!(
            library.create_user_playlist( "faves" ),
            Err( PlaylistError::DuplicateName( "faves".into() ) )
        );
        assert_eq!( names( &library ), vec![ "All Songs", "Faves" ] );
    }


    #[test]
    fn test_create_rejects_blank_and_reserved_names() {
        let mut library = Library::new();
        assert_eq!( library.create_user_playlist( "   " ), Err( PlaylistError::BlankName ) );
        assert!( library.create_user_playlist( "all songs" ).is_err() );
        assert_eq!( library.playlists().len(), 1 );
    }


    #[test]
    fn test_rename_collision_keeps_old_name() {
        let mut library = Library::new();
        let faves = library.create_user_playlist( "Faves" ).unwrap();
        library.create_user_playlist( "Chill" ).unwrap();

        assert!( library.rename_playlist( faves, "CHILL" ).is_err() );
        assert_eq!( library.playlist( faves ).unwrap().name(), "Faves" );

        // Changing only the case of its own name is allowed
        assert!( library.rename_playlist( faves, "FAVES" ).is_ok() );
        assert_eq!( library.playlist( faves ).unwrap().name(), "FAVES" );
    }


    #[test]
    fn test_rename_and_delete_only_user_playlists() {
        let mut library = Library::new();
        library.add_track( track( "/a.mp3", "Rock" ) );
        let rock = library.playlist_named( "Genre: Rock" ).unwrap().id();

        assert!( matches!( library.rename_playlist( rock, "Stones" ), Err( PlaylistError::ReadOnly( _ ) ) ) );
        assert!( matches!( library.delete_playlist( PlaylistId::ALL_TRACKS ), Err( PlaylistError::ReadOnly( _ ) ) ) );
        assert!( library.delete_playlist( rock ).is_err() );
        assert_eq!( library.playlists().len(), 2 );

        let mix = library.create_user_playlist( "Mix" ).unwrap();
        assert!( library.delete_playlist( mix ).is_ok() );
        assert!( library.playlist( mix ).is_none() );
        assert_eq!( library.delete_playlist( mix ), Err( PlaylistError::NotFound( mix ) ) );
    }


    #[test]
    fn test_add_track_to_playlist() {
        let mut library = Library::new();
        library.add_track( track( "/a.mp3", "Rock" ) );
        let mix = library.create_user_playlist( "Mix" ).unwrap();
        let a = TrackId::from( "/a.mp3" );

        assert_eq!( library.add_track_to_playlist( mix, &a ), Ok( true ) );
        assert_eq!( library.add_track_to_playlist( mix, &a ), Ok( false ) );
        assert_eq!( library.playlist_tracks( mix ).unwrap().len(), 1 );

        let missing = TrackId::from( "/nope.mp3" );
        assert_eq!(
            library.add_track_to_playlist( mix, &missing ),
            Err( PlaylistError::UnknownTrack( missing ) )
        );
        assert!( library.add_track_to_playlist( PlaylistId::ALL_TRACKS, &a ).is_err() );

        assert_eq!( library.remove_track_from_playlist( mix, &a ), Ok( true ) );
        assert!( library.playlist_tracks( mix ).unwrap().is_empty() );
    }


    #[test]
    fn test_clear_keeps_all_tracks() {
        let mut library = Library::new();
        library.add_track( track( "/a.mp3", "Rock" ) );
        library.create_user_playlist( "Mix" ).unwrap();
        library.clear();

        assert_eq!( names( &library ), vec![ "All Songs" ] );
        assert!( library.catalog().is_empty() );
    }
}
