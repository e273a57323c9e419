//! Playlist views over the catalog
//!
//! Playlists come in three flavors: the full catalog, a live genre
//! filter, and user-managed lists. Only the last one stores anything of
//! its own, and even then only track identities.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::track::{ Track, TrackId };


/// Name of the playlist that shows the whole catalog.
pub const ALL_TRACKS_NAME: &str = "All Songs";

/// Prefix of genre playlist names.
pub const GENRE_PREFIX: &str = "Genre: ";


/// Stable handle for a playlist within one library.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct PlaylistId( pub u64 );


impl PlaylistId {
    /// The always-present "All Songs" playlist.
    pub const ALL_TRACKS: PlaylistId = PlaylistId( 0 );
}


impl fmt::Display for PlaylistId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}", self.0 )
    }
}


/// A user-managed ordered list of tracks.
///
/// Holds identities only; tracks are resolved against the catalog when
/// read, so entries whose track is gone simply disappear from the view.
#[derive( Debug, Clone, Default )]
pub struct UserPlaylist {
    name: String,
    entries: Vec<TrackId>,
}


impl UserPlaylist {
    /// Creates an empty playlist.
    pub fn new( name: impl Into<String> ) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }


    pub fn name( &self ) -> &str {
        &self.name
    }


    pub( crate ) fn set_name( &mut self, name: String ) {
        self.name = name;
    }


    /// Ordered track identities.
    pub fn entries( &self ) -> &[TrackId] {
        &self.entries
    }


    pub fn contains( &self, id: &TrackId ) -> bool {
        self.entries.contains( id )
    }


    /// Appends a track. Returns false if it was already present.
    pub fn add( &mut self, id: TrackId ) -> bool {
        if self.contains( &id ) {
            return false;
        }
        self.entries.push( id );
        true
    }


    /// Removes a track. Returns false if it was not present.
    pub fn remove( &mut self, id: &TrackId ) -> bool {
        if let Some( pos ) = self.entries.iter().position( |e| e == id ) {
            self.entries.remove( pos );
            true
        } else {
            false
        }
    }
}


/// What a playlist shows.
#[derive( Debug, Clone )]
pub enum PlaylistKind {
    /// Every track in the catalog.
    AllTracks,

    /// Tracks whose genre matches, ignoring case.
    Genre( String ),

    /// An explicit list maintained by the user.
    User( UserPlaylist ),
}


/// A playlist in the library.
#[derive( Debug, Clone )]
pub struct Playlist {
    id: PlaylistId,
    kind: PlaylistKind,
}


impl Playlist {
    pub( crate ) fn new( id: PlaylistId, kind: PlaylistKind ) -> Self {
        Self { id, kind }
    }


    pub fn id( &self ) -> PlaylistId {
        self.id
    }


    pub fn kind( &self ) -> &PlaylistKind {
        &self.kind
    }


    /// Display name.
    pub fn name( &self ) -> Cow<'_, str> {
        match &self.kind {
            PlaylistKind::AllTracks => Cow::Borrowed( ALL_TRACKS_NAME ),
            PlaylistKind::Genre( genre ) => Cow::Owned( format!( "{}{}", GENRE_PREFIX, genre ) ),
            PlaylistKind::User( user ) => Cow::Borrowed( user.name() ),
        }
    }


    /// Current tracks, computed against the catalog.
    pub fn tracks( &self, catalog: &Catalog ) -> Vec<Arc<Track>> {
        match &self.kind {
            PlaylistKind::AllTracks => catalog.all().to_vec(),
            PlaylistKind::Genre( genre ) => catalog.by_genre( genre ),
            PlaylistKind::User( user ) => user.entries()
                .iter()
                .filter_map( |id| catalog.get( id ) )
                .collect(),
        }
    }


    /// Only user playlists can be renamed, edited or deleted.
    pub fn is_user( &self ) -> bool {
        matches!( self.kind, PlaylistKind::User( _ ) )
    }


    pub fn as_user( &self ) -> Option<&UserPlaylist> {
        match &self.kind {
            PlaylistKind::User( user ) => Some( user ),
            _ => None,
        }
    }


    pub( crate ) fn as_user_mut( &mut self ) -> Option<&mut UserPlaylist> {
        match &mut self.kind {
            PlaylistKind::User( user ) => Some( user ),
            _ => None,
        }
    }


    /// Case-insensitive name comparison.
    pub fn has_name( &self, name: &str ) -> bool {
        self.name().to_lowercase() == name.to_lowercase()
    }
}


impl fmt::Display for Playlist {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( &self.name() )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add( Track::new( TrackId::from( "/a.mp3" ), "A", "", "", "Rock" ) );
        catalog.add( Track::new( TrackId::from( "/b.mp3" ), "B", "", "", "Jazz" ) );
        catalog.add( Track::new( TrackId::from( "/c.mp3" ), "C", "", "", "rock" ) );
        catalog
    }


    fn titles( tracks: &[Arc<Track>] ) -> Vec<&str> {
        tracks.iter().map( |t| t.title() ).collect()
    }


    #[test]
    fn test_names() {
        let all = Playlist::new( PlaylistId::ALL_TRACKS, PlaylistKind::AllTracks );
        let genre = Playlist::new( PlaylistId( 1 ), PlaylistKind::Genre( "Rock".into() ) );
        let user = Playlist::new( PlaylistId( 2 ), PlaylistKind::User( UserPlaylist::new( "Faves" ) ) );
        assert_eq!( all.name(), "All Songs" );
        assert_eq!( genre.name(), "Genre: Rock" );
        assert_eq!( user.name(), "Faves" );
        assert!( user.has_name( "FAVES" ) );
    }


    #[test]
    fn test_genre_view_is_live() {
        let mut catalog = catalog();
        let genre = Playlist::new( PlaylistId( 1 ), PlaylistKind::Genre( "Rock".into() ) );
        assert_eq!( titles( &genre.tracks( &catalog ) ), vec![ "A", "C" ] );

        catalog.add( Track::new( TrackId::from( "/d.mp3" ), "D", "", "", "ROCK" ) );
        assert_eq!( titles( &genre.tracks( &catalog ) ), vec![ "A", "C", "D" ] );
    }


    #[test]
    fn test_user_playlist_rejects_duplicates() {
        let mut user = UserPlaylist::new( "Mix" );
        assert!( user.add( TrackId::from( "/b.mp3" ) ) );
        assert!( user.add( TrackId::from( "/a.mp3" ) ) );
        assert!( !user.add( TrackId::from( "/b.mp3" ) ) );
        assert_eq!( user.entries().len(), 2 );

        assert!( user.remove( &TrackId::from( "/b.mp3" ) ) );
        assert!( !user.remove( &TrackId::from( "/b.mp3" ) ) );
    }


    #[test]
    fn test_user_playlist_resolves_in_own_order() {
        let catalog = catalog();
        let mut user = UserPlaylist::new( "Mix" );
        user.add( TrackId::from( "/c.mp3" ) );
        user.add( TrackId::from( "/missing.mp3" ) );
        user.add( TrackId::from( "/a.mp3" ) );
        let playlist = Playlist::new( PlaylistId( 3 ), PlaylistKind::User( user ) );
        assert_eq!( titles( &playlist.tracks( &catalog ) ), vec![ "C", "A" ] );
    }
}
