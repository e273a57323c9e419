//! Track identity and metadata
//!
//! A track is an immutable record describing one audio file. Two tracks
//! with the same file identity are the same track.

use std::borrow::Cow;
use std::fmt;
use std::hash::{ Hash, Hasher };
use std::io;
use std::path::{ Path, PathBuf };


/// Placeholder stored when a track has no title.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Placeholder stored when a track has no artist.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Placeholder stored when a track has no album.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

/// Placeholder stored when a track has no genre.
pub const UNKNOWN_GENRE: &str = "Unknown Genre";


/// Canonical, stable identity of an audio file.
///
/// Built from the canonicalized absolute path when scanning, or taken
/// verbatim from a save file when loading.
#[derive( Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord )]
pub struct TrackId( PathBuf );


impl TrackId {
    /// Wraps a path that is already known to be canonical.
    pub fn new( path: impl Into<PathBuf> ) -> Self {
        Self( path.into() )
    }


    /// Resolves the canonical identity of a file on disk.
    pub fn from_path( path: &Path ) -> io::Result<Self> {
        path.canonicalize().map( Self )
    }


    /// Returns the file location this identity points at.
    pub fn path( &self ) -> &Path {
        &self.0
    }


    /// Returns true if the file still exists on disk.
    pub fn exists( &self ) -> bool {
        self.0.is_file()
    }


    /// Single-line text form for the save file.
    ///
    /// Plain UTF-8 paths are written as they are. Paths that are not valid
    /// UTF-8, or that contain `%` or a line break, are percent-encoded
    /// byte for byte so that `from_saved` gives back the same identity.
    pub fn to_saved( &self ) -> Cow<'_, str> {
        match self.0.to_str() {
            Some( s ) if !s.contains( [ '%', '\n', '\r' ] ) => Cow::Borrowed( s ),
            _ => Cow::Owned( urlencoding::encode_binary( &path_bytes( &self.0 ) ).into_owned() ),
        }
    }


    /// Parses an identity written by `to_saved`.
    pub fn from_saved( text: &str ) -> Self {
        if !text.contains( '%' ) {
            return Self::from( text );
        }
        let bytes = urlencoding::decode_binary( text.as_bytes() ).into_owned();
        Self( path_from_bytes( bytes ) )
    }
}


#[cfg( unix )]
fn path_bytes( path: &Path ) -> Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    Cow::Borrowed( path.as_os_str().as_bytes() )
}


#[cfg( not( unix ) )]
fn path_bytes( path: &Path ) -> Cow<'_, [u8]> {
    Cow::Owned( path.to_string_lossy().into_owned().into_bytes() )
}


#[cfg( unix )]
fn path_from_bytes( bytes: Vec<u8> ) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from( std::ffi::OsString::from_vec( bytes ) )
}


#[cfg( not( unix ) )]
fn path_from_bytes( bytes: Vec<u8> ) -> PathBuf {
    PathBuf::from( String::from_utf8_lossy( &bytes ).into_owned() )
}


impl fmt::Display for TrackId {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{}", self.0.display() )
    }
}


impl From<&str> for TrackId {
    fn from( s: &str ) -> Self {
        Self( PathBuf::from( s ) )
    }
}


/// A known audio file and its descriptive fields.
///
/// Empty fields are replaced by the `UNKNOWN_*` placeholders when the
/// track is built; the record never changes afterwards.
#[derive( Debug, Clone )]
pub struct Track {
    id: TrackId,
    title: String,
    artist: String,
    album: String,
    genre: String,
}


impl Track {
    /// Creates a track, substituting placeholders for empty fields.
    pub fn new(
        id: TrackId,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        genre: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: or_placeholder( title.into(), UNKNOWN_TITLE ),
            artist: or_placeholder( artist.into(), UNKNOWN_ARTIST ),
            album: or_placeholder( album.into(), UNKNOWN_ALBUM ),
            genre: or_placeholder( genre.into(), UNKNOWN_GENRE ),
        }
    }


    pub fn id( &self ) -> &TrackId {
        &self.id
    }


    pub fn title( &self ) -> &str {
        &self.title
    }


    pub fn artist( &self ) -> &str {
        &self.artist
    }


    pub fn album( &self ) -> &str {
        &self.album
    }


    pub fn genre( &self ) -> &str {
        &self.genre
    }


    /// Returns true if the genre came from real metadata rather than
    /// the placeholder.
    pub fn has_genre( &self ) -> bool {
        !self.genre.is_empty() && self.genre != UNKNOWN_GENRE
    }


    /// Case-insensitive genre comparison used by genre views.
    pub fn is_genre( &self, genre: &str ) -> bool {
        self.genre.to_lowercase() == genre.to_lowercase()
    }
}


impl PartialEq for Track {
    fn eq( &self, other: &Self ) -> bool {
        self.id == other.id
    }
}


impl Eq for Track {}


impl Hash for Track {
    fn hash<H: Hasher>( &self, state: &mut H ) {
        self.id.hash( state );
    }
}


impl fmt::Display for Track {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "{} - {}", self.title, self.artist )
    }
}


fn or_placeholder( value: String, placeholder: &str ) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_empty_fields_get_placeholders() {
        let track = Track::new( TrackId::from( "/music/a.mp3" ), "", "", "", "" );
        assert_eq!( track.title(), UNKNOWN_TITLE );
        assert_eq!( track.artist(), UNKNOWN_ARTIST );
        assert_eq!( track.album(), UNKNOWN_ALBUM );
        assert_eq!( track.genre(), UNKNOWN_GENRE );
        assert!( !track.has_genre() );
    }


    #[test]
    fn test_equality_is_by_identity() {
        let a = Track::new( TrackId::from( "/music/a.mp3" ), "One", "X", "Y", "Rock" );
        let b = Track::new( TrackId::from( "/music/a.mp3" ), "Two", "Z", "W", "Jazz" );
        let c = Track::new( TrackId::from( "/music/c.mp3" ), "One", "X", "Y", "Rock" );
        assert_eq!( a, b );
        assert_ne!( a, c );
    }


    #[test]
    fn test_saved_form_is_plain_for_ordinary_paths() {
        let id = TrackId::from( "/music/Ärzte/a b.mp3" );
        assert_eq!( id.to_saved(), "/music/Ärzte/a b.mp3" );
        assert_eq!( TrackId::from_saved( &id.to_saved() ), id );
    }


    #[test]
    fn test_saved_form_escapes_percent_and_newlines() {
        for raw in [ "/music/100%41.mp3", "/music/two\nlines.mp3" ] {
            let id = TrackId::from( raw );
            let saved = id.to_saved();
            assert!( !saved.contains( '\n' ) );
            assert_ne!( saved, raw );
            assert_eq!( TrackId::from_saved( &saved ), id );
        }
    }


    #[cfg( unix )]
    #[test]
    fn test_saved_form_keeps_non_utf8_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let id = TrackId::new( OsStr::from_bytes( b"/music/caf\xe9.mp3" ) );
        let saved = id.to_saved();
        assert!( saved.is_ascii() );
        assert_eq!( TrackId::from_saved( &saved ), id );
    }


    #[test]
    fn test_genre_match_ignores_case() {
        let track = Track::new( TrackId::from( "/music/a.mp3" ), "A", "", "", "Rock" );
        assert!( track.is_genre( "rock" ) );
        assert!( track.is_genre( "ROCK" ) );
        assert!( !track.is_genre( "Jazz" ) );
    }
}
