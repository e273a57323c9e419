//! Tag reading for scanned files
//!
//! The library asks a [`MetadataResolver`] for a file's tags. The default
//! resolver probes the file with Symphonia.

use std::fs::File;
use std::path::Path;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{ MetadataOptions, StandardTagKey, Tag };
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::track::{ Track, TrackId };


/// Errors that can occur while reading tags.
#[derive( Debug, Error )]
pub enum MetadataError {
    #[error( "Failed to open file: {0}" )]
    FileOpen( #[from] std::io::Error ),

    #[error( "Unsupported format" )]
    UnsupportedFormat,
}


/// Descriptive tags read from a file. Absent tags are `None`.
#[derive( Debug, Clone, Default, PartialEq, Eq )]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
}


impl TrackMetadata {
    /// Builds the catalog track for a file.
    ///
    /// A missing or empty title falls back to the file name without its
    /// extension; other missing tags become placeholders.
    pub fn into_track( self, id: TrackId, path: &Path ) -> Track {
        let title = self.title
            .filter( |t| !t.is_empty() )
            .unwrap_or_else( || {
                path.file_stem()
                    .map( |s| s.to_string_lossy().into_owned() )
                    .unwrap_or_default()
            } );

        Track::new(
            id,
            title,
            self.artist.unwrap_or_default(),
            self.album.unwrap_or_default(),
            self.genre.unwrap_or_default(),
        )
    }


    fn absorb( &mut self, tags: &[Tag] ) {
        for tag in tags {
            let Some( key ) = &tag.std_key else {
                continue;
            };
            let slot = match key {
                StandardTagKey::TrackTitle => &mut self.title,
                StandardTagKey::Artist => &mut self.artist,
                StandardTagKey::Album => &mut self.album,
                StandardTagKey::Genre => &mut self.genre,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some( tag.value.to_string().trim().to_string() );
            }
        }
    }
}


/// Source of track tags.
///
/// Called from blocking worker threads, possibly for many files at once.
pub trait MetadataResolver: Send + Sync {
    fn resolve( &self, path: &Path ) -> Result<TrackMetadata, MetadataError>;
}


/// Reads tags with Symphonia's format probe.
#[derive( Debug, Default, Clone, Copy )]
pub struct SymphoniaResolver;


impl MetadataResolver for SymphoniaResolver {
    fn resolve( &self, path: &Path ) -> Result<TrackMetadata, MetadataError> {
        let file = File::open( path )?;
        let mss = MediaSourceStream::new( Box::new( file ), Default::default() );

        let mut hint = Hint::new();
        if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
            hint.with_extension( ext );
        }

        let mut probed = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| MetadataError::UnsupportedFormat )?;

        let mut meta = TrackMetadata::default();

        // ID3 tags found while probing come first
        if let Some( log ) = probed.metadata.get() {
            if let Some( rev ) = log.current() {
                meta.absorb( rev.tags() );
            }
        }

        if let Some( rev ) = probed.format.metadata().current() {
            meta.absorb( rev.tags() );
        }

        tracing::debug!( "Resolved tags for {:?}: {:?}", path, meta );
        Ok( meta )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::track::{ UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_GENRE };


    #[test]
    fn test_title_falls_back_to_file_stem() {
        let path = Path::new( "/music/Blue in Green.mp3" );
        let track = TrackMetadata::default().into_track( TrackId::new( path ), path );
        assert_eq!( track.title(), "Blue in Green" );
        assert_eq!( track.artist(), UNKNOWN_ARTIST );
        assert_eq!( track.album(), UNKNOWN_ALBUM );
        assert_eq!( track.genre(), UNKNOWN_GENRE );

        let empty = TrackMetadata { title: Some( String::new() ), ..Default::default() };
        assert_eq!( empty.into_track( TrackId::new( path ), path ).title(), "Blue in Green" );
    }


    #[test]
    fn test_tags_are_kept() {
        let path = Path::new( "/music/x.mp3" );
        let meta = TrackMetadata {
            title: Some( "So What".into() ),
            artist: Some( "Miles Davis".into() ),
            album: Some( "Kind of Blue".into() ),
            genre: Some( "Jazz".into() ),
        };
        let track = meta.into_track( TrackId::new( path ), path );
        assert_eq!( track.title(), "So What" );
        assert_eq!( track.genre(), "Jazz" );
    }


    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "broken.mp3" );
        std::fs::write( &path, b"not audio at all" ).unwrap();
        assert!( SymphoniaResolver.resolve( &path ).is_err() );
        assert!( SymphoniaResolver.resolve( &dir.path().join( "absent.mp3" ) ).is_err() );
    }
}
