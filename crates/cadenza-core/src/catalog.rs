//! Deduplicated track catalog
//!
//! Keeps every known track in insertion order, indexed by file identity,
//! and remembers which genres have already been seen.

use std::collections::{ HashMap, HashSet };
use std::sync::Arc;

use crate::track::{ Track, TrackId };


/// Result of adding a track to the catalog.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum AddOutcome {
    /// The track was appended. `new_genre` is set when its genre had not
    /// been seen before.
    Added { new_genre: Option<String> },

    /// A track with the same identity is already present.
    Duplicate,
}


/// The set of all known tracks.
#[derive( Debug, Default )]
pub struct Catalog {
    tracks: Vec<Arc<Track>>,
    // Identity -> position in `tracks`
    index: HashMap<TrackId, usize>,
    // Genre strings that already have a view, compared exactly
    genres: HashSet<String>,
}


impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }


    /// Adds a track unless its identity is already known.
    pub fn add( &mut self, track: Track ) -> AddOutcome {
        if self.index.contains_key( track.id() ) {
            tracing::debug!( "Duplicate track ignored: {}", track.id() );
            return AddOutcome::Duplicate;
        }

        let new_genre = if track.has_genre() && self.genres.insert( track.genre().to_string() ) {
            Some( track.genre().to_string() )
        } else {
            None
        };

        self.index.insert( track.id().clone(), self.tracks.len() );
        self.tracks.push( Arc::new( track ) );

        AddOutcome::Added { new_genre }
    }


    /// Returns true if a track with this identity is known.
    pub fn contains( &self, id: &TrackId ) -> bool {
        self.index.contains_key( id )
    }


    /// Looks up a track by identity.
    pub fn get( &self, id: &TrackId ) -> Option<Arc<Track>> {
        self.index.get( id ).map( |&i| Arc::clone( &self.tracks[ i ] ) )
    }


    /// All tracks in insertion order.
    pub fn all( &self ) -> &[Arc<Track>] {
        &self.tracks
    }


    /// Tracks whose genre matches, ignoring case.
    pub fn by_genre( &self, genre: &str ) -> Vec<Arc<Track>> {
        self.tracks
            .iter()
            .filter( |t| t.is_genre( genre ) )
            .cloned()
            .collect()
    }


    /// Number of distinct known identities.
    pub fn identity_count( &self ) -> usize {
        self.index.len()
    }


    pub fn len( &self ) -> usize {
        self.tracks.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.tracks.is_empty()
    }


    /// Forgets every track and genre.
    pub fn clear( &mut self ) {
        self.tracks.clear();
        self.index.clear();
        self.genres.clear();
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn track( path: &str, genre: &str ) -> Track {
        Track::new( TrackId::from( path ), path, "", "", genre )
    }


    #[test]
    fn test_add_dedups_by_identity() {
        let mut catalog = Catalog::new();
        assert!( matches!( catalog.add( track( "/a.mp3", "Rock" ) ), AddOutcome::Added { .. } ) );
        assert_eq!( catalog.add( track( "/a.mp3", "Jazz" ) ), AddOutcome::Duplicate );
        assert_eq!( catalog.len(), 1 );
        assert_eq!( catalog.all().len(), catalog.identity_count() );
    }


    #[test]
    fn test_genre_discovery_once_per_genre() {
        let mut catalog = Catalog::new();
        assert_eq!(
            catalog.add( track( "/a.mp3", "Rock" ) ),
            AddOutcome::Added { new_genre: Some( "Rock".into() ) }
        );
        assert_eq!( catalog.add( track( "/b.mp3", "Rock" ) ), AddOutcome::Added { new_genre: None } );
        assert_eq!(
            catalog.add( track( "/c.mp3", "rock" ) ),
            AddOutcome::Added { new_genre: Some( "rock".into() ) }
        );
        assert_eq!( catalog.add( track( "/e.mp3", "" ) ), AddOutcome::Added { new_genre: None } );
        assert_eq!(
            catalog.add( track( "/d.mp3", "Jazz" ) ),
            AddOutcome::Added { new_genre: Some( "Jazz".into() ) }
        );
    }


    #[test]
    fn test_by_genre_keeps_insertion_order() {
        let mut catalog = Catalog::new();
        catalog.add( track( "/a.mp3", "Rock" ) );
        catalog.add( track( "/b.mp3", "Jazz" ) );
        catalog.add( track( "/c.mp3", "ROCK" ) );

        let rock: Vec<_> = catalog.by_genre( "rock" ).iter().map( |t| t.id().clone() ).collect();
        assert_eq!( rock, vec![ TrackId::from( "/a.mp3" ), TrackId::from( "/c.mp3" ) ] );
    }


    #[test]
    fn test_identity_set_matches_tracks() {
        let mut catalog = Catalog::new();
        for i in 0..20 {
            catalog.add( track( &format!( "/t{}.mp3", i % 7 ), "" ) );
            assert_eq!( catalog.all().len(), catalog.identity_count() );
        }
        assert_eq!( catalog.len(), 7 );

        catalog.clear();
        assert!( catalog.is_empty() );
        assert_eq!( catalog.identity_count(), 0 );
    }
}
