//! Library save file
//!
//! Line-oriented UTF-8 text. Every catalog track is written as a
//! `SONG_START`/`SONG_END` block, followed by one
//! `PLAYLIST_START:<name>`/`PLAYLIST_END` block per user playlist.
//! Genre playlists and "All Songs" are rebuilt from the tracks on load.

use std::ffi::OsString;
use std::fs::{ self, File };
use std::io::{ BufRead, BufReader, BufWriter, Write };
use std::path::{ Path, PathBuf };

use crate::catalog::AddOutcome;
use crate::library::{ Library, LibraryError };
use crate::playlist::UserPlaylist;
use crate::track::{ Track, TrackId };


const SONG_START: &str = "SONG_START";
const SONG_END: &str = "SONG_END";
const PLAYLIST_START: &str = "PLAYLIST_START:";
const PLAYLIST_SONG: &str = "PLAYLIST_SONG:";
const PLAYLIST_END: &str = "PLAYLIST_END";


/// What a load restored and what it had to leave out.
#[derive( Debug, Clone, Copy, Default, PartialEq, Eq )]
pub struct LoadSummary {
    pub tracks: usize,
    pub missing_files: usize,
    pub playlists: usize,
    /// Unrecognized lines that were ignored.
    pub skipped_lines: usize,
}


#[derive( Default )]
struct SongRecord {
    file_path: Option<String>,
    title: String,
    artist: String,
    album: String,
    genre: String,
}


enum Section {
    Top,
    Song( SongRecord ),
    Playlist( UserPlaylist ),
}


impl Library {
    /// Writes the library in save file format.
    pub fn write_to<W: Write>( &self, mut out: W ) -> std::io::Result<()> {
        for track in self.catalog().all() {
            writeln!( out, "{}", SONG_START )?;
            writeln!( out, "filePath:{}", track.id().to_saved() )?;
            writeln!( out, "title:{}", single_line( track.title() ) )?;
            writeln!( out, "artist:{}", single_line( track.artist() ) )?;
            writeln!( out, "album:{}", single_line( track.album() ) )?;
            writeln!( out, "genre:{}", single_line( track.genre() ) )?;
            writeln!( out, "{}", SONG_END )?;
        }

        for user in self.playlists().iter().filter_map( |p| p.as_user() ) {
            writeln!( out, "{}{}", PLAYLIST_START, single_line( user.name() ) )?;
            for id in user.entries() {
                writeln!( out, "{}{}", PLAYLIST_SONG, id.to_saved() )?;
            }
            writeln!( out, "{}", PLAYLIST_END )?;
        }

        out.flush()
    }


    /// Replaces the library contents with what the reader holds.
    ///
    /// Songs whose file no longer exists are skipped, and playlist
    /// entries pointing at unknown tracks are dropped. Unknown fields and
    /// stray lines are logged and ignored. If a block is left open the
    /// library is left empty and an error is returned.
    pub fn read_from<R: BufRead>( &mut self, reader: R ) -> Result<LoadSummary, LibraryError> {
        self.clear();
        let result = self.parse( reader );
        if result.is_err() {
            self.clear();
        }
        result
    }


    fn parse<R: BufRead>( &mut self, reader: R ) -> Result<LoadSummary, LibraryError> {
        let mut summary = LoadSummary::default();
        let mut section = Section::Top;
        let mut line_no = 0;

        for line in reader.lines() {
            let line = line?;
            line_no += 1;
            let malformed = |reason: &str| LibraryError::Malformed {
                line: line_no,
                reason: reason.to_string(),
            };

            if line.trim().is_empty() {
                continue;
            }
            let opens_block = line == SONG_START || line.starts_with( PLAYLIST_START );

            section = match section {
                Section::Top => {
                    if line == SONG_START {
                        Section::Song( SongRecord::default() )
                    } else if let Some( name ) = line.strip_prefix( PLAYLIST_START ) {
                        Section::Playlist( UserPlaylist::new( name ) )
                    } else {
                        skip_line( line_no, &line, &mut summary );
                        Section::Top
                    }
                }

                Section::Song( _ ) if opens_block => {
                    return Err( malformed( "song block not closed" ) );
                }

                Section::Song( mut record ) => {
                    if line == SONG_END {
                        self.restore_song( record, &mut summary );
                        Section::Top
                    } else {
                        let value = |key: &str| line.strip_prefix( key ).map( str::to_string );
                        if let Some( path ) = value( "filePath:" ) {
                            record.file_path = Some( path );
                        } else if let Some( title ) = value( "title:" ) {
                            record.title = title;
                        } else if let Some( artist ) = value( "artist:" ) {
                            record.artist = artist;
                        } else if let Some( album ) = value( "album:" ) {
                            record.album = album;
                        } else if let Some( genre ) = value( "genre:" ) {
                            record.genre = genre;
                        } else {
                            skip_line( line_no, &line, &mut summary );
                        }
                        Section::Song( record )
                    }
                }

                Section::Playlist( _ ) if opens_block => {
                    return Err( malformed( "playlist block not closed" ) );
                }

                Section::Playlist( mut playlist ) => {
                    if line == PLAYLIST_END {
                        self.restore_user_playlist( playlist );
                        summary.playlists += 1;
                        Section::Top
                    } else {
                        if let Some( saved ) = line.strip_prefix( PLAYLIST_SONG ) {
                            let id = TrackId::from_saved( saved );
                            // Entries for skipped or unknown songs are dropped
                            if self.catalog().contains( &id ) {
                                playlist.add( id );
                            }
                        } else {
                            skip_line( line_no, &line, &mut summary );
                        }
                        Section::Playlist( playlist )
                    }
                }
            };
        }

        match section {
            Section::Top => Ok( summary ),
            Section::Song( _ ) => Err( LibraryError::Malformed {
                line: line_no,
                reason: "unterminated song block".into(),
            } ),
            Section::Playlist( _ ) => Err( LibraryError::Malformed {
                line: line_no,
                reason: "unterminated playlist block".into(),
            } ),
        }
    }


    fn restore_song( &mut self, record: SongRecord, summary: &mut LoadSummary ) {
        let path = match record.file_path {
            Some( p ) if !p.is_empty() => p,
            _ => {
                tracing::warn!( "Song record without a file path, skipping" );
                return;
            }
        };

        let id = TrackId::from_saved( &path );
        if !id.exists() {
            tracing::warn!( "File for song not found, skipping: {}", id );
            summary.missing_files += 1;
            return;
        }

        let track = Track::new( id, record.title, record.artist, record.album, record.genre );
        if let AddOutcome::Added { .. } = self.add_track( track ) {
            summary.tracks += 1;
        }
    }


    /// Saves the library, replacing `path` atomically.
    pub fn save( &self, path: &Path ) -> Result<(), LibraryError> {
        if let Some( parent ) = path.parent() {
            fs::create_dir_all( parent )?;
        }

        let tmp = temp_path( path );
        {
            let mut writer = BufWriter::new( File::create( &tmp )? );
            self.write_to( &mut writer )?;
            let file = writer.into_inner().map_err( |e| e.into_error() )?;
            file.sync_all()?;
        }
        fs::rename( &tmp, path )?;

        tracing::info!(
            "Saved {} tracks and {} playlists to {:?}",
            self.catalog().len(),
            self.playlists().iter().filter( |p| p.is_user() ).count(),
            path
        );
        Ok(())
    }


    /// Loads a save file into this library.
    ///
    /// A missing file leaves the library untouched and is not an error.
    pub fn load( &mut self, path: &Path ) -> Result<LoadSummary, LibraryError> {
        if !path.exists() {
            tracing::info!( "No library file at {:?}, starting empty", path );
            return Ok( LoadSummary::default() );
        }

        let summary = self.read_from( BufReader::new( File::open( path )? ) )?;
        tracing::info!(
            "Loaded {} tracks and {} playlists from {:?} ({} missing files, {} unrecognized lines skipped)",
            summary.tracks,
            summary.playlists,
            path,
            summary.missing_files,
            summary.skipped_lines
        );
        Ok( summary )
    }
}


fn skip_line( line_no: usize, line: &str, summary: &mut LoadSummary ) {
    tracing::warn!( "Ignoring unrecognized library line {}: {:?}", line_no, line );
    summary.skipped_lines += 1;
}


/// Replaces line breaks with a single space.
fn single_line( value: &str ) -> String {
    value.replace( "\r\n", " " ).replace( [ '\n', '\r' ], " " )
}


fn temp_path( path: &Path ) -> PathBuf {
    let mut name = path.file_name().map( OsString::from ).unwrap_or_default();
    name.push( ".tmp" );
    path.with_file_name( name )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::io::Cursor;

    use tempfile::TempDir;


    fn touch( dir: &TempDir, name: &str ) -> TrackId {
        let path = dir.path().join( name );
        File::create( &path ).unwrap();
        TrackId::from_path( &path ).unwrap()
    }


    fn identities( library: &Library ) -> Vec<TrackId> {
        library.catalog().all().iter().map( |t| t.id().clone() ).collect()
    }


    fn user_playlists( library: &Library ) -> Vec<( String, Vec<TrackId> )> {
        library.playlists()
            .iter()
            .filter_map( |p| p.as_user() )
            .map( |u| ( u.name().to_string(), u.entries().to_vec() ) )
            .collect()
    }


    #[test]
    fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let a = touch( &dir, "a.mp3" );
        let b = touch( &dir, "b.mp3" );
        let c = touch( &dir, "c.mp3" );

        let mut library = Library::new();
        library.add_track( Track::new( a.clone(), "A", "Artist", "Album", "Rock" ) );
        library.add_track( Track::new( b.clone(), "B", "", "", "Jazz" ) );
        library.add_track( Track::new( c.clone(), "C", "", "", "" ) );
        let mix = library.create_user_playlist( "Mix" ).unwrap();
        library.add_track_to_playlist( mix, &c ).unwrap();
        library.add_track_to_playlist( mix, &a ).unwrap();
        library.create_user_playlist( "Empty" ).unwrap();

        let mut buf = Vec::new();
        library.write_to( &mut buf ).unwrap();

        let mut restored = Library::new();
        let summary = restored.read_from( Cursor::new( buf ) ).unwrap();

        assert_eq!( summary, LoadSummary { tracks: 3, missing_files: 0, playlists: 2, skipped_lines: 0 } );
        assert_eq!( identities( &restored ), identities( &library ) );
        assert_eq!( user_playlists( &restored ), user_playlists( &library ) );
        assert!( restored.playlist_named( "Genre: Rock" ).is_some() );
        assert!( restored.playlist_named( "Genre: Jazz" ).is_some() );

        let track = restored.catalog().get( &a ).unwrap();
        assert_eq!( track.artist(), "Artist" );
        assert_eq!( track.album(), "Album" );
    }


    #[test]
    fn test_missing_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let a = touch( &dir, "a.mp3" );
        let gone = dir.path().join( "gone.mp3" );

        let text = format!(
            "SONG_START\nfilePath:{}\ntitle:A\nartist:\nalbum:\ngenre:Rock\nSONG_END\n\
             SONG_START\nfilePath:{}\ntitle:Gone\nartist:\nalbum:\ngenre:Jazz\nSONG_END\n\
             PLAYLIST_START:Mix\nPLAYLIST_SONG:{}\nPLAYLIST_SONG:{}\nPLAYLIST_END\n",
            a,
            gone.display(),
            gone.display(),
            a
        );

        let mut library = Library::new();
        let summary = library.read_from( Cursor::new( text ) ).unwrap();

        assert_eq!( summary.tracks, 1 );
        assert_eq!( summary.missing_files, 1 );
        assert!( library.playlist_named( "Genre: Jazz" ).is_none() );
        assert_eq!( user_playlists( &library ), vec![ ( "Mix".to_string(), vec![ a ] ) ] );
    }


    #[test]
    fn test_newlines_are_flattened() {
        let dir = TempDir::new().unwrap();
        let a = touch( &dir, "a.mp3" );

        let mut library = Library::new();
        library.add_track( Track::new( a.clone(), "Line one\nLine two", "", "", "" ) );
        library.create_user_playlist( "Two\nLines" ).unwrap();

        let mut buf = Vec::new();
        library.write_to( &mut buf ).unwrap();
        let text = String::from_utf8( buf.clone() ).unwrap();
        assert!( text.contains( "title:Line one Line two\n" ) );
        assert!( text.contains( "PLAYLIST_START:Two Lines\n" ) );

        let mut restored = Library::new();
        restored.read_from( Cursor::new( buf ) ).unwrap();
        assert_eq!( restored.catalog().get( &a ).unwrap().title(), "Line one Line two" );
    }


    #[test]
    fn test_unknown_lines_are_ignored() {
        let dir = TempDir::new().unwrap();
        let a = touch( &dir, "a.mp3" );

        let text = format!(
            "# written by a newer version\n\n\
             SONG_START\nfilePath:{}\ntitle:A\nartist:\nalbum:\ngenre:Rock\nyear:1999\n\nSONG_END\n\
             PLAYLIST_START:Mix\nPLAYLIST_SONG:{}\nsort:title\nPLAYLIST_END\n\
             SONG_END\n",
            a,
            a
        );

        let mut library = Library::new();
        let summary = library.read_from( Cursor::new( text ) ).unwrap();

        assert_eq!( summary, LoadSummary { tracks: 1, missing_files: 0, playlists: 1, skipped_lines: 4 } );
        assert_eq!( library.catalog().get( &a ).unwrap().title(), "A" );
        assert_eq!( user_playlists( &library ), vec![ ( "Mix".to_string(), vec![ a ] ) ] );
    }


    #[test]
    fn test_open_block_leaves_library_empty() {
        let mut library = Library::new();
        library.add_track( Track::new( TrackId::from( "/x.mp3" ), "X", "", "", "Rock" ) );

        let result = library.read_from( Cursor::new( "SONG_START\ntitle:x\nSONG_START\n" ) );
        assert!( matches!( result, Err( LibraryError::Malformed { line: 3, .. } ) ) );
        assert!( library.catalog().is_empty() );
        assert_eq!( library.playlists().len(), 1 );

        let result = library.read_from( Cursor::new( "PLAYLIST_START:Mix\nPLAYLIST_SONG:/x.mp3\n" ) );
        assert!( matches!( result, Err( LibraryError::Malformed { line: 2, .. } ) ) );
    }


    #[cfg( target_os = "linux" )]
    #[test]
    fn test_non_utf8_file_name_round_trip() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join( OsStr::from_bytes( b"caf\xe9.mp3" ) );
        File::create( &path ).unwrap();
        let id = TrackId::from_path( &path ).unwrap();
        let percent = touch( &dir, "100%41 pure.mp3" );

        let mut library = Library::new();
        library.add_track( Track::new( id.clone(), "Cafe", "", "", "" ) );
        library.add_track( Track::new( percent.clone(), "Pure", "", "", "" ) );
        let mix = library.create_user_playlist( "Mix" ).unwrap();
        library.add_track_to_playlist( mix, &id ).unwrap();

        let mut buf = Vec::new();
        library.write_to( &mut buf ).unwrap();
        assert!( String::from_utf8( buf.clone() ).is_ok() );

        let mut restored = Library::new();
        let summary = restored.read_from( Cursor::new( buf ) ).unwrap();
        assert_eq!( summary.tracks, 2 );
        assert_eq!( identities( &restored ), vec![ id.clone(), percent ] );
        assert_eq!( user_playlists( &restored ), vec![ ( "Mix".to_string(), vec![ id ] ) ] );
    }


    #[test]
    fn test_save_and_load_file() {
        let dir = TempDir::new().unwrap();
        let a = touch( &dir, "a.mp3" );
        let save = dir.path().join( "nested" ).join( "library.txt" );

        let mut library = Library::new();
        library.add_track( Track::new( a.clone(), "A", "", "", "Rock" ) );
        library.save( &save ).unwrap();
        assert!( !temp_path( &save ).exists() );

        let mut loaded = Library::new();
        loaded.load( &save ).unwrap();
        assert_eq!( identities( &loaded ), vec![ a ] );
    }


    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let mut library = Library::new();
        let summary = library.load( &dir.path().join( "none.txt" ) ).unwrap();
        assert_eq!( summary, LoadSummary::default() );
        assert!( library.catalog().is_empty() );
    }
}
