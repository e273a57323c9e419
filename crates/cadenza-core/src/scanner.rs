//! Directory traversal
//!
//! Walks a directory tree and reports every MP3 file it finds. Metadata
//! resolution and catalog updates happen elsewhere; see
//! [`SharedLibrary::scan`](crate::shared::SharedLibrary::scan).

use std::io::ErrorKind;
use std::path::Path;

use crate::library::LibraryError;


/// File extension picked up by scans, compared case-insensitively.
const SCANNED_EXTENSION: &str = "mp3";


/// Recursively visits `root`, calling `found` for every MP3 file.
///
/// A missing root is an error. Subdirectories that cannot be read are
/// logged and skipped. Symlinked directories are not followed.
pub fn walk( root: &Path, found: &mut dyn FnMut( &Path ) ) -> Result<(), LibraryError> {
    match std::fs::metadata( root ) {
        Ok( meta ) if meta.is_dir() => {}
        Ok( _ ) => return Err( LibraryError::NotFound( root.to_path_buf() ) ),
        Err( e ) if e.kind() == ErrorKind::NotFound => {
            return Err( LibraryError::NotFound( root.to_path_buf() ) );
        }
        Err( e ) => return Err( LibraryError::Io( e ) ),
    }

    walk_recursive( root, found );
    Ok(())
}


fn walk_recursive( dir: &Path, found: &mut dyn FnMut( &Path ) ) {
    let entries = match std::fs::read_dir( dir ) {
        Ok( e ) => e,
        Err( e ) if e.kind() == ErrorKind::PermissionDenied => {
            tracing::warn!( "Access denied: {:?}", dir );
            return;
        }
        Err( e ) => {
            tracing::warn!( "Cannot read {:?}: {}", dir, e );
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok( file_type ) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            walk_recursive( &path, found );
        } else if is_scanned_file( &path ) {
            found( &path );
        }
    }
}


/// Checks the extension against the scanned type.
pub fn is_scanned_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| e.eq_ignore_ascii_case( SCANNED_EXTENSION ) )
        .unwrap_or( false )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs::{ self, File };
    use std::path::PathBuf;


    #[test]
    fn test_is_scanned_file() {
        assert!( is_scanned_file( Path::new( "song.mp3" ) ) );
        assert!( is_scanned_file( Path::new( "SONG.MP3" ) ) );
        assert!( !is_scanned_file( Path::new( "song.flac" ) ) );
        assert!( !is_scanned_file( Path::new( "mp3" ) ) );
    }


    #[test]
    fn test_walk_recurses() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all( dir.path().join( "a/b" ) ).unwrap();
        File::create( dir.path().join( "one.mp3" ) ).unwrap();
        File::create( dir.path().join( "a/two.Mp3" ) ).unwrap();
        File::create( dir.path().join( "a/b/three.mp3" ) ).unwrap();
        File::create( dir.path().join( "a/b/cover.jpg" ) ).unwrap();

        let mut found: Vec<PathBuf> = Vec::new();
        walk( dir.path(), &mut |p: &Path| found.push( p.to_path_buf() ) ).unwrap();
        found.sort();

        let mut expected = vec![
            dir.path().join( "one.mp3" ),
            dir.path().join( "a/two.Mp3" ),
            dir.path().join( "a/b/three.mp3" ),
        ];
        expected.sort();
        assert_eq!( found, expected );
    }


    #[test]
    fn test_walk_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = walk( &dir.path().join( "nope" ), &mut |_: &Path| {} );
        assert!( matches!( result, Err( LibraryError::NotFound( _ ) ) ) );
    }
}
