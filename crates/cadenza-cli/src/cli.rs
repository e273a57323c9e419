//! Command-line argument parsing for Cadenza.

use std::path::PathBuf;

use clap::Parser;


/// Cadenza - A local music library and player for the terminal.
#[derive( Parser, Debug )]
#[command( name = "cadenza" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Library save file (defaults to the user data directory).
    #[arg( short, long )]
    pub library: Option<PathBuf>,

    /// Directories to scan before the prompt opens.
    #[arg( short, long, num_args = 1.. )]
    pub scan: Vec<PathBuf>,

    /// Playlist to load at startup, by name.
    #[arg( short, long )]
    pub playlist: Option<String>,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_args() {
        let args = Args::parse_from( [ "cadenza", "--scan", "/a", "/b", "-p", "Genre: Rock" ] );
        assert_eq!( args.scan, vec![ PathBuf::from( "/a" ), PathBuf::from( "/b" ) ] );
        assert_eq!( args.playlist.as_deref(), Some( "Genre: Rock" ) );
        assert!( args.library.is_none() );
    }
}
