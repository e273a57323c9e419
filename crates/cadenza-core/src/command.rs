//! Text command parsing
//!
//! Turns a line typed at the prompt into a [`Command`]. Playlists are
//! referred to by id and tracks by their 1-based position in a listing.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::playlist::PlaylistId;


/// Errors that can occur during command parsing or execution.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),

    #[error( "Execution failed: {0}" )]
    ExecutionFailed( String ),
}


/// Parsed command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Library commands
    Scan { path: PathBuf },
    Playlists,
    Tracks { playlist: Option<PlaylistId> },
    New { name: String },
    Rename { playlist: PlaylistId, name: String },
    Delete { playlist: PlaylistId },
    Add { playlist: PlaylistId, track: usize },
    Remove { playlist: PlaylistId, track: usize },
    Save,

    // Playback commands
    Load { playlist: PlaylistId },
    Play { track: Option<usize> },
    Pause,
    Toggle,
    Stop,
    Next,
    Prev,
    Seek { position: Duration },
    Volume { level: u32 },
    Shuffle,
    Repeat,
    Status,

    Help,
    Quit,
}


impl Command {
    /// Parses a command line.
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( str::trim ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            // Library commands
            "scan" | "sc" => {
                let path = required( args, "directory" )?;
                Ok( Command::Scan { path: PathBuf::from( path ) } )
            }
            "playlists" | "pl" | "ls" => Ok( Command::Playlists ),
            "tracks" | "t" => {
                let playlist = args.map( parse_playlist ).transpose()?;
                Ok( Command::Tracks { playlist } )
            }
            "new" | "create" => {
                let name = required( args, "playlist name" )?;
                Ok( Command::New { name: name.to_string() } )
            }
            "rename" | "mv" => {
                let ( id, name ) = split_first( required( args, "playlist id" )? );
                let name = required( name, "new name" )?;
                Ok( Command::Rename { playlist: parse_playlist( id )?, name: name.to_string() } )
            }
            "delete" | "del" => {
                let playlist = parse_playlist( required( args, "playlist id" )? )?;
                Ok( Command::Delete { playlist } )
            }
            "add" | "a" => {
                let ( playlist, track ) = playlist_and_track( args )?;
                Ok( Command::Add { playlist, track } )
            }
            "remove" | "rm" => {
                let ( playlist, track ) = playlist_and_track( args )?;
                Ok( Command::Remove { playlist, track } )
            }
            "save" | "w" => Ok( Command::Save ),

            // Playback commands
            "load" | "l" => {
                let playlist = parse_playlist( required( args, "playlist id" )? )?;
                Ok( Command::Load { playlist } )
            }
            "play" | "p" => {
                let track = args.map( parse_track ).transpose()?;
                Ok( Command::Play { track } )
            }
            "pause" | "pa" => Ok( Command::Pause ),
            "toggle" | "tg" => Ok( Command::Toggle ),
            "stop" | "st" => Ok( Command::Stop ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let position = parse_time( required( args, "time position" )? )?;
                Ok( Command::Seek { position } )
            }
            "vol" | "volume" => {
                let level = required( args, "volume level" )?;
                let level: u32 = level
                    .parse()
                    .ok()
                    .filter( |l| *l <= 100 )
                    .ok_or_else( || CommandError::InvalidArgument( format!( "Volume must be 0-100: {}", level ) ) )?;
                Ok( Command::Volume { level } )
            }
            "shuffle" | "sh" => Ok( Command::Shuffle ),
            "repeat" | "rep" => Ok( Command::Repeat ),
            "status" | "now" => Ok( Command::Status ),

            "help" | "h" | "?" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }
}


fn required<'a>( args: Option<&'a str>, what: &str ) -> Result<&'a str, CommandError> {
    args.ok_or_else( || CommandError::MissingArgument( what.into() ) )
}


/// Splits off the first word.
fn split_first( args: &str ) -> ( &str, Option<&str> ) {
    match args.split_once( ' ' ) {
        Some(( first, rest )) => ( first, Some( rest.trim() ).filter( |r| !r.is_empty() ) ),
        None => ( args, None ),
    }
}


fn playlist_and_track( args: Option<&str> ) -> Result<( PlaylistId, usize ), CommandError> {
    let ( id, track ) = split_first( required( args, "playlist id" )? );
    let track = required( track, "track number" )?;
    Ok(( parse_playlist( id )?, parse_track( track )? ))
}


fn parse_playlist( s: &str ) -> Result<PlaylistId, CommandError> {
    s.parse()
        .map( PlaylistId )
        .map_err( |_| CommandError::InvalidArgument( format!( "Invalid playlist id: {}", s ) ) )
}


/// Track numbers are 1-based.
fn parse_track( s: &str ) -> Result<usize, CommandError> {
    s.parse()
        .ok()
        .filter( |n| *n > 0 )
        .ok_or_else( || CommandError::InvalidArgument( format!( "Invalid track number: {}", s ) ) )
}


/// Parses a time string like "1:30" or "90" into a Duration.
pub fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .ok()
            .filter( |s| *s < 60 )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        minutes
            .checked_mul( 60 )
            .and_then( |m| m.checked_add( seconds ) )
            .map( Duration::from_secs )
            .ok_or_else( || CommandError::InvalidArgument( format!( "Time out of range: {}", s ) ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        Ok( Duration::from_secs( seconds ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Library Commands:
  scan <dir>             Add audio files under a directory
  playlists              List playlists with their ids
  tracks [id]            List tracks (loaded playlist by default)
  new <name>             Create a playlist
  rename <id> <name>     Rename a playlist
  delete <id>            Delete a playlist
  add <id> <track#>      Add a track from the last listing to a playlist
  remove <id> <track#>   Remove the playlist's n-th track
  save                   Save the library now

Playback Commands:
  load <id>              Load a playlist into the player
  play [track#]          Play, or jump to a track of the loaded playlist
  pause                  Pause playback
  toggle                 Toggle play/pause
  stop                   Stop playback
  next                   Next track
  prev                   Previous track
  seek <time>            Seek to position (e.g., 1:30)
  vol <0-100>            Set volume
  shuffle                Toggle shuffle
  repeat                 Toggle repeat
  status                 Show what is playing

Other Commands:
  help                   Show this help
  quit                   Save and exit"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_scan() {
        let cmd = Command::parse( "scan /music/new stuff" ).unwrap();
        assert_eq!( cmd, Command::Scan { path: PathBuf::from( "/music/new stuff" ) } );
    }


    #[test]
    fn test_parse_rename_keeps_spaces() {
        let cmd = Command::parse( "rename 4  Road Trip Mix " ).unwrap();
        assert_eq!( cmd, Command::Rename { playlist: PlaylistId( 4 ), name: "Road Trip Mix".into() } );
    }


    #[test]
    fn test_parse_add_alias() {
        let cmd = Command::parse( "a 3 12" ).unwrap();
        assert_eq!( cmd, Command::Add { playlist: PlaylistId( 3 ), track: 12 } );
    }


    #[test]
    fn test_parse_tracks_optional_id() {
        assert_eq!( Command::parse( "tracks" ).unwrap(), Command::Tracks { playlist: None } );
        assert_eq!( Command::parse( "t 0" ).unwrap(), Command::Tracks { playlist: Some( PlaylistId::ALL_TRACKS ) } );
    }


    #[test]
    fn test_parse_play() {
        assert_eq!( Command::parse( "play" ).unwrap(), Command::Play { track: None } );
        assert_eq!( Command::parse( "P 2" ).unwrap(), Command::Play { track: Some( 2 ) } );
        assert!( matches!( Command::parse( "play 0" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 90 ) } );
    }


    #[test]
    fn test_parse_seek_seconds() {
        let cmd = Command::parse( "seek 45" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 45 ) } );
    }


    #[test]
    fn test_parse_seek_bad_seconds() {
        assert!( matches!( Command::parse( "seek 1:75" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seek_huge_minutes() {
        assert!( matches!(
            Command::parse( "seek 999999999999999999:00" ),
            Err( CommandError::InvalidArgument( _ ) )
        ) );
        assert_eq!( parse_time( "1000:59" ).unwrap(), Duration::from_secs( 60_059 ) );
    }


    #[test]
    fn test_parse_volume_range() {
        assert_eq!( Command::parse( "vol 40" ).unwrap(), Command::Volume { level: 40 } );
        assert!( matches!( Command::parse( "vol 140" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        assert!( matches!( Command::parse( "add" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "add 3" ), Err( CommandError::MissingArgument( _ ) ) ) );
        assert!( matches!( Command::parse( "rename 3" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_bad_playlist_id() {
        assert!( matches!( Command::parse( "load rock" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }
}
