//! Text rendering for the prompt.

use std::time::Duration;

use cadenza_core::{ Playlist, PlayerEvent, PlayerStatus, Track, TransportState };


/// Formats a duration as "m:ss".
pub fn format_duration( d: Duration ) -> String {
    let secs = d.as_secs();
    format!( "{}:{:02}", secs / 60, secs % 60 )
}


pub fn state_name( state: TransportState ) -> &'static str {
    match state {
        TransportState::Stopped => "Stopped",
        TransportState::Paused => "Paused",
        TransportState::Playing => "Playing",
    }
}


fn on_off( flag: bool ) -> &'static str {
    if flag { "on" } else { "off" }
}


/// One line per playlist: id, name, track count.
pub fn playlist_line( playlist: &Playlist, count: usize ) -> String {
    format!( "{:>4}  {} ({})", playlist.id(), playlist.name(), count )
}


/// Numbered track listing, 1-based.
pub fn track_lines( tracks: &[std::sync::Arc<Track>] ) -> Vec<String> {
    tracks
        .iter()
        .enumerate()
        .map( |( i, t )| format!( "{:>4}. {} [{}, {}]", i + 1, t, t.album(), t.genre() ) )
        .collect()
}


/// `volume` is the 0 to 100 setting shown while the engine has no
/// session to apply it to.
pub fn status_line( status: &PlayerStatus, volume: u32 ) -> String {
    let track = match ( &status.track, status.index ) {
        ( Some( track ), Some( index ) ) => format!( "{}/{} {}", index + 1, status.len, track ),
        _ => "Nothing loaded".to_string(),
    };
    let total = status.total.map_or_else( || "-:--".to_string(), format_duration );
    let volume = status.volume.map_or( volume, |v| ( v * 100.0 ).round() as u32 );

    format!(
        "[{}] {} {}/{} vol {} shuffle {} repeat {}",
        state_name( status.state ),
        track,
        format_duration( status.elapsed ),
        total,
        volume,
        on_off( status.shuffle ),
        on_off( status.repeat ),
    )
}


/// Text for events worth printing. Time ticks are left to `status`.
pub fn event_line( event: &PlayerEvent ) -> Option<String> {
    match event {
        PlayerEvent::TrackChanged( Some( track ) ) => Some( format!( "> {}", track ) ),
        PlayerEvent::TrackChanged( None ) => Some( "> (no track)".to_string() ),
        PlayerEvent::TransportChanged( state ) => Some( format!( "[{}]", state_name( *state ) ) ),
        PlayerEvent::FlagsChanged { shuffle, repeat } => {
            Some( format!( "shuffle {}, repeat {}", on_off( *shuffle ), on_off( *repeat ) ) )
        }
        PlayerEvent::TimeChanged { .. } => None,
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cadenza_core::TrackId;


    #[test]
    fn test_format_duration() {
        assert_eq!( format_duration( Duration::ZERO ), "0:00" );
        assert_eq!( format_duration( Duration::from_millis( 65_900 ) ), "1:05" );
        assert_eq!( format_duration( Duration::from_secs( 3600 ) ), "60:00" );
    }


    #[test]
    fn test_status_line() {
        let track = Arc::new( Track::new( TrackId::from( "/a.mp3" ), "Song", "Band", "", "" ) );
        let status = PlayerStatus {
            state: TransportState::Playing,
            track: Some( track ),
            index: Some( 1 ),
            len: 3,
            elapsed: Duration::from_secs( 75 ),
            total: None,
            shuffle: true,
            repeat: false,
            volume: Some( 0.5 ),
        };
        assert_eq!(
            status_line( &status, 80 ),
            "[Playing] 2/3 Song - Band 1:15/-:-- vol 50 shuffle on repeat off"
        );
        assert_eq!(
            status_line( &PlayerStatus::default(), 40 ),
            "[Stopped] Nothing loaded 0:00/-:-- vol 40 shuffle off repeat off"
        );
    }


    #[test]
    fn test_time_ticks_are_quiet() {
        let tick = PlayerEvent::TimeChanged { elapsed: Duration::ZERO, total: None };
        assert_eq!( event_line( &tick ), None );
        assert_eq!( event_line( &PlayerEvent::TransportChanged( TransportState::Paused ) ).as_deref(), Some( "[Paused]" ) );
    }
}
