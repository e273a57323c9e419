//! Application settings management
//!
//! Handles the playback preferences that survive a restart: volume,
//! shuffle and repeat.

use std::fs;
use std::path::{ Path, PathBuf };

use serde::{ Deserialize, Serialize };


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Output volume, 0 to 100
    pub volume: u32,

    pub shuffle: bool,

    pub repeat: bool,
}


impl Default for Settings {
    fn default() -> Self {
        Self {
            volume: 100,
            shuffle: false,
            repeat: false,
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "cadenza" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let settings: Self = match fs::read_to_string( path ) {
            Ok( contents ) => serde_json::from_str( &contents ).unwrap_or_else( |e| {
                tracing::warn!( "Ignoring unreadable settings: {}", e );
                Self::default()
            } ),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        };

        Self {
            volume: settings.volume.min( 100 ),
            ..settings
        }
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        if let Some( path ) = Self::settings_path() {
            self.save_to( &path );
        }
    }


    pub fn save_to( &self, path: &Path ) {
        // Create parent directory if needed
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    /// Volume as the engine's 0.0 to 1.0 scale.
    pub fn volume_level( &self ) -> f32 {
        self.volume.min( 100 ) as f32 / 100.0
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );

        let settings = Settings { volume: 35, shuffle: true, repeat: false };
        settings.save_to( &path );
        assert_eq!( Settings::load_from( &path ), settings );
    }


    #[test]
    fn test_missing_and_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        assert_eq!( Settings::load_from( &path ), Settings::default() );

        fs::write( &path, r#"{ "repeat": true, "volume": 250 }"# ).unwrap();
        let settings = Settings::load_from( &path );
        assert!( settings.repeat );
        assert!( !settings.shuffle );
        assert_eq!( settings.volume, 100 );

        fs::write( &path, "not json" ).unwrap();
        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }


    #[test]
    fn test_volume_level() {
        let settings = Settings { volume: 40, ..Settings::default() };
        assert!( ( settings.volume_level() - 0.4 ).abs() < 1e-6 );
    }
}
