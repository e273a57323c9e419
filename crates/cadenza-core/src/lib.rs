//! Cadenza Core - Audio library and playback engine
//!
//! This crate provides the library model (a deduplicated catalog with
//! derived and user playlists, directory scanning and a text save file)
//! and the playback engine that sequences one playlist snapshot through a
//! pluggable media backend.

pub mod backend;
pub mod catalog;
pub mod command;
pub mod decoder;
pub mod engine;
pub mod handle;
pub mod library;
pub mod metadata;
pub mod output;
pub mod persist;
pub mod playlist;
pub mod scanner;
pub mod session;
pub mod shared;
pub mod track;

#[cfg( test )]
mod testing;

pub use backend::{ BackendError, MediaBackend, MediaSession, SessionEvent, SessionEvents, TaggedEvent };
pub use catalog::{ AddOutcome, Catalog };
pub use command::{ Command, CommandError };
pub use engine::{ Engine, PlayerEvent, PlayerStatus, TransportState };
pub use handle::{ spawn_engine, EngineCommand, EngineHandle, HandleError };
pub use library::{ Library, LibraryError, PlaylistError };
pub use metadata::{ MetadataError, MetadataResolver, SymphoniaResolver, TrackMetadata };
pub use persist::LoadSummary;
pub use playlist::{ Playlist, PlaylistId, PlaylistKind, UserPlaylist };
pub use session::CpalBackend;
pub use shared::{ LibraryEvent, ScanSummary, SharedLibrary };
pub use track::{ Track, TrackId };
