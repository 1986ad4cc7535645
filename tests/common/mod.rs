#![allow(dead_code)]

pub mod mock_asr;
pub mod mock_audio;
pub mod mock_tts;

use hearken::commands::CommandTable;
use std::sync::Arc;

/// The four-room table used throughout the tests
pub fn room_table() -> Arc<CommandTable> {
    Arc::new(
        CommandTable::new([
            ("living room", "Acknowledged, Living Room."),
            ("kitchen", "Affirmative, Kitchen."),
            ("bedroom", "Understood, Bedroom."),
            ("exit", "Exiting program."),
        ])
        .expect("valid command table"),
    )
}
