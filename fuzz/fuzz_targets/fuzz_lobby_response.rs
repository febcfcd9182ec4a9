#![no_main]

use libfuzzer_sys::fuzz_target;
use lobby_session_client::protocol::LobbyListResponse;
use lobby_session_client::{GameSnapshot, LobbySnapshot};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    // Snapshot construction must reject bad bodies with an error, never panic.
    if let Ok(Some(lobby)) = LobbySnapshot::from_response(raw.clone()) {
        let _ = lobby.has_member("alice");
    }
    let _ = GameSnapshot::from_response(raw.clone());
    let _ = serde_json::from_value::<LobbyListResponse>(raw);
});
